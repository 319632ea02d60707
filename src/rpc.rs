//! Remote procedure dispatch.
//!
//! A dispatcher maps function names to a call direction and a handler bound
//! to a target object. Call payload: object id (`u32`), function name
//! (string), then raw caller-supplied parameter bytes. Calls always go out
//! reliably. On receipt, an unknown object, an unregistered name, or a
//! packet kind that does not match the registered direction each drop the
//! call with a diagnostic instead of executing it.

use std::collections::HashMap;
use std::net::SocketAddr;

use log::{debug, warn};

use crate::codec::ByteStream;
use crate::core::{NetError, NetRole, RpcError};
use crate::transport::{NetDriver, Packet, PacketKind};
use crate::world::{NetObject, ObjectId, ObjectRegistry};

/// Who may initiate a call, and to whom it is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcDirection {
    /// A peer invokes the function on the host.
    ToHost,
    /// The host invokes the function on one peer.
    ToPeer,
    /// The host invokes the function on every connected peer.
    ToAll,
}

impl RpcDirection {
    /// The packet kind carrying calls of this direction.
    pub fn packet_kind(self) -> PacketKind {
        match self {
            Self::ToHost => PacketKind::RpcToHost,
            Self::ToPeer => PacketKind::RpcToPeer,
            Self::ToAll => PacketKind::RpcToAll,
        }
    }
}

/// Handler invoked with the target object and the undecoded parameter bytes.
pub type RpcHandler = Box<dyn FnMut(&mut dyn NetObject, &mut ByteStream)>;

struct RpcEntry {
    direction: RpcDirection,
    handler: RpcHandler,
}

/// Registry and dispatch for named remote procedures.
#[derive(Default)]
pub struct RpcDispatcher {
    functions: HashMap<String, RpcEntry>,
}

impl RpcDispatcher {
    /// Create an empty dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name` with its direction and handler.
    ///
    /// Rejects a name that is already registered; direction and handler are
    /// recorded together so receipt can verify the wire kind.
    pub fn register(
        &mut self,
        name: &str,
        direction: RpcDirection,
        handler: RpcHandler,
    ) -> Result<(), RpcError> {
        if self.functions.contains_key(name) {
            return Err(RpcError::DuplicateName(name.to_string()));
        }
        debug!("registered rpc {name:?} ({direction:?})");
        self.functions
            .insert(name.to_string(), RpcEntry { direction, handler });
        Ok(())
    }

    /// Whether `name` is registered.
    pub fn is_registered(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Invoke `name` on the host's copy of the object (peer role).
    pub fn call_to_host(
        &self,
        driver: &mut NetDriver,
        object_id: ObjectId,
        name: &str,
        params: &[u8],
    ) -> Result<(), RpcError> {
        if driver.role() != NetRole::Peer {
            return Err(NetError::WrongRole {
                expected: NetRole::Peer,
                actual: driver.role(),
            }
            .into());
        }
        let host = driver.remote().ok_or(NetError::NoHost)?;
        let packet = Self::build_call(PacketKind::RpcToHost, object_id, name, params);
        driver.send(host, packet, true)?;
        Ok(())
    }

    /// Invoke `name` on one peer's mirror of the object (host role).
    pub fn call_to_peer(
        &self,
        driver: &mut NetDriver,
        peer: SocketAddr,
        object_id: ObjectId,
        name: &str,
        params: &[u8],
    ) -> Result<(), RpcError> {
        if driver.role() != NetRole::Host {
            return Err(NetError::WrongRole {
                expected: NetRole::Host,
                actual: driver.role(),
            }
            .into());
        }
        let packet = Self::build_call(PacketKind::RpcToPeer, object_id, name, params);
        driver.send(peer, packet, true)?;
        Ok(())
    }

    /// Invoke `name` on every connected peer's mirror of the object (host
    /// role).
    pub fn call_to_all(
        &self,
        driver: &mut NetDriver,
        object_id: ObjectId,
        name: &str,
        params: &[u8],
    ) -> Result<(), RpcError> {
        if driver.role() != NetRole::Host {
            return Err(NetError::WrongRole {
                expected: NetRole::Host,
                actual: driver.role(),
            }
            .into());
        }
        let packet = Self::build_call(PacketKind::RpcToAll, object_id, name, params);
        driver.broadcast(&packet, true);
        Ok(())
    }

    /// Decode and execute an inbound call.
    pub fn handle_packet(
        &mut self,
        from: SocketAddr,
        packet: &mut Packet,
        registry: &mut dyn ObjectRegistry,
    ) {
        let kind = packet.kind();
        let payload = packet.payload_mut();
        let (Ok(object_id), Ok(name)) = (payload.read_u32(), payload.read_string()) else {
            debug!("malformed rpc packet from {from}");
            return;
        };
        let mut params = ByteStream::from_bytes(payload.remaining_bytes());

        let Some(object) = registry.lookup_mut(object_id) else {
            warn!("rpc {name:?} targets unknown object {object_id}, from {from}");
            return;
        };
        let Some(entry) = self.functions.get_mut(&name) else {
            warn!("unregistered rpc {name:?} from {from}");
            return;
        };
        if entry.direction.packet_kind() != kind {
            warn!(
                "rpc {name:?} from {from} arrived as {kind:?}, registered {:?}",
                entry.direction
            );
            return;
        }

        (entry.handler)(object, &mut params);
    }

    fn build_call(kind: PacketKind, object_id: ObjectId, name: &str, params: &[u8]) -> Packet {
        let mut packet = Packet::new(kind);
        let payload = packet.payload_mut();
        payload.write_u32(object_id);
        payload.write_str(name);
        payload.write_bytes(params);
        packet
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{ObjectBase, World};
    use std::cell::Cell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Target {
        base: ObjectBase,
    }

    impl NetObject for Target {
        fn base(&self) -> &ObjectBase {
            &self.base
        }

        fn base_mut(&mut self) -> &mut ObjectBase {
            &mut self.base
        }

        fn type_name(&self) -> &str {
            "Target"
        }
    }

    fn from_addr() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 50000))
    }

    fn call_packet(kind: PacketKind, object_id: ObjectId, name: &str, params: &[u8]) -> Packet {
        RpcDispatcher::build_call(kind, object_id, name, params)
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut rpc = RpcDispatcher::new();
        rpc.register("fire", RpcDirection::ToHost, Box::new(|_, _| {}))
            .unwrap();
        let result = rpc.register("fire", RpcDirection::ToAll, Box::new(|_, _| {}));
        assert!(matches!(result, Err(RpcError::DuplicateName(name)) if name == "fire"));
    }

    #[test]
    fn test_dispatch_invokes_handler_with_params() {
        let mut world = World::new();
        let id = world.spawn(Box::new(Target::default()));
        let seen = Rc::new(Cell::new(0u32));

        let mut rpc = RpcDispatcher::new();
        let seen_in_handler = Rc::clone(&seen);
        rpc.register(
            "fire",
            RpcDirection::ToHost,
            Box::new(move |_, params| {
                seen_in_handler.set(params.read_u32().unwrap());
            }),
        )
        .unwrap();

        let mut params = ByteStream::new();
        params.write_u32(77);
        let mut packet = call_packet(PacketKind::RpcToHost, id, "fire", params.as_bytes());
        rpc.handle_packet(from_addr(), &mut packet, &mut world);

        assert_eq!(seen.get(), 77);
    }

    #[test]
    fn test_direction_mismatch_dropped() {
        let mut world = World::new();
        let id = world.spawn(Box::new(Target::default()));
        let fired = Rc::new(Cell::new(false));

        let mut rpc = RpcDispatcher::new();
        let fired_in_handler = Rc::clone(&fired);
        rpc.register(
            "fire",
            RpcDirection::ToHost,
            Box::new(move |_, _| fired_in_handler.set(true)),
        )
        .unwrap();

        // registered ToHost but arrives as a to-all packet
        let mut packet = call_packet(PacketKind::RpcToAll, id, "fire", &[]);
        rpc.handle_packet(from_addr(), &mut packet, &mut world);

        assert!(!fired.get());
    }

    #[test]
    fn test_unknown_object_dropped() {
        let mut world = World::new();
        let fired = Rc::new(Cell::new(false));

        let mut rpc = RpcDispatcher::new();
        let fired_in_handler = Rc::clone(&fired);
        rpc.register(
            "fire",
            RpcDirection::ToHost,
            Box::new(move |_, _| fired_in_handler.set(true)),
        )
        .unwrap();

        let mut packet = call_packet(PacketKind::RpcToHost, 42, "fire", &[]);
        rpc.handle_packet(from_addr(), &mut packet, &mut world);
        assert!(!fired.get());
    }

    #[test]
    fn test_unregistered_name_dropped() {
        let mut world = World::new();
        let id = world.spawn(Box::new(Target::default()));
        let mut rpc = RpcDispatcher::new();

        let mut packet = call_packet(PacketKind::RpcToHost, id, "ghost", &[]);
        // must not panic or execute anything
        rpc.handle_packet(from_addr(), &mut packet, &mut world);
    }

    #[test]
    fn test_call_roles_enforced() {
        let mut driver = NetDriver::inactive();
        let rpc = RpcDispatcher::new();

        assert!(matches!(
            rpc.call_to_host(&mut driver, 1, "fire", &[]),
            Err(RpcError::Net(NetError::WrongRole { .. }))
        ));
        assert!(matches!(
            rpc.call_to_all(&mut driver, 1, "fire", &[]),
            Err(RpcError::Net(NetError::WrongRole { .. }))
        ));
    }

    #[test]
    fn test_call_payload_layout() {
        let mut packet = call_packet(PacketKind::RpcToPeer, 9, "wave", &[1, 2, 3]);
        let payload = packet.payload_mut();
        assert_eq!(payload.read_u32().unwrap(), 9);
        assert_eq!(payload.read_string().unwrap(), "wave");
        assert_eq!(payload.remaining_bytes(), &[1, 2, 3]);
    }
}
