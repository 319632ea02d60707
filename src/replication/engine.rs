//! Delta-based state replication.
//!
//! The host side walks every (object, peer) pair once per replication
//! interval: a relevant object not yet announced to a peer gets a spawn
//! descriptor and a property snapshot; afterwards only properties whose
//! encoding differs from the snapshot go out, and the snapshot is advanced
//! to what was sent. The receiving side mirrors spawn, destroy, and update
//! packets into its object registry.

use std::collections::{BTreeSet, HashMap};
use std::net::SocketAddr;

use log::{debug, info, warn};

use super::property::{PropertyKind, PropertyValue};
use crate::core::NetRole;
use crate::core::constants::DEFAULT_RELEVANCY_DISTANCE;
use crate::transport::{NetDriver, Packet, PacketKind};
use crate::world::{NetObject, ObjectId, ObjectRegistry};

/// Relevance predicate deciding whether an object is replicated to a peer.
pub type RelevanceFn = Box<dyn Fn(&dyn NetObject, SocketAddr) -> bool>;

/// Per-(peer, object) replication bookkeeping.
#[derive(Debug, Default)]
struct MirrorState {
    /// Whether the object has been announced to the peer.
    spawned: bool,
    /// Last encoded value sent to the peer, per property name.
    snapshots: HashMap<String, Vec<u8>>,
}

/// Host-side delta replication and peer-side mirror maintenance.
pub struct ReplicationEngine {
    interval: f32,
    accumulator: f32,
    relevancy_distance: f32,
    relevance: Option<RelevanceFn>,
    objects: BTreeSet<ObjectId>,
    peers: HashMap<SocketAddr, HashMap<ObjectId, MirrorState>>,
}

impl ReplicationEngine {
    /// Engine replicating at `tick_rate` Hz.
    pub fn new(tick_rate: f32) -> Self {
        Self {
            interval: 1.0 / tick_rate,
            accumulator: 0.0,
            relevancy_distance: DEFAULT_RELEVANCY_DISTANCE,
            relevance: None,
            objects: BTreeSet::new(),
            peers: HashMap::new(),
        }
    }

    /// Change the replication tick rate.
    pub fn set_tick_rate(&mut self, tick_rate: f32) {
        self.interval = 1.0 / tick_rate;
    }

    /// Distance made available to custom relevance rules.
    pub fn relevancy_distance(&self) -> f32 {
        self.relevancy_distance
    }

    /// Set the distance made available to custom relevance rules.
    pub fn set_relevancy_distance(&mut self, distance: f32) {
        self.relevancy_distance = distance;
    }

    /// Install a relevance predicate. Without one, every object is relevant
    /// to every peer.
    pub fn set_relevance(&mut self, relevance: RelevanceFn) {
        self.relevance = Some(relevance);
    }

    /// Start replicating the object with the given id.
    pub fn register_object(&mut self, net_id: ObjectId) {
        self.objects.insert(net_id);
    }

    /// Stop replicating the object with the given id.
    ///
    /// Existing remote mirrors are left in place; use
    /// [`destroy_object`](Self::destroy_object) to also remove them.
    pub fn unregister_object(&mut self, net_id: ObjectId) {
        self.objects.remove(&net_id);
    }

    /// Whether the object with the given id is being replicated.
    pub fn is_registered(&self, net_id: ObjectId) -> bool {
        self.objects.contains(&net_id)
    }

    /// Drop all per-peer state for `addr`, typically on disconnect. A peer
    /// that reconnects starts from a clean slate and is re-announced.
    pub fn forget_peer(&mut self, addr: SocketAddr) {
        self.peers.remove(&addr);
    }

    /// Tear down an object's remote mirrors: a reliable destroy packet goes
    /// to every peer the object was announced to, and its per-peer state is
    /// cleared. The local object itself is untouched.
    pub fn destroy_object(&mut self, net_id: ObjectId, driver: &mut NetDriver) {
        self.objects.remove(&net_id);
        for (addr, mirrors) in &mut self.peers {
            let Some(state) = mirrors.remove(&net_id) else {
                continue;
            };
            if state.spawned {
                let mut packet = Packet::new(PacketKind::Destroy);
                packet.payload_mut().write_u32(net_id);
                if driver.send(*addr, packet, true).is_err() {
                    debug!("destroy of {net_id} not sent to {addr}");
                }
            }
        }
    }

    /// Advance the replication clock; on each interval boundary, replicate
    /// every registered object to every connected peer. Host role only.
    pub fn tick(&mut self, dt: f32, driver: &mut NetDriver, registry: &dyn ObjectRegistry) {
        if driver.role() != NetRole::Host {
            return;
        }

        self.accumulator += dt;
        if self.accumulator < self.interval {
            return;
        }
        self.accumulator = 0.0;

        let ids: Vec<ObjectId> = self.objects.iter().copied().collect();
        for addr in driver.connected_peers() {
            for &net_id in &ids {
                let Some(object) = registry.lookup(net_id) else {
                    continue;
                };
                if !object.replicates() {
                    continue;
                }
                let relevant = match &self.relevance {
                    Some(relevance) => relevance(object, addr),
                    None => true,
                };
                if !relevant {
                    continue;
                }

                let state = self
                    .peers
                    .entry(addr)
                    .or_default()
                    .entry(net_id)
                    .or_default();

                if !state.spawned {
                    Self::send_spawn(state, object, addr, driver);
                } else {
                    Self::send_update(state, object, addr, driver);
                }
            }
        }
    }

    /// Route an inbound replication packet to its handler.
    pub fn handle_packet(
        &mut self,
        from: SocketAddr,
        packet: &mut Packet,
        registry: &mut dyn ObjectRegistry,
    ) {
        match packet.kind() {
            PacketKind::Spawn => Self::handle_spawn(from, packet, registry),
            PacketKind::Destroy => Self::handle_destroy(packet, registry),
            PacketKind::Update => Self::handle_update(from, packet, registry),
            _ => {}
        }
    }

    fn send_spawn(
        state: &mut MirrorState,
        object: &dyn NetObject,
        addr: SocketAddr,
        driver: &mut NetDriver,
    ) {
        let net_id = object.net_id();
        let mut packet = Packet::new(PacketKind::Spawn);
        let payload = packet.payload_mut();
        payload.write_u32(net_id);
        payload.write_str(object.type_name());
        payload.write_vec3(object.position());
        payload.write_quat(object.rotation());

        if driver.send(addr, packet, true).is_ok() {
            state.spawned = true;
            // the spawn-time values are the baseline for future deltas
            state.snapshots = object
                .properties()
                .iter()
                .map(|entry| (entry.name().to_string(), entry.value().encode_to_vec()))
                .collect();
            debug!("announced object {net_id} to {addr}");
        }
    }

    fn send_update(
        state: &mut MirrorState,
        object: &dyn NetObject,
        addr: SocketAddr,
        driver: &mut NetDriver,
    ) {
        let mut changed: Vec<(&str, &PropertyValue, Vec<u8>)> = Vec::new();
        for entry in object.properties().iter() {
            let encoded = entry.value().encode_to_vec();
            if state.snapshots.get(entry.name()) != Some(&encoded) {
                changed.push((entry.name(), entry.value(), encoded));
            }
        }
        if changed.is_empty() {
            return;
        }

        let mut packet = Packet::new(PacketKind::Update);
        let payload = packet.payload_mut();
        payload.write_u32(object.net_id());
        payload.write_u32(changed.len() as u32);
        for (name, value, _) in &changed {
            payload.write_str(name);
            payload.write_u8(value.kind() as u8);
            value.encode(payload);
        }

        if driver.send(addr, packet, true).is_ok() {
            for (name, _, encoded) in changed {
                state.snapshots.insert(name.to_string(), encoded);
            }
        }
    }

    fn handle_spawn(from: SocketAddr, packet: &mut Packet, registry: &mut dyn ObjectRegistry) {
        let payload = packet.payload_mut();
        let (Ok(net_id), Ok(type_name)) = (payload.read_u32(), payload.read_string()) else {
            debug!("malformed spawn from {from}");
            return;
        };
        let (Ok(position), Ok(rotation)) = (payload.read_vec3(), payload.read_quat()) else {
            debug!("malformed spawn of {type_name:?} from {from}");
            return;
        };

        match registry.create_by_type(&type_name, net_id) {
            Some(object) => {
                object.set_position(position);
                object.set_rotation(rotation);
                object.set_replicates(true);
                info!("mirrored object {net_id} ({type_name})");
            }
            None => warn!("could not mirror object {net_id} of type {type_name:?}"),
        }
    }

    fn handle_destroy(packet: &mut Packet, registry: &mut dyn ObjectRegistry) {
        let Ok(net_id) = packet.payload_mut().read_u32() else {
            return;
        };
        if registry.destroy_by_id(net_id) {
            info!("removed mirrored object {net_id}");
        } else {
            debug!("destroy for unknown object {net_id}");
        }
    }

    fn handle_update(from: SocketAddr, packet: &mut Packet, registry: &mut dyn ObjectRegistry) {
        let payload = packet.payload_mut();
        let (Ok(net_id), Ok(count)) = (payload.read_u32(), payload.read_u32()) else {
            debug!("malformed update from {from}");
            return;
        };

        let mut object = registry.lookup_mut(net_id);
        if object.is_none() {
            warn!("update for unknown object {net_id} from {from}");
        }

        // each tag is read exactly once; unknown properties still consume
        // their value so the rest of the packet stays decodable
        for _ in 0..count {
            let (Ok(name), Ok(raw_kind)) = (payload.read_string(), payload.read_u8()) else {
                debug!("truncated update for object {net_id}");
                return;
            };
            let Some(kind) = PropertyKind::from_u8(raw_kind) else {
                debug!("unknown property kind {raw_kind} in update for object {net_id}");
                return;
            };
            let Ok(value) = PropertyValue::decode(kind, payload) else {
                debug!("truncated value for property {name:?} of object {net_id}");
                return;
            };

            if let Some(object) = object.as_deref_mut() {
                if !object.properties_mut().set(&name, value) {
                    debug!("object {net_id} has no property {name:?} of kind {kind:?}");
                }
            }
        }

        if let Some(object) = object {
            object.on_replicated();
        }
    }
}
