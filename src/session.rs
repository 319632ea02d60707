//! Top-level session context.
//!
//! A [`NetSession`] owns the driver, the replication engine, and the RPC
//! dispatcher, wired together from one [`NetConfig`]. Nothing is global;
//! independent sessions coexist in one process, which is how the tests run
//! a host and a peer side by side.

use std::collections::VecDeque;
use std::net::SocketAddr;

use log::trace;

use crate::core::{NetConfig, NetError, NetRole, RpcError};
use crate::replication::ReplicationEngine;
use crate::rpc::{RpcDirection, RpcDispatcher, RpcHandler};
use crate::transport::{DatagramChannel, NetDriver, NetEvent, PacketKind};
use crate::world::{ObjectId, ObjectRegistry};

/// Connection lifecycle event surfaced to the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// A peer connected (host role), or the host accepted us (peer role).
    PeerConnected(SocketAddr),
    /// A connection ended: disconnect, kick, or timeout.
    PeerDisconnected(SocketAddr),
    /// The host denied our connect attempt.
    ConnectDenied(SocketAddr),
}

/// Driver, replication engine, and RPC dispatch behind one tick call.
pub struct NetSession {
    config: NetConfig,
    driver: NetDriver,
    replication: ReplicationEngine,
    rpc: RpcDispatcher,
    events: VecDeque<SessionEvent>,
}

impl NetSession {
    /// Build a session from `config`, binding the UDP transport for its
    /// role. A peer session also initiates its connect attempt here.
    pub fn new(config: NetConfig) -> Result<Self, NetError> {
        let driver = match config.role {
            NetRole::Host => NetDriver::listen(config.listen_port, config.max_connections)?,
            NetRole::Peer => NetDriver::dial()?,
            NetRole::Inactive => NetDriver::inactive(),
        };
        Self::with_driver(config, driver)
    }

    /// Build a session over an injected transport, for tests and custom
    /// channels.
    pub fn with_channel(
        config: NetConfig,
        channel: Box<dyn DatagramChannel>,
    ) -> Result<Self, NetError> {
        let mut driver = NetDriver::with_channel(config.role, channel);
        driver.set_max_connections(config.max_connections);
        Self::with_driver(config, driver)
    }

    fn with_driver(config: NetConfig, mut driver: NetDriver) -> Result<Self, NetError> {
        driver.set_connection_timeout(config.connection_timeout);
        if config.role == NetRole::Peer {
            let remote = config
                .remote_addr
                .ok_or_else(|| NetError::Config("peer role requires a remote address".into()))?;
            driver.connect(remote)?;
        }

        let mut replication = ReplicationEngine::new(config.tick_rate);
        replication.set_relevancy_distance(config.relevancy_distance);

        Ok(Self {
            config,
            driver,
            replication,
            rpc: RpcDispatcher::new(),
            events: VecDeque::new(),
        })
    }

    /// The configuration the session was built from.
    pub fn config(&self) -> &NetConfig {
        &self.config
    }

    /// The underlying driver.
    pub fn driver(&self) -> &NetDriver {
        &self.driver
    }

    /// Mutable access to the underlying driver.
    pub fn driver_mut(&mut self) -> &mut NetDriver {
        &mut self.driver
    }

    /// The replication engine.
    pub fn replication(&self) -> &ReplicationEngine {
        &self.replication
    }

    /// Mutable access to the replication engine.
    pub fn replication_mut(&mut self) -> &mut ReplicationEngine {
        &mut self.replication
    }

    /// Next pending session event, oldest first.
    pub fn poll_event(&mut self) -> Option<SessionEvent> {
        self.events.pop_front()
    }

    /// Register a remote procedure with its direction and handler.
    pub fn register_rpc(
        &mut self,
        name: &str,
        direction: RpcDirection,
        handler: RpcHandler,
    ) -> Result<(), RpcError> {
        self.rpc.register(name, direction, handler)
    }

    /// Invoke a procedure on the host (peer role).
    pub fn call_rpc_to_host(
        &mut self,
        object_id: ObjectId,
        name: &str,
        params: &[u8],
    ) -> Result<(), RpcError> {
        self.rpc
            .call_to_host(&mut self.driver, object_id, name, params)
    }

    /// Invoke a procedure on one peer (host role).
    pub fn call_rpc_to_peer(
        &mut self,
        peer: SocketAddr,
        object_id: ObjectId,
        name: &str,
        params: &[u8],
    ) -> Result<(), RpcError> {
        self.rpc
            .call_to_peer(&mut self.driver, peer, object_id, name, params)
    }

    /// Invoke a procedure on every connected peer (host role).
    pub fn call_rpc_to_all(
        &mut self,
        object_id: ObjectId,
        name: &str,
        params: &[u8],
    ) -> Result<(), RpcError> {
        self.rpc.call_to_all(&mut self.driver, object_id, name, params)
    }

    /// Destroy an object everywhere: remote mirrors are torn down through
    /// the replication engine, then the local object leaves the registry.
    pub fn destroy_object(&mut self, net_id: ObjectId, registry: &mut dyn ObjectRegistry) {
        self.replication.destroy_object(net_id, &mut self.driver);
        registry.destroy_by_id(net_id);
    }

    /// Drive one frame.
    ///
    /// Runs the driver's receive/flush cycle, routes replication and RPC
    /// packets to their handlers, surfaces lifecycle events, and (host role)
    /// registers replicable objects and runs the replication interval.
    pub fn tick(&mut self, dt: f32, registry: &mut dyn ObjectRegistry) {
        self.driver.tick(dt);

        for event in self.driver.drain_events() {
            match event {
                NetEvent::Packet { from, mut packet } => match packet.kind() {
                    PacketKind::Spawn | PacketKind::Destroy | PacketKind::Update => {
                        self.replication.handle_packet(from, &mut packet, registry);
                    }
                    PacketKind::RpcToHost | PacketKind::RpcToPeer | PacketKind::RpcToAll => {
                        self.rpc.handle_packet(from, &mut packet, registry);
                    }
                    PacketKind::Ack | PacketKind::Heartbeat => {}
                    other => trace!("unhandled packet kind {other:?} from {from}"),
                },
                NetEvent::PeerConnected(addr) => {
                    self.events.push_back(SessionEvent::PeerConnected(addr));
                }
                NetEvent::PeerDisconnected(addr) => {
                    self.replication.forget_peer(addr);
                    self.events.push_back(SessionEvent::PeerDisconnected(addr));
                }
                NetEvent::ConnectDenied(addr) => {
                    self.events.push_back(SessionEvent::ConnectDenied(addr));
                }
            }
        }

        if self.driver.role() == NetRole::Host {
            for net_id in registry.ids() {
                let replicates = registry
                    .lookup(net_id)
                    .map(|object| object.replicates())
                    .unwrap_or(false);
                if replicates {
                    self.replication.register_object(net_id);
                }
            }
            self.replication.tick(dt, &mut self.driver, registry);
        }
    }

    /// Best-effort farewell to every connected peer, then release all
    /// connection state and close the transport.
    pub fn shutdown(&mut self) {
        self.driver.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryHub;
    use crate::world::World;

    #[test]
    fn test_peer_config_requires_remote() {
        let hub = MemoryHub::new();
        let config = NetConfig {
            role: NetRole::Peer,
            remote_addr: None,
            ..NetConfig::default()
        };
        let result = NetSession::with_channel(config, Box::new(hub.bind(0)));
        assert!(matches!(result, Err(NetError::Config(_))));
    }

    #[test]
    fn test_inactive_session_ticks_are_noops() {
        let mut session = NetSession::new(NetConfig::default()).unwrap();
        let mut world = World::new();
        session.tick(0.016, &mut world);
        assert!(session.poll_event().is_none());
    }

    #[test]
    fn test_duplicate_rpc_rejected_through_session() {
        let mut session = NetSession::new(NetConfig::default()).unwrap();
        session
            .register_rpc("fire", RpcDirection::ToHost, Box::new(|_, _| {}))
            .unwrap();
        assert!(
            session
                .register_rpc("fire", RpcDirection::ToHost, Box::new(|_, _| {}))
                .is_err()
        );
    }
}
