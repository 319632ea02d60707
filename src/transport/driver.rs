//! Connection-table driver: one transport handle multiplexed across peers.
//!
//! The driver owns the [`DatagramChannel`] and the single authoritative
//! table of [`Connection`]s keyed by endpoint. One `tick` per frame runs the
//! bounded receive loop, advances every connection's clock, flushes queued
//! traffic, and (in the host role) evicts silent peers. Control packets are
//! consumed here; everything else surfaces as a [`NetEvent`].

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;

use log::{debug, info, trace, warn};

use super::connection::{Connection, ConnectionState};
use super::packet::{Packet, PacketKind};
use super::socket::{DatagramChannel, RECV_BUFFER_SIZE, UdpChannel};
use crate::codec::ByteStream;
use crate::core::constants::{
    DEFAULT_CONNECTION_TIMEOUT, DEFAULT_MAX_CONNECTIONS, MAX_RECEIVES_PER_TICK,
};
use crate::core::{NetError, NetRole};

/// Event surfaced by the driver to the layer above.
#[derive(Debug)]
pub enum NetEvent {
    /// A connection reached the `Connected` state.
    PeerConnected(SocketAddr),
    /// A connection was removed: peer disconnect, forced kick, or timeout.
    PeerDisconnected(SocketAddr),
    /// The remote host denied our connect attempt; terminal for the attempt.
    ConnectDenied(SocketAddr),
    /// A non-control packet arrived on an established connection.
    Packet {
        /// Endpoint the packet came from.
        from: SocketAddr,
        /// The decoded packet.
        packet: Packet,
    },
}

/// Owns the transport handle and the connection table.
pub struct NetDriver {
    role: NetRole,
    channel: Option<Box<dyn DatagramChannel>>,
    connections: HashMap<SocketAddr, Connection>,
    max_connections: usize,
    connection_timeout: f32,
    remote: Option<SocketAddr>,
    events: VecDeque<NetEvent>,
}

impl NetDriver {
    /// Driver with no transport; every tick is a no-op.
    pub fn inactive() -> Self {
        Self {
            role: NetRole::Inactive,
            channel: None,
            connections: HashMap::new(),
            max_connections: 0,
            connection_timeout: DEFAULT_CONNECTION_TIMEOUT,
            remote: None,
            events: VecDeque::new(),
        }
    }

    /// Bind `port` and listen for up to `max_connections` peers.
    pub fn listen(port: u16, max_connections: usize) -> Result<Self, NetError> {
        let channel = UdpChannel::bind(port)?;
        info!("listening on port {port}, capacity {max_connections}");
        Ok(Self {
            role: NetRole::Host,
            channel: Some(Box::new(channel)),
            max_connections,
            ..Self::inactive()
        })
    }

    /// Bind an ephemeral port for dialing out.
    pub fn dial() -> Result<Self, NetError> {
        let channel = UdpChannel::bind(0)?;
        Ok(Self {
            role: NetRole::Peer,
            channel: Some(Box::new(channel)),
            ..Self::inactive()
        })
    }

    /// Driver over an injected transport, for tests and custom channels.
    pub fn with_channel(role: NetRole, channel: Box<dyn DatagramChannel>) -> Self {
        Self {
            role,
            channel: Some(channel),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            ..Self::inactive()
        }
    }

    /// The driver's role.
    pub fn role(&self) -> NetRole {
        self.role
    }

    /// The address of the host this driver dialed, if any.
    pub fn remote(&self) -> Option<SocketAddr> {
        self.remote
    }

    /// The transport's local address.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.channel.as_ref()?.local_addr().ok()
    }

    /// Number of connections in the table, in any state.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Set the capacity used when accepting connect requests.
    pub fn set_max_connections(&mut self, max_connections: usize) {
        self.max_connections = max_connections;
    }

    /// Set the silence threshold for the timeout sweep.
    pub fn set_connection_timeout(&mut self, timeout: f32) {
        self.connection_timeout = timeout;
    }

    /// Look up the connection for `addr`.
    pub fn connection(&self, addr: SocketAddr) -> Option<&Connection> {
        self.connections.get(&addr)
    }

    /// Mutable lookup of the connection for `addr`.
    pub fn connection_mut(&mut self, addr: SocketAddr) -> Option<&mut Connection> {
        self.connections.get_mut(&addr)
    }

    /// Endpoints of every connection currently in the `Connected` state.
    pub fn connected_peers(&self) -> Vec<SocketAddr> {
        self.connections
            .iter()
            .filter(|(_, conn)| conn.state() == ConnectionState::Connected)
            .map(|(addr, _)| *addr)
            .collect()
    }

    /// Initiate a connection to `addr` (peer role).
    ///
    /// Queues a reliable connect request; the outcome arrives later as a
    /// [`NetEvent::PeerConnected`] or [`NetEvent::ConnectDenied`].
    pub fn connect(&mut self, addr: SocketAddr) -> Result<(), NetError> {
        if self.role != NetRole::Peer {
            return Err(NetError::WrongRole {
                expected: NetRole::Peer,
                actual: self.role,
            });
        }
        if self.channel.is_none() {
            return Err(NetError::ChannelClosed);
        }

        let conn = self
            .connections
            .entry(addr)
            .or_insert_with(|| Connection::new(addr));
        conn.send(Packet::new(PacketKind::ConnectRequest), true);
        self.remote = Some(addr);
        info!("connecting to {addr}");
        Ok(())
    }

    /// Queue `packet` on the connection for `addr`.
    pub fn send(
        &mut self,
        addr: SocketAddr,
        packet: Packet,
        reliable: bool,
    ) -> Result<(), NetError> {
        match self.connections.get_mut(&addr) {
            Some(conn) => {
                conn.send(packet, reliable);
                Ok(())
            }
            None => Err(NetError::NotConnected(addr)),
        }
    }

    /// Queue a copy of `packet` on every connection in the `Connected` state.
    pub fn broadcast(&mut self, packet: &Packet, reliable: bool) {
        for conn in self.connections.values_mut() {
            if conn.state() == ConnectionState::Connected {
                conn.send(packet.clone(), reliable);
            }
        }
    }

    /// Drive one frame: receive burst, per-connection clocks, flush, and
    /// (host role) the timeout sweep.
    pub fn tick(&mut self, dt: f32) {
        if self.channel.is_none() {
            return;
        }

        self.receive_burst();
        for conn in self.connections.values_mut() {
            conn.tick(dt);
        }
        self.flush_all();
        if self.role == NetRole::Host {
            self.sweep_timeouts();
        }
    }

    /// Drain the events produced since the last call.
    pub fn drain_events(&mut self) -> VecDeque<NetEvent> {
        std::mem::take(&mut self.events)
    }

    /// Forcibly disconnect `addr`: best-effort notice, event, removal.
    pub fn disconnect(&mut self, addr: SocketAddr) {
        let Some(mut conn) = self.connections.remove(&addr) else {
            return;
        };
        conn.set_state(ConnectionState::Disconnecting);
        self.send_control(PacketKind::Disconnect, conn.take_sequence(), addr);
        conn.set_state(ConnectionState::Disconnected);

        if self.remote == Some(addr) {
            self.remote = None;
        }
        self.events.push_back(NetEvent::PeerDisconnected(addr));
        info!("disconnected {addr}");
    }

    /// Shut down: best-effort disconnect notice to every connected peer,
    /// clear the table, close the transport.
    pub fn shutdown(&mut self) {
        let connected: Vec<SocketAddr> = self.connected_peers();
        for addr in connected {
            let sequence = self
                .connections
                .get_mut(&addr)
                .map(|conn| conn.take_sequence())
                .unwrap_or(0);
            self.send_control(PacketKind::Disconnect, sequence, addr);
        }

        self.connections.clear();
        self.remote = None;
        self.channel = None;
        self.role = NetRole::Inactive;
        info!("driver shut down");
    }

    fn receive_burst(&mut self) {
        let mut buf = [0u8; RECV_BUFFER_SIZE];

        for _ in 0..MAX_RECEIVES_PER_TICK {
            let received = match &self.channel {
                Some(channel) => channel.recv_from(&mut buf),
                None => return,
            };
            let (len, from) = match received {
                Ok(Some(datagram)) => datagram,
                Ok(None) => break,
                Err(err) => {
                    debug!("transport receive failed: {err}");
                    break;
                }
            };

            let mut stream = ByteStream::from_bytes(&buf[..len]);
            let packet = match Packet::deserialize(&mut stream) {
                Ok(packet) => packet,
                Err(err) => {
                    debug!("dropping malformed datagram from {from}: {err}");
                    continue;
                }
            };

            self.handle_packet(from, packet);
        }
    }

    fn handle_packet(&mut self, from: SocketAddr, mut packet: Packet) {
        match packet.kind() {
            PacketKind::ConnectRequest => {
                if self.role == NetRole::Host {
                    self.handle_connect_request(from);
                }
            }
            PacketKind::ConnectAccept => {
                if self.role == NetRole::Peer && self.remote == Some(from) {
                    if let Some(conn) = self.connections.get_mut(&from) {
                        if conn.state() == ConnectionState::Connecting {
                            conn.set_state(ConnectionState::Connected);
                            info!("connected to {from}");
                            self.events.push_back(NetEvent::PeerConnected(from));
                        }
                    }
                }
            }
            PacketKind::ConnectDeny => {
                if self.role == NetRole::Peer && self.remote == Some(from) {
                    warn!("connection denied by {from}");
                    self.connections.remove(&from);
                    self.remote = None;
                    self.events.push_back(NetEvent::ConnectDenied(from));
                }
            }
            PacketKind::Disconnect => {
                if self.connections.remove(&from).is_some() {
                    info!("{from} disconnected");
                    if self.remote == Some(from) {
                        self.remote = None;
                    }
                    self.events.push_back(NetEvent::PeerDisconnected(from));
                }
            }
            _ => {
                let Some(conn) = self.connections.get_mut(&from) else {
                    trace!("dropping packet from unknown endpoint {from}");
                    return;
                };
                conn.receive(&mut packet);
                self.events.push_back(NetEvent::Packet { from, packet });
            }
        }
    }

    fn handle_connect_request(&mut self, from: SocketAddr) {
        // duplicate requests from a known endpoint are idempotent
        if self.connections.contains_key(&from) {
            debug!("duplicate connect request from {from}");
            return;
        }

        if self.connections.len() >= self.max_connections {
            warn!("denying connect request from {from}: table full");
            self.send_control(PacketKind::ConnectDeny, 0, from);
            return;
        }

        let mut conn = Connection::new(from);
        conn.set_state(ConnectionState::Connected);
        conn.send(Packet::new(PacketKind::ConnectAccept), true);
        self.connections.insert(from, conn);

        info!("peer connected: {from}");
        self.events.push_back(NetEvent::PeerConnected(from));
    }

    /// Serialize one control packet straight to the transport, bypassing
    /// connection queues. Used for deny responses and farewell notices whose
    /// connection is gone or was never created.
    fn send_control(&self, kind: PacketKind, sequence: u32, addr: SocketAddr) {
        let Some(channel) = self.channel.as_deref() else {
            return;
        };
        let mut packet = Packet::new(kind);
        packet.set_sequence(sequence);
        let mut wire = ByteStream::with_capacity(packet.wire_size());
        packet.serialize(&mut wire);
        if let Err(err) = channel.send_to(wire.as_bytes(), addr) {
            debug!("control send to {addr} failed: {err}");
        }
    }

    fn flush_all(&mut self) {
        let Some(channel) = self.channel.as_deref() else {
            return;
        };
        for conn in self.connections.values_mut() {
            conn.flush(channel);
        }
    }

    fn sweep_timeouts(&mut self) {
        let timed_out: Vec<SocketAddr> = self
            .connections
            .iter()
            .filter(|(_, conn)| conn.is_timed_out(self.connection_timeout))
            .map(|(addr, _)| *addr)
            .collect();

        for addr in timed_out {
            warn!("connection timed out: {addr}");
            self.disconnect(addr);
        }
    }
}
