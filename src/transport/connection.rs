//! Per-peer connection state: reliability bookkeeping and timing.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;

use log::debug;

use super::packet::{Packet, PacketKind};
use super::socket::DatagramChannel;
use crate::codec::ByteStream;
use crate::core::constants::{HEARTBEAT_INTERVAL, RTT_SMOOTHING};

/// Connection lifecycle state.
///
/// `Disconnected` is terminal; the connection is removed from the owning
/// table and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Connect request sent, waiting for accept or deny.
    Connecting,
    /// Connection established, traffic flowing.
    Connected,
    /// Farewell notice going out.
    Disconnecting,
    /// Connection closed.
    Disconnected,
}

/// Running traffic counters for one connection.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConnectionStats {
    /// Packets handed to the transport.
    pub packets_sent: u64,
    /// Packets received and processed.
    pub packets_received: u64,
    /// Bytes handed to the transport.
    pub bytes_sent: u64,
    /// Bytes received and processed.
    pub bytes_received: u64,
}

/// Reliability and timing state for one remote endpoint.
///
/// Outgoing sequence numbers are strictly increasing and never reused.
/// Reliable packets are retained until acknowledged; there is no
/// retransmission, retention exists so acknowledgments can clean up and
/// feed the round-trip estimate.
#[derive(Debug)]
pub struct Connection {
    addr: SocketAddr,
    state: ConnectionState,
    outgoing_sequence: u32,
    incoming_sequence: u32,
    retained: HashMap<u32, Packet>,
    outgoing: VecDeque<Packet>,
    current_time: f32,
    last_send_time: f32,
    last_receive_time: f32,
    rtt: f32,
    user_tag: Option<u64>,
    stats: ConnectionStats,
}

impl Connection {
    /// Create a connection to `addr` in the `Connecting` state.
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            state: ConnectionState::Connecting,
            outgoing_sequence: 0,
            incoming_sequence: 0,
            retained: HashMap::new(),
            outgoing: VecDeque::new(),
            current_time: 0.0,
            last_send_time: 0.0,
            last_receive_time: 0.0,
            rtt: 0.0,
            user_tag: None,
            stats: ConnectionStats::default(),
        }
    }

    /// Remote endpoint address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Set the lifecycle state.
    pub fn set_state(&mut self, state: ConnectionState) {
        self.state = state;
    }

    /// Highest sequence number observed from the remote endpoint.
    pub fn incoming_sequence(&self) -> u32 {
        self.incoming_sequence
    }

    /// Smoothed round-trip estimate in seconds.
    pub fn rtt(&self) -> f32 {
        self.rtt
    }

    /// Opaque tag linking this connection to an application object.
    pub fn user_tag(&self) -> Option<u64> {
        self.user_tag
    }

    /// Attach an opaque tag to this connection.
    pub fn set_user_tag(&mut self, tag: Option<u64>) {
        self.user_tag = tag;
    }

    /// Traffic counters.
    pub fn stats(&self) -> ConnectionStats {
        self.stats
    }

    /// Number of reliable packets awaiting acknowledgment.
    pub fn retained_len(&self) -> usize {
        self.retained.len()
    }

    /// Number of packets queued but not yet flushed.
    pub fn queued_len(&self) -> usize {
        self.outgoing.len()
    }

    /// Seconds since the last packet arrived from the remote endpoint.
    pub fn time_since_last_receive(&self) -> f32 {
        self.current_time - self.last_receive_time
    }

    /// Whether the remote endpoint has been silent longer than `timeout`.
    pub fn is_timed_out(&self, timeout: f32) -> bool {
        self.time_since_last_receive() > timeout
    }

    pub(crate) fn take_sequence(&mut self) -> u32 {
        let sequence = self.outgoing_sequence;
        self.outgoing_sequence = self.outgoing_sequence.saturating_add(1);
        sequence
    }

    /// Queue `packet` for sending, assigning the next sequence number.
    ///
    /// A reliable packet is also retained, keyed by sequence, until the
    /// matching acknowledgment arrives.
    pub fn send(&mut self, mut packet: Packet, reliable: bool) {
        packet.set_sequence(self.take_sequence());
        if reliable {
            self.retained.insert(packet.sequence(), packet.clone());
        }
        self.outgoing.push_back(packet);
    }

    /// Serialize and send queued packets in FIFO order.
    ///
    /// Stops on the first would-block from the channel; unsent packets stay
    /// at the head of the queue for the next flush. Channel errors are not
    /// fatal to the connection.
    pub fn flush(&mut self, channel: &dyn DatagramChannel) {
        while let Some(packet) = self.outgoing.front() {
            let mut wire = ByteStream::with_capacity(packet.wire_size());
            packet.serialize(&mut wire);

            match channel.send_to(wire.as_bytes(), self.addr) {
                Ok(Some(sent)) => {
                    self.stats.packets_sent += 1;
                    self.stats.bytes_sent += sent as u64;
                    self.last_send_time = self.current_time;
                    self.outgoing.pop_front();
                }
                Ok(None) => break,
                Err(err) => {
                    debug!("send to {} failed: {err}", self.addr);
                    break;
                }
            }
        }
    }

    /// Process a packet that arrived from the remote endpoint.
    ///
    /// Updates receive timing and the highest-seen sequence, synthesizes an
    /// unreliable acknowledgment for anything that is not itself an ack or a
    /// heartbeat, and lets acknowledgments clean the retained set.
    pub fn receive(&mut self, packet: &mut Packet) {
        self.last_receive_time = self.current_time;
        self.stats.packets_received += 1;
        self.stats.bytes_received += packet.wire_size() as u64;

        let sequence = packet.sequence();
        if sequence > self.incoming_sequence {
            self.incoming_sequence = sequence;
        }

        let kind = packet.kind();
        if kind != PacketKind::Ack && kind != PacketKind::Heartbeat {
            self.send(Packet::ack(sequence), false);
        }
        if kind == PacketKind::Ack {
            self.process_ack(packet);
        }
    }

    /// Advance the connection clock; emits a heartbeat when a connected
    /// endpoint has been send-idle for longer than the heartbeat interval.
    pub fn tick(&mut self, dt: f32) {
        self.current_time += dt;

        if self.state == ConnectionState::Connected
            && self.outgoing.is_empty()
            && self.current_time - self.last_send_time >= HEARTBEAT_INTERVAL
        {
            self.send(Packet::new(PacketKind::Heartbeat), false);
        }
    }

    fn process_ack(&mut self, packet: &mut Packet) {
        let Ok(acked) = packet.payload_mut().read_u32() else {
            debug!("malformed ack from {}", self.addr);
            return;
        };
        if self.retained.remove(&acked).is_some() {
            let sample = self.current_time - self.last_send_time;
            self.rtt = self.rtt * RTT_SMOOTHING + sample * (1.0 - RTT_SMOOTHING);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::socket::MemoryHub;

    fn test_addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    #[test]
    fn test_sequence_monotonicity() {
        let mut conn = Connection::new(test_addr(9000));

        let mut previous = None;
        for _ in 0..100 {
            conn.send(Packet::new(PacketKind::Heartbeat), false);
            let sequence = conn.outgoing.back().unwrap().sequence();
            if let Some(previous) = previous {
                assert!(sequence > previous);
            }
            previous = Some(sequence);
        }
    }

    #[test]
    fn test_reliable_retention_and_ack_cleanup() {
        let mut conn = Connection::new(test_addr(9000));

        conn.send(Packet::new(PacketKind::Spawn), true);
        conn.send(Packet::new(PacketKind::Update), true);
        assert_eq!(conn.retained_len(), 2);

        let first = conn.outgoing.front().unwrap().sequence();
        let mut ack = Packet::ack(first);
        conn.receive(&mut ack);

        // exactly the acked record is gone
        assert_eq!(conn.retained_len(), 1);
        assert!(!conn.retained.contains_key(&first));
    }

    #[test]
    fn test_unreliable_send_not_retained() {
        let mut conn = Connection::new(test_addr(9000));
        conn.send(Packet::new(PacketKind::Update), false);
        assert_eq!(conn.retained_len(), 0);
        assert_eq!(conn.queued_len(), 1);
    }

    #[test]
    fn test_receive_synthesizes_ack() {
        let mut conn = Connection::new(test_addr(9000));

        let mut incoming = Packet::new(PacketKind::Update);
        incoming.set_sequence(5);
        conn.receive(&mut incoming);

        assert_eq!(conn.queued_len(), 1);
        let mut ack = conn.outgoing.pop_front().unwrap();
        assert_eq!(ack.kind(), PacketKind::Ack);
        assert_eq!(ack.payload_mut().read_u32().unwrap(), 5);
    }

    #[test]
    fn test_no_ack_for_ack_or_heartbeat() {
        let mut conn = Connection::new(test_addr(9000));

        let mut heartbeat = Packet::new(PacketKind::Heartbeat);
        conn.receive(&mut heartbeat);
        let mut ack = Packet::ack(0);
        conn.receive(&mut ack);

        assert_eq!(conn.queued_len(), 0);
    }

    #[test]
    fn test_incoming_sequence_keeps_maximum() {
        let mut conn = Connection::new(test_addr(9000));

        for sequence in [3, 7, 5] {
            let mut packet = Packet::new(PacketKind::Heartbeat);
            packet.set_sequence(sequence);
            conn.receive(&mut packet);
        }
        assert_eq!(conn.incoming_sequence(), 7);
    }

    #[test]
    fn test_rtt_moving_average() {
        let mut conn = Connection::new(test_addr(9000));

        conn.send(Packet::new(PacketKind::Update), true);
        let sequence = conn.outgoing.front().unwrap().sequence();
        conn.outgoing.clear();

        // pretend the packet left at t=0 and the ack arrived at t=0.2
        conn.tick(0.2);
        let mut ack = Packet::ack(sequence);
        conn.receive(&mut ack);

        // 0.9 * 0.0 + 0.1 * 0.2
        assert!((conn.rtt() - 0.02).abs() < 1e-6);
    }

    #[test]
    fn test_timeout_threshold() {
        let mut conn = Connection::new(test_addr(9000));

        conn.tick(5.0);
        assert!(!conn.is_timed_out(10.0));
        conn.tick(6.0);
        assert!(conn.is_timed_out(10.0));

        let mut packet = Packet::new(PacketKind::Heartbeat);
        conn.receive(&mut packet);
        assert!(!conn.is_timed_out(10.0));
    }

    #[test]
    fn test_heartbeat_on_idle_connected() {
        let mut conn = Connection::new(test_addr(9000));
        conn.set_state(ConnectionState::Connected);

        conn.tick(HEARTBEAT_INTERVAL + 0.1);
        assert_eq!(conn.queued_len(), 1);
        assert_eq!(conn.outgoing.front().unwrap().kind(), PacketKind::Heartbeat);
    }

    #[test]
    fn test_no_heartbeat_while_connecting() {
        let mut conn = Connection::new(test_addr(9000));
        conn.tick(HEARTBEAT_INTERVAL * 3.0);
        assert_eq!(conn.queued_len(), 0);
    }

    #[test]
    fn test_user_tag_links_application_object() {
        let mut conn = Connection::new(test_addr(9000));
        assert_eq!(conn.user_tag(), None);

        conn.set_user_tag(Some(17));
        assert_eq!(conn.user_tag(), Some(17));
        conn.set_user_tag(None);
        assert_eq!(conn.user_tag(), None);
    }

    #[test]
    fn test_flush_sends_fifo_and_counts() {
        let hub = MemoryHub::new();
        let sender = hub.bind(0);
        let receiver = hub.bind(0);
        let receiver_addr = receiver.local_addr().unwrap();

        let mut conn = Connection::new(receiver_addr);
        conn.send(Packet::new(PacketKind::ConnectRequest), true);
        conn.send(Packet::new(PacketKind::Heartbeat), false);
        conn.flush(&sender);

        assert_eq!(conn.queued_len(), 0);
        assert_eq!(conn.stats().packets_sent, 2);

        let mut buf = [0u8; 128];
        let (len, _) = receiver.recv_from(&mut buf).unwrap().unwrap();
        let mut wire = ByteStream::from_bytes(&buf[..len]);
        let first = Packet::deserialize(&mut wire).unwrap();
        assert_eq!(first.kind(), PacketKind::ConnectRequest);
    }
}
