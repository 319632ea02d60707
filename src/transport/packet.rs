//! Packet model: fixed 12-byte header plus an opaque codec buffer as body.
//!
//! Wire layout (little-endian):
//! ```text
//! +0   Magic          (4 bytes, "TETH")
//! +4   Sequence       (4 bytes)
//! +8   Type code      (2 bytes)
//! +10  Payload length (2 bytes)
//! +12  Payload        (variable)
//! ```

use crate::codec::ByteStream;
use crate::core::PacketError;
use crate::core::constants::{PACKET_HEADER_SIZE, PACKET_MAGIC};

/// Packet type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum PacketKind {
    /// Peer asks a host to open a connection.
    ConnectRequest = 0,
    /// Host accepts a connect request.
    ConnectAccept = 1,
    /// Host denies a connect request (table full).
    ConnectDeny = 2,
    /// Either side announces it is leaving.
    Disconnect = 3,

    /// Acknowledgment of a received sequence number.
    Ack = 10,
    /// Keepalive carrying no payload.
    Heartbeat = 11,

    /// Host instructs a peer to instantiate a mirrored object.
    Spawn = 20,
    /// Host instructs a peer to remove a mirrored object.
    Destroy = 21,
    /// Delta update for a mirrored object's properties.
    Update = 22,

    /// Remote procedure call addressed to the host.
    RpcToHost = 30,
    /// Remote procedure call addressed to one peer.
    RpcToPeer = 31,
    /// Remote procedure call addressed to every peer.
    RpcToAll = 32,
}

impl PacketKind {
    /// Map a wire type code back to a kind.
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0 => Some(Self::ConnectRequest),
            1 => Some(Self::ConnectAccept),
            2 => Some(Self::ConnectDeny),
            3 => Some(Self::Disconnect),
            10 => Some(Self::Ack),
            11 => Some(Self::Heartbeat),
            20 => Some(Self::Spawn),
            21 => Some(Self::Destroy),
            22 => Some(Self::Update),
            30 => Some(Self::RpcToHost),
            31 => Some(Self::RpcToPeer),
            32 => Some(Self::RpcToAll),
            _ => None,
        }
    }

    /// Whether the driver handles this kind itself instead of routing it up.
    pub fn is_control(self) -> bool {
        matches!(
            self,
            Self::ConnectRequest | Self::ConnectAccept | Self::ConnectDeny | Self::Disconnect
        )
    }
}

/// Fixed packet header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    /// Per-connection sequence number.
    pub sequence: u32,
    /// Packet type code.
    pub kind: PacketKind,
    /// Payload length declared on the wire; recomputed at serialization.
    pub payload_len: u16,
}

impl PacketHeader {
    fn decode(stream: &mut ByteStream) -> Result<Self, PacketError> {
        let magic = stream.read_u32()?;
        let sequence = stream.read_u32()?;
        let raw_kind = stream.read_u16()?;
        let payload_len = stream.read_u16()?;

        if magic != PACKET_MAGIC {
            return Err(PacketError::BadMagic { actual: magic });
        }
        let kind = PacketKind::from_u16(raw_kind).ok_or(PacketError::UnknownKind(raw_kind))?;

        Ok(Self {
            sequence,
            kind,
            payload_len,
        })
    }
}

/// One network packet: header plus payload stream.
#[derive(Debug, Clone)]
pub struct Packet {
    header: PacketHeader,
    payload: ByteStream,
}

impl Packet {
    /// Create an empty packet of the given kind.
    pub fn new(kind: PacketKind) -> Self {
        Self {
            header: PacketHeader {
                sequence: 0,
                kind,
                payload_len: 0,
            },
            payload: ByteStream::new(),
        }
    }

    /// Create an acknowledgment packet referencing `acked_sequence`.
    pub fn ack(acked_sequence: u32) -> Self {
        let mut packet = Self::new(PacketKind::Ack);
        packet.payload.write_u32(acked_sequence);
        packet
    }

    /// The packet's kind.
    pub fn kind(&self) -> PacketKind {
        self.header.kind
    }

    /// The packet's sequence number.
    pub fn sequence(&self) -> u32 {
        self.header.sequence
    }

    /// Assign the sequence number; done by the owning connection at send time.
    pub fn set_sequence(&mut self, sequence: u32) {
        self.header.sequence = sequence;
    }

    /// The payload stream.
    pub fn payload(&self) -> &ByteStream {
        &self.payload
    }

    /// Mutable payload stream, for writing at build time or reading on receipt.
    pub fn payload_mut(&mut self) -> &mut ByteStream {
        &mut self.payload
    }

    /// Serialized size of this packet.
    pub fn wire_size(&self) -> usize {
        PACKET_HEADER_SIZE + self.payload.len()
    }

    /// Append header and payload to `out`, recomputing the payload length.
    pub fn serialize(&self, out: &mut ByteStream) {
        out.write_u32(PACKET_MAGIC);
        out.write_u32(self.header.sequence);
        out.write_u16(self.header.kind as u16);
        out.write_u16(self.payload.len() as u16);
        out.write_bytes(self.payload.as_bytes());
    }

    /// Decode one packet from `stream`.
    ///
    /// Rejects a mismatched magic, an unknown type code, and a payload length
    /// reaching past the written bytes. On success the payload is an
    /// independent stream positioned at its own start.
    pub fn deserialize(stream: &mut ByteStream) -> Result<Self, PacketError> {
        let header = PacketHeader::decode(stream)?;

        let declared = header.payload_len as usize;
        if !stream.can_read(declared) {
            return Err(PacketError::Truncated {
                declared,
                available: stream.remaining(),
            });
        }
        let body = stream.read_bytes(declared)?;
        let payload = ByteStream::from_bytes(body);

        Ok(Self { header, payload })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packet_roundtrip() {
        let mut packet = Packet::new(PacketKind::Update);
        packet.set_sequence(42);
        packet.payload_mut().write_u32(7);
        packet.payload_mut().write_str("health");

        let mut wire = ByteStream::new();
        packet.serialize(&mut wire);
        assert_eq!(wire.len(), packet.wire_size());

        let decoded = Packet::deserialize(&mut wire).unwrap();
        assert_eq!(decoded.kind(), PacketKind::Update);
        assert_eq!(decoded.sequence(), 42);
        assert_eq!(decoded.payload().as_bytes(), packet.payload().as_bytes());
        assert_eq!(decoded.payload().read_pos(), 0);
    }

    #[test]
    fn test_payload_length_recomputed() {
        let mut packet = Packet::new(PacketKind::Spawn);
        packet.payload_mut().write_u64(1);

        let mut wire = ByteStream::new();
        packet.serialize(&mut wire);

        // bytes 10..12 hold the payload length
        assert_eq!(&wire.as_bytes()[10..12], &8u16.to_le_bytes());
    }

    #[test]
    fn test_bad_magic_rejected() {
        let mut wire = ByteStream::new();
        wire.write_u32(0xDEAD_BEEF);
        wire.write_u32(0);
        wire.write_u16(0);
        wire.write_u16(0);

        assert!(matches!(
            Packet::deserialize(&mut wire),
            Err(PacketError::BadMagic { actual: 0xDEAD_BEEF })
        ));
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let mut wire = ByteStream::new();
        wire.write_u32(PACKET_MAGIC);
        wire.write_u32(0);
        wire.write_u16(999);
        wire.write_u16(0);

        assert!(matches!(
            Packet::deserialize(&mut wire),
            Err(PacketError::UnknownKind(999))
        ));
    }

    #[test]
    fn test_truncated_payload_rejected() {
        let mut packet = Packet::new(PacketKind::Update);
        packet.payload_mut().write_bytes(&[0u8; 32]);

        let mut wire = ByteStream::new();
        packet.serialize(&mut wire);
        let mut cut = ByteStream::from_bytes(&wire.as_bytes()[..20]);

        assert!(matches!(
            Packet::deserialize(&mut cut),
            Err(PacketError::Truncated { declared: 32, .. })
        ));
    }

    #[test]
    fn test_truncated_header_rejected() {
        let mut wire = ByteStream::new();
        wire.write_u32(PACKET_MAGIC);
        wire.write_u16(0);

        assert!(matches!(
            Packet::deserialize(&mut wire),
            Err(PacketError::Codec(_))
        ));
    }

    #[test]
    fn test_ack_helper() {
        let mut packet = Packet::ack(1234);
        assert_eq!(packet.kind(), PacketKind::Ack);
        assert_eq!(packet.payload_mut().read_u32().unwrap(), 1234);
    }

    #[test]
    fn test_control_kinds() {
        assert!(PacketKind::ConnectRequest.is_control());
        assert!(PacketKind::Disconnect.is_control());
        assert!(!PacketKind::Ack.is_control());
        assert!(!PacketKind::Spawn.is_control());
        assert!(!PacketKind::RpcToAll.is_control());
    }
}
