//! Protocol constants.
//!
//! These values are fixed by the wire format and shared by every endpoint.

// =============================================================================
// WIRE FORMAT
// =============================================================================

/// Magic constant opening every packet ("TETH").
pub const PACKET_MAGIC: u32 = 0x5445_5448;

/// Fixed packet header size: magic + sequence + type code + payload length.
pub const PACKET_HEADER_SIZE: usize = 12;

/// Largest datagram an endpoint will produce.
pub const MAX_PACKET_SIZE: usize = 1024;

// =============================================================================
// DRIVER DEFAULTS
// =============================================================================

/// Default listen port.
pub const DEFAULT_PORT: u16 = 7777;

/// Default cap on concurrent connections for a listening driver.
pub const DEFAULT_MAX_CONNECTIONS: usize = 64;

/// Datagrams pulled from the transport per tick, bounding work under flood.
pub const MAX_RECEIVES_PER_TICK: usize = 100;

/// Seconds of silence before a listening driver evicts a connection.
pub const DEFAULT_CONNECTION_TIMEOUT: f32 = 30.0;

/// Seconds of send-idle before a connected endpoint emits a heartbeat.
pub const HEARTBEAT_INTERVAL: f32 = 1.0;

/// Weight of the previous estimate in the round-trip moving average.
pub const RTT_SMOOTHING: f32 = 0.9;

// =============================================================================
// REPLICATION DEFAULTS
// =============================================================================

/// Default replication tick rate in Hz.
pub const DEFAULT_TICK_RATE: f32 = 30.0;

/// Default relevancy distance for custom relevance rules.
pub const DEFAULT_RELEVANCY_DISTANCE: f32 = 10000.0;
