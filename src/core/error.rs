//! Error types for the tetherlink protocol stack.

use thiserror::Error;

use super::config::NetRole;

/// Errors raised by the byte-stream codec.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// A read reached past the bytes actually written.
    #[error("unexpected end of stream: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEof {
        /// Bytes the read required.
        needed: usize,
        /// Bytes left in the stream.
        remaining: usize,
    },

    /// A string body was not valid UTF-8.
    #[error("string is not valid UTF-8")]
    InvalidUtf8,
}

/// Errors raised while decoding a packet from the wire.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PacketError {
    /// The magic constant did not match the protocol's.
    #[error("bad packet magic: {actual:#010x}")]
    BadMagic {
        /// Magic value found on the wire.
        actual: u32,
    },

    /// The type code is not one the protocol defines.
    #[error("unknown packet type code: {0}")]
    UnknownKind(u16),

    /// The header declared more payload than the buffer holds.
    #[error("truncated payload: declared {declared} bytes, {available} available")]
    Truncated {
        /// Payload length from the header.
        declared: usize,
        /// Bytes actually available.
        available: usize,
    },

    /// Codec failure while reading header fields.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

/// Errors raised by the connection-table driver.
#[derive(Debug, Error)]
pub enum NetError {
    /// I/O failure from the transport, fatal only during initialization.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The operation is not valid for the driver's current role.
    #[error("operation requires the {expected:?} role, driver is {actual:?}")]
    WrongRole {
        /// Role the operation requires.
        expected: NetRole,
        /// Role the driver currently has.
        actual: NetRole,
    },

    /// No connection exists for the given endpoint.
    #[error("no connection to {0}")]
    NotConnected(std::net::SocketAddr),

    /// The dialing side has no host connection.
    #[error("not connected to a host")]
    NoHost,

    /// The driver has no open transport handle.
    #[error("transport is closed")]
    ChannelClosed,

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors raised by the RPC dispatch layer.
#[derive(Debug, Error)]
pub enum RpcError {
    /// A function with this name is already registered.
    #[error("rpc {0:?} is already registered")]
    DuplicateName(String),

    /// Driver-level failure while sending the call.
    #[error("net error: {0}")]
    Net(#[from] NetError),
}
