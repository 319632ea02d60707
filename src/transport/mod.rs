//! Transport layer: packet format, per-peer connections, and the driver.
//!
//! - **Packet model**: [`Packet`], [`PacketHeader`], [`PacketKind`] wire format
//! - **Connection state machine**: [`Connection`] with reliability bookkeeping
//! - **Driver**: [`NetDriver`] multiplexing one transport across many peers
//! - **Datagram boundary**: [`DatagramChannel`], [`UdpChannel`], [`MemoryHub`]

mod connection;
mod driver;
mod packet;
mod socket;

pub use connection::*;
pub use driver::*;
pub use packet::*;
pub use socket::*;
