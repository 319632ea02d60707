//! # Tetherlink
//!
//! Tetherlink synchronizes mutable application state between one
//! authoritative host and multiple remote peers over an unreliable,
//! unordered datagram transport, and lets either side invoke named remote
//! procedures on shared objects.
//!
//! - **Tick-driven**: single-threaded and cooperative. One `tick` call per
//!   frame runs the receive burst, connection upkeep, flushing, and the
//!   timeout sweep; replication and RPC handling run synchronously inside
//!   the same tick.
//! - **Delta replication**: per peer and per object, only the properties
//!   whose value differs from the last value sent go on the wire.
//! - **Explicit context**: a [`NetSession`] bundles driver, replication, and
//!   RPC dispatch. There are no global singletons, so independent sessions
//!   coexist in one process.
//!
//! ## Modules
//!
//! - [`codec`]: byte-buffer wire codec
//! - [`transport`]: packet format, connections, driver, datagram boundary
//! - [`replication`]: property values and the delta replication engine
//! - [`rpc`]: remote procedure registration and dispatch
//! - [`world`]: networked object trait and the object registry boundary
//! - [`session`]: the top-level context tying the layers together
//!
//! ## Example
//!
//! ```no_run
//! use tetherlink::prelude::*;
//!
//! let mut world = World::new();
//! let mut session = NetSession::new(NetConfig::host(7777, 16))?;
//!
//! loop {
//!     world.tick_objects(1.0 / 60.0);
//!     session.tick(1.0 / 60.0, &mut world);
//!     while let Some(event) = session.poll_event() {
//!         println!("{event:?}");
//!     }
//!     # break;
//! }
//! # Ok::<(), tetherlink::NetError>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod codec;
pub mod core;
pub mod replication;
pub mod rpc;
pub mod session;
pub mod transport;
pub mod world;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::codec::ByteStream;
    pub use crate::core::{
        CodecError, NetConfig, NetError, NetRole, PacketError, RpcError, constants,
    };
    pub use crate::replication::{
        PropertyBag, PropertyKind, PropertyValue, RelevanceFn, ReplicationEngine,
    };
    pub use crate::rpc::{RpcDirection, RpcDispatcher, RpcHandler};
    pub use crate::session::{NetSession, SessionEvent};
    pub use crate::transport::{
        Connection, ConnectionState, ConnectionStats, DatagramChannel, MemoryChannel, MemoryHub,
        NetDriver, NetEvent, Packet, PacketHeader, PacketKind, UdpChannel,
    };
    pub use crate::world::{NetObject, ObjectBase, ObjectFactory, ObjectId, ObjectRegistry, World};
}

// Commonly used items at the crate root
pub use codec::ByteStream;
pub use crate::core::{NetConfig, NetError, NetRole};
pub use replication::{PropertyValue, ReplicationEngine};
pub use rpc::{RpcDirection, RpcDispatcher};
pub use session::{NetSession, SessionEvent};
pub use transport::{NetDriver, Packet, PacketKind};
pub use world::{NetObject, ObjectBase, ObjectId, ObjectRegistry, World};
