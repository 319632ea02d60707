//! Datagram transport boundary.
//!
//! [`DatagramChannel`] is the unreliable, unordered, packet-oriented
//! primitive the driver runs on. [`UdpChannel`] implements it over a
//! non-blocking UDP socket; [`MemoryHub`] provides a deterministic
//! in-process implementation for tests and demos.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::io;
use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
use std::rc::Rc;

use crate::core::constants::MAX_PACKET_SIZE;

/// Receive buffer size for a driver's per-tick receive loop.
pub const RECV_BUFFER_SIZE: usize = MAX_PACKET_SIZE * 2;

/// Unreliable, unordered datagram transport.
///
/// A would-block from the underlying transport is not an error; `send_to`
/// and `recv_from` report it as `Ok(None)`, meaning "nothing more this
/// tick".
pub trait DatagramChannel {
    /// The local address this channel is bound to.
    fn local_addr(&self) -> io::Result<SocketAddr>;

    /// Send one datagram to `addr`. `Ok(None)` means the transport would
    /// block; retry on a later tick.
    fn send_to(&self, buf: &[u8], addr: SocketAddr) -> io::Result<Option<usize>>;

    /// Receive one datagram into `buf`, returning its length and source.
    /// `Ok(None)` means nothing is pending.
    fn recv_from(&self, buf: &mut [u8]) -> io::Result<Option<(usize, SocketAddr)>>;
}

/// Non-blocking UDP implementation of [`DatagramChannel`].
#[derive(Debug)]
pub struct UdpChannel {
    socket: UdpSocket,
}

impl UdpChannel {
    /// Bind to `port` on all interfaces; `0` picks an ephemeral port.
    pub fn bind(port: u16) -> io::Result<Self> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, port))?;
        socket.set_nonblocking(true)?;
        Ok(Self { socket })
    }
}

impl DatagramChannel for UdpChannel {
    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    fn send_to(&self, buf: &[u8], addr: SocketAddr) -> io::Result<Option<usize>> {
        match self.socket.send_to(buf, addr) {
            Ok(sent) => Ok(Some(sent)),
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn recv_from(&self, buf: &mut [u8]) -> io::Result<Option<(usize, SocketAddr)>> {
        match self.socket.recv_from(buf) {
            Ok((len, from)) => Ok(Some((len, from))),
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(err) => Err(err),
        }
    }
}

type Mailbox = VecDeque<(SocketAddr, Vec<u8>)>;

#[derive(Debug, Default)]
struct HubInner {
    mailboxes: HashMap<SocketAddr, Mailbox>,
    next_port: u16,
}

/// In-process datagram switchboard.
///
/// Channels bound to the same hub deliver to each other loss-free and in
/// order, which keeps tests deterministic. Sends to an unbound address are
/// silently dropped, matching UDP.
#[derive(Debug, Clone, Default)]
pub struct MemoryHub {
    inner: Rc<RefCell<HubInner>>,
}

impl MemoryHub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a channel on `port`; `0` picks the next free ephemeral port.
    pub fn bind(&self, port: u16) -> MemoryChannel {
        let mut inner = self.inner.borrow_mut();
        let port = if port == 0 {
            inner.next_port = inner.next_port.max(49152) + 1;
            inner.next_port
        } else {
            port
        };
        let addr = SocketAddr::from(([127, 0, 0, 1], port));
        inner.mailboxes.entry(addr).or_default();
        MemoryChannel {
            inner: Rc::clone(&self.inner),
            addr,
        }
    }
}

/// One endpoint of a [`MemoryHub`].
#[derive(Debug)]
pub struct MemoryChannel {
    inner: Rc<RefCell<HubInner>>,
    addr: SocketAddr,
}

impl DatagramChannel for MemoryChannel {
    fn local_addr(&self) -> io::Result<SocketAddr> {
        Ok(self.addr)
    }

    fn send_to(&self, buf: &[u8], addr: SocketAddr) -> io::Result<Option<usize>> {
        let mut inner = self.inner.borrow_mut();
        if let Some(mailbox) = inner.mailboxes.get_mut(&addr) {
            mailbox.push_back((self.addr, buf.to_vec()));
        }
        Ok(Some(buf.len()))
    }

    fn recv_from(&self, buf: &mut [u8]) -> io::Result<Option<(usize, SocketAddr)>> {
        let mut inner = self.inner.borrow_mut();
        let Some(mailbox) = inner.mailboxes.get_mut(&self.addr) else {
            return Ok(None);
        };
        let Some((from, data)) = mailbox.pop_front() else {
            return Ok(None);
        };
        let len = data.len().min(buf.len());
        buf[..len].copy_from_slice(&data[..len]);
        Ok(Some((len, from)))
    }
}

impl Drop for MemoryChannel {
    fn drop(&mut self) {
        self.inner.borrow_mut().mailboxes.remove(&self.addr);
    }
}
