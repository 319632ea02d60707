//! Session configuration.

use std::net::SocketAddr;

use super::constants::{
    DEFAULT_CONNECTION_TIMEOUT, DEFAULT_MAX_CONNECTIONS, DEFAULT_PORT, DEFAULT_RELEVANCY_DISTANCE,
    DEFAULT_TICK_RATE,
};

/// Which side of the protocol an endpoint plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetRole {
    /// No networking; ticks are no-ops.
    Inactive,
    /// Authoritative listener accepting peers.
    Host,
    /// Dialer connecting out to a host.
    Peer,
}

/// Configuration for a [`NetSession`](crate::session::NetSession).
#[derive(Debug, Clone)]
pub struct NetConfig {
    /// Endpoint role.
    pub role: NetRole,

    /// Address of the host to dial (peer role only).
    pub remote_addr: Option<SocketAddr>,

    /// Port to listen on (host role only).
    pub listen_port: u16,

    /// Cap on concurrent connections (host role only).
    pub max_connections: usize,

    /// Replication tick rate in Hz.
    pub tick_rate: f32,

    /// Relevancy distance handed to custom relevance rules.
    pub relevancy_distance: f32,

    /// Seconds of silence before the host evicts a connection.
    pub connection_timeout: f32,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            role: NetRole::Inactive,
            remote_addr: None,
            listen_port: DEFAULT_PORT,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            tick_rate: DEFAULT_TICK_RATE,
            relevancy_distance: DEFAULT_RELEVANCY_DISTANCE,
            connection_timeout: DEFAULT_CONNECTION_TIMEOUT,
        }
    }
}

impl NetConfig {
    /// Configuration for an authoritative host listening on `port`.
    pub fn host(port: u16, max_connections: usize) -> Self {
        Self {
            role: NetRole::Host,
            listen_port: port,
            max_connections,
            ..Self::default()
        }
    }

    /// Configuration for a peer dialing `remote`.
    pub fn peer(remote: SocketAddr) -> Self {
        Self {
            role: NetRole::Peer,
            remote_addr: Some(remote),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_shortcut() {
        let config = NetConfig::host(9000, 8);
        assert_eq!(config.role, NetRole::Host);
        assert_eq!(config.listen_port, 9000);
        assert_eq!(config.max_connections, 8);
        assert!(config.remote_addr.is_none());
    }

    #[test]
    fn test_peer_shortcut() {
        let remote: SocketAddr = "10.0.0.1:7777".parse().unwrap();
        let config = NetConfig::peer(remote);
        assert_eq!(config.role, NetRole::Peer);
        assert_eq!(config.remote_addr, Some(remote));
    }
}
