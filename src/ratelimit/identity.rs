//! Client identity used to partition rate limit counters.

use std::net::SocketAddr;

/// The counter key for a client: its raw network address.
///
/// No normalization is applied. IPv4-mapped IPv6 addresses and clients
/// behind a shared proxy are counted as whatever address the socket reports.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientIdentity(String);

impl ClientIdentity {
    /// Create an identity from the peer address of a connection.
    ///
    /// The port is dropped so that reconnects from the same host share a counter.
    pub fn from_peer(addr: &SocketAddr) -> Self {
        Self(addr.ip().to_string())
    }

    /// Get the key under which this identity's counter is stored.
    pub fn as_key(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ClientIdentity {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl std::fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
