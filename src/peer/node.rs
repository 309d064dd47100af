//! Peer record types
//!
//! Defines the membership record for a known peer.

use crate::cli::config::SeedNodeEndpoint;
use std::collections::HashSet;
use std::time::{Duration, Instant};

/// A known member of the mesh
#[derive(Debug, Clone)]
pub struct PeerNode {
    /// Stable identity, unique across the mesh
    pub peer_id: String,
    /// Hostname or IP address; peers can migrate
    pub address: String,
    /// Listening port; peers can migrate
    pub port: u16,
    /// True for statically configured bootstrap nodes; never demoted
    pub is_seed: bool,
    /// Register ids this peer advertises interest in
    pub advertised_registers: HashSet<String>,
    /// Last time this peer was seen by discovery or the pool
    pub last_seen: Instant,
}

impl PeerNode {
    /// Create a new discovered (non-seed) peer
    pub fn new(peer_id: impl Into<String>, address: impl Into<String>, port: u16) -> Self {
        Self {
            peer_id: peer_id.into(),
            address: address.into(),
            port,
            is_seed: false,
            advertised_registers: HashSet::new(),
            last_seen: Instant::now(),
        }
    }

    /// Create a peer record from a configured seed endpoint
    pub fn from_seed(seed: &SeedNodeEndpoint) -> Self {
        Self {
            peer_id: seed.node_id.clone(),
            address: seed.hostname.clone(),
            port: seed.port,
            is_seed: true,
            advertised_registers: HashSet::new(),
            last_seen: Instant::now(),
        }
    }

    /// Attach advertised registers to the record
    pub fn with_registers<I, S>(mut self, registers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.advertised_registers = registers.into_iter().map(Into::into).collect();
        self
    }

    /// The dialable "host:port" form of this peer
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }

    /// Whether this peer advertises the given register
    pub fn serves_register(&self, register_id: &str) -> bool {
        self.advertised_registers.contains(register_id)
    }

    /// Refresh the last-seen timestamp
    pub fn mark_seen(&mut self) {
        self.last_seen = Instant::now();
    }

    /// Whether the peer has not been seen within the given window
    pub fn is_stale(&self, window: Duration) -> bool {
        self.last_seen.elapsed() > window
    }
}

/// Generate a random node id, hex-encoded
pub fn generate_node_id() -> String {
    use rand::Rng;
    let bytes: [u8; 16] = rand::thread_rng().gen();
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_node_new() {
        let peer = PeerNode::new("peer-1", "10.0.0.1", 7400);

        assert_eq!(peer.peer_id, "peer-1");
        assert_eq!(peer.endpoint(), "10.0.0.1:7400");
        assert!(!peer.is_seed);
        assert!(peer.advertised_registers.is_empty());
    }

    #[test]
    fn test_from_seed() {
        let seed = SeedNodeEndpoint::new("seed-1", "seed1.mesh.local", 7400);
        let peer = PeerNode::from_seed(&seed);

        assert_eq!(peer.peer_id, "seed-1");
        assert!(peer.is_seed);
        assert_eq!(peer.endpoint(), "seed1.mesh.local:7400");
    }

    #[test]
    fn test_serves_register() {
        let peer = PeerNode::new("peer-1", "10.0.0.1", 7400)
            .with_registers(["reg-a", "reg-b"]);

        assert!(peer.serves_register("reg-a"));
        assert!(peer.serves_register("reg-b"));
        assert!(!peer.serves_register("reg-c"));
    }

    #[test]
    fn test_is_stale() {
        let mut peer = PeerNode::new("peer-1", "10.0.0.1", 7400);
        peer.last_seen = Instant::now() - Duration::from_secs(120);

        assert!(peer.is_stale(Duration::from_secs(60)));
        assert!(!peer.is_stale(Duration::from_secs(600)));

        peer.mark_seen();
        assert!(!peer.is_stale(Duration::from_secs(60)));
    }

    #[test]
    fn test_generate_node_id() {
        let a = generate_node_id();
        let b = generate_node_id();

        assert_eq!(a.len(), 32);
        assert_ne!(a, b);
    }
}
