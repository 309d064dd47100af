//! Peer membership and connection management
//!
//! The list manager owns the bounded registry of known peers; the pool owns
//! live channels and their health on top of it.

pub mod list;
pub mod node;
pub mod pool;

// Re-export main types
pub use list::PeerListManager;
pub use node::{generate_node_id, PeerNode};
pub use pool::{ConnectionStats, PeerConnectionPool};
