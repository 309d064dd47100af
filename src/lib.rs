//! peermesh
//!
//! Bounded peer membership and connection pooling for gossip mesh nodes.
//! The crate keeps a capped registry of known peers with seed-node
//! permanence, pools outbound transport channels with health-based failure
//! accounting, and routes peer selection by advertised register interest.

pub mod cli;
pub mod error;
pub mod metrics;
pub mod peer;
pub mod transport;

pub use error::MeshError;

pub use cli::{CliArgs, NodeConfig, SeedNodeEndpoint};
pub use metrics::{Metrics, MetricsSnapshot};
pub use peer::{generate_node_id, ConnectionStats, PeerConnectionPool, PeerListManager, PeerNode};
pub use transport::{MemoryTransport, PeerChannel, TcpTransport, Transport};
