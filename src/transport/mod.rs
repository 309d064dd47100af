//! Transport module
//!
//! Opaque channel abstraction the connection pool dials through.

pub mod channel;
pub mod memory;
pub mod tcp;

// Re-export main types
pub use channel::{decode_frame, encode_frame, PeerChannel, Transport};
pub use memory::{MemoryChannel, MemoryTransport};
pub use tcp::{TcpChannel, TcpTransport};
