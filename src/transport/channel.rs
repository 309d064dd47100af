//! Transport channel traits
//!
//! The connection pool treats channels as opaque capabilities: something it
//! can obtain from a factory for an address, push frames into, and close.
//! Frame contents are owned by the protocol layers above this crate.

use crate::error::MeshError;
use async_trait::async_trait;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::sync::Arc;

/// A live channel to a remote peer
#[async_trait]
pub trait PeerChannel: Send + Sync {
    /// Send one opaque frame to the peer
    async fn send(&self, frame: Bytes) -> Result<(), MeshError>;

    /// Receive the next frame, or `None` once the peer hung up
    async fn recv(&self) -> Result<Option<Bytes>, MeshError>;

    /// Close the channel; further sends fail
    async fn close(&self) -> Result<(), MeshError>;

    /// The remote address this channel was dialed to
    fn remote_addr(&self) -> String;

    /// Whether the channel has not been closed locally
    fn is_open(&self) -> bool;
}

/// Factory that turns an address into a live channel
#[async_trait]
pub trait Transport: Send + Sync {
    /// Dial the given address and establish a channel
    async fn dial(&self, address: &str) -> Result<Arc<dyn PeerChannel>, MeshError>;
}

/// Append a length-prefixed frame to the buffer
pub fn encode_frame(buf: &mut BytesMut, frame: &[u8]) {
    buf.put_u32(frame.len() as u32);
    buf.put_slice(frame);
}

/// Extract a length-prefixed frame from the buffer, if complete
pub fn decode_frame(buf: &mut BytesMut) -> Option<Bytes> {
    if buf.len() < 4 {
        return None;
    }

    let length = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;

    if buf.len() < 4 + length {
        return None;
    }

    buf.advance(4);
    Some(buf.split_to(length).freeze())
}
