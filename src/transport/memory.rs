//! In-memory transport
//!
//! A deterministic channel factory for tests and local simulation: dials
//! never touch the network, sent frames are captured for inspection, and
//! specific addresses can be scripted to refuse dials.

use crate::error::MeshError;
use crate::transport::channel::{PeerChannel, Transport};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, Notify};

/// In-process channel factory
pub struct MemoryTransport {
    refused: Mutex<HashSet<String>>,
    channels: Mutex<Vec<Arc<MemoryChannel>>>,
    dial_count: AtomicU64,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self {
            refused: Mutex::new(HashSet::new()),
            channels: Mutex::new(Vec::new()),
            dial_count: AtomicU64::new(0),
        }
    }

    /// Make dials to the given address fail
    pub async fn refuse(&self, address: &str) {
        self.refused.lock().await.insert(address.to_string());
    }

    /// Make dials to the given address succeed again
    pub async fn allow(&self, address: &str) {
        self.refused.lock().await.remove(address);
    }

    /// Total dial attempts, including refused ones
    pub fn dial_count(&self) -> u64 {
        self.dial_count.load(Ordering::Relaxed)
    }

    /// The most recent channel dialed to the given address
    pub async fn channel_to(&self, address: &str) -> Option<Arc<MemoryChannel>> {
        self.channels
            .lock()
            .await
            .iter()
            .rev()
            .find(|c| c.addr == address)
            .cloned()
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn dial(&self, address: &str) -> Result<Arc<dyn PeerChannel>, MeshError> {
        self.dial_count.fetch_add(1, Ordering::Relaxed);

        if self.refused.lock().await.contains(address) {
            return Err(MeshError::network_error_with_address(
                "Dial refused",
                address,
            ));
        }

        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let channel = Arc::new(MemoryChannel {
            addr: address.to_string(),
            sent: Mutex::new(Vec::new()),
            inbound_tx,
            inbound_rx: Mutex::new(inbound_rx),
            open: AtomicBool::new(true),
            closed: Notify::new(),
        });

        self.channels.lock().await.push(channel.clone());
        Ok(channel)
    }
}

/// In-process channel that records sent frames
pub struct MemoryChannel {
    addr: String,
    sent: Mutex<Vec<Bytes>>,
    inbound_tx: mpsc::UnboundedSender<Bytes>,
    inbound_rx: Mutex<mpsc::UnboundedReceiver<Bytes>>,
    open: AtomicBool,
    closed: Notify,
}

impl MemoryChannel {
    /// Frames sent through this channel so far
    pub async fn sent_frames(&self) -> Vec<Bytes> {
        self.sent.lock().await.clone()
    }

    /// Queue a frame for the next `recv` call
    pub fn push_inbound(&self, frame: Bytes) {
        let _ = self.inbound_tx.send(frame);
    }
}

#[async_trait]
impl PeerChannel for MemoryChannel {
    async fn send(&self, frame: Bytes) -> Result<(), MeshError> {
        if !self.is_open() {
            return Err(MeshError::transport_error_full(
                "Channel closed",
                &self.addr,
                "send after close",
            ));
        }
        self.sent.lock().await.push(frame);
        Ok(())
    }

    async fn recv(&self) -> Result<Option<Bytes>, MeshError> {
        if !self.is_open() {
            return Ok(None);
        }
        let mut rx = self.inbound_rx.lock().await;
        // close() stores a permit, so a close racing this select still wins
        tokio::select! {
            _ = self.closed.notified() => Ok(None),
            frame = rx.recv() => Ok(frame),
        }
    }

    async fn close(&self) -> Result<(), MeshError> {
        self.open.store(false, Ordering::SeqCst);
        // Wake a recv parked on the inbound queue so it releases the lock
        self.closed.notify_one();
        self.inbound_rx.lock().await.close();
        Ok(())
    }

    fn remote_addr(&self) -> String {
        self.addr.clone()
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}
