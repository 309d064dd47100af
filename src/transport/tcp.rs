//! TCP transport
//!
//! Dials peers over TCP with a bounded timeout and frames messages with a
//! 4-byte big-endian length prefix.

use crate::error::MeshError;
use crate::transport::channel::{decode_frame, encode_frame, PeerChannel, Transport};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, Notify};
use tokio::time::{timeout, Duration};
use tracing::{debug, warn};

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// TCP channel factory with a per-dial deadline
pub struct TcpTransport {
    dial_timeout: Duration,
}

impl TcpTransport {
    /// Create a new TCP transport with the given dial timeout
    pub fn new(dial_timeout: Duration) -> Self {
        Self { dial_timeout }
    }
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn dial(&self, address: &str) -> Result<Arc<dyn PeerChannel>, MeshError> {
        let addr: SocketAddr = address.parse().map_err(|e: std::net::AddrParseError| {
            MeshError::network_error_full("Invalid peer address", address, e.to_string())
        })?;

        let stream = timeout(self.dial_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| {
                warn!("Dial timeout to {}", address);
                MeshError::network_error_with_address("Dial timed out", address)
            })?
            .map_err(|e| {
                debug!("Failed to connect to {}: {}", address, e);
                MeshError::network_error_full("Failed to connect", address, e.to_string())
            })?;

        stream.set_nodelay(true).map_err(|e| {
            MeshError::network_error_full("Failed to configure socket", address, e.to_string())
        })?;

        debug!("Connected to {}", address);
        Ok(Arc::new(TcpChannel::new(address.to_string(), stream)))
    }
}

/// A framed TCP connection to a single peer
pub struct TcpChannel {
    addr: String,
    writer: Mutex<Option<OwnedWriteHalf>>,
    reader: Mutex<Option<(OwnedReadHalf, BytesMut)>>,
    open: AtomicBool,
    closed: Notify,
}

impl TcpChannel {
    fn new(addr: String, stream: TcpStream) -> Self {
        let (read_half, write_half) = stream.into_split();
        Self {
            addr,
            writer: Mutex::new(Some(write_half)),
            reader: Mutex::new(Some((read_half, BytesMut::with_capacity(READ_CHUNK_SIZE)))),
            open: AtomicBool::new(true),
            closed: Notify::new(),
        }
    }
}

#[async_trait]
impl PeerChannel for TcpChannel {
    async fn send(&self, frame: Bytes) -> Result<(), MeshError> {
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or_else(|| {
            MeshError::transport_error_full("Channel closed", &self.addr, "send after close")
        })?;

        let mut buf = BytesMut::with_capacity(4 + frame.len());
        encode_frame(&mut buf, &frame);

        writer.write_all(&buf).await.map_err(|e| {
            MeshError::transport_error_full("Failed to send frame", &self.addr, e.to_string())
        })?;
        writer.flush().await.map_err(|e| {
            MeshError::transport_error_full("Failed to flush frame", &self.addr, e.to_string())
        })?;
        Ok(())
    }

    async fn recv(&self) -> Result<Option<Bytes>, MeshError> {
        let mut guard = self.reader.lock().await;
        let (reader, buf) = guard.as_mut().ok_or_else(|| {
            MeshError::transport_error_full("Channel closed", &self.addr, "recv after close")
        })?;

        loop {
            if let Some(frame) = decode_frame(buf) {
                return Ok(Some(frame));
            }
            if !self.open.load(Ordering::SeqCst) {
                return Ok(None);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            // close() stores a permit, so a close racing this select still wins
            let n = tokio::select! {
                _ = self.closed.notified() => return Ok(None),
                res = reader.read(&mut chunk) => res.map_err(|e| {
                    MeshError::transport_error_full(
                        "Failed to read frame",
                        &self.addr,
                        e.to_string(),
                    )
                })?,
            };

            if n == 0 {
                // Remote hung up; a partial frame left in the buffer is dropped
                return Ok(None);
            }
            buf.extend_from_slice(&chunk[..n]);
        }
    }

    async fn close(&self) -> Result<(), MeshError> {
        self.open.store(false, Ordering::SeqCst);
        // Wake a recv parked on the socket so it releases the reader lock
        self.closed.notify_one();

        self.reader.lock().await.take();

        if let Some(mut writer) = self.writer.lock().await.take() {
            if let Err(e) = writer.shutdown().await {
                debug!("Shutdown of channel to {} failed: {}", self.addr, e);
            }
        }
        debug!("Closed channel to {}", self.addr);
        Ok(())
    }

    fn remote_addr(&self) -> String {
        self.addr.clone()
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_dial_and_send() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let accept = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 9];
            socket.read_exact(&mut buf).await.unwrap();
            buf
        });

        let transport = TcpTransport::default();
        let channel = transport.dial(&addr.to_string()).await.unwrap();
        assert!(channel.is_open());
        assert_eq!(channel.remote_addr(), addr.to_string());

        channel.send(Bytes::from_static(b"hello")).await.unwrap();

        let received = accept.await.unwrap();
        assert_eq!(&received[..4], &5u32.to_be_bytes());
        assert_eq!(&received[4..], b"hello");
    }

    #[tokio::test]
    async fn test_recv_frame() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = BytesMut::new();
            encode_frame(&mut buf, b"ping");
            socket.write_all(&buf).await.unwrap();
        });

        let transport = TcpTransport::default();
        let channel = transport.dial(&addr.to_string()).await.unwrap();

        let frame = channel.recv().await.unwrap().unwrap();
        assert_eq!(&frame[..], b"ping");

        // Sender dropped its socket; the next recv sees EOF
        assert!(channel.recv().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_dial_refused() {
        // Bind then drop so the port is very likely unused
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport = TcpTransport::new(Duration::from_secs(2));
        let result = transport.dial(&addr.to_string()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_dial_invalid_address() {
        let transport = TcpTransport::default();
        let result = transport.dial("not-an-address").await;
        assert!(matches!(result, Err(MeshError::NetworkError { .. })));
    }

    #[tokio::test]
    async fn test_close_interrupts_pending_recv() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // Accept but never send, keeping the socket open and the reader parked
        let accept = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(10)).await;
            drop(socket);
        });

        let transport = TcpTransport::default();
        let channel = transport.dial(&addr.to_string()).await.unwrap();

        let recv_channel = channel.clone();
        let pending_recv = tokio::spawn(async move { recv_channel.recv().await });
        tokio::time::sleep(Duration::from_millis(50)).await;

        timeout(Duration::from_secs(2), channel.close())
            .await
            .expect("close must not wait for a pending recv")
            .unwrap();
        assert!(!channel.is_open());

        let received = pending_recv.await.unwrap().unwrap();
        assert!(received.is_none());
        accept.abort();
    }

    #[tokio::test]
    async fn test_send_after_close() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let _ = listener.accept().await;
        });

        let transport = TcpTransport::default();
        let channel = transport.dial(&addr.to_string()).await.unwrap();

        channel.close().await.unwrap();
        assert!(!channel.is_open());

        let result = channel.send(Bytes::from_static(b"late")).await;
        assert!(matches!(result, Err(MeshError::TransportError { .. })));
    }
}
