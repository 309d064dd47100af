//! Peer connection pool
//!
//! Owns the live transport channels and their health. Selection queries from
//! protocol logic (broadcast fan-out, register routing) resolve here; seed
//! status and register interest come from the peer list manager.

use crate::metrics::Metrics;
use crate::peer::list::PeerListManager;
use crate::transport::channel::{PeerChannel, Transport};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, info_span, trace, warn, Instrument};

/// Live pool entry for one peer
struct ConnectionRecord {
    channel: Arc<dyn PeerChannel>,
    connected_at: Instant,
    last_activity: Instant,
    consecutive_failures: u32,
    connected: bool,
}

impl ConnectionRecord {
    fn new(channel: Arc<dyn PeerChannel>) -> Self {
        let now = Instant::now();
        Self {
            channel,
            connected_at: now,
            last_activity: now,
            consecutive_failures: 0,
            connected: true,
        }
    }
}

/// Point-in-time view of one pool entry, for status surfaces
#[derive(Debug, Clone)]
pub struct ConnectionStats {
    pub peer_id: String,
    pub connected: bool,
    pub consecutive_failures: u32,
    pub connected_for: Duration,
    pub idle_for: Duration,
}

/// Pool of live channels keyed by peer id
pub struct PeerConnectionPool {
    connections: RwLock<HashMap<String, ConnectionRecord>>,
    peer_list: Arc<PeerListManager>,
    transport: Arc<dyn Transport>,
    failure_threshold: u32,
    metrics: Arc<Metrics>,
}

impl PeerConnectionPool {
    /// Create a new pool on top of the given membership list and transport
    pub fn new(
        peer_list: Arc<PeerListManager>,
        transport: Arc<dyn Transport>,
        failure_threshold: u32,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            peer_list,
            transport,
            failure_threshold,
            metrics,
        }
    }

    /// Connection ceiling; always equal to the membership capacity
    pub fn max_connections(&self) -> usize {
        self.peer_list.max_peers()
    }

    /// Number of records currently marked connected
    pub async fn active_connection_count(&self) -> usize {
        self.connections
            .read()
            .await
            .values()
            .filter(|r| r.connected)
            .count()
    }

    async fn publish_gauge(&self) {
        let count = self.active_connection_count().await as u64;
        self.metrics.set_active_connections(count);
    }

    /// Establish a channel to the peer.
    ///
    /// Idempotent: an already-connected peer returns `true` without a second
    /// dial. An empty peer id and any dial failure return `false`; transient
    /// network trouble is expected and never escapes as an error.
    pub async fn connect_to_peer(&self, peer_id: &str, address: &str) -> bool {
        if peer_id.trim().is_empty() {
            warn!("Rejected connect with empty peer id ({})", address);
            return false;
        }

        if let Some(record) = self.connections.read().await.get(peer_id) {
            if record.connected {
                trace!("Already connected to {}", peer_id);
                return true;
            }
            // A retained seed record: fall through and redial
        }

        self.metrics.increment_dial_attempts();
        let dialed = self
            .transport
            .dial(address)
            .instrument(info_span!("connect_peer", peer = peer_id))
            .await;

        let channel = match dialed {
            Ok(channel) => channel,
            Err(e) => {
                debug!("Dial to {} ({}) failed: {}", peer_id, address, e);
                self.metrics.increment_dial_failures();
                return false;
            }
        };

        let displaced = {
            let mut connections = self.connections.write().await;
            let lost_race = connections
                .get(peer_id)
                .map(|existing| existing.connected)
                .unwrap_or(false);

            if lost_race {
                // A concurrent connect won; keep theirs, discard ours
                Some(channel)
            } else {
                connections
                    .insert(peer_id.to_string(), ConnectionRecord::new(channel))
                    .map(|old| old.channel)
            }
        };

        if let Some(old) = displaced {
            if let Err(e) = old.close().await {
                debug!("Failed to close displaced channel for {}: {}", peer_id, e);
            }
        }

        self.peer_list.mark_peer_seen(peer_id).await;
        self.publish_gauge().await;
        info!("Connected to peer {} ({})", peer_id, address);
        true
    }

    /// The channel for a connected peer, or `None`. No side effects.
    pub async fn get_channel(&self, peer_id: &str) -> Option<Arc<dyn PeerChannel>> {
        self.connections
            .read()
            .await
            .get(peer_id)
            .filter(|r| r.connected)
            .map(|r| r.channel.clone())
    }

    /// Snapshot of every connected peer and its channel
    pub async fn get_all_active_channels(&self) -> Vec<(String, Arc<dyn PeerChannel>)> {
        self.connections
            .read()
            .await
            .iter()
            .filter(|(_, r)| r.connected)
            .map(|(id, r)| (id.clone(), r.channel.clone()))
            .collect()
    }

    /// Connected peers that also advertise interest in the given register.
    ///
    /// This is the topic-routing primitive: a message for register R only
    /// goes to peers serving R.
    pub async fn get_channels_for_register(
        &self,
        register_id: &str,
    ) -> Vec<(String, Arc<dyn PeerChannel>)> {
        let serving = self.peer_list.get_peers_by_register(register_id).await;

        let connections = self.connections.read().await;
        serving
            .into_iter()
            .filter_map(|peer| {
                connections
                    .get(&peer.peer_id)
                    .filter(|r| r.connected)
                    .map(|r| (peer.peer_id, r.channel.clone()))
            })
            .collect()
    }

    /// Close and remove the channel if present. Safe to call speculatively:
    /// a peer with no active connection is a silent no-op.
    pub async fn disconnect_peer(&self, peer_id: &str) {
        let removed = self.connections.write().await.remove(peer_id);

        match removed {
            Some(record) => {
                if let Err(e) = record.channel.close().await {
                    debug!("Failed to close channel to {}: {}", peer_id, e);
                }
                self.publish_gauge().await;
                info!("Disconnected peer {}", peer_id);
            }
            None => {
                trace!("Disconnect for unknown peer {} ignored", peer_id);
            }
        }
    }

    /// Reset the failure streak for a peer; no-op if untracked
    pub async fn record_success(&self, peer_id: &str) {
        if let Some(record) = self.connections.write().await.get_mut(peer_id) {
            record.consecutive_failures = 0;
            record.last_activity = Instant::now();
        }
        self.peer_list.mark_peer_seen(peer_id).await;
    }

    /// Count a failure against the peer. Crossing the threshold tears the
    /// connection down: non-seed records are removed from the pool, seed
    /// records are retained but flagged disconnected so the node keeps a
    /// re-entry target.
    pub async fn record_failure(&self, peer_id: &str) {
        let is_seed = self.peer_list.is_seed_node(peer_id).await;

        let to_close = {
            let mut connections = self.connections.write().await;

            let streak = match connections.get_mut(peer_id) {
                Some(record) => {
                    record.consecutive_failures += 1;
                    record.consecutive_failures
                }
                None => {
                    trace!("Failure for unknown peer {} ignored", peer_id);
                    return;
                }
            };

            if streak < self.failure_threshold {
                debug!(
                    "Peer {} failure streak {}/{}",
                    peer_id, streak, self.failure_threshold
                );
                None
            } else if is_seed {
                warn!(
                    "Seed peer {} crossed failure threshold, retaining disconnected",
                    peer_id
                );
                connections.get_mut(peer_id).map(|record| {
                    record.connected = false;
                    record.channel.clone()
                })
            } else {
                warn!("Peer {} crossed failure threshold, removing", peer_id);
                self.metrics.increment_peers_evicted();
                connections.remove(peer_id).map(|r| r.channel)
            }
        };

        if let Some(channel) = to_close {
            if let Err(e) = channel.close().await {
                debug!("Failed to close channel to {}: {}", peer_id, e);
            }
            self.publish_gauge().await;
        }
    }

    /// Disconnect and remove every non-seed record idle for at least the
    /// threshold. A zero threshold reclaims everything not protected.
    ///
    /// Candidates are snapshotted first and removed one by one so lookups
    /// are never stalled behind channel closes.
    pub async fn cleanup_idle_connections(&self, idle_threshold: Duration) {
        self.metrics.increment_cleanup_runs();

        let candidates: Vec<String> = {
            let connections = self.connections.read().await;
            connections
                .iter()
                .filter(|(_, r)| r.last_activity.elapsed() >= idle_threshold)
                .map(|(id, _)| id.clone())
                .collect()
        };

        let mut reclaimed = 0usize;
        for peer_id in candidates {
            if self.peer_list.is_seed_node(&peer_id).await {
                continue;
            }

            let removed = {
                let mut connections = self.connections.write().await;
                match connections.get(&peer_id) {
                    // Re-check: activity may have arrived since the snapshot
                    Some(r) if r.last_activity.elapsed() >= idle_threshold => {
                        connections.remove(&peer_id)
                    }
                    _ => None,
                }
            };

            if let Some(record) = removed {
                if let Err(e) = record.channel.close().await {
                    debug!("Failed to close idle channel to {}: {}", peer_id, e);
                }
                debug!("Reclaimed idle connection to {}", peer_id);
                reclaimed += 1;
            }
        }

        if reclaimed > 0 {
            self.publish_gauge().await;
            info!("Idle cleanup reclaimed {} connections", reclaimed);
        }
    }

    /// Full snapshot of every tracked peer id to its connectivity flag,
    /// including disconnected-but-retained seed entries
    pub async fn get_connection_statuses(&self) -> HashMap<String, bool> {
        self.connections
            .read()
            .await
            .iter()
            .map(|(id, r)| (id.clone(), r.connected))
            .collect()
    }

    /// Per-record stats for status/CLI surfaces
    pub async fn connection_stats(&self) -> Vec<ConnectionStats> {
        self.connections
            .read()
            .await
            .iter()
            .map(|(id, r)| ConnectionStats {
                peer_id: id.clone(),
                connected: r.connected,
                consecutive_failures: r.consecutive_failures,
                connected_for: r.connected_at.elapsed(),
                idle_for: r.last_activity.elapsed(),
            })
            .collect()
    }

    /// Ordered teardown: close every channel and drop all records
    pub async fn shutdown(&self) {
        let drained: Vec<(String, ConnectionRecord)> =
            self.connections.write().await.drain().collect();
        info!("Shutting down pool, closing {} channels", drained.len());

        for (peer_id, record) in drained {
            if let Err(e) = record.channel.close().await {
                debug!("Failed to close channel to {} during shutdown: {}", peer_id, e);
            }
        }
        self.metrics.set_active_connections(0);
    }

    /// Run the periodic idle-cleanup loop until a shutdown signal arrives
    pub async fn run_cleanup_loop(
        self: Arc<Self>,
        cleanup_interval: Duration,
        idle_threshold: Duration,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        info!(
            "Starting idle cleanup loop (interval: {:?}, threshold: {:?})",
            cleanup_interval, idle_threshold
        );
        let mut interval = tokio::time::interval(cleanup_interval);
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.cleanup_idle_connections(idle_threshold).await;
                    self.metrics.log_summary();
                }
                _ = shutdown_rx.recv() => {
                    info!("Idle cleanup loop shutting down");
                    break;
                }
            }
        }
    }
}
