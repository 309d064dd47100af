//! Peer list manager
//!
//! Owns the canonical, bounded registry of known peers. Seed nodes come from
//! static configuration and are never evicted; discovered peers compete for
//! the remaining capacity. No network I/O happens here.

use crate::cli::config::NodeConfig;
use crate::peer::node::PeerNode;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, trace, warn};

/// Fraction of capacity above which the refresh pass prunes stale peers
const PRUNE_PRESSURE: f64 = 0.9;

/// Bounded, concurrent-safe registry of known peers
pub struct PeerListManager {
    peers: RwLock<HashMap<String, PeerNode>>,
    max_peers: usize,
    min_healthy_peers: usize,
    refresh_interval: Duration,
    discovery_needed: AtomicBool,
}

impl PeerListManager {
    /// Create a new manager, seeded with all configured seed nodes
    pub fn new(config: &NodeConfig) -> Self {
        let mut peers = HashMap::new();
        for seed in &config.seed_nodes {
            let peer = PeerNode::from_seed(seed);
            debug!("Seeding peer list with {} ({})", peer.peer_id, peer.endpoint());
            peers.insert(peer.peer_id.clone(), peer);
        }
        info!(
            "Peer list initialized: {} seed nodes, capacity {}",
            peers.len(),
            config.max_peers_in_list
        );

        Self {
            peers: RwLock::new(peers),
            max_peers: config.max_peers_in_list,
            min_healthy_peers: config.min_healthy_peers,
            refresh_interval: config.refresh_interval(),
            discovery_needed: AtomicBool::new(false),
        }
    }

    /// Insert a new peer or merge fields into an existing entry.
    ///
    /// Returns `false` when the peer is invalid or the list is full of
    /// non-evictable entries. Discovery is best-effort, so rejection is
    /// silent from the caller's perspective.
    pub async fn add_or_update_peer(&self, peer: PeerNode) -> bool {
        if peer.peer_id.trim().is_empty() {
            warn!("Rejected peer with empty id ({})", peer.endpoint());
            return false;
        }

        let mut peers = self.peers.write().await;

        if let Some(existing) = peers.get_mut(&peer.peer_id) {
            // Merge: peers can migrate, register interest can change.
            // Seed status is immutable once set from config.
            existing.address = peer.address;
            existing.port = peer.port;
            existing
                .advertised_registers
                .extend(peer.advertised_registers);
            existing.mark_seen();
            trace!("Updated peer {}", existing.peer_id);
            return true;
        }

        if peers.len() >= self.max_peers {
            let evictable = peers
                .values()
                .filter(|p| !p.is_seed)
                .min_by_key(|p| p.last_seen)
                .map(|p| p.peer_id.clone());

            match evictable {
                Some(victim) => {
                    peers.remove(&victim);
                    debug!("Evicted stalest peer {} to admit {}", victim, peer.peer_id);
                }
                None => {
                    debug!(
                        "Peer list full of seed nodes, rejecting {}",
                        peer.peer_id
                    );
                    return false;
                }
            }
        }

        debug!("Added peer {} ({})", peer.peer_id, peer.endpoint());
        peers.insert(peer.peer_id.clone(), peer);
        true
    }

    /// Look up a single peer by id
    pub async fn get_peer(&self, peer_id: &str) -> Option<PeerNode> {
        self.peers.read().await.get(peer_id).cloned()
    }

    /// Snapshot of every known peer
    pub async fn get_all_peers(&self) -> Vec<PeerNode> {
        self.peers.read().await.values().cloned().collect()
    }

    /// Peers whose advertised registers contain the given id
    pub async fn get_peers_by_register(&self, register_id: &str) -> Vec<PeerNode> {
        self.peers
            .read()
            .await
            .values()
            .filter(|p| p.serves_register(register_id))
            .cloned()
            .collect()
    }

    /// Whether the peer is a protected seed node.
    ///
    /// Every removal decision in the pool and in this manager goes through
    /// this predicate; unknown peers are not protected.
    pub async fn is_seed_node(&self, peer_id: &str) -> bool {
        self.peers
            .read()
            .await
            .get(peer_id)
            .map(|p| p.is_seed)
            .unwrap_or(false)
    }

    /// Refresh the last-seen timestamp for a peer, if known
    pub async fn mark_peer_seen(&self, peer_id: &str) {
        if let Some(peer) = self.peers.write().await.get_mut(peer_id) {
            peer.mark_seen();
        }
    }

    /// Number of known peers
    pub async fn peer_count(&self) -> usize {
        self.peers.read().await.len()
    }

    /// Configured membership capacity
    pub fn max_peers(&self) -> usize {
        self.max_peers
    }

    /// Peers seen within one refresh interval; seeds always count
    pub async fn healthy_peer_count(&self) -> usize {
        self.peers
            .read()
            .await
            .values()
            .filter(|p| p.is_seed || !p.is_stale(self.refresh_interval))
            .count()
    }

    /// Whether the last refresh pass found fewer healthy peers than the
    /// configured target. Cleared once the count recovers.
    pub fn discovery_needed(&self) -> bool {
        self.discovery_needed.load(Ordering::Relaxed)
    }

    /// Run one maintenance pass: prune stale non-seed peers under capacity
    /// pressure, then re-evaluate the healthy-peer target.
    ///
    /// Returns true when discovery should be triggered.
    pub async fn refresh(&self) -> bool {
        let prune_window = self.refresh_interval * 2;
        let pressure = (self.max_peers as f64 * PRUNE_PRESSURE) as usize;

        {
            let mut peers = self.peers.write().await;
            if peers.len() > pressure {
                let stale: Vec<String> = peers
                    .values()
                    .filter(|p| !p.is_seed && p.is_stale(prune_window))
                    .map(|p| p.peer_id.clone())
                    .collect();

                for peer_id in stale {
                    peers.remove(&peer_id);
                    debug!("Pruned stale peer {}", peer_id);
                }
            }
        }

        let healthy = self.healthy_peer_count().await;
        let needs_discovery = healthy < self.min_healthy_peers;
        self.discovery_needed.store(needs_discovery, Ordering::Relaxed);

        if needs_discovery {
            warn!(
                "Healthy peers below target ({} < {}), discovery needed",
                healthy, self.min_healthy_peers
            );
        } else {
            trace!("Refresh pass complete: {} healthy peers", healthy);
        }
        needs_discovery
    }

    /// Run the periodic refresh loop until a shutdown signal arrives
    pub async fn run_refresh_loop(self: Arc<Self>, mut shutdown_rx: mpsc::Receiver<()>) {
        info!(
            "Starting peer list refresh loop (interval: {:?})",
            self.refresh_interval
        );
        let mut interval = tokio::time::interval(self.refresh_interval);
        // The first tick fires immediately; skip it so startup seeding settles
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.refresh().await;
                }
                _ = shutdown_rx.recv() => {
                    info!("Peer list refresh loop shutting down");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::config::SeedNodeEndpoint;
    use std::time::Instant;

    fn config_with_seeds(max_peers: usize, seeds: &[(&str, &str, u16)]) -> NodeConfig {
        NodeConfig {
            max_peers_in_list: max_peers,
            min_healthy_peers: 1,
            refresh_interval_minutes: 5,
            seed_nodes: seeds
                .iter()
                .map(|(id, host, port)| SeedNodeEndpoint::new(*id, *host, *port))
                .collect(),
            ..NodeConfig::default()
        }
    }

    #[tokio::test]
    async fn test_seeded_at_construction() {
        let config = config_with_seeds(10, &[("seed-1", "10.0.0.1", 7400)]);
        let manager = PeerListManager::new(&config);

        assert_eq!(manager.peer_count().await, 1);
        let seed = manager.get_peer("seed-1").await.unwrap();
        assert!(seed.is_seed);
        assert!(manager.is_seed_node("seed-1").await);
        assert!(!manager.is_seed_node("unknown").await);
    }

    #[tokio::test]
    async fn test_add_and_update_merges_fields() {
        let config = config_with_seeds(10, &[]);
        let manager = PeerListManager::new(&config);

        let added = manager
            .add_or_update_peer(PeerNode::new("peer-1", "10.0.0.1", 7400).with_registers(["reg-a"]))
            .await;
        assert!(added);

        // Peer migrated and picked up another register
        let updated = manager
            .add_or_update_peer(PeerNode::new("peer-1", "10.0.0.9", 7500).with_registers(["reg-b"]))
            .await;
        assert!(updated);
        assert_eq!(manager.peer_count().await, 1);

        let peer = manager.get_peer("peer-1").await.unwrap();
        assert_eq!(peer.endpoint(), "10.0.0.9:7500");
        assert!(peer.serves_register("reg-a"));
        assert!(peer.serves_register("reg-b"));
    }

    #[tokio::test]
    async fn test_update_never_demotes_seed() {
        let config = config_with_seeds(10, &[("seed-1", "10.0.0.1", 7400)]);
        let manager = PeerListManager::new(&config);

        // Discovery reports the seed as an ordinary peer; seed flag survives
        manager
            .add_or_update_peer(PeerNode::new("seed-1", "10.0.0.2", 7401))
            .await;

        let seed = manager.get_peer("seed-1").await.unwrap();
        assert!(seed.is_seed);
        assert_eq!(seed.endpoint(), "10.0.0.2:7401");
    }

    #[tokio::test]
    async fn test_rejects_empty_peer_id() {
        let config = config_with_seeds(10, &[]);
        let manager = PeerListManager::new(&config);

        assert!(!manager.add_or_update_peer(PeerNode::new("", "10.0.0.1", 7400)).await);
        assert!(!manager.add_or_update_peer(PeerNode::new("   ", "10.0.0.1", 7400)).await);
        assert_eq!(manager.peer_count().await, 0);
    }

    #[tokio::test]
    async fn test_capacity_evicts_stalest_non_seed() {
        let config = config_with_seeds(3, &[("seed-1", "10.0.0.1", 7400)]);
        let manager = PeerListManager::new(&config);

        manager.add_or_update_peer(PeerNode::new("peer-1", "10.0.0.2", 7400)).await;
        manager.add_or_update_peer(PeerNode::new("peer-2", "10.0.0.3", 7400)).await;
        assert_eq!(manager.peer_count().await, 3);

        // peer-1 is the stalest entry
        {
            let mut peers = manager.peers.write().await;
            peers.get_mut("peer-1").unwrap().last_seen =
                Instant::now() - Duration::from_secs(600);
        }

        assert!(manager.add_or_update_peer(PeerNode::new("peer-3", "10.0.0.4", 7400)).await);
        assert_eq!(manager.peer_count().await, 3);
        assert!(manager.get_peer("peer-1").await.is_none());
        assert!(manager.get_peer("peer-3").await.is_some());
        assert!(manager.get_peer("seed-1").await.is_some());
    }

    #[tokio::test]
    async fn test_full_of_seeds_rejects_new_peer() {
        let config = config_with_seeds(
            2,
            &[("seed-1", "10.0.0.1", 7400), ("seed-2", "10.0.0.2", 7400)],
        );
        let manager = PeerListManager::new(&config);

        let added = manager
            .add_or_update_peer(PeerNode::new("peer-1", "10.0.0.3", 7400))
            .await;
        assert!(!added);
        assert_eq!(manager.peer_count().await, 2);
    }

    #[tokio::test]
    async fn test_get_peers_by_register() {
        let config = config_with_seeds(10, &[]);
        let manager = PeerListManager::new(&config);

        manager
            .add_or_update_peer(PeerNode::new("peer-1", "10.0.0.1", 7400).with_registers(["reg-a"]))
            .await;
        manager
            .add_or_update_peer(
                PeerNode::new("peer-2", "10.0.0.2", 7400).with_registers(["reg-a", "reg-b"]),
            )
            .await;
        manager
            .add_or_update_peer(PeerNode::new("peer-3", "10.0.0.3", 7400).with_registers(["reg-b"]))
            .await;

        let mut for_a: Vec<String> = manager
            .get_peers_by_register("reg-a")
            .await
            .into_iter()
            .map(|p| p.peer_id)
            .collect();
        for_a.sort();
        assert_eq!(for_a, vec!["peer-1", "peer-2"]);

        assert!(manager.get_peers_by_register("reg-z").await.is_empty());
    }

    #[tokio::test]
    async fn test_refresh_prunes_stale_under_pressure() {
        let config = config_with_seeds(4, &[("seed-1", "10.0.0.1", 7400)]);
        let manager = PeerListManager::new(&config);

        for i in 2..=4 {
            manager
                .add_or_update_peer(PeerNode::new(format!("peer-{}", i), "10.0.0.5", 7400))
                .await;
        }
        assert_eq!(manager.peer_count().await, 4);

        // Everything but the seed goes stale beyond two refresh intervals
        {
            let mut peers = manager.peers.write().await;
            for peer in peers.values_mut().filter(|p| !p.is_seed) {
                peer.last_seen = Instant::now() - Duration::from_secs(601);
            }
        }

        manager.refresh().await;
        assert_eq!(manager.peer_count().await, 1);
        assert!(manager.get_peer("seed-1").await.is_some());
    }

    #[tokio::test]
    async fn test_refresh_flags_discovery_needed() {
        let mut config = config_with_seeds(10, &[]);
        config.min_healthy_peers = 2;
        let manager = PeerListManager::new(&config);

        assert!(!manager.discovery_needed());
        assert!(manager.refresh().await);
        assert!(manager.discovery_needed());

        manager.add_or_update_peer(PeerNode::new("peer-1", "10.0.0.1", 7400)).await;
        manager.add_or_update_peer(PeerNode::new("peer-2", "10.0.0.2", 7400)).await;
        assert!(!manager.refresh().await);
        assert!(!manager.discovery_needed());
    }

    #[tokio::test]
    async fn test_concurrent_adds_stay_bounded() {
        let config = config_with_seeds(5, &[]);
        let manager = Arc::new(PeerListManager::new(&config));

        let mut handles = Vec::new();
        for i in 0..20 {
            let manager = manager.clone();
            handles.push(tokio::spawn(async move {
                manager
                    .add_or_update_peer(PeerNode::new(format!("peer-{}", i), "10.0.0.1", 7400))
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert!(manager.peer_count().await <= 5);
    }
}
