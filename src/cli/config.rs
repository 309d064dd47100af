//! Node configuration module
//!
//! Loads and validates the membership/pool configuration. Configuration is
//! supplied once at startup and never reloaded live.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// A statically configured bootstrap node
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeedNodeEndpoint {
    /// Stable node identity
    pub node_id: String,
    /// Hostname or IP address
    pub hostname: String,
    /// Listening port
    pub port: u16,
}

impl SeedNodeEndpoint {
    pub fn new(node_id: impl Into<String>, hostname: impl Into<String>, port: u16) -> Self {
        Self {
            node_id: node_id.into(),
            hostname: hostname.into(),
            port,
        }
    }

    /// The dialable "host:port" form of this endpoint
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.hostname, self.port)
    }
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_idle_timeout_secs() -> u64 {
    300
}

/// Configuration for the peer list manager and connection pool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Upper bound on the membership list (and the connection ceiling)
    pub max_peers_in_list: usize,
    /// Healthy-peer count the refresh loop tries to maintain
    pub min_healthy_peers: usize,
    /// Cadence of the membership refresh pass, in minutes
    pub refresh_interval_minutes: u64,
    /// Consecutive failures before a connection is torn down
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Idle duration after which a non-seed connection is reclaimed
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    /// Static bootstrap nodes, always retained in the list
    #[serde(default)]
    pub seed_nodes: Vec<SeedNodeEndpoint>,
}

impl NodeConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e)
        })?;
        let config: NodeConfig = serde_json::from_str(&data).map_err(|e| {
            anyhow::anyhow!("Failed to parse config file '{}': {}", path.display(), e)
        })?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_peers_in_list == 0 {
            return Err(anyhow::anyhow!("max_peers_in_list must be at least 1"));
        }

        if self.min_healthy_peers > self.max_peers_in_list {
            return Err(anyhow::anyhow!(
                "min_healthy_peers cannot exceed max_peers_in_list"
            ));
        }

        if self.refresh_interval_minutes == 0 {
            return Err(anyhow::anyhow!("refresh_interval_minutes must be at least 1"));
        }

        if self.failure_threshold == 0 {
            return Err(anyhow::anyhow!("failure_threshold must be at least 1"));
        }

        if self.seed_nodes.len() > self.max_peers_in_list {
            return Err(anyhow::anyhow!(
                "seed_nodes count exceeds max_peers_in_list"
            ));
        }

        for seed in &self.seed_nodes {
            if seed.node_id.trim().is_empty() {
                return Err(anyhow::anyhow!("seed node_id cannot be empty"));
            }
            if seed.hostname.trim().is_empty() {
                return Err(anyhow::anyhow!(
                    "seed hostname cannot be empty (node: {})",
                    seed.node_id
                ));
            }
            if seed.port == 0 {
                return Err(anyhow::anyhow!(
                    "seed port cannot be 0 (node: {})",
                    seed.node_id
                ));
            }
        }

        Ok(())
    }

    /// The refresh cadence as a duration
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_minutes * 60)
    }

    /// The idle reclamation threshold as a duration
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            max_peers_in_list: 50,
            min_healthy_peers: 3,
            refresh_interval_minutes: 5,
            failure_threshold: default_failure_threshold(),
            idle_timeout_secs: default_idle_timeout_secs(),
            seed_nodes: Vec::new(),
        }
    }
}
