//! CLI arguments module
//!
//! Defines command-line argument parsing using clap.

use clap::Parser;
use std::path::PathBuf;

/// CLI arguments for the peermesh node
#[derive(Debug, Parser)]
#[command(name = "peermesh")]
#[command(about = "Bounded peer membership and connection pooling for gossip mesh nodes", long_about = None)]
pub struct CliArgs {
    /// Path to the JSON node configuration file
    #[arg(value_name = "CONFIG_FILE")]
    pub config_file: PathBuf,

    /// Override the local node id (defaults to a random id)
    #[arg(long, value_name = "ID")]
    pub node_id: Option<String>,

    /// Dial timeout for outbound connections, in seconds
    #[arg(long, default_value_t = 10)]
    pub dial_timeout: u64,

    /// Interval between idle-connection cleanup passes, in seconds
    #[arg(long, default_value_t = 60)]
    pub cleanup_interval: u64,

    /// Use the in-process transport instead of TCP (local simulation)
    #[arg(long)]
    pub simulate: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Quiet mode (no output except errors)
    #[arg(short, long)]
    pub quiet: bool,
}

impl CliArgs {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Check if quiet mode is enabled
    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    /// Get the log level based on verbosity settings
    pub fn log_level(&self) -> tracing::Level {
        if self.verbose {
            tracing::Level::DEBUG
        } else if self.quiet {
            tracing::Level::ERROR
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let args = CliArgs {
            config_file: PathBuf::from("node.json"),
            node_id: None,
            dial_timeout: 10,
            cleanup_interval: 60,
            simulate: false,
            verbose: false,
            quiet: false,
        };

        assert_eq!(args.dial_timeout, 10);
        assert_eq!(args.cleanup_interval, 60);
        assert!(!args.simulate);
        assert_eq!(args.log_level(), tracing::Level::INFO);
    }

    #[test]
    fn test_log_level_verbose_wins() {
        let args = CliArgs {
            config_file: PathBuf::from("node.json"),
            node_id: None,
            dial_timeout: 10,
            cleanup_interval: 60,
            simulate: false,
            verbose: true,
            quiet: true,
        };

        assert_eq!(args.log_level(), tracing::Level::DEBUG);
    }
}
