//! CLI module
//!
//! Command-line argument parsing and node configuration.

pub mod args;
pub mod config;

// Re-export main types
pub use args::CliArgs;
pub use config::{NodeConfig, SeedNodeEndpoint};
