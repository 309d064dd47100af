//! Error types for the peermesh node
//!
//! This module defines error types for the membership, connection-pool,
//! and transport components.

use std::fmt;

/// Error type for peer membership and connection operations
#[derive(Debug, Clone)]
pub enum MeshError {
    /// Configuration errors
    ConfigError {
        message: String,
        field: Option<String>,
    },

    /// Peer membership errors
    PeerError {
        message: String,
        peer: Option<String>,
        source: Option<String>,
    },

    /// Network and dialing errors
    NetworkError {
        message: String,
        address: Option<String>,
        source: Option<String>,
    },

    /// Transport channel errors
    TransportError {
        message: String,
        peer: Option<String>,
        source: Option<String>,
    },

    /// Validation errors
    ValidationError {
        message: String,
        field: Option<String>,
    },
}

impl MeshError {
    /// Create a new ConfigError
    pub fn config_error(message: impl Into<String>) -> Self {
        MeshError::ConfigError {
            message: message.into(),
            field: None,
        }
    }

    /// Create a new ConfigError with field
    pub fn config_error_with_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        MeshError::ConfigError {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a new PeerError
    pub fn peer_error(message: impl Into<String>) -> Self {
        MeshError::PeerError {
            message: message.into(),
            peer: None,
            source: None,
        }
    }

    /// Create a new PeerError with peer id
    pub fn peer_error_with_peer(message: impl Into<String>, peer: impl Into<String>) -> Self {
        MeshError::PeerError {
            message: message.into(),
            peer: Some(peer.into()),
            source: None,
        }
    }

    /// Create a new PeerError with peer and source
    pub fn peer_error_full(
        message: impl Into<String>,
        peer: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        MeshError::PeerError {
            message: message.into(),
            peer: Some(peer.into()),
            source: Some(source.into()),
        }
    }

    /// Create a new NetworkError
    pub fn network_error(message: impl Into<String>) -> Self {
        MeshError::NetworkError {
            message: message.into(),
            address: None,
            source: None,
        }
    }

    /// Create a new NetworkError with address
    pub fn network_error_with_address(
        message: impl Into<String>,
        address: impl Into<String>,
    ) -> Self {
        MeshError::NetworkError {
            message: message.into(),
            address: Some(address.into()),
            source: None,
        }
    }

    /// Create a new NetworkError with address and source
    pub fn network_error_full(
        message: impl Into<String>,
        address: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        MeshError::NetworkError {
            message: message.into(),
            address: Some(address.into()),
            source: Some(source.into()),
        }
    }

    /// Create a new TransportError
    pub fn transport_error(message: impl Into<String>) -> Self {
        MeshError::TransportError {
            message: message.into(),
            peer: None,
            source: None,
        }
    }

    /// Create a new TransportError with peer and source
    pub fn transport_error_full(
        message: impl Into<String>,
        peer: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        MeshError::TransportError {
            message: message.into(),
            peer: Some(peer.into()),
            source: Some(source.into()),
        }
    }

    /// Create a new ValidationError
    pub fn validation_error(message: impl Into<String>) -> Self {
        MeshError::ValidationError {
            message: message.into(),
            field: None,
        }
    }

    /// Create a new ValidationError with field
    pub fn validation_error_with_field(
        message: impl Into<String>,
        field: impl Into<String>,
    ) -> Self {
        MeshError::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Whether the error is worth retrying (dial timeouts, resets)
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            MeshError::NetworkError { .. } | MeshError::TransportError { .. }
        )
    }
}

impl fmt::Display for MeshError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeshError::ConfigError { message, field } => {
                if let Some(field_val) = field {
                    write!(f, "Config error: {} (field: {})", message, field_val)
                } else {
                    write!(f, "Config error: {}", message)
                }
            }
            MeshError::PeerError { message, peer, source } => match (peer, source) {
                (Some(p), Some(s)) => {
                    write!(f, "Peer error: {} (peer: {}, source: {})", message, p, s)
                }
                (Some(p), None) => write!(f, "Peer error: {} (peer: {})", message, p),
                (None, Some(s)) => write!(f, "Peer error: {} (source: {})", message, s),
                (None, None) => write!(f, "Peer error: {}", message),
            },
            MeshError::NetworkError { message, address, source } => match (address, source) {
                (Some(a), Some(s)) => {
                    write!(f, "Network error: {} (address: {}, source: {})", message, a, s)
                }
                (Some(a), None) => write!(f, "Network error: {} (address: {})", message, a),
                (None, Some(s)) => write!(f, "Network error: {} (source: {})", message, s),
                (None, None) => write!(f, "Network error: {}", message),
            },
            MeshError::TransportError { message, peer, source } => match (peer, source) {
                (Some(p), Some(s)) => {
                    write!(f, "Transport error: {} (peer: {}, source: {})", message, p, s)
                }
                (Some(p), None) => write!(f, "Transport error: {} (peer: {})", message, p),
                (None, Some(s)) => write!(f, "Transport error: {} (source: {})", message, s),
                (None, None) => write!(f, "Transport error: {}", message),
            },
            MeshError::ValidationError { message, field } => {
                if let Some(field_val) = field {
                    write!(f, "Validation error: {} (field: {})", message, field_val)
                } else {
                    write!(f, "Validation error: {}", message)
                }
            }
        }
    }
}

impl std::error::Error for MeshError {}

// Implement From traits for common error types

impl From<std::io::Error> for MeshError {
    fn from(err: std::io::Error) -> Self {
        MeshError::network_error_full(err.to_string(), "unknown", err.kind().to_string())
    }
}

impl From<std::net::AddrParseError> for MeshError {
    fn from(err: std::net::AddrParseError) -> Self {
        MeshError::network_error_full("Failed to parse address", "unknown", err.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for MeshError {
    fn from(_err: tokio::time::error::Elapsed) -> Self {
        MeshError::network_error("Operation timed out")
    }
}

impl From<serde_json::Error> for MeshError {
    fn from(err: serde_json::Error) -> Self {
        MeshError::config_error(format!("Failed to parse configuration: {}", err))
    }
}
