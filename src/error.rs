#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![forbid(unsafe_code)]

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ForgeError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("SQLx error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Graph error: {0}")]
    GraphError(String),

    #[error("Artifact error: {0}")]
    ArtifactError(String),

    #[error("Cascade error: {0}")]
    CascadeError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Why a discovery call gave up without producing a graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryFailure {
    /// The proposer kept returning nothing usable.
    NoArtifacts { attempts: u32 },
    /// The longest dependency chain is longer than allowed.
    DepthExceeded { depth: usize, limit: usize },
}

impl std::fmt::Display for DiscoveryFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoArtifacts { attempts } => {
                write!(f, "no artifacts discovered after {attempts} attempts")
            }
            Self::DepthExceeded { depth, limit } => write!(
                f,
                "dependency depth {depth} exceeds limit of {limit}; decompose the goal"
            ),
        }
    }
}

/// Terminal outcomes of artifact discovery. Callers match on these instead of
/// inspecting error strings.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Discovery failed: {0}")]
    DiscoveryFailed(DiscoveryFailure),

    #[error("Graph explosion: {count} artifacts exceeds limit of {limit}")]
    GraphExplosion { count: usize, limit: usize },

    #[error("Cyclic dependency: {}", cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<String> },

    #[error(transparent)]
    Infrastructure(#[from] ForgeError),
}

pub type Result<T> = std::result::Result<T, ForgeError>;

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::{DiscoveryError, DiscoveryFailure, ForgeError};

    #[test]
    fn infrastructure_errors_pass_through_unchanged() {
        let err = DiscoveryError::from(ForgeError::DatabaseError("down".to_string()));
        assert_eq!(err.to_string(), "Database error: down");
        assert!(matches!(
            err,
            DiscoveryError::Infrastructure(ForgeError::DatabaseError(_))
        ));
    }

    #[test]
    fn cyclic_dependency_message_renders_path() {
        let err = DiscoveryError::CyclicDependency {
            cycle: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "Cyclic dependency: a -> b -> a");
    }

    #[test]
    fn depth_exceeded_message_mentions_limit() {
        let err = DiscoveryError::DiscoveryFailed(DiscoveryFailure::DepthExceeded {
            depth: 12,
            limit: 10,
        });
        assert!(err.to_string().contains("12 exceeds limit of 10"));
    }
}
