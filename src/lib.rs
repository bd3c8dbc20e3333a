pub mod artifact_graph;
pub mod cache;
pub mod cascade;
pub mod config;
pub mod discovery;
pub mod error;
pub mod graph;
pub mod hashing;
pub mod incremental;
pub mod logging;
pub mod ports;
pub mod types;

pub use artifact_graph::{ArtifactGraph, ArtifactTask, ParallelGroup};
pub use cache::ExecutionCache;
pub use cascade::{CascadeEngine, CascadeExecution, CascadePreview, WaveConfidence, WeaknessScore};
pub use config::ForgeConfig;
pub use discovery::{DiscoveryRecovery, DynamicDiscovery};
pub use error::{DiscoveryError, ForgeError, Result};
pub use incremental::IncrementalExecutor;
pub use types::*;
