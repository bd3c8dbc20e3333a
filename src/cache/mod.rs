#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![forbid(unsafe_code)]

mod mappers;
mod models;
mod read_ops;
mod write_ops;

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{ForgeError, Result};

pub use models::{
    CacheStats, CachedExecution, ExecutionRun, ExecutionUpdate, GoalExecution, ProvenanceEdge,
    RunSummary,
};

pub const SCHEMA_VERSION: &str = "1";

/// Upstream/downstream walks stop after this many hops unless told otherwise.
pub const DEFAULT_TRAVERSAL_DEPTH: u32 = 100;

/// Default relation recorded for a provenance edge.
pub const REQUIRES_RELATION: &str = "requires";

const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Content-addressed execution cache backed by SQLite.
///
/// Writers serialize on `write_lock` and run inside a single transaction;
/// readers go straight to the pool.
#[derive(Clone)]
pub struct ExecutionCache {
    pool: SqlitePool,
    write_lock: Arc<Mutex<()>>,
    path: Option<PathBuf>,
}

impl ExecutionCache {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| {
                ForgeError::DatabaseError(format!(
                    "Failed to open cache at {}: {e}",
                    path.display()
                ))
            })?;

        let cache = Self {
            pool,
            write_lock: Arc::new(Mutex::new(())),
            path: Some(path.to_path_buf()),
        };
        cache.initialize_schema().await?;
        info!(path = %path.display(), "Opened execution cache");
        Ok(cache)
    }

    /// Ephemeral cache. A single pinned connection keeps the database alive.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| ForgeError::DatabaseError(format!("Invalid in-memory options: {e}")))?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| ForgeError::DatabaseError(format!("Failed to open in-memory cache: {e}")))?;

        let cache = Self {
            pool,
            write_lock: Arc::new(Mutex::new(())),
            path: None,
        };
        cache.initialize_schema().await?;
        debug!("Opened in-memory execution cache");
        Ok(cache)
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    async fn initialize_schema(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA_SQL)
            .execute(self.pool())
            .await
            .map_err(|e| ForgeError::DatabaseError(format!("Failed to initialize schema: {e}")))?;
        self.set_metadata("schema_version", SCHEMA_VERSION).await
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
