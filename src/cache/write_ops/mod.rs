#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![forbid(unsafe_code)]

mod artifact_ops;
mod history_ops;
mod maintenance_ops;
mod provenance_ops;

use sqlx::{Sqlite, Transaction};
use tokio::sync::MutexGuard;

use crate::cache::ExecutionCache;
use crate::error::{ForgeError, Result};

/// Exclusive writer: the instance lock plus an open transaction.
struct WriteTx<'a> {
    _guard: MutexGuard<'a, ()>,
    tx: Transaction<'static, Sqlite>,
}

impl WriteTx<'_> {
    async fn commit(self) -> Result<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| ForgeError::DatabaseError(format!("Failed to commit transaction: {e}")))
    }
}

impl ExecutionCache {
    async fn begin_write(&self) -> Result<WriteTx<'_>> {
        let guard = self.write_lock.lock().await;
        let tx = self
            .pool()
            .begin()
            .await
            .map_err(|e| ForgeError::DatabaseError(format!("Failed to begin transaction: {e}")))?;
        Ok(WriteTx { _guard: guard, tx })
    }
}
