use sqlx::{QueryBuilder, Sqlite};
use tracing::debug;

use crate::cache::read_ops::downstream_ids;
use crate::cache::{ExecutionCache, DEFAULT_TRAVERSAL_DEPTH, REQUIRES_RELATION};
use crate::error::{ForgeError, Result};

impl ExecutionCache {
    /// Records that `from_id` depends on `to_id`. Re-adding an edge is a no-op.
    pub async fn add_provenance(
        &self,
        from_id: &str,
        to_id: &str,
        relation: Option<&str>,
    ) -> Result<()> {
        let mut write = self.begin_write().await?;
        sqlx::query("INSERT OR IGNORE INTO provenance (from_id, to_id, relation) VALUES (?, ?, ?)")
            .bind(from_id)
            .bind(to_id)
            .bind(relation.unwrap_or(REQUIRES_RELATION))
            .execute(&mut *write.tx)
            .await
            .map_err(|e| ForgeError::DatabaseError(format!("Failed to add provenance: {e}")))?;
        write.commit().await
    }

    /// Batch form of [`Self::add_provenance`] with the default relation, in
    /// one transaction.
    pub async fn add_provenance_edges(&self, edges: &[(String, String)]) -> Result<()> {
        if edges.is_empty() {
            return Ok(());
        }

        let mut write = self.begin_write().await?;
        for (from_id, to_id) in edges {
            sqlx::query(
                "INSERT OR IGNORE INTO provenance (from_id, to_id, relation) VALUES (?, ?, ?)",
            )
            .bind(from_id)
            .bind(to_id)
            .bind(REQUIRES_RELATION)
            .execute(&mut *write.tx)
            .await
            .map_err(|e| ForgeError::DatabaseError(format!("Failed to add provenance: {e}")))?;
        }
        write.commit().await
    }

    /// Marks everything downstream of `artifact_id` pending. The walk and the
    /// update share one transaction.
    pub async fn invalidate_downstream(&self, artifact_id: &str) -> Result<Vec<String>> {
        let mut write = self.begin_write().await?;
        let downstream = downstream_ids(&mut *write.tx, artifact_id, DEFAULT_TRAVERSAL_DEPTH).await?;

        if !downstream.is_empty() {
            let mut builder = QueryBuilder::<Sqlite>::new(
                "UPDATE artifacts SET status = 'pending', updated_at = unixepoch('now') WHERE id IN (",
            );
            let mut ids = builder.separated(", ");
            for id in &downstream {
                ids.push_bind(id);
            }
            ids.push_unseparated(")");

            builder
                .build()
                .execute(&mut *write.tx)
                .await
                .map_err(|e| {
                    ForgeError::DatabaseError(format!("Failed to invalidate downstream: {e}"))
                })?;
        }

        write.commit().await?;
        debug!(artifact_id, count = downstream.len(), "Invalidated downstream artifacts");
        Ok(downstream)
    }
}
