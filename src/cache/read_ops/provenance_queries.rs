use sqlx::SqliteExecutor;

use crate::cache::{ExecutionCache, ProvenanceEdge, DEFAULT_TRAVERSAL_DEPTH, REQUIRES_RELATION};
use crate::error::{ForgeError, Result};

use super::types::ProvenanceRow;

/// Ids reachable by following "depends on" edges away from `artifact_id`,
/// nearest first. Runs against any executor so writers can reuse it inside
/// their transaction.
async fn upstream_ids<'e, E>(
    executor: E,
    artifact_id: &str,
    max_depth: u32,
) -> Result<Vec<String>>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query_scalar::<_, String>(
        "WITH RECURSIVE upstream(id, depth) AS (
             SELECT to_id, 1 FROM provenance WHERE from_id = ?
             UNION ALL
             SELECT p.to_id, u.depth + 1
             FROM provenance p
             JOIN upstream u ON p.from_id = u.id
             WHERE u.depth < ?
         )
         SELECT id FROM upstream GROUP BY id ORDER BY MIN(depth), id",
    )
    .bind(artifact_id)
    .bind(i64::from(max_depth))
    .fetch_all(executor)
    .await
    .map_err(|e| ForgeError::DatabaseError(format!("Failed to get upstream of {artifact_id}: {e}")))
}

/// Ids that transitively depend on `artifact_id`, nearest first.
pub(in crate::cache) async fn downstream_ids<'e, E>(
    executor: E,
    artifact_id: &str,
    max_depth: u32,
) -> Result<Vec<String>>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query_scalar::<_, String>(
        "WITH RECURSIVE downstream(id, depth) AS (
             SELECT from_id, 1 FROM provenance WHERE to_id = ?
             UNION ALL
             SELECT p.from_id, d.depth + 1
             FROM provenance p
             JOIN downstream d ON p.to_id = d.id
             WHERE d.depth < ?
         )
         SELECT id FROM downstream GROUP BY id ORDER BY MIN(depth), id",
    )
    .bind(artifact_id)
    .bind(i64::from(max_depth))
    .fetch_all(executor)
    .await
    .map_err(|e| {
        ForgeError::DatabaseError(format!("Failed to get downstream of {artifact_id}: {e}"))
    })
}

impl ExecutionCache {
    /// Artifacts `artifact_id` depends on directly.
    pub async fn get_direct_dependencies(&self, artifact_id: &str) -> Result<Vec<String>> {
        sqlx::query_scalar::<_, String>(
            "SELECT to_id FROM provenance WHERE from_id = ? ORDER BY rowid",
        )
        .bind(artifact_id)
        .fetch_all(self.pool())
        .await
        .map_err(|e| ForgeError::DatabaseError(format!("Failed to get dependencies: {e}")))
    }

    /// Artifacts that depend on `artifact_id` directly.
    pub async fn get_direct_dependents(&self, artifact_id: &str) -> Result<Vec<String>> {
        sqlx::query_scalar::<_, String>(
            "SELECT from_id FROM provenance WHERE to_id = ? ORDER BY rowid",
        )
        .bind(artifact_id)
        .fetch_all(self.pool())
        .await
        .map_err(|e| ForgeError::DatabaseError(format!("Failed to get dependents: {e}")))
    }

    pub async fn get_upstream(&self, artifact_id: &str, max_depth: Option<u32>) -> Result<Vec<String>> {
        upstream_ids(
            self.pool(),
            artifact_id,
            max_depth.unwrap_or(DEFAULT_TRAVERSAL_DEPTH),
        )
        .await
    }

    pub async fn get_downstream(
        &self,
        artifact_id: &str,
        max_depth: Option<u32>,
    ) -> Result<Vec<String>> {
        downstream_ids(
            self.pool(),
            artifact_id,
            max_depth.unwrap_or(DEFAULT_TRAVERSAL_DEPTH),
        )
        .await
    }

    /// Every provenance edge in insertion order.
    pub async fn provenance_edges(&self) -> Result<Vec<ProvenanceEdge>> {
        sqlx::query_as::<_, ProvenanceRow>(
            "SELECT from_id, to_id, relation FROM provenance ORDER BY rowid",
        )
        .fetch_all(self.pool())
        .await
        .map_err(|e| ForgeError::DatabaseError(format!("Failed to list provenance: {e}")))
        .map(|rows| {
            rows.into_iter()
                .map(|row| ProvenanceEdge {
                    from_id: row.from_id,
                    to_id: row.to_id,
                    relation: row
                        .relation
                        .unwrap_or_else(|| REQUIRES_RELATION.to_string()),
                })
                .collect()
        })
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
mod tests {
    use crate::cache::ExecutionCache;

    async fn chain() -> ExecutionCache {
        // C -> B -> A, plus D -> A
        let cache = ExecutionCache::in_memory().await.unwrap();
        cache.add_provenance("B", "A", None).await.unwrap();
        cache.add_provenance("C", "B", None).await.unwrap();
        cache.add_provenance("D", "A", None).await.unwrap();
        cache
    }

    #[tokio::test]
    async fn upstream_is_nearest_first() {
        let cache = chain().await;
        assert_eq!(cache.get_upstream("C", None).await.unwrap(), vec!["B", "A"]);
        assert!(cache.get_upstream("A", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn downstream_orders_ties_by_id() {
        let cache = chain().await;
        assert_eq!(
            cache.get_downstream("A", None).await.unwrap(),
            vec!["B", "D", "C"]
        );
    }

    #[tokio::test]
    async fn traversal_respects_max_depth() {
        let cache = chain().await;
        assert_eq!(cache.get_downstream("A", Some(1)).await.unwrap(), vec!["B", "D"]);
        assert_eq!(cache.get_upstream("C", Some(1)).await.unwrap(), vec!["B"]);
    }

    #[tokio::test]
    async fn traversal_terminates_on_cycles() {
        let cache = ExecutionCache::in_memory().await.unwrap();
        cache.add_provenance("A", "B", None).await.unwrap();
        cache.add_provenance("B", "A", None).await.unwrap();

        let upstream = cache.get_upstream("A", None).await.unwrap();
        assert_eq!(upstream, vec!["B", "A"]);
    }

    #[tokio::test]
    async fn direct_queries_and_edge_snapshot() {
        let cache = chain().await;
        assert_eq!(cache.get_direct_dependents("A").await.unwrap(), vec!["B", "D"]);
        assert_eq!(cache.get_direct_dependencies("C").await.unwrap(), vec!["B"]);

        let edges = cache.provenance_edges().await.unwrap();
        assert_eq!(edges.len(), 3);
        assert!(edges.iter().all(|edge| edge.relation == "requires"));
    }
}
