//! Repository for the `edges` table.

use sqlx::PgConnection;

use crate::models::edge::EdgeRow;
use crate::models::node::NodeRow;

/// Column list for edges queries.
const COLUMNS: &str = "id, source_id, label, target_id, created_at";

/// Provides operations on labelled edges between nodes.
pub struct EdgeRepo;

impl EdgeRepo {
    /// Insert an edge unless it already exists.
    ///
    /// Returns the new row, or `None` when the edge was already present.
    pub async fn create(
        conn: &mut PgConnection,
        source_id: &str,
        label: &str,
        target_id: &str,
    ) -> Result<Option<EdgeRow>, sqlx::Error> {
        let query = format!(
            "INSERT INTO edges (source_id, label, target_id)
             VALUES ($1, $2, $3)
             ON CONFLICT ON CONSTRAINT uq_edges_source_label_target DO NOTHING
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, EdgeRow>(&query)
            .bind(source_id)
            .bind(label)
            .bind(target_id)
            .fetch_optional(conn)
            .await
    }

    /// List the nodes reached from `source_id` over `label` edges, in the
    /// order the edges were created.
    pub async fn list_targets(
        conn: &mut PgConnection,
        source_id: &str,
        label: &str,
    ) -> Result<Vec<NodeRow>, sqlx::Error> {
        sqlx::query_as::<_, NodeRow>(
            "SELECT n.id, n.entity_type, n.properties, n.created_at, n.updated_at
             FROM edges e
             JOIN nodes n ON n.id = e.target_id
             WHERE e.source_id = $1 AND e.label = $2
             ORDER BY e.id",
        )
        .bind(source_id)
        .bind(label)
        .fetch_all(conn)
        .await
    }

    /// List all edges leaving a node.
    pub async fn list_by_source(
        conn: &mut PgConnection,
        source_id: &str,
    ) -> Result<Vec<EdgeRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM edges WHERE source_id = $1 ORDER BY id");
        sqlx::query_as::<_, EdgeRow>(&query)
            .bind(source_id)
            .fetch_all(conn)
            .await
    }
}
