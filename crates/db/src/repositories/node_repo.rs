//! Repository for the `nodes` table.

use arkiv_core::entity::EntityType;
use arkiv_core::types::Properties;
use sqlx::PgConnection;

use crate::models::node::{properties_json, NodeRow};

/// Column list for nodes queries.
const COLUMNS: &str = "id, entity_type, properties, created_at, updated_at";

/// Provides CRUD operations for graph nodes.
pub struct NodeRepo;

impl NodeRepo {
    /// Insert a node, returning the created row.
    pub async fn create(
        conn: &mut PgConnection,
        id: &str,
        entity_type: EntityType,
        properties: &Properties,
    ) -> Result<NodeRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO nodes (id, entity_type, properties)
             VALUES ($1, $2, $3)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, NodeRow>(&query)
            .bind(id)
            .bind(entity_type.as_str())
            .bind(properties_json(properties))
            .fetch_one(conn)
            .await
    }

    /// Find a node by id.
    pub async fn find_by_id(
        conn: &mut PgConnection,
        id: &str,
    ) -> Result<Option<NodeRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM nodes WHERE id = $1");
        sqlx::query_as::<_, NodeRow>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    /// Merge `set` into the node's properties and drop the `remove` keys.
    ///
    /// Returns `None` if no node has that id.
    pub async fn update_properties(
        conn: &mut PgConnection,
        id: &str,
        set: &Properties,
        remove: &[String],
    ) -> Result<Option<NodeRow>, sqlx::Error> {
        let query = format!(
            "UPDATE nodes SET
                properties = (properties - $2::text[]) || $3::jsonb,
                updated_at = NOW()
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, NodeRow>(&query)
            .bind(id)
            .bind(remove)
            .bind(properties_json(set))
            .fetch_optional(conn)
            .await
    }

    /// List all nodes of one type, ordered by id.
    pub async fn list_by_type(
        conn: &mut PgConnection,
        entity_type: EntityType,
    ) -> Result<Vec<NodeRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM nodes WHERE entity_type = $1 ORDER BY id");
        sqlx::query_as::<_, NodeRow>(&query)
            .bind(entity_type.as_str())
            .fetch_all(conn)
            .await
    }
}
