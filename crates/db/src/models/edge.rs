//! Edge row model.

use arkiv_core::types::Timestamp;
use serde::Serialize;
use sqlx::FromRow;

use crate::store::Edge;

/// A row from the `edges` table.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct EdgeRow {
    pub id: i64,
    pub source_id: String,
    pub label: String,
    pub target_id: String,
    pub created_at: Timestamp,
}

impl From<EdgeRow> for Edge {
    fn from(row: EdgeRow) -> Self {
        Edge::new(row.source_id, row.label, row.target_id)
    }
}
