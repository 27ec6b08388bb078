//! Node row model.

use arkiv_core::entity::{EntityType, Node};
use arkiv_core::types::{Properties, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

use crate::store::StoreError;

/// A row from the `nodes` table.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct NodeRow {
    pub id: String,
    pub entity_type: String,
    pub properties: serde_json::Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TryFrom<NodeRow> for Node {
    type Error = StoreError;

    fn try_from(row: NodeRow) -> Result<Self, Self::Error> {
        let entity_type = EntityType::from_str(&row.entity_type).ok_or_else(|| {
            StoreError::Internal(format!(
                "Node '{}' has unknown entity type '{}'",
                row.id, row.entity_type
            ))
        })?;
        let properties = match row.properties {
            serde_json::Value::Object(map) => map.into_iter().collect::<Properties>(),
            other => {
                return Err(StoreError::Internal(format!(
                    "Node '{}' has non-object properties: {other}",
                    row.id
                )))
            }
        };
        Ok(Node::new(row.id, entity_type, properties))
    }
}

/// Properties as the JSONB value stored in `nodes.properties`.
pub fn properties_json(properties: &Properties) -> serde_json::Value {
    serde_json::Value::Object(
        properties
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
    )
}
