//! [`GraphStore`] backed by PostgreSQL.

use arkiv_core::entity::{EntityType, Node};
use arkiv_core::types::Properties;
use async_trait::async_trait;
use sqlx::{Postgres, Transaction};

use crate::repositories::{EdgeRepo, NodeRepo};
use crate::store::{check_savepoint_name, GraphStore, GraphTx, StoreError};
use crate::DbPool;

/// Graph store over the `nodes` and `edges` tables.
#[derive(Clone)]
pub struct PgGraphStore {
    pool: DbPool,
}

impl PgGraphStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl GraphStore for PgGraphStore {
    async fn begin(&self) -> Result<Box<dyn GraphTx>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgGraphTx { tx }))
    }
}

/// An open PostgreSQL transaction.
pub struct PgGraphTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl GraphTx for PgGraphTx {
    async fn get_node(&mut self, id: &str) -> Result<Option<Node>, StoreError> {
        NodeRepo::find_by_id(&mut self.tx, id)
            .await?
            .map(Node::try_from)
            .transpose()
    }

    async fn create_node(&mut self, node: &Node) -> Result<(), StoreError> {
        NodeRepo::create(&mut self.tx, &node.id, node.entity_type, &node.properties).await?;
        Ok(())
    }

    async fn update_properties(
        &mut self,
        id: &str,
        set: &Properties,
        remove: &[String],
    ) -> Result<(), StoreError> {
        match NodeRepo::update_properties(&mut self.tx, id, set, remove).await? {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound(id.to_string())),
        }
    }

    async fn add_edge(&mut self, source: &str, label: &str, target: &str) -> Result<(), StoreError> {
        EdgeRepo::create(&mut self.tx, source, label, target).await?;
        Ok(())
    }

    async fn targets(&mut self, source: &str, label: &str) -> Result<Vec<Node>, StoreError> {
        EdgeRepo::list_targets(&mut self.tx, source, label)
            .await?
            .into_iter()
            .map(Node::try_from)
            .collect()
    }

    async fn nodes_of_type(&mut self, entity_type: EntityType) -> Result<Vec<Node>, StoreError> {
        NodeRepo::list_by_type(&mut self.tx, entity_type)
            .await?
            .into_iter()
            .map(Node::try_from)
            .collect()
    }

    async fn savepoint(&mut self, name: &str) -> Result<(), StoreError> {
        check_savepoint_name(name)?;
        sqlx::query(&format!("SAVEPOINT {name}"))
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn release_savepoint(&mut self, name: &str) -> Result<(), StoreError> {
        check_savepoint_name(name)?;
        sqlx::query(&format!("RELEASE SAVEPOINT {name}"))
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn rollback_to_savepoint(&mut self, name: &str) -> Result<(), StoreError> {
        check_savepoint_name(name)?;
        sqlx::query(&format!("ROLLBACK TO SAVEPOINT {name}"))
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        tracing::debug!("Transaction committed");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        tracing::debug!("Transaction rolled back");
        Ok(())
    }
}
