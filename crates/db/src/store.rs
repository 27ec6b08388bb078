//! The graph store seam.
//!
//! The import pipeline talks to storage only through [`GraphStore`] and the
//! transactions it hands out. Each run opens one transaction per batch and
//! must end it explicitly with [`GraphTx::commit`] or [`GraphTx::rollback`].

use arkiv_core::entity::{EntityType, Node};
use arkiv_core::types::Properties;
use async_trait::async_trait;

/// Errors raised by a graph store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Node not found: {0}")]
    NotFound(String),

    /// A uniqueness, foreign key or check constraint rejected the write.
    #[error("Constraint violation: {0}")]
    Constraint(String),

    /// The store could not be reached or stopped responding.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Store error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Constraint violations are per-record problems; everything else ends
    /// the run.
    pub fn is_constraint(&self) -> bool {
        matches!(self, Self::Constraint(_))
    }
}

/// Classify a sqlx error.
///
/// - SQLSTATE class `23` (integrity constraint violation) maps to
///   [`StoreError::Constraint`].
/// - Pool and I/O failures map to [`StoreError::Unavailable`].
/// - Everything else stays a [`StoreError::Database`].
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err)
                if db_err.code().is_some_and(|code| code.starts_with("23")) =>
            {
                let constraint = db_err.constraint().unwrap_or("unknown");
                Self::Constraint(format!("{} ({constraint})", db_err.message()))
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                Self::Unavailable(err.to_string())
            }
            _ => Self::Database(err),
        }
    }
}

/// A directed, labelled edge between two nodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Edge {
    pub source: String,
    pub label: String,
    pub target: String,
}

impl Edge {
    pub fn new(source: impl Into<String>, label: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            label: label.into(),
            target: target.into(),
        }
    }
}

/// Hands out transactions. Implementations are shared across the run.
#[async_trait]
pub trait GraphStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn GraphTx>, StoreError>;
}

/// One open store transaction.
///
/// Savepoints nest: `rollback_to_savepoint` undoes everything written since
/// the most recent savepoint of that name and leaves it in place, while
/// `release_savepoint` keeps the writes and drops the savepoint.
#[async_trait]
pub trait GraphTx: Send {
    async fn get_node(&mut self, id: &str) -> Result<Option<Node>, StoreError>;

    /// Insert a new node. Fails with a constraint error if the id exists.
    async fn create_node(&mut self, node: &Node) -> Result<(), StoreError>;

    /// Overwrite the `set` properties and drop the `remove` keys, leaving
    /// all other properties as they are.
    async fn update_properties(
        &mut self,
        id: &str,
        set: &Properties,
        remove: &[String],
    ) -> Result<(), StoreError>;

    /// Add an edge. Adding an existing edge is a no-op; both endpoints must
    /// exist.
    async fn add_edge(&mut self, source: &str, label: &str, target: &str) -> Result<(), StoreError>;

    /// Nodes reached from `source` over edges labelled `label`, in insertion
    /// order.
    async fn targets(&mut self, source: &str, label: &str) -> Result<Vec<Node>, StoreError>;

    /// All nodes of one type, ordered by id.
    async fn nodes_of_type(&mut self, entity_type: EntityType) -> Result<Vec<Node>, StoreError>;

    async fn savepoint(&mut self, name: &str) -> Result<(), StoreError>;

    async fn release_savepoint(&mut self, name: &str) -> Result<(), StoreError>;

    async fn rollback_to_savepoint(&mut self, name: &str) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

/// Savepoint names are interpolated into SQL, so only plain identifiers are
/// accepted.
pub fn check_savepoint_name(name: &str) -> Result<(), StoreError> {
    let valid = !name.is_empty()
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(StoreError::Internal(format!("Invalid savepoint name: {name:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn savepoint_names_must_be_identifiers() {
        assert!(check_savepoint_name("arkiv_bundle").is_ok());
        assert!(check_savepoint_name("").is_err());
        assert!(check_savepoint_name("1abc").is_err());
        assert!(check_savepoint_name("x; DROP TABLE nodes").is_err());
    }

    #[test]
    fn only_constraint_errors_are_per_record() {
        assert!(StoreError::Constraint("dup".into()).is_constraint());
        assert!(!StoreError::Unavailable("down".into()).is_constraint());
        assert!(!StoreError::from(sqlx::Error::PoolTimedOut).is_constraint());
    }
}
