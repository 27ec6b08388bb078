use std::fmt;

use crate::entity::EntityType;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A source record cannot be turned into a bundle (e.g. no identifier).
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A scope the record must live under is absent from the store.
    #[error("Scope not found: {scope} ({reason})")]
    ScopeResolution { scope: String, reason: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn invalid_record(message: impl Into<String>) -> Self {
        Self::InvalidRecord(message.into())
    }

    pub fn scope_not_found(scope: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ScopeResolution {
            scope: scope.into(),
            reason: reason.into(),
        }
    }
}

/// A bundle rejected by a schema or uniqueness constraint.
///
/// Errors are grouped per offending field; `"_"` holds errors that concern
/// the bundle as a whole.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub entity_type: EntityType,
    pub id: Option<String>,
    pub errors: Vec<(String, String)>,
}

impl ValidationError {
    pub fn new(entity_type: EntityType, id: Option<String>) -> Self {
        Self {
            entity_type,
            id,
            errors: Vec::new(),
        }
    }

    pub fn single(
        entity_type: EntityType,
        id: Option<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let mut err = Self::new(entity_type, id);
        err.push(field, message);
        err
    }

    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push((field.into(), message.into()));
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// `Ok(())` when no errors were collected.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Validation failed for {}", self.entity_type)?;
        if let Some(id) = &self.id {
            write!(f, " '{id}'")?;
        }
        let details: Vec<String> = self
            .errors
            .iter()
            .map(|(field, message)| format!("{field}: {message}"))
            .collect();
        write!(f, ": {}", details.join("; "))
    }
}

impl std::error::Error for ValidationError {}
