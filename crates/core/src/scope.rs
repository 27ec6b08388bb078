//! Scopes: the enclosing entity that qualifies a descendant's identifier.

use serde::{Deserialize, Serialize};

use crate::entity::{EntityRef, EntityType, Node, ScopeEntity};
use crate::error::{CoreError, ValidationError};

/// A resolved scope: the enclosing entity (absent for the system root) and
/// the local identifiers of the whole chain, root first, ending with the
/// enclosing entity's own identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
    pub entity: Option<EntityRef>,
    pub id_path: Vec<String>,
}

impl Scope {
    /// The system root: no enclosing entity, empty chain.
    pub fn system() -> Self {
        Self {
            entity: None,
            id_path: Vec::new(),
        }
    }

    /// Build a scope from its ancestry, root first, ending with the
    /// enclosing entity itself. Every node must be a valid scope entity.
    pub fn from_chain(chain: &[Node]) -> Result<Self, CoreError> {
        let Some(last) = chain.last() else {
            return Ok(Self::system());
        };
        let mut id_path = Vec::with_capacity(chain.len());
        for node in chain {
            let entity = ScopeEntity::try_from(node)?;
            id_path.push(entity.identifier().to_string());
        }
        Ok(Self {
            entity: Some(EntityRef::from(last)),
            id_path,
        })
    }

    /// Scope for the children of an entity just resolved under `self`.
    pub fn child(&self, entity: EntityRef, identifier: &str) -> Self {
        let mut id_path = self.id_path.clone();
        id_path.push(identifier.to_string());
        Self {
            entity: Some(entity),
            id_path,
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.entity.as_ref().map(|e| e.id.as_str())
    }

    pub fn entity_type(&self) -> Option<EntityType> {
        self.entity.as_ref().map(|e| e.entity_type)
    }

    pub fn is_system(&self) -> bool {
        self.entity.is_none()
    }

    /// Check that an entity of `child_type` may be placed in this scope.
    pub fn check_accepts(&self, child_type: EntityType, child_id: Option<&str>) -> Result<(), ValidationError> {
        let allowed = child_type.allowed_scopes();
        let ok = match self.entity_type() {
            None => allowed.is_empty(),
            Some(scope_type) => allowed.contains(&scope_type),
        };
        if ok {
            return Ok(());
        }
        let scope_desc = match &self.entity {
            Some(e) => format!("{} '{}'", e.entity_type, e.id),
            None => "the system scope".to_string(),
        };
        Err(ValidationError::single(
            child_type,
            child_id.map(str::to_string),
            "_",
            format!("{child_type} cannot be placed under {scope_desc}"),
        ))
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.entity {
            Some(e) => write!(f, "{} {}", e.entity_type, e.id),
            None => f.write_str("system"),
        }
    }
}

// ---------------------------------------------------------------------------
// Scope Policy
// ---------------------------------------------------------------------------

/// What to do when a record's scope cannot be found in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScopePolicy {
    /// Count an error, skip the record and everything below it, continue.
    #[default]
    SkipSubtree,
    /// Treat the missing scope as fatal and roll back the open batch.
    AbortRun,
}

impl ScopePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SkipSubtree => "skip-subtree",
            Self::AbortRun => "abort-run",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "skip-subtree" => Some(Self::SkipSubtree),
            "abort-run" => Some(Self::AbortRun),
            _ => None,
        }
    }
}

impl std::fmt::Display for ScopePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
