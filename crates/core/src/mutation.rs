//! Mutation outcomes produced by resolving one record against the store.

use serde::{Deserialize, Serialize};

use crate::bundle::Bundle;
use crate::entity::EntityRef;

/// How resolving a record changed the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationState {
    Created,
    Updated,
    Unchanged,
}

impl MutationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Unchanged => "unchanged",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "created" => Some(Self::Created),
            "updated" => Some(Self::Updated),
            "unchanged" => Some(Self::Unchanged),
            _ => None,
        }
    }

    /// All valid state values.
    pub const ALL: &'static [&'static str] = &["created", "updated", "unchanged"];

    /// Whether the store was written to.
    pub fn is_change(&self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

impl std::fmt::Display for MutationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The result of resolving one bundle.
///
/// `entity` is set for every state, UNCHANGED included, since the entity
/// becomes the scope of the record's children either way. `prior` holds the
/// stored state that an UPDATE replaced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mutation {
    pub state: MutationState,
    pub entity: EntityRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prior: Option<Bundle>,
}

impl Mutation {
    pub fn created(entity: EntityRef) -> Self {
        Self {
            state: MutationState::Created,
            entity,
            prior: None,
        }
    }

    pub fn updated(entity: EntityRef, prior: Bundle) -> Self {
        Self {
            state: MutationState::Updated,
            entity,
            prior: Some(prior),
        }
    }

    pub fn unchanged(entity: EntityRef) -> Self {
        Self {
            state: MutationState::Unchanged,
            entity,
            prior: None,
        }
    }

    pub fn is_change(&self) -> bool {
        self.state.is_change()
    }
}

impl std::fmt::Display for Mutation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.state.as_str().to_uppercase(),
            self.entity.entity_type,
            self.entity.id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityType;

    fn unit(id: &str) -> EntityRef {
        EntityRef {
            id: id.into(),
            entity_type: EntityType::DocumentaryUnit,
        }
    }

    #[test]
    fn state_names_round_trip() {
        for name in MutationState::ALL {
            assert_eq!(MutationState::from_str(name).unwrap().as_str(), *name);
        }
    }

    #[test]
    fn only_created_and_updated_are_changes() {
        assert!(Mutation::created(unit("a")).is_change());
        assert!(Mutation::updated(unit("a"), Bundle::new(EntityType::DocumentaryUnit)).is_change());
        assert!(!Mutation::unchanged(unit("a")).is_change());
    }

    #[test]
    fn display_names_state_type_and_id() {
        assert_eq!(
            Mutation::created(unit("gb-repo_001")).to_string(),
            "CREATED DocumentaryUnit gb-repo_001"
        );
    }
}
