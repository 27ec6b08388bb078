//! Entity types, the generic node representation, and typed views over it.
//!
//! The store only knows about [`Node`]s: an id, a type tag and a property
//! map. Code that needs a specific kind of entity converts a node through
//! `TryFrom<&Node>`, which checks the type tag and the properties the view
//! relies on.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{keys, Properties};

// ---------------------------------------------------------------------------
// Entity Type
// ---------------------------------------------------------------------------

/// The closed set of node types the importer reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityType {
    Country,
    Repository,
    DocumentaryUnit,
    RepositoryDescription,
    DocumentaryUnitDescription,
    SystemEvent,
}

impl EntityType {
    /// Return the type tag as stored on nodes.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Country => "Country",
            Self::Repository => "Repository",
            Self::DocumentaryUnit => "DocumentaryUnit",
            Self::RepositoryDescription => "RepositoryDescription",
            Self::DocumentaryUnitDescription => "DocumentaryUnitDescription",
            Self::SystemEvent => "SystemEvent",
        }
    }

    /// Parse a type tag. Returns `None` for unknown values.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Country" => Some(Self::Country),
            "Repository" => Some(Self::Repository),
            "DocumentaryUnit" => Some(Self::DocumentaryUnit),
            "RepositoryDescription" => Some(Self::RepositoryDescription),
            "DocumentaryUnitDescription" => Some(Self::DocumentaryUnitDescription),
            "SystemEvent" => Some(Self::SystemEvent),
            _ => None,
        }
    }

    /// All valid type tags.
    pub const ALL: &'static [&'static str] = &[
        "Country",
        "Repository",
        "DocumentaryUnit",
        "RepositoryDescription",
        "DocumentaryUnitDescription",
        "SystemEvent",
    ];

    /// Types whose id is derived from a local identifier and a scope chain.
    pub fn is_identifiable(&self) -> bool {
        matches!(self, Self::Country | Self::Repository | Self::DocumentaryUnit)
    }

    pub fn is_description(&self) -> bool {
        matches!(
            self,
            Self::RepositoryDescription | Self::DocumentaryUnitDescription
        )
    }

    /// The description sub-bundle type carried by this entity type, if any.
    pub fn description_type(&self) -> Option<EntityType> {
        match self {
            Self::Repository => Some(Self::RepositoryDescription),
            Self::DocumentaryUnit => Some(Self::DocumentaryUnitDescription),
            _ => None,
        }
    }

    /// Types an entity of this type may be scoped under. Empty means the
    /// entity is a root of the scope forest.
    pub fn allowed_scopes(&self) -> &'static [EntityType] {
        match self {
            Self::Repository => &[Self::Country],
            Self::DocumentaryUnit => &[Self::Repository, Self::DocumentaryUnit],
            _ => &[],
        }
    }

    /// Property keys a bundle of this type must carry to be persisted.
    pub fn mandatory_keys(&self) -> &'static [&'static str] {
        match self {
            Self::Country | Self::Repository | Self::DocumentaryUnit => &[keys::IDENTIFIER],
            Self::RepositoryDescription | Self::DocumentaryUnitDescription => {
                &[keys::NAME, keys::LANGUAGE_CODE]
            }
            Self::SystemEvent => &[keys::EVENT_TYPE, keys::TIMESTAMP, keys::ACTIONER],
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// A node as the graph store sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub entity_type: EntityType,
    pub properties: Properties,
}

impl Node {
    pub fn new(id: impl Into<String>, entity_type: EntityType, properties: Properties) -> Self {
        Self {
            id: id.into(),
            entity_type,
            properties,
        }
    }

    /// A string property, if present and a string.
    pub fn str_property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(|v| v.as_str())
    }

    pub fn identifier(&self) -> Option<&str> {
        self.str_property(keys::IDENTIFIER)
    }
}

/// Lightweight handle to a persisted entity, carried by mutations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub id: String,
    pub entity_type: EntityType,
}

impl From<&Node> for EntityRef {
    fn from(node: &Node) -> Self {
        Self {
            id: node.id.clone(),
            entity_type: node.entity_type,
        }
    }
}

// ---------------------------------------------------------------------------
// Typed views
// ---------------------------------------------------------------------------

fn expect_type(node: &Node, expected: EntityType) -> Result<(), CoreError> {
    if node.entity_type == expected {
        Ok(())
    } else {
        Err(CoreError::Internal(format!(
            "Node '{}' is a {}, expected {expected}",
            node.id, node.entity_type
        )))
    }
}

fn required_identifier(node: &Node) -> Result<String, CoreError> {
    node.identifier().map(str::to_string).ok_or_else(|| {
        CoreError::Internal(format!("Node '{}' has no {}", node.id, keys::IDENTIFIER))
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Country {
    pub id: String,
    pub identifier: String,
}

impl TryFrom<&Node> for Country {
    type Error = CoreError;

    fn try_from(node: &Node) -> Result<Self, Self::Error> {
        expect_type(node, EntityType::Country)?;
        Ok(Self {
            id: node.id.clone(),
            identifier: required_identifier(node)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    pub id: String,
    pub identifier: String,
}

impl TryFrom<&Node> for Repository {
    type Error = CoreError;

    fn try_from(node: &Node) -> Result<Self, Self::Error> {
        expect_type(node, EntityType::Repository)?;
        Ok(Self {
            id: node.id.clone(),
            identifier: required_identifier(node)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentaryUnit {
    pub id: String,
    pub identifier: String,
}

impl TryFrom<&Node> for DocumentaryUnit {
    type Error = CoreError;

    fn try_from(node: &Node) -> Result<Self, Self::Error> {
        expect_type(node, EntityType::DocumentaryUnit)?;
        Ok(Self {
            id: node.id.clone(),
            identifier: required_identifier(node)?,
        })
    }
}

/// Any entity that can act as the scope of another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeEntity {
    Country(Country),
    Repository(Repository),
    DocumentaryUnit(DocumentaryUnit),
}

impl ScopeEntity {
    pub fn id(&self) -> &str {
        match self {
            Self::Country(c) => &c.id,
            Self::Repository(r) => &r.id,
            Self::DocumentaryUnit(d) => &d.id,
        }
    }

    pub fn identifier(&self) -> &str {
        match self {
            Self::Country(c) => &c.identifier,
            Self::Repository(r) => &r.identifier,
            Self::DocumentaryUnit(d) => &d.identifier,
        }
    }

    pub fn entity_type(&self) -> EntityType {
        match self {
            Self::Country(_) => EntityType::Country,
            Self::Repository(_) => EntityType::Repository,
            Self::DocumentaryUnit(_) => EntityType::DocumentaryUnit,
        }
    }
}

impl TryFrom<&Node> for ScopeEntity {
    type Error = CoreError;

    fn try_from(node: &Node) -> Result<Self, Self::Error> {
        match node.entity_type {
            EntityType::Country => Country::try_from(node).map(Self::Country),
            EntityType::Repository => Repository::try_from(node).map(Self::Repository),
            EntityType::DocumentaryUnit => {
                DocumentaryUnit::try_from(node).map(Self::DocumentaryUnit)
            }
            other => Err(CoreError::Internal(format!(
                "Node '{}' of type {other} cannot act as a scope",
                node.id
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn node(id: &str, entity_type: EntityType, identifier: Option<&str>) -> Node {
        let mut properties = Properties::new();
        if let Some(ident) = identifier {
            properties.insert(keys::IDENTIFIER.to_string(), json!(ident));
        }
        Node::new(id, entity_type, properties)
    }

    #[test]
    fn type_tags_round_trip() {
        for tag in EntityType::ALL {
            let parsed = EntityType::from_str(tag).unwrap();
            assert_eq!(parsed.as_str(), *tag);
        }
        assert_eq!(EntityType::from_str("Vocabulary"), None);
    }

    #[test]
    fn repository_only_lives_under_a_country() {
        assert_eq!(EntityType::Repository.allowed_scopes(), &[EntityType::Country]);
        assert!(EntityType::Country.allowed_scopes().is_empty());
        assert!(EntityType::DocumentaryUnit
            .allowed_scopes()
            .contains(&EntityType::DocumentaryUnit));
    }

    #[test]
    fn typed_view_checks_type_tag() {
        let n = node("nl", EntityType::Country, Some("nl"));
        assert_matches!(Repository::try_from(&n), Err(CoreError::Internal(_)));
        assert_eq!(Country::try_from(&n).unwrap().identifier, "nl");
    }

    #[test]
    fn typed_view_requires_identifier() {
        let n = node("nl-r1", EntityType::Repository, None);
        assert_matches!(Repository::try_from(&n), Err(CoreError::Internal(_)));
    }

    #[test]
    fn descriptions_cannot_be_scopes() {
        let n = node("nl-r1.eng", EntityType::RepositoryDescription, Some("x"));
        assert_matches!(ScopeEntity::try_from(&n), Err(CoreError::Internal(_)));
        let unit = node("nl-r1-c1", EntityType::DocumentaryUnit, Some("c1"));
        let scope = ScopeEntity::try_from(&unit).unwrap();
        assert_eq!(scope.entity_type(), EntityType::DocumentaryUnit);
        assert_eq!(scope.identifier(), "c1");
    }
}
