//! Identifier consistency check over stored entities.

use arkiv_core::entity::{EntityType, Node};
use arkiv_core::idgen;
use arkiv_core::scope::Scope;
use arkiv_core::types::{keys, labels};
use arkiv_db::{GraphStore, GraphTx};
use serde::Serialize;

use crate::error::PipelineError;
use crate::scope::load_scope;

/// Entity types whose ids are derived from their scope.
const CHECKED_TYPES: [EntityType; 3] = [
    EntityType::Country,
    EntityType::Repository,
    EntityType::DocumentaryUnit,
];

/// A stored node whose id does not match what its data and scope produce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdInconsistency {
    pub id: String,
    pub entity_type: EntityType,
    /// The id the node should have, when one can be computed.
    pub expected: Option<String>,
    pub problem: String,
}

impl std::fmt::Display for IdInconsistency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}: {}", self.entity_type, self.id, self.problem)?;
        if let Some(expected) = &self.expected {
            write!(f, " (expected '{expected}')")?;
        }
        Ok(())
    }
}

/// Check every identifiable node and its descriptions in a read-only
/// transaction.
pub async fn check_store(store: &dyn GraphStore) -> Result<Vec<IdInconsistency>, PipelineError> {
    let mut tx = store.begin().await?;
    let result = check_identifiers(tx.as_mut()).await;
    tx.rollback().await?;
    result
}

/// Recompute the id of every Country, Repository and DocumentaryUnit from
/// its scope chain and report the mismatches.
pub async fn check_identifiers(tx: &mut dyn GraphTx) -> Result<Vec<IdInconsistency>, PipelineError> {
    let mut found = Vec::new();
    let mut checked = 0usize;
    for entity_type in CHECKED_TYPES {
        for node in tx.nodes_of_type(entity_type).await? {
            checked += 1;
            check_node(tx, &node, &mut found).await?;
        }
    }
    tracing::info!(checked, inconsistent = found.len(), "Identifier check finished");
    Ok(found)
}

async fn check_node(
    tx: &mut dyn GraphTx,
    node: &Node,
    found: &mut Vec<IdInconsistency>,
) -> Result<(), PipelineError> {
    let report = |expected: Option<String>, problem: String| IdInconsistency {
        id: node.id.clone(),
        entity_type: node.entity_type,
        expected,
        problem,
    };

    let parents = tx.targets(&node.id, labels::HAS_PERMISSION_SCOPE).await?;
    let scope = match parents.as_slice() {
        [] => Scope::system(),
        [parent] => match load_scope(tx, &parent.id).await {
            Ok(scope) => scope,
            Err(err) if err.is_scope_resolution() => {
                found.push(report(None, format!("scope cannot be resolved: {err}")));
                return Ok(());
            }
            Err(err) => return Err(err),
        },
        many => {
            found.push(report(None, format!("has {} scopes", many.len())));
            return Ok(());
        }
    };

    if let Err(e) = scope.check_accepts(node.entity_type, Some(&node.id)) {
        let problem = if scope.is_system() {
            "missing scope".to_string()
        } else {
            e.to_string()
        };
        found.push(report(None, problem));
        return Ok(());
    }

    match idgen::expected_id(node, &scope.id_path) {
        Ok(expected) if expected != node.id => {
            found.push(report(
                Some(expected),
                "id does not match identifier and scope".to_string(),
            ));
        }
        Ok(_) => {}
        Err(e) => found.push(report(None, e.to_string())),
    }

    for description in tx.targets(&node.id, labels::HAS_DESCRIPTION).await? {
        match idgen::expected_description_id(&node.id, &description) {
            Ok(expected) if !description_id_matches(&description, &expected) => found.push(IdInconsistency {
                id: description.id.clone(),
                entity_type: description.entity_type,
                expected: Some(expected),
                problem: "description id does not match parent and language".to_string(),
            }),
            Ok(_) => {}
            Err(e) => found.push(IdInconsistency {
                id: description.id.clone(),
                entity_type: description.entity_type,
                expected: None,
                problem: e.to_string(),
            }),
        }
    }
    Ok(())
}

/// A description's id is its default id, or the default id qualified by its
/// source file when it was kept apart from another source's description.
fn description_id_matches(description: &Node, expected: &str) -> bool {
    description.id == expected
        || description
            .str_property(keys::SOURCE_FILE_ID)
            .is_some_and(|source| description.id == idgen::source_description_id(expected, source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use arkiv_core::types::{keys, Properties};
    use arkiv_db::{Edge, MemoryGraphStore};
    use serde_json::json;

    fn node(id: &str, entity_type: EntityType, identifier: &str) -> Node {
        let mut p = Properties::new();
        p.insert(keys::IDENTIFIER.into(), json!(identifier));
        Node::new(id, entity_type, p)
    }

    fn store() -> MemoryGraphStore {
        let store = MemoryGraphStore::new();
        store
            .seed([
                node("gb", EntityType::Country, "gb"),
                node("gb-repo_001", EntityType::Repository, "repo-001"),
            ])
            .unwrap();
        store
            .seed_edge(Edge::new("gb-repo_001", labels::HAS_PERMISSION_SCOPE, "gb"))
            .unwrap();
        store
    }

    #[tokio::test]
    async fn consistent_graph_has_no_findings() {
        let store = store();
        assert!(check_store(&store).await.unwrap().is_empty());
        assert_eq!(store.commit_count(), 0);
    }

    #[tokio::test]
    async fn renamed_identifier_is_reported_with_expected_id() {
        let store = store();
        store
            .seed([node("gb-repo_001-c1", EntityType::DocumentaryUnit, "c2")])
            .unwrap();
        store
            .seed_edge(Edge::new("gb-repo_001-c1", labels::HAS_PERMISSION_SCOPE, "gb-repo_001"))
            .unwrap();

        let found = check_store(&store).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "gb-repo_001-c1");
        assert_eq!(found[0].expected.as_deref(), Some("gb-repo_001-c2"));
    }

    #[tokio::test]
    async fn unscoped_unit_is_reported() {
        let store = store();
        store
            .seed([node("c9", EntityType::DocumentaryUnit, "c9")])
            .unwrap();
        let found = check_store(&store).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].problem, "missing scope");
    }

    #[tokio::test]
    async fn mismatched_description_id_is_reported() {
        let store = store();
        let mut p = Properties::new();
        p.insert(keys::LANGUAGE_CODE.into(), json!("deu"));
        p.insert(keys::NAME.into(), json!("Archiv"));
        store
            .seed([Node::new("gb-repo_001.eng", EntityType::RepositoryDescription, p)])
            .unwrap();
        store
            .seed_edge(Edge::new("gb-repo_001", labels::HAS_DESCRIPTION, "gb-repo_001.eng"))
            .unwrap();

        let found = check_store(&store).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].expected.as_deref(), Some("gb-repo_001.deu"));
    }

    #[tokio::test]
    async fn source_qualified_description_id_is_consistent() {
        let store = store();
        let mut p = Properties::new();
        p.insert(keys::LANGUAGE_CODE.into(), json!("eng"));
        p.insert(keys::SOURCE_FILE_ID.into(), json!("guide-2"));
        store
            .seed([Node::new("gb-repo_001.eng-guide_2", EntityType::RepositoryDescription, p)])
            .unwrap();
        store
            .seed_edge(Edge::new("gb-repo_001", labels::HAS_DESCRIPTION, "gb-repo_001.eng-guide_2"))
            .unwrap();

        assert!(check_store(&store).await.unwrap().is_empty());
    }
}
