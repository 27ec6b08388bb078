//! Loading scopes from the store.

use std::collections::{HashMap, HashSet};

use arkiv_core::error::CoreError;
use arkiv_core::idgen;
use arkiv_core::scope::Scope;
use arkiv_core::types::labels;
use arkiv_db::GraphTx;

use crate::error::PipelineError;

/// Walk `hasPermissionScope` edges up from `id` and build its scope.
///
/// Fails with a scope resolution error if `id` does not exist, an ancestor
/// has more than one scope, the chain loops, or a chain member cannot act
/// as a scope.
pub async fn load_scope(tx: &mut dyn GraphTx, id: &str) -> Result<Scope, PipelineError> {
    let Some(node) = tx.get_node(id).await? else {
        return Err(CoreError::scope_not_found(id, "no such entity").into());
    };

    let mut seen = HashSet::from([node.id.clone()]);
    let mut chain = vec![node];
    loop {
        let current = &chain[chain.len() - 1].id;
        let mut parents = tx.targets(current, labels::HAS_PERMISSION_SCOPE).await?;
        match parents.len() {
            0 => break,
            1 => {}
            n => {
                return Err(CoreError::scope_not_found(
                    id,
                    format!("'{current}' has {n} scopes"),
                )
                .into())
            }
        }
        let parent = parents.remove(0);
        if !seen.insert(parent.id.clone()) {
            return Err(CoreError::scope_not_found(id, format!("scope chain loops at '{}'", parent.id)).into());
        }
        chain.push(parent);
    }
    chain.reverse();

    Scope::from_chain(&chain)
        .map_err(|e| CoreError::scope_not_found(id, e.to_string()).into())
}

/// The id of the scope named by `key` directly below `parent`.
pub fn child_scope_id(parent: &Scope, key: &str) -> String {
    let mut segments: Vec<&str> = parent.id_path.iter().map(String::as_str).collect();
    segments.push(key);
    idgen::join_path(&segments)
}

/// Memoizes scope lookups for the duration of a run.
#[derive(Debug, Default)]
pub struct ScopeCache {
    scopes: HashMap<String, Scope>,
}

impl ScopeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&mut self, tx: &mut dyn GraphTx, id: &str) -> Result<Scope, PipelineError> {
        if let Some(scope) = self.scopes.get(id) {
            return Ok(scope.clone());
        }
        let scope = load_scope(tx, id).await?;
        self.scopes.insert(id.to_string(), scope.clone());
        Ok(scope)
    }

    /// Resolve the scope named by `key` below `parent`.
    pub async fn get_child(
        &mut self,
        tx: &mut dyn GraphTx,
        parent: &Scope,
        key: &str,
    ) -> Result<Scope, PipelineError> {
        let id = child_scope_id(parent, key);
        self.get(tx, &id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arkiv_core::entity::{EntityType, Node};
    use arkiv_core::types::{keys, Properties};
    use arkiv_db::{Edge, GraphStore, MemoryGraphStore};
    use assert_matches::assert_matches;
    use serde_json::json;

    fn node(id: &str, entity_type: EntityType, identifier: &str) -> Node {
        let mut p = Properties::new();
        p.insert(keys::IDENTIFIER.into(), json!(identifier));
        Node::new(id, entity_type, p)
    }

    fn seeded() -> MemoryGraphStore {
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
    async fn loads_chain_root_first() {
        let store = seeded();
        let mut tx = store.begin().await.unwrap();
        let scope = load_scope(tx.as_mut(), "gb-repo_001").await.unwrap();
        assert_eq!(scope.id(), Some("gb-repo_001"));
        assert_eq!(scope.id_path, vec!["gb", "repo-001"]);
    }

    #[tokio::test]
    async fn missing_scope_is_scope_resolution_error() {
        let store = seeded();
        let mut tx = store.begin().await.unwrap();
        let err = load_scope(tx.as_mut(), "nl").await.unwrap_err();
        assert_matches!(err, PipelineError::Core(CoreError::ScopeResolution { .. }));
        assert!(!err.is_fatal());
    }

    #[tokio::test]
    async fn child_keys_resolve_relative_to_parent() {
        let store = seeded();
        let mut tx = store.begin().await.unwrap();
        let mut cache = ScopeCache::new();
        let country = cache.get(tx.as_mut(), "gb").await.unwrap();
        assert_eq!(child_scope_id(&country, "repo-001"), "gb-repo_001");
        let repo = cache.get_child(tx.as_mut(), &country, "repo-001").await.unwrap();
        assert_eq!(repo.entity_type(), Some(EntityType::Repository));
    }
}
