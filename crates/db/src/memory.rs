//! In-process [`GraphStore`] for tests.
//!
//! A transaction works on a private copy of the committed graph; commit
//! replaces the committed graph with that copy. Like the PostgreSQL store it
//! rejects duplicate node ids and edges with missing endpoints.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use arkiv_core::entity::{EntityType, Node};
use arkiv_core::types::Properties;
use async_trait::async_trait;
use indexmap::IndexMap;

use crate::store::{check_savepoint_name, Edge, GraphStore, GraphTx, StoreError};

#[derive(Debug, Clone, Default)]
struct Graph {
    nodes: IndexMap<String, Node>,
    edges: Vec<Edge>,
}

impl Graph {
    fn require_node(&self, id: &str) -> Result<(), StoreError> {
        if self.nodes.contains_key(id) {
            Ok(())
        } else {
            Err(StoreError::Constraint(format!("edge endpoint '{id}' does not exist")))
        }
    }
}

#[derive(Debug, Default)]
struct State {
    graph: Graph,
    commits: usize,
    rollbacks: usize,
    /// Node ids whose creation fails as if the store had gone away.
    fail_on_create: HashSet<String>,
}

/// Shared in-memory graph. Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct MemoryGraphStore {
    state: Arc<Mutex<State>>,
}

impl MemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, StoreError> {
        lock_state(&self.state)
    }

    /// Insert committed nodes directly, bypassing transactions.
    pub fn seed(&self, nodes: impl IntoIterator<Item = Node>) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        for node in nodes {
            state.graph.nodes.insert(node.id.clone(), node);
        }
        Ok(())
    }

    /// Insert a committed edge directly, bypassing transactions.
    pub fn seed_edge(&self, edge: Edge) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        state.graph.require_node(&edge.source)?;
        state.graph.require_node(&edge.target)?;
        if !state.graph.edges.contains(&edge) {
            state.graph.edges.push(edge);
        }
        Ok(())
    }

    /// Make any later attempt to create `id` fail with
    /// [`StoreError::Unavailable`].
    pub fn fail_on_create(&self, id: impl Into<String>) -> Result<(), StoreError> {
        self.lock()?.fail_on_create.insert(id.into());
        Ok(())
    }

    /// A committed node.
    pub fn node(&self, id: &str) -> Option<Node> {
        self.lock().ok()?.graph.nodes.get(id).cloned()
    }

    /// All committed nodes, in creation order.
    pub fn nodes(&self) -> Vec<Node> {
        self.lock()
            .map(|s| s.graph.nodes.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Committed nodes of one type, in creation order.
    pub fn nodes_of_type(&self, entity_type: EntityType) -> Vec<Node> {
        self.nodes()
            .into_iter()
            .filter(|n| n.entity_type == entity_type)
            .collect()
    }

    /// All committed edges, in creation order.
    pub fn edges(&self) -> Vec<Edge> {
        self.lock().map(|s| s.graph.edges.clone()).unwrap_or_default()
    }

    /// Committed edges leaving `source` with `label`.
    pub fn edges_from(&self, source: &str, label: &str) -> Vec<Edge> {
        self.edges()
            .into_iter()
            .filter(|e| e.source == source && e.label == label)
            .collect()
    }

    pub fn commit_count(&self) -> usize {
        self.lock().map(|s| s.commits).unwrap_or_default()
    }

    pub fn rollback_count(&self) -> usize {
        self.lock().map(|s| s.rollbacks).unwrap_or_default()
    }
}

fn lock_state(state: &Mutex<State>) -> Result<MutexGuard<'_, State>, StoreError> {
    state
        .lock()
        .map_err(|_| StoreError::Internal("memory store lock poisoned".to_string()))
}

#[async_trait]
impl GraphStore for MemoryGraphStore {
    async fn begin(&self) -> Result<Box<dyn GraphTx>, StoreError> {
        let (working, fail_on_create) = {
            let state = self.lock()?;
            (state.graph.clone(), state.fail_on_create.clone())
        };
        Ok(Box::new(MemoryGraphTx {
            state: Arc::clone(&self.state),
            working,
            savepoints: Vec::new(),
            fail_on_create,
        }))
    }
}

/// A transaction over a private copy of the graph.
pub struct MemoryGraphTx {
    state: Arc<Mutex<State>>,
    working: Graph,
    savepoints: Vec<(String, Graph)>,
    fail_on_create: HashSet<String>,
}

impl MemoryGraphTx {
    fn savepoint_index(&self, name: &str) -> Result<usize, StoreError> {
        self.savepoints
            .iter()
            .rposition(|(n, _)| n == name)
            .ok_or_else(|| StoreError::Internal(format!("No savepoint named '{name}'")))
    }
}

#[async_trait]
impl GraphTx for MemoryGraphTx {
    async fn get_node(&mut self, id: &str) -> Result<Option<Node>, StoreError> {
        Ok(self.working.nodes.get(id).cloned())
    }

    async fn create_node(&mut self, node: &Node) -> Result<(), StoreError> {
        if self.fail_on_create.contains(&node.id) {
            return Err(StoreError::Unavailable(format!(
                "connection lost while creating '{}'",
                node.id
            )));
        }
        if self.working.nodes.contains_key(&node.id) {
            return Err(StoreError::Constraint(format!(
                "duplicate node id '{}'",
                node.id
            )));
        }
        self.working.nodes.insert(node.id.clone(), node.clone());
        Ok(())
    }

    async fn update_properties(
        &mut self,
        id: &str,
        set: &Properties,
        remove: &[String],
    ) -> Result<(), StoreError> {
        let node = self
            .working
            .nodes
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        for key in remove {
            node.properties.shift_remove(key);
        }
        for (key, value) in set {
            node.properties.insert(key.clone(), value.clone());
        }
        Ok(())
    }

    async fn add_edge(&mut self, source: &str, label: &str, target: &str) -> Result<(), StoreError> {
        self.working.require_node(source)?;
        self.working.require_node(target)?;
        let edge = Edge::new(source, label, target);
        if !self.working.edges.contains(&edge) {
            self.working.edges.push(edge);
        }
        Ok(())
    }

    async fn targets(&mut self, source: &str, label: &str) -> Result<Vec<Node>, StoreError> {
        Ok(self
            .working
            .edges
            .iter()
            .filter(|e| e.source == source && e.label == label)
            .filter_map(|e| self.working.nodes.get(&e.target).cloned())
            .collect())
    }

    async fn nodes_of_type(&mut self, entity_type: EntityType) -> Result<Vec<Node>, StoreError> {
        let mut nodes: Vec<Node> = self
            .working
            .nodes
            .values()
            .filter(|n| n.entity_type == entity_type)
            .cloned()
            .collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(nodes)
    }

    async fn savepoint(&mut self, name: &str) -> Result<(), StoreError> {
        check_savepoint_name(name)?;
        self.savepoints.push((name.to_string(), self.working.clone()));
        Ok(())
    }

    async fn release_savepoint(&mut self, name: &str) -> Result<(), StoreError> {
        let idx = self.savepoint_index(name)?;
        self.savepoints.truncate(idx);
        Ok(())
    }

    async fn rollback_to_savepoint(&mut self, name: &str) -> Result<(), StoreError> {
        let idx = self.savepoint_index(name)?;
        self.savepoints.truncate(idx + 1);
        self.working = self.savepoints[idx].1.clone();
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let this = *self;
        let mut state = lock_state(&this.state)?;
        state.graph = this.working;
        state.commits += 1;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        lock_state(&self.state)?.rollbacks += 1;
        Ok(())
    }
}
