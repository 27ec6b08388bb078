//! Shared fixtures for pipeline integration tests: a seeded in-memory store
//! and builders for XML source trees.

#![allow(dead_code)]

use std::fs;
use std::path::Path;

use arkiv_core::entity::{EntityType, Node};
use arkiv_core::mutation::Mutation;
use arkiv_core::types::{keys, labels, Properties};
use arkiv_db::{Edge, MemoryGraphStore};
use arkiv_pipeline::ImportSettings;
use serde_json::json;
use tokio::sync::mpsc;

pub const ACTOR: &str = "mike";

pub fn node(id: &str, entity_type: EntityType, identifier: &str) -> Node {
    let mut p = Properties::new();
    p.insert(keys::IDENTIFIER.into(), json!(identifier));
    Node::new(id, entity_type, p)
}

/// A store holding the country `gb`.
pub fn seeded_store() -> MemoryGraphStore {
    let store = MemoryGraphStore::new();
    store.seed([node("gb", EntityType::Country, "gb")]).unwrap();
    store
}

/// Add an existing repository below `gb`.
pub fn seed_repository(store: &MemoryGraphStore, identifier: &str, id: &str) {
    store.seed([node(id, EntityType::Repository, identifier)]).unwrap();
    store
        .seed_edge(Edge::new(id, labels::HAS_PERMISSION_SCOPE, "gb"))
        .unwrap();
}

/// Settings for a run scoped at `gb`.
pub fn settings() -> ImportSettings {
    ImportSettings::new(ACTOR).with_scope("gb")
}

pub fn eag(identifier: &str, name: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<eag xmlns="http://www.archivesportaleurope.net/Portal/profiles/eag_2012/">
  <archguide>
    <identity>
      <repositorid>{identifier}</repositorid>
      <autform xml:lang="eng">{name}</autform>
    </identity>
  </archguide>
</eag>
"#
    )
}

pub fn ead(identifier: &str, title: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<ead xmlns="urn:isbn:1-931666-22-9">
  <eadheader>
    <profiledesc><langusage><language langcode="eng"/></langusage></profiledesc>
  </eadheader>
  <archdesc level="file">
    <did>
      <unitid>{identifier}</unitid>
      <unittitle>{title}</unittitle>
    </did>
  </archdesc>
</ead>
"#
    )
}

/// Write `content` to `rel` below `root`, creating parent directories.
pub fn write(root: &Path, rel: &str, content: &str) {
    write_bytes(root, rel, content.as_bytes());
}

pub fn write_bytes(root: &Path, rel: &str, content: &[u8]) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

/// Everything sent so far, in resolution order.
pub fn drain(receiver: &mut mpsc::UnboundedReceiver<Mutation>) -> Vec<Mutation> {
    let mut out = Vec::new();
    while let Ok(m) = receiver.try_recv() {
        out.push(m);
    }
    out
}

pub fn mutated_ids(mutations: &[Mutation]) -> Vec<&str> {
    mutations.iter().map(|m| m.entity.id.as_str()).collect()
}

/// Targets of the event's `hasSubject` edges.
pub fn subjects(store: &MemoryGraphStore, event_id: &str) -> Vec<String> {
    store
        .edges_from(event_id, labels::HAS_SUBJECT)
        .into_iter()
        .map(|e| e.target)
        .collect()
}
