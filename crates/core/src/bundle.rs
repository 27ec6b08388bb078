//! Bundles: the normalized, type-tagged form of an entity before it is
//! persisted.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::entity::{EntityType, Node};
use crate::types::{keys, Properties};

/// A typed property map plus one level of dependent sub-bundles, keyed by
/// relationship label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bundle {
    /// Assigned by the identifier generator at resolve time.
    pub id: Option<String>,
    pub entity_type: EntityType,
    pub data: Properties,
    pub relations: IndexMap<String, Vec<Bundle>>,
}

impl Bundle {
    pub fn new(entity_type: EntityType) -> Self {
        Self {
            id: None,
            entity_type,
            data: Properties::new(),
            relations: IndexMap::new(),
        }
    }

    pub fn with_data(mut self, data: Properties) -> Self {
        self.data = data;
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_value(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    pub fn with_relation(mut self, label: impl Into<String>, child: Bundle) -> Self {
        self.relations.entry(label.into()).or_default().push(child);
        self
    }

    pub fn str_value(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(|v| v.as_str())
    }

    pub fn identifier(&self) -> Option<&str> {
        self.str_value(keys::IDENTIFIER)
    }

    /// All sub-bundles, in relation then insertion order.
    pub fn dependents(&self) -> impl Iterator<Item = (&str, &Bundle)> {
        self.relations
            .iter()
            .flat_map(|(label, children)| children.iter().map(move |c| (label.as_str(), c)))
    }

    /// Data-only equivalence with a stored node: same type, same keys, same
    /// values. Key order is irrelevant.
    pub fn data_matches(&self, node: &Node) -> bool {
        self.entity_type == node.entity_type && self.data == node.properties
    }

    /// The minimal property write that turns `existing` into this bundle's
    /// data.
    pub fn diff_against(&self, existing: &Properties) -> PropertyDiff {
        let set: Properties = self
            .data
            .iter()
            .filter(|(k, v)| existing.get(*k) != Some(*v))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let removed: Vec<String> = existing
            .keys()
            .filter(|k| !self.data.contains_key(*k))
            .cloned()
            .collect();
        PropertyDiff { set, removed }
    }

    /// Convert to a node. Fails when no id has been assigned yet.
    pub fn to_node(&self) -> Option<Node> {
        self.id
            .as_ref()
            .map(|id| Node::new(id.clone(), self.entity_type, self.data.clone()))
    }
}

impl PartialEq for Bundle {
    /// Order-insensitive over data keys and over sub-bundles within a
    /// relation.
    fn eq(&self, other: &Self) -> bool {
        if self.id != other.id
            || self.entity_type != other.entity_type
            || self.data != other.data
            || self.relations.len() != other.relations.len()
        {
            return false;
        }
        self.relations.iter().all(|(label, children)| {
            other.relations.get(label).is_some_and(|theirs| {
                children.len() == theirs.len() && children.iter().all(|c| theirs.contains(c))
            })
        })
    }
}

/// Changed and removed keys between two property maps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyDiff {
    pub set: Properties,
    pub removed: Vec<String>,
}

impl PropertyDiff {
    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.removed.is_empty()
    }

    /// Changed keys followed by removed keys, for logging.
    pub fn changed_keys(&self) -> Vec<&str> {
        self.set
            .keys()
            .map(String::as_str)
            .chain(self.removed.iter().map(String::as_str))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn unit(pairs: &[(&str, &str)]) -> Bundle {
        pairs.iter().fold(Bundle::new(EntityType::DocumentaryUnit), |b, (k, v)| {
            b.with_value(*k, json!(v))
        })
    }

    #[test]
    fn equality_ignores_key_order() {
        let a = unit(&[("identifier", "c1"), ("extent", "2 boxes")]);
        let b = unit(&[("extent", "2 boxes"), ("identifier", "c1")]);
        assert_eq!(a, b);
    }

    #[test]
    fn equality_ignores_sub_bundle_order() {
        let en = unit(&[("languageCode", "eng")]);
        let de = unit(&[("languageCode", "deu")]);
        let a = unit(&[("identifier", "c1")])
            .with_relation("hasDescription", en.clone())
            .with_relation("hasDescription", de.clone());
        let b = unit(&[("identifier", "c1")])
            .with_relation("hasDescription", de)
            .with_relation("hasDescription", en);
        assert_eq!(a, b);
    }

    #[test]
    fn diff_reports_changed_and_removed_keys_only() {
        let bundle = unit(&[("identifier", "c1"), ("extent", "3 boxes")]);
        let mut existing = Properties::new();
        existing.insert("identifier".into(), json!("c1"));
        existing.insert("extent".into(), json!("2 boxes"));
        existing.insert("obsolete".into(), json!("x"));

        let diff = bundle.diff_against(&existing);
        assert_eq!(diff.set.len(), 1);
        assert_eq!(diff.set["extent"], json!("3 boxes"));
        assert_eq!(diff.removed, vec!["obsolete".to_string()]);
        assert_eq!(diff.changed_keys(), vec!["extent", "obsolete"]);
    }

    #[test]
    fn identical_data_yields_empty_diff() {
        let bundle = unit(&[("identifier", "c1")]);
        let node = bundle.clone().with_id("r1-c1").to_node().unwrap();
        assert!(bundle.data_matches(&node));
        assert!(bundle.diff_against(&node.properties).is_empty());
    }
}
