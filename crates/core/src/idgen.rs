//! Scoped identifier generation.
//!
//! An identifiable entity's id is a pure function of its local identifier
//! and the local identifiers of its enclosing scopes, root first:
//!
//! ```text
//! ["nl", "niod"] + "Archive 1/2"  ->  "nl-niod-archive_1_2"
//! ```
//!
//! Description ids hang off the described entity's id and the description
//! language (`nl-niod-archive_1_2.eng`). The joining rules must not change
//! once ids have been persisted: existing entities would no longer be found
//! and would be imported a second time.

use std::sync::LazyLock;

use regex::Regex;

use crate::bundle::Bundle;
use crate::entity::{EntityType, Node};
use crate::error::CoreError;
use crate::types::keys;

/// Separator between scope path segments.
pub const HIERARCHY_SEPARATOR: &str = "-";

/// Separator between an entity id and a description's language segment.
pub const DESCRIPTION_SEPARATOR: &str = ".";

/// Replacement for runs of non-alphanumeric characters.
pub const SLUG_REPLACE: &str = "_";

static NON_ALNUM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\p{L}\p{N}]+").expect("valid regex"));

/// Lowercase `s` and collapse every run of characters that are not letters
/// or digits into a single `_`, trimming it from both ends.
pub fn slugify(s: &str) -> String {
    let lowered = s.trim().to_lowercase();
    NON_ALNUM_RE
        .replace_all(&lowered, SLUG_REPLACE)
        .trim_matches('_')
        .to_string()
}

/// Join already-local identifiers into a hierarchical id.
pub fn join_path<S: AsRef<str>>(segments: &[S]) -> String {
    segments
        .iter()
        .map(|s| slugify(s.as_ref()))
        .collect::<Vec<_>>()
        .join(HIERARCHY_SEPARATOR)
}

/// The slugified local identifier of an identifiable bundle.
pub fn id_base(bundle: &Bundle) -> Result<String, CoreError> {
    let ident = bundle.identifier().map(str::trim).unwrap_or_default();
    let slug = slugify(ident);
    if slug.is_empty() {
        return Err(CoreError::invalid_record(format!(
            "{} has no usable '{}' (got {:?})",
            bundle.entity_type,
            keys::IDENTIFIER,
            bundle.identifier()
        )));
    }
    Ok(slug)
}

/// Compute the id of an identifiable entity from its scope chain (local
/// identifiers, root first) and its own data.
pub fn generate_id<S: AsRef<str>>(
    entity_type: EntityType,
    scope_chain: &[S],
    bundle: &Bundle,
) -> Result<String, CoreError> {
    if !entity_type.is_identifiable() {
        return Err(CoreError::Internal(format!(
            "{entity_type} ids are not derived from a scope chain"
        )));
    }
    let base = id_base(bundle)?;
    let mut segments: Vec<String> = scope_chain.iter().map(|s| slugify(s.as_ref())).collect();
    segments.push(base);
    Ok(segments.join(HIERARCHY_SEPARATOR))
}

/// Compute the id of a description sub-bundle from its parent's id.
pub fn generate_description_id(parent_id: &str, description: &Bundle) -> Result<String, CoreError> {
    let lang = description
        .str_value(keys::LANGUAGE_CODE)
        .map(slugify)
        .unwrap_or_default();
    if lang.is_empty() {
        return Err(CoreError::invalid_record(format!(
            "{} of '{parent_id}' has no '{}'",
            description.entity_type,
            keys::LANGUAGE_CODE
        )));
    }
    Ok(format!("{parent_id}{DESCRIPTION_SEPARATOR}{lang}"))
}

/// Id of a description kept apart from another source's description in the
/// same language: the default id plus the slugified source file id.
pub fn source_description_id(default_id: &str, source_file_id: &str) -> String {
    format!("{default_id}{HIERARCHY_SEPARATOR}{}", slugify(source_file_id))
}

/// The id a stored node should have under `scope_chain`, recomputed from
/// its current data.
pub fn expected_id<S: AsRef<str>>(node: &Node, scope_chain: &[S]) -> Result<String, CoreError> {
    let bundle = Bundle::new(node.entity_type).with_data(node.properties.clone());
    generate_id(node.entity_type, scope_chain, &bundle)
}

/// The id a stored description node should have below `parent_id`.
pub fn expected_description_id(parent_id: &str, description: &Node) -> Result<String, CoreError> {
    let bundle = Bundle::new(description.entity_type).with_data(description.properties.clone());
    generate_description_id(parent_id, &bundle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn unit(identifier: &str) -> Bundle {
        Bundle::new(EntityType::DocumentaryUnit).with_value(keys::IDENTIFIER, json!(identifier))
    }

    #[test]
    fn slugify_collapses_punctuation_and_case() {
        assert_eq!(slugify("Archive 1/2"), "archive_1_2");
        assert_eq!(slugify("  --NIOD--  "), "niod");
        assert_eq!(slugify("Łódź Ghetto"), "łódź_ghetto");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn id_joins_scope_chain_root_first() {
        let id = generate_id(EntityType::DocumentaryUnit, &["nl", "niod"], &unit("Archive 1/2"));
        assert_eq!(id.unwrap(), "nl-niod-archive_1_2");
    }

    #[test]
    fn id_generation_is_deterministic() {
        let bundle = unit("item-01");
        let a = generate_id(EntityType::DocumentaryUnit, &["gb", "repo-001"], &bundle).unwrap();
        let b = generate_id(EntityType::DocumentaryUnit, &["gb", "repo-001"], &bundle).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, join_path(&["gb", "repo-001", "item-01"]));
    }

    #[test]
    fn root_entity_id_is_its_slug() {
        let country = Bundle::new(EntityType::Country).with_value(keys::IDENTIFIER, json!("NL"));
        let scopes: [&str; 0] = [];
        assert_eq!(generate_id(EntityType::Country, &scopes, &country).unwrap(), "nl");
    }

    #[test]
    fn missing_identifier_is_an_invalid_record() {
        let bundle = Bundle::new(EntityType::DocumentaryUnit);
        assert_matches!(
            generate_id(EntityType::DocumentaryUnit, &["nl"], &bundle),
            Err(CoreError::InvalidRecord(_))
        );
        assert_matches!(
            generate_id(EntityType::DocumentaryUnit, &["nl"], &unit(" / ")),
            Err(CoreError::InvalidRecord(_))
        );
    }

    #[test]
    fn description_id_hangs_off_parent() {
        let desc = Bundle::new(EntityType::DocumentaryUnitDescription)
            .with_value(keys::LANGUAGE_CODE, json!("ENG"));
        assert_eq!(
            generate_description_id("nl-niod-c1", &desc).unwrap(),
            "nl-niod-c1.eng"
        );
        let no_lang = Bundle::new(EntityType::DocumentaryUnitDescription);
        assert_matches!(
            generate_description_id("nl-niod-c1", &no_lang),
            Err(CoreError::InvalidRecord(_))
        );
        assert_eq!(
            source_description_id("nl-niod-c1.eng", "NIOD EAD 2"),
            "nl-niod-c1.eng-niod_ead_2"
        );
    }

    #[test]
    fn stored_nodes_recompute_their_ids() {
        let mut props = crate::types::Properties::new();
        props.insert(keys::IDENTIFIER.into(), json!("Item 01"));
        let node = Node::new("gb-repo_001-item_01", EntityType::DocumentaryUnit, props);
        assert_eq!(
            expected_id(&node, &["gb", "repo-001"]).unwrap(),
            "gb-repo_001-item_01"
        );
        assert_eq!(expected_id(&node, &["gb"]).unwrap(), "gb-item_01");
    }
}
