//! End-to-end CSV imports against the in-memory store.

mod common;

use arkiv_core::entity::EntityType;
use arkiv_core::types::{keys, labels};
use arkiv_pipeline::{CsvSettings, ImportDriver, ImportSettings, PipelineError};
use assert_matches::assert_matches;
use common::{
    drain, mutated_ids, seed_repository, seeded_store, settings, subjects, write, ACTOR,
};
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// Test: rows are scoped by their repository code
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rows_import_under_the_repository_named_by_their_code() {
    let store = seeded_store();
    seed_repository(&store, "repo-001", "gb-repo_001");
    let tmp = tempfile::tempdir().unwrap();
    write(
        tmp.path(),
        "units.csv",
        "repositoryCode;identifier;name;unitDates\n\
         repo-001;c1;First;1940\n\
         repo-001;c2;Second;\n\
         repo-404;c3;Lost;1941\n",
    );

    let (sender, mut receiver) = mpsc::unbounded_channel();
    let report = ImportDriver::new(&store, settings())
        .unwrap()
        .with_sender(sender)
        .import_csv(&tmp.path().join("units.csv"))
        .await
        .unwrap();

    assert_eq!(
        mutated_ids(&drain(&mut receiver)),
        vec!["gb-repo_001-c1", "gb-repo_001-c2"]
    );
    assert_eq!(report.log.created, 2);
    assert_eq!(report.log.errored, 1);
    assert!(report.log.errors["units.csv:4"].contains("gb-repo_404"));

    let desc = store.node("gb-repo_001-c1.eng").unwrap();
    assert_eq!(desc.str_property(keys::NAME), Some("First"));
    assert_eq!(desc.str_property("unitDates"), Some("1940"));
    assert_eq!(desc.str_property(keys::SOURCE_FILE_ID), Some("2"));
    // The scope column is consumed, not stored.
    assert!(store
        .node("gb-repo_001-c1")
        .unwrap()
        .properties
        .get("repositoryCode")
        .is_none());
    assert_eq!(
        store.edges_from("gb-repo_001-c2", labels::HAS_PERMISSION_SCOPE)[0].target,
        "gb-repo_001"
    );
    assert_eq!(subjects(&store, &report.event_id.unwrap()).len(), 2);
}

// ---------------------------------------------------------------------------
// Test: other entity types and delimiters
// ---------------------------------------------------------------------------

#[tokio::test]
async fn repositories_import_at_the_run_scope() {
    let store = seeded_store();
    let tmp = tempfile::tempdir().unwrap();
    write(
        tmp.path(),
        "repos.csv",
        "identifier,name,languageCode\nrepo-001,Archive,eng\nrepo-001,Archiv,deu\n",
    );
    let csv = CsvSettings {
        delimiter: b',',
        entity_type: EntityType::Repository,
        ..CsvSettings::default()
    };

    let report = ImportDriver::new(&store, settings().with_csv(csv))
        .unwrap()
        .import_csv(&tmp.path().join("repos.csv"))
        .await
        .unwrap();

    assert_eq!(report.log.created, 1);
    assert_eq!(report.log.updated, 1);
    assert!(store.node("gb-repo_001.eng").is_some());
    assert!(store.node("gb-repo_001.deu").is_some());
}

#[tokio::test]
async fn countries_import_at_the_system_scope() {
    let store = seeded_store();
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "countries.csv", "identifier\nNL\ngb\n");
    let csv = CsvSettings {
        entity_type: EntityType::Country,
        ..CsvSettings::default()
    };

    let report = ImportDriver::new(&store, ImportSettings::new(ACTOR).with_csv(csv))
        .unwrap()
        .import_csv(&tmp.path().join("countries.csv"))
        .await
        .unwrap();

    assert_eq!(report.log.created, 1);
    assert_eq!(report.log.unchanged, 1);
    assert_eq!(store.node("nl").unwrap().identifier(), Some("NL"));
}

// ---------------------------------------------------------------------------
// Test: malformed rows follow the tolerant flag
// ---------------------------------------------------------------------------

#[tokio::test]
async fn overlong_row_aborts_strict_run_and_is_counted_when_tolerant() {
    let store = seeded_store();
    seed_repository(&store, "repo-001", "gb-repo_001");
    let tmp = tempfile::tempdir().unwrap();
    write(
        tmp.path(),
        "units.csv",
        "repositoryCode;identifier;name\nrepo-001;c1;First\nrepo-001;c2;Second;extra\n",
    );
    let path = tmp.path().join("units.csv");

    let err = ImportDriver::new(&store, settings())
        .unwrap()
        .import_csv(&path)
        .await
        .unwrap_err();
    assert_matches!(err, PipelineError::Source { .. });
    assert!(store.node("gb-repo_001-c1").is_none());

    let report = ImportDriver::new(&store, settings().with_tolerant(true))
        .unwrap()
        .import_csv(&path)
        .await
        .unwrap();
    assert_eq!(report.log.created, 1);
    assert_eq!(report.log.errored, 1);
    assert!(report.log.errors.contains_key("units.csv:3"));
}

// ---------------------------------------------------------------------------
// Test: rows without a languageCode take the configured default language
// ---------------------------------------------------------------------------

#[tokio::test]
async fn default_language_names_the_description() {
    let store = seeded_store();
    seed_repository(&store, "repo-001", "gb-repo_001");
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "units.csv", "repositoryCode;identifier;name
repo-001;c1;Erste
");

    let report = ImportDriver::new(&store, settings().with_default_language("deu"))
        .unwrap()
        .import_csv(&tmp.path().join("units.csv"))
        .await
        .unwrap();

    assert_eq!(report.log.created, 1);
    let desc = store.node("gb-repo_001-c1.deu").unwrap();
    assert_eq!(desc.str_property(keys::LANGUAGE_CODE), Some("deu"));
    assert!(store.node("gb-repo_001-c1.eng").is_none());
}
