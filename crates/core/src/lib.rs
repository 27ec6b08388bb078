//! Domain types and pure logic for the archival record importer: entity
//! types and typed node views, bundles, scoped identifier generation,
//! record normalization, validation and the per-run import log.
//!
//! Nothing in this crate touches the store or the filesystem.

pub mod bundle;
pub mod entity;
pub mod error;
pub mod idgen;
pub mod import_log;
pub mod mutation;
pub mod normalize;
pub mod record;
pub mod scope;
pub mod types;
pub mod validation;
