//! The import pipeline: record sources, mutation resolution, batched
//! transaction and audit coordination, and the hierarchical driver that
//! ties them together.

pub mod config;
pub mod coordinator;
pub mod driver;
pub mod error;
pub mod integrity;
pub mod resolver;
pub mod scope;
pub mod source;

pub use config::{CsvSettings, ImportSettings};
pub use coordinator::{ImportCoordinator, ImportReport, MutationSender};
pub use driver::ImportDriver;
pub use error::PipelineError;
pub use integrity::{check_identifiers, check_store, IdInconsistency};
pub use resolver::ResolveOptions;
