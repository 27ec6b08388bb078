//! Record sources: how external files are enumerated and parsed into
//! [`ImportRecord`]s.

use std::path::{Path, PathBuf};

use arkiv_core::record::ImportRecord;

use crate::error::PipelineError;

pub mod csv;
pub mod xml;

pub use self::csv::CsvSource;
pub use self::xml::XmlSource;

/// One item in a source listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceEntry {
    /// A record file, parsed only when the driver reaches it.
    File { path: PathBuf, location: String },
    /// An already-parsed record.
    Record(ImportRecord),
    /// A record that could not be parsed; reported when reached.
    Unreadable { location: String, message: String },
    /// A directory of records belonging to the scope named `key`, relative
    /// to the run scope.
    ScopeUnit {
        key: String,
        dir: PathBuf,
        location: String,
    },
}

impl SourceEntry {
    pub fn location(&self) -> &str {
        match self {
            Self::File { location, .. }
            | Self::Unreadable { location, .. }
            | Self::ScopeUnit { location, .. } => location,
            Self::Record(record) => &record.location,
        }
    }
}

/// Enumerates and reads the records of one import source, in a stable
/// order.
pub trait RecordSource {
    /// Entries at the top of the source.
    fn roots(&self) -> Result<Vec<SourceEntry>, PipelineError>;

    /// Entries in a record's children directory.
    fn children(&self, dir: &Path) -> Result<Vec<SourceEntry>, PipelineError>;

    /// Parse a record file.
    fn read(&self, path: &Path, location: &str) -> Result<ImportRecord, PipelineError>;

    /// Number of records in a directory tree, for skip accounting.
    fn count_records(&self, dir: &Path) -> u64;
}
