//! Single-file CSV sources. Every row is one record with no children.

use std::path::{Path, PathBuf};

use arkiv_core::record::{ImportRecord, SourceFormat};

use super::{RecordSource, SourceEntry};
use crate::config::CsvSettings;
use crate::error::PipelineError;

/// A delimited file with a header row.
#[derive(Debug, Clone)]
pub struct CsvSource {
    path: PathBuf,
    settings: CsvSettings,
}

impl CsvSource {
    pub fn new(path: impl Into<PathBuf>, settings: CsvSettings) -> Self {
        Self {
            path: path.into(),
            settings,
        }
    }

    fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// Header cells with all whitespace removed.
fn clean_header(raw: &str) -> String {
    raw.chars().filter(|c| !c.is_whitespace()).collect()
}

impl RecordSource for CsvSource {
    fn roots(&self) -> Result<Vec<SourceEntry>, PipelineError> {
        let name = self.file_name();
        let mut reader = ::csv::ReaderBuilder::new()
            .delimiter(self.settings.delimiter)
            .flexible(true)
            .from_path(&self.path)
            .map_err(|e| PipelineError::source_error(&name, e))?;

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| PipelineError::source_error(&name, e))?
            .iter()
            .map(clean_header)
            .collect();
        if headers.iter().all(String::is_empty) {
            return Err(PipelineError::source_error(&name, "missing header row"));
        }

        let format = SourceFormat::Csv(self.settings.entity_type);
        let mut entries = Vec::new();
        for (index, row) in reader.records().enumerate() {
            // Line where the row starts; quoted cells may span lines.
            let fallback = index as u64 + 2;
            let row = match row {
                Ok(row) => row,
                Err(e) => {
                    let line = e.position().map_or(fallback, |p| p.line());
                    entries.push(SourceEntry::Unreadable {
                        location: format!("{name}:{line}"),
                        message: e.to_string(),
                    });
                    continue;
                }
            };
            let line = row.position().map_or(fallback, |p| p.line());
            let location = format!("{name}:{line}");
            if row.len() > headers.len() {
                entries.push(SourceEntry::Unreadable {
                    location,
                    message: format!("{} cells but only {} headers", row.len(), headers.len()),
                });
                continue;
            }

            let mut record = ImportRecord::new(location, line.to_string(), format);
            for (header, value) in headers.iter().zip(row.iter()) {
                let value = value.trim();
                if header.is_empty() || value.is_empty() {
                    continue;
                }
                if *header == self.settings.scope_column {
                    record.scope_key = Some(value.to_string());
                } else {
                    record.fields.push((header.clone(), value.to_string()));
                }
            }
            entries.push(SourceEntry::Record(record));
        }
        Ok(entries)
    }

    fn children(&self, _dir: &Path) -> Result<Vec<SourceEntry>, PipelineError> {
        Ok(Vec::new())
    }

    fn read(&self, path: &Path, location: &str) -> Result<ImportRecord, PipelineError> {
        Err(PipelineError::source_error(
            location,
            format!("CSV sources have no record files ({})", path.display()),
        ))
    }

    fn count_records(&self, _dir: &Path) -> u64 {
        0
    }
}
