//! Raw parsed records, before normalization.

use std::path::PathBuf;

use crate::entity::EntityType;

/// The source format a record was read from. Selects the mapping table the
/// normalizer applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// EAD finding aid (`<ead>` root); one documentary unit per file.
    Ead,
    /// EAG institution description (`<eag>` root); one repository per file.
    Eag,
    /// One CSV row describing an entity of the given type.
    Csv(EntityType),
}

impl SourceFormat {
    /// Match an XML root element name.
    pub fn from_xml_root(name: &str) -> Option<Self> {
        match name {
            "ead" => Some(Self::Ead),
            "eag" => Some(Self::Eag),
            _ => None,
        }
    }

    /// The type of the entity a record in this format describes.
    pub fn entity_type(&self) -> EntityType {
        match self {
            Self::Ead => EntityType::DocumentaryUnit,
            Self::Eag => EntityType::Repository,
            Self::Csv(t) => *t,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Ead => "ead",
            Self::Eag => "eag",
            Self::Csv(_) => "csv",
        }
    }
}

/// One external record: its ordered field values plus its children, either
/// nested in the same document or in a directory of their own. Ephemeral;
/// never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRecord {
    /// Human-readable origin (relative file path, or `file:row`), used as the
    /// key for error reporting.
    pub location: String,
    /// Short identifier of the source document (file stem or row number),
    /// recorded on descriptions as `sourceFileId`.
    pub source_id: String,
    pub format: SourceFormat,
    /// Field path and text value, in document order. Paths may repeat.
    pub fields: Vec<(String, String)>,
    /// Scope key carried by the record itself (the CSV repository code
    /// column), resolved against the run scope.
    pub scope_key: Option<String>,
    /// Directory holding this record's children (XML sources only).
    pub children: Option<PathBuf>,
    /// Child records nested inside this record's document (EAD
    /// components), in document order.
    pub components: Vec<ImportRecord>,
}

impl ImportRecord {
    pub fn new(location: impl Into<String>, source_id: impl Into<String>, format: SourceFormat) -> Self {
        Self {
            location: location.into(),
            source_id: source_id.into(),
            format,
            fields: Vec::new(),
            scope_key: None,
            children: None,
            components: Vec::new(),
        }
    }

    pub fn with_field(mut self, path: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((path.into(), value.into()));
        self
    }

    pub fn with_children(mut self, dir: PathBuf) -> Self {
        self.children = Some(dir);
        self
    }

    pub fn with_component(mut self, component: ImportRecord) -> Self {
        self.components.push(component);
        self
    }

    /// Number of records nested below this one in its own document.
    pub fn descendant_count(&self) -> u64 {
        self.components
            .iter()
            .map(|c| 1 + c.descendant_count())
            .sum()
    }

    pub fn with_scope_key(mut self, key: impl Into<String>) -> Self {
        self.scope_key = Some(key.into());
        self
    }

    /// All values recorded under `path`, in document order.
    pub fn values<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.fields
            .iter()
            .filter(move |(p, _)| p == path)
            .map(|(_, v)| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descendants_include_nested_components() {
        let leaf = ImportRecord::new("a.xml#1.1", "a", SourceFormat::Ead);
        let mid = ImportRecord::new("a.xml#1", "a", SourceFormat::Ead).with_component(leaf);
        let root = ImportRecord::new("a.xml", "a", SourceFormat::Ead)
            .with_component(mid)
            .with_component(ImportRecord::new("a.xml#2", "a", SourceFormat::Ead));
        assert_eq!(root.descendant_count(), 3);
        assert_eq!(root.components[0].descendant_count(), 1);
    }
}
