use indexmap::IndexMap;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Insertion-ordered property map. Values are JSON scalars or flat lists.
pub type Properties = IndexMap<String, serde_json::Value>;

/// Property keys shared by the normalizer, validator and store.
pub mod keys {
    pub const IDENTIFIER: &str = "identifier";
    pub const NAME: &str = "name";
    pub const LANGUAGE_CODE: &str = "languageCode";
    pub const SOURCE_FILE_ID: &str = "sourceFileId";
    pub const EVENT_TYPE: &str = "eventType";
    pub const LOG_MESSAGE: &str = "logMessage";
    pub const TIMESTAMP: &str = "timestamp";
    pub const ACTIONER: &str = "actioner";
}

/// Edge labels.
pub mod labels {
    /// Child entity to its enclosing scope. Written once, at creation.
    pub const HAS_PERMISSION_SCOPE: &str = "hasPermissionScope";
    /// Entity to one of its description sub-bundles.
    pub const HAS_DESCRIPTION: &str = "hasDescription";
    /// Provenance event to an entity it touched.
    pub const HAS_SUBJECT: &str = "hasSubject";
}
