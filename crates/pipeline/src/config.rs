use arkiv_core::entity::EntityType;
use arkiv_core::normalize::DEFAULT_LANGUAGE;
use arkiv_core::scope::ScopePolicy;
use arkiv_events::EventType;
use validator::Validate;

use crate::error::PipelineError;

/// Default number of changed records per committed batch.
pub const DEFAULT_BATCH_SIZE: usize = 2500;

/// Default CSV column holding the scope key of each row.
pub const DEFAULT_CSV_SCOPE_COLUMN: &str = "repositoryCode";

/// Settings for one import run.
#[derive(Debug, Clone, Validate)]
pub struct ImportSettings {
    /// Identifier of the acting user, recorded on the provenance event.
    #[validate(length(min = 1, message = "an acting user is required"))]
    pub actor: String,
    /// Id of the existing entity the run imports into. `None` imports at
    /// the system root (countries only).
    pub scope: Option<String>,
    /// Changed records per intermediate commit.
    #[validate(range(min = 1, message = "batch size must be at least 1"))]
    pub batch_size: usize,
    /// Count unreadable source files as record errors instead of aborting.
    pub tolerant: bool,
    pub scope_policy: ScopePolicy,
    /// Whether records may change entities that already exist. When false,
    /// the first such change aborts the run.
    pub allow_updates: bool,
    /// Commit changes. When false the run is a dry run: everything is
    /// resolved in one transaction that is rolled back at the end.
    pub commit: bool,
    /// Language of descriptions whose source declares none.
    #[validate(length(min = 2, max = 3, message = "default language must be a two or three letter code"))]
    pub default_language: String,
    /// Keep descriptions from different source files apart even when they
    /// share a language.
    pub use_source_id: bool,
    pub event_type: EventType,
    pub log_message: Option<String>,
    #[validate(nested)]
    pub csv: CsvSettings,
}

/// How CSV sources are read.
#[derive(Debug, Clone, Validate)]
pub struct CsvSettings {
    pub delimiter: u8,
    /// Column whose value names each row's scope relative to the run scope.
    #[validate(length(min = 1))]
    pub scope_column: String,
    /// Type of entity every row describes.
    pub entity_type: EntityType,
}

impl Default for CsvSettings {
    fn default() -> Self {
        Self {
            delimiter: b';',
            scope_column: DEFAULT_CSV_SCOPE_COLUMN.to_string(),
            entity_type: EntityType::DocumentaryUnit,
        }
    }
}

impl ImportSettings {
    /// Settings with defaults for everything but the actor.
    pub fn new(actor: impl Into<String>) -> Self {
        Self {
            actor: actor.into(),
            scope: None,
            batch_size: DEFAULT_BATCH_SIZE,
            tolerant: false,
            scope_policy: ScopePolicy::default(),
            allow_updates: true,
            commit: true,
            default_language: DEFAULT_LANGUAGE.to_string(),
            use_source_id: false,
            event_type: EventType::Ingest,
            log_message: None,
            csv: CsvSettings::default(),
        }
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_tolerant(mut self, tolerant: bool) -> Self {
        self.tolerant = tolerant;
        self
    }

    pub fn with_scope_policy(mut self, policy: ScopePolicy) -> Self {
        self.scope_policy = policy;
        self
    }

    pub fn with_allow_updates(mut self, allow_updates: bool) -> Self {
        self.allow_updates = allow_updates;
        self
    }

    pub fn with_commit(mut self, commit: bool) -> Self {
        self.commit = commit;
        self
    }

    pub fn with_default_language(mut self, language: impl Into<String>) -> Self {
        self.default_language = language.into();
        self
    }

    pub fn with_use_source_id(mut self, use_source_id: bool) -> Self {
        self.use_source_id = use_source_id;
        self
    }

    pub fn with_log_message(mut self, message: impl Into<String>) -> Self {
        self.log_message = Some(message.into());
        self
    }

    pub fn with_csv(mut self, csv: CsvSettings) -> Self {
        self.csv = csv;
        self
    }

    /// Load settings from environment variables with defaults. The result
    /// is not checked; callers may still override fields before a run.
    ///
    /// | Env Var                   | Default            |
    /// |---------------------------|--------------------|
    /// | `IMPORT_USER`             | (required)         |
    /// | `IMPORT_SCOPE`            | none (system root) |
    /// | `IMPORT_BATCH_SIZE`       | `2500`             |
    /// | `IMPORT_TOLERANT`         | `false`            |
    /// | `IMPORT_SCOPE_POLICY`     | `skip-subtree`     |
    /// | `IMPORT_ALLOW_UPDATES`    | `true`             |
    /// | `IMPORT_COMMIT`           | `true`             |
    /// | `IMPORT_DEFAULT_LANG`     | `eng`              |
    /// | `IMPORT_USE_SOURCE_ID`    | `false`            |
    /// | `IMPORT_LOG_MESSAGE`      | none               |
    /// | `IMPORT_CSV_DELIMITER`    | `;`                |
    /// | `IMPORT_CSV_SCOPE_COLUMN` | `repositoryCode`   |
    /// | `IMPORT_CSV_ENTITY_TYPE`  | `DocumentaryUnit`  |
    pub fn from_env() -> Result<Self, PipelineError> {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());

        let actor = var("IMPORT_USER").unwrap_or_default();
        let mut settings = Self::new(actor);
        settings.scope = var("IMPORT_SCOPE");
        settings.log_message = var("IMPORT_LOG_MESSAGE");

        if let Some(raw) = var("IMPORT_BATCH_SIZE") {
            settings.batch_size = raw.trim().parse().map_err(|_| {
                PipelineError::Config(format!("IMPORT_BATCH_SIZE must be a positive integer, got {raw:?}"))
            })?;
        }
        if let Some(raw) = var("IMPORT_TOLERANT") {
            settings.tolerant = env_bool("IMPORT_TOLERANT", &raw)?;
        }
        if let Some(raw) = var("IMPORT_ALLOW_UPDATES") {
            settings.allow_updates = env_bool("IMPORT_ALLOW_UPDATES", &raw)?;
        }
        if let Some(raw) = var("IMPORT_COMMIT") {
            settings.commit = env_bool("IMPORT_COMMIT", &raw)?;
        }
        if let Some(raw) = var("IMPORT_USE_SOURCE_ID") {
            settings.use_source_id = env_bool("IMPORT_USE_SOURCE_ID", &raw)?;
        }
        if let Some(raw) = var("IMPORT_DEFAULT_LANG") {
            settings.default_language = raw.trim().to_lowercase();
        }
        if let Some(raw) = var("IMPORT_SCOPE_POLICY") {
            settings.scope_policy = parse_scope_policy(&raw)?;
        }
        if let Some(raw) = var("IMPORT_CSV_DELIMITER") {
            settings.csv.delimiter = parse_delimiter(&raw)?;
        }
        if let Some(raw) = var("IMPORT_CSV_SCOPE_COLUMN") {
            settings.csv.scope_column = raw;
        }
        if let Some(raw) = var("IMPORT_CSV_ENTITY_TYPE") {
            settings.csv.entity_type = parse_csv_entity_type(&raw)?;
        }
        Ok(settings)
    }

    /// Run the field validators, flattening failures into one error.
    pub fn check(&self) -> Result<(), PipelineError> {
        self.validate()
            .map_err(|e| PipelineError::Config(e.to_string()))
    }
}

/// `skip-subtree` or `abort-run`.
pub fn parse_scope_policy(raw: &str) -> Result<ScopePolicy, PipelineError> {
    ScopePolicy::from_str(raw.trim()).ok_or_else(|| {
        PipelineError::Config(format!("scope policy must be skip-subtree or abort-run, got {raw:?}"))
    })
}

fn env_bool(name: &str, raw: &str) -> Result<bool, PipelineError> {
    parse_bool(raw)
        .ok_or_else(|| PipelineError::Config(format!("{name} must be true or false, got {raw:?}")))
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}

/// A single ASCII character, or `\t` / `tab`.
pub fn parse_delimiter(raw: &str) -> Result<u8, PipelineError> {
    match raw {
        "\\t" | "tab" | "\t" => return Ok(b'\t'),
        _ => {}
    }
    match raw.as_bytes() {
        [b] if b.is_ascii() => Ok(*b),
        _ => Err(PipelineError::Config(format!(
            "CSV delimiter must be a single ASCII character, got {raw:?}"
        ))),
    }
}

/// Entity types CSV rows may describe.
pub fn parse_csv_entity_type(raw: &str) -> Result<EntityType, PipelineError> {
    match EntityType::from_str(raw.trim()) {
        Some(t @ (EntityType::Country | EntityType::Repository | EntityType::DocumentaryUnit)) => Ok(t),
        _ => Err(PipelineError::Config(format!(
            "CSV entity type must be Country, Repository or DocumentaryUnit, got {raw:?}"
        ))),
    }
}
