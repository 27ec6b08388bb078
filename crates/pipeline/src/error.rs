use arkiv_core::error::CoreError;
use arkiv_db::StoreError;

/// Errors raised while running an import.
///
/// Per-record errors ([`is_fatal`](PipelineError::is_fatal) is false) are
/// counted against the record and the run continues; everything else aborts
/// the run and rolls back the open batch.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// A source file or row could not be parsed.
    #[error("Unreadable source {location}: {message}")]
    Source { location: String, message: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A record would change an existing entity while updates are off.
    #[error("{id} already exists and updates are not allowed")]
    ModeViolation { id: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    pub fn source_error(location: impl Into<String>, message: impl ToString) -> Self {
        Self::Source {
            location: location.into(),
            message: message.to_string(),
        }
    }

    pub fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }

    /// Whether the error ends the run.
    ///
    /// Invalid records, validation failures, store constraint violations and
    /// missing scopes are per-record. Scope failures are then escalated or
    /// not by the configured scope policy.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Core(CoreError::InvalidRecord(_))
            | Self::Core(CoreError::Validation(_))
            | Self::Core(CoreError::ScopeResolution { .. }) => false,
            Self::Store(e) => !e.is_constraint(),
            _ => true,
        }
    }

    pub fn is_scope_resolution(&self) -> bool {
        matches!(self, Self::Core(CoreError::ScopeResolution { .. }))
    }

    /// Short machine-readable kind, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Core(CoreError::InvalidRecord(_)) => "invalid_record",
            Self::Core(CoreError::Validation(_)) => "validation",
            Self::Core(CoreError::ScopeResolution { .. }) => "scope_resolution",
            Self::Core(CoreError::Internal(_)) => "internal",
            Self::Store(StoreError::Constraint(_)) => "constraint",
            Self::Store(_) => "store",
            Self::Source { .. } => "source",
            Self::Io { .. } => "io",
            Self::ModeViolation { .. } => "mode_violation",
            Self::Config(_) => "config",
        }
    }
}
