//! Command-line surface of `arkiv-import`.
//!
//! Flags override the `IMPORT_*` environment read by
//! [`ImportSettings::from_env`].

use std::path::PathBuf;

use arkiv_core::entity::EntityType;
use arkiv_core::scope::ScopePolicy;
use arkiv_pipeline::config::{parse_csv_entity_type, parse_delimiter, parse_scope_policy};
use arkiv_pipeline::ImportSettings;
use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "arkiv-import")]
#[command(about = "Import archival descriptions into the graph store", long_about = None)]
pub struct Cli {
    /// PostgreSQL connection URL
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: String,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Print the report as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Import a directory tree of EAD/EAG files
    Xml {
        dir: PathBuf,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Import a CSV file, one record per row
    Csv {
        file: PathBuf,
        #[command(flatten)]
        run: RunArgs,
        #[command(flatten)]
        csv: CsvArgs,
    },
    /// Recompute stored ids and report inconsistencies
    Check,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Acting user recorded on the provenance event
    #[arg(short, long)]
    pub user: Option<String>,

    /// Id of the existing entity to import into
    #[arg(short, long)]
    pub scope: Option<String>,

    /// Changed records per committed batch
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Count unreadable files as record errors instead of aborting
    #[arg(long)]
    pub tolerant: bool,

    /// What to do when a record's scope is missing
    #[arg(long, value_parser = parse_scope_policy)]
    pub scope_policy: Option<ScopePolicy>,

    /// Message stored on the provenance event
    #[arg(short = 'l', long)]
    pub log_message: Option<String>,

    /// Abort instead of updating an existing entity
    #[arg(long)]
    pub no_updates: bool,

    /// Resolve everything, then roll back
    #[arg(long)]
    pub dry_run: bool,

    /// Language of descriptions that declare none
    #[arg(long)]
    pub default_lang: Option<String>,

    /// Keep descriptions from other source files apart
    #[arg(long)]
    pub use_source_id: bool,

    /// Print every resolved record
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Args, Debug, Default)]
pub struct CsvArgs {
    /// Field delimiter (single character, or `tab`)
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,

    /// Column naming each row's scope below the run scope
    #[arg(long)]
    pub scope_column: Option<String>,

    /// Entity type of every row
    #[arg(long, value_parser = parse_csv_entity_type)]
    pub entity_type: Option<EntityType>,
}

impl RunArgs {
    /// Layer the flags over `settings`.
    pub fn apply(self, settings: &mut ImportSettings) {
        if let Some(user) = self.user {
            settings.actor = user;
        }
        if self.scope.is_some() {
            settings.scope = self.scope;
        }
        if let Some(batch_size) = self.batch_size {
            settings.batch_size = batch_size;
        }
        if self.tolerant {
            settings.tolerant = true;
        }
        if let Some(policy) = self.scope_policy {
            settings.scope_policy = policy;
        }
        if self.log_message.is_some() {
            settings.log_message = self.log_message;
        }
        if self.no_updates {
            settings.allow_updates = false;
        }
        if self.dry_run {
            settings.commit = false;
        }
        if let Some(lang) = self.default_lang {
            settings.default_language = lang.trim().to_lowercase();
        }
        if self.use_source_id {
            settings.use_source_id = true;
        }
    }
}

impl CsvArgs {
    pub fn apply(self, settings: &mut ImportSettings) {
        if let Some(delimiter) = self.delimiter {
            settings.csv.delimiter = delimiter;
        }
        if let Some(column) = self.scope_column {
            settings.csv.scope_column = column;
        }
        if let Some(entity_type) = self.entity_type {
            settings.csv.entity_type = entity_type;
        }
    }
}
