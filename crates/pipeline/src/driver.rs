//! The hierarchical import driver.
//!
//! Walks a [`RecordSource`] depth-first with an explicit stack. Each record
//! is normalized, resolved against the store under its scope and reported to
//! the [`ImportCoordinator`]; its children are then pushed with the entity
//! just resolved as their scope. Children are pushed only after the parent's
//! mutation is recorded, and in reverse so siblings pop in source order.
//! Components nested in a record's own document pop before the records of
//! its child directory.
//!
//! Per-record failures are counted and the failed record's subtree is
//! skipped; fatal errors abort the run.

use std::path::Path;

use arkiv_core::mutation::Mutation;
use arkiv_core::normalize;
use arkiv_core::record::ImportRecord;
use arkiv_core::scope::{Scope, ScopePolicy};
use arkiv_db::GraphStore;

use crate::config::ImportSettings;
use crate::coordinator::{ImportCoordinator, ImportReport, MutationSender};
use crate::error::PipelineError;
use crate::resolver::{self, ResolveOptions};
use crate::scope::ScopeCache;
use crate::source::{CsvSource, RecordSource, SourceEntry, XmlSource};

type Stack = Vec<(SourceEntry, Scope)>;

fn push_all(stack: &mut Stack, entries: Vec<SourceEntry>, scope: &Scope) {
    stack.extend(entries.into_iter().rev().map(|e| (e, scope.clone())));
}

/// Runs imports against one store with fixed settings.
pub struct ImportDriver<'s> {
    store: &'s dyn GraphStore,
    settings: ImportSettings,
    sender: Option<MutationSender>,
}

impl<'s> ImportDriver<'s> {
    pub fn new(store: &'s dyn GraphStore, settings: ImportSettings) -> Result<Self, PipelineError> {
        settings.check()?;
        Ok(Self {
            store,
            settings,
            sender: None,
        })
    }

    /// Stream every resolved mutation of each run to `sender`.
    pub fn with_sender(mut self, sender: MutationSender) -> Self {
        self.sender = Some(sender);
        self
    }

    pub fn settings(&self) -> &ImportSettings {
        &self.settings
    }

    /// Import a directory tree of XML record files.
    pub async fn import_xml(&self, dir: &Path) -> Result<ImportReport, PipelineError> {
        tracing::info!(source = %dir.display(), "Importing XML directory");
        self.run(&XmlSource::new(dir)).await
    }

    /// Import a CSV file, one record per row.
    pub async fn import_csv(&self, file: &Path) -> Result<ImportReport, PipelineError> {
        tracing::info!(source = %file.display(), "Importing CSV file");
        self.run(&CsvSource::new(file, self.settings.csv.clone())).await
    }

    /// Import every record of `source`. On a fatal error the open batch is
    /// rolled back and the error returned; earlier batches stay committed.
    pub async fn run(&self, source: &dyn RecordSource) -> Result<ImportReport, PipelineError> {
        let mut coord = ImportCoordinator::begin(
            self.store,
            &self.settings.actor,
            self.settings.event_type,
            self.settings.log_message.clone(),
            self.settings.batch_size,
        )
        .await?;
        if let Some(sender) = &self.sender {
            coord = coord.with_sender(sender.clone());
        }
        if !self.settings.commit {
            tracing::info!("Dry run, nothing will be committed");
            coord = coord.dry_run();
        }

        match self.walk(source, &mut coord).await {
            Ok(()) => coord.finish().await,
            Err(err) => Err(coord.abort(err).await),
        }
    }

    async fn walk(
        &self,
        source: &dyn RecordSource,
        coord: &mut ImportCoordinator<'_>,
    ) -> Result<(), PipelineError> {
        let mut scopes = ScopeCache::new();
        let run_scope = match &self.settings.scope {
            Some(id) => scopes.get(coord.tx()?, id).await?,
            None => Scope::system(),
        };
        tracing::info!(scope = %run_scope, "Resolved run scope");

        let mut stack = Stack::new();
        push_all(&mut stack, source.roots()?, &run_scope);

        while let Some((entry, scope)) = stack.pop() {
            match entry {
                SourceEntry::ScopeUnit { key, dir, location } => {
                    match scopes.get_child(coord.tx()?, &scope, &key).await {
                        Ok(unit_scope) => push_all(&mut stack, source.children(&dir)?, &unit_scope),
                        Err(err) => {
                            let skipped = source.count_records(&dir);
                            self.scope_failure(coord, &location, skipped, err)?
                        }
                    }
                }
                SourceEntry::Unreadable { location, message } => {
                    let err = PipelineError::Source {
                        location: location.clone(),
                        message,
                    };
                    self.unreadable(coord, &location, 0, err)?;
                }
                SourceEntry::File { path, location } => match source.read(&path, &location) {
                    Ok(record) => self.visit(coord, &mut scopes, source, &mut stack, record, scope).await?,
                    Err(err) => {
                        let skipped = source.count_records(&path.with_extension(""));
                        self.unreadable(coord, &location, skipped, err)?;
                    }
                },
                SourceEntry::Record(record) => {
                    self.visit(coord, &mut scopes, source, &mut stack, record, scope).await?
                }
            }
        }
        Ok(())
    }

    /// Process one record and queue its components and children.
    async fn visit(
        &self,
        coord: &mut ImportCoordinator<'_>,
        scopes: &mut ScopeCache,
        source: &dyn RecordSource,
        stack: &mut Stack,
        mut record: ImportRecord,
        scope: Scope,
    ) -> Result<(), PipelineError> {
        let scope = match &record.scope_key {
            Some(key) => match scopes.get_child(coord.tx()?, &scope, key).await {
                Ok(s) => s,
                Err(err) => {
                    let skipped = self.subtree_size(source, &record);
                    return self.scope_failure(coord, &record.location, skipped, err);
                }
            },
            None => scope,
        };

        match self.process(coord, &record, &scope).await {
            Ok((mutation, identifier)) => {
                let child_scope = scope.child(mutation.entity.clone(), &identifier);
                coord.record(mutation);
                coord.maybe_commit().await?;
                if let Some(dir) = &record.children {
                    push_all(stack, source.children(dir)?, &child_scope);
                }
                let components = std::mem::take(&mut record.components)
                    .into_iter()
                    .map(SourceEntry::Record)
                    .collect();
                push_all(stack, components, &child_scope);
                Ok(())
            }
            Err(err) if err.is_fatal() => Err(err),
            Err(err) => {
                coord.record_error(&record.location, &err);
                coord.record_skipped(&record.location, self.subtree_size(source, &record));
                Ok(())
            }
        }
    }

    /// Records below `record`: its nested components plus its child directory.
    fn subtree_size(&self, source: &dyn RecordSource, record: &ImportRecord) -> u64 {
        let files = record
            .children
            .as_deref()
            .map_or(0, |dir| source.count_records(dir));
        record.descendant_count() + files
    }

    /// Normalize and resolve one record. Returns the mutation and the
    /// record's local identifier.
    async fn process(
        &self,
        coord: &mut ImportCoordinator<'_>,
        record: &ImportRecord,
        scope: &Scope,
    ) -> Result<(Mutation, String), PipelineError> {
        let normalized = normalize::normalize_with_language(record, &self.settings.default_language)?;
        for warning in &normalized.warnings {
            tracing::warn!(location = %record.location, "{warning}");
        }
        let identifier = normalized.bundle.identifier().unwrap_or_default().to_string();
        let options = ResolveOptions {
            allow_updates: self.settings.allow_updates,
            use_source_id: self.settings.use_source_id,
        };
        let mutation = resolver::resolve_with(coord.tx()?, normalized.bundle, scope, options).await?;
        Ok((mutation, identifier))
    }

    /// A scope could not be resolved: skip the subtree or abort, per policy.
    fn scope_failure(
        &self,
        coord: &mut ImportCoordinator<'_>,
        location: &str,
        skipped: u64,
        err: PipelineError,
    ) -> Result<(), PipelineError> {
        if !err.is_scope_resolution() || self.settings.scope_policy == ScopePolicy::AbortRun {
            return Err(err);
        }
        coord.record_error(location, &err);
        coord.record_skipped(location, skipped);
        Ok(())
    }

    /// A record could not be read: count it when tolerant, abort otherwise.
    fn unreadable(
        &self,
        coord: &mut ImportCoordinator<'_>,
        location: &str,
        skipped: u64,
        err: PipelineError,
    ) -> Result<(), PipelineError> {
        if !self.settings.tolerant {
            return Err(err);
        }
        coord.record_error(location, &err);
        coord.record_skipped(location, skipped);
        Ok(())
    }
}
