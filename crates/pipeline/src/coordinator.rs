//! Transaction and audit coordination for one import run.
//!
//! The coordinator owns the open store transaction and the run's
//! provenance event. Changed records are committed in batches of
//! `batch_size`; each commit also writes the event's new subject edges, so
//! every committed change is linked to the run's event even if a later batch
//! fails. A run that changes nothing is rolled back and leaves no event.
//!
//! Mutations are counted, not kept. A caller that wants them in resolution
//! order attaches a [`MutationSender`].

use arkiv_core::import_log::ImportLog;
use arkiv_core::mutation::Mutation;
use arkiv_db::{GraphStore, GraphTx};
use arkiv_events::{EventContext, EventPersistence, EventType};
use serde::Serialize;
use tokio::sync::mpsc;

use crate::error::PipelineError;

/// Receives every resolved mutation of a run, in resolution order.
pub type MutationSender = mpsc::UnboundedSender<Mutation>;

/// Outcome of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub log: ImportLog,
    /// The persisted provenance event, if the run committed changes.
    pub event_id: Option<String>,
    /// Number of committed transactions.
    pub batches: usize,
    /// The run was rolled back on purpose.
    pub dry_run: bool,
}

pub struct ImportCoordinator<'s> {
    store: &'s dyn GraphStore,
    tx: Option<Box<dyn GraphTx>>,
    ctx: EventContext,
    log: ImportLog,
    sender: Option<MutationSender>,
    batch_size: usize,
    pending: usize,
    batches: usize,
    dry_run: bool,
}

impl<'s> ImportCoordinator<'s> {
    /// Open the run's event and its first transaction.
    pub async fn begin(
        store: &'s dyn GraphStore,
        actor: &str,
        event_type: EventType,
        message: Option<String>,
        batch_size: usize,
    ) -> Result<Self, PipelineError> {
        let tx = store.begin().await?;
        let ctx = EventContext::begin(actor, event_type, message);
        tracing::info!(event_id = %ctx.event().id, actor, batch_size, "Import run started");
        Ok(Self {
            store,
            tx: Some(tx),
            ctx,
            log: ImportLog::new(),
            sender: None,
            batch_size: batch_size.max(1),
            pending: 0,
            batches: 0,
            dry_run: false,
        })
    }

    /// Send every recorded mutation to `sender`.
    pub fn with_sender(mut self, sender: MutationSender) -> Self {
        self.sender = Some(sender);
        self
    }

    /// Keep the whole run in one transaction and roll it back at the end.
    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }

    /// The open transaction.
    pub fn tx(&mut self) -> Result<&mut dyn GraphTx, PipelineError> {
        match self.tx.as_mut() {
            Some(tx) => Ok(tx.as_mut()),
            None => Err(PipelineError::Config("no open transaction".to_string())),
        }
    }

    /// Record a resolved mutation against the log and the event.
    pub fn record(&mut self, mutation: Mutation) {
        self.log.add_mutation(&mutation);
        self.ctx.record(&mutation);
        if mutation.is_change() {
            self.pending += 1;
        }
        tracing::debug!(%mutation, "Resolved record");
        if let Some(sender) = &self.sender {
            if sender.send(mutation).is_err() {
                tracing::debug!("Mutation receiver dropped");
                self.sender = None;
            }
        }
    }

    /// Count a failed record.
    pub fn record_error(&mut self, location: &str, err: &PipelineError) {
        tracing::warn!(location, kind = err.kind(), error = %err, "Record failed");
        self.log.add_error(location, err.to_string());
    }

    /// Count records skipped because an ancestor failed.
    pub fn record_skipped(&mut self, location: &str, count: u64) {
        if count > 0 {
            tracing::warn!(location, count, "Skipped descendants of failed record");
            self.log.add_skipped(count);
        }
    }

    pub fn log(&self) -> &ImportLog {
        &self.log
    }

    /// Commit and reopen the transaction once `batch_size` changes are
    /// pending. Returns whether a commit happened.
    pub async fn maybe_commit(&mut self) -> Result<bool, PipelineError> {
        if self.dry_run || self.pending < self.batch_size {
            return Ok(false);
        }
        self.flush().await?;
        self.tx = Some(self.store.begin().await?);
        Ok(true)
    }

    /// Write pending event subjects and commit the open transaction.
    async fn flush(&mut self) -> Result<(), PipelineError> {
        let mut tx = self
            .tx
            .take()
            .ok_or_else(|| PipelineError::Config("no open transaction".to_string()))?;
        if let Err(e) = EventPersistence::persist(tx.as_mut(), &self.ctx).await {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!(error = %rollback_err, "Rollback after failed event write failed");
            }
            return Err(e.into());
        }
        tx.commit().await?;
        self.ctx.mark_flushed();
        self.batches += 1;
        tracing::info!(
            batch = self.batches,
            changes = self.pending,
            total_changes = self.log.changed(),
            "Committed import batch"
        );
        self.pending = 0;
        Ok(())
    }

    /// End the run: commit if anything changed, otherwise roll back. A dry
    /// run always rolls back.
    pub async fn finish(mut self) -> Result<ImportReport, PipelineError> {
        let event_id = if self.dry_run {
            if let Some(tx) = self.tx.take() {
                tx.rollback().await?;
            }
            tracing::info!(changes = self.log.changed(), "Dry run, all changes rolled back");
            None
        } else if self.log.has_done_work() {
            if self.pending > 0 || !self.ctx.is_persisted() {
                self.flush().await?;
            } else if let Some(tx) = self.tx.take() {
                tx.rollback().await?;
            }
            Some(self.ctx.event().id.clone())
        } else {
            if let Some(tx) = self.tx.take() {
                tx.rollback().await?;
            }
            tracing::info!("Import made no changes, nothing committed");
            None
        };

        tracing::info!(
            created = self.log.created,
            updated = self.log.updated,
            unchanged = self.log.unchanged,
            errors = self.log.errored,
            batches = self.batches,
            "Import run finished"
        );
        Ok(ImportReport {
            log: self.log,
            event_id,
            batches: self.batches,
            dry_run: self.dry_run,
        })
    }

    /// Roll back the open batch after a fatal error and hand the error back.
    /// Batches committed earlier stay committed.
    pub async fn abort(mut self, err: PipelineError) -> PipelineError {
        tracing::error!(
            kind = err.kind(),
            error = %err,
            committed_batches = self.batches,
            "Import aborted, rolling back open batch"
        );
        if let Some(tx) = self.tx.take() {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::error!(error = %rollback_err, "Rollback failed");
            }
        }
        err
    }
}
