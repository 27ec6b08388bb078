//! Per-run tally of mutations and record errors.

use std::fmt::Write as _;

use indexmap::IndexMap;
use serde::Serialize;

use crate::mutation::{Mutation, MutationState};

/// Counts for one import run plus the error message for every record that
/// failed, keyed by source location.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportLog {
    pub created: u64,
    pub updated: u64,
    pub unchanged: u64,
    pub errored: u64,
    /// Records skipped because an ancestor failed.
    pub skipped: u64,
    pub errors: IndexMap<String, String>,
}

impl ImportLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_mutation(&mut self, mutation: &Mutation) {
        self.add_state(mutation.state);
    }

    pub fn add_state(&mut self, state: MutationState) {
        match state {
            MutationState::Created => self.created += 1,
            MutationState::Updated => self.updated += 1,
            MutationState::Unchanged => self.unchanged += 1,
        }
    }

    /// Count a failed record. A second error at the same location keeps the
    /// first message.
    pub fn add_error(&mut self, location: impl Into<String>, message: impl Into<String>) {
        self.errored += 1;
        self.errors.entry(location.into()).or_insert_with(|| message.into());
    }

    pub fn add_skipped(&mut self, count: u64) {
        self.skipped += count;
    }

    /// Number of records that wrote to the store.
    pub fn changed(&self) -> u64 {
        self.created + self.updated
    }

    /// True iff at least one record was created or updated.
    pub fn has_done_work(&self) -> bool {
        self.changed() > 0
    }

    /// Total records that reached the resolver or failed before it.
    pub fn total(&self) -> u64 {
        self.created + self.updated + self.unchanged + self.errored
    }

    /// Human-readable run summary, one error per line after the counts.
    pub fn report(&self) -> String {
        let mut out = format!(
            "Created: {}, Updated: {}, Unchanged: {}, Errors: {}",
            self.created, self.updated, self.unchanged, self.errored
        );
        if self.skipped > 0 {
            let _ = write!(out, ", Skipped: {}", self.skipped);
        }
        for (location, message) in &self.errors {
            let _ = write!(out, "\n  {location}: {message}");
        }
        out
    }
}

impl std::fmt::Display for ImportLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.report())
    }
}
