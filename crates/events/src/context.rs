//! Accumulates the subjects of one run's provenance event.

use arkiv_core::entity::EntityRef;
use arkiv_core::mutation::Mutation;
use indexmap::IndexSet;

use crate::event::{EventType, ProvenanceEvent};

/// The open provenance event of a run plus every entity it touched.
///
/// Only CREATED and UPDATED mutations become subjects; an entity touched
/// twice is listed once. Subjects are written in batches: `flushed` counts
/// those already linked in a committed transaction.
#[derive(Debug, Clone)]
pub struct EventContext {
    event: ProvenanceEvent,
    subjects: IndexSet<EntityRef>,
    flushed: usize,
    persisted: bool,
}

impl EventContext {
    /// Open an event for a run.
    pub fn begin(actor: impl Into<String>, event_type: EventType, message: Option<String>) -> Self {
        Self {
            event: ProvenanceEvent::new(event_type)
                .with_actor(actor)
                .with_message(message),
            subjects: IndexSet::new(),
            flushed: 0,
            persisted: false,
        }
    }

    /// Add the mutation's entity as a subject if it changed the store.
    /// Returns whether it was added.
    pub fn record(&mut self, mutation: &Mutation) -> bool {
        if !mutation.is_change() {
            return false;
        }
        self.subjects.insert(mutation.entity.clone())
    }

    pub fn event(&self) -> &ProvenanceEvent {
        &self.event
    }

    pub fn subjects(&self) -> impl Iterator<Item = &EntityRef> {
        self.subjects.iter()
    }

    pub fn subject_count(&self) -> usize {
        self.subjects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }

    /// Subjects not yet linked to the stored event.
    pub fn pending_subjects(&self) -> impl Iterator<Item = &EntityRef> {
        self.subjects.iter().skip(self.flushed)
    }

    /// Whether the event node has been written.
    pub fn is_persisted(&self) -> bool {
        self.persisted
    }

    /// Record that the event node and all current subjects were written.
    pub fn mark_flushed(&mut self) {
        self.persisted = true;
        self.flushed = self.subjects.len();
    }
}
