//! Provenance events for import runs.
//!
//! - [`event`] -- the [`ProvenanceEvent`](event::ProvenanceEvent) record and
//!   its builder.
//! - [`context`] -- [`EventContext`](context::EventContext), which collects
//!   the subjects touched by a run.
//! - [`persistence`] -- writes a finished context to the graph store.

pub mod context;
pub mod event;
pub mod persistence;

pub use context::EventContext;
pub use event::{EventType, ProvenanceEvent};
pub use persistence::EventPersistence;
