//! Writes a finished [`EventContext`] to the graph store.

use arkiv_core::types::labels;
use arkiv_db::{GraphTx, StoreError};

use crate::context::EventContext;

/// Persists provenance events as `SystemEvent` nodes linked to their
/// subjects by `hasSubject` edges.
pub struct EventPersistence;

impl EventPersistence {
    /// Write the event node (on first call) and the edges for all pending
    /// subjects inside `tx`, returning the event id.
    ///
    /// The caller must call [`EventContext::mark_flushed`] once `tx` has
    /// committed.
    pub async fn persist(tx: &mut dyn GraphTx, ctx: &EventContext) -> Result<String, StoreError> {
        let event_id = ctx.event().id.clone();
        if !ctx.is_persisted() {
            tx.create_node(&ctx.event().to_node()).await?;
        }
        let mut linked = 0usize;
        for subject in ctx.pending_subjects() {
            tx.add_edge(&event_id, labels::HAS_SUBJECT, &subject.id).await?;
            linked += 1;
        }
        tracing::info!(
            event_id = %event_id,
            event_type = %ctx.event().event_type,
            actor = %ctx.event().actor,
            subjects = linked,
            "Persisted provenance event"
        );
        Ok(event_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arkiv_core::entity::{EntityRef, EntityType, Node};
    use arkiv_core::mutation::Mutation;
    use arkiv_core::types::{keys, Properties};
    use arkiv_db::{GraphStore, MemoryGraphStore};

    use crate::event::EventType;

    #[tokio::test]
    async fn event_links_every_subject() {
        let store = MemoryGraphStore::new();
        store
            .seed([
                Node::new("gb", EntityType::Country, Properties::new()),
                Node::new("gb-r1", EntityType::Repository, Properties::new()),
            ])
            .unwrap();

        let mut ctx = EventContext::begin("mike", EventType::Ingest, Some("test".into()));
        for (id, entity_type) in [("gb", EntityType::Country), ("gb-r1", EntityType::Repository)] {
            ctx.record(&Mutation::created(EntityRef {
                id: id.into(),
                entity_type,
            }));
        }

        let mut tx = store.begin().await.unwrap();
        let event_id = EventPersistence::persist(tx.as_mut(), &ctx).await.unwrap();
        tx.commit().await.unwrap();

        let event = store.node(&event_id).unwrap();
        assert_eq!(event.entity_type, EntityType::SystemEvent);
        assert_eq!(event.str_property(keys::LOG_MESSAGE), Some("test"));
        let targets: Vec<String> = store
            .edges_from(&event_id, labels::HAS_SUBJECT)
            .into_iter()
            .map(|e| e.target)
            .collect();
        assert_eq!(targets, vec!["gb", "gb-r1"]);
    }

    #[tokio::test]
    async fn second_flush_adds_edges_without_a_second_node() {
        let store = MemoryGraphStore::new();
        store
            .seed([
                Node::new("a", EntityType::Country, Properties::new()),
                Node::new("b", EntityType::Country, Properties::new()),
            ])
            .unwrap();
        let country = |id: &str| EntityRef {
            id: id.into(),
            entity_type: EntityType::Country,
        };

        let mut ctx = EventContext::begin("mike", EventType::Ingest, None);
        ctx.record(&Mutation::created(country("a")));
        let mut tx = store.begin().await.unwrap();
        EventPersistence::persist(tx.as_mut(), &ctx).await.unwrap();
        tx.commit().await.unwrap();
        ctx.mark_flushed();

        ctx.record(&Mutation::created(country("b")));
        let mut tx = store.begin().await.unwrap();
        let event_id = EventPersistence::persist(tx.as_mut(), &ctx).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(store.nodes_of_type(EntityType::SystemEvent).len(), 1);
        assert_eq!(store.edges_from(&event_id, labels::HAS_SUBJECT).len(), 2);
    }
}
