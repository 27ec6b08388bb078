//! The provenance record shared by every mutation of one import run.

use arkiv_core::entity::{EntityType, Node};
use arkiv_core::types::{keys, Properties, Timestamp};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// EventType
// ---------------------------------------------------------------------------

/// What kind of change an event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    /// Bulk import from an external source.
    Ingest,
    /// Manual or scripted modification of existing entities.
    Modification,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ingest => "ingest",
            Self::Modification => "modification",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "ingest" => Some(Self::Ingest),
            "modification" => Some(Self::Modification),
            _ => None,
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ProvenanceEvent
// ---------------------------------------------------------------------------

/// One provenance record.
///
/// Constructed via [`ProvenanceEvent::new`] and enriched with
/// [`with_actor`](ProvenanceEvent::with_actor) and
/// [`with_message`](ProvenanceEvent::with_message).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceEvent {
    /// Random id; events are not scoped.
    pub id: String,

    pub event_type: EventType,

    /// Identifier of the acting principal.
    pub actor: String,

    /// Optional human-readable description of the run.
    pub log_message: Option<String>,

    /// When the event was created (UTC).
    pub timestamp: Timestamp,
}

impl ProvenanceEvent {
    pub fn new(event_type: EventType) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            event_type,
            actor: String::new(),
            log_message: None,
            timestamp: Utc::now(),
        }
    }

    /// Attach the acting principal.
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = actor.into();
        self
    }

    /// Set the log message. Blank messages are ignored.
    pub fn with_message(mut self, message: Option<impl Into<String>>) -> Self {
        self.log_message = message.map(Into::into).filter(|m| !m.trim().is_empty());
        self
    }

    /// The `SystemEvent` node this event is stored as.
    pub fn to_node(&self) -> Node {
        let mut properties = Properties::new();
        properties.insert(keys::EVENT_TYPE.into(), self.event_type.as_str().into());
        properties.insert(keys::TIMESTAMP.into(), self.timestamp.to_rfc3339().into());
        properties.insert(keys::ACTIONER.into(), self.actor.clone().into());
        if let Some(message) = &self.log_message {
            properties.insert(keys::LOG_MESSAGE.into(), message.clone().into());
        }
        Node::new(self.id.clone(), EntityType::SystemEvent, properties)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_actor_and_message() {
        let event = ProvenanceEvent::new(EventType::Ingest)
            .with_actor("mike")
            .with_message(Some("Initial EAD import"));
        assert_eq!(event.actor, "mike");
        assert_eq!(event.log_message.as_deref(), Some("Initial EAD import"));
        assert_eq!(Uuid::parse_str(&event.id).unwrap().get_version_num(), 4);
    }

    #[test]
    fn blank_message_is_dropped() {
        let event = ProvenanceEvent::new(EventType::Ingest).with_message(Some("  "));
        assert!(event.log_message.is_none());
        assert!(!event.to_node().properties.contains_key(keys::LOG_MESSAGE));
    }

    #[test]
    fn node_carries_type_actor_and_timestamp() {
        let event = ProvenanceEvent::new(EventType::Modification).with_actor("admin");
        let node = event.to_node();
        assert_eq!(node.entity_type, EntityType::SystemEvent);
        assert_eq!(node.str_property(keys::EVENT_TYPE), Some("modification"));
        assert_eq!(node.str_property(keys::ACTIONER), Some("admin"));
        assert!(node.str_property(keys::TIMESTAMP).is_some());
    }
}
