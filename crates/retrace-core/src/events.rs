//! Project event types, envelope schema, and event bus.
//!
//! One broadcast channel aggregates events from the recompute pass and the
//! playhead (tag enter/leave cues, document status changes, rebuild
//! summaries). Downstream consumers — UI sync, external cue systems,
//! telemetry — subscribe independently.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::color::Rgba;
use crate::defaults::EVENT_BUS_CAPACITY;
use crate::document::{DocumentStatus, DocumentType};

/// Versioned event envelope wrapping a domain payload with metadata.
#[derive(Debug, Clone, Serialize)]
pub struct EventEnvelope {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// Namespaced event type (e.g. `"tag.entered"`).
    pub event_type: String,
    /// When the event occurred (UTC).
    pub occurred_at: DateTime<Utc>,
    /// Payload schema version.
    pub payload_version: u32,
    /// Domain-specific event data.
    pub payload: ProjectEvent,
}

impl EventEnvelope {
    pub fn new(event: ProjectEvent) -> Self {
        let event_type = event.namespaced_event_type().to_string();
        Self {
            event_id: Uuid::new_v4(),
            event_type,
            occurred_at: Utc::now(),
            payload_version: 1,
            payload: event,
        }
    }
}

/// Outbound cue fired when the playhead enters or leaves a tag. The payload
/// shape matches the external synchronization contract (lighting/sound
/// cues): document identity, time bounds, active flag, and the tag's color.
#[derive(Debug, Clone, Serialize)]
pub struct TagSignal {
    pub document_type: DocumentType,
    pub author: String,
    pub name: String,
    pub time_start: f64,
    pub time_end: f64,
    pub active: bool,
    pub color: Rgba,
}

/// Unified project event type.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ProjectEvent {
    /// The playhead entered a tag.
    TagEntered { signal: TagSignal },
    /// The playhead left a tag.
    TagLeft { signal: TagSignal },
    /// A document moved through the extraction pipeline.
    DocumentStatusChanged {
        document: String,
        status: DocumentStatus,
    },
    /// A recompute pass finished rebuilding the grouping index.
    IndexRebuilt {
        tag_count: usize,
        cluster_count: usize,
        duplicate_pairs: usize,
        history_count: usize,
    },
}

impl ProjectEvent {
    /// Legacy event type name (used for sink filtering).
    pub fn event_type(&self) -> &'static str {
        match self {
            ProjectEvent::TagEntered { .. } => "TagEntered",
            ProjectEvent::TagLeft { .. } => "TagLeft",
            ProjectEvent::DocumentStatusChanged { .. } => "DocumentStatusChanged",
            ProjectEvent::IndexRebuilt { .. } => "IndexRebuilt",
        }
    }

    /// Namespaced event type for the envelope.
    pub fn namespaced_event_type(&self) -> &'static str {
        match self {
            ProjectEvent::TagEntered { .. } => "tag.entered",
            ProjectEvent::TagLeft { .. } => "tag.left",
            ProjectEvent::DocumentStatusChanged { .. } => "document.status",
            ProjectEvent::IndexRebuilt { .. } => "index.rebuilt",
        }
    }
}

/// Broadcast-based event bus distributing project events to consumers.
///
/// Delivery is best-effort: with no subscribers an emission is dropped, and
/// slow receivers that fall behind the buffer receive `Lagged` and miss
/// events — freshness matters more than completeness for cue streams.
pub struct EventBus {
    tx: broadcast::Sender<EventEnvelope>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Emit an event to all subscribers, wrapped in an envelope.
    pub fn emit(&self, event: ProjectEvent) {
        let envelope = EventEnvelope::new(event);
        tracing::debug!(
            event_type = %envelope.event_type,
            event_id = %envelope.event_id,
            subscriber_count = self.tx.receiver_count(),
            "event bus emit"
        );
        let _ = self.tx.send(envelope);
    }

    /// Subscribe to enveloped events; each subscriber gets an independent
    /// stream.
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(EVENT_BUS_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signal(active: bool) -> TagSignal {
        TagSignal {
            document_type: DocumentType::Video,
            author: "ada".into(),
            name: "take1".into(),
            time_start: 10.0,
            time_end: 15.0,
            active,
            color: Rgba::default(),
        }
    }

    #[tokio::test]
    async fn test_emit_subscribe() {
        let bus = EventBus::new(32);
        let mut rx = bus.subscribe();

        bus.emit(ProjectEvent::TagEntered { signal: signal(true) });

        let envelope = rx.recv().await.unwrap();
        assert_eq!(envelope.event_type, "tag.entered");
        assert_eq!(envelope.payload_version, 1);
        assert!(matches!(envelope.payload, ProjectEvent::TagEntered { .. }));
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let bus = EventBus::new(32);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.emit(ProjectEvent::IndexRebuilt {
            tag_count: 12,
            cluster_count: 3,
            duplicate_pairs: 1,
            history_count: 2,
        });

        assert_eq!(rx1.recv().await.unwrap().event_type, "index.rebuilt");
        assert_eq!(rx2.recv().await.unwrap().event_type, "index.rebuilt");
    }

    #[tokio::test]
    async fn test_no_subscribers_ok() {
        let bus = EventBus::new(32);
        bus.emit(ProjectEvent::TagLeft { signal: signal(false) });
    }

    #[test]
    fn test_signal_payload_shape() {
        let json = serde_json::to_value(ProjectEvent::TagEntered { signal: signal(true) }).unwrap();
        assert_eq!(json["type"], "TagEntered");
        let s = &json["signal"];
        for field in ["document_type", "author", "name", "time_start", "time_end", "active", "color"] {
            assert!(s.get(field).is_some(), "missing field {field}");
        }
    }
}
