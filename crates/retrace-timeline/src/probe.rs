//! Collaborator seams: metadata extraction, the task queue, and outbound
//! notification sinks.
//!
//! These traits define the interfaces the engine consumes; concrete
//! implementations (media probes, extraction workers, OSC/DMX bridges)
//! live outside this workspace.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use retrace_core::document::{DocumentFunction, DocumentType};
use retrace_core::error::Result;
use retrace_core::events::{EventBus, ProjectEvent, TagSignal};

/// What an extraction pass learned about a file. Applied to the document's
/// newest metadata version when the probe completes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProbeReport {
    pub doc_type: Option<DocumentType>,
    pub function: Option<DocumentFunction>,
    /// Seconds of playable media.
    pub media_duration: Option<f64>,
    pub author: Option<String>,
    /// Content hash feeding duplicate linking.
    pub content_hash: Option<String>,
    pub captured_at: Option<DateTime<Utc>>,
    /// GPS facts as (key, value) text pairs.
    pub gps: Vec<(String, String)>,
    /// Any further `(category, key, value)` entries.
    pub extra: Vec<(String, String, String)>,
}

/// Asynchronous metadata extraction for one file.
#[async_trait]
pub trait MetadataProbe: Send + Sync {
    async fn probe(&self, path: &Path) -> Result<ProbeReport>;
}

/// Extraction work kinds, by decreasing urgency of their results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Metadata,
    Thumbnails,
    Waveform,
}

/// Work queue for extraction tasks. Implementations guarantee at most one
/// extraction in flight per document.
pub trait TaskQueue: Send + Sync {
    fn enqueue(&self, document: &retrace_core::DocumentKey, kind: TaskKind, priority: i32);
    fn clear(&self);
}

/// Best-effort outbound delivery of tag enter/leave cues. Delivery order
/// across sinks is unspecified; sinks must not block the tick.
pub trait NotificationSink {
    fn deliver(&self, signal: &TagSignal);
}

/// Sink adapter publishing cues onto an [`EventBus`].
pub struct BusNotifier {
    bus: Arc<EventBus>,
}

impl BusNotifier {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self { bus }
    }
}

impl NotificationSink for BusNotifier {
    fn deliver(&self, signal: &TagSignal) {
        let event = if signal.active {
            ProjectEvent::TagEntered { signal: signal.clone() }
        } else {
            ProjectEvent::TagLeft { signal: signal.clone() }
        };
        self.bus.emit(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use retrace_core::Rgba;

    fn signal(active: bool) -> TagSignal {
        TagSignal {
            document_type: DocumentType::Marker,
            author: String::new(),
            name: "cue".into(),
            time_start: 4.0,
            time_end: 4.0,
            active,
            color: Rgba::default(),
        }
    }

    #[tokio::test]
    async fn test_bus_notifier_maps_active_flag() {
        let bus = Arc::new(EventBus::new(8));
        let mut rx = bus.subscribe();
        let sink = BusNotifier::new(bus);

        sink.deliver(&signal(true));
        sink.deliver(&signal(false));

        assert_eq!(rx.recv().await.unwrap().event_type, "tag.entered");
        assert_eq!(rx.recv().await.unwrap().event_type, "tag.left");
    }
}
