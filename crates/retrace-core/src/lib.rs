//! # retrace-core
//!
//! Core types and abstractions for retrace, a media-annotation timeline
//! engine: versioned document metadata, tags and their temporal state
//! machine, classification criteria, and the project event bus.
//!
//! The orchestration pass that turns these pieces into a grouped,
//! laid-out timeline lives in `retrace-timeline`.

pub mod color;
pub mod criteria;
pub mod defaults;
pub mod document;
pub mod error;
pub mod events;
pub mod geom;
pub mod logging;
pub mod metadata;
pub mod person;
pub mod tag;
pub mod timecode;

// Re-export commonly used types at crate root
pub use color::{scale_color, Rgba, SEVEN_KEY_PALETTE};
pub use criteria::{Acceptance, CriterionOrdering, PhaseSchedule, SortCriterion};
pub use document::{
    hash_file, Document, DocumentFunction, DocumentKey, DocumentStatus, DocumentType,
};
pub use error::{Error, Result};
pub use events::{EventBus, EventEnvelope, ProjectEvent, TagSignal};
pub use geom::{Point, Rect};
pub use metadata::{MetadataStore, MetadataValue, MetadataVersion, VersionRef};
pub use person::{CardSection, PersonCard};
pub use tag::{SnapEdge, Tag, TagHandle, TagKeys, TagKind};
pub use timecode::{format_timecode, parse_timecode};
