//! # retrace-timeline
//!
//! The project index for retrace: owns the document set, rebuilds the
//! phase → sort → cluster grouping whenever a dirty flag is raised, lays
//! tags out into non-overlapping timeline slots, and drives the per-tick
//! animation and enter/leave notification pass.

pub mod animation;
pub mod cluster;
pub mod layout;
pub mod probe;
pub mod project;
pub mod viewstate;

// Re-export commonly used types at crate root
pub use cluster::{Cluster, ClusterKey};
pub use layout::{AdvanceMode, CategoryBand, LayoutMetrics};
pub use probe::{BusNotifier, MetadataProbe, NotificationSink, ProbeReport, TaskKind, TaskQueue};
pub use project::{ColorShare, CriteriaSet, GroupingIndex, Project, RebuildSummary};
pub use viewstate::{DirtyFlags, SnapGuides, ViewState};
