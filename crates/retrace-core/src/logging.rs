//! Structured logging schema and field name constants for retrace.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation can query by standardized names across subsystems.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Corrupt project data, requires user attention |
//! | WARN  | Recoverable issue, fallback applied (bad attribute, unparsable date) |
//! | INFO  | Lifecycle events (project open/close), pass completions |
//! | DEBUG | Pass summaries, counts, decision points |
//! | TRACE | Per-tag iteration, high-volume data (layout placements) |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "index", "criteria", "layout", "events", "store"
pub const SUBSYSTEM: &str = "subsystem";

/// Logical operation name.
/// Examples: "rebuild_timeline", "rebuild_events", "pack", "save"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Document key being operated on.
pub const DOCUMENT: &str = "document";

/// Resolved metadata version index.
pub const VERSION: &str = "version";

/// Criterion name ("sort", "color", "cluster", ...).
pub const CRITERION: &str = "criterion";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Number of documents in the project.
pub const DOCUMENT_COUNT: &str = "document_count";

/// Number of tags placed into the grouping index.
pub const TAG_COUNT: &str = "tag_count";

/// Number of live clusters after a rebuild.
pub const CLUSTER_COUNT: &str = "cluster_count";

/// Unordered hash-duplicate pairs found.
pub const DUPLICATE_PAIRS: &str = "duplicate_pairs";

/// Documents carrying more than one metadata version.
pub const HISTORY_COUNT: &str = "history_count";

/// Entries swept from a criterion's acceptance list.
pub const STALE_SWEPT: &str = "stale_swept";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
