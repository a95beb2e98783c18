//! Centralized default constants for retrace.
//!
//! **This module is the single source of truth** for shared default values.
//! All crates reference these constants instead of defining their own magic
//! numbers. Organized by domain area.

// =============================================================================
// TIME & DURATION
// =============================================================================

/// Duration (in timeline units) seeded when a tag gains an interval kind.
pub const DEFAULT_TAG_DURATION: f64 = 5.0;

/// Sentinel used when a document's media duration is unknown (`<= 0`):
/// clamps behave as if the media were unbounded.
pub const UNBOUNDED_MEDIA_DURATION: f64 = 9_999_999.0;

/// Snap radius (in timeline units) when dragging near another tag's bounds.
pub const SNAP_RADIUS: f64 = 1.0;

// =============================================================================
// LAYOUT
// =============================================================================

/// Horizontal pixels per timeline unit.
pub const TIME_UNIT: f64 = 13.0;

/// Height of a timeline tag row.
pub const TIMELINE_TAG_HEIGHT: f64 = 7.0;

/// Vertical spacing between stacked timeline rows.
pub const TIMELINE_TAG_VSPACING: f64 = 2.0;

/// Vertical spacing between category bands.
pub const TIMELINE_TAG_VSEPARATOR: f64 = 5.0;

/// Timeline header (category label gutter) size.
pub const TIMELINE_HEADER_WIDTH: f64 = 200.0;
pub const TIMELINE_HEADER_HEIGHT: f64 = 15.0;

/// Width of the dock holding global (undated) tags on the timeline axis.
pub const TIMELINE_GLOBAL_DOCK_WIDTH: f64 = 35.0;

/// Height of one viewer row.
pub const VIEWER_TAG_HEIGHT: f64 = 30.0;

// =============================================================================
// ANIMATION
// =============================================================================

/// Exponential smoothing divisor: eased values close 1/INERTIA of the gap
/// to their destination per tick.
pub const INERTIA: f64 = 5.0;

/// Milliseconds a milestone blinks after the playhead enters it.
pub const TAG_BLINK_MS: f64 = 2000.0;

// =============================================================================
// CRITERIA
// =============================================================================

/// `end_scan` refuses to drop more than this many stale acceptance entries
/// in one sweep. Guards the UI list against a partial-data rescan wiping
/// user toggles.
pub const CRITERION_STALE_SWEEP_CAP: usize = 128;

/// Width of zero-padded numeric canonical keys. Wide enough that offset
/// numeric values pad to a uniform length.
pub const NUMERIC_KEY_WIDTH: usize = 20;

/// Width of zero-padded phase rank keys.
pub const PHASE_KEY_WIDTH: usize = 4;

// =============================================================================
// EVENTS
// =============================================================================

/// Default event bus broadcast channel capacity.
pub const EVENT_BUS_CAPACITY: usize = 256;

// =============================================================================
// FILE TYPES
// =============================================================================

/// File suffixes classified as video documents.
pub const SUFFIXES_VIDEO: &[&str] = &["mov", "avi", "mp4", "m4v", "mkv", "webm", "mpg", "mpeg"];

/// File suffixes classified as audio documents.
pub const SUFFIXES_AUDIO: &[&str] = &["wav", "aif", "aiff", "mp3", "aac", "ogg", "flac", "m4a"];

/// File suffixes classified as image documents.
pub const SUFFIXES_IMAGE: &[&str] = &["png", "jpg", "jpeg", "gif", "tif", "tiff", "bmp"];

/// File suffixes classified as text/office documents.
pub const SUFFIXES_DOC: &[&str] = &["txt", "md", "rtf", "pdf", "doc", "docx", "odt", "pages"];

/// File suffixes classified as people cards.
pub const SUFFIXES_PEOPLE: &[&str] = &["vcf", "vcard"];
