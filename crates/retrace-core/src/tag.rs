//! Tags: classified, time-positioned annotation instances over one document
//! version.
//!
//! A tag is a temporal interval (or instant) plus everything the two views
//! need to draw it: the cached classification keys, the link sets, and the
//! animated screen-space state. Temporal setters clamp against the owning
//! document's media duration, passed in by the caller — tags hold no
//! back-pointer to their document.
//!
//! Mutating a tag does **not** mark any index dirty; the caller flips the
//! dirty flags explicitly so a burst of edits costs one recompute.

use serde::{Deserialize, Serialize};

use crate::defaults::{DEFAULT_TAG_DURATION, TAG_BLINK_MS, UNBOUNDED_MEDIA_DURATION};
use crate::color::Rgba;
use crate::geom::{Point, Rect};
use crate::metadata::VersionRef;

/// Temporal shape of a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagKind {
    /// Document-level placement with no meaningful duration.
    #[default]
    Global,
    /// An interval with distinct start and end.
    Interval,
    /// An instant.
    Milestone,
}

impl std::fmt::Display for TagKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Global => write!(f, "global"),
            Self::Interval => write!(f, "interval"),
            Self::Milestone => write!(f, "milestone"),
        }
    }
}

impl std::str::FromStr for TagKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "global" => Ok(Self::Global),
            "interval" => Ok(Self::Interval),
            "milestone" => Ok(Self::Milestone),
            other => Err(format!("Invalid tag kind: {other}")),
        }
    }
}

/// Typed reference to a tag: indices into the project's document list and
/// that document's tag arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TagHandle {
    pub document: usize,
    pub tag: usize,
}

impl TagHandle {
    pub const fn new(document: usize, tag: usize) -> Self {
        Self { document, tag }
    }
}

/// Which edge of a tag a candidate time snapped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapEdge {
    Start,
    End,
}

/// Cached classification keys, recomputed by the index pass from the
/// document's metadata through the active criteria.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagKeys {
    /// Phase-level grouping key (phase rank or groupe canonical key).
    pub phase: String,
    /// Canonical sort key and its display label.
    pub sort: String,
    pub sort_label: String,
    /// Canonical color key and its display label.
    pub color: String,
    pub color_label: String,
    /// Canonical cluster key and its registered label.
    pub cluster: String,
    pub cluster_label: String,
    /// Canonical filter key.
    pub filter: String,
    /// Raw horizontal-axis value (mapped to a coordinate by the criterion).
    pub horizontal: String,
    /// Formatted text label.
    pub text: String,
}

/// A screen position eased toward its destination. The first placement
/// snaps directly so newly created tags don't fly in from the origin.
#[derive(Debug, Clone, Default)]
pub struct AnimatedPoint {
    pub current: Point,
    pub dest: Point,
    first: bool,
}

impl AnimatedPoint {
    pub fn new() -> Self {
        Self { current: Point::default(), dest: Point::default(), first: true }
    }

    pub fn set_dest(&mut self, dest: Point) {
        self.dest = dest;
        if self.first {
            self.current = dest;
            self.first = false;
        }
    }
}

/// A tag over one version of one document.
#[derive(Debug, Clone)]
pub struct Tag {
    time_start: f64,
    time_end: f64,
    time_media_offset: f64,
    kind: TagKind,
    version: VersionRef,

    /// Label drawn next to the tag (text criterion + marker name).
    pub display_text: String,
    pub keys: TagKeys,

    /// Tags of strictly earlier versions of the same document.
    pub history: Vec<TagHandle>,
    /// Tags of other documents sharing this document's content hash.
    pub hash_links: Vec<TagHandle>,
    /// Explicit user associations.
    pub linked: Vec<TagHandle>,

    /// Layout rect in track-local coordinates (before slot translation).
    pub timeline_rect: Rect,
    pub viewer_rect: Rect,
    pub timeline_slot: AnimatedPoint,
    pub viewer_slot: AnimatedPoint,

    pub scale: f64,
    pub scale_dest: f64,
    pub color: Rgba,
    pub color_dest: Rgba,

    /// Eased playhead progression through the tag, `0..=1`.
    pub progression: f64,
    pub progression_dest: f64,
    /// Negative seconds until the playhead reaches the tag (0 once inside).
    pub countdown: f64,
    /// Milliseconds of blink left after a milestone fires.
    pub blink_remaining_ms: f64,

    was_inside: bool,
}

impl Tag {
    pub fn new(version: VersionRef) -> Self {
        Self {
            time_start: 0.0,
            time_end: 0.0,
            time_media_offset: 0.0,
            kind: TagKind::Global,
            version,
            display_text: String::new(),
            keys: TagKeys::default(),
            history: Vec::new(),
            hash_links: Vec::new(),
            linked: Vec::new(),
            timeline_rect: Rect::default(),
            viewer_rect: Rect::default(),
            timeline_slot: AnimatedPoint::new(),
            viewer_slot: AnimatedPoint::new(),
            scale: 0.0,
            scale_dest: 1.0,
            color: Rgba::default(),
            color_dest: Rgba::default(),
            progression: 0.0,
            progression_dest: 0.0,
            countdown: 0.0,
            blink_remaining_ms: 0.0,
            was_inside: false,
        }
    }

    pub fn time_start(&self) -> f64 {
        self.time_start
    }

    pub fn time_end(&self) -> f64 {
        self.time_end
    }

    pub fn time_media_offset(&self) -> f64 {
        self.time_media_offset
    }

    pub fn kind(&self) -> TagKind {
        self.kind
    }

    pub fn version(&self) -> VersionRef {
        self.version
    }

    /// Pin a floating version reference to the currently resolved index
    /// (optionally shifted). No-op for already-pinned tags.
    pub fn pin_version(&mut self, resolved: usize, shift: i64) {
        if self.version == VersionRef::Latest {
            let pinned = (resolved as i64 + shift).max(0) as usize;
            self.version = VersionRef::At(pinned);
        }
    }

    // =========================================================================
    // TEMPORAL STATE MACHINE
    // =========================================================================

    /// Switch the temporal shape. Global/Milestone collapse to an instant at
    /// `at` (or the current start). Switching into Interval seeds the
    /// default duration: a never-placed tag anchors its start at `at`, an
    /// already-placed one shifts back so the former instant becomes the end.
    pub fn set_kind(&mut self, kind: TagKind, at: Option<f64>) {
        let time = at.unwrap_or(self.time_start);
        self.kind = kind;
        if kind == TagKind::Interval {
            if self.time_start == 0.0 && self.time_end == 0.0 {
                self.time_start = time;
            } else {
                self.time_start = time - DEFAULT_TAG_DURATION;
            }
            self.time_end = self.time_start + DEFAULT_TAG_DURATION;
        } else {
            self.time_start = time;
            self.time_end = time;
        }
    }

    fn effective_media(media_duration: f64) -> f64 {
        if media_duration <= 0.0 {
            UNBOUNDED_MEDIA_DURATION
        } else {
            media_duration
        }
    }

    /// Drag the start edge: clamped so the window never exceeds the media
    /// remaining past the offset and never crosses the end.
    pub fn set_time_start(&mut self, time_start: f64, media_duration: f64) {
        let media = Self::effective_media(media_duration);
        let lower = (self.time_end - media + self.time_media_offset).min(self.time_end);
        self.time_start = time_start.clamp(lower, self.time_end);
    }

    /// Drag the end edge. Milestone/Global always collapse back to the
    /// start; intervals clamp to the media remaining past the offset.
    pub fn set_time_end(&mut self, time_end: f64, media_duration: f64) {
        if self.kind == TagKind::Interval {
            let media = Self::effective_media(media_duration);
            let upper = (self.time_start + media - self.time_media_offset).max(self.time_start);
            self.time_end = time_end.clamp(self.time_start, upper);
        } else {
            self.time_end = self.time_start;
        }
    }

    /// Set the trim offset into the underlying media, then re-clamp the end
    /// against what remains.
    pub fn set_time_media_offset(&mut self, offset: f64, media_duration: f64) {
        let media = Self::effective_media(media_duration);
        let upper = (media - self.duration()).max(0.0);
        self.time_media_offset = offset.clamp(0.0, upper);
        self.set_time_end(self.time_end, media_duration);
    }

    pub fn add_time_media_offset(&mut self, delta: f64, media_duration: f64) {
        self.set_time_media_offset(self.time_media_offset + delta, media_duration);
    }

    /// Translate the whole interval so it starts at `time_start`, preserving
    /// duration, clamped at zero.
    pub fn move_time_start(&mut self, time_start: f64) {
        let duration = self.duration();
        self.time_start = time_start.max(0.0);
        self.time_end = self.time_start + duration;
    }

    /// Translate the whole interval so it ends at `time_end`, preserving
    /// duration, clamped at zero.
    pub fn move_time_end(&mut self, time_end: f64) {
        let duration = self.duration();
        self.time_start = (time_end - duration).max(0.0);
        self.time_end = self.time_start + duration;
    }

    pub fn duration(&self) -> f64 {
        self.time_end - self.time_start
    }

    /// Duration as drawn: milestones render as instants.
    pub fn drawable_duration(&self) -> f64 {
        if self.kind == TagKind::Milestone {
            0.0
        } else {
            self.duration()
        }
    }

    // =========================================================================
    // PLAYHEAD QUERIES
    // =========================================================================

    /// Whether the playhead is over the tag; instants get a one-unit window.
    pub fn contains(&self, time: f64) -> bool {
        self.time_start <= time && time <= self.time_start + self.duration().max(1.0)
    }

    /// Unclamped progression of a time through the tag.
    pub fn progress_abs(&self, time: f64) -> f64 {
        (time - self.time_start) / self.duration().max(1.0)
    }

    pub fn progress(&self, time: f64) -> f64 {
        self.progress_abs(time).clamp(0.0, 1.0)
    }

    /// Snap a candidate time to this tag's start or end within the given
    /// radius.
    pub fn snap_time(&self, time: f64, radius: f64) -> Option<(f64, SnapEdge)> {
        if (time - self.time_start).abs() < radius {
            Some((self.time_start, SnapEdge::Start))
        } else if (time - self.time_end).abs() < radius {
            Some((self.time_end, SnapEdge::End))
        } else {
            None
        }
    }

    /// Edge-detect the playhead entering or leaving the tag. Returns
    /// `Some(true)` on enter, `Some(false)` on leave. Also refreshes the
    /// progression destination and countdown consumed by the views.
    pub fn playhead_crossing(&mut self, playhead: f64) -> Option<bool> {
        self.progression_dest = self.progress(playhead);
        self.countdown = (playhead - self.time_start).min(0.0);

        let inside = {
            let p = self.progress_abs(playhead);
            (0.0..=1.0).contains(&p)
        };
        if inside && !self.was_inside {
            self.was_inside = true;
            self.blink_remaining_ms = TAG_BLINK_MS;
            Some(true)
        } else if !inside && self.was_inside {
            self.was_inside = false;
            Some(false)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interval(start: f64, end: f64) -> Tag {
        let mut tag = Tag::new(VersionRef::Latest);
        tag.set_kind(TagKind::Interval, Some(start));
        tag.set_time_end(end, 0.0);
        tag
    }

    #[test]
    fn test_kind_transitions() {
        let mut tag = Tag::new(VersionRef::Latest);
        // Never placed: anchor at the given time.
        tag.set_kind(TagKind::Interval, Some(10.0));
        assert_eq!(tag.time_start(), 10.0);
        assert_eq!(tag.time_end(), 15.0);

        // Collapse to an instant.
        tag.set_kind(TagKind::Milestone, Some(12.0));
        assert_eq!(tag.time_start(), 12.0);
        assert_eq!(tag.time_end(), 12.0);

        // Already placed: the former instant becomes the interval's end.
        tag.set_kind(TagKind::Interval, None);
        assert_eq!(tag.time_start(), 7.0);
        assert_eq!(tag.time_end(), 12.0);
    }

    #[test]
    fn test_end_clamps_to_media_duration() {
        let mut tag = Tag::new(VersionRef::Latest);
        tag.set_kind(TagKind::Interval, Some(10.0));
        tag.set_time_end(100.0, 5.0);
        assert_eq!(tag.time_end(), 15.0);
    }

    #[test]
    fn test_end_unbounded_when_media_unknown() {
        let mut tag = interval(10.0, 15.0);
        tag.set_time_end(500.0, 0.0);
        assert_eq!(tag.time_end(), 500.0);
    }

    #[test]
    fn test_end_ignored_for_instants() {
        let mut tag = Tag::new(VersionRef::Latest);
        tag.set_kind(TagKind::Milestone, Some(20.0));
        tag.set_time_end(99.0, 0.0);
        assert_eq!(tag.time_end(), 20.0);
    }

    #[test]
    fn test_media_offset_clamped_and_reclamps_end() {
        let mut tag = Tag::new(VersionRef::Latest);
        tag.set_kind(TagKind::Interval, Some(0.0));
        tag.set_time_end(4.0, 10.0);
        tag.set_time_media_offset(100.0, 10.0);
        // duration 4, media 10: offset caps at 6, and end re-clamps to fit.
        assert_eq!(tag.time_media_offset(), 6.0);
        assert!(tag.time_end() <= tag.time_start() + 10.0 - tag.time_media_offset());
        assert!(tag.time_start() <= tag.time_end());
    }

    #[test]
    fn test_moves_preserve_duration_under_clamp() {
        let mut tag = interval(10.0, 15.0);
        tag.move_time_start(-3.0);
        assert_eq!((tag.time_start(), tag.time_end()), (0.0, 5.0));

        tag.move_time_end(2.0);
        assert_eq!((tag.time_start(), tag.time_end()), (0.0, 5.0));

        tag.move_time_end(50.0);
        assert_eq!((tag.time_start(), tag.time_end()), (45.0, 50.0));
        assert!(tag.time_start() <= tag.time_end());
    }

    #[test]
    fn test_invariant_after_setter_storm() {
        let mut tag = Tag::new(VersionRef::Latest);
        tag.set_kind(TagKind::Interval, Some(3.0));
        for (i, media) in [(0, 5.0), (1, 0.0), (2, 2.5), (3, 100.0)] {
            tag.set_time_start(-10.0 * i as f64, media);
            tag.set_time_end(1000.0 / (i + 1) as f64, media);
            tag.set_time_media_offset(i as f64, media);
            tag.move_time_end(i as f64 * 7.0 - 10.0);
            assert!(
                tag.time_start() <= tag.time_end(),
                "start <= end violated at step {i}"
            );
        }
    }

    #[test]
    fn test_contains_gives_instants_a_window() {
        let mut tag = Tag::new(VersionRef::Latest);
        tag.set_kind(TagKind::Milestone, Some(10.0));
        assert!(tag.contains(10.5));
        assert!(!tag.contains(11.5));
        assert_eq!(tag.drawable_duration(), 0.0);
    }

    #[test]
    fn test_playhead_edge_detection() {
        let mut tag = interval(10.0, 15.0);
        assert_eq!(tag.playhead_crossing(5.0), None);
        assert_eq!(tag.playhead_crossing(12.0), Some(true));
        assert_eq!(tag.playhead_crossing(13.0), None);
        assert_eq!(tag.playhead_crossing(20.0), Some(false));
        assert_eq!(tag.playhead_crossing(25.0), None);
        assert!(tag.countdown <= 0.0);
    }

    #[test]
    fn test_snap_time() {
        let tag = interval(10.0, 15.0);
        assert_eq!(tag.snap_time(10.4, 1.0), Some((10.0, SnapEdge::Start)));
        assert_eq!(tag.snap_time(14.2, 1.0), None);
        assert_eq!(tag.snap_time(15.3, 1.0), Some((15.0, SnapEdge::End)));
    }

    #[test]
    fn test_pin_version() {
        let mut tag = Tag::new(VersionRef::Latest);
        tag.pin_version(3, 0);
        assert_eq!(tag.version(), VersionRef::At(3));
        tag.pin_version(7, 0); // already pinned: unchanged
        assert_eq!(tag.version(), VersionRef::At(3));
    }

    #[test]
    fn test_first_slot_placement_snaps() {
        let mut slot = AnimatedPoint::new();
        slot.set_dest(Point::new(40.0, 8.0));
        assert_eq!(slot.current, Point::new(40.0, 8.0));
        slot.set_dest(Point::new(80.0, 8.0));
        assert_eq!(slot.current, Point::new(40.0, 8.0));
        assert_eq!(slot.dest, Point::new(80.0, 8.0));
    }
}
