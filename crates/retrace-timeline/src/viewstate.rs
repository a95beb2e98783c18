//! View state: the explicit context object threaded through recompute and
//! query calls.
//!
//! Everything here used to be ambient UI state — dirty flags, the playhead,
//! selection, visibility toggles. Recompute passes read it; input handlers
//! mutate it between ticks. Selection refers to tags through typed
//! [`TagHandle`]s only.

use retrace_core::defaults::SNAP_RADIUS;
use retrace_core::tag::TagHandle;

use crate::layout::LayoutMetrics;

/// Which derived structures need a rebuild at the next tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirtyFlags {
    pub timeline: bool,
    pub viewer: bool,
    pub events: bool,
}

impl DirtyFlags {
    pub fn all() -> Self {
        Self { timeline: true, viewer: true, events: true }
    }

    pub fn mark_all(&mut self) {
        *self = Self::all();
    }

    pub fn any(&self) -> bool {
        self.timeline || self.viewer || self.events
    }
}

/// Snap guides produced while dragging near another tag's edges: the times
/// of the start/end guides currently latched, if any.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SnapGuides {
    pub start: Option<f64>,
    pub end: Option<f64>,
}

impl SnapGuides {
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn active(&self) -> bool {
        self.start.is_some() || self.end.is_some()
    }
}

/// Mutable per-session view context, passed by reference into recompute,
/// tick, and query calls.
#[derive(Debug, Clone)]
pub struct ViewState {
    pub dirty: DirtyFlags,

    /// Playhead position on the project clock.
    pub playhead: f64,
    pub playing: bool,

    /// Show every version's tag (on) or only latest-version tags (off).
    pub show_history: bool,
    /// Link tags of hash-identical documents during rebuilds.
    pub show_hash_links: bool,

    pub selection: Vec<TagHandle>,
    /// Subset of the selection currently being dragged.
    pub selection_in_action: Vec<TagHandle>,
    pub hover: Option<TagHandle>,
    pub snap: SnapGuides,
    /// Snap radius in timeline units.
    pub snap_radius: f64,

    pub metrics: LayoutMetrics,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            dirty: DirtyFlags::all(),
            playhead: 0.0,
            playing: false,
            show_history: false,
            show_hash_links: true,
            selection: Vec::new(),
            selection_in_action: Vec::new(),
            hover: None,
            snap: SnapGuides::default(),
            snap_radius: SNAP_RADIUS,
            metrics: LayoutMetrics::default(),
        }
    }
}

impl ViewState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seek(&mut self, time: f64) {
        self.playhead = time.max(0.0);
    }

    pub fn play(&mut self, playing: bool) {
        self.playing = playing;
    }

    pub fn is_selected(&self, handle: TagHandle) -> bool {
        self.selection.contains(&handle)
    }

    /// Click-select: `extend` keeps the existing selection (shift/ctrl
    /// semantics), toggling the clicked tag; a plain click replaces it.
    pub fn select(&mut self, handle: TagHandle, extend: bool) {
        if !extend {
            self.selection.clear();
        }
        if let Some(pos) = self.selection.iter().position(|h| *h == handle) {
            self.selection.remove(pos);
        } else {
            self.selection.push(handle);
        }
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
        self.selection_in_action.clear();
        self.hover = None;
    }

    pub fn toggle_history(&mut self) {
        self.show_history = !self.show_history;
        self.dirty.mark_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_replaces_or_extends() {
        let mut view = ViewState::new();
        let a = TagHandle::new(0, 0);
        let b = TagHandle::new(1, 0);

        view.select(a, false);
        assert!(view.is_selected(a));

        view.select(b, false);
        assert!(!view.is_selected(a));
        assert!(view.is_selected(b));

        view.select(a, true);
        assert!(view.is_selected(a) && view.is_selected(b));

        // Extending with an already-selected tag toggles it off.
        view.select(b, true);
        assert!(!view.is_selected(b));
    }

    #[test]
    fn test_dirty_flags() {
        let mut flags = DirtyFlags::default();
        assert!(!flags.any());
        flags.mark_all();
        assert!(flags.timeline && flags.viewer && flags.events);
    }

    #[test]
    fn test_seek_clamps_negative() {
        let mut view = ViewState::new();
        view.seek(-5.0);
        assert_eq!(view.playhead, 0.0);
    }
}
