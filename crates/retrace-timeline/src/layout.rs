//! Timeline layout: greedy shelf packing of tag rects into non-overlapping
//! slots, and the viewer's sequential row stacking.
//!
//! Packing walks tags in bucket order and, while a candidate rect collides
//! with anything already placed, advances it — horizontally within a shelf
//! up to a row cap, then wrapping to a fresh row; or strictly vertically
//! for tags pinned to a horizontal coordinate. The collision scan is a
//! plain O(n²) pass over the active set; at the expected scale (hundreds
//! of tags) this beats maintaining an interval structure.

use retrace_core::defaults;
use retrace_core::geom::{Point, Rect};
use serde::{Deserialize, Serialize};

/// Pixel metrics for both views. One instance lives in the view state so
/// zooming only touches this struct.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutMetrics {
    /// Horizontal pixels per timeline unit.
    pub time_unit: f64,
    pub tag_height: f64,
    pub tag_vspacing: f64,
    pub tag_vseparator: f64,
    pub header_width: f64,
    pub header_height: f64,
    /// Width of the global-tag dock left of the time axis.
    pub global_dock_width: f64,
    pub viewer_row_height: f64,
    /// Viewer viewport width, for row rects.
    pub viewer_width: f64,
}

impl Default for LayoutMetrics {
    fn default() -> Self {
        Self {
            time_unit: defaults::TIME_UNIT,
            tag_height: defaults::TIMELINE_TAG_HEIGHT,
            tag_vspacing: defaults::TIMELINE_TAG_VSPACING,
            tag_vseparator: defaults::TIMELINE_TAG_VSEPARATOR,
            header_width: defaults::TIMELINE_HEADER_WIDTH,
            header_height: defaults::TIMELINE_HEADER_HEIGHT,
            global_dock_width: defaults::TIMELINE_GLOBAL_DOCK_WIDTH,
            viewer_row_height: defaults::VIEWER_TAG_HEIGHT,
            viewer_width: 400.0,
        }
    }
}

impl LayoutMetrics {
    /// Row cap for shelf advances in the global dock.
    pub fn dock_row_width(&self) -> f64 {
        self.global_dock_width - 2.0 * self.tag_height
    }

    /// Row cap for shelf advances on a categorical horizontal axis.
    pub fn categorical_row_width(&self) -> f64 {
        5.0 * self.time_unit - 3.0 * self.tag_height
    }

    /// One vertical row step.
    pub fn row_step(&self) -> f64 {
        self.tag_height + self.tag_vspacing
    }
}

/// How a colliding candidate advances to its next trial position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AdvanceMode {
    /// Step right by one tag height until the row cap, then wrap to a new
    /// row at the original x.
    Shelf { row_width: f64 },
    /// Step straight down (the tag's x is meaningful and must not move).
    Stack,
}

/// Place a candidate rect against the active set: returns the offset moved
/// and the final rect. The caller appends the result to `zones`.
pub fn place(base: Rect, zones: &[Rect], mode: AdvanceMode, metrics: &LayoutMetrics) -> (Point, Rect) {
    let mut offset = Point::default();
    let mut candidate = base;

    while zones.iter().any(|zone| candidate.intersects(zone)) {
        match mode {
            AdvanceMode::Shelf { row_width } => {
                if offset.x < row_width {
                    offset.x += metrics.tag_height;
                } else {
                    offset.x = 0.0;
                    offset.y += metrics.row_step();
                }
            }
            AdvanceMode::Stack => {
                offset.y += metrics.row_step();
            }
        }
        candidate = base.translated(offset);
    }
    (offset, candidate)
}

/// Extent of one (phase, sort-key) band on the timeline, kept for category
/// backgrounds and hit-testing.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryBand {
    pub phase: String,
    pub sort_key: String,
    pub label: String,
    pub rect: Rect,
    /// Band of render-function documents (drawn with the alternate
    /// background).
    pub is_render: bool,
}

/// Y offsets for sequentially stacked viewer rows: prefix sums of the row
/// heights, starting at `start_y`.
pub fn stack_rows(heights: &[f64], start_y: f64) -> Vec<f64> {
    let mut offsets = Vec::with_capacity(heights.len());
    let mut y = start_y;
    for h in heights {
        offsets.push(y);
        y += h;
    }
    offsets
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics() -> LayoutMetrics {
        LayoutMetrics::default()
    }

    #[test]
    fn test_place_no_collision_is_identity() {
        let base = Rect::new(10.0, 0.0, 20.0, 7.0);
        let (offset, placed) = place(base, &[], AdvanceMode::Stack, &metrics());
        assert_eq!(offset, Point::default());
        assert_eq!(placed, base);
    }

    #[test]
    fn test_stack_advances_vertically_only() {
        let m = metrics();
        let base = Rect::new(10.0, 0.0, 20.0, m.tag_height);
        let zones = vec![base];
        let (offset, placed) = place(base, &zones, AdvanceMode::Stack, &m);
        assert_eq!(offset.x, 0.0);
        assert_eq!(offset.y, m.row_step());
        assert!(!placed.intersects(&zones[0]));
    }

    #[test]
    fn test_shelf_wraps_after_row_cap() {
        let m = metrics();
        let row_width = 3.0 * m.tag_height;
        let base = Rect::new(0.0, 0.0, 100.0, m.tag_height);
        // One wide zone covering the whole first row forces a wrap.
        let zones = vec![Rect::new(-10.0, 0.0, 200.0, m.tag_height)];
        let (offset, placed) = place(base, &zones, AdvanceMode::Shelf { row_width }, &m);
        assert_eq!(offset.x, 0.0, "wrap resets the shelf offset");
        assert_eq!(offset.y, m.row_step());
        assert!(!placed.intersects(&zones[0]));
    }

    #[test]
    fn test_packed_set_has_no_pairwise_overlap() {
        let m = metrics();
        let mut zones: Vec<Rect> = Vec::new();
        for _ in 0..12 {
            let base = Rect::new(0.0, 0.0, 26.0, m.tag_height);
            let (_, placed) = place(
                base,
                &zones,
                AdvanceMode::Shelf { row_width: m.dock_row_width() },
                &m,
            );
            zones.push(placed);
        }
        for i in 0..zones.len() {
            for j in (i + 1)..zones.len() {
                assert!(
                    !zones[i].intersects(&zones[j]),
                    "rects {i} and {j} overlap: {:?} {:?}",
                    zones[i],
                    zones[j]
                );
            }
        }
    }

    #[test]
    fn test_stack_rows_prefix_sums() {
        assert_eq!(stack_rows(&[30.0, 30.0, 92.0], 15.0), vec![15.0, 45.0, 75.0]);
        assert!(stack_rows(&[], 0.0).is_empty());
    }
}
