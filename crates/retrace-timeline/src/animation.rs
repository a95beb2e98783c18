//! Per-tick easing toward destination values.
//!
//! Every animated quantity closes `1/inertia` of its remaining gap each
//! tick (exponential smoothing), applied on every tick regardless of dirty
//! state so motion continues between recomputes.

use retrace_core::defaults::INERTIA;
use retrace_core::geom::Point;
use retrace_core::tag::Tag;
use retrace_core::Rgba;

/// Ease a scalar toward its destination.
pub fn ease(value: &mut f64, dest: f64, inertia: f64) {
    *value += (dest - *value) / inertia;
}

pub fn ease_point(value: &mut Point, dest: Point, inertia: f64) {
    ease(&mut value.x, dest.x, inertia);
    ease(&mut value.y, dest.y, inertia);
}

pub fn ease_color(value: &mut Rgba, dest: &Rgba, inertia: f64) {
    let t = (1.0 / inertia) as f32;
    *value = value.mix(dest, t);
}

/// Advance one tag's animated state by one tick of `elapsed_ms`.
pub fn animate_tag(tag: &mut Tag, elapsed_ms: f64) {
    ease(&mut tag.scale, tag.scale_dest, INERTIA);
    ease(&mut tag.progression, tag.progression_dest, INERTIA);

    let timeline_dest = tag.timeline_slot.dest;
    ease_point(&mut tag.timeline_slot.current, timeline_dest, INERTIA);
    let viewer_dest = tag.viewer_slot.dest;
    ease_point(&mut tag.viewer_slot.current, viewer_dest, INERTIA);

    // Black destinations are a transient from an empty color pass; hold the
    // last real color instead of fading out.
    if !tag.color_dest.is_black() {
        let dest = tag.color_dest;
        ease_color(&mut tag.color, &dest, INERTIA);
    }

    tag.blink_remaining_ms = (tag.blink_remaining_ms - elapsed_ms).max(0.0);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ease_converges() {
        let mut v = 0.0;
        for _ in 0..100 {
            ease(&mut v, 10.0, INERTIA);
        }
        assert!((v - 10.0).abs() < 1e-6);
    }

    #[test]
    fn test_ease_closes_fraction_of_gap() {
        let mut v = 0.0;
        ease(&mut v, 10.0, 5.0);
        assert!((v - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_ease_color_moves_toward_dest() {
        let mut c = Rgba::new(0.0, 0.0, 0.0, 1.0);
        let dest = Rgba::new(1.0, 0.0, 0.0, 1.0);
        ease_color(&mut c, &dest, 5.0);
        assert!(c.r > 0.0 && c.r < 1.0);
    }
}
