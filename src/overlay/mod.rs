// SPDX-License-Identifier: GPL-3.0-only

//! Overlay rendering
//!
//! The display tweener keeps a smoothed on-screen position per recognized
//! value so overlays move without jitter at the full render cadence, even
//! though detections arrive at the much slower recognition cadence. A
//! render surface receives plain draw commands once per render tick and
//! retains no state.

pub mod tween;

pub use tween::{DisplayState, DisplayTweener};

use crate::constants::overlay;
use crate::frame_processor::types::Point;

/// Surface receiving per-tick draw commands
///
/// Implementations draw in frame pixel coordinates; mapping to the actual
/// output (terminal cells, canvas pixels) is their concern.
pub trait RenderSurface {
    /// Erase the previous tick's overlays
    fn clear(&mut self);

    /// Draw a closed path through the given points
    fn draw_path(&mut self, points: &[Point]);

    /// Draw a marker dot at a value's smoothed position
    fn draw_marker(&mut self, center: Point);

    /// Draw a filled text box anchored at the given position
    fn draw_label(&mut self, anchor: Point, text: &str);
}

/// Surface that discards all draw commands (headless scanning)
#[derive(Debug, Default)]
pub struct NullSurface;

impl RenderSurface for NullSurface {
    fn clear(&mut self) {}
    fn draw_path(&mut self, _points: &[Point]) {}
    fn draw_marker(&mut self, _center: Point) {}
    fn draw_label(&mut self, _anchor: Point, _text: &str) {}
}

/// Draw one render tick's overlays: for each tracked value its corner
/// outline, a marker at the smoothed position, and a "value (format)"
/// label below it
pub fn render_overlays(tweener: &DisplayTweener, surface: &mut dyn RenderSurface) {
    surface.clear();
    for (value, state) in tweener.states() {
        let position = state.position();
        surface.draw_path(state.corners());
        surface.draw_marker(position);
        surface.draw_label(
            Point::new(position.x, position.y + overlay::LABEL_OFFSET_Y),
            &format!("{} ({})", value, state.format()),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame_processor::types::Detection;
    use std::time::{Duration, Instant};

    /// Surface recording the commands it receives
    #[derive(Default)]
    struct RecordingSurface {
        clears: usize,
        paths: Vec<Vec<Point>>,
        markers: Vec<Point>,
        labels: Vec<(Point, String)>,
    }

    impl RenderSurface for RecordingSurface {
        fn clear(&mut self) {
            self.clears += 1;
        }
        fn draw_path(&mut self, points: &[Point]) {
            self.paths.push(points.to_vec());
        }
        fn draw_marker(&mut self, center: Point) {
            self.markers.push(center);
        }
        fn draw_label(&mut self, anchor: Point, text: &str) {
            self.labels.push((anchor, text.to_string()));
        }
    }

    #[test]
    fn test_render_emits_all_primitives() {
        let now = Instant::now();
        let mut tweener = DisplayTweener::new(0.2, Duration::from_millis(1000));
        tweener.apply_batch(
            &[Detection::new(
                "ABC123",
                "qr_code",
                vec![
                    Point::new(0.0, 0.0),
                    Point::new(10.0, 0.0),
                    Point::new(10.0, 10.0),
                    Point::new(0.0, 10.0),
                ],
            )],
            now,
        );
        tweener.advance(now);

        let mut surface = RecordingSurface::default();
        render_overlays(&tweener, &mut surface);

        assert_eq!(surface.clears, 1);
        assert_eq!(surface.paths.len(), 1);
        assert_eq!(surface.markers.len(), 1);
        assert_eq!(surface.labels.len(), 1);
        assert_eq!(surface.labels[0].1, "ABC123 (qr_code)");
        // Label sits below the marker
        assert!(surface.labels[0].0.y > surface.markers[0].y);
    }

    #[test]
    fn test_render_with_no_tracked_values_only_clears() {
        let tweener = DisplayTweener::new(0.2, Duration::from_millis(1000));
        let mut surface = RecordingSurface::default();
        render_overlays(&tweener, &mut surface);

        assert_eq!(surface.clears, 1);
        assert!(surface.markers.is_empty());
        assert!(surface.labels.is_empty());
    }
}
