// SPDX-License-Identifier: GPL-3.0-only

//! Display position tweening
//!
//! Raw detections arrive a few times per second; the overlay renders every
//! frame. Writing detection positions straight to the screen would make
//! overlays jump. Instead each accepted batch only updates a per-value
//! *target*, and every render tick moves the rendered position a fixed
//! fraction of the remaining distance toward it:
//!
//! ```text
//! current += (target - current) * alpha
//! ```
//!
//! Values unseen for longer than the inactivity window are dropped, which
//! tolerates a single missed detection cycle without a visible pop but
//! keeps stale overlays from lingering.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::constants::tween;
use crate::frame_processor::types::{Detection, Point};

/// Smoothed display state of one tracked value
#[derive(Debug, Clone)]
pub struct DisplayState {
    current: Point,
    target: Point,
    corners: Vec<Point>,
    format: String,
    last_seen: Instant,
}

impl DisplayState {
    /// The smoothed position rendered this tick
    pub fn position(&self) -> Point {
        self.current
    }

    /// The position the state is converging toward
    pub fn target(&self) -> Point {
        self.target
    }

    /// Corner points from the most recent accepted detection
    pub fn corners(&self) -> &[Point] {
        &self.corners
    }

    /// Symbology of the tracked value
    pub fn format(&self) -> &str {
        &self.format
    }

    /// When the value was last part of an accepted batch
    pub fn last_seen(&self) -> Instant {
        self.last_seen
    }
}

/// Per-value display smoothing across render ticks
#[derive(Debug)]
pub struct DisplayTweener {
    states: HashMap<String, DisplayState>,
    alpha: f32,
    inactivity_window: Duration,
}

impl DisplayTweener {
    /// Create a tweener with the given smoothing factor and inactivity
    /// window
    pub fn new(alpha: f32, inactivity_window: Duration) -> Self {
        Self {
            states: HashMap::new(),
            alpha: alpha.clamp(tween::ALPHA_MIN, tween::ALPHA_MAX),
            inactivity_window,
        }
    }

    /// Update targets from an accepted detection batch.
    ///
    /// A value seen for the first time starts at its target so overlays do
    /// not fly in from elsewhere.
    pub fn apply_batch(&mut self, detections: &[Detection], now: Instant) {
        for detection in detections {
            let target = detection.centroid();
            match self.states.get_mut(&detection.raw_value) {
                Some(state) => {
                    state.target = target;
                    state.corners = detection.corner_points.clone();
                    state.last_seen = now;
                }
                None => {
                    self.states.insert(
                        detection.raw_value.clone(),
                        DisplayState {
                            current: target,
                            target,
                            corners: detection.corner_points.clone(),
                            format: detection.format.clone(),
                            last_seen: now,
                        },
                    );
                }
            }
        }
    }

    /// Advance one render tick: evict expired values, move the rest toward
    /// their targets
    pub fn advance(&mut self, now: Instant) {
        let window = self.inactivity_window;
        self.states.retain(|value, state| {
            let keep = now.duration_since(state.last_seen) <= window;
            if !keep {
                debug!(value = %value, "Overlay expired");
            }
            keep
        });

        for state in self.states.values_mut() {
            state.current.x += (state.target.x - state.current.x) * self.alpha;
            state.current.y += (state.target.y - state.current.y) * self.alpha;
        }
    }

    /// Tracked values and their states, sorted by value for deterministic
    /// rendering
    pub fn states(&self) -> Vec<(&str, &DisplayState)> {
        let mut entries: Vec<(&str, &DisplayState)> = self
            .states
            .iter()
            .map(|(value, state)| (value.as_str(), state))
            .collect();
        entries.sort_by_key(|(value, _)| *value);
        entries
    }

    /// Number of tracked values
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// True when nothing is tracked
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Drop all tracked values, e.g. after a device switch
    pub fn clear(&mut self) {
        self.states.clear();
    }
}
