// SPDX-License-Identifier: GPL-3.0-only

//! Stability filter
//!
//! Decides whether a detection batch carries new information compared to
//! the previously accepted batch. Raw corner points jitter by a few pixels
//! even for a static code, so exact comparison would suppress nothing
//! useful; instead a batch is suppressed when its value set is unchanged
//! and every value's new centroid still lies within that value's previous
//! bounding box. Any centroid escaping its prior box, or any change in the
//! value set, accepts the batch.

use tracing::trace;

use crate::frame_processor::types::{Detection, DetectionBatch};

/// Outcome of filtering one batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchVerdict {
    /// The batch carries new information and replaced the comparison batch
    Accepted,
    /// The batch is noise-level identical to the previous one
    Suppressed,
}

/// Filter comparing each batch against the last accepted one
#[derive(Debug, Default)]
pub struct StabilityFilter {
    previous: Vec<Detection>,
}

impl StabilityFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply the filter to a batch.
    ///
    /// Accepted batches become the new comparison batch wholesale, which
    /// also garbage-collects records of values absent from the batch.
    /// Suppressed batches leave the comparison batch untouched.
    pub fn apply(&mut self, batch: &DetectionBatch) -> BatchVerdict {
        if self.same_values(&batch.detections) && self.all_stable(&batch.detections) {
            trace!(count = batch.detections.len(), "Batch suppressed as stable");
            return BatchVerdict::Suppressed;
        }
        self.previous = batch.detections.clone();
        BatchVerdict::Accepted
    }

    /// Forget the comparison batch, e.g. after a device switch changed the
    /// whole view
    pub fn reset(&mut self) {
        self.previous.clear();
    }

    /// Order-independent comparison of the raw value sets
    fn same_values(&self, current: &[Detection]) -> bool {
        if current.len() != self.previous.len() {
            return false;
        }
        let mut current_values: Vec<&str> =
            current.iter().map(|d| d.raw_value.as_str()).collect();
        let mut previous_values: Vec<&str> =
            self.previous.iter().map(|d| d.raw_value.as_str()).collect();
        current_values.sort_unstable();
        previous_values.sort_unstable();
        current_values == previous_values
    }

    /// True when every value's new centroid lies within its previous
    /// bounding box
    fn all_stable(&self, current: &[Detection]) -> bool {
        for detection in current {
            let Some(last) = self
                .previous
                .iter()
                .find(|p| p.raw_value == detection.raw_value)
            else {
                return false;
            };
            let Some(bbox) = last.bounding_box() else {
                return false;
            };
            if !bbox.contains(detection.centroid()) {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::SessionId;
    use crate::frame_processor::types::Point;

    fn square(x: f32, y: f32, size: f32) -> Vec<Point> {
        vec![
            Point::new(x, y),
            Point::new(x + size, y),
            Point::new(x + size, y + size),
            Point::new(x, y + size),
        ]
    }

    fn batch(session: SessionId, detections: Vec<Detection>) -> DetectionBatch {
        DetectionBatch::new(session, detections)
    }

    #[test]
    fn test_identical_batches_are_suppressed() {
        let session = SessionId::new();
        let mut filter = StabilityFilter::new();

        let first = batch(
            session,
            vec![Detection::new("ABC123", "qr_code", square(0.0, 0.0, 10.0))],
        );
        assert_eq!(filter.apply(&first), BatchVerdict::Accepted);

        // Jitter of a pixel keeps the centroid inside the previous box
        let second = batch(
            session,
            vec![Detection::new("ABC123", "qr_code", square(1.0, 1.0, 10.0))],
        );
        assert_eq!(filter.apply(&second), BatchVerdict::Suppressed);

        // Still suppressed: the comparison batch was not replaced
        let third = batch(
            session,
            vec![Detection::new("ABC123", "qr_code", square(0.5, 0.5, 10.0))],
        );
        assert_eq!(filter.apply(&third), BatchVerdict::Suppressed);
    }

    #[test]
    fn test_motion_triggers_acceptance() {
        let session = SessionId::new();
        let mut filter = StabilityFilter::new();

        let first = batch(
            session,
            vec![Detection::new("ABC123", "qr_code", square(0.0, 0.0, 10.0))],
        );
        assert_eq!(filter.apply(&first), BatchVerdict::Accepted);

        // Centroid (55, 55) lies outside the previous [0,0]-[10,10] box
        let moved = batch(
            session,
            vec![Detection::new("ABC123", "qr_code", square(50.0, 50.0, 10.0))],
        );
        assert_eq!(filter.apply(&moved), BatchVerdict::Accepted);
    }

    #[test]
    fn test_value_set_change_is_accepted() {
        let session = SessionId::new();
        let mut filter = StabilityFilter::new();

        let first = batch(
            session,
            vec![Detection::new("ABC123", "qr_code", square(0.0, 0.0, 10.0))],
        );
        filter.apply(&first);

        let second = batch(
            session,
            vec![
                Detection::new("ABC123", "qr_code", square(0.0, 0.0, 10.0)),
                Detection::new("XYZ789", "qr_code", square(40.0, 40.0, 10.0)),
            ],
        );
        assert_eq!(filter.apply(&second), BatchVerdict::Accepted);
    }

    #[test]
    fn test_value_order_does_not_matter() {
        let session = SessionId::new();
        let mut filter = StabilityFilter::new();

        let first = batch(
            session,
            vec![
                Detection::new("A", "qr_code", square(0.0, 0.0, 10.0)),
                Detection::new("B", "qr_code", square(40.0, 40.0, 10.0)),
            ],
        );
        filter.apply(&first);

        let reordered = batch(
            session,
            vec![
                Detection::new("B", "qr_code", square(41.0, 41.0, 10.0)),
                Detection::new("A", "qr_code", square(1.0, 1.0, 10.0)),
            ],
        );
        assert_eq!(filter.apply(&reordered), BatchVerdict::Suppressed);
    }

    #[test]
    fn test_empty_after_nonempty_is_accepted() {
        let session = SessionId::new();
        let mut filter = StabilityFilter::new();

        let first = batch(
            session,
            vec![Detection::new("ABC123", "qr_code", square(0.0, 0.0, 10.0))],
        );
        filter.apply(&first);

        // The code left the view; that is a change worth propagating
        assert_eq!(filter.apply(&batch(session, vec![])), BatchVerdict::Accepted);
        // Consecutive empty batches carry nothing new
        assert_eq!(
            filter.apply(&batch(session, vec![])),
            BatchVerdict::Suppressed
        );
    }
}
