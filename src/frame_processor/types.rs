// SPDX-License-Identifier: GPL-3.0-only

//! Core types for frame processing results

use std::time::Instant;

use crate::backends::SessionId;

/// A 2D point in frame pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned bounding box over a set of points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl BoundingBox {
    /// Bounding box of the given points; `None` when empty
    pub fn from_points(points: &[Point]) -> Option<Self> {
        let first = points.first()?;
        let mut bbox = Self {
            min_x: first.x,
            min_y: first.y,
            max_x: first.x,
            max_y: first.y,
        };
        for p in &points[1..] {
            bbox.min_x = bbox.min_x.min(p.x);
            bbox.min_y = bbox.min_y.min(p.y);
            bbox.max_x = bbox.max_x.max(p.x);
            bbox.max_y = bbox.max_y.max(p.y);
        }
        Some(bbox)
    }

    /// Inclusive containment test
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.min_x && p.x <= self.max_x && p.y >= self.min_y && p.y <= self.max_y
    }
}

/// A single recognized code within one frame
///
/// Produced only by a recognition engine; immutable once produced. Corner
/// points run clockwise and there are at least three of them.
#[derive(Debug, Clone)]
pub struct Detection {
    /// Decoded payload of the code
    pub raw_value: String,
    /// Symbology identifier (e.g. "qr_code")
    pub format: String,
    /// Corner points in frame pixel coordinates, clockwise
    pub corner_points: Vec<Point>,
    /// When the recognition call produced this detection
    pub timestamp: Instant,
}

impl Detection {
    pub fn new(raw_value: impl Into<String>, format: impl Into<String>, corner_points: Vec<Point>) -> Self {
        Self {
            raw_value: raw_value.into(),
            format: format.into(),
            corner_points,
            timestamp: Instant::now(),
        }
    }

    /// Arithmetic mean of the corner points, the detection's
    /// representative position
    pub fn centroid(&self) -> Point {
        if self.corner_points.is_empty() {
            return Point::new(0.0, 0.0);
        }
        let n = self.corner_points.len() as f32;
        let sum_x: f32 = self.corner_points.iter().map(|p| p.x).sum();
        let sum_y: f32 = self.corner_points.iter().map(|p| p.y).sum();
        Point::new(sum_x / n, sum_y / n)
    }

    /// Axis-aligned bounding box of the corner points
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        BoundingBox::from_points(&self.corner_points)
    }
}

/// All detections from one recognition call, tagged with the session the
/// call was issued against so results outliving a device switch can be
/// discarded as stale
#[derive(Debug, Clone)]
pub struct DetectionBatch {
    pub session: SessionId,
    pub detections: Vec<Detection>,
}

impl DetectionBatch {
    pub fn new(session: SessionId, detections: Vec<Detection>) -> Self {
        Self { session, detections }
    }

    pub fn empty(session: SessionId) -> Self {
        Self {
            session,
            detections: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x: f32, y: f32, size: f32) -> Vec<Point> {
        vec![
            Point::new(x, y),
            Point::new(x + size, y),
            Point::new(x + size, y + size),
            Point::new(x, y + size),
        ]
    }

    #[test]
    fn test_centroid_of_square() {
        let det = Detection::new("abc", "qr_code", square(0.0, 0.0, 10.0));
        let c = det.centroid();
        assert!((c.x - 5.0).abs() < f32::EPSILON);
        assert!((c.y - 5.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_bounding_box_containment() {
        let det = Detection::new("abc", "qr_code", square(2.0, 3.0, 4.0));
        let bbox = det.bounding_box().unwrap();
        assert!(bbox.contains(Point::new(4.0, 5.0)));
        assert!(bbox.contains(Point::new(2.0, 3.0))); // edge is inside
        assert!(!bbox.contains(Point::new(6.5, 5.0)));
    }

    #[test]
    fn test_bounding_box_of_nothing() {
        assert!(BoundingBox::from_points(&[]).is_none());
    }
}
