// SPDX-License-Identifier: GPL-3.0-only

//! QR code recognition engine
//!
//! Decodes QR codes from capture frames using the rqrr crate. Frames are
//! converted to grayscale and optionally downscaled before grid detection;
//! corner points are scaled back to frame coordinates afterwards.

use std::time::Instant;

use tracing::{debug, trace};

use crate::backends::VideoFrame;
use crate::constants::formats;
use crate::errors::ScanError;
use crate::frame_processor::tasks::RecognitionEngine;
use crate::frame_processor::types::{Detection, Point};

/// QR code detector
///
/// Optimized for real-time processing with frame downscaling: QR codes are
/// typically large enough in the frame to survive a reduction to 640 px.
pub struct QrDetector {
    /// Maximum dimension for processing (larger frames are downscaled)
    max_dimension: u32,
}

impl Default for QrDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl QrDetector {
    /// Create a new QR detector with default settings
    pub fn new() -> Self {
        Self { max_dimension: 640 }
    }

    /// Create a QR detector with a custom processing dimension
    pub fn with_max_dimension(max_dimension: u32) -> Self {
        Self {
            max_dimension: max_dimension.max(1),
        }
    }
}

impl RecognitionEngine for QrDetector {
    fn name(&self) -> &'static str {
        "rqrr"
    }

    fn detect(&self, frame: &VideoFrame) -> Result<Vec<Detection>, ScanError> {
        let start = Instant::now();

        let gray = frame.to_luma();
        let (gray, scale) = downscale_for_processing(gray, self.max_dimension);

        let conversion_time = start.elapsed();
        trace!(
            proc_width = gray.width(),
            proc_height = gray.height(),
            scale,
            conversion_ms = conversion_time.as_millis(),
            "Prepared grayscale image for processing"
        );

        let mut prepared = rqrr::PreparedImage::prepare(gray);
        let grids = prepared.detect_grids();

        let detection_time = start.elapsed() - conversion_time;
        trace!(
            count = grids.len(),
            detection_ms = detection_time.as_millis(),
            "QR grid detection complete"
        );

        let mut detections = Vec::with_capacity(grids.len());
        for grid in grids {
            // Scale corner points back to original frame coordinates
            let corner_points: Vec<Point> = grid
                .bounds
                .iter()
                .map(|p| Point::new(p.x as f32 * scale, p.y as f32 * scale))
                .collect();

            match grid.decode() {
                Ok((_meta, content)) => {
                    debug!(content = %content, "Decoded QR code");
                    detections.push(Detection::new(content, formats::QR_CODE, corner_points));
                }
                Err(err) => {
                    debug!(error = %err, "Failed to decode QR code");
                }
            }
        }

        if !detections.is_empty() {
            debug!(
                count = detections.len(),
                total_ms = start.elapsed().as_millis(),
                "QR detection found codes"
            );
        }

        Ok(detections)
    }
}

/// Downscale an image so its largest dimension fits `max_dimension`.
///
/// Returns the (possibly untouched) image and the factor that maps
/// processed coordinates back to source coordinates.
fn downscale_for_processing(gray: image::GrayImage, max_dimension: u32) -> (image::GrayImage, f32) {
    let (width, height) = gray.dimensions();
    if width <= max_dimension && height <= max_dimension {
        return (gray, 1.0);
    }

    let scale = (width as f32 / max_dimension as f32).max(height as f32 / max_dimension as f32);
    let new_width = ((width as f32 / scale) as u32).max(1);
    let new_height = ((height as f32 / scale) as u32).max(1);

    let resized = image::imageops::resize(
        &gray,
        new_width,
        new_height,
        image::imageops::FilterType::Triangle,
    );
    (resized, scale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::PixelFormat;
    use std::sync::Arc;

    fn blank_frame(width: u32, height: u32) -> VideoFrame {
        VideoFrame {
            width,
            height,
            data: Arc::from(vec![255u8; (width * height) as usize].into_boxed_slice()),
            format: PixelFormat::Gray8,
            stride: width,
            sequence: 0,
            captured_at: Instant::now(),
        }
    }

    #[test]
    fn test_blank_frame_yields_no_detections() {
        let detector = QrDetector::new();
        let detections = detector.detect(&blank_frame(64, 64)).unwrap();
        assert!(detections.is_empty());
    }

    #[test]
    fn test_downscale_preserves_aspect_and_reports_scale() {
        let gray = image::GrayImage::new(1280, 720);
        let (resized, scale) = downscale_for_processing(gray, 640);
        assert_eq!(resized.width(), 640);
        assert_eq!(resized.height(), 360);
        assert!((scale - 2.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_small_frames_are_not_rescaled() {
        let gray = image::GrayImage::new(320, 240);
        let (resized, scale) = downscale_for_processing(gray, 640);
        assert_eq!(resized.dimensions(), (320, 240));
        assert!((scale - 1.0).abs() < f32::EPSILON);
    }
}
