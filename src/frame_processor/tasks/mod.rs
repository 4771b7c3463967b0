// SPDX-License-Identifier: GPL-3.0-only

//! Recognition tasks
//!
//! The recognition capability is an opaque, stateless-per-call dependency
//! behind the [`RecognitionEngine`] trait. The built-in [`QrDetector`]
//! implementation decodes QR codes; alternative engines (other
//! symbologies, platform decoders) plug in at the same seam.

pub mod qr_detector;

pub use qr_detector::QrDetector;

use crate::backends::VideoFrame;
use crate::errors::ScanError;
use crate::frame_processor::types::Detection;

/// Recognition engine trait
///
/// Given a frame, returns zero or more detections. Implementations must be
/// stateless per call and treat the frame as read-only; the scan driver
/// runs `detect` on a blocking worker, never on the render path.
pub trait RecognitionEngine: Send + Sync {
    /// Engine identifier
    fn name(&self) -> &'static str;

    /// Run recognition on one frame
    fn detect(&self, frame: &VideoFrame) -> Result<Vec<Detection>, ScanError>;
}
