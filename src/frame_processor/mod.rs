// SPDX-License-Identifier: GPL-3.0-only

//! Frame processor module for async frame analysis
//!
//! This module turns the raw per-frame detection signal into a stable
//! stream: a throttled scheduler drives the recognition engine at a bounded
//! rate, and a stability filter suppresses batches that carry no new
//! information (same codes, centroids still inside their previous bounding
//! boxes).

pub mod scheduler;
pub mod stability;
pub mod tasks;
pub mod types;

pub use scheduler::DetectionScheduler;
pub use stability::{BatchVerdict, StabilityFilter};
pub use tasks::{QrDetector, RecognitionEngine};
pub use types::{BoundingBox, Detection, DetectionBatch, Point};
