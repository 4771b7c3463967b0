// SPDX-License-Identifier: GPL-3.0-only

//! Shared types for capture backends

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use uuid::Uuid;

/// Identity of one acquired capture session.
///
/// Every detection call carries the id of the session it was issued against,
/// so a result that arrives after the device has been switched can be
/// recognized as stale and discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Mint a fresh session identity
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// Represents a capture device as reported by enumeration
///
/// Descriptors are immutable; re-enumeration replaces the whole list.
/// `label` may be empty until a stream has been granted once — platforms
/// withhold device names before the first grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureDevice {
    /// Stable identifier used to open a stream on this device
    pub id: String,
    /// Human-readable name; possibly empty before the first grant
    pub label: String,
    /// True for the device the active session is streaming from
    pub is_current: bool,
}

impl CaptureDevice {
    /// Name for display, falling back to a positional name when the label
    /// is withheld
    pub fn display_name(&self, index: usize) -> String {
        if self.label.is_empty() {
            format!("Camera {}", index + 1)
        } else {
            self.label.clone()
        }
    }
}

/// Facing constraint used by the default-acquisition retry chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacingMode {
    /// Any available device
    Any,
    /// Rear/world-facing device
    Environment,
    /// Front/user-facing device
    User,
}

impl fmt::Display for FacingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FacingMode::Any => write!(f, "any"),
            FacingMode::Environment => write!(f, "environment"),
            FacingMode::User => write!(f, "user"),
        }
    }
}

/// Pixel format for capture frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 8-bit grayscale, one byte per pixel
    Gray8,
    /// 32-bit RGBA, four bytes per pixel
    Rgba,
}

impl PixelFormat {
    /// Bytes per pixel for this format
    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            PixelFormat::Gray8 => 1,
            PixelFormat::Rgba => 4,
        }
    }
}

/// A single frame from a capture source
///
/// Frames within one session carry strictly increasing sequence numbers.
/// Pixel data is shared, not copied, when a frame is handed to the
/// background recognition task.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    /// Pixel data; rows are `stride` bytes apart and may include padding
    pub data: Arc<[u8]>,
    pub format: PixelFormat,
    /// Row stride in bytes
    pub stride: u32,
    /// Per-session frame counter, strictly increasing
    pub sequence: u64,
    /// Timestamp when the frame was produced
    pub captured_at: Instant,
}

impl VideoFrame {
    /// Convert the frame to a tightly packed grayscale image.
    ///
    /// Stride padding is dropped; RGBA pixels are reduced with the BT.601
    /// luma weights.
    pub fn to_luma(&self) -> image::GrayImage {
        let width = self.width as usize;
        let height = self.height as usize;
        let stride = self.stride as usize;
        let mut luma = Vec::with_capacity(width * height);

        match self.format {
            PixelFormat::Gray8 => {
                for y in 0..height {
                    let row_start = y * stride;
                    let row_end = row_start + width;
                    if row_end <= self.data.len() {
                        luma.extend_from_slice(&self.data[row_start..row_end]);
                    } else {
                        luma.resize(luma.len() + width, 0);
                    }
                }
            }
            PixelFormat::Rgba => {
                for y in 0..height {
                    let row_start = y * stride;
                    for x in 0..width {
                        let idx = row_start + x * 4;
                        if idx + 2 < self.data.len() {
                            let r = self.data[idx] as u32;
                            let g = self.data[idx + 1] as u32;
                            let b = self.data[idx + 2] as u32;
                            luma.push(((r * 299 + g * 587 + b * 114) / 1000) as u8);
                        } else {
                            luma.push(0);
                        }
                    }
                }
            }
        }

        image::GrayImage::from_raw(self.width, self.height, luma)
            .unwrap_or_else(|| image::GrayImage::new(self.width, self.height))
    }
}

/// Frame sender type for capture streams
pub type FrameSender = futures::channel::mpsc::Sender<VideoFrame>;

/// Frame receiver type for capture streams
pub type FrameReceiver = futures::channel::mpsc::Receiver<VideoFrame>;

/// Result type for backend operations
pub type CaptureResult<T> = Result<T, CaptureError>;

/// Error types for backend operations
#[derive(Debug, Clone)]
pub enum CaptureError {
    /// Enumeration or acquisition denied before a grant
    PermissionDenied(String),
    /// Requested device does not exist
    DeviceNotFound(String),
    /// The backend already holds an open stream
    Busy(String),
    /// Source is not usable (no images, producer gone, ...)
    NotAvailable(String),
    /// Other errors
    Other(String),
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::PermissionDenied(msg) => write!(f, "Permission denied: {}", msg),
            CaptureError::DeviceNotFound(msg) => write!(f, "Device not found: {}", msg),
            CaptureError::Busy(msg) => write!(f, "Device busy: {}", msg),
            CaptureError::NotAvailable(msg) => write!(f, "Source not available: {}", msg),
            CaptureError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for CaptureError {}
