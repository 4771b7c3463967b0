// SPDX-License-Identifier: GPL-3.0-only

//! Capture source abstraction
//!
//! This module provides a trait-based abstraction over capture sources and
//! the session manager that owns the active stream.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐
//! │     Scan driver      │
//! └──────────┬───────────┘
//!            │
//!            ▼
//! ┌──────────────────────┐
//! │ CaptureSessionManager│  ← Lifecycle state machine, retry chain, cycling
//! └──────────┬───────────┘
//!            │
//!            ▼
//! ┌──────────────────────┐
//! │ CaptureBackend trait │  ← Common interface
//! └──────────┬───────────┘
//!            │
//!      ┌─────┴─────┐
//!      ▼           ▼
//! ┌─────────┐ ┌─────────┐
//! │Synthetic│ │  File   │  ← Concrete sources
//! └─────────┘ └─────────┘
//! ```
//!
//! # Modules
//!
//! - [`manager`]: Session lifecycle management (acquire, switch, release)
//! - [`synthetic`]: Generated test-pattern source with virtual devices
//! - [`file`]: Image-directory source streamed as a camera
//! - [`types`]: Shared frame, device, and error types

pub mod file;
pub mod manager;
pub mod synthetic;
pub mod types;
pub(crate) mod worker;

pub use manager::{CaptureSessionManager, SessionState};
pub use types::*;

/// Complete capture backend trait
///
/// All capture sources implement this trait to provide:
/// - Device enumeration (possibly gated behind a permission grant)
/// - Stream lifecycle (open on a device, open under a facing constraint,
///   close)
///
/// A backend holds at most one open stream; opening while one is active is
/// a `Busy` error. The session manager relies on this to guarantee that no
/// two sessions hold a device concurrently.
pub trait CaptureBackend: Send {
    /// Backend identifier
    fn name(&self) -> &'static str;

    /// Enumerate available devices.
    ///
    /// May fail with [`CaptureError::PermissionDenied`] until a stream has
    /// been granted once; device labels may be empty until then.
    fn enumerate_devices(&mut self) -> CaptureResult<Vec<CaptureDevice>>;

    /// Open a stream on a specific device.
    ///
    /// Frames are delivered on `sender` until the stream is closed. Returns
    /// `Busy` if a stream is already open.
    fn open_stream(&mut self, device_id: &str, sender: FrameSender) -> CaptureResult<()>;

    /// Open a stream without naming a device, under a facing constraint.
    ///
    /// Used by the acquisition retry chain before enumeration has been
    /// granted. Returns the id of the device that was opened.
    fn open_default(&mut self, facing: FacingMode, sender: FrameSender) -> CaptureResult<String>;

    /// Close the open stream, stopping the producer. Idempotent.
    fn close_stream(&mut self) -> CaptureResult<()>;

    /// True while a stream is open
    fn has_open_stream(&self) -> bool;
}
