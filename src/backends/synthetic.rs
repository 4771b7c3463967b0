// SPDX-License-Identifier: GPL-3.0-only

//! Synthetic capture source
//!
//! Provides a configurable number of virtual devices producing generated
//! grayscale test-pattern frames on a producer thread. Used for development,
//! soak-testing the scan loop, and exercising the session lifecycle without
//! hardware.
//!
//! The backend emulates platform permission semantics: until the first
//! stream grant, device labels are withheld, and enumeration can optionally
//! be configured to fail with `PermissionDenied`.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Instant;

use tracing::{debug, info};

use crate::backends::worker::StreamWorker;
use crate::backends::{
    CaptureBackend, CaptureDevice, CaptureError, CaptureResult, FacingMode, FrameSender,
    PixelFormat, VideoFrame,
};
use crate::constants::capture;

/// One virtual device of the synthetic backend
#[derive(Debug, Clone)]
struct SyntheticDevice {
    id: String,
    label: String,
    facing: FacingMode,
}

impl SyntheticDevice {
    fn matches(&self, facing: FacingMode) -> bool {
        matches!(facing, FacingMode::Any) || self.facing == facing
    }
}

/// Capture backend producing generated test-pattern frames
pub struct SyntheticBackend {
    devices: Vec<SyntheticDevice>,
    width: u32,
    height: u32,
    fps: u32,
    /// True once a stream has been granted; gates labels and enumeration
    granted: bool,
    /// When set, enumeration fails with `PermissionDenied` before the
    /// first grant
    enumeration_requires_grant: bool,
    stream: Option<StreamWorker>,
}

impl SyntheticBackend {
    /// Create a backend with `device_count` virtual devices.
    ///
    /// The last device is rear-facing (mirroring the common hardware layout
    /// where the rear camera enumerates last); all others are user-facing.
    pub fn new(device_count: usize) -> Self {
        let device_count = device_count.max(1);
        let devices = (0..device_count)
            .map(|i| {
                let rear = i == device_count - 1;
                SyntheticDevice {
                    id: format!("synthetic-{}", i),
                    label: if rear {
                        format!("Synthetic rear camera {}", i)
                    } else {
                        format!("Synthetic front camera {}", i)
                    },
                    facing: if rear {
                        FacingMode::Environment
                    } else {
                        FacingMode::User
                    },
                }
            })
            .collect();

        Self {
            devices,
            width: capture::SYNTHETIC_WIDTH,
            height: capture::SYNTHETIC_HEIGHT,
            fps: capture::DEFAULT_SOURCE_FPS,
            granted: false,
            enumeration_requires_grant: false,
            stream: None,
        }
    }

    /// Set the frame rate of the producer thread
    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps.clamp(capture::SOURCE_FPS_MIN, capture::SOURCE_FPS_MAX);
        self
    }

    /// Set the frame dimensions
    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.width = width.max(1);
        self.height = height.max(1);
        self
    }

    /// Make enumeration fail with `PermissionDenied` until a stream has
    /// been granted once (the behavior of browser-style platforms)
    pub fn with_gated_enumeration(mut self) -> Self {
        self.enumeration_requires_grant = true;
        self
    }

    fn start_stream(&mut self, device_id: &str, sender: FrameSender) -> CaptureResult<()> {
        if self.stream.is_some() {
            return Err(CaptureError::Busy(format!(
                "stream already open while opening '{}'",
                device_id
            )));
        }

        let width = self.width;
        let height = self.height;
        let frame_duration = capture::frame_duration(self.fps);
        let mut sender = sender;

        let worker = StreamWorker::spawn(move |stop| {
            let mut sequence: u64 = 0;
            while !stop.load(Ordering::SeqCst) {
                let frame = generate_pattern(width, height, sequence);
                match sender.try_send(frame) {
                    Ok(()) => {}
                    Err(err) if err.is_disconnected() => break,
                    // Receiver is behind; drop the frame to keep latency low
                    Err(_) => {}
                }
                sequence += 1;
                std::thread::sleep(frame_duration);
            }
        });

        self.stream = Some(worker);
        self.granted = true;
        info!(device = %device_id, width, height, fps = self.fps, "Synthetic stream opened");
        Ok(())
    }
}

impl CaptureBackend for SyntheticBackend {
    fn name(&self) -> &'static str {
        "synthetic"
    }

    fn enumerate_devices(&mut self) -> CaptureResult<Vec<CaptureDevice>> {
        if self.enumeration_requires_grant && !self.granted {
            return Err(CaptureError::PermissionDenied(
                "enumeration requires a prior stream grant".into(),
            ));
        }

        Ok(self
            .devices
            .iter()
            .map(|d| CaptureDevice {
                id: d.id.clone(),
                // Labels are withheld until the first grant
                label: if self.granted {
                    d.label.clone()
                } else {
                    String::new()
                },
                is_current: false,
            })
            .collect())
    }

    fn open_stream(&mut self, device_id: &str, sender: FrameSender) -> CaptureResult<()> {
        if !self.devices.iter().any(|d| d.id == device_id) {
            return Err(CaptureError::DeviceNotFound(device_id.to_string()));
        }
        self.start_stream(device_id, sender)
    }

    fn open_default(&mut self, facing: FacingMode, sender: FrameSender) -> CaptureResult<String> {
        let device_id = self
            .devices
            .iter()
            .find(|d| d.matches(facing))
            .map(|d| d.id.clone())
            .ok_or_else(|| {
                CaptureError::DeviceNotFound(format!("no {} facing device", facing))
            })?;
        self.start_stream(&device_id, sender)?;
        Ok(device_id)
    }

    fn close_stream(&mut self) -> CaptureResult<()> {
        if let Some(worker) = self.stream.take() {
            worker.stop();
            debug!("Synthetic stream closed");
        }
        Ok(())
    }

    fn has_open_stream(&self) -> bool {
        self.stream.is_some()
    }
}

/// Generate one moving diagonal-gradient frame
fn generate_pattern(width: u32, height: u32, sequence: u64) -> VideoFrame {
    let offset = (sequence * 4) as u32;
    let mut data = Vec::with_capacity((width * height) as usize);
    for y in 0..height {
        for x in 0..width {
            data.push(((x + y + offset) % 256) as u8);
        }
    }

    VideoFrame {
        width,
        height,
        data: Arc::from(data.into_boxed_slice()),
        format: PixelFormat::Gray8,
        stride: width,
        sequence,
        captured_at: Instant::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::channel::mpsc;

    #[test]
    fn test_labels_withheld_before_grant() {
        let mut backend = SyntheticBackend::new(2);
        let devices = backend.enumerate_devices().unwrap();
        assert_eq!(devices.len(), 2);
        assert!(devices.iter().all(|d| d.label.is_empty()));

        let (tx, _rx) = mpsc::channel(4);
        backend.open_default(FacingMode::Any, tx).unwrap();
        backend.close_stream().unwrap();

        let devices = backend.enumerate_devices().unwrap();
        assert!(devices.iter().all(|d| !d.label.is_empty()));
    }

    #[test]
    fn test_gated_enumeration() {
        let mut backend = SyntheticBackend::new(1).with_gated_enumeration();
        assert!(matches!(
            backend.enumerate_devices(),
            Err(CaptureError::PermissionDenied(_))
        ));

        let (tx, _rx) = mpsc::channel(4);
        backend.open_default(FacingMode::Any, tx).unwrap();
        backend.close_stream().unwrap();
        assert!(backend.enumerate_devices().is_ok());
    }

    #[test]
    fn test_second_open_is_busy() {
        let mut backend = SyntheticBackend::new(2);
        let (tx, _rx) = mpsc::channel(4);
        backend.open_stream("synthetic-0", tx).unwrap();

        let (tx2, _rx2) = mpsc::channel(4);
        assert!(matches!(
            backend.open_stream("synthetic-1", tx2),
            Err(CaptureError::Busy(_))
        ));
        backend.close_stream().unwrap();
    }

    #[test]
    fn test_rear_device_enumerates_last() {
        let mut backend = SyntheticBackend::new(3);
        let (tx, _rx) = mpsc::channel(4);
        let opened = backend.open_default(FacingMode::Environment, tx).unwrap();
        assert_eq!(opened, "synthetic-2");
        backend.close_stream().unwrap();
    }

    #[test]
    fn test_frames_have_increasing_sequence() {
        let mut backend = SyntheticBackend::new(1).with_fps(120);
        let (tx, mut rx) = mpsc::channel(4);
        backend.open_stream("synthetic-0", tx).unwrap();

        let mut seen = Vec::new();
        let deadline = Instant::now() + std::time::Duration::from_secs(2);
        while seen.len() < 3 && Instant::now() < deadline {
            match rx.try_next() {
                Ok(Some(frame)) => seen.push(frame.sequence),
                _ => std::thread::sleep(std::time::Duration::from_millis(5)),
            }
        }
        backend.close_stream().unwrap();

        assert!(seen.len() >= 3, "expected frames from the producer");
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
    }
}
