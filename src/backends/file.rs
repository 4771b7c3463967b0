// SPDX-License-Identifier: GPL-3.0-only

//! Image-directory capture source
//!
//! Streams the images of a directory in a loop as if they were a live
//! camera feed. This lets the real recognition engine see real codes
//! without camera hardware — point it at a directory of photos containing
//! QR codes and the full pipeline runs end to end.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::backends::worker::StreamWorker;
use crate::backends::{
    CaptureBackend, CaptureDevice, CaptureError, CaptureResult, FacingMode, FrameSender,
    PixelFormat, VideoFrame,
};
use crate::constants::{capture, file_formats};

/// Capture backend streaming the images of a directory
pub struct FileBackend {
    dir: PathBuf,
    device_id: String,
    fps: u32,
    stream: Option<StreamWorker>,
}

impl FileBackend {
    /// Create a backend for the given directory
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let device_id = format!("file:{}", dir.display());
        Self {
            dir,
            device_id,
            fps: capture::DEFAULT_SOURCE_FPS,
            stream: None,
        }
    }

    /// Set the frame rate of the producer thread
    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps.clamp(capture::SOURCE_FPS_MIN, capture::SOURCE_FPS_MAX);
        self
    }

    fn device_label(&self) -> String {
        self.dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.dir.display().to_string())
    }

    fn start_stream(&mut self, sender: FrameSender) -> CaptureResult<()> {
        if self.stream.is_some() {
            return Err(CaptureError::Busy(format!(
                "stream already open on '{}'",
                self.device_id
            )));
        }

        let paths = collect_image_paths(&self.dir)?;
        if paths.is_empty() {
            return Err(CaptureError::NotAvailable(format!(
                "no images found in {}",
                self.dir.display()
            )));
        }

        let frame_duration = capture::frame_duration(self.fps);
        let mut sender = sender;

        let worker = StreamWorker::spawn(move |stop| {
            let mut sequence: u64 = 0;
            'streaming: loop {
                for path in &paths {
                    if stop.load(Ordering::SeqCst) {
                        break 'streaming;
                    }
                    let frame = match load_image_frame(path, sequence) {
                        Ok(frame) => frame,
                        Err(err) => {
                            warn!(path = %path.display(), %err, "Skipping unreadable image");
                            continue;
                        }
                    };
                    match sender.try_send(frame) {
                        Ok(()) => {}
                        Err(err) if err.is_disconnected() => break 'streaming,
                        // Receiver is behind; drop the frame to keep latency low
                        Err(_) => {}
                    }
                    sequence += 1;
                    std::thread::sleep(frame_duration);
                }
            }
        });

        self.stream = Some(worker);
        info!(dir = %self.dir.display(), fps = self.fps, "File stream opened");
        Ok(())
    }
}

impl CaptureBackend for FileBackend {
    fn name(&self) -> &'static str {
        "file"
    }

    fn enumerate_devices(&mut self) -> CaptureResult<Vec<CaptureDevice>> {
        Ok(vec![CaptureDevice {
            id: self.device_id.clone(),
            label: self.device_label(),
            is_current: false,
        }])
    }

    fn open_stream(&mut self, device_id: &str, sender: FrameSender) -> CaptureResult<()> {
        if device_id != self.device_id {
            return Err(CaptureError::DeviceNotFound(device_id.to_string()));
        }
        self.start_stream(sender)
    }

    fn open_default(&mut self, _facing: FacingMode, sender: FrameSender) -> CaptureResult<String> {
        // A directory source has no physical orientation; the facing
        // constraint is satisfied on a best-effort basis
        self.start_stream(sender)?;
        Ok(self.device_id.clone())
    }

    fn close_stream(&mut self) -> CaptureResult<()> {
        if let Some(worker) = self.stream.take() {
            worker.stop();
            debug!(dir = %self.dir.display(), "File stream closed");
        }
        Ok(())
    }

    fn has_open_stream(&self) -> bool {
        self.stream.is_some()
    }
}

/// Collect supported image paths from a directory, sorted by filename for
/// consistent ordering
fn collect_image_paths(dir: &Path) -> CaptureResult<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .map_err(|err| CaptureError::NotAvailable(format!("{}: {}", dir.display(), err)))?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(file_formats::is_image_extension)
        })
        .collect();

    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(paths)
}

/// Load an image file as an RGBA video frame
fn load_image_frame(path: &Path, sequence: u64) -> CaptureResult<VideoFrame> {
    let img = image::open(path).map_err(|err| CaptureError::Other(err.to_string()))?;
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();

    Ok(VideoFrame {
        width,
        height,
        data: Arc::from(rgba.into_raw().into_boxed_slice()),
        format: PixelFormat::Rgba,
        stride: width * 4,
        sequence,
        captured_at: Instant::now(),
    })
}
