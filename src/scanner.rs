// SPDX-License-Identifier: GPL-3.0-only

//! Scan driver
//!
//! One logical loop drives everything: the owner calls [`Scanner::tick`]
//! once per frame pulse (~16 ms). Each tick drains newly arrived frames,
//! collects finished recognition results, possibly dispatches the next
//! recognition call to the blocking pool, and advances the overlay
//! tweening. Recognition never runs on the tick path and the tick never
//! awaits it; the scheduler's in-flight flag is the only concurrency
//! control between them.
//!
//! Results are tagged with the session they were issued against; a result
//! arriving after a device switch is discarded as stale.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::{debug, info, warn};

use crate::backends::{
    CaptureSessionManager, FrameReceiver, SessionId, SessionState, VideoFrame,
};
use crate::config::Config;
use crate::errors::{ScanError, ScanResult};
use crate::frame_processor::{
    DetectionScheduler, StabilityFilter, BatchVerdict, Detection, DetectionBatch,
    RecognitionEngine,
};
use crate::overlay::{DisplayTweener, RenderSurface, render_overlays};
use crate::registry::{ResultRegistry, ResultSink};

/// Completed recognition call routed back to the driver
struct DetectionOutcome {
    session: SessionId,
    result: Result<Vec<Detection>, ScanError>,
}

/// The scanning pipeline driver
pub struct Scanner {
    manager: CaptureSessionManager,
    engine: Arc<dyn RecognitionEngine>,
    scheduler: DetectionScheduler,
    filter: StabilityFilter,
    tweener: DisplayTweener,
    registry: ResultRegistry,
    sink: Box<dyn ResultSink>,
    format_allowlist: Option<Vec<String>>,
    preferred_device: Option<String>,
    frames: Option<FrameReceiver>,
    latest_frame: Option<Arc<VideoFrame>>,
    results_tx: UnboundedSender<DetectionOutcome>,
    results_rx: UnboundedReceiver<DetectionOutcome>,
}

impl Scanner {
    /// Assemble a scanner from its parts
    pub fn new(
        manager: CaptureSessionManager,
        engine: Arc<dyn RecognitionEngine>,
        config: &Config,
        sink: Box<dyn ResultSink>,
    ) -> Self {
        let (results_tx, results_rx) = unbounded_channel();
        Self {
            manager,
            engine,
            scheduler: DetectionScheduler::new(config.detection_interval()),
            filter: StabilityFilter::new(),
            tweener: DisplayTweener::new(config.tween_alpha, config.overlay_inactivity()),
            registry: ResultRegistry::new(),
            sink,
            format_allowlist: config.format_allowlist.clone(),
            preferred_device: config.last_device_id.clone(),
            frames: None,
            latest_frame: None,
            results_tx,
            results_rx,
        }
    }

    /// Acquire the capture session and start streaming.
    ///
    /// Prefers the device remembered from the last run when it is still
    /// usable, otherwise acquires under the default selection policy.
    pub fn start(&mut self) -> ScanResult<()> {
        let receiver = match self.preferred_device.clone() {
            Some(device_id) => match self.manager.acquire(Some(&device_id)) {
                Ok(receiver) => receiver,
                Err(err) => {
                    debug!(device = %device_id, %err, "Remembered device unusable; acquiring default");
                    self.manager.acquire(None)?
                }
            },
            None => self.manager.acquire(None)?,
        };
        self.frames = Some(receiver);
        Ok(())
    }

    /// One driver pulse
    pub fn tick(&mut self, now: Instant) {
        self.drain_frames();
        self.drain_results(now);
        self.maybe_dispatch(now);
        self.tweener.advance(now);
    }

    /// Cycle to the next capture device.
    ///
    /// The comparison batch and overlays belong to the old view and are
    /// dropped with it.
    pub fn switch_camera(&mut self) -> ScanResult<()> {
        self.latest_frame = None;
        match self.manager.switch_to(None) {
            Ok(receiver) => {
                self.frames = Some(receiver);
                self.filter.reset();
                self.tweener.clear();
                if let Some(device) = self.manager.current_device() {
                    info!(device = %device.id, "Switched capture device");
                }
                Ok(())
            }
            Err(err) => {
                self.frames = None;
                Err(err)
            }
        }
    }

    /// Remove one result (user-initiated)
    pub fn remove_result(&mut self, value: &str) {
        if self.registry.remove(value) {
            self.sink.on_removed(value);
        }
    }

    /// Clear all results (user-initiated)
    pub fn clear_results(&mut self) {
        self.registry.clear();
        self.sink.on_cleared();
    }

    /// Newline-joined registered values
    pub fn export_text(&self) -> String {
        self.registry.export_text()
    }

    /// Draw the current overlays onto a surface
    pub fn render(&self, surface: &mut dyn RenderSurface) {
        render_overlays(&self.tweener, surface);
    }

    /// Release the capture session. Idempotent.
    pub fn shutdown(&mut self) {
        self.frames = None;
        self.latest_frame = None;
        self.manager.release();
    }

    pub fn registry(&self) -> &ResultRegistry {
        &self.registry
    }

    pub fn tweener(&self) -> &DisplayTweener {
        &self.tweener
    }

    pub fn manager(&self) -> &CaptureSessionManager {
        &self.manager
    }

    pub fn session_state(&self) -> SessionState {
        self.manager.state()
    }

    pub fn latest_frame(&self) -> Option<&Arc<VideoFrame>> {
        self.latest_frame.as_ref()
    }

    /// Keep only the newest frame; the render path shows the latest and
    /// recognition wants the freshest input
    fn drain_frames(&mut self) {
        let Some(receiver) = &mut self.frames else {
            return;
        };
        loop {
            match receiver.try_next() {
                Ok(Some(frame)) => self.latest_frame = Some(Arc::new(frame)),
                Ok(None) => {
                    debug!("Frame stream ended");
                    self.frames = None;
                    break;
                }
                Err(_) => break,
            }
        }
    }

    fn drain_results(&mut self, now: Instant) {
        while let Ok(outcome) = self.results_rx.try_recv() {
            self.scheduler.complete();

            if Some(outcome.session) != self.manager.session_id() {
                debug!(session = %outcome.session, "Discarding stale detection result");
                continue;
            }

            // A failed recognition call is an empty batch, not a stop
            let detections = match outcome.result {
                Ok(detections) => detections,
                Err(err) => {
                    warn!(%err, "Recognition call failed");
                    Vec::new()
                }
            };
            let detections = self.apply_allowlist(detections);
            let batch = DetectionBatch::new(outcome.session, detections);

            if self.filter.apply(&batch) == BatchVerdict::Suppressed {
                continue;
            }

            for detection in &batch.detections {
                if self.registry.add(&detection.raw_value, &detection.format) {
                    info!(value = %detection.raw_value, format = %detection.format, "New code discovered");
                    self.sink.on_added(&detection.raw_value, &detection.format);
                }
            }
            self.tweener.apply_batch(&batch.detections, now);
        }
    }

    fn maybe_dispatch(&mut self, now: Instant) {
        let Some(session) = self.manager.session_id() else {
            return;
        };
        let Some(frame) = self.latest_frame.clone() else {
            return;
        };
        if !self.scheduler.try_begin(now, session) {
            return;
        }

        let engine = Arc::clone(&self.engine);
        let results_tx = self.results_tx.clone();
        tokio::task::spawn_blocking(move || {
            let result = engine.detect(frame.as_ref());
            let _ = results_tx.send(DetectionOutcome { session, result });
        });
    }

    fn apply_allowlist(&self, detections: Vec<Detection>) -> Vec<Detection> {
        match &self.format_allowlist {
            Some(allowed) => detections
                .into_iter()
                .filter(|d| allowed.iter().any(|f| f == &d.format))
                .collect(),
            None => detections,
        }
    }
}
