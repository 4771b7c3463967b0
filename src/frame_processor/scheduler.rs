// SPDX-License-Identifier: GPL-3.0-only

//! Detection scheduler
//!
//! Bounds how often the recognition engine runs, independently of the
//! render cadence. The driver loop ticks every frame pulse (~16 ms); a
//! recognition call is issued only when the configured interval has elapsed
//! since the *start* of the previous call and no call is in flight.
//!
//! Stamping the start time rather than the completion time bounds the
//! offered load on the engine independent of its latency variance; the
//! in-flight flag prevents queueing of overlapping calls when the engine is
//! slower than the interval.

use std::time::{Duration, Instant};

use crate::backends::SessionId;

/// Throttle for recognition calls with at-most-one-in-flight discipline
#[derive(Debug)]
pub struct DetectionScheduler {
    interval: Duration,
    last_run: Option<Instant>,
    in_flight: Option<SessionId>,
}

impl DetectionScheduler {
    /// Create a scheduler issuing at most one call per `interval`
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_run: None,
            in_flight: None,
        }
    }

    /// The configured minimum interval between calls
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// True while a recognition call is outstanding
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Gate for issuing a recognition call on this tick.
    ///
    /// Returns true when a call should be issued now, in which case the
    /// in-flight slot is taken for `session` and `last_run` is stamped with
    /// the call's start time. The caller must invoke [`complete`] once the
    /// call finishes, successfully or not.
    ///
    /// [`complete`]: DetectionScheduler::complete
    pub fn try_begin(&mut self, now: Instant, session: SessionId) -> bool {
        if self.in_flight.is_some() {
            return false;
        }
        if let Some(last) = self.last_run
            && now.duration_since(last) < self.interval
        {
            return false;
        }
        self.last_run = Some(now);
        self.in_flight = Some(session);
        true
    }

    /// Clear the in-flight slot, returning the session the finished call
    /// was issued against
    pub fn complete(&mut self) -> Option<SessionId> {
        self.in_flight.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_bound_over_render_clock() {
        // interval 500 ms against a 16 ms render clock: at most 4 calls
        // within a 2000 ms span
        let mut scheduler = DetectionScheduler::new(Duration::from_millis(500));
        let session = SessionId::new();
        let start = Instant::now();

        let mut calls = 0;
        let mut tick = Duration::ZERO;
        while tick < Duration::from_millis(2000) {
            if scheduler.try_begin(start + tick, session) {
                calls += 1;
                scheduler.complete();
            }
            tick += Duration::from_millis(16);
        }

        assert!(calls <= 4, "issued {} calls", calls);
        assert!(calls >= 3, "scheduler starved: {} calls", calls);
    }

    #[test]
    fn test_no_call_while_in_flight() {
        let mut scheduler = DetectionScheduler::new(Duration::from_millis(100));
        let session = SessionId::new();
        let start = Instant::now();

        assert!(scheduler.try_begin(start, session));
        // The interval elapses but the previous call has not completed
        assert!(!scheduler.try_begin(start + Duration::from_millis(500), session));

        scheduler.complete();
        assert!(scheduler.try_begin(start + Duration::from_millis(500), session));
    }

    #[test]
    fn test_last_run_stamped_at_call_start() {
        let mut scheduler = DetectionScheduler::new(Duration::from_millis(400));
        let session = SessionId::new();
        let start = Instant::now();

        assert!(scheduler.try_begin(start, session));
        // A slow engine completes 350 ms later; the next call is still due
        // 400 ms after the previous *start*, not after its completion
        scheduler.complete();
        assert!(!scheduler.try_begin(start + Duration::from_millis(399), session));
        assert!(scheduler.try_begin(start + Duration::from_millis(400), session));
    }

    #[test]
    fn test_complete_returns_issuing_session() {
        let mut scheduler = DetectionScheduler::new(Duration::from_millis(100));
        let session = SessionId::new();
        assert!(scheduler.try_begin(Instant::now(), session));
        assert_eq!(scheduler.complete(), Some(session));
        assert_eq!(scheduler.complete(), None);
    }
}
