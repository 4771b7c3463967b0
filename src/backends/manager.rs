// SPDX-License-Identifier: GPL-3.0-only

//! Capture session lifecycle manager
//!
//! The manager owns the single active capture session and provides:
//! - Device enumeration, with the one-time generic grant that unlocks
//!   enumeration on permission-gated platforms
//! - Acquisition with a facing-constraint retry chain and a configurable
//!   default-device selection policy
//! - Device switching that fully releases the previous session before the
//!   next one is requested
//! - Idempotent release, safe to call from a shutdown hook
//!
//! State machine:
//!
//! ```text
//! Idle --acquire ok--> Streaming --switch_to--> Switching --release ok-->
//! Released --> Acquiring --open ok--> Streaming
//! Streaming/Switching --release--> Released
//! ```
//!
//! `Switching` is never observed holding two open streams; the backend
//! enforces single-stream ownership and the manager closes before opening.

use std::fmt;

use futures::channel::mpsc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::backends::{
    CaptureBackend, CaptureDevice, CaptureError, FacingMode, FrameReceiver, FrameSender, SessionId,
};
use crate::constants::capture;
use crate::errors::{ScanError, ScanResult};

/// Bound on the retained lifecycle transition log
const MAX_TRANSITIONS: usize = 64;

/// Lifecycle state of the capture session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No session; nothing acquired yet or a previous attempt failed
    Idle,
    /// An acquisition is in progress
    Acquiring,
    /// Frames are flowing from the current device
    Streaming,
    /// A device switch is tearing down the previous session
    Switching,
    /// The session was released; a new acquire may follow
    Released,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Acquiring => write!(f, "acquiring"),
            SessionState::Streaming => write!(f, "streaming"),
            SessionState::Switching => write!(f, "switching"),
            SessionState::Released => write!(f, "released"),
        }
    }
}

/// Policy selecting the default device when none is named
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DevicePolicy {
    /// Prefer the last enumerated device, heuristically the rear camera
    #[default]
    LastEnumerated,
    /// Prefer a device whose label names the rear camera
    /// ("back", "rear", "environment"), falling back to the last device
    RearLabel,
}

impl DevicePolicy {
    /// Get display name for the policy
    pub fn display_name(&self) -> &'static str {
        match self {
            DevicePolicy::LastEnumerated => "last enumerated",
            DevicePolicy::RearLabel => "rear label match",
        }
    }
}

/// The one active session
struct ActiveSession {
    id: SessionId,
    device_id: String,
    device_index: usize,
}

/// Capture session manager
///
/// Owns the backend and the active session exclusively. A session passes
/// through `Released` before a successor reaches `Streaming`.
pub struct CaptureSessionManager {
    backend: Box<dyn CaptureBackend>,
    policy: DevicePolicy,
    devices: Vec<CaptureDevice>,
    session: Option<ActiveSession>,
    state: SessionState,
    /// Recent lifecycle transitions, for diagnostics
    transitions: Vec<SessionState>,
}

impl CaptureSessionManager {
    /// Create a manager over the given backend
    pub fn new(backend: Box<dyn CaptureBackend>, policy: DevicePolicy) -> Self {
        info!(backend = backend.name(), policy = policy.display_name(), "Creating capture session manager");
        Self {
            backend,
            policy,
            devices: Vec::new(),
            session: None,
            state: SessionState::Idle,
            transitions: Vec::new(),
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Identity of the active session, if any
    pub fn session_id(&self) -> Option<SessionId> {
        self.session.as_ref().map(|s| s.id)
    }

    /// The device the active session streams from
    pub fn current_device(&self) -> Option<&CaptureDevice> {
        let session = self.session.as_ref()?;
        self.devices.iter().find(|d| d.id == session.device_id)
    }

    /// Devices from the most recent enumeration
    pub fn devices(&self) -> &[CaptureDevice] {
        &self.devices
    }

    /// Recent lifecycle transitions, oldest first
    pub fn transitions(&self) -> &[SessionState] {
        &self.transitions
    }

    /// Enumerate available devices, replacing the previous list wholesale.
    ///
    /// On permission-gated platforms enumeration fails before the first
    /// stream grant; that is mitigated with a one-time throwaway generic
    /// acquire, after which enumeration is retried once.
    pub fn enumerate_devices(&mut self) -> ScanResult<&[CaptureDevice]> {
        match self.backend.enumerate_devices() {
            Ok(devices) => {
                self.devices = devices;
                self.mark_current();
                Ok(&self.devices)
            }
            Err(CaptureError::PermissionDenied(reason)) if !self.backend.has_open_stream() => {
                debug!(%reason, "Enumeration denied; attempting one-time generic grant");
                let (sender, receiver) = frame_channel();
                self.backend
                    .open_default(FacingMode::Any, sender)
                    .map_err(|err| ScanError::PermissionDenied(err.to_string()))?;
                let result = self.backend.enumerate_devices();
                if let Err(err) = self.backend.close_stream() {
                    warn!(%err, "Failed to close grant stream");
                }
                drop(receiver);
                self.devices = result.map_err(ScanError::from)?;
                self.mark_current();
                Ok(&self.devices)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Acquire a capture session.
    ///
    /// With an explicit device the stream is opened directly. Without one,
    /// the acquisition retry chain runs (generic, then environment-facing,
    /// then user-facing), devices are enumerated under the fresh grant, and
    /// the stream is moved to the device preferred by the selection policy.
    ///
    /// Returns the receiving end of the session's frame stream.
    pub fn acquire(&mut self, device_id: Option<&str>) -> ScanResult<FrameReceiver> {
        if self.session.is_some() {
            return Err(ScanError::Other(
                "a capture session is already active; release it first".into(),
            ));
        }
        self.set_state(SessionState::Acquiring);
        match self.acquire_inner(device_id) {
            Ok(receiver) => {
                self.set_state(SessionState::Streaming);
                Ok(receiver)
            }
            Err(err) => {
                self.set_state(SessionState::Idle);
                Err(err)
            }
        }
    }

    fn acquire_inner(&mut self, device_id: Option<&str>) -> ScanResult<FrameReceiver> {
        if let Some(id) = device_id {
            let (sender, receiver) = frame_channel();
            self.backend.open_stream(id, sender).map_err(ScanError::from)?;
            self.install_session(id.to_string());
            return Ok(receiver);
        }

        let (sender, receiver) = frame_channel();
        let opened = self.open_with_retry_chain(sender)?;

        // Enumeration works now that a stream has been granted
        if let Err(err) = self.refresh_devices() {
            debug!(%err, "Device enumeration failed after acquire; keeping initial stream");
            self.install_session(opened);
            return Ok(receiver);
        }

        match self.select_default_device() {
            Some(target) if target != opened => {
                info!(device = %target, "Reopening stream on preferred device");
                drop(receiver);
                self.backend.close_stream().map_err(ScanError::from)?;
                let (sender, receiver) = frame_channel();
                self.backend
                    .open_stream(&target, sender)
                    .map_err(|err| ScanError::CaptureUnavailable(err.to_string()))?;
                self.install_session(target);
                Ok(receiver)
            }
            _ => {
                self.install_session(opened);
                Ok(receiver)
            }
        }
    }

    /// Switch to another device.
    ///
    /// With no target, advances to the next device modulo the device count.
    /// The previous session is fully released before the next device is
    /// requested. On failure the manager rests in `Idle` holding no
    /// session; the caller re-initiates — the previous session is not
    /// resurrected.
    pub fn switch_to(&mut self, device_id: Option<&str>) -> ScanResult<FrameReceiver> {
        let Some(active) = self.session.take() else {
            return Err(ScanError::Switch("no active session to switch from".into()));
        };
        self.set_state(SessionState::Switching);

        if let Err(err) = self.backend.close_stream() {
            self.mark_current();
            self.set_state(SessionState::Idle);
            return Err(ScanError::Switch(err.to_string()));
        }
        self.mark_current();
        self.set_state(SessionState::Released);

        let target = match device_id {
            Some(id) => id.to_string(),
            None => {
                if self.devices.is_empty()
                    && let Err(err) = self.refresh_devices()
                {
                    self.set_state(SessionState::Idle);
                    return Err(ScanError::Switch(err.to_string()));
                }
                if self.devices.is_empty() {
                    self.set_state(SessionState::Idle);
                    return Err(ScanError::Switch("no devices to cycle through".into()));
                }
                let next_index = (active.device_index + 1) % self.devices.len();
                self.devices[next_index].id.clone()
            }
        };

        self.set_state(SessionState::Acquiring);
        let (sender, receiver) = frame_channel();
        match self.backend.open_stream(&target, sender) {
            Ok(()) => {
                self.install_session(target);
                self.set_state(SessionState::Streaming);
                Ok(receiver)
            }
            Err(err) => {
                self.set_state(SessionState::Idle);
                Err(ScanError::Switch(err.to_string()))
            }
        }
    }

    /// Release the active session. Idempotent; safe from a shutdown hook.
    pub fn release(&mut self) {
        let had_session = self.session.take().is_some();
        if let Err(err) = self.backend.close_stream() {
            warn!(%err, "Failed to close capture stream on release");
        }
        self.mark_current();
        if had_session || self.state != SessionState::Released {
            self.set_state(SessionState::Released);
        }
    }

    fn refresh_devices(&mut self) -> Result<(), CaptureError> {
        self.devices = self.backend.enumerate_devices()?;
        self.mark_current();
        Ok(())
    }

    fn open_with_retry_chain(&mut self, sender: FrameSender) -> ScanResult<String> {
        let mut last_err: Option<CaptureError> = None;
        for facing in [FacingMode::Any, FacingMode::Environment, FacingMode::User] {
            match self.backend.open_default(facing, sender.clone()) {
                Ok(id) => {
                    debug!(%facing, device = %id, "Capture stream opened");
                    return Ok(id);
                }
                Err(err) => {
                    debug!(%facing, %err, "Acquisition attempt failed");
                    last_err = Some(err);
                }
            }
        }
        Err(ScanError::CaptureUnavailable(
            last_err
                .map(|err| err.to_string())
                .unwrap_or_else(|| "no acquisition attempt succeeded".into()),
        ))
    }

    fn select_default_device(&self) -> Option<String> {
        match self.policy {
            DevicePolicy::LastEnumerated => self.devices.last().map(|d| d.id.clone()),
            DevicePolicy::RearLabel => {
                let hinted = self.devices.iter().find(|d| {
                    let label = d.label.to_lowercase();
                    capture::REAR_LABEL_HINTS.iter().any(|hint| label.contains(hint))
                });
                hinted.or(self.devices.last()).map(|d| d.id.clone())
            }
        }
    }

    fn install_session(&mut self, device_id: String) {
        let device_index = self
            .devices
            .iter()
            .position(|d| d.id == device_id)
            .unwrap_or(0);
        let id = SessionId::new();
        info!(session = %id, device = %device_id, "Capture session established");
        self.session = Some(ActiveSession {
            id,
            device_id,
            device_index,
        });
        self.mark_current();
    }

    fn mark_current(&mut self) {
        let current = self.session.as_ref().map(|s| s.device_id.as_str().to_owned());
        for device in &mut self.devices {
            device.is_current = current.as_deref() == Some(device.id.as_str());
        }
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state == state {
            return;
        }
        debug!(from = %self.state, to = %state, "Session state transition");
        self.state = state;
        self.transitions.push(state);
        if self.transitions.len() > MAX_TRANSITIONS {
            self.transitions.remove(0);
        }
    }
}

fn frame_channel() -> (FrameSender, FrameReceiver) {
    mpsc::channel(capture::FRAME_CHANNEL_CAPACITY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    /// Backend with scriptable failures for lifecycle tests
    struct ScriptedBackend {
        devices: Vec<(String, String)>,
        fail_any: bool,
        fail_environment: bool,
        fail_user: bool,
        fail_open_ids: HashSet<String>,
        gate_enumeration: bool,
        granted: bool,
        open: Option<String>,
    }

    impl ScriptedBackend {
        fn new(devices: &[(&str, &str)]) -> Self {
            Self {
                devices: devices
                    .iter()
                    .map(|(id, label)| (id.to_string(), label.to_string()))
                    .collect(),
                fail_any: false,
                fail_environment: false,
                fail_user: false,
                fail_open_ids: HashSet::new(),
                gate_enumeration: false,
                granted: false,
                open: None,
            }
        }

        fn open_id(&mut self, id: String) -> crate::backends::CaptureResult<()> {
            if self.open.is_some() {
                return Err(CaptureError::Busy("stream already open".into()));
            }
            if self.fail_open_ids.contains(&id) {
                return Err(CaptureError::NotAvailable(format!("scripted failure for {}", id)));
            }
            self.open = Some(id);
            self.granted = true;
            Ok(())
        }
    }

    impl CaptureBackend for ScriptedBackend {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn enumerate_devices(&mut self) -> crate::backends::CaptureResult<Vec<CaptureDevice>> {
            if self.gate_enumeration && !self.granted {
                return Err(CaptureError::PermissionDenied("not granted".into()));
            }
            Ok(self
                .devices
                .iter()
                .map(|(id, label)| CaptureDevice {
                    id: id.clone(),
                    label: label.clone(),
                    is_current: false,
                })
                .collect())
        }

        fn open_stream(
            &mut self,
            device_id: &str,
            _sender: FrameSender,
        ) -> crate::backends::CaptureResult<()> {
            if !self.devices.iter().any(|(id, _)| id == device_id) {
                return Err(CaptureError::DeviceNotFound(device_id.to_string()));
            }
            self.open_id(device_id.to_string())
        }

        fn open_default(
            &mut self,
            facing: FacingMode,
            _sender: FrameSender,
        ) -> crate::backends::CaptureResult<String> {
            let fails = match facing {
                FacingMode::Any => self.fail_any,
                FacingMode::Environment => self.fail_environment,
                FacingMode::User => self.fail_user,
            };
            if fails {
                return Err(CaptureError::NotAvailable(format!("{} rejected", facing)));
            }
            // Environment maps to the last device, anything else to the first
            let id = match facing {
                FacingMode::Environment => self.devices.last(),
                _ => self.devices.first(),
            }
            .map(|(id, _)| id.clone())
            .ok_or_else(|| CaptureError::DeviceNotFound("no devices".into()))?;
            self.open_id(id.clone())?;
            Ok(id)
        }

        fn close_stream(&mut self) -> crate::backends::CaptureResult<()> {
            self.open = None;
            Ok(())
        }

        fn has_open_stream(&self) -> bool {
            self.open.is_some()
        }
    }

    fn manager_with(devices: &[(&str, &str)]) -> CaptureSessionManager {
        CaptureSessionManager::new(
            Box::new(ScriptedBackend::new(devices)),
            DevicePolicy::LastEnumerated,
        )
    }

    #[test]
    fn test_default_acquire_selects_last_device() {
        let mut manager = manager_with(&[("a", "Front"), ("b", "Back")]);
        manager.acquire(None).unwrap();

        assert_eq!(manager.state(), SessionState::Streaming);
        assert_eq!(manager.current_device().unwrap().id, "b");
        assert!(manager.current_device().unwrap().is_current);
    }

    #[test]
    fn test_rear_label_policy_matches_label() {
        let backend = ScriptedBackend::new(&[("a", "Back Camera"), ("b", "Front Camera")]);
        let mut manager = CaptureSessionManager::new(Box::new(backend), DevicePolicy::RearLabel);
        manager.acquire(None).unwrap();

        assert_eq!(manager.current_device().unwrap().id, "a");
    }

    #[test]
    fn test_cycle_switch_wraps_around() {
        let mut manager = manager_with(&[("a", "Front"), ("b", "Back")]);
        manager.acquire(None).unwrap();
        assert_eq!(manager.current_device().unwrap().id, "b");

        manager.switch_to(None).unwrap();
        assert_eq!(manager.current_device().unwrap().id, "a");

        manager.switch_to(None).unwrap();
        assert_eq!(manager.current_device().unwrap().id, "b");
    }

    #[test]
    fn test_switch_passes_through_released_and_acquiring() {
        let mut manager = manager_with(&[("a", "Front"), ("b", "Back")]);
        manager.acquire(None).unwrap();
        manager.switch_to(None).unwrap();

        let transitions = manager.transitions();
        let streaming_positions: Vec<usize> = transitions
            .iter()
            .enumerate()
            .filter(|(_, s)| **s == SessionState::Streaming)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(streaming_positions.len(), 2);

        let between = &transitions[streaming_positions[0] + 1..streaming_positions[1]];
        assert!(between.contains(&SessionState::Switching));
        assert!(between.contains(&SessionState::Released));
        assert!(between.contains(&SessionState::Acquiring));
    }

    #[test]
    fn test_retry_chain_falls_through_to_environment() {
        let mut backend = ScriptedBackend::new(&[("a", "Front"), ("b", "Back")]);
        backend.fail_any = true;
        let mut manager =
            CaptureSessionManager::new(Box::new(backend), DevicePolicy::LastEnumerated);

        manager.acquire(None).unwrap();
        assert_eq!(manager.state(), SessionState::Streaming);
    }

    #[test]
    fn test_exhausted_retry_chain_is_capture_unavailable() {
        let mut backend = ScriptedBackend::new(&[("a", "Front")]);
        backend.fail_any = true;
        backend.fail_environment = true;
        backend.fail_user = true;
        let mut manager =
            CaptureSessionManager::new(Box::new(backend), DevicePolicy::LastEnumerated);

        assert!(matches!(
            manager.acquire(None),
            Err(ScanError::CaptureUnavailable(_))
        ));
        assert_eq!(manager.state(), SessionState::Idle);
        assert!(manager.session_id().is_none());
    }

    #[test]
    fn test_gated_enumeration_is_mitigated() {
        let mut backend = ScriptedBackend::new(&[("a", "Front"), ("b", "Back")]);
        backend.gate_enumeration = true;
        let mut manager =
            CaptureSessionManager::new(Box::new(backend), DevicePolicy::LastEnumerated);

        let devices = manager.enumerate_devices().unwrap();
        assert_eq!(devices.len(), 2);
        // The throwaway grant stream must not linger
        assert!(manager.session_id().is_none());
    }

    #[test]
    fn test_switch_failure_leaves_idle_without_session() {
        let mut backend = ScriptedBackend::new(&[("a", "Front"), ("b", "Back")]);
        backend.fail_open_ids.insert("a".to_string());
        let mut manager =
            CaptureSessionManager::new(Box::new(backend), DevicePolicy::LastEnumerated);

        manager.acquire(None).unwrap();
        assert!(matches!(manager.switch_to(None), Err(ScanError::Switch(_))));
        assert_eq!(manager.state(), SessionState::Idle);
        assert!(manager.session_id().is_none());
        assert!(manager.current_device().is_none());
    }

    #[test]
    fn test_release_is_idempotent() {
        let mut manager = manager_with(&[("a", "Front")]);
        manager.acquire(None).unwrap();

        manager.release();
        assert_eq!(manager.state(), SessionState::Released);
        let transitions_after_first = manager.transitions().len();

        manager.release();
        assert_eq!(manager.state(), SessionState::Released);
        assert_eq!(manager.transitions().len(), transitions_after_first);
    }

    #[test]
    fn test_acquire_after_release() {
        let mut manager = manager_with(&[("a", "Front"), ("b", "Back")]);
        manager.acquire(None).unwrap();
        manager.release();

        manager.acquire(None).unwrap();
        assert_eq!(manager.state(), SessionState::Streaming);
    }

    #[test]
    fn test_sessions_get_fresh_identities() {
        let mut manager = manager_with(&[("a", "Front"), ("b", "Back")]);
        manager.acquire(None).unwrap();
        let first = manager.session_id().unwrap();

        manager.switch_to(None).unwrap();
        let second = manager.session_id().unwrap();
        assert_ne!(first, second);
    }
}
