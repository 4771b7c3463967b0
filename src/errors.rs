// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the scanner

use std::fmt;

use crate::backends::types::CaptureError;

/// Result type alias using ScanError
pub type ScanResult<T> = Result<T, ScanError>;

/// Main scanner error type
///
/// Transient per-cycle failures (a single recognition call, a single switch
/// attempt) are absorbed by the caller and retried on the next cycle.
/// Resource-acquisition failures are surfaced once and require explicit
/// caller action to retry.
#[derive(Debug, Clone)]
pub enum ScanError {
    /// Device enumeration or acquisition was denied before a grant
    PermissionDenied(String),
    /// No usable capture device after exhausting the acquisition retry chain
    CaptureUnavailable(String),
    /// A single recognition call failed
    Recognition(String),
    /// A device switch failed; the manager holds no session afterwards
    Switch(String),
    /// Configuration load/save errors
    Config(String),
    /// Generic error with message
    Other(String),
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanError::PermissionDenied(msg) => write!(f, "Permission denied: {}", msg),
            ScanError::CaptureUnavailable(msg) => write!(f, "Capture unavailable: {}", msg),
            ScanError::Recognition(msg) => write!(f, "Recognition failed: {}", msg),
            ScanError::Switch(msg) => write!(f, "Device switch failed: {}", msg),
            ScanError::Config(msg) => write!(f, "Configuration error: {}", msg),
            ScanError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for ScanError {}

impl From<CaptureError> for ScanError {
    fn from(err: CaptureError) -> Self {
        match err {
            CaptureError::PermissionDenied(msg) => ScanError::PermissionDenied(msg),
            other => ScanError::CaptureUnavailable(other.to_string()),
        }
    }
}

impl From<String> for ScanError {
    fn from(msg: String) -> Self {
        ScanError::Other(msg)
    }
}

impl From<&str> for ScanError {
    fn from(msg: &str) -> Self {
        ScanError::Other(msg.to_string())
    }
}

impl From<std::io::Error> for ScanError {
    fn from(err: std::io::Error) -> Self {
        ScanError::Other(err.to_string())
    }
}
