// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the acquisition and reconstruction pipeline

use std::fmt;

use crate::backends::depth::BackendError;

/// Result type alias using PipelineError
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Pipeline error taxonomy
///
/// None of these reach the consumer as a hard failure: `open` reports
/// `DeviceUnavailable` as `false`, the acquisition loop absorbs
/// `CaptureInterrupted` by exiting, and `BufferSizeMismatch` is repaired by
/// reallocating the buffer in place.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// No device matches the requested serial or index
    DeviceUnavailable(String),
    /// The blocking capture call failed or was released during shutdown
    CaptureInterrupted(String),
    /// A buffer does not match the expected grid dimensions
    BufferSizeMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },
    /// Mesh kernel dispatch failed (GPU unavailable, readback failure)
    Kernel(String),
    /// Configuration could not be read or written
    Config(String),
    /// Snapshot or mesh export failed
    Export(String),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::DeviceUnavailable(msg) => write!(f, "Device unavailable: {}", msg),
            PipelineError::CaptureInterrupted(msg) => write!(f, "Capture interrupted: {}", msg),
            PipelineError::BufferSizeMismatch { expected, actual } => write!(
                f,
                "Buffer size mismatch: expected {}x{}, got {}x{}",
                expected.0, expected.1, actual.0, actual.1
            ),
            PipelineError::Kernel(msg) => write!(f, "Mesh kernel error: {}", msg),
            PipelineError::Config(msg) => write!(f, "Configuration error: {}", msg),
            PipelineError::Export(msg) => write!(f, "Export error: {}", msg),
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<BackendError> for PipelineError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::DeviceNotFound(msg) | BackendError::InitializationFailed(msg) => {
                PipelineError::DeviceUnavailable(msg)
            }
            BackendError::Disconnected(msg) => PipelineError::CaptureInterrupted(msg),
            BackendError::Interrupted => {
                PipelineError::CaptureInterrupted("capture released".to_string())
            }
        }
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::Export(err.to_string())
    }
}
