// SPDX-License-Identifier: GPL-3.0-only

//! Depth sensor frame sources
//!
//! The sensor runtime (USB transport, decoding, calibration) lives behind three
//! traits:
//!
//! - [`DepthDriver`]: device enumeration and opening
//! - [`FrameSource`]: blocking capture of synchronized color/IR/depth frames
//! - [`Registration`]: depth-to-color alignment and per-pixel unprojection
//!
//! [`synthetic`] provides an in-process implementation used by the CLI and tests.

pub mod frame_loop;
pub mod intrinsics;
pub mod synthetic;
pub mod types;

pub use frame_loop::{CaptureLoopController, LoopAction};
pub use types::*;

/// Result type for frame source operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Error types for frame source operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// No device with the requested serial
    DeviceNotFound(String),
    /// The device exists but could not be started
    InitializationFailed(String),
    /// The device went away during capture
    Disconnected(String),
    /// A blocking capture was released by [`SourceInterrupt::interrupt`]
    Interrupted,
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::DeviceNotFound(msg) => write!(f, "Device not found: {}", msg),
            BackendError::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            BackendError::Disconnected(msg) => write!(f, "Device disconnected: {}", msg),
            BackendError::Interrupted => write!(f, "Capture interrupted"),
        }
    }
}

impl std::error::Error for BackendError {}

/// Entry point of a sensor runtime
pub trait DepthDriver: Send + Sync {
    /// List connected sensors, sorted by serial (see [`sort_devices`])
    fn enumerate(&self) -> Vec<DeviceInfo>;

    /// Open and start streaming from the sensor with the given serial
    fn open(&self, serial: &str) -> BackendResult<Box<dyn FrameSource>>;
}

/// An open sensor streaming synchronized frames
pub trait FrameSource: Send {
    /// Serial number of the open sensor
    fn serial(&self) -> &str;

    /// Block until the next synchronized frame set is available
    ///
    /// Returns `Err` when the device disconnects or the call is released through
    /// the handle returned by [`FrameSource::interrupter`].
    fn capture_next(&mut self) -> BackendResult<RawFrameSet>;

    /// Geometric registration for this sensor's calibration
    fn registration(&self) -> &dyn Registration;

    /// Handle that releases a blocked [`FrameSource::capture_next`] from another thread
    fn interrupter(&self) -> Box<dyn SourceInterrupt>;

    /// Stop streaming and release the device
    fn close(&mut self);
}

/// Releases a blocking capture call
pub trait SourceInterrupt: Send + Sync {
    fn interrupt(&self);
}

/// Depth-to-color registration supplied by the sensor runtime
pub trait Registration: Send + Sync {
    /// Undistort `depth` and map `color` into the depth camera's projection
    ///
    /// `undistorted` receives depth in millimeters, `registered` receives one
    /// BGRX color per depth pixel. Both are reallocated if their shape differs.
    fn align(
        &self,
        color: &ColorImage,
        depth: &FloatImage,
        undistorted: &mut FloatImage,
        registered: &mut ColorImage,
    );

    /// Unproject depth pixel (row, col) to a 3D point in meters plus its packed color
    ///
    /// The color is the registered BGRX pixel packed little-endian into a u32
    /// (blue in the low byte). Pixels without depth yield NaN coordinates.
    fn unproject(
        &self,
        undistorted: &FloatImage,
        registered: &ColorImage,
        row: u32,
        col: u32,
    ) -> (f32, f32, f32, u32);
}
