// SPDX-License-Identifier: GPL-3.0-only

//! depthmesh - depth camera capture, point cloud reconstruction and mesh triangulation
//!
//! A background acquisition loop pulls synchronized color/IR/depth frames from
//! a depth sensor, corrects them, reconstructs a colored point cloud and
//! publishes everything through a double buffer. Consumers poll the
//! [`sensor::DepthSensor`] facade once per display frame and triangulate the
//! depth grid on demand.
//!
//! # Architecture
//!
//! - [`backends`]: frame source traits, thread lifecycle, synthetic sensor
//! - [`pipelines`]: double buffer, acquisition loop, point cloud, export
//! - [`shaders`]: per-pixel corrections and the mesh triangulation kernel
//! - [`sensor`]: consumer facade
//! - [`config`]: user configuration and live depth settings
//!
//! # Example
//!
//! ```ignore
//! let driver = Arc::new(SyntheticDriver::new(SyntheticConfig::default()));
//! let mut sensor = DepthSensor::new(driver, &Config::default());
//! sensor.open(DeviceSelector::Index(0));
//! let mut mesh = MeshHandle::new();
//! if let Some(frames) = sensor.fetch_frames(FrameRequest::all()) {
//!     let index_count = sensor.refresh_mesh(&mut mesh);
//! }
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
#[cfg(feature = "gpu")]
pub mod gpu;
pub mod pipelines;
pub mod sensor;
pub mod shaders;

// Re-export commonly used types
pub use config::{Config, DepthSettings};
pub use errors::{PipelineError, PipelineResult};
pub use sensor::{DepthSensor, DeviceSelector, FrameRequest, FrameSnapshot, MeshHandle};
