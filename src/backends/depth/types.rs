// SPDX-License-Identifier: GPL-3.0-only

//! Frame and device types shared by depth frame sources and the pipeline

use tracing::debug;

use crate::errors::PipelineError;

/// Row-major image with interleaved channels
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Image<P> {
    pub width: u32,
    pub height: u32,
    pub channels: usize,
    pub data: Vec<P>,
}

/// 8-bit image, 4 channels (BGRX from the sensor, RGBA once corrected)
pub type ColorImage = Image<u8>;

/// 32-bit float image, 1 channel (IR in raw units or [0, 1], depth in millimeters)
pub type FloatImage = Image<f32>;

impl<P: Copy + Default> Image<P> {
    /// Allocate a zero-filled image
    pub fn new(width: u32, height: u32, channels: usize) -> Self {
        Self {
            width,
            height,
            channels,
            data: vec![P::default(); width as usize * height as usize * channels],
        }
    }

    /// Wrap existing pixel data, returning `None` if the length does not match
    pub fn from_data(width: u32, height: u32, channels: usize, data: Vec<P>) -> Option<Self> {
        if data.len() != width as usize * height as usize * channels {
            return None;
        }
        Some(Self {
            width,
            height,
            channels,
            data,
        })
    }

    /// Whether pixel storage exists
    pub fn is_allocated(&self) -> bool {
        !self.data.is_empty()
    }

    /// Whether the image already has the given shape
    pub fn has_shape(&self, width: u32, height: u32, channels: usize) -> bool {
        self.width == width
            && self.height == height
            && self.channels == channels
            && self.data.len() == width as usize * height as usize * channels
    }

    /// Reallocate in place if the shape differs. Returns true if storage was replaced.
    pub fn ensure_shape(&mut self, width: u32, height: u32, channels: usize) -> bool {
        if self.has_shape(width, height, channels) {
            return false;
        }
        let mismatch = PipelineError::BufferSizeMismatch {
            expected: (width, height),
            actual: (self.width, self.height),
        };
        debug!(
            error = %mismatch,
            channels,
            "Reallocating image buffer"
        );
        *self = Self::new(width, height, channels);
        true
    }

    /// Copy another image into this one, reallocating if the shape differs
    pub fn copy_from(&mut self, other: &Image<P>) {
        self.ensure_shape(other.width, other.height, other.channels);
        self.data.copy_from_slice(&other.data);
    }

    /// Samples of the pixel at (x, y)
    pub fn pixel(&self, x: u32, y: u32) -> &[P] {
        let start = (y as usize * self.width as usize + x as usize) * self.channels;
        &self.data[start..start + self.channels]
    }
}

/// Homogeneous 3D point (x, y, z, w)
pub type Point4 = [f32; 4];

/// RGB color of a point cloud vertex
pub type PointColor = [u8; 3];

/// One synchronized set of raw frames from a single physical capture
#[derive(Debug, Clone, Default)]
pub struct RawFrameSet {
    /// Monotonic capture counter assigned by the frame source
    pub capture_id: u64,
    /// Color frame, 4 channels in BGRX order
    pub color: ColorImage,
    /// IR frame in raw sensor units
    pub ir: FloatImage,
    /// Depth frame in millimeters (0 = no measurement)
    pub depth: FloatImage,
}

/// A depth sensor visible to a driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Sensor serial number
    pub serial: String,
    /// Stable index (position after sorting by serial)
    pub device_id: usize,
    /// Index assigned by the driver; depends on plug-in order
    pub raw_index: usize,
}

/// Sort devices by serial and assign stable device ids
///
/// Raw driver indices follow USB enumeration order, so the same sensor can move
/// around between runs. Sorting by serial keeps `device_id` stable.
pub fn sort_devices(mut devices: Vec<DeviceInfo>) -> Vec<DeviceInfo> {
    devices.sort_by(|a, b| a.serial.cmp(&b.serial));
    for (id, device) in devices.iter_mut().enumerate() {
        device.device_id = id;
    }
    devices
}
