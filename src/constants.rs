// SPDX-License-Identifier: GPL-3.0-only

//! Sensor and pipeline constants

/// Depth/IR grid width of the time-of-flight sensor
pub const DEPTH_WIDTH: u32 = 512;
/// Depth/IR grid height of the time-of-flight sensor
pub const DEPTH_HEIGHT: u32 = 424;

/// Color camera width
pub const COLOR_WIDTH: u32 = 1920;
/// Color camera height
pub const COLOR_HEIGHT: u32 = 1080;

/// Bytes per color pixel (BGRX from the sensor, RGBA after correction)
pub const COLOR_CHANNELS: usize = 4;

/// Maximum raw IR value; dividing by it normalizes IR to [0, 1]
pub const IR_MAX_RAW: f32 = 65535.0;

/// Default near bound of the distance window (millimeters)
pub const DEFAULT_MIN_DISTANCE_MM: f32 = 500.0;
/// Default far bound of the distance window (millimeters)
pub const DEFAULT_MAX_DISTANCE_MM: f32 = 6000.0;
/// Lower limit for either distance bound (millimeters)
pub const DISTANCE_LIMIT_MIN_MM: f32 = 0.0;
/// Upper limit for either distance bound (millimeters)
pub const DISTANCE_LIMIT_MAX_MM: f32 = 12000.0;

/// Hue at the near end of the depth ramp
pub const DEPTH_HUE_NEAR: f32 = 0.0;
/// Hue at the far end of the depth ramp
pub const DEPTH_HUE_FAR: f32 = 0.8;
/// Saturation of the depth ramp
pub const DEPTH_SATURATION: f32 = 0.9;
/// Brightness of the depth ramp
pub const DEPTH_BRIGHTNESS: f32 = 0.9;

/// Neighboring depth samples closer than this are connected by the mesh (millimeters)
pub const DEPTH_DISCONTINUITY_MM: f32 = 100.0;

/// Triangle slots written per interior grid cell
pub const TRIANGLES_PER_CELL: usize = 2;

/// Number of index slots the mesh kernel writes for a `width` x `height` grid
///
/// Always `(width - 1) * (height - 1) * 2` triangles of 3 indices, regardless of
/// the depth content.
pub fn mesh_index_capacity(width: u32, height: u32) -> usize {
    if width < 2 || height < 2 {
        return 0;
    }
    (width as usize - 1) * (height as usize - 1) * TRIANGLES_PER_CELL * 3
}

/// Get the crate version string (crate version plus git hash when available)
pub fn app_version() -> &'static str {
    env!("GIT_VERSION")
}
