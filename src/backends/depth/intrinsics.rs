// SPDX-License-Identifier: GPL-3.0-only

//! Default time-of-flight sensor intrinsics
//!
//! Factory defaults for the depth (IR) and color cameras. Real devices report
//! their own calibration through the sensor runtime; these values drive the
//! synthetic frame source and any grid that is not the native resolution.

use crate::constants::{COLOR_HEIGHT, COLOR_WIDTH, DEPTH_HEIGHT, DEPTH_WIDTH};

/// Pinhole camera parameters in pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraIntrinsics {
    pub fx: f32,
    pub fy: f32,
    pub cx: f32,
    pub cy: f32,
}

/// Depth camera at 512x424
pub const DEPTH_INTRINSICS: CameraIntrinsics = CameraIntrinsics {
    fx: 365.456,
    fy: 365.456,
    cx: 254.878,
    cy: 205.395,
};

/// Color camera at 1920x1080
pub const COLOR_INTRINSICS: CameraIntrinsics = CameraIntrinsics {
    fx: 1081.372,
    fy: 1081.372,
    cx: 959.5,
    cy: 539.5,
};

impl CameraIntrinsics {
    /// Scale intrinsics calibrated at `base` resolution to `width` x `height`
    pub fn scaled(&self, base: (u32, u32), width: u32, height: u32) -> Self {
        let sx = width as f32 / base.0 as f32;
        let sy = height as f32 / base.1 as f32;
        Self {
            fx: self.fx * sx,
            fy: self.fy * sy,
            cx: self.cx * sx,
            cy: self.cy * sy,
        }
    }

    /// Depth intrinsics for a `width` x `height` depth grid
    pub fn depth_for(width: u32, height: u32) -> Self {
        DEPTH_INTRINSICS.scaled((DEPTH_WIDTH, DEPTH_HEIGHT), width, height)
    }

    /// Color intrinsics for a `width` x `height` color frame
    pub fn color_for(width: u32, height: u32) -> Self {
        COLOR_INTRINSICS.scaled((COLOR_WIDTH, COLOR_HEIGHT), width, height)
    }

    /// Unproject pixel (x, y) at `depth_m` meters to camera space
    #[inline]
    pub fn unproject(&self, x: f32, y: f32, depth_m: f32) -> [f32; 3] {
        [
            (x + 0.5 - self.cx) * depth_m / self.fx,
            (y + 0.5 - self.cy) * depth_m / self.fy,
            depth_m,
        ]
    }

    /// Project a camera-space point to pixel coordinates
    #[inline]
    pub fn project(&self, point: [f32; 3]) -> (f32, f32) {
        (
            point[0] * self.fx / point[2] + self.cx,
            point[1] * self.fy / point[2] + self.cy,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_resolution_is_unscaled() {
        assert_eq!(CameraIntrinsics::depth_for(512, 424), DEPTH_INTRINSICS);
    }

    #[test]
    fn test_project_inverts_unproject() {
        let k = DEPTH_INTRINSICS;
        let p = k.unproject(100.0, 200.0, 2.0);
        let (u, v) = k.project(p);
        assert!((u - 100.5).abs() < 1e-3);
        assert!((v - 200.5).abs() < 1e-3);
    }
}
