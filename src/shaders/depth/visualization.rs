// SPDX-License-Identifier: GPL-3.0-only

//! Depth visualization helpers
//!
//! - Hue ramp: near = red (hue 0.0) through to far = violet (hue 0.8)
//! - Grayscale: bright = near, dark = far
//!
//! Samples at or beyond either end of the distance window render black, which
//! also covers missing depth (0 mm).

use rayon::prelude::*;

use crate::backends::depth::{ColorImage, FloatImage};
use crate::config::{DepthColormap, DistanceWindow};
use crate::constants::{
    COLOR_CHANNELS, DEPTH_BRIGHTNESS, DEPTH_HUE_FAR, DEPTH_HUE_NEAR, DEPTH_SATURATION, IR_MAX_RAW,
};

/// Linearly map `value` from [in_min, in_max] to [out_min, out_max], clamped to the output range
///
/// A degenerate input range maps everything to `out_min`.
#[inline]
pub fn clamp_map(value: f32, in_min: f32, in_max: f32, out_min: f32, out_max: f32) -> f32 {
    if (in_max - in_min).abs() < f32::EPSILON {
        return out_min;
    }
    let out = (value - in_min) / (in_max - in_min) * (out_max - out_min) + out_min;
    if out_max < out_min {
        out.clamp(out_max, out_min)
    } else {
        out.clamp(out_min, out_max)
    }
}

/// Hue of a depth sample on the near→far ramp
#[inline]
pub fn depth_hue(depth_mm: f32, window: DistanceWindow) -> f32 {
    clamp_map(
        depth_mm,
        window.min_mm,
        window.max_mm,
        DEPTH_HUE_NEAR,
        DEPTH_HUE_FAR,
    )
}

/// Convert hue/saturation/brightness (all in [0, 1]) to 8-bit RGB
pub fn hsb_to_rgb(hue: f32, saturation: f32, brightness: f32) -> [u8; 3] {
    let v = brightness.clamp(0.0, 1.0);
    let s = saturation.clamp(0.0, 1.0);
    if s <= 0.0 {
        let gray = (v * 255.0).round() as u8;
        return [gray, gray, gray];
    }

    let h = hue.rem_euclid(1.0) * 6.0;
    let sector = h.floor();
    let f = h - sector;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));

    let (r, g, b) = match sector as u32 {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    };
    [
        (r * 255.0).round() as u8,
        (g * 255.0).round() as u8,
        (b * 255.0).round() as u8,
    ]
}

/// False color for one depth sample; black when the hue saturated at either bound
#[inline]
pub fn depth_to_hue_rgba(depth_mm: f32, window: DistanceWindow) -> [u8; 4] {
    let hue = depth_hue(depth_mm, window);
    if hue <= DEPTH_HUE_NEAR || hue >= DEPTH_HUE_FAR {
        return [0, 0, 0, 255];
    }
    let [r, g, b] = hsb_to_rgb(hue, DEPTH_SATURATION, DEPTH_BRIGHTNESS);
    [r, g, b, 255]
}

/// Grayscale for one depth sample: 255 at the near bound down to 0 at the far bound
///
/// Samples at or nearer than the near bound (including missing depth) are black.
#[inline]
pub fn depth_to_gray(depth_mm: f32, window: DistanceWindow) -> u8 {
    let gray = clamp_map(depth_mm, window.min_mm, window.max_mm, 255.0, 0.0) as u8;
    if gray == 255 { 0 } else { gray }
}

/// Swap the first and third channel of every 4-channel pixel (BGRX <-> RGBX)
pub fn swap_red_blue(data: &mut [u8]) {
    data.par_chunks_exact_mut(COLOR_CHANNELS)
        .for_each(|px| px.swap(0, 2));
}

/// Scale raw IR values to [0, 1]
pub fn normalize_ir(data: &mut [f32]) {
    data.par_iter_mut()
        .for_each(|v| *v = (*v / IR_MAX_RAW).clamp(0.0, 1.0));
}

/// Render a depth frame (millimeters) into an RGBA visualization
///
/// `out` is reallocated if its shape does not match `depth`.
pub fn visualize_depth(
    depth: &FloatImage,
    out: &mut ColorImage,
    window: DistanceWindow,
    colormap: DepthColormap,
) {
    out.ensure_shape(depth.width, depth.height, COLOR_CHANNELS);

    out.data
        .par_chunks_exact_mut(COLOR_CHANNELS)
        .zip(depth.data.par_iter())
        .for_each(|(px, &d)| match colormap {
            DepthColormap::Hue => px.copy_from_slice(&depth_to_hue_rgba(d, window)),
            DepthColormap::Grayscale => {
                let g = depth_to_gray(d, window);
                px.copy_from_slice(&[g, g, g, 255]);
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: DistanceWindow = DistanceWindow {
        min_mm: 500.0,
        max_mm: 6000.0,
    };

    #[test]
    fn test_hue_ramp_endpoints() {
        assert_eq!(depth_hue(500.0, WINDOW), 0.0);
        assert_eq!(depth_hue(6000.0, WINDOW), 0.8);
        assert!((depth_hue(3250.0, WINDOW) - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_saturated_samples_are_black() {
        assert_eq!(depth_to_hue_rgba(500.0, WINDOW), [0, 0, 0, 255]);
        assert_eq!(depth_to_hue_rgba(6000.0, WINDOW), [0, 0, 0, 255]);
        assert_eq!(depth_to_hue_rgba(0.0, WINDOW), [0, 0, 0, 255]);
        assert_eq!(depth_to_hue_rgba(9000.0, WINDOW), [0, 0, 0, 255]);
    }

    #[test]
    fn test_midpoint_is_colored() {
        let px = depth_to_hue_rgba(3250.0, WINDOW);
        assert_ne!(&px[..3], &[0, 0, 0]);
        // Hue 0.4 sits between green and cyan
        assert!(px[1] > px[0] && px[1] > px[2]);
    }

    #[test]
    fn test_hue_monotonic() {
        let mut last = -1.0;
        for d in (500..=6000).step_by(250) {
            let hue = depth_hue(d as f32, WINDOW);
            assert!(hue >= last);
            last = hue;
        }
    }

    #[test]
    fn test_hsb_primaries() {
        assert_eq!(hsb_to_rgb(0.0, 1.0, 1.0), [255, 0, 0]);
        assert_eq!(hsb_to_rgb(1.0 / 3.0, 1.0, 1.0), [0, 255, 0]);
        assert_eq!(hsb_to_rgb(2.0 / 3.0, 1.0, 1.0), [0, 0, 255]);
        assert_eq!(hsb_to_rgb(0.5, 0.0, 1.0), [255, 255, 255]);
    }

    #[test]
    fn test_depth_grayscale() {
        // Nearest bound saturates to black, far end fades to black
        assert_eq!(depth_to_gray(500.0, WINDOW), 0);
        assert_eq!(depth_to_gray(6000.0, WINDOW), 0);
        let near = depth_to_gray(1000.0, WINDOW);
        let far = depth_to_gray(5000.0, WINDOW);
        assert!(near > far);
    }

    #[test]
    fn test_swap_red_blue() {
        let mut data = vec![1, 2, 3, 4, 5, 6, 7, 8];
        swap_red_blue(&mut data);
        assert_eq!(data, vec![3, 2, 1, 4, 7, 6, 5, 8]);
    }

    #[test]
    fn test_normalize_ir() {
        let mut data = vec![0.0, 32767.5, 65535.0, 70000.0];
        normalize_ir(&mut data);
        assert_eq!(data[0], 0.0);
        assert!((data[1] - 0.5).abs() < 1e-6);
        assert_eq!(data[2], 1.0);
        assert_eq!(data[3], 1.0);
    }

    #[test]
    fn test_visualize_depth_reallocates() {
        let depth = FloatImage::from_data(2, 1, 1, vec![0.0, 3250.0]).unwrap();
        let mut out = ColorImage::default();
        visualize_depth(&depth, &mut out, WINDOW, DepthColormap::Hue);
        assert!(out.has_shape(2, 1, 4));
        assert_eq!(out.pixel(0, 0), &[0, 0, 0, 255]);
        assert_ne!(&out.pixel(1, 0)[..3], &[0, 0, 0]);
    }
}
