// SPDX-License-Identifier: GPL-3.0-only

//! Per-pixel frame corrections
//!
//! Channel reordering, IR normalization and depth visualization. Every pixel
//! is independent, so each pass runs data-parallel over the frame.

mod visualization;

pub use visualization::{
    clamp_map, depth_hue, depth_to_gray, depth_to_hue_rgba, hsb_to_rgb, normalize_ir,
    swap_red_blue, visualize_depth,
};
