// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for constants module

use depthmesh::constants::*;

#[test]
fn test_mesh_capacity_full_grid() {
    // 511 x 423 cells, two triangles of three indices each
    assert_eq!(
        mesh_index_capacity(DEPTH_WIDTH, DEPTH_HEIGHT),
        511 * 423 * 6
    );
}

#[test]
fn test_mesh_capacity_degenerate_grids() {
    assert_eq!(mesh_index_capacity(0, 0), 0);
    assert_eq!(mesh_index_capacity(1, 100), 0);
    assert_eq!(mesh_index_capacity(100, 1), 0);
    assert_eq!(mesh_index_capacity(2, 2), 6);
}

#[test]
fn test_distance_defaults_within_limits() {
    assert!(DISTANCE_LIMIT_MIN_MM <= DEFAULT_MIN_DISTANCE_MM);
    assert!(DEFAULT_MIN_DISTANCE_MM < DEFAULT_MAX_DISTANCE_MM);
    assert!(DEFAULT_MAX_DISTANCE_MM <= DISTANCE_LIMIT_MAX_MM);
}

#[test]
fn test_hue_ramp_bounds() {
    assert!(DEPTH_HUE_NEAR < DEPTH_HUE_FAR);
    assert!(DEPTH_HUE_FAR < 1.0, "Far hue must not wrap back to red");
}

#[test]
fn test_app_version_not_empty() {
    assert!(!app_version().is_empty());
}
