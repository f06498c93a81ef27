// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for configuration module

use depthmesh::Config;
use depthmesh::config::{DepthColormap, DistanceWindow, MeshBackend};

#[test]
fn test_config_default() {
    let config = Config::default();

    assert_eq!(config.distance.min_mm, 500.0);
    assert_eq!(config.distance.max_mm, 6000.0);
    assert!(!config.raw_depth, "Depth should be visualized by default");
    assert_eq!(config.colormap, DepthColormap::Hue);
    assert_eq!(config.mesh_backend, MeshBackend::Gpu);
    assert_eq!(config.discontinuity_mm, 100.0);
}

#[test]
fn test_config_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.json");

    let config = Config {
        distance: DistanceWindow {
            min_mm: 800.0,
            max_mm: 4000.0,
        },
        colormap: DepthColormap::Grayscale,
        last_serial: Some("SYNTH-000001".to_string()),
        ..Config::default()
    };
    config.save(&path).unwrap();

    assert_eq!(Config::load(&path).unwrap(), config);
}

#[test]
fn test_config_load_clamps_distance() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(
        &path,
        r#"{ "distance": { "min_mm": -50.0, "max_mm": 20000.0 } }"#,
    )
    .unwrap();

    let config = Config::load(&path).unwrap();
    assert_eq!(config.distance.min_mm, 0.0);
    assert_eq!(config.distance.max_mm, 12000.0);
    // Missing fields take their defaults
    assert_eq!(config.discontinuity_mm, 100.0);
}

#[test]
fn test_config_invalid_file_falls_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, "not json").unwrap();

    assert!(Config::load(&path).is_err());
    assert_eq!(Config::load_or_default(&path), Config::default());
    assert_eq!(
        Config::load_or_default(&dir.path().join("missing.json")),
        Config::default()
    );
}
