// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the acquisition pipeline through the sensor facade

use std::sync::Arc;
use std::time::{Duration, Instant};

use depthmesh::backends::depth::synthetic::{SyntheticConfig, SyntheticDriver, SyntheticScene};
use depthmesh::config::{Config, MeshBackend};
use depthmesh::pipelines::acquisition::DepthFrame;
use depthmesh::pipelines::double_buffer::FrameStore;
use depthmesh::sensor::{DepthSensor, DeviceSelector, FrameRequest, MeshHandle, SensorState};

const WIDTH: u32 = 16;
const HEIGHT: u32 = 12;

/// Depth (mm) encoding the capture id, identical for every pixel
fn tagged_depth(capture_id: u64) -> f32 {
    1000.0 + (capture_id % 200) as f32 * 10.0
}

fn tagged_sensor(disconnect_after: Option<u64>) -> DepthSensor {
    let synthetic = SyntheticConfig {
        scene: SyntheticScene::Custom(Arc::new(|id, _, _| tagged_depth(id))),
        disconnect_after,
        ..SyntheticConfig::small(WIDTH, HEIGHT)
    };
    let config = Config {
        mesh_backend: MeshBackend::Cpu,
        raw_depth: true,
        ..Config::default()
    };
    DepthSensor::new(Arc::new(SyntheticDriver::new(synthetic)), &config)
}

fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out");
        std::thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn test_frames_and_point_cloud_share_capture() {
    let mut sensor = tagged_sensor(None);
    assert!(sensor.open(DeviceSelector::Index(0)));

    let mut checked = 0;
    let center = ((HEIGHT / 2) * WIDTH + WIDTH / 2) as usize;
    while checked < 50 {
        if let Some(frames) = sensor.fetch_frames(FrameRequest::all()) {
            let id = frames.capture_id();
            let color = frames.color().unwrap();
            assert_eq!(color.pixel(0, 0)[0], (id & 0xff) as u8);
            match frames.depth().unwrap() {
                DepthFrame::Raw(depth) => assert_eq!(depth.pixel(3, 3)[0], tagged_depth(id)),
                DepthFrame::Visualized(_) => panic!("expected raw depth"),
            }
            checked += 1;
        }

        let cloud = sensor.fetch_point_cloud();
        if !cloud.is_empty() {
            let id = cloud.capture_id();
            let z = cloud.vertices()[center][2];
            assert!((z + tagged_depth(id) / 1000.0).abs() < 1e-5);
            assert_eq!(cloud.colors()[center][0], (id & 0xff) as u8);
        }
        std::thread::sleep(Duration::from_micros(200));
    }

    sensor.close();
}

#[test]
fn test_slow_consumer_sees_one_capture_per_poll() {
    let synthetic = SyntheticConfig {
        scene: SyntheticScene::Custom(Arc::new(|id, _, _| tagged_depth(id))),
        frame_interval: Duration::ZERO,
        ..SyntheticConfig::small(64, 48)
    };
    let mut sensor = DepthSensor::new(
        Arc::new(SyntheticDriver::new(synthetic)),
        &Config {
            mesh_backend: MeshBackend::Cpu,
            ..Config::default()
        },
    );
    assert!(sensor.open(DeviceSelector::Index(0)));

    let mut mesh = MeshHandle::new();
    let mut polls = 0;
    let deadline = Instant::now() + Duration::from_secs(20);
    while polls < 50 {
        assert!(Instant::now() < deadline, "timed out");
        let Some(frames) = sensor.fetch_frames(FrameRequest::all()) else {
            std::thread::sleep(Duration::from_millis(1));
            continue;
        };
        // The loop keeps publishing while the consumer renders
        std::thread::sleep(Duration::from_millis(2));

        let id = frames.capture_id();
        let cloud = sensor.fetch_point_cloud();
        assert_eq!(cloud.capture_id(), id);
        assert_eq!(frames.point_cloud().capture_id(), id);
        assert!((cloud.vertices()[0][2] + tagged_depth(id) / 1000.0).abs() < 1e-5);

        sensor.refresh_mesh(&mut mesh);
        assert_eq!(mesh.capture_id(), id);
        polls += 1;
    }

    sensor.close();
}

#[test]
fn test_no_stale_redelivery() {
    let mut sensor = tagged_sensor(None);
    assert!(sensor.open(DeviceSelector::Index(0)));
    wait_until(|| sensor.is_new_frame_available());

    let first = sensor.fetch_frames(FrameRequest::none()).unwrap();
    sensor.close();

    // Whatever was published after the first fetch is delivered at most once
    if let Some(last) = sensor.fetch_frames(FrameRequest::none()) {
        assert!(last.capture_id() > first.capture_id());
    }
    assert!(sensor.fetch_frames(FrameRequest::none()).is_none());
    assert!(!sensor.is_new_frame_available());
}

#[test]
fn test_latest_wins() {
    let (store, mut back) = FrameStore::<u64>::new();

    *back.get_mut() = 1;
    back.swap();
    *back.get_mut() = 2;
    back.swap();

    assert_eq!(*store.consume().unwrap(), 2);
    assert!(store.consume().is_none());
}

#[test]
fn test_disconnect_keeps_last_frame() {
    let mut sensor = tagged_sensor(Some(3));
    assert!(sensor.open(DeviceSelector::Index(0)));
    wait_until(|| !sensor.is_streaming());

    // Closing is driven by the consumer, not the loop
    assert!(sensor.is_open());
    let cloud = sensor.fetch_point_cloud();
    assert_eq!(cloud.capture_id(), 3);
    assert_eq!(cloud.vertices().len(), (WIDTH * HEIGHT) as usize);

    let mut mesh = MeshHandle::new();
    assert_eq!(
        sensor.refresh_mesh(&mut mesh),
        ((WIDTH - 1) * (HEIGHT - 1) * 6) as usize
    );
    assert_eq!(mesh.capture_id(), 3);

    sensor.close();
    assert_eq!(sensor.state(), &SensorState::Closed);
    assert_eq!(sensor.fetch_point_cloud().capture_id(), 3);
}

#[test]
fn test_reopen_switches_device() {
    let synthetic = SyntheticConfig {
        serials: vec!["B-2".to_string(), "A-1".to_string()],
        ..SyntheticConfig::small(4, 4)
    };
    let mut sensor = DepthSensor::new(
        Arc::new(SyntheticDriver::new(synthetic)),
        &Config {
            mesh_backend: MeshBackend::Cpu,
            ..Config::default()
        },
    );

    // Index follows serial order
    assert!(sensor.open(DeviceSelector::Index(0)));
    assert_eq!(sensor.serial(), Some("A-1"));

    assert!(sensor.open(DeviceSelector::Serial("B-2".to_string())));
    assert_eq!(sensor.serial(), Some("B-2"));

    // An out-of-range index is rejected before the open device is touched
    assert!(!sensor.open(DeviceSelector::Index(2)));
    assert_eq!(sensor.serial(), Some("B-2"));

    // An unknown serial closes the open device first and keeps none of its frames
    assert!(!sensor.open(DeviceSelector::Serial("C-3".to_string())));
    assert_eq!(sensor.state(), &SensorState::Closed);
    assert!(!sensor.is_new_frame_available());
    assert!(sensor.fetch_point_cloud().is_empty());

    sensor.close();
    assert!(!sensor.is_open());
}

#[test]
fn test_distance_window_applies_to_next_frame() {
    let synthetic = SyntheticConfig {
        scene: SyntheticScene::Wall {
            distance_mm: 3250.0,
        },
        ..SyntheticConfig::small(8, 6)
    };
    let mut sensor = DepthSensor::new(
        Arc::new(SyntheticDriver::new(synthetic)),
        &Config {
            mesh_backend: MeshBackend::Cpu,
            ..Config::default()
        },
    );
    assert!(sensor.open(DeviceSelector::Index(0)));
    wait_until(|| sensor.is_new_frame_available());

    let colored = sensor.fetch_frames(FrameRequest::all()).unwrap();
    match colored.depth().unwrap() {
        DepthFrame::Visualized(image) => assert_ne!(&image.pixel(4, 3)[..3], &[0, 0, 0]),
        DepthFrame::Raw(_) => panic!("expected visualized depth"),
    }

    // Wall now sits beyond the far bound
    sensor.settings().set_max_distance(3000.0);

    // Frames already in flight may still use the old window; once the new
    // window shows up, every later frame keeps it
    let mut black_frames = 0;
    let deadline = Instant::now() + Duration::from_secs(10);
    while black_frames < 4 {
        assert!(Instant::now() < deadline, "timed out");
        let Some(frames) = sensor.fetch_frames(FrameRequest::all()) else {
            std::thread::sleep(Duration::from_millis(1));
            continue;
        };
        let DepthFrame::Visualized(image) = frames.depth().unwrap() else {
            panic!("expected visualized depth");
        };
        let black = image.pixel(4, 3) == [0, 0, 0, 255];
        if black_frames > 0 {
            assert!(black, "capture {} reverted to the old window", frames.capture_id());
        }
        if black {
            black_frames += 1;
        }
    }

    sensor.close();
}
