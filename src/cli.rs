// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for depth sensor operations
//!
//! This module provides command-line functionality for:
//! - Listing connected sensors
//! - Streaming with live mesh rebuilds
//! - Saving frame and mesh snapshots

use chrono::Local;
use clap::Args;
use depthmesh::backends::depth::DepthDriver;
use depthmesh::backends::depth::synthetic::{SyntheticConfig, SyntheticDriver};
use depthmesh::config::{Config, DepthColormap, MeshBackend};
use depthmesh::pipelines::export;
use depthmesh::sensor::{DepthSensor, DeviceSelector, FrameRequest, MeshHandle};
use depthmesh::shaders::mesh::live_triangles;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::warn;

/// Command line overrides of the stored configuration
#[derive(Args, Debug, Default)]
pub struct Overrides {
    /// Near bound of the depth visualization (millimeters)
    #[arg(long, global = true)]
    min_distance: Option<f32>,

    /// Far bound of the depth visualization (millimeters)
    #[arg(long, global = true)]
    max_distance: Option<f32>,

    /// Deliver raw depth instead of a false-color visualization
    #[arg(long, global = true)]
    raw_depth: bool,

    /// Grayscale depth visualization instead of the hue ramp
    #[arg(long, global = true)]
    grayscale: bool,

    /// Run the mesh kernel on the CPU
    #[arg(long, global = true)]
    cpu: bool,
}

/// Resolved configuration plus where it came from
pub struct Session {
    config: Config,
    path: Option<PathBuf>,
    driver: Arc<dyn DepthDriver>,
}

impl Session {
    pub fn load(path: Option<PathBuf>, overrides: &Overrides) -> Self {
        let path = path.or_else(Config::default_path);
        let mut config = match &path {
            Some(path) => Config::load_or_default(path),
            None => Config::default(),
        };

        let mut distance = config.distance;
        if let Some(min_mm) = overrides.min_distance {
            distance.min_mm = min_mm;
        }
        if let Some(max_mm) = overrides.max_distance {
            distance.max_mm = max_mm;
        }
        config.distance = distance.clamped();
        config.raw_depth |= overrides.raw_depth;
        if overrides.grayscale {
            config.colormap = DepthColormap::Grayscale;
        }
        if overrides.cpu {
            config.mesh_backend = MeshBackend::Cpu;
        }

        Self {
            config,
            path,
            // No hardware runtime is linked in; the synthetic sensor stands in for it
            driver: Arc::new(SyntheticDriver::new(SyntheticConfig::default())),
        }
    }

    /// Open the selected device, remembering its serial in the config file
    fn open(&mut self, device: Option<String>) -> Result<DepthSensor, Box<dyn std::error::Error>> {
        let selector = match device {
            Some(device) => match device.parse::<usize>() {
                Ok(index) => DeviceSelector::Index(index),
                Err(_) => DeviceSelector::Serial(device),
            },
            None => match &self.config.last_serial {
                Some(serial) if self.driver.enumerate().iter().any(|d| &d.serial == serial) => {
                    DeviceSelector::Serial(serial.clone())
                }
                _ => DeviceSelector::Index(0),
            },
        };

        let mut sensor = DepthSensor::new(Arc::clone(&self.driver), &self.config);
        if !sensor.open(selector.clone()) {
            return Err(format!("Failed to open depth sensor {:?}", selector).into());
        }

        let serial = sensor.serial().map(str::to_string);
        println!("Using sensor: {}", serial.as_deref().unwrap_or("?"));
        if serial != self.config.last_serial {
            self.config.last_serial = serial;
            if let Some(path) = &self.path
                && let Err(e) = self.config.save(path)
            {
                warn!(error = %e, "Failed to save config");
            }
        }

        Ok(sensor)
    }
}

/// List all connected depth sensors
pub fn list_devices(session: &Session) -> Result<(), Box<dyn std::error::Error>> {
    let devices = session.driver.enumerate();

    if devices.is_empty() {
        println!("No depth sensors found.");
        return Ok(());
    }

    println!("Available depth sensors:");
    println!();
    for device in &devices {
        println!("  [{}] {}", device.device_id, device.serial);
    }

    Ok(())
}

/// Stream frames, rebuilding the mesh for every new one
pub fn stream(
    mut session: Session,
    device: Option<String>,
    frames: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut sensor = session.open(device)?;

    // Set up Ctrl+C handler
    let stop_flag = Arc::new(AtomicBool::new(false));
    let stop_flag_clone = Arc::clone(&stop_flag);
    ctrlc::set_handler(move || {
        stop_flag_clone.store(true, Ordering::SeqCst);
    })?;

    println!("Streaming... (press Ctrl+C to stop)");

    let mut mesh = MeshHandle::new();
    let mut received = 0u64;
    let start = Instant::now();

    while !stop_flag.load(Ordering::SeqCst) {
        if frames.is_some_and(|limit| received >= limit) {
            break;
        }
        if !sensor.is_streaming() && !sensor.is_new_frame_available() {
            println!();
            println!("Sensor stopped delivering frames");
            break;
        }

        let Some(snapshot) = sensor.fetch_frames(FrameRequest::none()) else {
            std::thread::sleep(Duration::from_millis(2));
            continue;
        };
        received += 1;

        let index_count = sensor.refresh_mesh(&mut mesh);
        let triangles = live_triangles(mesh.indices()).count();
        let fps = received as f64 / start.elapsed().as_secs_f64().max(f64::EPSILON);

        print!(
            "\rframe {:>6}  capture {:>6}  indices {:>8}  triangles {:>7}  {:>5.1} fps",
            received,
            snapshot.capture_id(),
            index_count,
            triangles,
            fps
        );
        std::io::Write::flush(&mut std::io::stdout())?;
    }
    println!();

    sensor.close();
    println!("Received {} frames", received);
    Ok(())
}

/// Save one capture to a timestamped directory
pub fn snapshot(
    mut session: Session,
    device: Option<String>,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut sensor = session.open(device)?;

    let deadline = Instant::now() + Duration::from_secs(5);
    let frames = loop {
        if let Some(frames) = sensor.fetch_frames(FrameRequest::all()) {
            break frames;
        }
        if Instant::now() > deadline || !sensor.is_streaming() {
            return Err("No frame received from depth sensor".into());
        }
        std::thread::sleep(Duration::from_millis(5));
    };

    // Built from the capture `fetch_frames` just delivered
    let mut mesh = MeshHandle::new();
    sensor.refresh_mesh(&mut mesh);
    sensor.close();

    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let dir = output
        .unwrap_or_else(get_default_snapshot_dir)
        .join(format!("snapshot_{}", timestamp));
    std::fs::create_dir_all(&dir)?;

    if let Some(color) = frames.color() {
        export::save_rgba_png(color, &dir.join("color.png"))?;
    }
    if let Some(ir) = frames.ir() {
        export::save_ir_png(ir, &dir.join("ir.png"))?;
    }
    if let Some(depth) = frames.depth() {
        export::save_depth_png(depth, &dir.join("depth.png"))?;
    }
    if let Some(aligned) = frames.aligned() {
        export::save_rgba_png(aligned, &dir.join("aligned.png"))?;
    }

    match export::export_mesh_glb(
        mesh.vertices(),
        mesh.colors(),
        mesh.indices(),
        &dir.join("mesh.glb"),
    ) {
        Ok(stats) => println!(
            "Mesh: {} vertices, {} triangles",
            stats.vertex_count, stats.triangle_count
        ),
        Err(e) => warn!(error = %e, "Mesh not exported"),
    }

    println!("Snapshot saved: {}", dir.display());
    Ok(())
}

/// Default folder name for snapshots
const DEFAULT_SAVE_FOLDER: &str = "depthmesh";

/// Get default snapshot directory
fn get_default_snapshot_dir() -> PathBuf {
    dirs::picture_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
        .join(DEFAULT_SAVE_FOLDER)
}
