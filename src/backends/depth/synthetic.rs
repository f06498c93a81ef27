// SPDX-License-Identifier: GPL-3.0-only

//! In-process depth sensor
//!
//! Produces deterministic frame sets without hardware. Every frame is tagged
//! with its capture id: the red channel of the color frame carries the low byte
//! of the id, so anything derived from one capture (aligned color, point colors)
//! can be traced back to it.

use std::fmt;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use tracing::{debug, info};

use super::intrinsics::CameraIntrinsics;
use super::types::*;
use super::{BackendError, BackendResult, DepthDriver, FrameSource, Registration, SourceInterrupt};
use crate::constants::{
    COLOR_CHANNELS, COLOR_HEIGHT, COLOR_WIDTH, DEPTH_HEIGHT, DEPTH_WIDTH, IR_MAX_RAW,
};

/// Depth in millimeters as a function of (capture id, x, y)
pub type DepthFn = Arc<dyn Fn(u64, u32, u32) -> f32 + Send + Sync>;

/// Geometry rendered by the synthetic sensor
#[derive(Clone)]
pub enum SyntheticScene {
    /// Flat wall facing the sensor
    Wall { distance_mm: f32 },
    /// Wall with a box in front of its center third
    Stage { wall_mm: f32, box_mm: f32 },
    /// Depth increasing linearly from left to right
    Ramp { near_mm: f32, far_mm: f32 },
    /// Arbitrary depth function
    Custom(DepthFn),
}

impl fmt::Debug for SyntheticScene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyntheticScene::Wall { distance_mm } => {
                f.debug_struct("Wall").field("distance_mm", distance_mm).finish()
            }
            SyntheticScene::Stage { wall_mm, box_mm } => f
                .debug_struct("Stage")
                .field("wall_mm", wall_mm)
                .field("box_mm", box_mm)
                .finish(),
            SyntheticScene::Ramp { near_mm, far_mm } => f
                .debug_struct("Ramp")
                .field("near_mm", near_mm)
                .field("far_mm", far_mm)
                .finish(),
            SyntheticScene::Custom(_) => f.write_str("Custom"),
        }
    }
}

impl SyntheticScene {
    fn depth_at(&self, capture_id: u64, x: u32, y: u32, width: u32, height: u32) -> f32 {
        match self {
            SyntheticScene::Wall { distance_mm } => *distance_mm,
            SyntheticScene::Stage { wall_mm, box_mm } => {
                let in_box = (width / 3..2 * width / 3).contains(&x)
                    && (height / 3..2 * height / 3).contains(&y);
                if in_box { *box_mm } else { *wall_mm }
            }
            SyntheticScene::Ramp { near_mm, far_mm } => {
                let t = x as f32 / (width.max(2) - 1) as f32;
                near_mm + (far_mm - near_mm) * t
            }
            SyntheticScene::Custom(depth_fn) => depth_fn(capture_id, x, y),
        }
    }
}

/// Configuration of the synthetic sensor
#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    /// Serial numbers of the simulated sensors
    pub serials: Vec<String>,
    pub depth_width: u32,
    pub depth_height: u32,
    pub color_width: u32,
    pub color_height: u32,
    /// Time `capture_next` blocks before delivering a frame
    pub frame_interval: Duration,
    pub scene: SyntheticScene,
    /// Simulate a disconnect once this many frames were delivered
    pub disconnect_after: Option<u64>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            serials: vec!["SYNTH-000001".to_string()],
            depth_width: DEPTH_WIDTH,
            depth_height: DEPTH_HEIGHT,
            color_width: COLOR_WIDTH,
            color_height: COLOR_HEIGHT,
            frame_interval: Duration::from_millis(33),
            scene: SyntheticScene::Stage {
                wall_mm: 3000.0,
                box_mm: 1500.0,
            },
            disconnect_after: None,
        }
    }
}

impl SyntheticConfig {
    /// Small grids for tests: `depth_width` x `depth_height` depth, twice that for color
    pub fn small(depth_width: u32, depth_height: u32) -> Self {
        Self {
            depth_width,
            depth_height,
            color_width: depth_width * 2,
            color_height: depth_height * 2,
            frame_interval: Duration::from_millis(1),
            ..Self::default()
        }
    }
}

/// Driver exposing the configured synthetic sensors
pub struct SyntheticDriver {
    config: SyntheticConfig,
}

impl SyntheticDriver {
    pub fn new(config: SyntheticConfig) -> Self {
        Self { config }
    }
}

impl DepthDriver for SyntheticDriver {
    fn enumerate(&self) -> Vec<DeviceInfo> {
        let devices = self
            .config
            .serials
            .iter()
            .enumerate()
            .map(|(raw_index, serial)| DeviceInfo {
                serial: serial.clone(),
                device_id: raw_index,
                raw_index,
            })
            .collect();
        sort_devices(devices)
    }

    fn open(&self, serial: &str) -> BackendResult<Box<dyn FrameSource>> {
        if !self.config.serials.iter().any(|s| s == serial) {
            return Err(BackendError::DeviceNotFound(serial.to_string()));
        }
        if self.config.depth_width < 2 || self.config.depth_height < 2 {
            return Err(BackendError::InitializationFailed(format!(
                "depth grid {}x{} too small",
                self.config.depth_width, self.config.depth_height
            )));
        }

        info!(serial = %serial, scene = ?self.config.scene, "Opening synthetic depth sensor");
        Ok(Box::new(SyntheticSource::new(serial, self.config.clone())))
    }
}

/// Interrupt flag shared between the source and its interrupt handles
#[derive(Default)]
struct InterruptState {
    interrupted: Mutex<bool>,
    wake: Condvar,
}

struct SyntheticInterrupt(Arc<InterruptState>);

impl SourceInterrupt for SyntheticInterrupt {
    fn interrupt(&self) {
        if let Ok(mut interrupted) = self.0.interrupted.lock() {
            *interrupted = true;
        }
        self.0.wake.notify_all();
    }
}

/// An open synthetic sensor
pub struct SyntheticSource {
    serial: String,
    config: SyntheticConfig,
    next_capture_id: u64,
    delivered: u64,
    interrupt: Arc<InterruptState>,
    registration: SyntheticRegistration,
    closed: bool,
}

impl SyntheticSource {
    fn new(serial: &str, config: SyntheticConfig) -> Self {
        let registration = SyntheticRegistration {
            depth: CameraIntrinsics::depth_for(config.depth_width, config.depth_height),
            color: CameraIntrinsics::color_for(config.color_width, config.color_height),
        };
        Self {
            serial: serial.to_string(),
            config,
            next_capture_id: 1,
            delivered: 0,
            interrupt: Arc::new(InterruptState::default()),
            registration,
            closed: false,
        }
    }

    /// Block for one frame interval; false if interrupted meanwhile
    fn wait_frame_interval(&self) -> bool {
        let Ok(guard) = self.interrupt.interrupted.lock() else {
            return false;
        };
        if self.config.frame_interval.is_zero() {
            return !*guard;
        }
        match self
            .interrupt
            .wake
            .wait_timeout_while(guard, self.config.frame_interval, |interrupted| {
                !*interrupted
            }) {
            Ok((guard, _)) => !*guard,
            Err(_) => false,
        }
    }

    fn render(&self, capture_id: u64) -> RawFrameSet {
        let c = &self.config;
        let (dw, dh) = (c.depth_width, c.depth_height);

        let mut depth = FloatImage::new(dw, dh, 1);
        let mut ir = FloatImage::new(dw, dh, 1);
        for y in 0..dh {
            for x in 0..dw {
                let idx = (y * dw + x) as usize;
                let d = c.scene.depth_at(capture_id, x, y, dw, dh).max(0.0);
                depth.data[idx] = d;
                // Brighter IR return for nearer surfaces
                ir.data[idx] = if d > 0.0 {
                    (IR_MAX_RAW * (1.0 - d / 12000.0)).clamp(0.0, IR_MAX_RAW)
                } else {
                    0.0
                };
            }
        }

        let (cw, ch) = (c.color_width, c.color_height);
        let tag = (capture_id & 0xff) as u8;
        let mut color = ColorImage::new(cw, ch, COLOR_CHANNELS);
        for (i, px) in color.data.chunks_exact_mut(COLOR_CHANNELS).enumerate() {
            let x = i as u32 % cw;
            let y = i as u32 / cw;
            // BGRX
            px[0] = (y * 255 / ch.max(1)) as u8;
            px[1] = (x * 255 / cw.max(1)) as u8;
            px[2] = tag;
            px[3] = 255;
        }

        RawFrameSet {
            capture_id,
            color,
            ir,
            depth,
        }
    }
}

impl FrameSource for SyntheticSource {
    fn serial(&self) -> &str {
        &self.serial
    }

    fn capture_next(&mut self) -> BackendResult<RawFrameSet> {
        if self.closed {
            return Err(BackendError::Disconnected(format!(
                "{} is closed",
                self.serial
            )));
        }
        if self
            .config
            .disconnect_after
            .is_some_and(|limit| self.delivered >= limit)
        {
            debug!(serial = %self.serial, delivered = self.delivered, "Simulating disconnect");
            return Err(BackendError::Disconnected(self.serial.clone()));
        }
        if !self.wait_frame_interval() {
            return Err(BackendError::Interrupted);
        }

        let capture_id = self.next_capture_id;
        self.next_capture_id += 1;
        self.delivered += 1;
        Ok(self.render(capture_id))
    }

    fn registration(&self) -> &dyn Registration {
        &self.registration
    }

    fn interrupter(&self) -> Box<dyn SourceInterrupt> {
        Box::new(SyntheticInterrupt(Arc::clone(&self.interrupt)))
    }

    fn close(&mut self) {
        if !self.closed {
            info!(serial = %self.serial, "Closing synthetic depth sensor");
            self.closed = true;
        }
    }
}

/// Pinhole registration between co-located depth and color cameras
pub struct SyntheticRegistration {
    depth: CameraIntrinsics,
    color: CameraIntrinsics,
}

impl Registration for SyntheticRegistration {
    fn align(
        &self,
        color: &ColorImage,
        depth: &FloatImage,
        undistorted: &mut FloatImage,
        registered: &mut ColorImage,
    ) {
        undistorted.copy_from(depth);
        registered.ensure_shape(depth.width, depth.height, COLOR_CHANNELS);

        for y in 0..depth.height {
            for x in 0..depth.width {
                let idx = (y * depth.width + x) as usize;
                let d = depth.data[idx];
                let start = idx * COLOR_CHANNELS;
                let out = &mut registered.data[start..start + COLOR_CHANNELS];
                if !(d > 0.0) {
                    out.fill(0);
                    continue;
                }
                let point = self.depth.unproject(x as f32, y as f32, d / 1000.0);
                let (u, v) = self.color.project(point);
                if u < 0.0 || v < 0.0 || u >= color.width as f32 || v >= color.height as f32 {
                    out.fill(0);
                    continue;
                }
                out.copy_from_slice(color.pixel(u as u32, v as u32));
            }
        }
    }

    fn unproject(
        &self,
        undistorted: &FloatImage,
        registered: &ColorImage,
        row: u32,
        col: u32,
    ) -> (f32, f32, f32, u32) {
        let px = registered.pixel(col, row);
        let packed = u32::from_le_bytes([px[0], px[1], px[2], px[3]]);

        let d = undistorted.pixel(col, row)[0];
        if !(d > 0.0) {
            return (f32::NAN, f32::NAN, f32::NAN, packed);
        }
        let [x, y, z] = self.depth.unproject(col as f32, row as f32, d / 1000.0);
        (x, y, z, packed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_open_unknown_serial_fails() {
        let driver = SyntheticDriver::new(SyntheticConfig::small(4, 4));
        assert!(matches!(
            driver.open("nope"),
            Err(BackendError::DeviceNotFound(_))
        ));
    }

    #[test]
    fn test_capture_ids_increase() {
        let driver = SyntheticDriver::new(SyntheticConfig::small(4, 4));
        let mut source = driver.open("SYNTH-000001").unwrap();
        let a = source.capture_next().unwrap();
        let b = source.capture_next().unwrap();
        assert_eq!(a.capture_id + 1, b.capture_id);
        assert_eq!(a.color.channels, COLOR_CHANNELS);
        assert_eq!(a.color.pixel(0, 0)[2], a.capture_id as u8);
    }

    #[test]
    fn test_disconnect_after() {
        let config = SyntheticConfig {
            disconnect_after: Some(1),
            ..SyntheticConfig::small(4, 4)
        };
        let mut source = SyntheticDriver::new(config).open("SYNTH-000001").unwrap();
        assert!(source.capture_next().is_ok());
        assert!(matches!(
            source.capture_next(),
            Err(BackendError::Disconnected(_))
        ));
    }

    #[test]
    fn test_interrupt_releases_blocked_capture() {
        let config = SyntheticConfig {
            frame_interval: Duration::from_secs(30),
            ..SyntheticConfig::small(4, 4)
        };
        let mut source = SyntheticDriver::new(config).open("SYNTH-000001").unwrap();
        let interrupter = source.interrupter();

        let handle = thread::spawn(move || source.capture_next());
        thread::sleep(Duration::from_millis(20));
        interrupter.interrupt();

        let result = handle.join().unwrap();
        assert!(matches!(result, Err(BackendError::Interrupted)));
    }

    #[test]
    fn test_unproject_packs_registered_bgrx() {
        let mut source = SyntheticDriver::new(SyntheticConfig::small(8, 6))
            .open("SYNTH-000001")
            .unwrap();
        let frames = source.capture_next().unwrap();
        let reg = source.registration();
        let mut undistorted = FloatImage::default();
        let mut registered = ColorImage::default();
        reg.align(&frames.color, &frames.depth, &mut undistorted, &mut registered);
        assert!(registered.has_shape(8, 6, COLOR_CHANNELS));

        let (_, _, z, packed) = reg.unproject(&undistorted, &registered, 3, 4);
        let bytes = packed.to_le_bytes();
        assert_eq!(&bytes[..], registered.pixel(4, 3));
        assert!((z - undistorted.pixel(4, 3)[0] / 1000.0).abs() < 1e-6);
    }
}
