// SPDX-License-Identifier: GPL-3.0-only

//! Acquisition loop: raw frame sets in, published frames + point cloud out
//!
//! Each iteration blocks on the frame source, registers depth onto color,
//! applies the per-pixel corrections, reconstructs the point cloud into the
//! back buffer and publishes it with a single swap.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use super::double_buffer::{BackBuffer, FrontView};
use super::point_cloud::{PointCloud, reconstruct};
use crate::backends::depth::{
    BackendError, ColorImage, FloatImage, FrameSource, LoopAction, RawFrameSet, Registration,
};
use crate::config::DepthSettings;
use crate::shaders::depth::{normalize_ir, swap_red_blue, visualize_depth};

/// Depth frame as delivered to consumers
#[derive(Debug, Clone, PartialEq)]
pub enum DepthFrame {
    /// Millimeters, one f32 per pixel
    Raw(FloatImage),
    /// RGBA false color
    Visualized(ColorImage),
}

impl Default for DepthFrame {
    fn default() -> Self {
        DepthFrame::Raw(FloatImage::default())
    }
}

impl DepthFrame {
    /// Switch to raw storage (if needed) and return it
    fn raw_mut(&mut self) -> &mut FloatImage {
        if !matches!(self, DepthFrame::Raw(_)) {
            *self = DepthFrame::Raw(FloatImage::default());
        }
        match self {
            DepthFrame::Raw(image) => image,
            DepthFrame::Visualized(_) => unreachable!("depth frame switched to raw above"),
        }
    }

    /// Switch to visualized storage (if needed) and return it
    fn visualized_mut(&mut self) -> &mut ColorImage {
        if !matches!(self, DepthFrame::Visualized(_)) {
            *self = DepthFrame::Visualized(ColorImage::default());
        }
        match self {
            DepthFrame::Visualized(image) => image,
            DepthFrame::Raw(_) => unreachable!("depth frame switched to visualized above"),
        }
    }

    pub fn width(&self) -> u32 {
        match self {
            DepthFrame::Raw(image) => image.width,
            DepthFrame::Visualized(image) => image.width,
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            DepthFrame::Raw(image) => image.height,
            DepthFrame::Visualized(image) => image.height,
        }
    }

    pub fn is_allocated(&self) -> bool {
        match self {
            DepthFrame::Raw(image) => image.is_allocated(),
            DepthFrame::Visualized(image) => image.is_allocated(),
        }
    }
}

/// Corrected frames of one capture
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessedFrameSet {
    /// RGBA color frame
    pub color: ColorImage,
    /// IR normalized to [0, 1]
    pub ir: FloatImage,
    /// Raw or visualized depth
    pub depth: DepthFrame,
    /// RGBA color registered into the depth projection
    pub aligned: ColorImage,
}

/// Everything published by one swap
///
/// Frames and point cloud travel through the double buffer together, so a
/// consumer can never pair frames of one capture with points of another.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaptureFrame {
    /// Capture id from the frame source (0 = nothing captured yet)
    pub capture_id: u64,
    pub frames: ProcessedFrameSet,
    pub cloud: PointCloud,
}

/// Per-iteration processing state owned by the acquisition thread
pub struct Acquisition {
    back: BackBuffer<CaptureFrame>,
    settings: Arc<DepthSettings>,
    undistorted: FloatImage,
    registered: ColorImage,
    last_publish: Option<Instant>,
}

impl Acquisition {
    pub fn new(back: BackBuffer<CaptureFrame>, settings: Arc<DepthSettings>) -> Self {
        Self {
            back,
            settings,
            undistorted: FloatImage::default(),
            registered: ColorImage::default(),
            last_publish: None,
        }
    }

    /// Process one raw frame set into the back buffer and publish it
    pub fn process(
        &mut self,
        raw: &RawFrameSet,
        registration: &dyn Registration,
    ) -> FrontView<CaptureFrame> {
        // Window and toggles are sampled once so the whole frame is consistent
        let window = self.settings.distance_window();
        let raw_depth = self.settings.is_raw_depth();
        let colormap = self.settings.colormap();

        registration.align(
            &raw.color,
            &raw.depth,
            &mut self.undistorted,
            &mut self.registered,
        );

        let frame = self.back.get_mut();
        frame.capture_id = raw.capture_id;

        let frames = &mut frame.frames;
        frames.color.copy_from(&raw.color);
        swap_red_blue(&mut frames.color.data);

        frames.aligned.copy_from(&self.registered);
        swap_red_blue(&mut frames.aligned.data);

        frames.ir.copy_from(&raw.ir);
        normalize_ir(&mut frames.ir.data);

        if raw_depth {
            frames.depth.raw_mut().copy_from(&raw.depth);
        } else {
            visualize_depth(&raw.depth, frames.depth.visualized_mut(), window, colormap);
        }

        reconstruct(
            registration,
            &self.undistorted,
            &self.registered,
            &mut frame.cloud,
        );

        let view = self.back.swap();

        let now = Instant::now();
        if let Some(last) = self.last_publish {
            debug!(
                capture_id = raw.capture_id,
                frame_ms = now.duration_since(last).as_secs_f32() * 1000.0,
                "Published frame"
            );
        }
        self.last_publish = Some(now);

        view
    }
}

/// State moved onto the acquisition thread: the open source and its processor
pub struct AcquisitionState {
    pub source: Box<dyn FrameSource>,
    pub acquisition: Acquisition,
}

impl AcquisitionState {
    /// One loop iteration: capture, process, publish
    ///
    /// A failed capture ends the loop; the store keeps its last good frame.
    pub fn step(&mut self) -> LoopAction {
        match self.source.capture_next() {
            Ok(raw) => {
                self.acquisition.process(&raw, self.source.registration());
                LoopAction::Continue
            }
            Err(BackendError::Interrupted) => {
                debug!(serial = %self.source.serial(), "Capture released, stopping acquisition");
                LoopAction::Stop
            }
            Err(e) => {
                warn!(
                    serial = %self.source.serial(),
                    error = %e,
                    "Capture failed, stopping acquisition"
                );
                LoopAction::Stop
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::depth::DepthDriver;
    use crate::backends::depth::synthetic::{SyntheticConfig, SyntheticDriver, SyntheticScene};
    use crate::config::Config;
    use crate::pipelines::double_buffer::FrameStore;

    fn open_source(config: SyntheticConfig) -> Box<dyn FrameSource> {
        SyntheticDriver::new(config).open("SYNTH-000001").unwrap()
    }

    #[test]
    fn test_process_publishes_corrected_frames() {
        let mut source = open_source(SyntheticConfig {
            scene: SyntheticScene::Wall {
                distance_mm: 3250.0,
            },
            ..SyntheticConfig::small(8, 6)
        });
        let (store, back) = FrameStore::new();
        let mut acquisition = Acquisition::new(back, Arc::new(DepthSettings::default()));

        let raw = source.capture_next().unwrap();
        acquisition.process(&raw, source.registration());

        let frame = store.consume().unwrap();
        assert_eq!(frame.capture_id, raw.capture_id);

        // BGRX -> RGBX
        assert_eq!(frame.frames.color.pixel(0, 0)[0], raw.color.pixel(0, 0)[2]);
        assert_eq!(frame.frames.color.pixel(0, 0)[2], raw.color.pixel(0, 0)[0]);

        assert!(frame.frames.ir.data.iter().all(|v| (0.0..=1.0).contains(v)));

        match &frame.frames.depth {
            DepthFrame::Visualized(image) => assert_ne!(&image.pixel(3, 3)[..3], &[0, 0, 0]),
            DepthFrame::Raw(_) => panic!("expected visualized depth"),
        }

        let (point, _) = frame.cloud.point(3, 3);
        assert!((point[2] + 3.25).abs() < 1e-4);
        assert_eq!(point[3], 1.0);
    }

    #[test]
    fn test_raw_depth_toggle() {
        let mut source = open_source(SyntheticConfig::small(8, 6));
        let (store, back) = FrameStore::new();
        let settings = Arc::new(DepthSettings::from_config(&Config {
            raw_depth: true,
            ..Config::default()
        }));
        let mut acquisition = Acquisition::new(back, Arc::clone(&settings));

        let raw = source.capture_next().unwrap();
        acquisition.process(&raw, source.registration());
        match &store.consume().unwrap().frames.depth {
            DepthFrame::Raw(image) => assert_eq!(image, &raw.depth),
            DepthFrame::Visualized(_) => panic!("expected raw depth"),
        }

        // Toggle applies to the next frame
        settings.set_raw_depth(false);
        let raw = source.capture_next().unwrap();
        acquisition.process(&raw, source.registration());
        assert!(matches!(
            store.consume().unwrap().frames.depth,
            DepthFrame::Visualized(_)
        ));
    }

    #[test]
    fn test_step_stops_on_disconnect() {
        let source = open_source(SyntheticConfig {
            disconnect_after: Some(2),
            ..SyntheticConfig::small(4, 4)
        });
        let (store, back) = FrameStore::new();
        let mut state = AcquisitionState {
            source,
            acquisition: Acquisition::new(back, Arc::new(DepthSettings::default())),
        };

        assert_eq!(state.step(), LoopAction::Continue);
        assert_eq!(state.step(), LoopAction::Continue);
        assert_eq!(state.step(), LoopAction::Stop);

        // Last good frame survives the failure
        assert_eq!(store.front().capture_id, 2);
    }
}
