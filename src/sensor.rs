// SPDX-License-Identifier: GPL-3.0-only

//! Consumer facade over one depth sensor
//!
//! Polled from the render thread once per display frame. Opening starts the
//! acquisition thread; everything the facade hands out is a read-only view of
//! the most recently published buffer.

use std::fmt;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::backends::depth::{
    CaptureLoopController, ColorImage, DepthDriver, DeviceInfo, FloatImage, Point4, PointColor,
    SourceInterrupt,
};
use crate::config::{Config, DepthSettings, MeshBackend};
use crate::errors::PipelineError;
use crate::pipelines::acquisition::{Acquisition, AcquisitionState, CaptureFrame, DepthFrame};
use crate::pipelines::double_buffer::{FrameStore, FrontView};
use crate::shaders::gpu_processor::CachedDimensions;
use crate::shaders::mesh::{CpuTriangulator, TriangulationKernel, create_kernel};

/// Which device to open
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceSelector {
    /// Exact serial number
    Serial(String),
    /// Position in the serial-sorted device list
    Index(usize),
}

/// Device lifecycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SensorState {
    #[default]
    Closed,
    Opening,
    Open {
        serial: String,
    },
    Closing,
}

impl fmt::Display for SensorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorState::Closed => write!(f, "closed"),
            SensorState::Opening => write!(f, "opening"),
            SensorState::Open { serial } => write!(f, "open ({})", serial),
            SensorState::Closing => write!(f, "closing"),
        }
    }
}

/// Frame kinds wanted by [`DepthSensor::fetch_frames`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRequest {
    pub color: bool,
    pub ir: bool,
    pub depth: bool,
    pub aligned: bool,
}

impl Default for FrameRequest {
    fn default() -> Self {
        Self::all()
    }
}

impl FrameRequest {
    pub fn all() -> Self {
        Self {
            color: true,
            ir: true,
            depth: true,
            aligned: true,
        }
    }

    pub fn none() -> Self {
        Self {
            color: false,
            ir: false,
            depth: false,
            aligned: false,
        }
    }
}

/// Requested frames of one published capture
///
/// A frame kind is `None` when it was not requested or nothing has been
/// captured into it yet.
#[derive(Clone)]
pub struct FrameSnapshot {
    frame: FrontView<CaptureFrame>,
    request: FrameRequest,
}

impl FrameSnapshot {
    pub fn capture_id(&self) -> u64 {
        self.frame.capture_id
    }

    pub fn color(&self) -> Option<&ColorImage> {
        let color = &self.frame.frames.color;
        (self.request.color && color.is_allocated()).then_some(color)
    }

    pub fn ir(&self) -> Option<&FloatImage> {
        let ir = &self.frame.frames.ir;
        (self.request.ir && ir.is_allocated()).then_some(ir)
    }

    pub fn depth(&self) -> Option<&DepthFrame> {
        let depth = &self.frame.frames.depth;
        (self.request.depth && depth.is_allocated()).then_some(depth)
    }

    pub fn aligned(&self) -> Option<&ColorImage> {
        let aligned = &self.frame.frames.aligned;
        (self.request.aligned && aligned.is_allocated()).then_some(aligned)
    }

    /// Point cloud reconstructed from the same capture as these frames
    pub fn point_cloud(&self) -> PointCloudView {
        PointCloudView {
            frame: self.frame.clone(),
        }
    }
}

/// Read-only view of the current point cloud
#[derive(Clone)]
pub struct PointCloudView {
    frame: FrontView<CaptureFrame>,
}

impl PointCloudView {
    pub fn capture_id(&self) -> u64 {
        self.frame.capture_id
    }

    pub fn width(&self) -> u32 {
        self.frame.cloud.width
    }

    pub fn height(&self) -> u32 {
        self.frame.cloud.height
    }

    pub fn vertices(&self) -> &[Point4] {
        &self.frame.cloud.vertices
    }

    pub fn colors(&self) -> &[PointColor] {
        &self.frame.cloud.colors
    }

    pub fn is_empty(&self) -> bool {
        self.frame.cloud.is_empty()
    }
}

/// Caller-owned mesh buffers refreshed by [`DepthSensor::refresh_mesh`]
///
/// Storage is sized on the first refresh and whenever the depth grid changes;
/// every other refresh only overwrites contents.
#[derive(Debug, Default)]
pub struct MeshHandle {
    dims: CachedDimensions,
    vertices: Vec<Point4>,
    colors: Vec<PointColor>,
    indices: Vec<u32>,
    index_count: usize,
    capture_id: u64,
    allocations: u32,
}

impl MeshHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn width(&self) -> u32 {
        self.dims.width
    }

    pub fn height(&self) -> u32 {
        self.dims.height
    }

    pub fn vertices(&self) -> &[Point4] {
        &self.vertices
    }

    pub fn colors(&self) -> &[PointColor] {
        &self.colors
    }

    /// Index slots, including degenerate (0, 0, 0) padding
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Index count reported by the last refresh
    pub fn index_count(&self) -> usize {
        self.index_count
    }

    /// Capture the mesh was last built from (0 = never built)
    pub fn capture_id(&self) -> u64 {
        self.capture_id
    }

    /// How many times storage was (re)allocated
    pub fn allocation_count(&self) -> u32 {
        self.allocations
    }

    fn ensure_storage(&mut self, width: u32, height: u32) {
        if self.dims.is_initialized() && !self.dims.needs_update(width, height) {
            return;
        }
        let pixels = width as usize * height as usize;
        self.vertices = vec![[0.0; 4]; pixels];
        self.colors = vec![[0; 3]; pixels];
        self.indices = Vec::with_capacity(crate::constants::mesh_index_capacity(width, height));
        self.dims.update(width, height);
        self.allocations += 1;
    }
}

/// One depth sensor: device lifecycle, acquisition thread and consumer access
pub struct DepthSensor {
    driver: Arc<dyn DepthDriver>,
    settings: Arc<DepthSettings>,
    state: SensorState,
    store: Arc<FrameStore<CaptureFrame>>,
    /// Capture last handed out by `fetch_frames`
    current: Option<FrontView<CaptureFrame>>,
    capture_loop: Option<CaptureLoopController<AcquisitionState>>,
    interrupter: Option<Box<dyn SourceInterrupt>>,
    mesh_backend: MeshBackend,
    discontinuity_mm: f32,
    kernel: Option<Box<dyn TriangulationKernel>>,
}

impl DepthSensor {
    pub fn new(driver: Arc<dyn DepthDriver>, config: &Config) -> Self {
        let config = config.clone().sanitized();
        let (store, _) = FrameStore::new();
        Self {
            driver,
            settings: Arc::new(DepthSettings::from_config(&config)),
            state: SensorState::Closed,
            store,
            current: None,
            capture_loop: None,
            interrupter: None,
            mesh_backend: config.mesh_backend,
            discontinuity_mm: config.discontinuity_mm,
            kernel: None,
        }
    }

    /// Use an already created kernel instead of the configured backend
    pub fn with_kernel(mut self, kernel: Box<dyn TriangulationKernel>) -> Self {
        self.kernel = Some(kernel);
        self
    }

    /// Connected devices, sorted by serial
    pub fn devices(&self) -> Vec<DeviceInfo> {
        self.driver.enumerate()
    }

    /// Live depth settings, shared with the acquisition thread
    pub fn settings(&self) -> &Arc<DepthSettings> {
        &self.settings
    }

    pub fn state(&self) -> &SensorState {
        &self.state
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, SensorState::Open { .. })
    }

    /// Serial of the open device
    pub fn serial(&self) -> Option<&str> {
        match &self.state {
            SensorState::Open { serial } => Some(serial),
            _ => None,
        }
    }

    /// Whether the acquisition thread is still delivering frames
    pub fn is_streaming(&self) -> bool {
        self.capture_loop
            .as_ref()
            .is_some_and(CaptureLoopController::is_running)
    }

    /// Open a device and start acquisition
    ///
    /// Any open device is closed first. Returns `false` (leaving the sensor
    /// closed) when no device matches.
    pub fn open(&mut self, selector: DeviceSelector) -> bool {
        let serial = match selector {
            DeviceSelector::Serial(serial) => serial,
            DeviceSelector::Index(index) => {
                let devices = self.driver.enumerate();
                if devices.is_empty() {
                    error!("No depth sensors connected");
                    return false;
                }
                match devices.get(index) {
                    Some(device) => device.serial.clone(),
                    None => {
                        error!(
                            index,
                            available = devices.len(),
                            "Depth sensor index out of range"
                        );
                        return false;
                    }
                }
            }
        };

        self.close();
        // Nothing from the previous device survives a reopen, successful or not
        self.store = FrameStore::new().0;
        self.current = None;
        self.state = SensorState::Opening;

        let source = match self.driver.open(&serial) {
            Ok(source) => source,
            Err(e) => {
                let e = PipelineError::from(e);
                error!(serial = %serial, error = %e, "Failed to open depth sensor");
                self.state = SensorState::Closed;
                return false;
            }
        };

        let (store, back) = FrameStore::new();
        self.interrupter = Some(source.interrupter());
        let state = AcquisitionState {
            source,
            acquisition: Acquisition::new(back, Arc::clone(&self.settings)),
        };
        self.capture_loop = Some(CaptureLoopController::start(
            "depth-acquisition",
            state,
            AcquisitionState::step,
        ));
        self.store = store;

        info!(serial = %serial, "Depth sensor open");
        self.state = SensorState::Open { serial };
        true
    }

    /// Stop acquisition and release the device
    ///
    /// The last published frame stays readable after closing.
    pub fn close(&mut self) {
        let Some(mut capture_loop) = self.capture_loop.take() else {
            self.state = SensorState::Closed;
            return;
        };
        let serial = self.serial().unwrap_or_default().to_string();
        self.state = SensorState::Closing;

        capture_loop.request_stop();
        if let Some(interrupter) = self.interrupter.take() {
            interrupter.interrupt();
        }
        match capture_loop.join() {
            Some(mut state) => state.source.close(),
            None => warn!(serial = %serial, "Acquisition thread lost its frame source"),
        }

        info!(serial = %serial, "Depth sensor closed");
        self.state = SensorState::Closed;
    }

    /// Whether a frame was published since the last [`DepthSensor::fetch_frames`]
    pub fn is_new_frame_available(&self) -> bool {
        self.store.is_new_frame_available()
    }

    /// Latest frames, only if a new capture was published since the last fetch
    ///
    /// The delivered capture becomes current: [`DepthSensor::fetch_point_cloud`]
    /// and [`DepthSensor::refresh_mesh`] read it until the next delivery.
    pub fn fetch_frames(&mut self, request: FrameRequest) -> Option<FrameSnapshot> {
        let frame = self.store.consume()?;
        self.current = Some(frame.clone());
        Some(FrameSnapshot { frame, request })
    }

    /// Capture last delivered by `fetch_frames`, or the front buffer if none was
    fn current_frame(&self) -> FrontView<CaptureFrame> {
        match &self.current {
            Some(frame) => frame.clone(),
            None => self.store.front(),
        }
    }

    /// Point cloud of the current capture
    pub fn fetch_point_cloud(&self) -> PointCloudView {
        PointCloudView {
            frame: self.current_frame(),
        }
    }

    /// Rebuild `mesh` from the current capture and return its index count
    ///
    /// Returns the previous count unchanged while nothing has been captured.
    pub fn refresh_mesh(&mut self, mesh: &mut MeshHandle) -> usize {
        let frame = self.current_frame();
        let cloud = &frame.cloud;
        if cloud.is_empty() {
            return mesh.index_count;
        }

        mesh.ensure_storage(cloud.width, cloud.height);
        mesh.vertices.copy_from_slice(&cloud.vertices);
        mesh.colors.copy_from_slice(&cloud.colors);

        let backend = self.mesh_backend;
        let kernel = self.kernel.get_or_insert_with(|| create_kernel(backend));
        let result = kernel.dispatch(
            &cloud.depth.data,
            cloud.width,
            cloud.height,
            self.discontinuity_mm,
            &mut mesh.indices,
        );

        let count = match result {
            Ok(count) => count,
            Err(e) if kernel.name() != "cpu" => {
                warn!(kernel = kernel.name(), error = %e, "Mesh kernel failed, falling back to CPU");
                let mut cpu: Box<dyn TriangulationKernel> = Box::new(CpuTriangulator::new());
                let retry = cpu.dispatch(
                    &cloud.depth.data,
                    cloud.width,
                    cloud.height,
                    self.discontinuity_mm,
                    &mut mesh.indices,
                );
                self.kernel = Some(cpu);
                match retry {
                    Ok(count) => count,
                    Err(e) => {
                        warn!(error = %e, "CPU mesh kernel failed");
                        return mesh.index_count;
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "Mesh kernel failed");
                return mesh.index_count;
            }
        };

        mesh.index_count = count as usize;
        mesh.capture_id = frame.capture_id;
        mesh.index_count
    }
}

impl Drop for DepthSensor {
    fn drop(&mut self) {
        self.close();
    }
}
