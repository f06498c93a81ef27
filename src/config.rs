// SPDX-License-Identifier: GPL-3.0-only

//! User configuration and the runtime settings shared with the acquisition thread

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::constants::{
    DEFAULT_MAX_DISTANCE_MM, DEFAULT_MIN_DISTANCE_MM, DEPTH_DISCONTINUITY_MM,
    DISTANCE_LIMIT_MAX_MM, DISTANCE_LIMIT_MIN_MM,
};
use crate::errors::{PipelineError, PipelineResult};

/// How visualized depth frames are colored
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub enum DepthColormap {
    /// Hue ramp from near (red) to far (violet)
    #[default]
    Hue,
    /// Bright near, dark far
    Grayscale,
}

/// Where the mesh triangulation kernel runs
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub enum MeshBackend {
    /// GPU compute shader, falling back to the CPU kernel if no adapter is available
    #[default]
    Gpu,
    /// Thread pool on the CPU
    Cpu,
}

/// Near/far bounds (millimeters) of the depth visualization
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DistanceWindow {
    pub min_mm: f32,
    pub max_mm: f32,
}

impl Default for DistanceWindow {
    fn default() -> Self {
        Self {
            min_mm: DEFAULT_MIN_DISTANCE_MM,
            max_mm: DEFAULT_MAX_DISTANCE_MM,
        }
    }
}

impl DistanceWindow {
    /// Clamp both bounds to the supported sensor range
    pub fn clamped(self) -> Self {
        Self {
            min_mm: clamp_distance(self.min_mm),
            max_mm: clamp_distance(self.max_mm),
        }
    }
}

fn clamp_distance(mm: f32) -> f32 {
    if mm.is_nan() {
        return DISTANCE_LIMIT_MIN_MM;
    }
    mm.clamp(DISTANCE_LIMIT_MIN_MM, DISTANCE_LIMIT_MAX_MM)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Depth visualization window
    pub distance: DistanceWindow,
    /// Deliver raw depth (millimeters) instead of a visualization
    pub raw_depth: bool,
    /// Colormap used when `raw_depth` is off
    pub colormap: DepthColormap,
    /// Triangulation kernel backend
    pub mesh_backend: MeshBackend,
    /// Neighbor depth difference (millimeters) above which no triangle is built
    pub discontinuity_mm: f32,
    /// Serial of the last opened sensor
    pub last_serial: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            distance: DistanceWindow::default(),
            raw_depth: false,
            colormap: DepthColormap::default(),
            mesh_backend: MeshBackend::default(),
            discontinuity_mm: DEPTH_DISCONTINUITY_MM,
            last_serial: None,
        }
    }
}

impl Config {
    /// Default location: `<config dir>/depthmesh/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("depthmesh").join("config.json"))
    }

    /// Load from `path`, falling back to defaults if the file is missing or invalid
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                if path.exists() {
                    warn!(path = %path.display(), error = %e, "Ignoring unreadable config");
                } else {
                    debug!(path = %path.display(), "No config file, using defaults");
                }
                Self::default()
            }
        }
    }

    /// Load and sanitize a config file
    pub fn load(path: &Path) -> PipelineResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| PipelineError::Config(format!("{}: {}", path.display(), e)))?;
        let config: Config = serde_json::from_str(&text)
            .map_err(|e| PipelineError::Config(format!("{}: {}", path.display(), e)))?;
        Ok(config.sanitized())
    }

    /// Write the config as pretty JSON, creating parent directories
    pub fn save(&self, path: &Path) -> PipelineResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| PipelineError::Config(format!("{}: {}", parent.display(), e)))?;
        }
        let text = serde_json::to_string_pretty(self)
            .map_err(|e| PipelineError::Config(e.to_string()))?;
        std::fs::write(path, text)
            .map_err(|e| PipelineError::Config(format!("{}: {}", path.display(), e)))?;
        debug!(path = %path.display(), "Config saved");
        Ok(())
    }

    /// Clamp numeric fields into their supported ranges
    pub fn sanitized(mut self) -> Self {
        self.distance = self.distance.clamped();
        if !(self.discontinuity_mm > 0.0) {
            self.discontinuity_mm = DEPTH_DISCONTINUITY_MM;
        }
        self
    }
}

/// Depth settings read by the acquisition loop on every frame
///
/// Written from the configuration surface at any time; a change applies to the
/// next processed frame. The bounds are independent atomics, so a frame racing
/// with an update may see the new min with the old max.
#[derive(Debug)]
pub struct DepthSettings {
    min_mm: AtomicU32,
    max_mm: AtomicU32,
    raw_depth: AtomicBool,
    colormap: AtomicU8,
}

impl Default for DepthSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl DepthSettings {
    pub fn from_config(config: &Config) -> Self {
        let settings = Self {
            min_mm: AtomicU32::new(0),
            max_mm: AtomicU32::new(0),
            raw_depth: AtomicBool::new(config.raw_depth),
            colormap: AtomicU8::new(0),
        };
        settings.set_distance_window(config.distance);
        settings.set_colormap(config.colormap);
        settings
    }

    /// Current distance window
    pub fn distance_window(&self) -> DistanceWindow {
        DistanceWindow {
            min_mm: f32::from_bits(self.min_mm.load(Ordering::Relaxed)),
            max_mm: f32::from_bits(self.max_mm.load(Ordering::Relaxed)),
        }
    }

    /// Set both bounds (clamped to the sensor range)
    pub fn set_distance_window(&self, window: DistanceWindow) {
        let window = window.clamped();
        self.min_mm.store(window.min_mm.to_bits(), Ordering::Relaxed);
        self.max_mm.store(window.max_mm.to_bits(), Ordering::Relaxed);
    }

    pub fn set_min_distance(&self, mm: f32) {
        self.min_mm
            .store(clamp_distance(mm).to_bits(), Ordering::Relaxed);
    }

    pub fn set_max_distance(&self, mm: f32) {
        self.max_mm
            .store(clamp_distance(mm).to_bits(), Ordering::Relaxed);
    }

    /// Whether depth frames are delivered raw (millimeters)
    pub fn is_raw_depth(&self) -> bool {
        self.raw_depth.load(Ordering::Relaxed)
    }

    pub fn set_raw_depth(&self, raw: bool) {
        self.raw_depth.store(raw, Ordering::Relaxed);
    }

    pub fn colormap(&self) -> DepthColormap {
        match self.colormap.load(Ordering::Relaxed) {
            1 => DepthColormap::Grayscale,
            _ => DepthColormap::Hue,
        }
    }

    pub fn set_colormap(&self, colormap: DepthColormap) {
        let value = match colormap {
            DepthColormap::Hue => 0,
            DepthColormap::Grayscale => 1,
        };
        self.colormap.store(value, Ordering::Relaxed);
    }
}
