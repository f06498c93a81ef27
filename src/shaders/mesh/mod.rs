// SPDX-License-Identifier: GPL-3.0-only

//! Mesh triangulation of depth grids
//!
//! The same rule runs either as a WGSL compute shader or on the CPU thread
//! pool. Both append triangles through an atomic counter into a buffer whose
//! length depends only on the grid size.

#[cfg(feature = "gpu")]
mod processor;
mod triangulate;

#[cfg(feature = "gpu")]
pub use processor::MeshProcessor;
pub use triangulate::{
    CpuTriangulator, DEGENERATE, Triangle, TriangulationKernel, cell_triangles, continuous,
    live_triangles,
};

use tracing::{info, warn};

use crate::config::MeshBackend;

/// Triangulation compute shader
pub const TRIANGULATE_WGSL: &str = include_str!("triangulate.wgsl");

/// Create the kernel for `backend`, falling back to the CPU if no GPU is usable
pub fn create_kernel(backend: MeshBackend) -> Box<dyn TriangulationKernel> {
    match backend {
        MeshBackend::Cpu => {
            info!("Using CPU mesh kernel");
            Box::new(CpuTriangulator::new())
        }
        MeshBackend::Gpu => create_gpu_kernel(),
    }
}

#[cfg(feature = "gpu")]
fn create_gpu_kernel() -> Box<dyn TriangulationKernel> {
    match pollster::block_on(MeshProcessor::new()) {
        Ok(processor) => Box::new(processor),
        Err(e) => {
            warn!(error = %e, "GPU mesh kernel unavailable, falling back to CPU");
            Box::new(CpuTriangulator::new())
        }
    }
}

#[cfg(not(feature = "gpu"))]
fn create_gpu_kernel() -> Box<dyn TriangulationKernel> {
    warn!("Built without GPU support, using CPU mesh kernel");
    Box::new(CpuTriangulator::new())
}
