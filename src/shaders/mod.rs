// SPDX-License-Identifier: GPL-3.0-only

//! Per-pixel and per-cell compute passes
//!
//! Depth visualization and frame corrections run data-parallel on the CPU;
//! mesh triangulation runs as a compute shader with a CPU fallback.

pub mod depth;
pub mod gpu_processor;
pub mod mesh;

pub use gpu_processor::{CachedDimensions, compute_dispatch_size};
pub use mesh::{CpuTriangulator, TriangulationKernel, create_kernel};
