// SPDX-License-Identifier: GPL-3.0-only

//! Grid triangulation rule and the CPU kernel
//!
//! Every interior pixel (x >= 1, y >= 1) owns the cell spanned by itself and
//! its top, left and top-left neighbors. The cell emits up to two triangles,
//! preferring the self/top-left diagonal and falling back to the top/left
//! diagonal only when the first produced nothing. Each cell always consumes two
//! triangle slots; empty slots are written as (0, 0, 0).

use std::sync::atomic::{AtomicU32, Ordering};

use rayon::prelude::*;
use tracing::debug;

use crate::constants::{TRIANGLES_PER_CELL, mesh_index_capacity};
use crate::errors::{PipelineError, PipelineResult};

/// Vertex indices of one triangle slot
pub type Triangle = [u32; 3];

/// Slot content for a cell that produced fewer than two triangles
pub const DEGENERATE: Triangle = [0, 0, 0];

/// Triangulation of a depth grid into a fixed-capacity index buffer
///
/// Two-phase contract: the implementation resets its counter, then dispatches
/// one work-item per interior pixel. On return `out` holds exactly
/// [`mesh_index_capacity`] indices in unspecified slot order, and the returned
/// value is the final counter (always equal to `out.len()`).
pub trait TriangulationKernel: Send {
    /// Short name for logs
    fn name(&self) -> &'static str;

    fn dispatch(
        &mut self,
        depth: &[f32],
        width: u32,
        height: u32,
        threshold_mm: f32,
        out: &mut Vec<u32>,
    ) -> PipelineResult<u32>;
}

/// Whether two neighboring samples are connected by the mesh
///
/// A zero sample means no measurement and is never connected, whatever its
/// neighbor's depth.
#[inline]
pub fn continuous(a: f32, b: f32, threshold_mm: f32) -> bool {
    a != 0.0 && b != 0.0 && (a - b).abs() < threshold_mm
}

/// Triangles emitted by the cell owned by interior pixel (x, y)
///
/// Missing triangles are `None`; found triangles come first.
pub fn cell_triangles(
    depth: &[f32],
    width: u32,
    x: u32,
    y: u32,
    threshold_mm: f32,
) -> [Option<Triangle>; TRIANGLES_PER_CELL] {
    debug_assert!(x >= 1 && y >= 1);

    let s = y * width + x;
    let t = s - width;
    let l = s - 1;
    let tl = t - 1;
    let (ds, dt, dl, dtl) = (
        depth[s as usize],
        depth[t as usize],
        depth[l as usize],
        depth[tl as usize],
    );

    let top = continuous(dtl, dt, threshold_mm);
    let left = continuous(dtl, dl, threshold_mm);
    let right = continuous(dt, ds, threshold_mm);
    let bottom = continuous(dl, ds, threshold_mm);

    let mut found = [None; TRIANGLES_PER_CELL];
    let mut count = 0;

    if dtl != 0.0 && ds != 0.0 {
        if top && right && dt != 0.0 {
            found[count] = Some([s, t, tl]);
            count += 1;
        }
        if left && bottom && dl != 0.0 {
            found[count] = Some([s, tl, l]);
            count += 1;
        }
    }

    if count == 0 {
        if top && left && dtl != 0.0 {
            found[count] = Some([t, tl, l]);
            count += 1;
        }
        if right && bottom && ds != 0.0 {
            found[count] = Some([l, s, t]);
        }
    }

    found
}

/// Non-degenerate triangles of an index buffer
pub fn live_triangles(indices: &[u32]) -> impl Iterator<Item = Triangle> + '_ {
    indices
        .chunks_exact(3)
        .map(|c| [c[0], c[1], c[2]])
        .filter(|tri| *tri != DEGENERATE)
}

/// Triangulation kernel running on the rayon thread pool
///
/// Work-items append through a shared atomic counter exactly like the GPU
/// shader does, so slot order varies between runs while the slot contents do
/// not.
#[derive(Default)]
pub struct CpuTriangulator {
    slots: Vec<AtomicU32>,
    counter: AtomicU32,
}

impl CpuTriangulator {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_capacity(&mut self, capacity: usize) {
        if self.slots.len() != capacity {
            debug!(capacity, "Allocating CPU mesh index slots");
            self.slots = (0..capacity).map(|_| AtomicU32::new(0)).collect();
        }
    }
}

impl TriangulationKernel for CpuTriangulator {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn dispatch(
        &mut self,
        depth: &[f32],
        width: u32,
        height: u32,
        threshold_mm: f32,
        out: &mut Vec<u32>,
    ) -> PipelineResult<u32> {
        let pixels = width as usize * height as usize;
        if depth.len() != pixels {
            return Err(PipelineError::Kernel(format!(
                "depth has {} samples, expected {}x{}",
                depth.len(),
                width,
                height
            )));
        }

        let capacity = mesh_index_capacity(width, height);
        self.ensure_capacity(capacity);
        self.counter.store(0, Ordering::Relaxed);

        if capacity > 0 {
            let slots = &self.slots;
            let counter = &self.counter;
            (1..height).into_par_iter().for_each(|y| {
                for x in 1..width {
                    for tri in cell_triangles(depth, width, x, y, threshold_mm) {
                        let offset = counter.fetch_add(3, Ordering::Relaxed) as usize;
                        let tri = tri.unwrap_or(DEGENERATE);
                        for (slot, index) in slots[offset..offset + 3].iter().zip(tri) {
                            slot.store(index, Ordering::Relaxed);
                        }
                    }
                }
            });
        }

        out.clear();
        out.extend(self.slots.iter().map(|slot| slot.load(Ordering::Relaxed)));
        Ok(self.counter.load(Ordering::Relaxed))
    }
}
