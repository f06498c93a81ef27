// SPDX-License-Identifier: GPL-3.0-only

//! Shared GPU processor infrastructure
//!
//! Dimension caching for buffers that are allocated once per grid size,
//! workgroup arithmetic and buffer readback.

/// Cached resource dimensions - avoids reallocation when dimensions match
///
/// Used by the mesh kernel and mesh handles to decide whether storage must be
/// recreated or only refreshed.
#[derive(Default, Clone, Copy, PartialEq, Debug)]
pub struct CachedDimensions {
    pub width: u32,
    pub height: u32,
}

impl CachedDimensions {
    /// Check if dimensions have changed and need update
    pub fn needs_update(&self, width: u32, height: u32) -> bool {
        self.width != width || self.height != height
    }

    pub fn update(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    /// Check if dimensions are initialized (non-zero)
    pub fn is_initialized(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

/// Map a MAP_READ buffer, wait for the GPU, copy its contents out and unmap it
#[cfg(feature = "gpu")]
pub async fn read_buffer_async(
    device: &crate::gpu::wgpu::Device,
    buffer: &crate::gpu::wgpu::Buffer,
) -> Result<Vec<u8>, String> {
    use crate::gpu::wgpu;

    let slice = buffer.slice(..);
    let (sender, receiver) = futures::channel::oneshot::channel();

    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = sender.send(result);
    });

    device
        .poll(wgpu::PollType::wait_indefinitely())
        .map_err(|e| format!("Failed to poll device: {:?}", e))?;

    receiver
        .await
        .map_err(|_| "Failed to receive buffer mapping".to_string())?
        .map_err(|e| format!("Failed to map buffer: {:?}", e))?;

    let data = slice.get_mapped_range().to_vec();
    buffer.unmap();

    Ok(data)
}

/// Number of workgroups needed to cover `dimension`
#[inline]
pub fn compute_dispatch_size(dimension: u32, workgroup_size: u32) -> u32 {
    dimension.div_ceil(workgroup_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cached_dimensions() {
        let mut dims = CachedDimensions::default();
        assert!(!dims.is_initialized());
        assert!(dims.needs_update(512, 424));

        dims.update(512, 424);
        assert!(dims.is_initialized());
        assert!(!dims.needs_update(512, 424));
        assert!(dims.needs_update(256, 212));
    }

    #[test]
    fn test_compute_dispatch_size() {
        assert_eq!(compute_dispatch_size(512, 16), 32);
        assert_eq!(compute_dispatch_size(424, 16), 27);
        assert_eq!(compute_dispatch_size(16, 16), 1);
        assert_eq!(compute_dispatch_size(1, 16), 1);
    }
}
