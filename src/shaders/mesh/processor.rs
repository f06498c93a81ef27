// SPDX-License-Identifier: GPL-3.0-only

//! GPU triangulation kernel
//!
//! Uploads the depth grid, resets the append counter, dispatches one
//! invocation per pixel and reads the fixed-capacity index buffer back.

use std::sync::Arc;

use tracing::{debug, info};

use super::triangulate::TriangulationKernel;
use crate::constants::mesh_index_capacity;
use crate::errors::{PipelineError, PipelineResult};
use crate::gpu::{self, wgpu};
use crate::shaders::gpu_processor::{CachedDimensions, compute_dispatch_size, read_buffer_async};

const WORKGROUP_SIZE: u32 = 16;

/// Uniform block of the triangulation shader
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct TriangulateParams {
    width: u32,
    height: u32,
    threshold: f32,
    _pad: u32,
}

/// Grid-sized buffers, recreated only when the grid changes
struct GridBuffers {
    depth: wgpu::Buffer,
    indices: wgpu::Buffer,
    /// Index buffer followed by the counter
    staging: wgpu::Buffer,
    capacity: usize,
}

/// GPU mesh triangulation processor
pub struct MeshProcessor {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
    counter_buffer: wgpu::Buffer,
    dims: CachedDimensions,
    buffers: Option<GridBuffers>,
}

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

impl MeshProcessor {
    /// Create a new GPU mesh processor
    pub async fn new() -> Result<Self, String> {
        info!("Initializing GPU mesh processor");

        let (device, queue, gpu_info) = gpu::create_compute_device("mesh_gpu").await?;

        info!(
            adapter_name = %gpu_info.adapter_name,
            adapter_backend = ?gpu_info.backend,
            "GPU device created for mesh triangulation"
        );

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("triangulate_shader"),
            source: wgpu::ShaderSource::Wgsl(super::TRIANGULATE_WGSL.into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("triangulate_bind_group_layout"),
            entries: &[
                // Depth grid (millimeters)
                storage_entry(0, true),
                // Index slots
                storage_entry(1, false),
                // Append counter (atomic)
                storage_entry(2, false),
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("triangulate_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("triangulate_pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("triangulate_uniform_buffer"),
            size: std::mem::size_of::<TriangulateParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let counter_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("triangulate_counter_buffer"),
            size: 4,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });

        Ok(Self {
            device,
            queue,
            pipeline,
            bind_group_layout,
            uniform_buffer,
            counter_buffer,
            dims: CachedDimensions::default(),
            buffers: None,
        })
    }

    /// Ensure grid buffers are allocated for the given dimensions
    fn ensure_resources(&mut self, width: u32, height: u32) {
        if self.buffers.is_some() && !self.dims.needs_update(width, height) {
            return;
        }

        let capacity = mesh_index_capacity(width, height);
        let pixels = width as u64 * height as u64;
        let index_bytes = capacity as u64 * 4;

        debug!(width, height, capacity, "Allocating mesh triangulation buffers");

        let depth = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("triangulate_depth_buffer"),
            size: pixels * 4,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let indices = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("triangulate_index_buffer"),
            size: index_bytes,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("triangulate_staging_buffer"),
            size: index_bytes + 4,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        self.buffers = Some(GridBuffers {
            depth,
            indices,
            staging,
            capacity,
        });
        self.dims.update(width, height);
    }

    /// Triangulate a depth grid into `out`, returning the final counter value
    pub async fn triangulate(
        &mut self,
        depth: &[f32],
        width: u32,
        height: u32,
        threshold_mm: f32,
        out: &mut Vec<u32>,
    ) -> Result<u32, String> {
        let expected = width as usize * height as usize;
        if depth.len() != expected {
            return Err(format!(
                "depth has {} samples, expected {}x{}",
                depth.len(),
                width,
                height
            ));
        }

        out.clear();
        if mesh_index_capacity(width, height) == 0 {
            return Ok(0);
        }

        self.ensure_resources(width, height);
        let buffers = self
            .buffers
            .as_ref()
            .ok_or("Triangulation buffers not allocated")?;
        let index_bytes = buffers.capacity as u64 * 4;

        self.queue
            .write_buffer(&buffers.depth, 0, bytemuck::cast_slice(depth));
        // Counter reset must land before the dispatch in the same submission
        self.queue
            .write_buffer(&self.counter_buffer, 0, bytemuck::bytes_of(&0u32));

        let params = TriangulateParams {
            width,
            height,
            threshold: threshold_mm,
            _pad: 0,
        };
        self.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&params));

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("triangulate_bind_group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffers.depth.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: buffers.indices.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: self.counter_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: self.uniform_buffer.as_entire_binding(),
                },
            ],
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("triangulate_encoder"),
            });

        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("triangulate_pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, Some(&bind_group), &[]);
            pass.dispatch_workgroups(
                compute_dispatch_size(width, WORKGROUP_SIZE),
                compute_dispatch_size(height, WORKGROUP_SIZE),
                1,
            );
        }

        encoder.copy_buffer_to_buffer(&buffers.indices, 0, &buffers.staging, 0, index_bytes);
        encoder.copy_buffer_to_buffer(&self.counter_buffer, 0, &buffers.staging, index_bytes, 4);

        self.queue.submit(std::iter::once(encoder.finish()));

        let bytes = read_buffer_async(&self.device, &buffers.staging).await?;
        let mut words = bytes
            .chunks_exact(4)
            .map(|c| u32::from_ne_bytes([c[0], c[1], c[2], c[3]]));

        out.extend(words.by_ref().take(buffers.capacity));
        let counter = words.next().ok_or("Counter missing from readback")?;

        Ok(counter)
    }
}

impl TriangulationKernel for MeshProcessor {
    fn name(&self) -> &'static str {
        "gpu"
    }

    fn dispatch(
        &mut self,
        depth: &[f32],
        width: u32,
        height: u32,
        threshold_mm: f32,
        out: &mut Vec<u32>,
    ) -> PipelineResult<u32> {
        pollster::block_on(self.triangulate(depth, width, height, threshold_mm, out))
            .map_err(PipelineError::Kernel)
    }
}
