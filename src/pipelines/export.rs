// SPDX-License-Identifier: GPL-3.0-only

//! Snapshot export: frames as PNG, the mesh as binary glTF
//!
//! The GLB keeps only vertices referenced by a non-degenerate triangle, so
//! missing-depth points (NaN positions) never reach the file. Colors are
//! stored per vertex; there is no texture. Origin is at the depth camera.

use std::path::Path;

use image::{ImageBuffer, Luma, Rgba};
use tracing::{debug, info};

use super::acquisition::DepthFrame;
use crate::backends::depth::{ColorImage, FloatImage, Point4, PointColor};
use crate::errors::{PipelineError, PipelineResult};
use crate::shaders::mesh::live_triangles;

/// What ended up in an exported mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshExportStats {
    pub vertex_count: usize,
    pub triangle_count: usize,
}

/// Save an RGBA frame as PNG
pub fn save_rgba_png(image: &ColorImage, path: &Path) -> PipelineResult<()> {
    if image.channels != 4 {
        return Err(PipelineError::Export(format!(
            "expected 4 channels, got {}",
            image.channels
        )));
    }
    let buffer: ImageBuffer<Rgba<u8>, Vec<u8>> =
        ImageBuffer::from_raw(image.width, image.height, image.data.clone())
            .ok_or_else(|| PipelineError::Export("Failed to create image buffer".to_string()))?;
    buffer
        .save(path)
        .map_err(|e| PipelineError::Export(format!("{}: {}", path.display(), e)))?;
    debug!(path = %path.display(), "Saved RGBA frame");
    Ok(())
}

/// Save a normalized [0, 1] IR frame as 8-bit grayscale PNG
pub fn save_ir_png(ir: &FloatImage, path: &Path) -> PipelineResult<()> {
    let data = ir
        .data
        .iter()
        .map(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8)
        .collect();
    let buffer: ImageBuffer<Luma<u8>, Vec<u8>> = ImageBuffer::from_raw(ir.width, ir.height, data)
        .ok_or_else(|| PipelineError::Export("Failed to create image buffer".to_string()))?;
    buffer
        .save(path)
        .map_err(|e| PipelineError::Export(format!("{}: {}", path.display(), e)))?;
    debug!(path = %path.display(), "Saved IR frame");
    Ok(())
}

/// Save a depth frame: raw depth as 16-bit millimeters, visualized depth as RGBA
pub fn save_depth_png(depth: &DepthFrame, path: &Path) -> PipelineResult<()> {
    match depth {
        DepthFrame::Visualized(image) => save_rgba_png(image, path),
        DepthFrame::Raw(raw) => {
            let data = raw
                .data
                .iter()
                .map(|mm| {
                    if mm.is_finite() {
                        mm.round().clamp(0.0, u16::MAX as f32) as u16
                    } else {
                        0
                    }
                })
                .collect();
            let buffer: ImageBuffer<Luma<u16>, Vec<u16>> =
                ImageBuffer::from_raw(raw.width, raw.height, data).ok_or_else(|| {
                    PipelineError::Export("Failed to create image buffer".to_string())
                })?;
            buffer
                .save(path)
                .map_err(|e| PipelineError::Export(format!("{}: {}", path.display(), e)))?;
            debug!(path = %path.display(), "Saved raw depth frame");
            Ok(())
        }
    }
}

/// Compact a mesh to its referenced vertices
///
/// Returns positions (glTF Y-up), RGBA colors and remapped indices.
fn compact_mesh(
    vertices: &[Point4],
    colors: &[PointColor],
    indices: &[u32],
) -> PipelineResult<(Vec<[f32; 3]>, Vec<[u8; 4]>, Vec<u32>)> {
    let mut vertex_map: Vec<Option<u32>> = vec![None; vertices.len()];
    let mut positions = Vec::new();
    let mut rgba = Vec::new();
    let mut remapped = Vec::new();

    for tri in live_triangles(indices) {
        for index in tri {
            let i = index as usize;
            if i >= vertices.len() || i >= colors.len() {
                return Err(PipelineError::Export(format!(
                    "index {} out of range for {} vertices",
                    index,
                    vertices.len()
                )));
            }
            let mapped = match vertex_map[i] {
                Some(mapped) => mapped,
                None => {
                    let [x, y, z, _] = vertices[i];
                    if !(x.is_finite() && y.is_finite() && z.is_finite()) {
                        return Err(PipelineError::Export(format!(
                            "triangle references vertex {} without depth",
                            index
                        )));
                    }
                    let mapped = positions.len() as u32;
                    // Sensor rows grow downward; glTF is Y-up
                    positions.push([x, -y, z]);
                    let [r, g, b] = colors[i];
                    rgba.push([r, g, b, 255]);
                    vertex_map[i] = Some(mapped);
                    mapped
                }
            };
            remapped.push(mapped);
        }
    }

    Ok((positions, rgba, remapped))
}

/// Export a mesh as a GLB (binary glTF) file with per-vertex colors
pub fn export_mesh_glb(
    vertices: &[Point4],
    colors: &[PointColor],
    indices: &[u32],
    output_path: &Path,
) -> PipelineResult<MeshExportStats> {
    let (positions, rgba, indices) = compact_mesh(vertices, colors, indices)?;
    if positions.is_empty() || indices.is_empty() {
        return Err(PipelineError::Export(
            "No valid mesh triangles generated".to_string(),
        ));
    }

    let stats = MeshExportStats {
        vertex_count: positions.len(),
        triangle_count: indices.len() / 3,
    };
    info!(
        vertex_count = stats.vertex_count,
        triangle_count = stats.triangle_count,
        path = %output_path.display(),
        "Exporting mesh"
    );

    let glb = build_glb(&positions, &rgba, &indices)?;
    std::fs::write(output_path, glb)
        .map_err(|e| PipelineError::Export(format!("Failed to write GLB file: {}", e)))?;

    debug!(path = %output_path.display(), "GLB export complete");
    Ok(stats)
}

/// Assemble the GLB container: header, JSON chunk, BIN chunk
fn build_glb(positions: &[[f32; 3]], rgba: &[[u8; 4]], indices: &[u32]) -> PipelineResult<Vec<u8>> {
    let position_bytes: Vec<u8> = positions
        .iter()
        .flatten()
        .flat_map(|f| f.to_le_bytes())
        .collect();
    let color_bytes: Vec<u8> = rgba.iter().flatten().copied().collect();
    let index_bytes: Vec<u8> = indices.iter().flat_map(|i| i.to_le_bytes()).collect();

    // Buffer layout: positions | colors | indices, every view 4-byte aligned
    let position_offset = 0usize;
    let color_offset = position_bytes.len();
    let index_offset = color_offset + color_bytes.len();
    let total_buffer_len = index_offset + index_bytes.len();
    let padding = (4 - (total_buffer_len % 4)) % 4;
    let padded_buffer_len = total_buffer_len + padding;

    let mut min_pos = [f32::MAX; 3];
    let mut max_pos = [f32::MIN; 3];
    for p in positions {
        for axis in 0..3 {
            min_pos[axis] = min_pos[axis].min(p[axis]);
            max_pos[axis] = max_pos[axis].max(p[axis]);
        }
    }

    let gltf_json = serde_json::json!({
        "asset": {
            "generator": concat!("depthmesh ", env!("CARGO_PKG_VERSION")),
            "version": "2.0"
        },
        "scene": 0,
        "scenes": [{ "nodes": [0] }],
        "nodes": [{ "mesh": 0 }],
        "meshes": [{
            "primitives": [{
                "attributes": {
                    "POSITION": 0,
                    "COLOR_0": 1
                },
                "indices": 2,
                "material": 0,
                "mode": 4
            }]
        }],
        "materials": [{
            "pbrMetallicRoughness": {
                "baseColorFactor": [1.0, 1.0, 1.0, 1.0],
                "metallicFactor": 0.0,
                "roughnessFactor": 1.0
            },
            "doubleSided": true
        }],
        "accessors": [
            {
                "bufferView": 0,
                "byteOffset": 0,
                "componentType": 5126,
                "count": positions.len(),
                "type": "VEC3",
                "min": min_pos,
                "max": max_pos
            },
            {
                "bufferView": 1,
                "byteOffset": 0,
                "componentType": 5121,
                "normalized": true,
                "count": rgba.len(),
                "type": "VEC4"
            },
            {
                "bufferView": 2,
                "byteOffset": 0,
                "componentType": 5125,
                "count": indices.len(),
                "type": "SCALAR"
            }
        ],
        "bufferViews": [
            {
                "buffer": 0,
                "byteOffset": position_offset,
                "byteLength": position_bytes.len(),
                "byteStride": 12,
                "target": 34962
            },
            {
                "buffer": 0,
                "byteOffset": color_offset,
                "byteLength": color_bytes.len(),
                "byteStride": 4,
                "target": 34962
            },
            {
                "buffer": 0,
                "byteOffset": index_offset,
                "byteLength": index_bytes.len(),
                "target": 34963
            }
        ],
        "buffers": [{ "byteLength": padded_buffer_len }]
    });

    let json_string = serde_json::to_string(&gltf_json)
        .map_err(|e| PipelineError::Export(format!("Failed to serialize glTF: {}", e)))?;
    let json_bytes = json_string.as_bytes();
    let json_padding = (4 - (json_bytes.len() % 4)) % 4;
    let padded_json_len = json_bytes.len() + json_padding;

    let total_length = 12 + 8 + padded_json_len + 8 + padded_buffer_len;
    let mut glb: Vec<u8> = Vec::with_capacity(total_length);

    glb.extend_from_slice(b"glTF");
    glb.extend_from_slice(&2u32.to_le_bytes());
    glb.extend_from_slice(&(total_length as u32).to_le_bytes());

    // "JSON", space padded
    glb.extend_from_slice(&(padded_json_len as u32).to_le_bytes());
    glb.extend_from_slice(&0x4E4F534Au32.to_le_bytes());
    glb.extend_from_slice(json_bytes);
    glb.extend(std::iter::repeat_n(0x20u8, json_padding));

    // "BIN\0", zero padded
    glb.extend_from_slice(&(padded_buffer_len as u32).to_le_bytes());
    glb.extend_from_slice(&0x004E4942u32.to_le_bytes());
    glb.extend_from_slice(&position_bytes);
    glb.extend_from_slice(&color_bytes);
    glb.extend_from_slice(&index_bytes);
    glb.extend(std::iter::repeat_n(0u8, padding));

    Ok(glb)
}
