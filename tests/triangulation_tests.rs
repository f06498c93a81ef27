// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the mesh triangulation kernel

use std::collections::HashSet;

use depthmesh::constants::mesh_index_capacity;
use depthmesh::shaders::mesh::{
    CpuTriangulator, Triangle, TriangulationKernel, cell_triangles, live_triangles,
};

const THRESHOLD: f32 = 100.0;

fn triangulate(depth: &[f32], width: u32, height: u32) -> Vec<u32> {
    let mut out = Vec::new();
    let count = CpuTriangulator::new()
        .dispatch(depth, width, height, THRESHOLD, &mut out)
        .unwrap();
    assert_eq!(count as usize, out.len());
    out
}

fn triangle_set(indices: &[u32]) -> HashSet<Triangle> {
    live_triangles(indices).collect()
}

/// Deterministic pseudo-random depth with holes and edges
fn noisy_depth(width: u32, height: u32, seed: u64) -> Vec<f32> {
    let mut state = seed;
    (0..width * height)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            match (state >> 33) % 10 {
                0 => 0.0,
                1 => 3000.0,
                n => 1000.0 + n as f32 * 15.0,
            }
        })
        .collect()
}

#[test]
fn test_planar_grid_is_complete() {
    for (width, height) in [(2, 2), (5, 3), (17, 9), (64, 48)] {
        let depth = vec![1500.0; (width * height) as usize];
        let out = triangulate(&depth, width, height);

        let cells = ((width - 1) * (height - 1)) as usize;
        assert_eq!(out.len(), cells * 6);
        assert_eq!(live_triangles(&out).count(), cells * 2);
        assert_eq!(triangle_set(&out).len(), cells * 2, "triangles are unique");
    }
}

#[test]
fn test_buffer_length_independent_of_content() {
    let (width, height) = (23, 17);
    let capacity = mesh_index_capacity(width, height);
    for seed in 0..5 {
        let out = triangulate(&noisy_depth(width, height, seed), width, height);
        assert_eq!(out.len(), capacity);
    }
    let empty = triangulate(&vec![0.0; (width * height) as usize], width, height);
    assert_eq!(empty.len(), capacity);
    assert!(empty.iter().all(|&i| i == 0));
}

#[test]
fn test_zeroed_sample_removes_its_triangles() {
    let (width, height) = (6u32, 5u32);
    let mut depth = vec![1500.0; (width * height) as usize];
    let before = triangle_set(&triangulate(&depth, width, height));

    let p = 2 * width + 2;
    depth[p as usize] = 0.0;
    let after = triangle_set(&triangulate(&depth, width, height));

    assert!(after.iter().all(|tri| !tri.contains(&p)));
    for tri in before.iter().filter(|tri| !tri.contains(&p)) {
        assert!(after.contains(tri), "lost unrelated triangle {:?}", tri);
    }

    // The two cells split along the diagonal through p fall back to the other diagonal
    let w = width;
    let fill_in: HashSet<Triangle> = [
        // Cell owned by p: (top, top-left, left)
        [p - w, p - w - 1, p - 1],
        // Cell with p as top-left: (left, self, top)
        [p + w, p + w + 1, p + 1],
    ]
    .into_iter()
    .collect();
    let added: HashSet<Triangle> = after.difference(&before).copied().collect();
    assert_eq!(added, fill_in);
}

#[test]
fn test_depth_edge_is_not_bridged() {
    let (width, height) = (8u32, 4u32);
    let depth: Vec<f32> = (0..width * height)
        .map(|i| if i % width < 4 { 1000.0 } else { 2000.0 })
        .collect();
    let tris = triangle_set(&triangulate(&depth, width, height));

    // Columns 0..=3 near, 4..=7 far: six cells per row minus the one across the edge
    assert_eq!(tris.len(), 3 * 6 * 2);
    for tri in &tris {
        let near = tri.iter().filter(|&&i| i % width < 4).count();
        assert!(near == 0 || near == 3, "triangle {:?} spans the edge", tri);
    }
}

#[test]
fn test_diagonal_splits_are_exclusive() {
    let (width, height) = (31u32, 19u32);
    for seed in 0..20 {
        let depth = noisy_depth(width, height, seed);
        for y in 1..height {
            for x in 1..width {
                let s = y * width + x;
                let (t, l, tl) = (s - width, s - 1, s - width - 1);
                let found: Vec<Triangle> = cell_triangles(&depth, width, x, y, THRESHOLD)
                    .into_iter()
                    .flatten()
                    .collect();

                let first = found.iter().any(|tri| tri.contains(&s) && tri.contains(&tl));
                let second = found
                    .iter()
                    .any(|tri| tri.contains(&t) && tri.contains(&l));
                assert!(
                    !(first && second),
                    "cell ({}, {}) mixes both diagonals: {:?}",
                    x,
                    y,
                    found
                );
            }
        }
    }
}

#[test]
fn test_kernel_matches_cell_rule() {
    let (width, height) = (40u32, 30u32);
    let depth = noisy_depth(width, height, 7);

    let mut expected = HashSet::new();
    for y in 1..height {
        for x in 1..width {
            expected.extend(cell_triangles(&depth, width, x, y, THRESHOLD).into_iter().flatten());
        }
    }

    assert_eq!(triangle_set(&triangulate(&depth, width, height)), expected);
}
