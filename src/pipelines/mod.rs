// SPDX-License-Identifier: GPL-3.0-only

//! Acquisition and reconstruction pipeline
//!
//! ```text
//! ┌──────────────┐     ┌───────────────────┐     ┌──────────────┐
//! │ Frame Source │ ──▶ │ Acquisition loop  │ ──▶ │ Double buffer│
//! │ (BGRX, mm)   │     │  - registration   │     │ front / back │
//! │              │     │  - corrections    │     │              │
//! │              │     │  - point cloud    │     │              │
//! └──────────────┘     └───────────────────┘     └──────────────┘
//! ```
//!
//! - [`double_buffer`]: owned front/back pair with a read-only front view
//! - [`acquisition`]: per-frame processing run on the acquisition thread
//! - [`point_cloud`]: unprojection of registered depth into colored points
//! - [`export`]: PNG frames and GLB meshes

pub mod acquisition;
pub mod double_buffer;
pub mod export;
pub mod point_cloud;
