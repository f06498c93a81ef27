// SPDX-License-Identifier: GPL-3.0-only

//! Backend abstraction layer for depth sensors
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │              Acquisition loop               │
//! └────────────────────┬────────────────────────┘
//!                      │ FrameSource / Registration
//! ┌────────────────────┴────────────────────────┐
//! │              Backend Layer                  │
//! │  ┌──────────────────┐  ┌─────────────────┐  │
//! │  │  Sensor runtime  │  │    Synthetic    │  │
//! │  │  (DepthDriver)   │  │    (in-proc)    │  │
//! │  └──────────────────┘  └─────────────────┘  │
//! └─────────────────────────────────────────────┘
//! ```

pub mod depth;
