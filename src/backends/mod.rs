// SPDX-License-Identifier: GPL-3.0-only

//! Backend abstraction layer for camera and graphics
//!
//! The scan engine consumes hardware through capability traits so the
//! control loop stays independent of the platform:
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                 Scan Layer                   │
//! └────────────────────┬────────────────────────┘
//!                      │
//! ┌────────────────────┴────────────────────────┐
//! │              Backend Layer                   │
//! │  ┌─────────────┐    ┌──────────────────┐   │
//! │  │   Camera    │    │     Graphics     │   │
//! │  │  (traits)   │    │     (traits)     │   │
//! │  └─────────────┘    └──────────────────┘   │
//! │  ┌─────────────┐    ┌──────────────────┐   │
//! │  │   Virtual   │    │     Headless     │   │
//! │  │   camera    │    │     graphics     │   │
//! │  └─────────────┘    └──────────────────┘   │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`camera`]: Camera capability, preview selection and an image-backed virtual camera
//! - [`graphics`]: Render targets, quad drawers and an in-memory backend

pub mod camera;
pub mod graphics;
