// SPDX-License-Identifier: GPL-3.0-only

//! Camera capability abstraction
//!
//! The scan engine never talks to camera hardware directly. It consumes two
//! traits implemented by the embedding platform:
//!
//! ```text
//! ┌─────────────────────┐
//! │    ScanHandler      │  ← owns the open camera on its loop thread
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │   CameraProvider    │  ← enumerate + open
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │    Camera (trait)   │  ← parameters, preview, one-shot frames, autofocus
//! └─────────────────────┘
//! ```
//!
//! [`virtual_camera`] provides an implementation backed by a still image.

pub mod selection;
pub mod types;
pub mod virtual_camera;

pub use selection::{
    select_default_camera, select_fps_range, select_preview_config, select_preview_size,
};
pub use types::*;

use crate::errors::CameraResult;
use std::sync::Arc;

/// Callback receiving the next preview frame, called on the camera's callback thread
pub type PreviewCallback = Box<dyn FnOnce(PreviewFrame) + Send>;

/// Callback receiving an autofocus outcome (`true` on success), possibly on another thread
pub type FocusCallback = Box<dyn FnOnce(bool) + Send>;

/// Enumerates and opens cameras
pub trait CameraProvider: Send + Sync {
    /// All cameras, indexed by [`CameraInfo::id`]
    fn cameras(&self) -> Vec<CameraInfo>;

    /// Open the camera with the given id
    fn open(&self, id: usize) -> CameraResult<Arc<dyn Camera>>;
}

/// An open camera device
///
/// Implementations must be callable from any thread; the scan engine only
/// configures and releases the camera from its loop thread, but arms
/// one-shot callbacks from wherever a decode result is handled.
pub trait Camera: Send + Sync {
    fn info(&self) -> &CameraInfo;

    /// Supported preview configurations
    fn parameters(&self) -> CameraResult<CameraParameters>;

    /// Apply a preview configuration; only valid while the preview is stopped
    fn configure(&self, config: &PreviewConfig) -> CameraResult<()>;

    /// Currently applied preview configuration
    fn preview_config(&self) -> Option<PreviewConfig>;

    /// Stream the preview into a texture
    fn set_preview_target(&self, target: PreviewTarget) -> CameraResult<()>;

    fn start_preview(&self) -> CameraResult<()>;

    fn stop_preview(&self);

    /// Deliver the next preview frame to `callback`, replacing any callback
    /// that has not fired yet
    fn set_one_shot_preview_callback(&self, callback: PreviewCallback);

    /// Run one autofocus cycle and report the outcome
    fn auto_focus(&self, callback: FocusCallback);

    /// Release the device; further calls are no-ops
    fn release(&self);
}
