// SPDX-License-Identifier: GPL-3.0-only

//! Notifications from a scan session to the embedding application

use crate::backends::camera::CameraInfo;
use crate::errors::AppError;
use crate::geometry::Rect;
use image::RgbaImage;

/// Hooks called by the scan engine
///
/// Every method has a no-op default. Unless noted otherwise, methods are
/// called on the control loop thread and should return quickly.
pub trait ScanCallback: Send + Sync {
    /// The control loop is running
    fn on_scan_start(&self) {}

    /// Pick the camera to open; `None` uses the first camera with the
    /// configured facing
    fn on_switch_camera(&self, _cameras: &[CameraInfo]) -> Option<usize> {
        None
    }

    /// Paint the mask overlay onto a transparent canvas of display size
    fn on_draw_mask(&self, _canvas: &mut RgbaImage, _clip: Option<Rect>) {}

    /// The session failed and is shutting down; called at most once
    fn on_scan_error(&self, _error: &AppError) {}

    /// A code was decoded; scanning pauses until the next `next()` call
    fn on_scan_result(&self, _text: &str) {}

    /// The control loop exited and released its resources
    fn on_scan_end(&self) {}

    /// Scan clip for a display of `width` × `height`; `None` keeps the
    /// default of the whole display. Called by [`ScanPanel`](crate::panel::ScanPanel)
    /// on the caller's thread.
    fn on_compute_clip(&self, _width: u32, _height: u32) -> Option<Rect> {
        None
    }
}

/// Callback that ignores every notification
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCallback;

impl ScanCallback for NoopCallback {}
