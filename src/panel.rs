// SPDX-License-Identifier: GPL-3.0-only

//! Embedding controller for a scan view
//!
//! [`ScanPanel`] is what a host view drives. It remembers the surface, clip,
//! rotation and decoder across sessions and replays them into each new
//! [`ScanHandler`], so the host can start and stop scanning freely.

use crate::backends::camera::{CameraProvider, DisplayRotation};
use crate::backends::graphics::{GraphicsBackend, SurfaceHandle};
use crate::config::ScanConfig;
use crate::decoder::FrameDecoder;
use crate::errors::{AppError, AppResult};
use crate::geometry::Rect;
use crate::scan::{ScanCallback, ScanHandler, SessionState};
use std::sync::Arc;
use tracing::{debug, info};

/// Centred scan box: half the width, and half the height in landscape or
/// `min(width / 2, height / 4)` otherwise
pub fn center_clip(width: u32, height: u32) -> Rect {
    let clip_width = width / 2;
    let clip_height = if width > height {
        height / 2
    } else {
        clip_width.min(height / 4)
    };
    let left = (width - clip_width) / 2;
    let top = (height - clip_height) / 2;
    Rect::new(
        left as i32,
        top as i32,
        (left + clip_width) as i32,
        (top + clip_height) as i32,
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BoundSurface {
    handle: SurfaceHandle,
    width: u32,
    height: u32,
}

pub struct ScanPanel {
    config: ScanConfig,
    provider: Arc<dyn CameraProvider>,
    graphics: Arc<dyn GraphicsBackend>,
    callback: Arc<dyn ScanCallback>,
    decoder: Option<Arc<dyn FrameDecoder>>,
    surface: Option<BoundSurface>,
    clip: Option<Rect>,
    display_rotation: DisplayRotation,
    attached: bool,
    handler: Option<ScanHandler>,
}

impl ScanPanel {
    pub fn new(
        config: ScanConfig,
        provider: Arc<dyn CameraProvider>,
        graphics: Arc<dyn GraphicsBackend>,
        callback: Arc<dyn ScanCallback>,
    ) -> Self {
        Self {
            display_rotation: config.display_rotation,
            config,
            provider,
            graphics,
            callback,
            decoder: None,
            surface: None,
            clip: None,
            attached: false,
            handler: None,
        }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Clip computed by the last [`measure`](Self::measure)
    pub fn clip(&self) -> Option<Rect> {
        self.clip
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Whether a session exists and has not ended
    pub fn is_scanning(&self) -> bool {
        self.handler
            .as_ref()
            .is_some_and(|h| h.state() != SessionState::Destroyed)
    }

    /// The host view was attached; starts scanning when autostart is on
    pub fn attach(&mut self) -> AppResult<()> {
        self.attached = true;
        if self.config.autostart {
            self.start()?;
        }
        Ok(())
    }

    /// The host view was detached; stops scanning when autostart is on
    pub fn detach(&mut self) {
        self.attached = false;
        if self.config.autostart {
            self.destroy();
        }
    }

    /// Start a session; no-op while one exists
    pub fn start(&mut self) -> AppResult<()> {
        if self.handler.is_some() {
            return Ok(());
        }
        let handler = ScanHandler::new(
            self.config.clone(),
            Arc::clone(&self.provider),
            Arc::clone(&self.graphics),
            Arc::clone(&self.callback),
        );
        handler.set_display_rotation(self.display_rotation);
        handler.set_frame_decoder(self.decoder.clone());
        handler.set_clip(self.clip);
        if let Some(surface) = self.surface {
            handler.set_surface(Some(surface.handle), surface.width, surface.height);
        }
        handler.start()?;
        info!("Scan panel started a session");
        self.handler = Some(handler);
        Ok(())
    }

    /// End the current session without waiting for its teardown
    pub fn destroy(&mut self) {
        if let Some(handler) = self.handler.take() {
            handler.destroy();
            debug!("Scan panel destroyed its session");
        }
    }

    /// End the current session and wait until its resources are released
    pub fn destroy_and_wait(&mut self) {
        if let Some(handler) = self.handler.take() {
            handler.destroy();
            handler.join();
        }
    }

    /// Lay out for a display of `width` × `height` and recompute the clip
    pub fn measure(&mut self, width: u32, height: u32) {
        let clip = self
            .callback
            .on_compute_clip(width, height)
            .unwrap_or_else(|| Rect::from_size(width as i32, height as i32));
        debug!(width, height, ?clip, "Scan clip computed");
        self.clip = Some(clip);
        if let Some(handler) = &self.handler {
            handler.set_clip(self.clip);
        }
    }

    pub fn surface_changed(&mut self, handle: SurfaceHandle, width: u32, height: u32) {
        self.surface = Some(BoundSurface {
            handle,
            width,
            height,
        });
        if let Some(handler) = &self.handler {
            handler.set_surface(Some(handle), width, height);
        }
    }

    pub fn surface_destroyed(&mut self) {
        self.surface = None;
        if let Some(handler) = &self.handler {
            handler.set_surface(None, 0, 0);
        }
    }

    pub fn set_display_rotation(&mut self, rotation: DisplayRotation) {
        self.display_rotation = rotation;
        if let Some(handler) = &self.handler {
            handler.set_display_rotation(rotation);
        }
    }

    pub fn set_frame_decoder(&mut self, decoder: Option<Arc<dyn FrameDecoder>>) {
        self.decoder = decoder.clone();
        if let Some(handler) = &self.handler {
            handler.set_frame_decoder(decoder);
        }
    }

    /// Resume scanning after a result
    pub fn next(&self) {
        if let Some(handler) = &self.handler {
            handler.next();
        }
    }

    pub fn invalidate_mask(&self) {
        if let Some(handler) = &self.handler {
            handler.invalidate_mask();
        }
    }

    pub fn set_autostart(&mut self, autostart: bool) -> AppResult<()> {
        if self.attached {
            return Err(AppError::IllegalState(
                "autostart cannot change while attached".into(),
            ));
        }
        self.config.autostart = autostart;
        Ok(())
    }

    /// Switch the render-surface kind; the current surface binding is dropped
    pub fn set_use_texture_view(&mut self, use_texture_view: bool) -> AppResult<()> {
        if self.attached {
            return Err(AppError::IllegalState(
                "render surface kind cannot change while attached".into(),
            ));
        }
        if self.config.use_texture_view != use_texture_view {
            self.config.use_texture_view = use_texture_view;
            self.surface_destroyed();
        }
        Ok(())
    }
}

impl Drop for ScanPanel {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::virtual_camera::VirtualCameraProvider;
    use crate::backends::graphics::HeadlessGraphics;
    use crate::scan::NoopCallback;

    fn panel(config: ScanConfig) -> ScanPanel {
        ScanPanel::new(
            config,
            Arc::new(VirtualCameraProvider::new()),
            Arc::new(HeadlessGraphics::new()),
            Arc::new(NoopCallback),
        )
    }

    struct FixedClip;

    impl ScanCallback for FixedClip {
        fn on_compute_clip(&self, width: u32, height: u32) -> Option<Rect> {
            Some(center_clip(width, height))
        }
    }

    #[test]
    fn test_center_clip_portrait() {
        assert_eq!(center_clip(1080, 1920), Rect::new(270, 720, 810, 1200));
        assert_eq!(center_clip(400, 400), Rect::new(100, 150, 300, 250));
    }

    #[test]
    fn test_center_clip_landscape() {
        assert_eq!(center_clip(1920, 1080), Rect::new(480, 270, 1440, 810));
    }

    #[test]
    fn test_measure_defaults_to_full_display() {
        let mut panel = panel(ScanConfig::default());
        panel.measure(640, 480);
        assert_eq!(panel.clip(), Some(Rect::new(0, 0, 640, 480)));
    }

    #[test]
    fn test_measure_uses_callback_clip() {
        let mut panel = ScanPanel::new(
            ScanConfig::default(),
            Arc::new(VirtualCameraProvider::new()),
            Arc::new(HeadlessGraphics::new()),
            Arc::new(FixedClip),
        );
        panel.measure(1920, 1080);
        assert_eq!(panel.clip(), Some(Rect::new(480, 270, 1440, 810)));
    }

    #[test]
    fn test_settings_locked_while_attached() {
        let mut panel = panel(ScanConfig::default());
        panel.attach().unwrap();
        assert!(matches!(
            panel.set_autostart(true),
            Err(AppError::IllegalState(_))
        ));
        assert!(matches!(
            panel.set_use_texture_view(true),
            Err(AppError::IllegalState(_))
        ));
        panel.detach();
        panel.set_autostart(true).unwrap();
        panel.set_use_texture_view(true).unwrap();
        assert!(panel.config().autostart);
        assert!(panel.config().use_texture_view);
    }

    #[test]
    fn test_texture_view_switch_drops_surface() {
        let mut panel = panel(ScanConfig::default());
        panel.surface_changed(SurfaceHandle(1), 100, 100);
        panel.set_use_texture_view(true).unwrap();
        assert!(panel.surface.is_none());
    }

    #[test]
    fn test_autostart_follows_attachment() {
        let mut panel = panel(ScanConfig {
            autostart: true,
            ..ScanConfig::default()
        });
        assert!(!panel.is_scanning());
        panel.attach().unwrap();
        assert!(panel.is_scanning());
        panel.detach();
        assert!(!panel.is_scanning());
    }

    #[test]
    fn test_manual_start_without_autostart() {
        let mut panel = panel(ScanConfig::default());
        panel.attach().unwrap();
        assert!(!panel.is_scanning());
        panel.start().unwrap();
        panel.start().unwrap();
        assert!(panel.is_scanning());
        panel.destroy_and_wait();
        assert!(!panel.is_scanning());
    }
}
