// SPDX-License-Identifier: GPL-3.0-only

//! In-memory graphics backend
//!
//! Nothing is rasterised. The backend validates calls, paces `commit` to a
//! fixed frame interval and records what happened in [`HeadlessStats`], which
//! the CLI and the integration tests inspect.

use super::{
    DrawCommand, GraphicsBackend, GraphicsContext, MaskTexture, SurfaceHandle, SurfaceWindow,
    TextureKind, TextureWindow,
};
use crate::backends::camera::PreviewTarget;
use crate::constants::timing;
use crate::errors::{GraphicsError, GraphicsResult};
use crate::geometry::matrix3d::{IDENTITY, Mat4};
use image::RgbaImage;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, trace};

/// Resource released through the headless backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseEvent {
    TextureWindow,
    SurfaceWindow,
    MaskTexture,
    Context,
}

/// Counters and captures shared by every object of one [`HeadlessGraphics`]
#[derive(Debug, Default)]
pub struct HeadlessStats {
    contexts_created: AtomicUsize,
    surfaces_created: AtomicUsize,
    texture_windows_created: AtomicUsize,
    frames_presented: AtomicUsize,
    camera_draws: AtomicUsize,
    mask_draws: AtomicUsize,
    mask_uploads: AtomicUsize,
    make_current_failures: AtomicUsize,
    pending_make_current_failures: AtomicUsize,
    fail_context_creation: AtomicBool,
    last_mask: Mutex<Option<RgbaImage>>,
    releases: Mutex<Vec<ReleaseEvent>>,
}

impl HeadlessStats {
    pub fn contexts_created(&self) -> usize {
        self.contexts_created.load(Ordering::SeqCst)
    }

    pub fn surfaces_created(&self) -> usize {
        self.surfaces_created.load(Ordering::SeqCst)
    }

    /// Camera texture windows created, one per camera (re)configuration
    pub fn texture_windows_created(&self) -> usize {
        self.texture_windows_created.load(Ordering::SeqCst)
    }

    pub fn frames_presented(&self) -> usize {
        self.frames_presented.load(Ordering::SeqCst)
    }

    pub fn camera_draws(&self) -> usize {
        self.camera_draws.load(Ordering::SeqCst)
    }

    pub fn mask_draws(&self) -> usize {
        self.mask_draws.load(Ordering::SeqCst)
    }

    pub fn mask_uploads(&self) -> usize {
        self.mask_uploads.load(Ordering::SeqCst)
    }

    /// Surface `make_current` calls that reported failure
    pub fn make_current_failures(&self) -> usize {
        self.make_current_failures.load(Ordering::SeqCst)
    }

    /// Make the next `count` surface `make_current` calls fail
    pub fn fail_next_make_current(&self, count: usize) {
        self.pending_make_current_failures
            .store(count, Ordering::SeqCst);
    }

    /// Make context creation fail
    pub fn set_fail_context_creation(&self, fail: bool) {
        self.fail_context_creation.store(fail, Ordering::SeqCst);
    }

    /// Copy of the most recently uploaded mask canvas
    pub fn last_mask(&self) -> Option<RgbaImage> {
        self.last_mask
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Resources released so far, in release order
    pub fn releases(&self) -> Vec<ReleaseEvent> {
        self.releases
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn record_release(&self, event: ReleaseEvent) {
        self.releases
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
    }

    fn take_forced_failure(&self) -> bool {
        self.pending_make_current_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

/// Graphics backend that renders nowhere
#[derive(Debug, Clone)]
pub struct HeadlessGraphics {
    stats: Arc<HeadlessStats>,
    frame_interval: Duration,
}

impl Default for HeadlessGraphics {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessGraphics {
    pub fn new() -> Self {
        Self {
            stats: Arc::new(HeadlessStats::default()),
            frame_interval: timing::HEADLESS_FRAME_INTERVAL,
        }
    }

    /// Time `commit` blocks for, emulating display refresh
    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    pub fn stats(&self) -> Arc<HeadlessStats> {
        Arc::clone(&self.stats)
    }
}

impl GraphicsBackend for HeadlessGraphics {
    fn create_context(&self) -> GraphicsResult<Box<dyn GraphicsContext>> {
        if self.stats.fail_context_creation.load(Ordering::SeqCst) {
            return Err(GraphicsError::ContextCreation(
                "headless context creation disabled".into(),
            ));
        }
        self.stats.contexts_created.fetch_add(1, Ordering::SeqCst);
        debug!("Headless graphics context created");
        Ok(Box::new(HeadlessContext {
            stats: Arc::clone(&self.stats),
            frame_interval: self.frame_interval,
            next_id: 1,
            released: false,
        }))
    }
}

struct HeadlessContext {
    stats: Arc<HeadlessStats>,
    frame_interval: Duration,
    next_id: u64,
    released: bool,
}

impl HeadlessContext {
    fn check_alive(&self) -> GraphicsResult<()> {
        if self.released {
            return Err(GraphicsError::MakeCurrent("context released".into()));
        }
        Ok(())
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

impl GraphicsContext for HeadlessContext {
    fn make_current(&mut self) -> GraphicsResult<()> {
        self.check_alive()
    }

    fn create_surface_window(
        &mut self,
        handle: SurfaceHandle,
        width: u32,
        height: u32,
    ) -> GraphicsResult<Box<dyn SurfaceWindow>> {
        self.check_alive()?;
        if width == 0 || height == 0 {
            return Err(GraphicsError::SurfaceCreation(format!(
                "surface {:?} has zero size {}x{}",
                handle, width, height
            )));
        }
        self.stats.surfaces_created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(HeadlessSurface {
            width,
            height,
            frame_interval: self.frame_interval,
            stats: Arc::clone(&self.stats),
        }))
    }

    fn create_texture_window(
        &mut self,
        width: u32,
        height: u32,
    ) -> GraphicsResult<Box<dyn TextureWindow>> {
        self.check_alive()?;
        let id = self.allocate_id();
        self.stats
            .texture_windows_created
            .fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(HeadlessTextureWindow {
            width,
            height,
            target: PreviewTarget(id),
            stats: Arc::clone(&self.stats),
        }))
    }

    fn create_mask_texture(
        &mut self,
        width: u32,
        height: u32,
    ) -> GraphicsResult<Box<dyn MaskTexture>> {
        self.check_alive()?;
        let id = self.allocate_id();
        Ok(Box::new(HeadlessMaskTexture {
            id,
            width,
            height,
            stats: Arc::clone(&self.stats),
        }))
    }

    fn clear(&mut self, _color: [f32; 4]) -> GraphicsResult<()> {
        self.check_alive()
    }

    fn draw(&mut self, command: &DrawCommand) -> GraphicsResult<()> {
        self.check_alive()
            .map_err(|e| GraphicsError::Draw(e.to_string()))?;
        match command.texture {
            TextureKind::ExternalOes(_) => {
                self.stats.camera_draws.fetch_add(1, Ordering::SeqCst);
            }
            TextureKind::Texture2d(_) => {
                self.stats.mask_draws.fetch_add(1, Ordering::SeqCst);
            }
        }
        trace!(texture = ?command.texture, "Headless draw");
        Ok(())
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.stats.record_release(ReleaseEvent::Context);
            debug!("Headless graphics context released");
        }
    }
}

struct HeadlessSurface {
    width: u32,
    height: u32,
    frame_interval: Duration,
    stats: Arc<HeadlessStats>,
}

impl SurfaceWindow for HeadlessSurface {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn make_current(&mut self) -> bool {
        if self.stats.take_forced_failure() {
            self.stats
                .make_current_failures
                .fetch_add(1, Ordering::SeqCst);
            return false;
        }
        true
    }

    fn commit(&mut self) -> bool {
        if !self.frame_interval.is_zero() {
            std::thread::sleep(self.frame_interval);
        }
        self.stats.frames_presented.fetch_add(1, Ordering::SeqCst);
        true
    }

    fn release(&mut self) {
        self.stats.record_release(ReleaseEvent::SurfaceWindow);
    }
}

struct HeadlessTextureWindow {
    width: u32,
    height: u32,
    target: PreviewTarget,
    stats: Arc<HeadlessStats>,
}

impl TextureWindow for HeadlessTextureWindow {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn preview_target(&self) -> PreviewTarget {
        self.target
    }

    fn update_tex_image(&mut self) -> GraphicsResult<()> {
        Ok(())
    }

    fn transform_matrix(&self) -> Mat4 {
        IDENTITY
    }

    fn release(&mut self) {
        self.stats.record_release(ReleaseEvent::TextureWindow);
    }
}

struct HeadlessMaskTexture {
    id: u64,
    width: u32,
    height: u32,
    stats: Arc<HeadlessStats>,
}

impl MaskTexture for HeadlessMaskTexture {
    fn id(&self) -> u64 {
        self.id
    }

    fn upload(&mut self, canvas: &RgbaImage) -> GraphicsResult<()> {
        if canvas.dimensions() != (self.width, self.height) {
            return Err(GraphicsError::TextureUpload(format!(
                "canvas is {}x{}, texture is {}x{}",
                canvas.width(),
                canvas.height(),
                self.width,
                self.height
            )));
        }
        *self.stats.last_mask.lock().unwrap_or_else(|e| e.into_inner()) = Some(canvas.clone());
        self.stats.mask_uploads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn release(&mut self) {
        self.stats.record_release(ReleaseEvent::MaskTexture);
    }
}
