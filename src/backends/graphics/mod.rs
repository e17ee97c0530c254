// SPDX-License-Identifier: GPL-3.0-only

//! Graphics capability abstraction
//!
//! The control loop composes each displayed frame from two textured quads:
//! the camera preview (an external texture the camera streams into) and the
//! mask overlay (a 2D texture uploaded from a CPU canvas). The GPU plumbing
//! itself sits behind these traits; [`headless`] implements them in memory.
//!
//! All objects created from a [`GraphicsContext`] belong to the thread that
//! created the context and are released there.

pub mod drawer;
pub mod headless;

pub use drawer::{DrawCommand, Drawer2D, TextureKind};
pub use headless::{HeadlessGraphics, HeadlessStats, ReleaseEvent};

use crate::backends::camera::PreviewTarget;
use crate::errors::GraphicsResult;
use crate::geometry::matrix3d::Mat4;
use image::RgbaImage;

/// Opaque handle of a host display surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceHandle(pub u64);

/// Creates rendering contexts
pub trait GraphicsBackend: Send + Sync {
    /// Create a context on the calling thread
    fn create_context(&self) -> GraphicsResult<Box<dyn GraphicsContext>>;
}

/// A rendering context bound to one thread
pub trait GraphicsContext {
    /// Bind the context's default target to the calling thread
    fn make_current(&mut self) -> GraphicsResult<()>;

    /// Wrap a host display surface as a render target
    fn create_surface_window(
        &mut self,
        handle: SurfaceHandle,
        width: u32,
        height: u32,
    ) -> GraphicsResult<Box<dyn SurfaceWindow>>;

    /// Create an external texture the camera can stream into
    fn create_texture_window(
        &mut self,
        width: u32,
        height: u32,
    ) -> GraphicsResult<Box<dyn TextureWindow>>;

    /// Create a 2D texture for the mask overlay
    fn create_mask_texture(&mut self, width: u32, height: u32)
    -> GraphicsResult<Box<dyn MaskTexture>>;

    /// Clear the current render target
    fn clear(&mut self, color: [f32; 4]) -> GraphicsResult<()>;

    /// Draw one textured quad into the current render target
    fn draw(&mut self, command: &DrawCommand) -> GraphicsResult<()>;

    /// Release the context; objects created from it must be released first
    fn release(&mut self);
}

/// Display surface render target
pub trait SurfaceWindow {
    fn width(&self) -> u32;
    fn height(&self) -> u32;

    /// Make this surface the current render target; `false` skips the frame
    fn make_current(&mut self) -> bool;

    /// Present the composed frame
    fn commit(&mut self) -> bool;

    fn release(&mut self);
}

/// External texture receiving the camera preview
pub trait TextureWindow {
    fn width(&self) -> u32;
    fn height(&self) -> u32;

    /// Target handed to [`Camera::set_preview_target`](crate::backends::camera::Camera::set_preview_target)
    fn preview_target(&self) -> PreviewTarget;

    /// Latch the most recent camera image into the texture
    fn update_tex_image(&mut self) -> GraphicsResult<()>;

    /// Texture coordinate transform reported alongside the latched image
    fn transform_matrix(&self) -> Mat4;

    fn release(&mut self);
}

/// 2D texture holding the mask overlay
pub trait MaskTexture {
    fn id(&self) -> u64;

    /// Replace the texture content with `canvas`
    fn upload(&mut self, canvas: &RgbaImage) -> GraphicsResult<()>;

    fn release(&mut self);
}
