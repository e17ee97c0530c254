// SPDX-License-Identifier: GPL-3.0-only

//! Scan control loop
//!
//! A [`ScanHandler`] owns one scan session. Its loop thread is the only
//! thread that touches the camera, the graphics context and the render
//! targets; every other thread talks to it by pushing actions. Each pass:
//!
//! 1. make the graphics context current
//! 2. run queued actions (or exit once the session is destroyed)
//! 3. compose camera image and mask overlay onto the display surface
//! 4. start an autofocus cycle when one is due
//!
//! Teardown always runs on the loop thread: camera first, then the display
//! surface and mask, then the context.

use super::action_queue::{ActionQueue, SessionState, run_actions};
use super::callback::ScanCallback;
use super::focus::FocusSchedule;
use crate::backends::camera::{
    Camera, CameraFacing, CameraInfo, CameraProvider, DisplayRotation, display_orientation,
    select_default_camera, select_preview_config,
};
use crate::backends::graphics::{
    Drawer2D, GraphicsBackend, GraphicsContext, MaskTexture, SurfaceHandle, SurfaceWindow,
    TextureWindow,
};
use crate::config::ScanConfig;
use crate::constants::layers::{CAMERA_Z, MASK_Z};
use crate::decoder::{FrameDecoder, FrameHandler};
use crate::errors::{AppError, AppResult, CameraError};
use crate::geometry::{ContentMatrix, Rect, RectF};
use image::{Rgba, RgbaImage};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, error, info, trace, warn};

/// Collaborators moved onto the loop thread by `start`
struct Collaborators {
    config: ScanConfig,
    provider: Arc<dyn CameraProvider>,
    graphics: Arc<dyn GraphicsBackend>,
    callback: Arc<dyn ScanCallback>,
}

/// Handle to a scan session
///
/// All methods are safe to call from any thread. Configuration calls are
/// applied by the loop in call order and ignored once the session is
/// destroyed. Dropping the handle destroys the session without waiting.
pub struct ScanHandler {
    queue: ActionQueue<ScanLoop>,
    collaborators: Mutex<Option<Collaborators>>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl ScanHandler {
    pub fn new(
        config: ScanConfig,
        provider: Arc<dyn CameraProvider>,
        graphics: Arc<dyn GraphicsBackend>,
        callback: Arc<dyn ScanCallback>,
    ) -> Self {
        Self {
            queue: ActionQueue::new(),
            collaborators: Mutex::new(Some(Collaborators {
                config,
                provider,
                graphics,
                callback,
            })),
            thread: Mutex::new(None),
        }
    }

    /// Spawn the loop thread; no-op unless the session has not started yet
    pub fn start(&self) -> AppResult<()> {
        if !self.queue.start() {
            debug!(state = ?self.queue.state(), "Scan session already started");
            return Ok(());
        }
        let Some(collaborators) = self
            .collaborators
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        else {
            return Ok(());
        };

        let queue = self.queue.clone();
        let spawned = thread::Builder::new()
            .name("scan-loop".into())
            .spawn(move || run_session(collaborators, queue));
        match spawned {
            Ok(handle) => {
                *self.thread.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.queue.destroy();
                Err(AppError::Other(format!("Failed to spawn scan loop: {}", e)))
            }
        }
    }

    /// Bind a display surface, or unbind with `None`
    ///
    /// Binding opens and configures the camera; unbinding closes it.
    pub fn set_surface(&self, surface: Option<SurfaceHandle>, width: u32, height: u32) {
        self.queue.push(move |lp: &mut ScanLoop| lp.apply_surface(surface, width, height));
    }

    pub fn set_display_rotation(&self, rotation: DisplayRotation) {
        self.queue.push(move |lp: &mut ScanLoop| {
            lp.display_rotation = rotation;
            if lp.camera.is_some() && lp.surface.is_some() {
                lp.configure_camera()?;
            }
            Ok(())
        });
    }

    /// Scan area in display coordinates; `None` scans the whole frame
    pub fn set_clip(&self, clip: Option<Rect>) {
        self.queue.push(move |lp: &mut ScanLoop| {
            lp.clip = clip;
            lp.refresh_frame_clip();
            lp.mask_dirty = true;
            Ok(())
        });
    }

    pub fn set_frame_decoder(&self, decoder: Option<Arc<dyn FrameDecoder>>) {
        self.queue.push(move |lp: &mut ScanLoop| {
            if let Some(stream) = lp.stream() {
                stream.frame_handler.set_decoder(decoder.clone());
            }
            lp.decoder = decoder;
            Ok(())
        });
    }

    /// Resume decoding after a result
    pub fn next(&self) {
        self.queue.push(|lp: &mut ScanLoop| {
            if let Some(stream) = lp.stream() {
                stream.frame_handler.request_next_frame();
            }
            Ok(())
        });
    }

    /// Repaint the mask overlay on the next frame
    pub fn invalidate_mask(&self) {
        self.queue.push(|lp: &mut ScanLoop| {
            lp.mask_dirty = true;
            Ok(())
        });
    }

    /// End the session; resources are released by the loop thread
    pub fn destroy(&self) {
        if self.queue.destroy() {
            debug!("Scan session destroyed");
        }
        // Never started: nothing will run, drop the collaborators now
        self.collaborators
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
    }

    /// Wait for the loop thread to exit
    ///
    /// Call after [`destroy`](Self::destroy); returns immediately when the
    /// loop never started or when called from the loop thread itself.
    pub fn join(&self) {
        let handle = self.thread.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(handle) = handle {
            if handle.thread().id() == thread::current().id() {
                *self.thread.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
                return;
            }
            if handle.join().is_err() {
                warn!("Scan loop thread panicked");
            }
        }
    }

    pub fn state(&self) -> SessionState {
        self.queue.state()
    }
}

impl Drop for ScanHandler {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Loop thread entry: run, report, tear down
fn run_session(collaborators: Collaborators, queue: ActionQueue<ScanLoop>) {
    info!("Scan loop started");
    let callback = Arc::clone(&collaborators.callback);
    callback.on_scan_start();

    let mut scan_loop = ScanLoop::new(collaborators, queue.clone());
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| scan_loop.run()));
    let failure = match outcome {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(e),
        Err(payload) => Some(AppError::Panicked(panic_message(payload.as_ref()))),
    };
    if let Some(e) = &failure {
        error!(error = %e, "Scan loop failed");
        callback.on_scan_error(e);
    }

    // A failed session does not accept further actions
    queue.destroy();
    if panic::catch_unwind(AssertUnwindSafe(|| scan_loop.teardown())).is_err() {
        error!("Scan loop teardown panicked");
    }
    info!("Scan loop ended");
    callback.on_scan_end();
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Display surface plus the mask overlay drawn on top of the camera image
struct DisplaySurface {
    window: Box<dyn SurfaceWindow>,
    mask_canvas: RgbaImage,
    mask_texture: Box<dyn MaskTexture>,
    mask_drawer: Drawer2D,
}

/// Preview stream of a configured camera
struct CameraStream {
    texture: Box<dyn TextureWindow>,
    matrix: ContentMatrix,
    drawer: Drawer2D,
    frame_handler: FrameHandler,
    /// Clip in frame coordinates, derived from the display clip
    frame_clip: Option<Rect>,
    generation: u64,
}

struct OpenCamera {
    device: Arc<dyn Camera>,
    info: CameraInfo,
    stream: Option<CameraStream>,
}

/// State owned by the loop thread
struct ScanLoop {
    config: ScanConfig,
    provider: Arc<dyn CameraProvider>,
    graphics: Arc<dyn GraphicsBackend>,
    callback: Arc<dyn ScanCallback>,
    queue: ActionQueue<ScanLoop>,
    context: Option<Box<dyn GraphicsContext>>,
    surface: Option<DisplaySurface>,
    camera: Option<OpenCamera>,
    display_rotation: DisplayRotation,
    clip: Option<Rect>,
    decoder: Option<Arc<dyn FrameDecoder>>,
    focus: FocusSchedule,
    mask_dirty: bool,
    generation: u64,
}

impl ScanLoop {
    fn new(collaborators: Collaborators, queue: ActionQueue<ScanLoop>) -> Self {
        let Collaborators {
            config,
            provider,
            graphics,
            callback,
        } = collaborators;
        Self {
            focus: FocusSchedule::new(config.focus_interval()),
            display_rotation: config.display_rotation,
            config,
            provider,
            graphics,
            callback,
            queue,
            context: None,
            surface: None,
            camera: None,
            clip: None,
            decoder: None,
            mask_dirty: true,
            generation: 0,
        }
    }

    fn run(&mut self) -> AppResult<()> {
        self.context = Some(self.graphics.create_context()?);
        loop {
            self.context_mut()?.make_current()?;
            let Some(actions) = self.queue.drain() else {
                break;
            };
            run_actions(actions, self)?;

            let presented = self.render()?;
            self.update_focus();
            if !presented {
                thread::sleep(self.config.idle_interval());
            }
        }
        Ok(())
    }

    fn context_mut(&mut self) -> AppResult<&mut Box<dyn GraphicsContext>> {
        self.context
            .as_mut()
            .ok_or_else(|| AppError::IllegalState("graphics context released".into()))
    }

    fn stream(&self) -> Option<&CameraStream> {
        self.camera.as_ref().and_then(|c| c.stream.as_ref())
    }

    /// Compose one frame; returns whether it was presented
    fn render(&mut self) -> AppResult<bool> {
        let Some(context) = self.context.as_deref_mut() else {
            return Ok(false);
        };
        let Some(surface) = self.surface.as_mut() else {
            return Ok(false);
        };
        if !surface.window.make_current() {
            warn!("Display surface make_current failed, skipping frame");
            return Ok(false);
        }

        context.clear(self.config.clear_color)?;

        if let Some(stream) = self.camera.as_mut().and_then(|c| c.stream.as_mut()) {
            match stream.texture.update_tex_image() {
                Ok(()) => {
                    let command = stream.drawer.camera_command(
                        stream.texture.preview_target(),
                        stream.texture.transform_matrix(),
                    );
                    context.draw(&command)?;
                }
                Err(e) => warn!(error = %e, "Camera texture update failed"),
            }
        }

        if self.mask_dirty {
            for pixel in surface.mask_canvas.pixels_mut() {
                *pixel = Rgba([0, 0, 0, 0]);
            }
            self.callback.on_draw_mask(&mut surface.mask_canvas, self.clip);
            surface.mask_texture.upload(&surface.mask_canvas)?;
            self.mask_dirty = false;
            trace!("Mask overlay repainted");
        }
        context.draw(&surface.mask_drawer.texture_command(surface.mask_texture.id()))?;

        if !surface.window.commit() {
            warn!("Display surface commit failed");
        }
        Ok(true)
    }

    fn update_focus(&mut self) {
        let Some(camera) = &self.camera else {
            return;
        };
        let Some(cycle) = self.focus.begin_if_due(Instant::now()) else {
            return;
        };
        let queue = self.queue.clone();
        camera.device.auto_focus(Box::new(move |success| {
            queue.push(move |lp: &mut ScanLoop| {
                if lp.focus.complete(cycle, success, Instant::now()) {
                    debug!(cycle, success, "Autofocus finished");
                }
                Ok(())
            });
        }));
    }

    fn apply_surface(
        &mut self,
        handle: Option<SurfaceHandle>,
        width: u32,
        height: u32,
    ) -> AppResult<()> {
        self.clear_surface();
        let handle = match handle {
            Some(handle) if width > 0 && height > 0 => handle,
            _ => {
                self.close_camera();
                return Ok(());
            }
        };

        let context = self.context_mut()?;
        let mut window = context.create_surface_window(handle, width, height)?;
        let mask_texture = match context.create_mask_texture(width, height) {
            Ok(texture) => texture,
            Err(e) => {
                window.release();
                return Err(e.into());
            }
        };
        let rect = RectF::from_size(width as f32, height as f32);
        let mask_matrix = ContentMatrix::new(rect, rect);
        self.surface = Some(DisplaySurface {
            window,
            mask_canvas: RgbaImage::new(width, height),
            mask_texture,
            mask_drawer: Drawer2D::new(&mask_matrix, MASK_Z),
        });
        self.mask_dirty = true;
        debug!(?handle, width, height, "Display surface bound");

        if self.camera.is_none() {
            self.open_camera()?;
        }
        if self.camera.is_some() {
            self.configure_camera()?;
        }
        Ok(())
    }

    fn open_camera(&mut self) -> AppResult<()> {
        let cameras = self.provider.cameras();
        let id = match self.callback.on_switch_camera(&cameras) {
            Some(id) => Some(id),
            None => select_default_camera(&cameras, self.config.facing),
        };
        let Some(info) = id.and_then(|id| cameras.iter().find(|c| c.id == id)).cloned() else {
            warn!(
                requested = ?id,
                facing = %self.config.facing,
                available = cameras.len(),
                "No matching camera, scanning without one"
            );
            return Ok(());
        };

        let device = self.provider.open(info.id)?;
        info!(
            id = info.id,
            facing = %info.facing,
            orientation = info.orientation,
            "Camera opened"
        );
        self.camera = Some(OpenCamera {
            device,
            info,
            stream: None,
        });
        Ok(())
    }

    /// (Re)configure the open camera for the current surface and rotation
    ///
    /// A camera without any usable preview configuration is closed and the
    /// session carries on without it.
    fn configure_camera(&mut self) -> AppResult<()> {
        match self.try_configure_camera() {
            Err(AppError::Camera(CameraError::NoPreviewConfiguration)) => {
                warn!("Camera has no usable preview configuration, closing it");
                self.close_camera();
                Ok(())
            }
            other => other,
        }
    }

    fn try_configure_camera(&mut self) -> AppResult<()> {
        let Some(surface) = &self.surface else {
            return Ok(());
        };
        let (surface_width, surface_height) = (surface.window.width(), surface.window.height());
        let Some(camera) = self.camera.as_mut() else {
            return Ok(());
        };
        let Some(context) = self.context.as_deref_mut() else {
            return Err(AppError::IllegalState("graphics context released".into()));
        };

        camera.device.stop_preview();
        if let Some(stream) = camera.stream.take() {
            release_stream(stream);
        }

        let degrees = display_orientation(&camera.info, self.display_rotation);
        let parameters = camera.device.parameters()?;
        let (config, size) =
            select_preview_config(&parameters, degrees, surface_width, surface_height)?;
        camera.device.configure(&config)?;

        let texture = context.create_texture_window(size.width, size.height)?;
        let mut matrix = ContentMatrix::new(
            RectF::from_size(texture.width() as f32, texture.height() as f32),
            RectF::from_size(surface_width as f32, surface_height as f32),
        );
        matrix.update(self.config.scale_type, degrees as i32, false);
        let drawer = Drawer2D::new(&matrix, CAMERA_Z);

        self.generation += 1;
        let generation = self.generation;
        let frame_clip = convert_clip(self.clip, &matrix, camera.info.facing);
        let frame_handler = FrameHandler::new();
        frame_handler.set_clip(frame_clip);
        frame_handler.set_decoder(self.decoder.clone());
        let queue = self.queue.clone();
        frame_handler.set_callback(move |text| {
            queue.push(move |lp: &mut ScanLoop| {
                lp.handle_decode_result(generation, text);
                Ok(())
            });
        });

        let target = texture.preview_target();
        camera.stream = Some(CameraStream {
            texture,
            matrix,
            drawer,
            frame_handler: frame_handler.clone(),
            frame_clip,
            generation,
        });

        camera.device.set_preview_target(target)?;
        camera.device.start_preview()?;
        frame_handler.start(Arc::clone(&camera.device))?;
        frame_handler.request_next_frame();
        self.focus.schedule_now(Instant::now());

        info!(
            degrees,
            preview = %config,
            surface_width,
            surface_height,
            "Camera configured"
        );
        Ok(())
    }

    /// Recompute the frame-space clip after the display clip changed
    fn refresh_frame_clip(&mut self) {
        let clip = self.clip;
        let Some(camera) = self.camera.as_mut() else {
            return;
        };
        let facing = camera.info.facing;
        if let Some(stream) = camera.stream.as_mut() {
            stream.frame_clip = convert_clip(clip, &stream.matrix, facing);
            stream.frame_handler.set_clip(stream.frame_clip);
            trace!(frame_clip = ?stream.frame_clip, "Frame clip updated");
        }
    }

    fn handle_decode_result(&mut self, generation: u64, text: Option<String>) {
        let Some(stream) = self.stream() else {
            return;
        };
        if stream.generation != generation {
            trace!(generation, "Dropping result of a replaced frame handler");
            return;
        }
        match text {
            Some(text) => {
                debug!(len = text.len(), "Scan result");
                self.callback.on_scan_result(&text);
            }
            None => {
                stream.frame_handler.request_next_frame();
            }
        }
    }

    fn close_camera(&mut self) {
        if let Some(mut camera) = self.camera.take() {
            let stream = camera.stream.take();
            if let Some(stream) = &stream {
                stream.frame_handler.destroy();
            }
            camera.device.stop_preview();
            if let Some(stream) = stream {
                release_stream(stream);
            }
            camera.device.release();
            info!(id = camera.info.id, "Camera closed");
        }
        self.focus.disable();
    }

    fn clear_surface(&mut self) {
        if let Some(mut surface) = self.surface.take() {
            surface.window.release();
            surface.mask_texture.release();
            debug!("Display surface released");
        }
    }

    fn teardown(&mut self) {
        self.close_camera();
        self.clear_surface();
        if let Some(mut context) = self.context.take() {
            context.release();
        }
    }
}

fn release_stream(mut stream: CameraStream) {
    stream.frame_handler.destroy();
    stream.texture.release();
}

/// Map the display clip into camera frame coordinates
///
/// Front cameras deliver mirrored frames, so the horizontal extent is
/// mirrored across the frame width.
fn convert_clip(clip: Option<Rect>, matrix: &ContentMatrix, facing: CameraFacing) -> Option<Rect> {
    let clip = clip?;
    let mut mapped = matrix.viewport_to_content_2d(&RectF::from(clip));
    if facing == CameraFacing::Front {
        let width = matrix.content_rect().width();
        let (left, right) = (width - mapped.right, width - mapped.left);
        mapped.left = left;
        mapped.right = right;
    }
    Some(mapped.truncate())
}
