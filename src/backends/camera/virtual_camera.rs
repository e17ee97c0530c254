// SPDX-License-Identifier: GPL-3.0-only

//! Virtual camera backed by a still image
//!
//! Each virtual device streams the same picture over and over, converted to
//! the configured preview size and NV21. Frames are produced on a dedicated
//! thread paced by the configured fps range, and only while a one-shot
//! callback is armed. Autofocus always completes after a short delay with a
//! configurable outcome.

use super::types::{
    CameraFacing, CameraInfo, CameraParameters, FpsRange, PixelFormat, PreviewConfig,
    PreviewFrame, PreviewTarget,
};
use super::{Camera, CameraProvider, FocusCallback, PreviewCallback};
use crate::constants::timing;
use crate::errors::{CameraError, CameraResult};
use image::RgbaImage;
use image::imageops::{self, FilterType};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// A virtual device description
#[derive(Clone)]
struct VirtualDevice {
    info: CameraInfo,
    source: Arc<RgbaImage>,
    parameters: CameraParameters,
    focus_result: bool,
}

/// Provider exposing image-backed virtual cameras
#[derive(Default)]
pub struct VirtualCameraProvider {
    devices: Vec<VirtualDevice>,
    opened: Mutex<Vec<Arc<VirtualCamera>>>,
}

impl VirtualCameraProvider {
    /// Provider without any camera
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a camera showing `image`
    ///
    /// The camera advertises the image size, half of it, and two fps ranges.
    pub fn with_camera(
        mut self,
        name: &str,
        facing: CameraFacing,
        orientation: u32,
        image: RgbaImage,
    ) -> Self {
        let (w, h) = image.dimensions();
        let mut preview_sizes = vec![(w, h)];
        let half = ((w / 2) & !1, (h / 2) & !1);
        if half.0 > 0 && half.1 > 0 && half != (w, h) {
            preview_sizes.push(half);
        }
        let parameters = CameraParameters {
            fps_ranges: vec![FpsRange::new(15000, 30000), FpsRange::new(30000, 30000)],
            preview_formats: vec![PixelFormat::NV21, PixelFormat::NV12],
            preview_sizes,
        };
        self.devices.push(VirtualDevice {
            info: CameraInfo {
                id: self.devices.len(),
                name: name.to_string(),
                facing,
                orientation,
            },
            source: Arc::new(image),
            parameters,
            focus_result: true,
        });
        self
    }

    /// Replace the parameters advertised by the most recently added camera
    pub fn with_parameters(mut self, parameters: CameraParameters) -> Self {
        if let Some(device) = self.devices.last_mut() {
            device.parameters = parameters;
        }
        self
    }

    /// Outcome reported by autofocus on the most recently added camera
    pub fn with_focus_result(mut self, success: bool) -> Self {
        if let Some(device) = self.devices.last_mut() {
            device.focus_result = success;
        }
        self
    }

    /// Every camera opened so far, in open order
    pub fn opened_cameras(&self) -> Vec<Arc<VirtualCamera>> {
        self.opened
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl CameraProvider for VirtualCameraProvider {
    fn cameras(&self) -> Vec<CameraInfo> {
        self.devices.iter().map(|d| d.info.clone()).collect()
    }

    fn open(&self, id: usize) -> CameraResult<Arc<dyn Camera>> {
        let device = self
            .devices
            .get(id)
            .ok_or_else(|| CameraError::OpenFailed(format!("No virtual camera with id {}", id)))?;
        debug!(id, name = %device.info.name, "Opening virtual camera");
        let camera = Arc::new(VirtualCamera::new(device.clone()));
        self.opened
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Arc::clone(&camera));
        Ok(camera)
    }
}

/// Mutable device state guarded by [`Shared::state`]
#[derive(Default)]
struct CameraState {
    config: Option<PreviewConfig>,
    target: Option<PreviewTarget>,
    previewing: bool,
    released: bool,
    pending: Option<PreviewCallback>,
    /// NV21 rendition of the source at the configured size
    cached_frame: Option<(u32, u32, Arc<[u8]>)>,
}

struct Shared {
    device: VirtualDevice,
    state: Mutex<CameraState>,
    wake: Condvar,
    frames_delivered: AtomicUsize,
    focus_requests: AtomicUsize,
}

/// An open virtual camera
pub struct VirtualCamera {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl VirtualCamera {
    fn new(device: VirtualDevice) -> Self {
        Self {
            shared: Arc::new(Shared {
                device,
                state: Mutex::new(CameraState::default()),
                wake: Condvar::new(),
                frames_delivered: AtomicUsize::new(0),
                focus_requests: AtomicUsize::new(0),
            }),
            worker: Mutex::new(None),
        }
    }

    /// Number of preview frames handed to one-shot callbacks
    pub fn frames_delivered(&self) -> usize {
        self.shared.frames_delivered.load(Ordering::SeqCst)
    }

    /// Number of autofocus cycles requested
    pub fn focus_requests(&self) -> usize {
        self.shared.focus_requests.load(Ordering::SeqCst)
    }

    pub fn is_previewing(&self) -> bool {
        self.shared
            .state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .previewing
    }

    pub fn is_released(&self) -> bool {
        self.shared
            .state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .released
    }

    pub fn preview_target(&self) -> Option<PreviewTarget> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .target
    }

    fn join_worker(&self) {
        let handle = self.worker.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(handle) = handle {
            // stop_preview may be reached from a frame callback on the worker itself
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                warn!("Virtual camera thread panicked");
            }
        }
    }
}

impl Camera for VirtualCamera {
    fn info(&self) -> &CameraInfo {
        &self.shared.device.info
    }

    fn parameters(&self) -> CameraResult<CameraParameters> {
        let state = self.shared.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.released {
            return Err(CameraError::Released);
        }
        Ok(self.shared.device.parameters.clone())
    }

    fn configure(&self, config: &PreviewConfig) -> CameraResult<()> {
        let params = &self.shared.device.parameters;
        if !params.fps_ranges.contains(&config.fps_range) {
            return Err(CameraError::ParametersRejected(format!(
                "unsupported fps range {}",
                config.fps_range
            )));
        }
        if !params.preview_formats.contains(&config.format) {
            return Err(CameraError::ParametersRejected(format!(
                "unsupported preview format {}",
                config.format
            )));
        }
        if !params
            .preview_sizes
            .contains(&(config.width, config.height))
        {
            return Err(CameraError::ParametersRejected(format!(
                "unsupported preview size {}x{}",
                config.width, config.height
            )));
        }

        let mut state = self.shared.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.released {
            return Err(CameraError::Released);
        }
        if state.previewing {
            return Err(CameraError::ParametersRejected(
                "cannot reconfigure while previewing".into(),
            ));
        }
        debug!(config = %config, "Virtual camera configured");
        state.config = Some(*config);
        state.cached_frame = None;
        Ok(())
    }

    fn preview_config(&self) -> Option<PreviewConfig> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .config
    }

    fn set_preview_target(&self, target: PreviewTarget) -> CameraResult<()> {
        let mut state = self.shared.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.released {
            return Err(CameraError::Released);
        }
        state.target = Some(target);
        Ok(())
    }

    fn start_preview(&self) -> CameraResult<()> {
        {
            let mut state = self.shared.state.lock().unwrap_or_else(|e| e.into_inner());
            if state.released {
                return Err(CameraError::Released);
            }
            if state.previewing {
                return Ok(());
            }
            if state.config.is_none() {
                return Err(CameraError::PreviewFailed("camera not configured".into()));
            }
            state.previewing = true;
        }

        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name("virtual-camera".into())
            .spawn(move || frame_loop(shared))
            .map_err(|e| CameraError::PreviewFailed(e.to_string()))?;
        *self.worker.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
        info!(name = %self.shared.device.info.name, "Virtual camera preview started");
        Ok(())
    }

    fn stop_preview(&self) {
        {
            let mut state = self.shared.state.lock().unwrap_or_else(|e| e.into_inner());
            if !state.previewing {
                return;
            }
            state.previewing = false;
            state.pending = None;
        }
        self.shared.wake.notify_all();
        self.join_worker();
        debug!("Virtual camera preview stopped");
    }

    fn set_one_shot_preview_callback(&self, callback: PreviewCallback) {
        let mut state = self.shared.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.released {
            return;
        }
        state.pending = Some(callback);
        drop(state);
        self.shared.wake.notify_all();
    }

    fn auto_focus(&self, callback: FocusCallback) {
        self.shared.focus_requests.fetch_add(1, Ordering::SeqCst);
        let released = self
            .shared
            .state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .released;
        if released {
            callback(false);
            return;
        }
        let success = self.shared.device.focus_result;
        let spawned = thread::Builder::new()
            .name("virtual-focus".into())
            .spawn(move || {
                thread::sleep(timing::VIRTUAL_FOCUS_DELAY);
                callback(success);
            });
        if let Err(e) = spawned {
            warn!(error = %e, "Failed to spawn autofocus thread");
        }
    }

    fn release(&self) {
        self.stop_preview();
        let mut state = self.shared.state.lock().unwrap_or_else(|e| e.into_inner());
        if !state.released {
            state.released = true;
            state.pending = None;
            state.cached_frame = None;
            info!(name = %self.shared.device.info.name, "Virtual camera released");
        }
    }
}

impl Drop for VirtualCamera {
    fn drop(&mut self) {
        self.release();
    }
}

/// Interval between frames for the configured fps range
fn frame_interval(config: Option<&PreviewConfig>) -> Duration {
    match config {
        Some(c) if c.fps_range.max > 0 => {
            Duration::from_micros(1_000_000_000 / u64::from(c.fps_range.max))
        }
        _ => timing::VIRTUAL_CAMERA_FRAME_INTERVAL,
    }
}

fn frame_loop(shared: Arc<Shared>) {
    debug!("Virtual camera thread started");
    loop {
        let (callback, frame) = {
            let mut state = shared.state.lock().unwrap_or_else(|e| e.into_inner());
            loop {
                if !state.previewing || state.released {
                    debug!("Virtual camera thread exiting");
                    return;
                }
                if state.pending.is_some() {
                    break;
                }
                state = shared.wake.wait(state).unwrap_or_else(|e| e.into_inner());
            }

            // Pace delivery like a real sensor
            let interval = frame_interval(state.config.as_ref());
            let (guard, _) = shared
                .wake
                .wait_timeout(state, interval)
                .unwrap_or_else(|e| e.into_inner());
            state = guard;
            if !state.previewing || state.released {
                return;
            }
            let Some(callback) = state.pending.take() else {
                continue;
            };
            let Some(config) = state.config else {
                continue;
            };
            let cached = state
                .cached_frame
                .as_ref()
                .filter(|(w, h, _)| (*w, *h) == (config.width, config.height))
                .map(|(_, _, data)| Arc::clone(data));
            let data = match cached {
                Some(data) => data,
                None => {
                    let data = render_frame(&shared.device.source, &config);
                    state.cached_frame = Some((config.width, config.height, Arc::clone(&data)));
                    data
                }
            };
            let frame = PreviewFrame {
                data,
                width: config.width,
                height: config.height,
                format: config.format,
                captured_at: Instant::now(),
            };
            (callback, frame)
        };

        shared.frames_delivered.fetch_add(1, Ordering::SeqCst);
        callback(frame);
    }
}

/// Scale the source to the preview size and convert it to the preview format
fn render_frame(source: &RgbaImage, config: &PreviewConfig) -> Arc<[u8]> {
    let scaled;
    let img = if source.dimensions() == (config.width, config.height) {
        source
    } else {
        scaled = imageops::resize(source, config.width, config.height, FilterType::Triangle);
        &scaled
    };
    let data = match config.format {
        PixelFormat::NV12 => rgba_to_semi_planar(img, false),
        _ => rgba_to_semi_planar(img, true),
    };
    Arc::from(data.into_boxed_slice())
}

/// Convert RGBA to NV21 (`vu_order`) or NV12 using full-range BT.601
pub fn rgba_to_semi_planar(img: &RgbaImage, vu_order: bool) -> Vec<u8> {
    let (width, height) = img.dimensions();
    let chroma_w = width.div_ceil(2);
    let chroma_h = height.div_ceil(2);
    let luma_len = (width * height) as usize;
    let mut out = vec![0u8; luma_len + (chroma_w * chroma_h * 2) as usize];

    for (x, y, px) in img.enumerate_pixels() {
        let [r, g, b, _] = px.0;
        let (r, g, b) = (i32::from(r), i32::from(g), i32::from(b));
        out[(y * width + x) as usize] = ((77 * r + 150 * g + 29 * b) >> 8).clamp(0, 255) as u8;

        if x % 2 == 0 && y % 2 == 0 {
            let u = (((-43 * r - 85 * g + 128 * b) >> 8) + 128).clamp(0, 255) as u8;
            let v = (((128 * r - 107 * g - 21 * b) >> 8) + 128).clamp(0, 255) as u8;
            let offset = luma_len + ((y / 2) * chroma_w * 2 + (x / 2) * 2) as usize;
            let (first, second) = if vu_order { (v, u) } else { (u, v) };
            out[offset] = first;
            out[offset + 1] = second;
        }
    }
    out
}
