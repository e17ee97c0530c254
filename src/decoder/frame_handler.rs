// SPDX-License-Identifier: GPL-3.0-only

//! Frame decode pipeline
//!
//! A [`FrameHandler`] arms one-shot preview callbacks on the camera and
//! forwards each delivered frame to a single decode worker thread, so slow
//! decoders never hold up the camera callback thread. A request slot tracks
//! the single outstanding request:
//!
//! ```text
//!   request_next_frame        frame delivered         result delivered
//! Idle ──────────────▶ Armed ───────────────▶ Decoding ───────────────▶ Idle
//!                      │  ▲
//!                      └──┘ request_next_frame re-arms
//! ```
//!
//! Requests made while a frame is decoding are ignored, so every request
//! produces at most one result.

use super::FrameDecoder;
use crate::backends::camera::{Camera, PixelFormat, PreviewFrame};
use crate::errors::{AppResult, CameraError};
use crate::geometry::Rect;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::thread;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

/// Receives the outcome of one decode; `None` when nothing was decoded
pub type ResultCallback = Arc<dyn Fn(Option<String>) + Send + Sync>;

/// Progress of the single outstanding request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Idle,
    Armed,
    Decoding,
}

struct Running {
    camera: Arc<dyn Camera>,
    jobs: mpsc::UnboundedSender<PreviewFrame>,
    slot: Slot,
}

enum HandlerState {
    NotStarted,
    Running(Running),
    Destroyed,
}

struct Inner {
    state: Mutex<HandlerState>,
    decoder: Mutex<Option<Arc<dyn FrameDecoder>>>,
    clip: Mutex<Option<Rect>>,
    callback: Mutex<Option<ResultCallback>>,
    decodes: AtomicUsize,
}

/// Decouples preview frame delivery from decoding
///
/// Cloning yields another handle to the same pipeline.
#[derive(Clone)]
pub struct FrameHandler {
    inner: Arc<Inner>,
}

impl Default for FrameHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameHandler {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(HandlerState::NotStarted),
                decoder: Mutex::new(None),
                clip: Mutex::new(None),
                callback: Mutex::new(None),
                decodes: AtomicUsize::new(0),
            }),
        }
    }

    /// Decoder used for subsequent frames; `None` reports every frame as empty
    pub fn set_decoder(&self, decoder: Option<Arc<dyn FrameDecoder>>) {
        *self.inner.decoder.lock().unwrap_or_else(|e| e.into_inner()) = decoder;
    }

    /// Scan area in frame coordinates for subsequent frames
    pub fn set_clip(&self, clip: Option<Rect>) {
        *self.inner.clip.lock().unwrap_or_else(|e| e.into_inner()) = clip;
    }

    pub fn clip(&self) -> Option<Rect> {
        *self.inner.clip.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Callback receiving decode results, called on the decode worker thread
    pub fn set_callback<F>(&self, callback: F)
    where
        F: Fn(Option<String>) + Send + Sync + 'static,
    {
        *self.inner.callback.lock().unwrap_or_else(|e| e.into_inner()) = Some(Arc::new(callback));
    }

    /// Bind to a configured camera and spawn the decode worker
    ///
    /// Only the first call has an effect.
    pub fn start(&self, camera: Arc<dyn Camera>) -> AppResult<()> {
        let mut state = self.inner.state.lock().unwrap_or_else(|e| e.into_inner());
        if !matches!(*state, HandlerState::NotStarted) {
            debug!("Frame handler already started");
            return Ok(());
        }
        let config = camera
            .preview_config()
            .ok_or(CameraError::NoPreviewConfiguration)?;

        let (jobs, receiver) = mpsc::unbounded_channel();
        // The worker must not keep the handler alive: dropping the last
        // handle drops the sender and ends the worker
        let inner = Arc::downgrade(&self.inner);
        thread::Builder::new()
            .name("frame-decoder".into())
            .spawn(move || decode_loop(inner, receiver, config.format, config.width, config.height))
            .map_err(|e| format!("Failed to spawn decode worker: {}", e))?;

        info!(
            width = config.width,
            height = config.height,
            format = %config.format,
            "Frame handler started"
        );
        *state = HandlerState::Running(Running {
            camera,
            jobs,
            slot: Slot::Idle,
        });
        Ok(())
    }

    /// Arm a one-shot capture for the next frame
    ///
    /// Returns `false` when the request was not accepted: the handler is not
    /// running, or a frame of the current request is still being decoded.
    pub fn request_next_frame(&self) -> bool {
        let camera = {
            let mut state = self.inner.state.lock().unwrap_or_else(|e| e.into_inner());
            let HandlerState::Running(running) = &mut *state else {
                return false;
            };
            if running.slot == Slot::Decoding {
                trace!("Frame request ignored, decode in progress");
                return false;
            }
            running.slot = Slot::Armed;
            Arc::clone(&running.camera)
        };

        let handler = Arc::downgrade(&self.inner);
        camera.set_one_shot_preview_callback(Box::new(move |frame| {
            if let Some(inner) = handler.upgrade() {
                on_frame(&inner, frame);
            }
        }));
        true
    }

    /// Stop accepting requests and shut the worker down; idempotent
    ///
    /// A decode already running finishes, but its result is dropped.
    pub fn destroy(&self) {
        let mut state = self.inner.state.lock().unwrap_or_else(|e| e.into_inner());
        if let HandlerState::Running(_) = &*state {
            debug!("Frame handler destroyed");
        }
        // Dropping the sender ends the worker loop
        *state = HandlerState::Destroyed;
    }

    pub fn is_running(&self) -> bool {
        matches!(
            *self.inner.state.lock().unwrap_or_else(|e| e.into_inner()),
            HandlerState::Running(_)
        )
    }

    /// Number of frames handed to the decoder so far
    pub fn decodes(&self) -> usize {
        self.inner.decodes.load(Ordering::SeqCst)
    }
}

/// Camera callback thread: hand the frame to the worker and return
fn on_frame(inner: &Inner, frame: PreviewFrame) {
    let mut state = inner.state.lock().unwrap_or_else(|e| e.into_inner());
    let HandlerState::Running(running) = &mut *state else {
        return;
    };
    if running.slot != Slot::Armed {
        return;
    }
    if running.jobs.send(frame).is_ok() {
        running.slot = Slot::Decoding;
    } else {
        warn!("Decode worker gone, dropping frame");
        running.slot = Slot::Idle;
    }
}

fn decode_loop(
    inner: Weak<Inner>,
    mut receiver: mpsc::UnboundedReceiver<PreviewFrame>,
    format: PixelFormat,
    width: u32,
    height: u32,
) {
    debug!("Decode worker started");
    while let Some(frame) = receiver.blocking_recv() {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        let decoder = inner
            .decoder
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        let clip = *inner.clip.lock().unwrap_or_else(|e| e.into_inner());
        inner.decodes.fetch_add(1, Ordering::SeqCst);

        let result = match decoder {
            Some(decoder) => decode_frame(decoder.as_ref(), &frame, format, width, height, clip),
            None => None,
        };

        let callback = {
            let mut state = inner.state.lock().unwrap_or_else(|e| e.into_inner());
            let HandlerState::Running(running) = &mut *state else {
                trace!("Dropping result of destroyed frame handler");
                continue;
            };
            running.slot = Slot::Idle;
            inner
                .callback
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .clone()
        };
        if let Some(callback) = callback {
            callback(result);
        }
    }
    debug!("Decode worker stopped");
}

/// Run the decoder, turning errors and panics into "no result"
fn decode_frame(
    decoder: &dyn FrameDecoder,
    frame: &PreviewFrame,
    format: PixelFormat,
    width: u32,
    height: u32,
    clip: Option<Rect>,
) -> Option<String> {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        decoder.decode(format, &frame.data, width, height, clip)
    }));
    match outcome {
        Ok(Ok(Some(text))) if !text.is_empty() => Some(text),
        Ok(Ok(_)) => None,
        Ok(Err(e)) => {
            debug!(error = %e, "Frame decode failed");
            None
        }
        Err(_) => {
            warn!("Frame decoder panicked");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::virtual_camera::VirtualCameraProvider;
    use crate::backends::camera::{CameraFacing, CameraProvider, FpsRange, PreviewConfig};
    use crate::errors::DecodeError;
    use image::RgbaImage;
    use std::sync::mpsc as std_mpsc;
    use std::time::Duration;

    fn open_camera() -> Arc<dyn Camera> {
        let provider = VirtualCameraProvider::new().with_camera(
            "cam",
            CameraFacing::Back,
            0,
            RgbaImage::new(16, 16),
        );
        let camera = provider.open(0).unwrap();
        camera
            .configure(&PreviewConfig {
                fps_range: FpsRange::new(30000, 30000),
                format: PixelFormat::NV21,
                width: 16,
                height: 16,
            })
            .unwrap();
        camera.start_preview().unwrap();
        camera
    }

    #[test]
    fn test_requests_ignored_before_start() {
        let handler = FrameHandler::new();
        assert!(!handler.request_next_frame());
        handler.destroy();
        assert!(handler.start(open_camera()).is_ok());
        assert!(!handler.is_running());
    }

    #[test]
    fn test_result_delivered_with_frame_dimensions() {
        let camera = open_camera();
        let handler = FrameHandler::new();
        handler.set_decoder(Some(Arc::new(
            |format: PixelFormat, _: &[u8], w: u32, h: u32, clip: Option<Rect>| {
                Ok::<_, DecodeError>(Some(format!("{} {}x{} {:?}", format, w, h, clip)))
            },
        )));
        handler.set_clip(Some(Rect::new(1, 2, 3, 4)));
        let (tx, rx) = std_mpsc::channel();
        handler.set_callback(move |text| {
            tx.send(text).ok();
        });
        handler.start(Arc::clone(&camera)).unwrap();
        assert!(handler.request_next_frame());

        let text = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(
            text.as_deref(),
            Some("NV21 16x16 Some(Rect { left: 1, top: 2, right: 3, bottom: 4 })")
        );
        handler.destroy();
        camera.release();
    }

    #[test]
    fn test_second_request_during_decode_is_ignored() {
        let camera = open_camera();
        let handler = FrameHandler::new();
        let (started_tx, started_rx) = std_mpsc::channel();
        let started_tx = Mutex::new(started_tx);
        handler.set_decoder(Some(Arc::new(
            move |_: PixelFormat, _: &[u8], _: u32, _: u32, _: Option<Rect>| {
                started_tx.lock().unwrap().send(()).ok();
                thread::sleep(Duration::from_millis(150));
                Ok::<_, DecodeError>(Some("code".to_string()))
            },
        )));
        let (tx, rx) = std_mpsc::channel();
        handler.set_callback(move |text| {
            tx.send(text).ok();
        });
        handler.start(Arc::clone(&camera)).unwrap();

        assert!(handler.request_next_frame());
        started_rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(!handler.request_next_frame());

        assert_eq!(
            rx.recv_timeout(Duration::from_secs(2)).unwrap().as_deref(),
            Some("code")
        );
        assert!(rx.recv_timeout(Duration::from_millis(300)).is_err());
        assert_eq!(handler.decodes(), 1);
        handler.destroy();
        camera.release();
    }

    #[test]
    fn test_decoder_errors_become_empty_results() {
        let camera = open_camera();
        let handler = FrameHandler::new();
        handler.set_decoder(Some(Arc::new(
            |_: PixelFormat, _: &[u8], _: u32, _: u32, _: Option<Rect>| {
                Err::<Option<String>, _>(DecodeError::Failed("bad frame".into()))
            },
        )));
        let (tx, rx) = std_mpsc::channel();
        handler.set_callback(move |text| {
            tx.send(text).ok();
        });
        handler.start(Arc::clone(&camera)).unwrap();
        handler.request_next_frame();
        assert_eq!(rx.recv_timeout(Duration::from_secs(2)).unwrap(), None);
        handler.destroy();
        assert!(!handler.request_next_frame());
        camera.release();
    }

    #[test]
    fn test_dropping_started_handler_releases_worker() {
        let camera = open_camera();
        let handler = FrameHandler::new();
        let (tx, rx) = std_mpsc::channel::<Option<String>>();
        handler.set_callback(move |text| {
            tx.send(text).ok();
        });
        handler.start(Arc::clone(&camera)).unwrap();
        assert!(handler.request_next_frame());
        let inner = Arc::downgrade(&handler.inner);

        drop(handler);
        // The callback (and its sender) goes away with the shared state
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        loop {
            match rx.recv_timeout(Duration::from_millis(50)) {
                Err(std_mpsc::RecvTimeoutError::Disconnected) => break,
                _ => assert!(std::time::Instant::now() < deadline, "worker kept state alive"),
            }
        }
        assert!(inner.upgrade().is_none());
        camera.release();
    }
}
