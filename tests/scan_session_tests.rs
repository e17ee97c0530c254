// SPDX-License-Identifier: GPL-3.0-only

//! End-to-end scan sessions on the virtual camera and headless graphics

use image::{Rgba, RgbaImage};
use scanpanel::backends::camera::virtual_camera::VirtualCameraProvider;
use scanpanel::backends::camera::{
    CameraFacing, CameraParameters, CameraProvider, DisplayRotation, PixelFormat,
};
use scanpanel::backends::graphics::{HeadlessGraphics, HeadlessStats, ReleaseEvent, SurfaceHandle};
use scanpanel::errors::{AppError, DecodeError};
use scanpanel::geometry::Rect;
use scanpanel::{
    FrameDecoder, MaskBackground, ScanCallback, ScanConfig, ScanHandler, SessionState,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

const WAIT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Start,
    Result(String),
    Error(String),
    End,
}

struct Recorder {
    events: Mutex<Sender<Event>>,
    mask: MaskBackground,
}

impl ScanCallback for Recorder {
    fn on_scan_start(&self) {
        self.send(Event::Start);
    }

    fn on_draw_mask(&self, canvas: &mut RgbaImage, clip: Option<Rect>) {
        self.mask.draw(canvas, clip);
    }

    fn on_scan_error(&self, error: &AppError) {
        self.send(Event::Error(error.to_string()));
    }

    fn on_scan_result(&self, text: &str) {
        self.send(Event::Result(text.to_string()));
    }

    fn on_scan_end(&self) {
        self.send(Event::End);
    }
}

impl Recorder {
    fn send(&self, event: Event) {
        let _ = self
            .events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .send(event);
    }
}

struct Session {
    handler: ScanHandler,
    events: Receiver<Event>,
    stats: Arc<HeadlessStats>,
    provider: Arc<VirtualCameraProvider>,
}

impl Session {
    fn new(config: ScanConfig, provider: VirtualCameraProvider) -> Self {
        let graphics = HeadlessGraphics::new().with_frame_interval(Duration::from_millis(2));
        let stats = graphics.stats();
        let provider = Arc::new(provider);
        let (sender, events) = mpsc::channel();
        let callback = Recorder {
            events: Mutex::new(sender),
            mask: MaskBackground::default(),
        };
        let handler = ScanHandler::new(
            config,
            Arc::clone(&provider) as Arc<dyn CameraProvider>,
            Arc::new(graphics),
            Arc::new(callback),
        );
        Self {
            handler,
            events,
            stats,
            provider,
        }
    }

    fn back_camera() -> Self {
        Self::new(ScanConfig::default(), provider(CameraFacing::Back))
    }

    fn next_event(&self) -> Event {
        self.events
            .recv_timeout(WAIT)
            .expect("scan event within timeout")
    }

    /// Skip events until one matching `wanted` arrives
    fn expect_event(&self, wanted: &Event) {
        let deadline = Instant::now() + WAIT;
        while Instant::now() < deadline {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.events.recv_timeout(remaining) {
                Ok(event) if &event == wanted => return,
                Ok(_) => continue,
                Err(_) => break,
            }
        }
        panic!("expected {:?}", wanted);
    }

    fn bind_surface(&self) {
        self.handler.set_surface(Some(SurfaceHandle(7)), 64, 48);
    }

    fn shutdown(&self) {
        self.handler.destroy();
        self.expect_event(&Event::End);
        self.handler.join();
    }
}

fn provider(facing: CameraFacing) -> VirtualCameraProvider {
    let image = RgbaImage::from_pixel(64, 48, Rgba([200, 200, 200, 255]));
    VirtualCameraProvider::new().with_camera("test", facing, 90, image)
}

fn decoder_from<F>(decode: F) -> Arc<dyn FrameDecoder>
where
    F: Fn(PixelFormat, &[u8], u32, u32, Option<Rect>) -> Result<Option<String>, DecodeError>
        + Send
        + Sync
        + 'static,
{
    Arc::new(decode)
}

fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

#[test]
fn test_result_pauses_until_next() {
    let session = Session::back_camera();
    session
        .handler
        .set_frame_decoder(Some(decoder_from(|format, data, width, height, _| {
            assert_eq!(format, PixelFormat::NV21);
            assert_eq!(data.len(), format.frame_len(width, height));
            Ok(Some("hello".to_string()))
        })));
    session.bind_surface();
    session.handler.start().unwrap();

    assert_eq!(session.next_event(), Event::Start);
    assert_eq!(session.next_event(), Event::Result("hello".into()));
    assert!(
        session
            .events
            .recv_timeout(Duration::from_millis(300))
            .is_err(),
        "no further result before next()"
    );

    session.handler.next();
    assert_eq!(session.next_event(), Event::Result("hello".into()));
    session.shutdown();
}

#[test]
fn test_empty_results_keep_scanning() {
    let session = Session::back_camera();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    session
        .handler
        .set_frame_decoder(Some(decoder_from(move |_, _, _, _, _| {
            let call = counter.fetch_add(1, Ordering::SeqCst);
            match call {
                0 => Ok(None),
                1 => Ok(Some(String::new())),
                2 => Err(DecodeError::Failed("noise".into())),
                _ => Ok(Some("found".to_string())),
            }
        })));
    session.bind_surface();
    session.handler.start().unwrap();

    session.expect_event(&Event::Result("found".into()));
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    session.shutdown();
}

#[test]
fn test_without_decoder_frames_keep_flowing() {
    let session = Session::back_camera();
    session.bind_surface();
    session.handler.start().unwrap();

    assert!(wait_until(|| {
        session
            .provider
            .opened_cameras()
            .first()
            .is_some_and(|camera| camera.frames_delivered() >= 3)
    }));
    session.shutdown();
}

#[test]
fn test_destroy_ends_session() {
    let session = Session::back_camera();
    session.handler.start().unwrap();
    assert_eq!(session.next_event(), Event::Start);
    assert_eq!(session.handler.state(), SessionState::Running);

    session.handler.destroy();
    assert_eq!(session.next_event(), Event::End);
    session.handler.join();
    assert_eq!(session.handler.state(), SessionState::Destroyed);

    // Late configuration is dropped and restarting is a no-op
    session.handler.set_clip(Some(Rect::new(0, 0, 10, 10)));
    session.bind_surface();
    session.handler.start().unwrap();
    assert!(
        session
            .events
            .recv_timeout(Duration::from_millis(200))
            .is_err()
    );
}

#[test]
fn test_release_order_on_teardown() {
    let session = Session::back_camera();
    session
        .handler
        .set_frame_decoder(Some(decoder_from(|_, _, _, _, _| Ok(Some("x".into())))));
    session.bind_surface();
    session.handler.start().unwrap();
    session.expect_event(&Event::Result("x".into()));

    session.shutdown();
    assert_eq!(
        session.stats.releases(),
        vec![
            ReleaseEvent::TextureWindow,
            ReleaseEvent::SurfaceWindow,
            ReleaseEvent::MaskTexture,
            ReleaseEvent::Context,
        ]
    );
    let camera = &session.provider.opened_cameras()[0];
    assert!(camera.is_released());
    assert!(!camera.is_previewing());
}

#[test]
fn test_make_current_failures_are_not_fatal() {
    let session = Session::back_camera();
    session.stats.fail_next_make_current(3);
    session.bind_surface();
    session.handler.start().unwrap();

    assert!(wait_until(|| session.stats.make_current_failures() == 3));
    assert!(wait_until(|| session.stats.frames_presented() >= 2));
    assert_eq!(session.handler.state(), SessionState::Running);
    session.shutdown();
}

#[test]
fn test_context_failure_reports_error_then_end() {
    let session = Session::back_camera();
    session.stats.set_fail_context_creation(true);
    session.handler.start().unwrap();

    assert_eq!(session.next_event(), Event::Start);
    assert!(matches!(session.next_event(), Event::Error(_)));
    assert_eq!(session.next_event(), Event::End);
    session.handler.join();
    assert_eq!(session.handler.state(), SessionState::Destroyed);
}

#[test]
fn test_missing_facing_scans_without_camera() {
    let config = ScanConfig {
        facing: CameraFacing::Front,
        ..ScanConfig::default()
    };
    let session = Session::new(config, provider(CameraFacing::Back));
    session.bind_surface();
    session.handler.start().unwrap();

    assert!(wait_until(|| session.stats.frames_presented() >= 3));
    assert!(session.provider.opened_cameras().is_empty());
    assert_eq!(session.stats.camera_draws(), 0);
    assert!(session.stats.mask_draws() >= 3);
    session.shutdown();
}

#[test]
fn test_no_preview_configuration_scans_without_camera() {
    let provider = provider(CameraFacing::Back).with_parameters(CameraParameters {
        fps_ranges: vec![],
        preview_formats: vec![PixelFormat::NV21],
        preview_sizes: vec![(64, 48)],
    });
    let session = Session::new(ScanConfig::default(), provider);
    session.bind_surface();
    session.handler.start().unwrap();

    assert!(wait_until(|| {
        session
            .provider
            .opened_cameras()
            .first()
            .is_some_and(|camera| camera.is_released())
    }));
    let presented = session.stats.frames_presented();
    assert!(wait_until(|| session.stats.frames_presented() > presented + 2));
    assert_eq!(session.stats.camera_draws(), 0);
    assert_eq!(session.stats.texture_windows_created(), 0);
    assert_eq!(session.handler.state(), SessionState::Running);

    let events: Vec<Event> = session.events.try_iter().collect();
    assert!(
        !events.iter().any(|e| matches!(e, Event::Error(_))),
        "{:?}",
        events
    );
    session.shutdown();
}

#[test]
fn test_mask_repaints_on_clip_change() {
    let session = Session::back_camera();
    session.bind_surface();
    session.handler.start().unwrap();
    assert!(wait_until(|| session.stats.mask_uploads() >= 1));
    // No clip yet: the mask stays transparent
    let mask = session.stats.last_mask().unwrap();
    assert_eq!(mask.dimensions(), (64, 48));
    assert!(mask.pixels().all(|p| p.0[3] == 0));

    session.handler.set_clip(Some(Rect::new(16, 12, 48, 36)));
    assert!(wait_until(|| {
        session
            .stats
            .last_mask()
            .is_some_and(|mask| mask.get_pixel(0, 0).0[3] == 0xa0)
    }));
    let mask = session.stats.last_mask().unwrap();
    assert_eq!(mask.get_pixel(32, 24).0, [0, 0, 0, 0]);
    assert_eq!(mask.get_pixel(63, 47).0, [0, 0, 0, 0xa0]);

    let uploads = session.stats.mask_uploads();
    session.handler.invalidate_mask();
    assert!(wait_until(|| session.stats.mask_uploads() > uploads));
    session.shutdown();
}

#[test]
fn test_failed_focus_retries() {
    let provider = provider(CameraFacing::Back).with_focus_result(false);
    let session = Session::new(ScanConfig::default(), provider);
    session.bind_surface();
    session.handler.start().unwrap();

    assert!(wait_until(|| {
        session
            .provider
            .opened_cameras()
            .first()
            .is_some_and(|camera| camera.focus_requests() >= 3)
    }));
    session.shutdown();
}

#[test]
fn test_successful_focus_waits_interval() {
    let session = Session::back_camera();
    session.bind_surface();
    session.handler.start().unwrap();

    assert!(wait_until(|| {
        session
            .provider
            .opened_cameras()
            .first()
            .is_some_and(|camera| camera.focus_requests() >= 1)
    }));
    std::thread::sleep(Duration::from_millis(300));
    assert_eq!(session.provider.opened_cameras()[0].focus_requests(), 1);
    session.shutdown();
}

#[test]
fn test_rotation_change_reconfigures_camera() {
    let session = Session::back_camera();
    session.bind_surface();
    session.handler.start().unwrap();
    assert!(wait_until(|| session.stats.texture_windows_created() == 1));

    session
        .handler
        .set_display_rotation(DisplayRotation::Rotation90);
    assert!(wait_until(|| session.stats.texture_windows_created() == 2));
    assert_eq!(session.provider.opened_cameras().len(), 1);
    assert!(session.provider.opened_cameras()[0].is_previewing());
    session.shutdown();
}

#[test]
fn test_unbinding_surface_closes_camera() {
    let session = Session::back_camera();
    session.bind_surface();
    session.handler.start().unwrap();
    assert!(wait_until(|| !session.provider.opened_cameras().is_empty()));

    session.handler.set_surface(None, 0, 0);
    assert!(wait_until(|| session.provider.opened_cameras()[0].is_released()));
    assert_eq!(session.handler.state(), SessionState::Running);

    // Binding again opens the camera anew
    session.bind_surface();
    assert!(wait_until(|| session.provider.opened_cameras().len() == 2));
    session.shutdown();
}
