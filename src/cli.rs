// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! - Decoding a still image
//! - Running a scan session against a virtual camera
//! - Printing the configuration

use scanpanel::backends::camera::virtual_camera::VirtualCameraProvider;
use scanpanel::backends::camera::{CameraFacing, DisplayRotation};
use scanpanel::backends::graphics::{HeadlessGraphics, SurfaceHandle};
use scanpanel::errors::AppError;
use scanpanel::geometry::Rect;
use scanpanel::{MaskBackground, QrFrameDecoder, ScanCallback, ScanConfig, ScanPanel};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};
use tracing::debug;

/// Decode a QR code from an image file and print its text
pub fn decode_image(path: &Path, clip: Option<Rect>) -> Result<(), Box<dyn std::error::Error>> {
    let config = ScanConfig::load_or_default();
    let image = image::open(path)
        .map_err(|e| format!("Failed to load image '{}': {}", path.display(), e))?
        .to_luma8();
    println!("Decoding {}x{} image...", image.width(), image.height());

    let decoder = QrFrameDecoder::with_max_dimension(config.qr_max_dimension);
    match decoder.decode_gray(&image, clip) {
        Some(text) => {
            println!("{}", text);
            Ok(())
        }
        None => Err("No code found".into()),
    }
}

pub struct ScanOptions {
    pub rotation: u32,
    pub front: bool,
    pub timeout: u64,
    pub mask_out: Option<PathBuf>,
}

enum ScanEvent {
    Result(String),
    Error(String),
    End,
}

struct CliCallback {
    events: Sender<ScanEvent>,
    mask: MaskBackground,
}

impl ScanCallback for CliCallback {
    fn on_scan_start(&self) {
        debug!("Scan session running");
    }

    fn on_draw_mask(&self, canvas: &mut image::RgbaImage, clip: Option<Rect>) {
        self.mask.draw(canvas, clip);
    }

    fn on_scan_error(&self, error: &AppError) {
        let _ = self.events.send(ScanEvent::Error(error.to_string()));
    }

    fn on_scan_result(&self, text: &str) {
        let _ = self.events.send(ScanEvent::Result(text.to_string()));
    }

    fn on_scan_end(&self) {
        let _ = self.events.send(ScanEvent::End);
    }
}

/// Run a scan session on a virtual camera showing the image and print the
/// first result
pub fn scan_image(path: &Path, options: ScanOptions) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = ScanConfig::load_or_default();
    config.facing = if options.front {
        CameraFacing::Front
    } else {
        CameraFacing::Back
    };
    config.display_rotation = DisplayRotation::from_code(options.rotation);

    let image = image::open(path)
        .map_err(|e| format!("Failed to load image '{}': {}", path.display(), e))?
        .to_rgba8();
    let (width, height) = image.dimensions();
    let provider = VirtualCameraProvider::new().with_camera("virtual", config.facing, 0, image);
    let graphics = HeadlessGraphics::new();
    let stats = graphics.stats();

    let (sender, events) = mpsc::channel();
    let callback = CliCallback {
        events: sender,
        mask: MaskBackground::new(config.mask_color),
    };
    let decoder = QrFrameDecoder::with_max_dimension(config.qr_max_dimension);

    let mut panel = ScanPanel::new(
        config,
        Arc::new(provider),
        Arc::new(graphics),
        Arc::new(callback),
    );
    panel.set_frame_decoder(Some(Arc::new(decoder)));
    panel.measure(width, height);
    panel.surface_changed(SurfaceHandle(1), width, height);

    println!("Scanning {} ({}x{})...", path.display(), width, height);
    let started = Instant::now();
    panel.start()?;

    let deadline = started + Duration::from_secs(options.timeout);
    let outcome = loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match events.recv_timeout(remaining) {
            Ok(ScanEvent::Result(text)) => break Ok(text),
            Ok(ScanEvent::Error(message)) => break Err(message),
            Ok(ScanEvent::End) | Err(RecvTimeoutError::Disconnected) => {
                break Err("Scan session ended without a result".to_string());
            }
            Err(RecvTimeoutError::Timeout) => {
                break Err(format!("No code found within {}s", options.timeout));
            }
        }
    };
    panel.destroy_and_wait();

    if let Some(mask_path) = &options.mask_out {
        match stats.last_mask() {
            Some(mask) => {
                mask.save(mask_path)?;
                println!("Mask saved to {}", mask_path.display());
            }
            None => println!("No mask was rendered"),
        }
    }

    let text = outcome?;
    println!(
        "Found after {:.2}s ({} frames presented):",
        started.elapsed().as_secs_f32(),
        stats.frames_presented()
    );
    println!("{}", text);
    Ok(())
}

/// Print the effective configuration and where it is stored
pub fn print_config() -> Result<(), Box<dyn std::error::Error>> {
    let config = ScanConfig::load_or_default();
    match ScanConfig::default_path() {
        Some(path) => println!("# {}", path.display()),
        None => println!("# no config directory"),
    }
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
