// SPDX-License-Identifier: GPL-3.0-only

//! ScanPanel - real-time optical code scanning from a live camera feed
//!
//! The engine runs a render/control loop on a dedicated thread that shows
//! the camera preview behind a mask overlay, pulls preview frames one at a
//! time into a decoder and keeps the camera focused.
//!
//! # Architecture
//!
//! - [`scan`]: session control loop, action queue, autofocus scheduling
//! - [`decoder`]: frame decoding pipeline and the default QR decoder
//! - [`geometry`]: content-to-viewport transforms
//! - [`backends`]: camera and graphics capabilities with virtual/headless
//!   implementations
//! - [`panel`]: embedding controller for host views
//! - [`config`]: user configuration handling
//!
//! # Example
//!
//! ```ignore
//! let image = image::open(path)?.to_rgba8();
//! let provider = Arc::new(VirtualCameraProvider::new().with_camera("virtual", CameraFacing::Back, 0, image));
//! let graphics = Arc::new(HeadlessGraphics::new());
//! let mut panel = ScanPanel::new(ScanConfig::default(), provider, graphics, callback);
//! panel.set_frame_decoder(Some(Arc::new(QrFrameDecoder::new())));
//! panel.surface_changed(SurfaceHandle(1), 1080, 1920);
//! panel.start()?;
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod decoder;
pub mod errors;
pub mod geometry;
pub mod panel;
pub mod scan;

// Re-export commonly used types
pub use config::ScanConfig;
pub use decoder::{FrameDecoder, FrameHandler, QrFrameDecoder};
pub use errors::{AppError, AppResult};
pub use geometry::{ContentMatrix, Matrix3D, Rect, RectF, ScaleType};
pub use panel::{ScanPanel, center_clip};
pub use scan::{MaskBackground, NoopCallback, ScanCallback, ScanHandler, SessionState};
