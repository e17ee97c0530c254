// SPDX-License-Identifier: GPL-3.0-only

//! QR code decoding with rqrr
//!
//! The luminance plane is cropped to the scan clip and downscaled before
//! grid detection; QR codes inside a scan window are large enough to
//! survive the reduction.

use super::{FrameDecoder, luminance_plane};
use crate::backends::camera::PixelFormat;
use crate::constants::decoder::QR_MAX_DIMENSION;
use crate::errors::DecodeError;
use crate::geometry::Rect;
use image::GrayImage;
use image::imageops::{self, FilterType};
use rqrr::PreparedImage;
use tracing::{debug, trace};

/// QR decoder
pub struct QrFrameDecoder {
    /// Maximum dimension for processing (larger regions are downscaled to this)
    max_dimension: u32,
}

impl Default for QrFrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl QrFrameDecoder {
    pub fn new() -> Self {
        Self {
            max_dimension: QR_MAX_DIMENSION,
        }
    }

    /// Create a decoder with a custom max dimension
    pub fn with_max_dimension(max_dimension: u32) -> Self {
        Self {
            max_dimension: max_dimension.max(1),
        }
    }

    /// Decode a greyscale image, e.g. a still picture loaded from disk
    pub fn decode_gray(&self, image: &GrayImage, clip: Option<Rect>) -> Option<String> {
        let (width, height) = image.dimensions();
        let region = match scan_region(clip, width, height) {
            Some(region) => region,
            None => {
                debug!(?clip, width, height, "Clip lies outside the frame");
                return None;
            }
        };
        let cropped = imageops::crop_imm(
            image,
            region.left as u32,
            region.top as u32,
            region.width() as u32,
            region.height() as u32,
        )
        .to_image();
        self.detect(cropped)
    }

    fn detect(&self, region: GrayImage) -> Option<String> {
        let start = std::time::Instant::now();
        let (width, height) = region.dimensions();
        let max_dim = self.max_dimension;

        let prepared = if width > max_dim || height > max_dim {
            let scale = (width as f32 / max_dim as f32).max(height as f32 / max_dim as f32);
            let new_width = ((width as f32 / scale) as u32).max(1);
            let new_height = ((height as f32 / scale) as u32).max(1);
            trace!(width, height, new_width, new_height, "Downscaling scan region");
            imageops::resize(&region, new_width, new_height, FilterType::Triangle)
        } else {
            region
        };

        let (w, h) = (prepared.width() as usize, prepared.height() as usize);
        let grey = prepared.into_raw();
        let mut img = PreparedImage::prepare_from_greyscale(w, h, |x, y| grey[y * w + x]);
        let grids = img.detect_grids();
        let result = grids.iter().find_map(|grid| match grid.decode() {
            Ok((_, content)) => Some(content),
            Err(e) => {
                debug!(error = %e, "Failed to decode QR grid");
                None
            }
        });

        trace!(
            grids = grids.len(),
            found = result.is_some(),
            elapsed_ms = start.elapsed().as_millis(),
            "QR detection complete"
        );
        result
    }
}

impl FrameDecoder for QrFrameDecoder {
    fn decode(
        &self,
        format: PixelFormat,
        data: &[u8],
        width: u32,
        height: u32,
        clip: Option<Rect>,
    ) -> Result<Option<String>, DecodeError> {
        let luma = luminance_plane(format, data, width, height)?;
        let image = GrayImage::from_raw(width, height, luma)
            .ok_or_else(|| DecodeError::Failed("luminance plane does not match frame".into()))?;
        Ok(self.decode_gray(&image, clip))
    }
}

/// Part of a `width` × `height` frame to scan
///
/// A missing or empty clip selects the whole frame; a clip is clamped to the
/// frame and yields `None` when nothing of it is left.
fn scan_region(clip: Option<Rect>, width: u32, height: u32) -> Option<Rect> {
    let full = Rect::from_size(width as i32, height as i32);
    match clip {
        Some(clip) if !clip.is_empty() => clip.clamp_to(width as i32, height as i32),
        _ => (!full.is_empty()).then_some(full),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_region_defaults_to_full_frame() {
        assert_eq!(scan_region(None, 40, 30), Some(Rect::new(0, 0, 40, 30)));
        assert_eq!(
            scan_region(Some(Rect::new(5, 5, 5, 9)), 40, 30),
            Some(Rect::new(0, 0, 40, 30))
        );
    }

    #[test]
    fn test_scan_region_clamps_clip() {
        assert_eq!(
            scan_region(Some(Rect::new(-5, 10, 100, 20)), 40, 30),
            Some(Rect::new(0, 10, 40, 20))
        );
        assert_eq!(scan_region(Some(Rect::new(50, 50, 60, 60)), 40, 30), None);
    }

    #[test]
    fn test_blank_frame_has_no_result() {
        let decoder = QrFrameDecoder::with_max_dimension(64);
        let data = vec![255u8; PixelFormat::NV21.frame_len(128, 96)];
        assert_eq!(
            decoder.decode(PixelFormat::NV21, &data, 128, 96, None),
            Ok(None)
        );
    }

    #[test]
    fn test_unsupported_format_is_an_error() {
        let decoder = QrFrameDecoder::new();
        assert!(matches!(
            decoder.decode(PixelFormat::RGBA, &[0; 64], 4, 4, None),
            Err(DecodeError::UnsupportedFormat(_))
        ));
    }
}
