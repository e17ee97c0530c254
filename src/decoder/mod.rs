// SPDX-License-Identifier: GPL-3.0-only

//! Frame decoding
//!
//! - [`FrameDecoder`]: the decoding capability, supplied by the embedder
//! - [`FrameHandler`]: moves preview frames off the camera thread onto a
//!   single decode worker, one request at a time
//! - [`QrFrameDecoder`]: default decoder for QR codes

pub mod frame_handler;
pub mod qr;

pub use frame_handler::FrameHandler;
pub use qr::QrFrameDecoder;

use crate::backends::camera::PixelFormat;
use crate::errors::DecodeError;
use crate::geometry::Rect;

/// Turns a raw preview frame into text
///
/// `clip` is the scan area in frame pixel coordinates, or `None` for the
/// whole frame. `Ok(None)` means nothing was found; errors are logged by the
/// caller and treated the same way.
pub trait FrameDecoder: Send + Sync {
    fn decode(
        &self,
        format: PixelFormat,
        data: &[u8],
        width: u32,
        height: u32,
        clip: Option<Rect>,
    ) -> Result<Option<String>, DecodeError>;
}

impl<F> FrameDecoder for F
where
    F: Fn(PixelFormat, &[u8], u32, u32, Option<Rect>) -> Result<Option<String>, DecodeError>
        + Send
        + Sync,
{
    fn decode(
        &self,
        format: PixelFormat,
        data: &[u8],
        width: u32,
        height: u32,
        clip: Option<Rect>,
    ) -> Result<Option<String>, DecodeError> {
        self(format, data, width, height, clip)
    }
}

/// Extract the 8-bit luminance plane of a frame
pub fn luminance_plane(
    format: PixelFormat,
    data: &[u8],
    width: u32,
    height: u32,
) -> Result<Vec<u8>, DecodeError> {
    let pixels = width as usize * height as usize;
    let expected = match format {
        PixelFormat::NV21 | PixelFormat::NV12 | PixelFormat::Gray8 | PixelFormat::YUYV => {
            format.frame_len(width, height)
        }
        PixelFormat::RGBA => return Err(DecodeError::UnsupportedFormat(format.to_string())),
    };
    if data.len() < expected {
        return Err(DecodeError::BufferTooSmall {
            expected,
            actual: data.len(),
        });
    }

    match format {
        // YUYV: Y0 U Y1 V, luma on even bytes
        PixelFormat::YUYV => Ok(data[..pixels * 2].iter().step_by(2).copied().collect()),
        _ => Ok(data[..pixels].to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_semi_planar_luma_is_leading_plane() {
        let data: Vec<u8> = (0..6).collect();
        assert_eq!(
            luminance_plane(PixelFormat::NV21, &data, 2, 2).unwrap(),
            vec![0, 1, 2, 3]
        );
    }

    #[test]
    fn test_yuyv_luma_on_even_bytes() {
        let data = [10, 128, 20, 128, 30, 128, 40, 128];
        assert_eq!(
            luminance_plane(PixelFormat::YUYV, &data, 2, 2).unwrap(),
            vec![10, 20, 30, 40]
        );
    }

    #[test]
    fn test_short_buffer_rejected() {
        assert_eq!(
            luminance_plane(PixelFormat::NV21, &[0; 4], 2, 2),
            Err(DecodeError::BufferTooSmall {
                expected: 6,
                actual: 4
            })
        );
        assert!(matches!(
            luminance_plane(PixelFormat::RGBA, &[0; 16], 2, 2),
            Err(DecodeError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_large_frame_one_byte_short_rejected() {
        let (w, h) = (4097, 4097);
        let short = vec![0u8; 4097 * 4097 - 1];
        assert_eq!(
            luminance_plane(PixelFormat::Gray8, &short, w, h),
            Err(DecodeError::BufferTooSmall {
                expected: 16_785_409,
                actual: 16_785_408
            })
        );
        let exact = vec![7u8; 4097 * 4097];
        assert_eq!(
            luminance_plane(PixelFormat::Gray8, &exact, w, h).map(|luma| luma.len()),
            Ok(16_785_409)
        );
    }

    #[test]
    fn test_closure_decoder() {
        let decoder = |_: PixelFormat, data: &[u8], _: u32, _: u32, _: Option<Rect>| {
            Ok::<_, DecodeError>(Some(format!("{} bytes", data.len())))
        };
        assert_eq!(
            decoder.decode(PixelFormat::Gray8, &[0; 3], 3, 1, None),
            Ok(Some("3 bytes".to_string()))
        );
    }
}
