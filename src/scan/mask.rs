// SPDX-License-Identifier: GPL-3.0-only

//! Mask overlay painting
//!
//! [`MaskBackground`] dims everything outside the scan clip. Call it from
//! [`ScanCallback::on_draw_mask`](super::ScanCallback::on_draw_mask); anything
//! painted before it (hints, frame corners) stays on top of the dimming.

use crate::constants::colors;
use crate::geometry::Rect;
use image::{Rgba, RgbaImage};

/// Dimming fill with a transparent hole at the clip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaskBackground {
    color: Rgba<u8>,
}

impl Default for MaskBackground {
    fn default() -> Self {
        Self::new(colors::MASK)
    }
}

impl MaskBackground {
    pub fn new(color: [u8; 4]) -> Self {
        Self {
            color: Rgba(color),
        }
    }

    /// Fill behind existing content, then punch the clip out
    ///
    /// Without a clip nothing is painted.
    pub fn draw(&self, canvas: &mut RgbaImage, clip: Option<Rect>) {
        let Some(clip) = clip else {
            return;
        };
        for pixel in canvas.pixels_mut() {
            *pixel = blend_dst_over(*pixel, self.color);
        }
        let (width, height) = canvas.dimensions();
        if let Some(hole) = clip.clamp_to(width as i32, height as i32) {
            for y in hole.top..hole.bottom {
                for x in hole.left..hole.right {
                    canvas.put_pixel(x as u32, y as u32, Rgba([0, 0, 0, 0]));
                }
            }
        }
    }
}

/// Porter-Duff "destination over" for straight-alpha pixels
fn blend_dst_over(dst: Rgba<u8>, src: Rgba<u8>) -> Rgba<u8> {
    let da = f32::from(dst.0[3]) / 255.0;
    let sa = f32::from(src.0[3]) / 255.0;
    let out_a = da + sa * (1.0 - da);
    if out_a <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }
    let mut out = [0u8; 4];
    for i in 0..3 {
        let dc = f32::from(dst.0[i]);
        let sc = f32::from(src.0[i]);
        out[i] = ((dc * da + sc * sa * (1.0 - da)) / out_a).round() as u8;
    }
    out[3] = (out_a * 255.0).round() as u8;
    Rgba(out)
}
