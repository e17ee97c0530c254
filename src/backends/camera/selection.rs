// SPDX-License-Identifier: GPL-3.0-only

//! Preview configuration selection
//!
//! Picks the fps range, pixel format and preview size used by the scan
//! engine from what a camera advertises.

use super::types::{
    CameraFacing, CameraInfo, CameraParameters, FpsRange, PixelFormat, PreviewConfig, PreviewSize,
};
use crate::errors::{CameraError, CameraResult};
use tracing::debug;

/// Fps range with the highest maximum, ties broken by the highest minimum
pub fn select_fps_range(ranges: &[FpsRange]) -> Option<FpsRange> {
    ranges.iter().copied().max_by_key(|r| (r.max, r.min))
}

/// Preview size whose rotated height is closest to `target_height`,
/// ties broken by the rotated width closest to `target_width`
pub fn select_preview_size(
    sizes: &[(u32, u32)],
    degrees: u32,
    target_width: u32,
    target_height: u32,
) -> Option<PreviewSize> {
    sizes
        .iter()
        .map(|&(w, h)| PreviewSize::new(w, h, degrees))
        .min_by_key(|size| {
            (
                size.rotated_height.abs_diff(target_height),
                size.rotated_width.abs_diff(target_width),
            )
        })
}

/// Full preview configuration for a surface of `target_width` × `target_height`
///
/// The engine always streams NV21; cameras that do not list it are still
/// asked for it and may reject the parameters.
pub fn select_preview_config(
    params: &CameraParameters,
    degrees: u32,
    target_width: u32,
    target_height: u32,
) -> CameraResult<(PreviewConfig, PreviewSize)> {
    let fps_range =
        select_fps_range(&params.fps_ranges).ok_or(CameraError::NoPreviewConfiguration)?;
    let size = select_preview_size(&params.preview_sizes, degrees, target_width, target_height)
        .ok_or(CameraError::NoPreviewConfiguration)?;

    debug!(
        fps = %fps_range,
        size = %size,
        rotated_width = size.rotated_width,
        rotated_height = size.rotated_height,
        "Selected preview configuration"
    );

    Ok((
        PreviewConfig {
            fps_range,
            format: PixelFormat::NV21,
            width: size.width,
            height: size.height,
        },
        size,
    ))
}

/// Camera opened when the host does not choose one: the first camera facing
/// `preferred`
pub fn select_default_camera(cameras: &[CameraInfo], preferred: CameraFacing) -> Option<usize> {
    cameras
        .iter()
        .find(|c| c.facing == preferred)
        .map(|c| c.id)
}
