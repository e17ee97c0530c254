// SPDX-License-Identifier: GPL-3.0-only
// Shared types for camera backend abstraction

//! Shared types for camera backends

use crate::geometry::{Matrix3D, RectF};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Which way a camera faces relative to the display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CameraFacing {
    /// Faces away from the user
    #[default]
    Back,
    /// Faces the user; its capture stream is mirrored relative to what the user sees
    Front,
}

impl std::fmt::Display for CameraFacing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraFacing::Back => write!(f, "back"),
            CameraFacing::Front => write!(f, "front"),
        }
    }
}

/// Static description of a camera device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraInfo {
    /// Index used to open the camera
    pub id: usize,
    pub name: String,
    pub facing: CameraFacing,
    /// Clockwise rotation (degrees) needed to show the sensor image upright
    /// on a display in its natural orientation
    pub orientation: u32,
}

/// Display rotation as reported by the host window system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DisplayRotation {
    #[default]
    Rotation0,
    Rotation90,
    Rotation180,
    Rotation270,
}

impl DisplayRotation {
    /// Map the host's rotation code (0..=3); unknown codes fall back to no rotation
    pub fn from_code(code: u32) -> Self {
        match code {
            1 => DisplayRotation::Rotation90,
            2 => DisplayRotation::Rotation180,
            3 => DisplayRotation::Rotation270,
            _ => DisplayRotation::Rotation0,
        }
    }

    pub fn degrees(&self) -> u32 {
        match self {
            DisplayRotation::Rotation0 => 0,
            DisplayRotation::Rotation90 => 90,
            DisplayRotation::Rotation180 => 180,
            DisplayRotation::Rotation270 => 270,
        }
    }
}

/// Rotation (degrees) to apply to the preview so it appears upright
///
/// Front cameras additionally compensate for their mirrored stream.
pub fn display_orientation(info: &CameraInfo, rotation: DisplayRotation) -> u32 {
    let degrees = rotation.degrees();
    match info.facing {
        CameraFacing::Front => {
            let result = (info.orientation + degrees) % 360;
            (360 - result) % 360
        }
        CameraFacing::Back => (info.orientation + 360 - degrees) % 360,
    }
}

/// Preview frame rate range in frames-per-second × 1000
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FpsRange {
    pub min: u32,
    pub max: u32,
}

impl FpsRange {
    pub fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }
}

impl std::fmt::Display for FpsRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.min, self.max)
    }
}

/// A supported preview resolution, with its size after display rotation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PreviewSize {
    pub width: u32,
    pub height: u32,
    pub rotated_width: u32,
    pub rotated_height: u32,
}

impl PreviewSize {
    /// Size as delivered by the camera plus the bounding box after rotating by `degrees`
    pub fn new(width: u32, height: u32, degrees: u32) -> Self {
        let mut rotation = Matrix3D::new();
        rotation.post_rotate(degrees as f32, 0.0, 0.0, 1.0);
        let corners = RectF::from_size(width as f32, height as f32).corners();
        let mut mapped = [[0.0; 4]; 4];
        rotation.map_vec4_points(&corners, &mut mapped);
        let bounds = RectF::bounds_of(&mapped);
        Self {
            width,
            height,
            rotated_width: bounds.width().round() as u32,
            rotated_height: bounds.height().round() as u32,
        }
    }
}

impl std::fmt::Display for PreviewSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Pixel format of preview frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelFormat {
    /// NV21 - Semi-planar 4:2:0 (Y plane + interleaved VU plane)
    /// Default preview format of the scan engine
    NV21,
    /// NV12 - Semi-planar 4:2:0 (Y plane + interleaved UV plane)
    NV12,
    /// YUYV - Packed 4:2:2 (Y0 U Y1 V interleaved)
    YUYV,
    /// Gray8 - 8-bit grayscale (single channel)
    Gray8,
    /// RGBA - 32-bit with alpha (4 bytes per pixel)
    RGBA,
}

impl PixelFormat {
    /// Buffer size of a tightly packed frame
    pub fn frame_len(&self, width: u32, height: u32) -> usize {
        match self {
            // chroma planes round up for odd dimensions
            Self::NV21 | Self::NV12 => {
                let luma = width as usize * height as usize;
                let chroma = width.div_ceil(2) as usize * height.div_ceil(2) as usize * 2;
                luma + chroma
            }
            Self::YUYV => width as usize * height as usize * 2,
            Self::Gray8 => width as usize * height as usize,
            Self::RGBA => width as usize * height as usize * 4,
        }
    }
}

impl std::fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::NV21 => "NV21",
            Self::NV12 => "NV12",
            Self::YUYV => "YUYV",
            Self::Gray8 => "GRAY8",
            Self::RGBA => "RGBA",
        };
        write!(f, "{}", name)
    }
}

/// Capabilities reported by an open camera
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraParameters {
    pub fps_ranges: Vec<FpsRange>,
    pub preview_formats: Vec<PixelFormat>,
    /// Supported preview sizes as `(width, height)`
    pub preview_sizes: Vec<(u32, u32)>,
}

/// Preview configuration applied to a camera
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreviewConfig {
    pub fps_range: FpsRange,
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
}

impl std::fmt::Display for PreviewConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}x{} {} @ {}",
            self.width, self.height, self.format, self.fps_range
        )
    }
}

/// Opaque handle of a texture the camera streams its preview into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PreviewTarget(pub u64);

/// One raw preview frame delivered by a one-shot callback
#[derive(Debug, Clone)]
pub struct PreviewFrame {
    pub data: Arc<[u8]>,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub captured_at: Instant,
}
