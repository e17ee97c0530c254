// SPDX-License-Identifier: GPL-3.0-only

//! Engine-wide constants

use std::time::Duration;

/// Autofocus timing
pub mod focus {
    use super::Duration;

    /// Delay before the next autofocus cycle after a successful one
    pub const RETRY_INTERVAL: Duration = Duration::from_millis(4000);
}

/// Control loop timing
pub mod timing {
    use super::Duration;

    /// Sleep between loop iterations while no display surface is bound
    pub const IDLE_INTERVAL: Duration = Duration::from_millis(10);

    /// Frame interval emulated by the headless surface `commit`
    pub const HEADLESS_FRAME_INTERVAL: Duration = Duration::from_millis(16);

    /// Frame interval of the virtual camera when no fps range was configured
    pub const VIRTUAL_CAMERA_FRAME_INTERVAL: Duration = Duration::from_millis(33);

    /// Delay before the virtual camera reports an autofocus result
    pub const VIRTUAL_FOCUS_DELAY: Duration = Duration::from_millis(20);
}

/// Layering and projection used by the 2D drawers
pub mod layers {
    /// Near plane of the orthographic projection
    pub const NEAR: f32 = 0.5;
    /// Far plane of the orthographic projection
    pub const FAR: f32 = 2.5;
    /// Depth (0 = near, 1 = far) of the camera image quad
    pub const CAMERA_Z: f32 = 0.5;
    /// Depth of the mask overlay quad
    pub const MASK_Z: f32 = 0.9;
}

/// Default colours
pub mod colors {
    /// Background behind the camera image (RGBA, 0..1)
    pub const CLEAR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];
    /// Mask dimming colour outside the clip (RGBA8)
    pub const MASK: [u8; 4] = [0, 0, 0, 0xa0];
}

/// Decoder defaults
pub mod decoder {
    /// Frames larger than this (in either axis) are downscaled before QR detection
    pub const QR_MAX_DIMENSION: u32 = 640;
}
