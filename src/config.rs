// SPDX-License-Identifier: GPL-3.0-only

//! Scan session configuration
//!
//! Stored as JSON under the user config directory. Every field has a default,
//! so partial files load fine.

use crate::backends::camera::{CameraFacing, DisplayRotation};
use crate::constants::{colors, decoder, focus, timing};
use crate::errors::{AppError, AppResult};
use crate::geometry::ScaleType;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Directory name under the platform config dir
const APP_DIR: &str = "scanpanel";

/// File name of the stored configuration
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Preferred camera facing when the callback does not pick a camera
    pub facing: CameraFacing,
    /// How the camera preview is fitted to the display
    pub scale_type: ScaleType,
    /// Initial display rotation
    pub display_rotation: DisplayRotation,
    /// Render into a texture view instead of a surface view
    pub use_texture_view: bool,
    /// Start scanning when the panel is attached
    pub autostart: bool,
    /// Delay after a successful autofocus before the next one
    pub focus_interval_ms: u64,
    /// Dimming colour outside the scan clip (RGBA8)
    pub mask_color: [u8; 4],
    /// Background colour behind the camera image (RGBA, 0..1)
    pub clear_color: [f32; 4],
    /// Loop sleep while nothing is presented
    pub idle_interval_ms: u64,
    /// Largest dimension handed to the QR detector
    pub qr_max_dimension: u32,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            facing: CameraFacing::Back,
            scale_type: ScaleType::CenterCrop,
            display_rotation: DisplayRotation::Rotation0,
            use_texture_view: false,
            autostart: false,
            focus_interval_ms: focus::RETRY_INTERVAL.as_millis() as u64,
            mask_color: colors::MASK,
            clear_color: colors::CLEAR,
            idle_interval_ms: timing::IDLE_INTERVAL.as_millis() as u64,
            qr_max_dimension: decoder::QR_MAX_DIMENSION,
        }
    }
}

impl ScanConfig {
    pub fn focus_interval(&self) -> Duration {
        Duration::from_millis(self.focus_interval_ms)
    }

    pub fn idle_interval(&self) -> Duration {
        Duration::from_millis(self.idle_interval_ms)
    }

    /// `<config dir>/scanpanel/config.json`, if the platform has a config dir
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    pub fn load(path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read '{}': {}", path.display(), e))
        })?;
        let config = serde_json::from_str(&contents)?;
        debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Write the configuration, creating parent directories as needed
    pub fn save(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        debug!(path = %path.display(), "Saved configuration");
        Ok(())
    }

    /// Load from the default path, falling back to defaults
    pub fn load_or_default() -> Self {
        let Some(path) = Self::default_path() else {
            warn!("No config directory available, using defaults");
            return Self::default();
        };
        if !path.exists() {
            debug!(path = %path.display(), "No configuration file, using defaults");
            return Self::default();
        }
        Self::load(&path).unwrap_or_else(|e| {
            warn!(error = %e, path = %path.display(), "Ignoring unreadable configuration");
            Self::default()
        })
    }
}
