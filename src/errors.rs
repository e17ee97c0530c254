// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the scan engine

use std::fmt;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Result type for camera capability calls
pub type CameraResult<T> = Result<T, CameraError>;

/// Result type for graphics capability calls
pub type GraphicsResult<T> = Result<T, GraphicsError>;

/// Main error type
#[derive(Debug, Clone)]
pub enum AppError {
    /// Camera-related errors
    Camera(CameraError),
    /// Graphics context / surface errors
    Graphics(GraphicsError),
    /// Frame decoding errors
    Decode(DecodeError),
    /// Configuration errors
    Config(String),
    /// An operation was called in a lifecycle state that does not allow it
    IllegalState(String),
    /// The control loop panicked
    Panicked(String),
    /// Generic error with message
    Other(String),
}

/// Camera-specific errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraError {
    /// The camera could not be opened
    OpenFailed(String),
    /// The camera reports no usable fps range or preview size
    NoPreviewConfiguration,
    /// The camera refused the requested parameters
    ParametersRejected(String),
    /// Starting or stopping the preview failed
    PreviewFailed(String),
    /// The camera has already been released
    Released,
}

/// Graphics-specific errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphicsError {
    /// Creating the rendering context failed
    ContextCreation(String),
    /// Binding the rendering context to the current thread failed
    MakeCurrent(String),
    /// Creating a surface or texture render target failed
    SurfaceCreation(String),
    /// Uploading pixels to a texture failed
    TextureUpload(String),
    /// A draw call failed
    Draw(String),
}

/// Frame decoding errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The decoder cannot read this pixel format
    UnsupportedFormat(String),
    /// The frame buffer is shorter than its dimensions require
    BufferTooSmall { expected: usize, actual: usize },
    /// The decoder failed for another reason
    Failed(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Camera(e) => write!(f, "Camera error: {}", e),
            AppError::Graphics(e) => write!(f, "Graphics error: {}", e),
            AppError::Decode(e) => write!(f, "Decode error: {}", e),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::IllegalState(msg) => write!(f, "Illegal state: {}", msg),
            AppError::Panicked(msg) => write!(f, "Scan loop panicked: {}", msg),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for CameraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraError::OpenFailed(msg) => write!(f, "Failed to open camera: {}", msg),
            CameraError::NoPreviewConfiguration => {
                write!(f, "Camera has no supported preview configuration")
            }
            CameraError::ParametersRejected(msg) => write!(f, "Parameters rejected: {}", msg),
            CameraError::PreviewFailed(msg) => write!(f, "Preview failed: {}", msg),
            CameraError::Released => write!(f, "Camera already released"),
        }
    }
}

impl fmt::Display for GraphicsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphicsError::ContextCreation(msg) => write!(f, "Context creation failed: {}", msg),
            GraphicsError::MakeCurrent(msg) => write!(f, "Make current failed: {}", msg),
            GraphicsError::SurfaceCreation(msg) => write!(f, "Surface creation failed: {}", msg),
            GraphicsError::TextureUpload(msg) => write!(f, "Texture upload failed: {}", msg),
            GraphicsError::Draw(msg) => write!(f, "Draw failed: {}", msg),
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::UnsupportedFormat(format) => {
                write!(f, "Unsupported pixel format: {}", format)
            }
            DecodeError::BufferTooSmall { expected, actual } => write!(
                f,
                "Frame buffer too small: expected {} bytes, got {}",
                expected, actual
            ),
            DecodeError::Failed(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for CameraError {}
impl std::error::Error for GraphicsError {}
impl std::error::Error for DecodeError {}

// Conversions from sub-errors to AppError
impl From<CameraError> for AppError {
    fn from(err: CameraError) -> Self {
        AppError::Camera(err)
    }
}

impl From<GraphicsError> for AppError {
    fn from(err: GraphicsError) -> Self {
        AppError::Graphics(err)
    }
}

impl From<DecodeError> for AppError {
    fn from(err: DecodeError) -> Self {
        AppError::Decode(err)
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Other(msg.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_wraps_sub_error() {
        let err: AppError = CameraError::NoPreviewConfiguration.into();
        assert_eq!(
            err.to_string(),
            "Camera error: Camera has no supported preview configuration"
        );
    }

    #[test]
    fn test_buffer_too_small_message() {
        let err = DecodeError::BufferTooSmall {
            expected: 12,
            actual: 4,
        };
        assert_eq!(
            err.to_string(),
            "Frame buffer too small: expected 12 bytes, got 4"
        );
    }
}
