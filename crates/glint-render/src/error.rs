//! Rendering error types.

use glint_core::{GlintError, TargetId};
use thiserror::Error;

/// Errors that can occur during rendering operations.
#[derive(Error, Debug)]
pub enum RenderError {
    /// Failed to create wgpu adapter.
    #[error("failed to create graphics adapter")]
    AdapterCreationFailed,

    /// Failed to create wgpu device.
    #[error("failed to create graphics device: {0}")]
    DeviceCreationFailed(#[from] wgpu::RequestDeviceError),

    /// The render target was disposed or never created.
    #[error("render target {0:?} not found")]
    TargetNotFound(TargetId),

    /// Two targets that must match in size do not.
    #[error("target size mismatch: expected {expected:?}, got {actual:?}")]
    SizeMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    /// Mapping a readback buffer failed.
    #[error("pixel readback failed: {0}")]
    ReadbackFailed(String),

    /// A readback rectangle does not fit inside its target.
    #[error("region {x},{y} {width}x{height} is outside a {target_width}x{target_height} target")]
    OutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        target_width: u32,
        target_height: u32,
    },

    /// Encoding or writing a captured image failed.
    #[error("image capture failed: {0}")]
    Capture(#[from] image::ImageError),

    /// Captured pixel data does not match the stated size.
    #[error("invalid image data")]
    InvalidImageData,

    /// Scene or pick registry error.
    #[error(transparent)]
    Core(#[from] GlintError),
}

/// A specialized Result type for rendering operations.
pub type RenderResult<T> = std::result::Result<T, RenderError>;
