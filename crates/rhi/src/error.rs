//! RHI-specific error types.

use thiserror::Error;

use crate::target::RenderTargetId;

/// RHI-specific error type.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RhiError {
    /// The render target was never created or has been disposed
    #[error("Unknown render target: {0:?}")]
    UnknownTarget(RenderTargetId),

    /// A pixel read reached outside the target
    #[error("Region {width}x{height} at ({x}, {y}) is outside a {target_width}x{target_height} target")]
    OutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        target_width: u32,
        target_height: u32,
    },

    /// Zero-sized surfaces are not allowed
    #[error("Invalid size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },
}

/// Result type alias for RHI operations.
pub type RhiResult<T> = std::result::Result<T, RhiError>;
