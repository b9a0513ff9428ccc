//! Error types for the renderer core.

use ripe_resources::ResourceError;
use ripe_rhi::RhiError;
use thiserror::Error;

/// Error type for configurator and renderer operations.
#[derive(Error, Debug)]
pub enum RendererError {
    /// Loading or resolving an asset failed.
    #[error(transparent)]
    Resource(#[from] ResourceError),

    /// The render backend rejected an operation.
    #[error(transparent)]
    Rhi(#[from] RhiError),

    /// Frame parsing, cancellation and other core failures.
    #[error(transparent)]
    Core(#[from] ripe_core::Error),

    /// Autoplay asked for a clip the model does not have.
    #[error("There is no animation named '{0}'")]
    AnimationNotFound(String),

    /// The operation needs loaded assets.
    #[error("Assets are not loaded")]
    NotLoaded,
}

/// Result type alias for renderer operations.
pub type RendererResult<T> = Result<T, RendererError>;
