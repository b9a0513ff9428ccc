//! Error types for resource loading.

use thiserror::Error;

/// Error type for resource loading operations.
#[derive(Error, Debug)]
pub enum ResourceError {
    /// The asset source could not deliver the bytes.
    #[error("Failed to fetch '{url}': {message}")]
    Fetch {
        /// Location that was requested.
        url: String,
        /// Error message.
        message: String,
    },

    /// The asset source has nothing at this location.
    #[error("Asset not found: {0}")]
    NotFound(String),

    /// Failed to load a glTF file.
    #[error("Failed to load glTF file '{path}': {message}")]
    GltfLoad {
        /// Location of the file that failed to load.
        path: String,
        /// Error message.
        message: String,
    },

    /// glTF file contains no meshes.
    #[error("glTF file '{0}' contains no meshes")]
    NoMeshes(String),

    /// A mesh primitive has no position data.
    #[error("Mesh primitive has no position data")]
    NoPositionData,

    /// Mesh format recognized but not importable.
    #[error("Unsupported mesh format: {0}")]
    UnsupportedFormat(String),

    /// No material record for the requested combination or its fallbacks.
    #[error("No material configured for part '{part}' ({kind}/{color})")]
    MissingMaterial {
        part: String,
        kind: String,
        color: String,
    },

    /// Required configuration is absent.
    #[error("Missing configuration: {0}")]
    MissingConfig(String),

    /// Malformed typeface data.
    #[error("Font error: {0}")]
    Font(String),

    /// The load was cancelled through its token.
    #[error("Load cancelled")]
    Cancelled,

    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding error.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<ripe_core::Error> for ResourceError {
    fn from(err: ripe_core::Error) -> Self {
        match err {
            ripe_core::Error::Cancelled => ResourceError::Cancelled,
            other => ResourceError::MissingConfig(other.to_string()),
        }
    }
}

/// Result type alias for resource operations.
pub type ResourceResult<T> = Result<T, ResourceError>;
