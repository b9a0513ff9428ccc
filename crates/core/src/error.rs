//! Error types shared by the configurator crates.

use thiserror::Error;

/// Core error type.
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or malformed configuration
    #[error("Config error: {0}")]
    Config(String),

    /// A frame key that cannot be parsed into a view and position
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// The operation observed a cancelled token
    #[error("Operation cancelled")]
    Cancelled,
}

/// Result alias over [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
