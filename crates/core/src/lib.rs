//! Core utilities for the RIPE client-side renderer.
//!
//! This crate provides foundational types and utilities used across the renderer:
//! - Error types and result aliases
//! - Logging initialization
//! - Timer and throttle utilities
//! - Easing curves for transitions
//! - Frame keys (`side-3`) and view/position conversions
//! - Cooperative cancellation

mod cancel;
mod easing;
mod error;
pub mod frame;
mod logging;
mod timer;

pub use cancel::CancelToken;
pub use easing::Easing;
pub use error::{Error, Result};
pub use frame::{FrameKey, VIEW_FRAMES, View};
pub use logging::init_logging;
pub use timer::{Throttle, Timer};
