//! Render Hardware Interface.
//!
//! This crate provides the seam between the configurator core and whatever
//! actually draws pixels:
//! - [`RenderBackend`], the operations the core relies on
//! - [`DrawOverride`], per-item flat materials used for picking
//! - Off-screen render targets with pixel read-back
//! - [`SoftwareBackend`], a deterministic CPU rasterizer

mod error;

pub mod backend;
pub mod software;
pub mod target;

pub use backend::{DrawOverride, OverrideMaterial, RenderBackend, RenderItem};
pub use error::{RhiError, RhiResult};
pub use software::SoftwareBackend;
pub use target::{ClearColor, Framebuffer, RenderTargetId, Rgba8};
