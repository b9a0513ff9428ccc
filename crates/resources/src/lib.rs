//! Resource loading and management.
//!
//! This crate handles everything a model needs before it can be drawn:
//! - Model, material and initials configuration
//! - Asset sources (filesystem, in-memory)
//! - glTF mesh and animation import
//! - Texture decoding and typeface fonts
//! - The [`AssetManager`] with its caches and disposal

pub mod asset_manager;
pub mod config;
pub mod error;
pub mod font;
pub mod model;
pub mod parts;
pub mod source;
pub mod texture;

pub use asset_manager::{AssetManager, MaterialKey};
pub use config::{
    Align, AssetLocation, InitialsConfig, InitialsStyle, MaterialLibrary, MaterialSpec, MeshFormat,
    ModelConfig, PartChoice, PartsSelection, Placement,
};
pub use error::{ResourceError, ResourceResult};
pub use font::Font;
pub use model::{ImportedModel, import_gltf, read_gltf_animations};
pub use parts::PartIndex;
pub use source::{AssetSource, FileSource, MemorySource};
