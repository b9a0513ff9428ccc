//! Scene graph and components.
//!
//! This crate provides scene management:
//! - Scene graph with generational handles and resource pools
//! - Transforms, cameras and the studio light rig
//! - Materials, textures and triangle geometry
//! - Shape triangulation and extrusion
//! - Keyframe animation

pub mod animation;
pub mod camera;
pub mod geometry;
pub mod graph;
pub mod light;
pub mod material;
pub mod shape;
pub mod texture;
pub mod transform;

pub use animation::{AnimationClip, AnimationMixer, Interpolation, LoopMode, Track, TrackValues};
pub use camera::{Camera, Projection, ViewOffset};
pub use geometry::{Aabb, Geometry, Ray};
pub use graph::{GeometryId, MaterialId, MeshData, Node, NodeId, NodeKind, Scene, TextureId};
pub use light::{HemisphereLight, LightRig, PointLight};
pub use material::{Color, ColorSpace, MapSlot, Material, Side, Workflow};
pub use shape::Shape;
pub use texture::Texture;
pub use transform::Transform;
