//! The configurator core.
//!
//! This crate drives a loaded product model:
//! - Orbit controls with damped rotation, pan and zoom
//! - Object picking on the GPU (id colors) or the CPU (ray casting)
//! - Engraved initials laid out over anchor transforms
//! - Highlight pulses, crossfades and intro animation playback
//! - The [`Renderer`] frame loop and the [`Configurator`] facade

pub mod configurator;
pub mod controls;
pub mod crossfade;
mod error;
pub mod highlight;
pub mod initials;
pub mod options;
pub mod picker;
pub mod playback;
pub mod renderer;
pub mod state;

pub use configurator::{ConfigState, Configurator, UpdateOptions};
pub use controls::{CameraPose, CameraPoseSink, Controls, PointerButton};
pub use crossfade::CrossfadeChange;
pub use error::{RendererError, RendererResult};
pub use options::{
    AnimateKind, CameraOptions, ControlsOptions, RaycastStrategy, RenderOptions, RendererOptions,
};
pub use picker::{decode_object_id, encode_object_id};
pub use renderer::Renderer;
pub use state::{ElementState, Event, TransitionKind, TransitionState};
