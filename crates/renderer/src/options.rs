//! Renderer, camera and controls options.
//!
//! Every struct deserializes from the camelCase option objects the
//! configurator is created with; absent fields keep their defaults.

use glam::Vec3;
use ripe_core::{Easing, Error};
use ripe_resources::config::Point3;
use serde::Deserialize;

use crate::error::RendererResult;

/// How a frame change is animated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnimateKind {
    Crossfade,
    Rotate,
    None,
}

/// Hit testing strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RaycastStrategy {
    #[default]
    Gpu,
    Cpu,
}

/// Orbit limits and behavior of the camera controls.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ControlsOptions {
    pub min_hor_angle: f32,
    pub max_hor_angle: f32,
    pub min_ver_angle: f32,
    pub max_ver_angle: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    /// Starting horizontal angle, overrides the starting position
    pub horizontal_angle: Option<f32>,
    pub vertical_angle: Option<f32>,
    pub rotation_easing: Easing,
    pub smooth_controls: bool,
    pub can_pan: bool,
    pub can_zoom: bool,
    /// Vertical angle used for the top and bottom views
    pub vertical_threshold: f32,
    pub rotation_duration: f64,
    pub recenter_duration: f64,
}

impl Default for ControlsOptions {
    fn default() -> Self {
        Self {
            min_hor_angle: 0.0,
            max_hor_angle: 359.0,
            min_ver_angle: 0.0,
            max_ver_angle: 89.0,
            min_distance: 0.0,
            max_distance: 1000.0,
            horizontal_angle: None,
            vertical_angle: None,
            rotation_easing: Easing::EaseInOutQuad,
            smooth_controls: true,
            can_pan: true,
            can_zoom: true,
            vertical_threshold: 85.0,
            rotation_duration: 500.0,
            recenter_duration: 500.0,
        }
    }
}

impl ControlsOptions {
    /// Horizontal rotation is unbounded.
    pub fn free_rotation(&self) -> bool {
        self.min_hor_angle < 0.0 && self.max_hor_angle > 359.0
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CameraOptions {
    /// Vertical field of view in degrees
    pub fov: f32,
    pub height: f32,
    pub target: Point3,
    pub distance: f32,
    #[serde(flatten)]
    pub controls: ControlsOptions,
}

impl Default for CameraOptions {
    fn default() -> Self {
        Self {
            fov: 20.0,
            height: 0.0,
            target: Point3::default(),
            distance: 100.0,
            controls: ControlsOptions::default(),
        }
    }
}

impl CameraOptions {
    /// Orbit center the camera starts at.
    pub fn target(&self) -> Vec3 {
        self.target.into()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RenderOptions {
    pub easing: Easing,
    pub material_easing: Easing,
    pub crossfade_easing: Easing,
    pub highlight_easing: Easing,
    pub no_masks: bool,
    pub use_masks: bool,
    /// Fraction of the base color removed by a highlight
    pub mask_opacity: f32,
    pub mask_duration: f64,
    pub plays_animation: bool,
    pub animation_loops: bool,
    /// Clip to autoplay, the first available one when unset
    pub animation: Option<String>,
    pub exposure: f32,
    pub wireframe: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            easing: Easing::EaseInOutQuad,
            material_easing: Easing::EaseInOutQuad,
            crossfade_easing: Easing::EaseInOutQuad,
            highlight_easing: Easing::EaseInOutQuad,
            no_masks: false,
            use_masks: true,
            mask_opacity: 0.4,
            mask_duration: 150.0,
            plays_animation: true,
            animation_loops: true,
            animation: None,
            exposure: 1.5,
            wireframe: false,
        }
    }
}

impl RenderOptions {
    /// Highlights are allowed: `useMasks` wins over `noMasks`.
    pub fn masks_enabled(&self) -> bool {
        self.use_masks || !self.no_masks
    }
}

/// Everything the renderer core is configured with.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RendererOptions {
    pub camera: CameraOptions,
    pub renderer: RenderOptions,
    pub view_animate: AnimateKind,
    pub position_animate: AnimateKind,
    pub raycast_strategy: RaycastStrategy,
    /// Keep hit testing on while a clip plays
    pub enable_raycast_animation: bool,
    /// Minimum milliseconds between two raycasts
    pub raycast_throttle: f64,
    pub crossfade_duration: f64,
    /// Vertical angle from which the camera counts as top or bottom
    pub view_threshold: f32,
    /// Starting frame position
    pub position: u32,
}

impl Default for RendererOptions {
    fn default() -> Self {
        Self {
            camera: CameraOptions::default(),
            renderer: RenderOptions::default(),
            view_animate: AnimateKind::Crossfade,
            position_animate: AnimateKind::Rotate,
            raycast_strategy: RaycastStrategy::Gpu,
            enable_raycast_animation: false,
            raycast_throttle: 50.0,
            crossfade_duration: 500.0,
            view_threshold: 80.0,
            position: 0,
        }
    }
}

impl RendererOptions {
    /// Parse camelCase JSON options; missing keys keep their defaults.
    pub fn from_json(bytes: &[u8]) -> RendererResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| Error::Config(format!("renderer options: {e}")).into())
    }
}
