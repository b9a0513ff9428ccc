//! The rendering seam between the configurator core and a graphics API.
//!
//! The core never draws directly: it describes what to draw (scene,
//! camera, lights, optional per-item override) and where (screen or an
//! off-screen target), and reads pixels back when it needs them.

use image::RgbaImage;
use ripe_scene::{Camera, LightRig, NodeId, Scene, Side};

use crate::error::{RhiError, RhiResult};
use crate::target::{ClearColor, RenderTargetId};

/// What an override sees about each renderable item.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderItem {
    pub node: NodeId,
    pub object_id: u32,
    pub skinned: bool,
    pub morphing: bool,
    pub instanced: bool,
    /// Face side of the item's own material
    pub side: Side,
}

/// Flat, unlit replacement material.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OverrideMaterial {
    /// Written to the target exactly, without lighting or color management
    pub color: [u8; 4],
    pub side: Side,
}

/// Per-item material replacement for a single render call.
pub trait DrawOverride {
    /// `None` skips the item.
    fn material_for(&mut self, item: &RenderItem) -> Option<OverrideMaterial>;
}

impl<F> DrawOverride for F
where
    F: FnMut(&RenderItem) -> Option<OverrideMaterial>,
{
    fn material_for(&mut self, item: &RenderItem) -> Option<OverrideMaterial> {
        self(item)
    }
}

/// A graphics backend able to draw a scene into the screen or off-screen
/// targets.
pub trait RenderBackend {
    /// Screen size in pixels.
    fn size(&self) -> (u32, u32);

    fn set_size(&mut self, width: u32, height: u32) -> RhiResult<()>;

    fn set_exposure(&mut self, exposure: f32);

    fn create_render_target(&mut self, width: u32, height: u32) -> RhiResult<RenderTargetId>;

    /// Release a target. Returns false if it was already released.
    fn dispose_render_target(&mut self, target: RenderTargetId) -> bool;

    /// Target subsequent draws go to; `None` is the screen.
    fn render_target(&self) -> Option<RenderTargetId>;

    fn set_render_target(&mut self, target: Option<RenderTargetId>) -> RhiResult<()>;

    fn clear_color(&self) -> ClearColor;

    fn set_clear_color(&mut self, color: ClearColor);

    /// Clear the current target, then draw every visible mesh.
    fn render(
        &mut self,
        scene: &Scene,
        camera: &Camera,
        lights: &LightRig,
        draw_override: Option<&mut dyn DrawOverride>,
    ) -> RhiResult<()>;

    /// Draw a full-viewport quad mixing two targets, `mix = 0` showing `a`.
    fn blend(
        &mut self,
        camera: &Camera,
        a: RenderTargetId,
        b: RenderTargetId,
        mix: f32,
    ) -> RhiResult<()>;

    /// Read RGBA8 rows (top row first) from a target or the screen.
    fn read_pixels(
        &self,
        target: Option<RenderTargetId>,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> RhiResult<Vec<u8>>;

    /// Size of a target or the screen.
    fn target_size(&self, target: Option<RenderTargetId>) -> RhiResult<(u32, u32)>;

    /// Whole target or screen as an image.
    fn snapshot(&self, target: Option<RenderTargetId>) -> RhiResult<RgbaImage> {
        let (width, height) = self.target_size(target)?;
        let pixels = self.read_pixels(target, 0, 0, width, height)?;
        RgbaImage::from_raw(width, height, pixels).ok_or(RhiError::InvalidSize { width, height })
    }
}
