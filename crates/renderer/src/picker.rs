//! Object picking.
//!
//! The GPU picker renders every raycastable mesh with a flat color holding
//! its object id into a 1x1 target covering the pixel under the cursor,
//! then decodes the id from the read-back bytes. The CPU picker casts a
//! ray against the geometry instead; it cannot see skinned deformation.

use std::collections::HashMap;

use bitflags::bitflags;
use glam::Vec2;
use ripe_rhi::{
    ClearColor, DrawOverride, OverrideMaterial, RenderBackend, RenderItem, RenderTargetId,
};
use ripe_scene::{Camera, LightRig, NodeId, Scene, Side};
use tracing::trace;

use crate::error::RendererResult;

bitflags! {
    /// Shader variant an id material has to be compiled for.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PickVariant: u8 {
        const MORPHING = 1 << 0;
        const SKINNING = 1 << 1;
        const INSTANCING = 1 << 2;
        const FRONT_SIDE = 1 << 3;
        const BACK_SIDE = 1 << 4;
        const DOUBLE_SIDE = 1 << 5;
    }
}

impl PickVariant {
    /// Variant bits of the override material `item` needs.
    pub fn of(item: &RenderItem) -> Self {
        let mut variant = PickVariant::empty();
        variant.set(PickVariant::MORPHING, item.morphing);
        variant.set(PickVariant::SKINNING, item.skinned);
        variant.set(PickVariant::INSTANCING, item.instanced);
        variant |= match item.side {
            Side::Front => PickVariant::FRONT_SIDE,
            Side::Back => PickVariant::BACK_SIDE,
            Side::Double => PickVariant::DOUBLE_SIDE,
        };
        variant
    }
}

/// Object id as the RGBA bytes written by the id material, most
/// significant byte in red.
pub fn encode_object_id(id: u32) -> [u8; 4] {
    id.to_be_bytes()
}

/// Object id read back from a pixel. The white clear color and zero both
/// mean nothing was hit.
pub fn decode_object_id(rgba: [u8; 4]) -> Option<u32> {
    match u32::from_be_bytes(rgba) {
        0 | u32::MAX => None,
        id => Some(id),
    }
}

/// Draw override painting each item with its encoded object id.
struct IdMaterials<'a> {
    scene: &'a Scene,
    cache: &'a mut HashMap<PickVariant, OverrideMaterial>,
}

impl DrawOverride for IdMaterials<'_> {
    fn material_for(&mut self, item: &RenderItem) -> Option<OverrideMaterial> {
        let pickable = self.scene.node(item.node).is_some_and(|n| n.raycastable);
        if !pickable {
            return None;
        }
        let variant = PickVariant::of(item);
        let material = self.cache.entry(variant).or_insert_with(|| {
            trace!(?variant, "Created pick material variant");
            OverrideMaterial {
                color: [255; 4],
                side: item.side,
            }
        });
        material.color = encode_object_id(item.object_id);
        Some(*material)
    }
}

#[derive(Debug, Default)]
pub struct GpuPicker {
    target: Option<RenderTargetId>,
    variants: HashMap<PickVariant, OverrideMaterial>,
}

impl GpuPicker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of id material variants built so far.
    pub fn variant_count(&self) -> usize {
        self.variants.len()
    }

    /// Object id under the screen pixel `(x, y)`.
    ///
    /// Render target, clear color and camera view offset are restored
    /// before returning, on success and on failure.
    pub fn pick<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        scene: &Scene,
        camera: &mut Camera,
        lights: &LightRig,
        x: f32,
        y: f32,
    ) -> RendererResult<Option<u32>> {
        let target = match self.target {
            Some(target) => target,
            None => {
                let target = backend.create_render_target(1, 1)?;
                self.target = Some(target);
                target
            }
        };

        let (width, height) = backend.size();
        camera.set_view_offset(width as f32, height as f32, x, y, 1.0, 1.0);
        let previous_target = backend.render_target();
        let previous_clear = backend.clear_color();

        let mut ids = IdMaterials {
            scene,
            cache: &mut self.variants,
        };
        let read = backend
            .set_render_target(Some(target))
            .and_then(|_| {
                backend.set_clear_color(ClearColor::WHITE);
                backend.render(scene, camera, lights, Some(&mut ids))
            })
            .and_then(|_| backend.read_pixels(Some(target), 0, 0, 1, 1));

        let restored = backend.set_render_target(previous_target);
        backend.set_clear_color(previous_clear);
        camera.clear_view_offset();

        let pixels = read?;
        restored?;
        let rgba = [pixels[0], pixels[1], pixels[2], pixels[3]];
        Ok(decode_object_id(rgba))
    }

    /// Release the picking target.
    pub fn dispose<B: RenderBackend + ?Sized>(&mut self, backend: &mut B) {
        if let Some(target) = self.target.take() {
            backend.dispose_render_target(target);
        }
        self.variants.clear();
    }
}

/// Ray casting against mesh triangles.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpuPicker;

impl CpuPicker {
    /// Closest raycastable, visible mesh along the ray through `ndc`.
    pub fn pick(&self, scene: &Scene, camera: &Camera, ndc: Vec2) -> Option<NodeId> {
        let ray = camera.ray_from_ndc(ndc);
        let mut nearest: Option<(f32, NodeId)> = None;
        for (id, node) in scene.nodes() {
            if !node.raycastable || !scene.is_visible(id) {
                continue;
            }
            let Some(mesh) = node.as_mesh() else {
                continue;
            };
            let Some(geometry) = mesh.geometry.and_then(|g| scene.geometry(g)) else {
                continue;
            };
            let side = mesh
                .material
                .and_then(|m| scene.material(m))
                .map_or(Side::Front, |m| m.side);
            let (front, back) = match side {
                Side::Front => (true, false),
                Side::Back => (false, true),
                Side::Double => (true, true),
            };
            if let Some(t) = geometry.raycast(&ray, scene.world_matrix(id), front, back)
                && nearest.is_none_or(|(best, _)| t < best)
            {
                nearest = Some((t, id));
            }
        }
        nearest.map(|(_, id)| id)
    }
}

/// The configured hit testing strategy.
#[derive(Debug)]
pub enum Raycaster {
    Gpu(GpuPicker),
    Cpu(CpuPicker),
}

impl Raycaster {
    /// Pointer position in element pixels to the coordinates the strategy
    /// expects: pixels for the GPU picker, NDC for the CPU one.
    pub fn convert(&self, x: f32, y: f32, width: u32, height: u32) -> Vec2 {
        match self {
            Raycaster::Gpu(_) => Vec2::new(x, y),
            Raycaster::Cpu(_) => Vec2::new(
                x / width as f32 * 2.0 - 1.0,
                -(y / height as f32) * 2.0 + 1.0,
            ),
        }
    }

    /// Node under the element pixel `(x, y)`.
    pub fn pick<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        scene: &Scene,
        camera: &mut Camera,
        lights: &LightRig,
        x: f32,
        y: f32,
    ) -> RendererResult<Option<NodeId>> {
        let (width, height) = backend.size();
        let at = self.convert(x, y, width, height);
        match self {
            Raycaster::Gpu(picker) => {
                let id = picker.pick(backend, scene, camera, lights, at.x, at.y)?;
                Ok(id.and_then(|id| scene.find_by_object_id(id)))
            }
            Raycaster::Cpu(picker) => Ok(picker.pick(scene, camera, at)),
        }
    }

    /// Release the pick target, if one was created.
    pub fn dispose<B: RenderBackend + ?Sized>(&mut self, backend: &mut B) {
        if let Raycaster::Gpu(picker) = self {
            picker.dispose(backend);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use ripe_rhi::SoftwareBackend;
    use ripe_scene::{Geometry, Material, MeshData, Node};

    fn scene() -> (Scene, NodeId) {
        let mut scene = Scene::new();
        let geometry = scene.add_geometry(Geometry::cuboid(Vec3::splat(2.0)));
        let material = scene.add_material(Material::default());
        let mut node = Node::mesh("side", MeshData::new(geometry, Some(material)));
        node.raycastable = true;
        let id = scene.add_node(node, None);
        (scene, id)
    }

    fn camera() -> Camera {
        let mut camera = Camera::perspective(45.0, 1.0, 0.1, 100.0);
        camera.position = Vec3::new(0.0, 0.0, 6.0);
        camera.look_at(Vec3::ZERO);
        camera
    }

    #[test]
    fn test_object_id_encoding() {
        let bytes = encode_object_id(0x0102_0304);
        assert_eq!(bytes, [1, 2, 3, 4]);
        assert_eq!(decode_object_id(bytes), Some(0x0102_0304));
    }

    #[test]
    fn test_sentinels_decode_to_none() {
        assert_eq!(decode_object_id([255; 4]), None);
        assert_eq!(decode_object_id([0; 4]), None);
        assert_eq!(decode_object_id([0, 0, 1, 0]), Some(256));
    }

    #[test]
    fn test_variant_bits() {
        let (_, node) = scene();
        let item = RenderItem {
            node,
            object_id: 1,
            skinned: true,
            morphing: false,
            instanced: false,
            side: Side::Double,
        };
        let variant = PickVariant::of(&item);
        assert_eq!(variant.bits(), 0b10_0010);
    }

    #[test]
    fn test_gpu_pick_hit_and_miss() {
        let (scene, node) = scene();
        let mut backend = SoftwareBackend::new(64, 64).unwrap();
        let mut camera = camera();
        let lights = LightRig::studio(6.0);
        let mut picker = GpuPicker::new();

        let hit = picker
            .pick(&mut backend, &scene, &mut camera, &lights, 32.0, 32.0)
            .unwrap();
        assert_eq!(hit, Some(scene.node(node).unwrap().object_id));

        let miss = picker.pick(&mut backend, &scene, &mut camera, &lights, 1.0, 1.0).unwrap();
        assert_eq!(miss, None);
        assert_eq!(picker.variant_count(), 1, "variant reused across picks");
    }

    #[test]
    fn test_gpu_pick_restores_state() {
        let (scene, _) = scene();
        let mut backend = SoftwareBackend::new(32, 32).unwrap();
        let mut camera = camera();
        let lights = LightRig::studio(6.0);
        let clear = ClearColor::new(ripe_scene::Color::new(0.2, 0.3, 0.4), 1.0);
        backend.set_clear_color(clear);
        let mut picker = GpuPicker::new();

        picker.pick(&mut backend, &scene, &mut camera, &lights, 16.0, 16.0).unwrap();
        assert_eq!(backend.render_target(), None);
        assert_eq!(backend.clear_color(), clear);
        assert!(camera.view_offset().is_none());
        assert_eq!(backend.target_count(), 1);

        picker.dispose(&mut backend);
        assert_eq!(backend.target_count(), 0);
    }

    #[test]
    fn test_non_raycastable_meshes_are_skipped() {
        let (mut scene, node) = scene();
        scene.node_mut(node).unwrap().raycastable = false;
        let mut backend = SoftwareBackend::new(32, 32).unwrap();
        let mut camera = camera();
        let mut raycaster = Raycaster::Gpu(GpuPicker::new());
        let hit = raycaster
            .pick(&mut backend, &scene, &mut camera, &LightRig::studio(6.0), 16.0, 16.0)
            .unwrap();
        assert_eq!(hit, None);
    }

    #[test]
    fn test_cpu_pick_matches_gpu_pick() {
        let (scene, node) = scene();
        let mut backend = SoftwareBackend::new(64, 64).unwrap();
        let mut camera = camera();
        let lights = LightRig::studio(6.0);
        let mut cpu = Raycaster::Cpu(CpuPicker);
        let mut gpu = Raycaster::Gpu(GpuPicker::new());
        for (x, y) in [(32.0, 32.0), (2.0, 60.0)] {
            let a = cpu.pick(&mut backend, &scene, &mut camera, &lights, x, y).unwrap();
            let b = gpu.pick(&mut backend, &scene, &mut camera, &lights, x, y).unwrap();
            assert_eq!(a, b, "at ({x}, {y})");
        }
        assert_eq!(
            cpu.pick(&mut backend, &scene, &mut camera, &lights, 32.0, 32.0).unwrap(),
            Some(node)
        );
    }

    #[test]
    fn test_cpu_coordinates_are_ndc() {
        let raycaster = Raycaster::Cpu(CpuPicker);
        assert_eq!(raycaster.convert(0.0, 0.0, 100, 50), Vec2::new(-1.0, 1.0));
        assert_eq!(raycaster.convert(100.0, 50.0, 100, 50), Vec2::new(1.0, -1.0));
        let gpu = Raycaster::Gpu(GpuPicker::new());
        assert_eq!(gpu.convert(10.0, 20.0, 100, 50), Vec2::new(10.0, 20.0));
    }
}
