//! Deterministic CPU rasterizer.
//!
//! Good enough to look at and exact where it matters:
//! - depth buffered, face-side culled triangles
//! - Lambert shading from the light rig plus a diffuse texture sample
//! - override draws write their color bytes untouched
//!
//! Shadows and post-processing are not modelled.

use glam::{Mat3, Mat4, Vec2, Vec3, Vec4, Vec4Swizzles};
use ripe_scene::{Camera, LightRig, MapSlot, Material, NodeId, Scene, Side, Transform};
use slotmap::SlotMap;
use tracing::{debug, trace};

use crate::backend::{DrawOverride, RenderBackend, RenderItem};
use crate::error::{RhiError, RhiResult};
use crate::target::{ClearColor, Framebuffer, RenderTargetId, Rgba8};

const DEFAULT_EXPOSURE: f32 = 1.0;

/// Barycentric band drawn for wireframe materials.
const WIREFRAME_BAND: f32 = 0.03;

enum Shading<'a> {
    Flat([u8; 4]),
    Lit(&'a Material),
}

struct Draw<'a> {
    node: NodeId,
    side: Side,
    shading: Shading<'a>,
}

#[derive(Clone, Copy)]
struct ScreenVertex {
    pos: Vec2,
    depth: f32,
    inv_w: f32,
    world: Vec3,
    normal: Vec3,
    uv: Vec2,
}

pub struct SoftwareBackend {
    screen: Framebuffer,
    targets: SlotMap<RenderTargetId, Framebuffer>,
    current: Option<RenderTargetId>,
    clear_color: ClearColor,
    exposure: f32,
}

impl SoftwareBackend {
    pub fn new(width: u32, height: u32) -> RhiResult<Self> {
        Ok(Self {
            screen: Framebuffer::new(width, height)?,
            targets: SlotMap::with_key(),
            current: None,
            clear_color: ClearColor::default(),
            exposure: DEFAULT_EXPOSURE,
        })
    }

    pub fn target_count(&self) -> usize {
        self.targets.len()
    }

    fn framebuffer(&self, target: Option<RenderTargetId>) -> RhiResult<&Framebuffer> {
        match target {
            Some(id) => self.targets.get(id).ok_or(RhiError::UnknownTarget(id)),
            None => Ok(&self.screen),
        }
    }

    fn output(&mut self) -> RhiResult<&mut Framebuffer> {
        match self.current {
            Some(id) => self.targets.get_mut(id).ok_or(RhiError::UnknownTarget(id)),
            None => Ok(&mut self.screen),
        }
    }
}

fn encode(linear: f32) -> u8 {
    (linear.clamp(0.0, 1.0).powf(1.0 / 2.2) * 255.0).round() as u8
}

fn blend_into(fb: &mut Framebuffer, a: &Framebuffer, b: &Framebuffer, mix: f32) {
    let (w, h) = (fb.width(), fb.height());
    for y in 0..h {
        for x in 0..w {
            let u = (x as f32 + 0.5) / w as f32;
            let v = (y as f32 + 0.5) / h as f32;
            let index = fb.index(x, y);
            fb.color[index] = a.sample(u, v).mix(b.sample(u, v), mix);
        }
    }
}

fn edge(a: Vec2, b: Vec2, p: Vec2) -> f32 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

fn collect_draws<'a>(
    scene: &'a Scene,
    mut draw_override: Option<&mut dyn DrawOverride>,
) -> Vec<Draw<'a>> {
    let default_material: &'static Material = {
        static DEFAULT: std::sync::OnceLock<Material> = std::sync::OnceLock::new();
        DEFAULT.get_or_init(Material::default)
    };

    let mut draws = Vec::new();
    for id in scene.traverse() {
        if !scene.is_visible(id) {
            continue;
        }
        let Some(node) = scene.node(id) else { continue };
        let Some(mesh) = node.as_mesh() else { continue };
        let Some(geometry) = mesh.geometry.and_then(|g| scene.geometry(g)) else {
            continue;
        };
        let material = mesh
            .material
            .and_then(|m| scene.material(m))
            .unwrap_or(default_material);

        let draw = match draw_override.as_deref_mut() {
            Some(overrides) => {
                let item = RenderItem {
                    node: id,
                    object_id: node.object_id,
                    skinned: mesh.skinned,
                    morphing: geometry.morph_targets > 0 || !mesh.morph_weights.is_empty(),
                    instanced: mesh.instances.is_some(),
                    side: material.side,
                };
                let Some(replacement) = overrides.material_for(&item) else {
                    continue;
                };
                Draw {
                    node: id,
                    side: replacement.side,
                    shading: Shading::Flat(replacement.color),
                }
            }
            None => Draw {
                node: id,
                side: material.side,
                shading: Shading::Lit(material),
            },
        };
        draws.push(draw);
    }

    // transparent surfaces after everything opaque
    draws.sort_by_key(|d| matches!(d.shading, Shading::Lit(m) if m.transparent));
    draws
}

struct Rasterizer<'a> {
    fb: &'a mut Framebuffer,
    scene: &'a Scene,
    lights: &'a LightRig,
    exposure: f32,
}

impl Rasterizer<'_> {
    fn draw(&mut self, draw: &Draw, view_projection: Mat4) {
        let scene = self.scene;
        let Some(mesh) = scene.node(draw.node).and_then(|n| n.as_mesh()) else {
            return;
        };
        let Some(geometry) = mesh.geometry.and_then(|g| scene.geometry(g)) else {
            return;
        };
        let world = scene.world_matrix(draw.node);
        let normal_matrix = Mat3::from_mat4(Transform::normal_matrix(world));
        let clip_matrix = view_projection * world;
        let (width, height) = (self.fb.width() as f32, self.fb.height() as f32);

        let vertex = |i: usize| -> Option<ScreenVertex> {
            let p = geometry.positions[i];
            let clip = clip_matrix * Vec4::new(p.x, p.y, p.z, 1.0);
            if clip.w <= 1e-6 {
                return None;
            }
            let ndc = clip.xyz() / clip.w;
            Some(ScreenVertex {
                pos: Vec2::new((ndc.x * 0.5 + 0.5) * width, (0.5 - ndc.y * 0.5) * height),
                depth: ndc.z,
                inv_w: 1.0 / clip.w,
                world: world.transform_point3(p),
                normal: geometry
                    .normals
                    .get(i)
                    .map(|n| (normal_matrix * *n).normalize_or_zero())
                    .unwrap_or(Vec3::ZERO),
                uv: geometry.uvs.get(i).copied().unwrap_or(Vec2::ZERO),
            })
        };

        for [a, b, c] in geometry.triangle_indices() {
            let (Some(v0), Some(v1), Some(v2)) = (vertex(a), vertex(b), vertex(c)) else {
                continue;
            };
            self.triangle(draw, [v0, v1, v2]);
        }
    }

    fn triangle(&mut self, draw: &Draw, [v0, v1, v2]: [ScreenVertex; 3]) {
        let area = edge(v0.pos, v1.pos, v2.pos);
        if area.abs() < f32::EPSILON {
            return;
        }
        // screen space has y pointing down, so counter-clockwise faces
        // have a negative area here
        let front_facing = area < 0.0;
        let visible = match draw.side {
            Side::Front => front_facing,
            Side::Back => !front_facing,
            Side::Double => true,
        };
        if !visible {
            return;
        }

        let (w, h) = (self.fb.width(), self.fb.height());
        let min = v0.pos.min(v1.pos).min(v2.pos).floor().max(Vec2::ZERO);
        let max = v0.pos.max(v1.pos).max(v2.pos).ceil();
        let (x0, y0) = (min.x as u32, min.y as u32);
        let x1 = (max.x.max(0.0) as u32).min(w);
        let y1 = (max.y.max(0.0) as u32).min(h);

        for y in y0..y1 {
            for x in x0..x1 {
                let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
                let b0 = edge(v1.pos, v2.pos, p) / area;
                let b1 = edge(v2.pos, v0.pos, p) / area;
                let b2 = edge(v0.pos, v1.pos, p) / area;
                if b0 < 0.0 || b1 < 0.0 || b2 < 0.0 {
                    continue;
                }
                let depth = b0 * v0.depth + b1 * v1.depth + b2 * v2.depth;
                if !(-1.0..=1.0).contains(&depth) {
                    continue;
                }
                let index = self.fb.index(x, y);
                if depth >= self.fb.depth[index] {
                    continue;
                }

                match draw.shading {
                    Shading::Flat(color) => {
                        self.fb.color[index] = Rgba8::from_array(color);
                        self.fb.depth[index] = depth;
                    }
                    Shading::Lit(material) => {
                        if material.wireframe && b0.min(b1).min(b2) > WIREFRAME_BAND {
                            continue;
                        }
                        // perspective-correct attribute weights
                        let pw = Vec3::new(b0 * v0.inv_w, b1 * v1.inv_w, b2 * v2.inv_w);
                        let pw = pw / (pw.x + pw.y + pw.z);
                        let world = v0.world * pw.x + v1.world * pw.y + v2.world * pw.z;
                        let mut normal =
                            (v0.normal * pw.x + v1.normal * pw.y + v2.normal * pw.z).normalize_or_zero();
                        if !front_facing {
                            normal = -normal;
                        }
                        let uv = v0.uv * pw.x + v1.uv * pw.y + v2.uv * pw.z;
                        let color = self.shade(material, world, normal, uv);
                        let dst = self.fb.color[index];
                        if material.transparent {
                            self.fb.color[index] = dst.mix(color, material.opacity);
                        } else {
                            self.fb.color[index] = color;
                            self.fb.depth[index] = depth;
                        }
                    }
                }
            }
        }
    }

    fn shade(&self, material: &Material, world: Vec3, normal: Vec3, uv: Vec2) -> Rgba8 {
        let mut albedo = material.color.to_vec3();
        if let Some(texture) = material.map(MapSlot::Map).and_then(|t| self.scene.texture(t)) {
            albedo *= texture.sample(uv);
        }
        let light = self.lights.irradiance(world, normal);
        let linear = albedo * light * self.exposure + material.emissive.to_vec3();
        Rgba8::new(encode(linear.x), encode(linear.y), encode(linear.z), 255)
    }
}

impl RenderBackend for SoftwareBackend {
    fn size(&self) -> (u32, u32) {
        (self.screen.width(), self.screen.height())
    }

    fn set_size(&mut self, width: u32, height: u32) -> RhiResult<()> {
        if (width, height) != self.size() {
            self.screen = Framebuffer::new(width, height)?;
            debug!(width, height, "Resized screen");
        }
        Ok(())
    }

    fn set_exposure(&mut self, exposure: f32) {
        self.exposure = exposure;
    }

    fn create_render_target(&mut self, width: u32, height: u32) -> RhiResult<RenderTargetId> {
        let id = self.targets.insert(Framebuffer::new(width, height)?);
        trace!(?id, width, height, "Created render target");
        Ok(id)
    }

    fn dispose_render_target(&mut self, target: RenderTargetId) -> bool {
        if self.current == Some(target) {
            self.current = None;
        }
        self.targets.remove(target).is_some()
    }

    fn render_target(&self) -> Option<RenderTargetId> {
        self.current
    }

    fn set_render_target(&mut self, target: Option<RenderTargetId>) -> RhiResult<()> {
        if let Some(id) = target
            && !self.targets.contains_key(id)
        {
            return Err(RhiError::UnknownTarget(id));
        }
        self.current = target;
        Ok(())
    }

    fn clear_color(&self) -> ClearColor {
        self.clear_color
    }

    fn set_clear_color(&mut self, color: ClearColor) {
        self.clear_color = color;
    }

    fn render(
        &mut self,
        scene: &Scene,
        camera: &Camera,
        lights: &LightRig,
        draw_override: Option<&mut dyn DrawOverride>,
    ) -> RhiResult<()> {
        let clear = self.clear_color.to_rgba8();
        let exposure = self.exposure;
        let fb = self.output()?;
        fb.clear(clear);

        let view_projection = camera.view_projection_matrix();
        let draws = collect_draws(scene, draw_override);
        let mut rasterizer = Rasterizer {
            fb,
            scene,
            lights,
            exposure,
        };
        for draw in &draws {
            rasterizer.draw(draw, view_projection);
        }
        trace!(draws = draws.len(), "Rendered scene");
        Ok(())
    }

    fn blend(
        &mut self,
        camera: &Camera,
        a: RenderTargetId,
        b: RenderTargetId,
        mix: f32,
    ) -> RhiResult<()> {
        // The transition camera frames the quad exactly, so the quad always
        // covers the whole viewport here.
        trace!(projection = ?camera.projection, mix, "Blending targets");
        for id in [a, b] {
            if !self.targets.contains_key(id) {
                return Err(RhiError::UnknownTarget(id));
            }
        }
        match self.current {
            None => blend_into(&mut self.screen, &self.targets[a], &self.targets[b], mix),
            Some(out) => {
                let [fb, source_a, source_b] = self
                    .targets
                    .get_disjoint_mut([out, a, b])
                    .ok_or(RhiError::UnknownTarget(out))?;
                blend_into(fb, source_a, source_b, mix);
            }
        }
        Ok(())
    }

    fn read_pixels(
        &self,
        target: Option<RenderTargetId>,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> RhiResult<Vec<u8>> {
        self.framebuffer(target)?.read(x, y, width, height)
    }

    fn target_size(&self, target: Option<RenderTargetId>) -> RhiResult<(u32, u32)> {
        let fb = self.framebuffer(target)?;
        Ok((fb.width(), fb.height()))
    }
}
