//! glTF import into the scene graph.
//!
//! Every glTF node becomes a scene node under a single root group named
//! after the source file. A mesh with several primitives becomes a group
//! with one `{name}_{i}` child per primitive so each can carry its own
//! material.

use std::collections::HashMap;

use glam::{Quat, Vec2, Vec3};
use gltf::animation::util::ReadOutputs;
use gltf::animation::{Interpolation as GltfInterpolation, Property};
use image::{DynamicImage, RgbImage, RgbaImage};
use ripe_scene::{
    AnimationClip, Color, ColorSpace, Geometry, Interpolation, MapSlot, Material, MaterialId,
    MeshData, Node, NodeId, Scene, Side, TextureId, Track, TrackValues, Transform, Workflow,
};
use tracing::{debug, info, warn};

use crate::error::{ResourceError, ResourceResult};

/// Result of importing one glTF document.
#[derive(Debug)]
pub struct ImportedModel {
    /// Group node holding the imported hierarchy
    pub root: NodeId,
    /// Clips embedded in the document
    pub animations: Vec<AnimationClip>,
    /// Number of mesh nodes created
    pub mesh_count: usize,
}

/// Import a `.gltf` (self-contained) or `.glb` document into `scene`.
pub fn import_gltf(
    bytes: &[u8],
    label: &str,
    scene: &mut Scene,
    parent: Option<NodeId>,
) -> ResourceResult<ImportedModel> {
    let (document, buffers, images) = gltf::import_slice(bytes).map_err(|e| gltf_error(label, e))?;

    if document.meshes().next().is_none() {
        return Err(ResourceError::NoMeshes(label.to_string()));
    }

    let root = scene.add_node(Node::group(label), parent);
    let mut importer = Importer {
        scene,
        buffers: &buffers,
        images: &images,
        label,
        materials: HashMap::new(),
        textures: HashMap::new(),
        mesh_count: 0,
    };

    let gltf_scene = document.default_scene().or_else(|| document.scenes().next());
    match gltf_scene {
        Some(s) => {
            for node in s.nodes() {
                importer.import_node(&node, root)?;
            }
        }
        None => warn!(label, "glTF document declares no scene"),
    }

    let mesh_count = importer.mesh_count;
    let animations = read_animations(&document, &buffers);
    info!(
        label,
        meshes = mesh_count,
        animations = animations.len(),
        "Imported glTF model"
    );

    Ok(ImportedModel {
        root,
        animations,
        mesh_count,
    })
}

/// Read only the animation clips of a glTF document.
pub fn read_gltf_animations(bytes: &[u8], label: &str) -> ResourceResult<Vec<AnimationClip>> {
    let (document, buffers, _) = gltf::import_slice(bytes).map_err(|e| gltf_error(label, e))?;
    Ok(read_animations(&document, &buffers))
}

fn gltf_error(label: &str, error: gltf::Error) -> ResourceError {
    ResourceError::GltfLoad {
        path: label.to_string(),
        message: error.to_string(),
    }
}

/// Stable name for a glTF node, shared by the node import and track binding.
fn node_name(node: &gltf::Node) -> String {
    node.name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("node_{}", node.index()))
}

struct Importer<'a> {
    scene: &'a mut Scene,
    buffers: &'a [gltf::buffer::Data],
    images: &'a [gltf::image::Data],
    label: &'a str,
    materials: HashMap<Option<usize>, MaterialId>,
    textures: HashMap<usize, TextureId>,
    mesh_count: usize,
}

impl Importer<'_> {
    fn import_node(&mut self, node: &gltf::Node, parent: NodeId) -> ResourceResult<()> {
        let (translation, rotation, scale) = node.transform().decomposed();
        let transform = Transform::new()
            .with_position(Vec3::from(translation))
            .with_rotation(Quat::from_array(rotation))
            .with_scale(Vec3::from(scale));
        let name = node_name(node);
        let skinned = node.skin().is_some();

        let id = match node.mesh() {
            Some(mesh) => {
                let weights = mesh.weights().map(<[f32]>::to_vec).unwrap_or_default();
                let primitives: Vec<_> = mesh.primitives().collect();
                if primitives.len() == 1 {
                    let data = self.import_primitive(&primitives[0], skinned, &weights)?;
                    self.scene
                        .add_node(Node::mesh(name, data).with_transform(transform), Some(parent))
                } else {
                    let group = self
                        .scene
                        .add_node(Node::group(name.clone()).with_transform(transform), Some(parent));
                    for (i, primitive) in primitives.iter().enumerate() {
                        let data = self.import_primitive(primitive, skinned, &weights)?;
                        self.scene
                            .add_node(Node::mesh(format!("{name}_{i}"), data), Some(group));
                    }
                    group
                }
            }
            None => self
                .scene
                .add_node(Node::group(name).with_transform(transform), Some(parent)),
        };

        for child in node.children() {
            self.import_node(&child, id)?;
        }
        Ok(())
    }

    fn import_primitive(
        &mut self,
        primitive: &gltf::Primitive,
        skinned: bool,
        weights: &[f32],
    ) -> ResourceResult<MeshData> {
        let buffers = self.buffers;
        let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|d| d.0.as_slice()));

        let positions: Vec<Vec3> = reader
            .read_positions()
            .ok_or(ResourceError::NoPositionData)?
            .map(Vec3::from)
            .collect();
        let indices: Vec<u32> = match reader.read_indices() {
            Some(indices) => indices.into_u32().collect(),
            None => (0..positions.len() as u32).collect(),
        };
        let mut geometry = Geometry::new(positions, indices);
        match reader.read_normals() {
            Some(normals) => geometry.normals = normals.map(Vec3::from).collect(),
            None => geometry.compute_vertex_normals(),
        }
        if let Some(uvs) = reader.read_tex_coords(0) {
            geometry.uvs = uvs.into_f32().map(Vec2::from).collect();
        }
        geometry.morph_targets = primitive.morph_targets().count();

        let morphing = geometry.morph_targets > 0;
        let geometry_id = self.scene.add_geometry(geometry);
        let material_id = self.import_material(&primitive.material());
        if let Some(material) = self.scene.material_mut(material_id) {
            material.skinning |= skinned;
            material.morph_targets |= morphing;
        }

        self.mesh_count += 1;
        let mut data = MeshData::new(geometry_id, Some(material_id));
        data.skinned = skinned;
        if morphing {
            data.morph_weights = if weights.is_empty() {
                vec![0.0; primitive.morph_targets().count()]
            } else {
                weights.to_vec()
            };
        }
        Ok(data)
    }

    /// Materials are shared between primitives that reference the same index.
    fn import_material(&mut self, material: &gltf::Material) -> MaterialId {
        if let Some(id) = self.materials.get(&material.index()) {
            return *id;
        }

        let pbr = material.pbr_metallic_roughness();
        let [r, g, b, a] = pbr.base_color_factor();
        let [er, eg, eb] = material.emissive_factor();
        let mut imported = Material::new(Workflow::Physical).with_color(Color::new(r, g, b));
        imported.name = material.name().unwrap_or_default().to_string();
        imported.metalness = pbr.metallic_factor();
        imported.roughness = pbr.roughness_factor();
        imported.emissive = Color::new(er, eg, eb);
        imported.opacity = a;
        imported.transparent = material.alpha_mode() == gltf::material::AlphaMode::Blend;
        if material.double_sided() {
            imported.side = Side::Double;
        }
        if let Some(info) = pbr.base_color_texture()
            && let Some(texture) = self.import_image(info.texture().source().index())
        {
            imported.maps.insert(MapSlot::Map, texture);
        }

        let id = self.scene.add_material(imported);
        self.materials.insert(material.index(), id);
        id
    }

    fn import_image(&mut self, index: usize) -> Option<TextureId> {
        if let Some(id) = self.textures.get(&index) {
            return Some(*id);
        }
        let data = self.images.get(index)?;
        let image = match data.format {
            gltf::image::Format::R8G8B8A8 => {
                RgbaImage::from_raw(data.width, data.height, data.pixels.clone())
            }
            gltf::image::Format::R8G8B8 => RgbImage::from_raw(data.width, data.height, data.pixels.clone())
                .map(|rgb| DynamicImage::ImageRgb8(rgb).to_rgba8()),
            other => {
                warn!(label = self.label, index, format = ?other, "Skipping embedded image");
                None
            }
        }?;
        let mut texture = ripe_scene::Texture::new(format!("{}#image{index}", self.label), image);
        texture.color_space = ColorSpace::Srgb;
        let id = self.scene.add_texture(texture);
        self.textures.insert(index, id);
        Some(id)
    }
}

fn read_animations(document: &gltf::Document, buffers: &[gltf::buffer::Data]) -> Vec<AnimationClip> {
    document
        .animations()
        .map(|animation| {
            let name = animation
                .name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("animation_{}", animation.index()));
            let tracks = animation
                .channels()
                .filter_map(|channel| read_track(&channel, buffers))
                .collect();
            let clip = AnimationClip::new(name, tracks);
            debug!(clip = %clip.name, duration = clip.duration, "Read animation clip");
            clip
        })
        .collect()
}

fn read_track(channel: &gltf::animation::Channel, buffers: &[gltf::buffer::Data]) -> Option<Track> {
    let reader = channel.reader(|buffer| buffers.get(buffer.index()).map(|d| d.0.as_slice()));
    let times: Vec<f32> = reader.read_inputs()?.collect();
    let (interpolation, cubic) = match channel.sampler().interpolation() {
        GltfInterpolation::Step => (Interpolation::Step, false),
        GltfInterpolation::Linear => (Interpolation::Linear, false),
        GltfInterpolation::CubicSpline => (Interpolation::Linear, true),
    };

    // Cubic spline outputs are (in-tangent, value, out-tangent) triples.
    fn values<T>(items: impl Iterator<Item = T>, cubic: bool) -> Vec<T> {
        if cubic {
            items.skip(1).step_by(3).collect()
        } else {
            items.collect()
        }
    }

    let values = match reader.read_outputs()? {
        ReadOutputs::Translations(it) => TrackValues::Translation(values(it.map(Vec3::from), cubic)),
        ReadOutputs::Rotations(it) => {
            TrackValues::Rotation(values(it.into_f32().map(Quat::from_array), cubic))
        }
        ReadOutputs::Scales(it) => TrackValues::Scale(values(it.map(Vec3::from), cubic)),
        ReadOutputs::MorphTargetWeights(it) => {
            let all: Vec<f32> = it.into_f32().collect();
            let per_key = if cubic { 3 } else { 1 };
            let targets = all.len() / (times.len() * per_key).max(1);
            let weights = if cubic {
                all.chunks(targets.max(1))
                    .skip(1)
                    .step_by(3)
                    .flatten()
                    .copied()
                    .collect()
            } else {
                all
            };
            TrackValues::MorphWeights {
                values: weights,
                targets,
            }
        }
    };

    let target = channel.target().node();
    if matches!(channel.target().property(), Property::MorphTargetWeights) && target.mesh().is_none() {
        return None;
    }
    Some(Track {
        target: node_name(&target),
        times,
        values,
        interpolation,
    })
}
