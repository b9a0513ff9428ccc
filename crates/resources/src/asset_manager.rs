//! The asset manager.
//!
//! Owns every cache tied to a loaded model:
//! - textures by resolved path (one fetch per distinct path)
//! - material prototypes by `(part, type, color)`
//! - animation clips, fonts and the part index
//! - the base color snapshot used by highlighting
//!
//! Scene materials are always clones of a prototype, so mutating one node's
//! material never bleeds into another part.

use std::collections::HashMap;

use ripe_core::CancelToken;
use ripe_scene::{
    AnimationClip, Color, MapSlot, Material, MaterialId, NodeId, Scene, TextureId,
};
use tracing::{debug, info, warn};

use crate::config::{
    AssetLocation, INITIALS_PART, MaterialSpec, MeshFormat, ModelConfig, PartsSelection,
    SHADOW_PART,
};
use crate::error::{ResourceError, ResourceResult};
use crate::font::Font;
use crate::model::{import_gltf, read_gltf_animations};
use crate::parts::PartIndex;
use crate::source::AssetSource;
use crate::texture::{MAX_ANISOTROPY, decode_texture};

/// Cache key of a material prototype.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MaterialKey {
    pub part: String,
    pub kind: String,
    pub color: String,
}

impl MaterialKey {
    pub fn new(part: &str, kind: &str, color: &str) -> Self {
        Self {
            part: part.to_string(),
            kind: kind.to_string(),
            color: color.to_string(),
        }
    }
}

/// AO intensity applied when a material carries an ambient occlusion map.
const AO_MAP_INTENSITY: f32 = 0.33;

pub struct AssetManager {
    location: AssetLocation,
    config: ModelConfig,
    source: Box<dyn AssetSource>,
    cancel: CancelToken,
    max_anisotropy: u16,
    textures: HashMap<String, TextureId>,
    materials: HashMap<MaterialKey, Material>,
    animations: Vec<AnimationClip>,
    fonts: HashMap<String, Font>,
    parts: PartIndex,
    index_builds: usize,
    parts_colors: HashMap<MaterialId, Color>,
    mesh_root: Option<NodeId>,
    environment_root: Option<NodeId>,
}

impl AssetManager {
    pub fn new(location: AssetLocation, config: ModelConfig, source: impl AssetSource + 'static) -> Self {
        Self {
            location,
            config,
            source: Box::new(source),
            cancel: CancelToken::new(),
            max_anisotropy: MAX_ANISOTROPY,
            textures: HashMap::new(),
            materials: HashMap::new(),
            animations: Vec::new(),
            fonts: HashMap::new(),
            parts: PartIndex::default(),
            index_builds: 0,
            parts_colors: HashMap::new(),
            mesh_root: None,
            environment_root: None,
        }
    }

    pub fn with_max_anisotropy(mut self, anisotropy: u16) -> Self {
        self.max_anisotropy = anisotropy.max(1);
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn location(&self) -> &AssetLocation {
        &self.location
    }

    pub fn mesh_root(&self) -> Option<NodeId> {
        self.mesh_root
    }

    pub fn environment_root(&self) -> Option<NodeId> {
        self.environment_root
    }

    pub fn is_loaded(&self) -> bool {
        self.mesh_root.is_some()
    }

    fn fetch(&self, url: &str) -> ResourceResult<Vec<u8>> {
        self.cancel.check()?;
        let bytes = self.source.fetch(url)?;
        self.cancel.check()?;
        Ok(bytes)
    }

    /// Load the mesh (and optional environment scene) into `scene`, then
    /// apply `parts` and the side animations when the model uses the build
    /// flow.
    pub fn load_assets(&mut self, scene: &mut Scene, parts: &PartsSelection) -> ResourceResult<()> {
        let url = self.location.mesh_url()?;
        if self.location.mesh_format()? == MeshFormat::Fbx {
            return Err(ResourceError::UnsupportedFormat(url));
        }

        let bytes = self.fetch(&url)?;
        let imported = import_gltf(&bytes, &url, scene, None)?;
        for id in scene.descendants(imported.root) {
            if let Some(node) = scene.node_mut(id)
                && node.is_mesh()
            {
                node.cast_shadow = true;
                node.receive_shadow = true;
                node.raycastable = true;
                node.frustum_culled = false;
            }
        }
        for clip in imported.animations {
            self.store_animation(clip);
        }
        self.mesh_root = Some(imported.root);
        self.reindex(scene, parts);

        if let Some(file) = self.config.assets.scene.clone() {
            let url = self.location.scene_url(&file);
            let bytes = self.fetch(&url)?;
            let environment = import_gltf(&bytes, &url, scene, None)?;
            self.environment_root = Some(environment.root);
        }

        info!(url = %url, meshes = imported.mesh_count, "Loaded model");

        if self.location.uses_build {
            self.set_materials(scene, parts, true)?;
            self.load_animations()?;
        } else {
            self.store_parts_colors(scene);
        }
        Ok(())
    }

    fn reindex(&mut self, scene: &Scene, parts: &PartsSelection) {
        let Some(root) = self.mesh_root else {
            self.parts.clear();
            return;
        };
        let configured = self.config.assets.materials.part_names();
        let selected = parts.iter().map(|(p, _)| p);
        self.parts = PartIndex::build(scene, root, configured.chain(selected));
        self.index_builds += 1;
        debug!(builds = self.index_builds, parts = self.parts.parts().count(), "Indexed parts");
    }

    /// Fetch every side animation file and keep its first clip under the
    /// file stem.
    pub fn load_animations(&mut self) -> ResourceResult<()> {
        for file in self.config.assets.animations.clone() {
            let url = self.location.animation_url(&file);
            let bytes = self.fetch(&url)?;
            let Some(mut clip) = read_gltf_animations(&bytes, &url)?.into_iter().next() else {
                warn!(url = %url, "Animation file holds no clips");
                continue;
            };
            clip.name = file_stem(&file).to_string();
            self.store_animation(clip);
        }
        Ok(())
    }

    fn store_animation(&mut self, clip: AnimationClip) {
        debug!(clip = %clip.name, duration = clip.duration, "Stored animation");
        match self.animations.iter_mut().find(|c| c.name == clip.name) {
            Some(existing) => *existing = clip,
            None => self.animations.push(clip),
        }
    }

    pub fn animation(&self, name: &str) -> Option<&AnimationClip> {
        self.animations.iter().find(|c| c.name == name)
    }

    pub fn first_animation(&self) -> Option<&AnimationClip> {
        self.animations.first()
    }

    pub fn animations(&self) -> &[AnimationClip] {
        &self.animations
    }

    /// Load the material of every selected part and, when `auto_apply` is
    /// set, assign it. Unselected parts then get their default material.
    /// Parts without any configured material are logged and skipped.
    pub fn set_materials(
        &mut self,
        scene: &mut Scene,
        parts: &PartsSelection,
        auto_apply: bool,
    ) -> ResourceResult<()> {
        if parts.iter().any(|(p, _)| !self.parts.covers(p)) {
            self.reindex(scene, parts);
        }

        for (part, choice) in parts.iter() {
            if part == SHADOW_PART {
                continue;
            }
            let material = match self.load_material(scene, part, &choice.material, &choice.color) {
                Ok(material) => material,
                Err(ResourceError::MissingMaterial { part, kind, color }) => {
                    warn!(%part, %kind, %color, "No material configured, keeping current");
                    continue;
                }
                Err(e) => return Err(e),
            };
            if auto_apply {
                self.apply_material(scene, part, &material);
            }
        }

        if auto_apply {
            let defaults: Vec<(String, MaterialSpec)> = self
                .config
                .assets
                .materials
                .part_names()
                .filter(|p| *p != SHADOW_PART && !parts.contains(p))
                .filter_map(|p| {
                    let spec = self.config.assets.materials.default_for(p)?;
                    Some((p.to_string(), spec.clone()))
                })
                .collect();
            for (part, spec) in defaults {
                let key = MaterialKey::new(&part, "default", "default");
                let material = self.cached_or_build(scene, key, &spec)?;
                self.apply_material(scene, &part, &material);
            }
        }

        self.store_parts_colors(scene);
        Ok(())
    }

    /// Resolve and build (or return the cached) material for a part.
    /// The returned material is not assigned to anything.
    pub fn load_material(
        &mut self,
        scene: &mut Scene,
        part: &str,
        kind: &str,
        color: &str,
    ) -> ResourceResult<Material> {
        let key = MaterialKey::new(part, kind, color);
        if let Some(material) = self.materials.get(&key) {
            debug!(part, kind, color, "Material cache hit");
            return Ok(material.clone());
        }

        let spec = self
            .resolve_spec(part, kind, color)
            .cloned()
            .ok_or_else(|| ResourceError::MissingMaterial {
                part: part.to_string(),
                kind: kind.to_string(),
                color: color.to_string(),
            })?;

        self.cached_or_build(scene, key, &spec)
    }

    fn resolve_spec(&self, part: &str, kind: &str, color: &str) -> Option<&MaterialSpec> {
        if part != INITIALS_PART {
            return self.config.assets.materials.resolve(part, kind, color);
        }
        let initials = self.config.initials.as_ref()?;
        initials
            .materials
            .get(kind)
            .and_then(|types| types.get(color))
            .or_else(|| {
                let (material, kind) = initials.first_material()?;
                initials.materials.get(material)?.get(kind)
            })
    }

    fn cached_or_build(
        &mut self,
        scene: &mut Scene,
        key: MaterialKey,
        spec: &MaterialSpec,
    ) -> ResourceResult<Material> {
        if let Some(material) = self.materials.get(&key) {
            return Ok(material.clone());
        }
        let mut material = self.build_material(scene, spec)?;
        material.name = format!("{}:{}:{}", key.part, key.kind, key.color);
        debug!(material = %material.name, workflow = ?material.workflow, "Built material");
        self.materials.insert(key, material.clone());
        Ok(material)
    }

    fn build_material(&mut self, scene: &mut Scene, spec: &MaterialSpec) -> ResourceResult<Material> {
        let surface = spec.surface();
        let mut material = Material::new(spec.workflow());
        material.skinning = true;

        for (slot, path) in &surface.maps {
            let texture = self.load_texture(scene, path, *slot)?;
            material.maps.insert(*slot, texture);
            match slot {
                MapSlot::MetalnessMap => material.metalness = 1.0,
                MapSlot::AoMap => material.ao_map_intensity = AO_MAP_INTENSITY,
                _ => {}
            }
        }

        if let Some(color) = surface.color {
            material.color = color;
        }
        if let Some(emissive) = surface.emissive {
            material.emissive = emissive;
        }
        if let Some(opacity) = surface.opacity {
            material.opacity = opacity;
        }
        if let Some(transparent) = surface.transparent {
            material.transparent = transparent;
        }
        if let Some(intensity) = surface.ao_map_intensity {
            material.ao_map_intensity = intensity;
        }
        match spec {
            MaterialSpec::Specular(params) => {
                if let Some(specular) = params.specular {
                    material.specular = specular;
                }
                if let Some(shininess) = params.shininess {
                    material.shininess = shininess;
                }
            }
            MaterialSpec::Physical(params) => {
                if let Some(metalness) = params.metalness {
                    material.metalness = metalness;
                }
                if let Some(roughness) = params.roughness {
                    material.roughness = roughness;
                }
            }
        }
        Ok(material)
    }

    /// Load a texture by its path relative to the model folder.
    pub fn load_texture(
        &mut self,
        scene: &mut Scene,
        relative: &str,
        slot: MapSlot,
    ) -> ResourceResult<TextureId> {
        let path = self.location.texture_url(relative);
        if let Some(id) = self.textures.get(&path)
            && scene.texture(*id).is_some()
        {
            debug!(path = %path, "Texture cache hit");
            return Ok(*id);
        }
        let bytes = self.fetch(&path)?;
        let texture = decode_texture(&path, &bytes, slot, self.max_anisotropy)?;
        let id = scene.add_texture(texture);
        self.textures.insert(path, id);
        Ok(id)
    }

    /// Give every node of `part` its own clone of `material`. Replaced
    /// materials are disposed once nothing references them.
    pub fn apply_material(&mut self, scene: &mut Scene, part: &str, material: &Material) {
        let nodes = self.parts.nodes(part).to_vec();
        if nodes.is_empty() {
            warn!(part, "No scene nodes for part");
            return;
        }
        for node in nodes {
            let id = scene.add_material(material.clone());
            let Some(target) = scene.node_mut(node) else {
                scene.dispose_material(id);
                continue;
            };
            if material.transparent {
                target.cast_shadow = false;
            }
            let Some(mesh) = target.as_mesh_mut() else {
                scene.dispose_material(id);
                continue;
            };
            let previous = mesh.material.replace(id);
            if let Some(previous) = previous
                && scene.material_users(previous) == 0
            {
                self.dispose_material(scene, previous);
            }
        }
        debug!(part, material = %material.name, "Applied material");
    }

    /// Snapshot the color of every material used by the model.
    pub fn store_parts_colors(&mut self, scene: &Scene) {
        self.parts_colors.clear();
        let Some(root) = self.mesh_root else {
            return;
        };
        for id in scene.descendants(root) {
            let Some(material) = scene.node(id).and_then(|n| n.as_mesh()).and_then(|m| m.material) else {
                continue;
            };
            if let Some(m) = scene.material(material) {
                self.parts_colors.insert(material, m.color);
            }
        }
    }

    pub fn parts_colors(&self) -> &HashMap<MaterialId, Color> {
        &self.parts_colors
    }

    pub fn base_color(&self, material: MaterialId) -> Option<Color> {
        self.parts_colors.get(&material).copied()
    }

    pub fn part_index(&self) -> &PartIndex {
        &self.parts
    }

    /// How many times the part index was built since this manager was
    /// created.
    pub fn index_builds(&self) -> usize {
        self.index_builds
    }

    pub fn part_of(&self, node: NodeId) -> Option<&str> {
        self.parts.part_of(node)
    }

    /// Scene materials currently assigned to `part`.
    pub fn part_materials(&self, scene: &Scene, part: &str) -> Vec<MaterialId> {
        let mut materials: Vec<MaterialId> = self
            .parts
            .nodes(part)
            .iter()
            .filter_map(|n| scene.node(*n)?.as_mesh()?.material)
            .collect();
        materials.dedup();
        materials
    }

    pub fn set_wireframe(&self, scene: &mut Scene, wireframe: bool) {
        let materials: Vec<MaterialId> = scene
            .nodes()
            .filter_map(|(_, n)| n.as_mesh()?.material)
            .collect();
        for id in materials {
            if let Some(material) = scene.material_mut(id) {
                material.wireframe = wireframe;
            }
        }
    }

    /// Fetch (once) a typeface by name.
    pub fn load_font(&mut self, name: &str) -> ResourceResult<&Font> {
        if !self.fonts.contains_key(name) {
            let url = self.location.font_url(name);
            let font = Font::from_json(&self.fetch(&url)?)?;
            info!(font = name, family = %font.family, "Loaded font");
            self.fonts.insert(name.to_string(), font);
        }
        self.fonts
            .get(name)
            .ok_or_else(|| ResourceError::Font(format!("font '{name}' not cached")))
    }

    fn is_cached_texture(&self, texture: TextureId) -> bool {
        self.textures.values().any(|t| *t == texture)
    }

    /// Release a scene material and the textures only it owned. Cached
    /// textures survive until [`AssetManager::dispose_resources`].
    pub fn dispose_material(&mut self, scene: &mut Scene, material: MaterialId) -> bool {
        let textures: Vec<TextureId> = match scene.material(material) {
            Some(m) => m.textures().collect(),
            None => return false,
        };
        let released = scene.dispose_material(material);
        self.parts_colors.remove(&material);
        for texture in textures {
            let shared = scene.materials().any(|(_, m)| m.textures().any(|t| t == texture));
            if !shared && !self.is_cached_texture(texture) {
                scene.dispose_texture(texture);
            }
        }
        released
    }

    /// Remove a subtree and release its geometry and now unused materials.
    pub fn dispose_mesh(&mut self, scene: &mut Scene, node: NodeId) -> bool {
        if !scene.contains(node) {
            return false;
        }
        let mut geometries = Vec::new();
        let mut materials = Vec::new();
        for id in scene.descendants(node) {
            if let Some(mesh) = scene.node(id).and_then(|n| n.as_mesh()) {
                geometries.extend(mesh.geometry);
                materials.extend(mesh.material);
            }
        }
        let removed = scene.remove_node(node);
        self.parts.forget(&removed);

        for geometry in geometries {
            scene.dispose_geometry(geometry);
        }
        for material in materials {
            if scene.material_users(material) == 0 {
                self.dispose_material(scene, material);
            }
        }

        if self.mesh_root == Some(node) {
            self.mesh_root = None;
            self.parts.clear();
        }
        if self.environment_root == Some(node) {
            self.environment_root = None;
        }
        debug!(nodes = removed.len(), "Disposed mesh");
        true
    }

    /// Dispose the model and the environment scene.
    pub fn dispose_scene(&mut self, scene: &mut Scene) {
        if let Some(root) = self.mesh_root {
            self.dispose_mesh(scene, root);
        }
        if let Some(root) = self.environment_root {
            self.dispose_mesh(scene, root);
        }
    }

    /// Dispose everything this manager ever loaded.
    pub fn dispose_resources(&mut self, scene: &mut Scene) {
        self.dispose_scene(scene);
        for (_, texture) in self.textures.drain() {
            scene.dispose_texture(texture);
        }
        self.materials.clear();
        self.animations.clear();
        self.fonts.clear();
        self.parts_colors.clear();
        info!("Disposed asset resources");
    }
}

fn file_stem(file: &str) -> &str {
    let name = file.rsplit('/').next().unwrap_or(file);
    name.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(name)
}
