//! Model, material and initials configuration.
//!
//! Material records are classified once, at parse time, into a
//! [`MaterialSpec`]: a record carrying `specularMap` or `specular` is a
//! specular/glossiness material, anything else is physical.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use glam::Vec3;
use ripe_scene::{Color, MapSlot, Workflow};
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::warn;

use crate::error::{ResourceError, ResourceResult};

/// Name of the part bucket holding materials shared by every part.
pub const GENERAL_BUCKET: &str = "general";

/// Part name that is never assigned a material.
pub const SHADOW_PART: &str = "shadow";

/// Part name used to resolve initials materials.
pub const INITIALS_PART: &str = "initials";

/// A color written either as `"#rrggbb"` or as a gray scalar.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ColorValue {
    Scalar(f32),
    Text(String),
}

impl ColorValue {
    pub fn to_color(&self) -> Color {
        match self {
            ColorValue::Scalar(v) => Color::gray(*v),
            ColorValue::Text(text) if text.contains('#') => {
                Color::parse_hex(text).unwrap_or_else(|| {
                    warn!(value = %text, "Unparseable color, using white");
                    Color::WHITE
                })
            }
            ColorValue::Text(text) => text.trim().parse::<f32>().map(Color::gray).unwrap_or_else(|_| {
                warn!(value = %text, "Unparseable color, using white");
                Color::WHITE
            }),
        }
    }
}

/// Properties shared by both material workflows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SurfaceParams {
    /// Texture paths relative to the model's asset folder
    pub maps: BTreeMap<MapSlot, String>,
    pub color: Option<Color>,
    pub emissive: Option<Color>,
    pub opacity: Option<f32>,
    pub transparent: Option<bool>,
    pub ao_map_intensity: Option<f32>,
    /// Keys the renderer has no use for, kept for diagnostics
    pub extras: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpecularParams {
    pub surface: SurfaceParams,
    pub specular: Option<Color>,
    pub shininess: Option<f32>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhysicalParams {
    pub surface: SurfaceParams,
    pub metalness: Option<f32>,
    pub roughness: Option<f32>,
}

/// A material record with its workflow decided.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "BTreeMap<String, Value>")]
pub enum MaterialSpec {
    Specular(SpecularParams),
    Physical(PhysicalParams),
}

impl MaterialSpec {
    pub fn surface(&self) -> &SurfaceParams {
        match self {
            MaterialSpec::Specular(p) => &p.surface,
            MaterialSpec::Physical(p) => &p.surface,
        }
    }

    pub fn workflow(&self) -> Workflow {
        match self {
            MaterialSpec::Specular(_) => Workflow::Specular,
            MaterialSpec::Physical(_) => Workflow::Physical,
        }
    }
}

fn as_f32(key: &str, value: &Value) -> Result<f32, String> {
    value
        .as_f64()
        .map(|v| v as f32)
        .ok_or_else(|| format!("'{key}' must be a number"))
}

fn as_color(key: &str, value: &Value) -> Result<Color, String> {
    serde_json::from_value::<ColorValue>(value.clone())
        .map(|c| c.to_color())
        .map_err(|_| format!("'{key}' must be a color"))
}

impl TryFrom<BTreeMap<String, Value>> for MaterialSpec {
    type Error = String;

    fn try_from(record: BTreeMap<String, Value>) -> Result<Self, Self::Error> {
        let specular_workflow = record.contains_key("specularMap") || record.contains_key("specular");

        let mut surface = SurfaceParams::default();
        let mut specular = None;
        let mut shininess = None;
        let mut metalness = None;
        let mut roughness = None;

        for (key, value) in record {
            if key.contains("map") || key.contains("Map") {
                let Some(slot) = MapSlot::from_key(&key) else {
                    surface.extras.insert(key, value);
                    continue;
                };
                let path = value
                    .as_str()
                    .ok_or_else(|| format!("'{key}' must be a texture path"))?;
                surface.maps.insert(slot, path.to_string());
                continue;
            }
            match key.as_str() {
                "color" => surface.color = Some(as_color(&key, &value)?),
                "emissive" => surface.emissive = Some(as_color(&key, &value)?),
                "specular" => specular = Some(as_color(&key, &value)?),
                "opacity" => surface.opacity = Some(as_f32(&key, &value)?),
                "transparent" => {
                    surface.transparent =
                        Some(value.as_bool().ok_or("'transparent' must be a boolean")?)
                }
                "aoMapIntensity" => surface.ao_map_intensity = Some(as_f32(&key, &value)?),
                "shininess" => shininess = Some(as_f32(&key, &value)?),
                "metalness" => metalness = Some(as_f32(&key, &value)?),
                "roughness" => roughness = Some(as_f32(&key, &value)?),
                _ => {
                    surface.extras.insert(key, value);
                }
            }
        }

        Ok(if specular_workflow {
            MaterialSpec::Specular(SpecularParams {
                surface,
                specular,
                shininess,
            })
        } else {
            MaterialSpec::Physical(PhysicalParams {
                surface,
                metalness,
                roughness,
            })
        })
    }
}

/// Materials of one part: `type -> color -> record`, plus a fallback.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PartMaterials {
    #[serde(default)]
    pub default: Option<MaterialSpec>,
    #[serde(flatten)]
    pub types: BTreeMap<String, BTreeMap<String, MaterialSpec>>,
}

impl PartMaterials {
    pub fn get(&self, kind: &str, color: &str) -> Option<&MaterialSpec> {
        self.types.get(kind).and_then(|colors| colors.get(color))
    }
}

/// Every part's materials, including the shared `general` bucket.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct MaterialLibrary {
    pub parts: BTreeMap<String, PartMaterials>,
}

impl MaterialLibrary {
    /// Resolve `part -> kind -> color`, then the `general` bucket, then the
    /// part's `default` record.
    pub fn resolve(&self, part: &str, kind: &str, color: &str) -> Option<&MaterialSpec> {
        let bucket = self.parts.get(part);
        bucket
            .and_then(|p| p.get(kind, color))
            .or_else(|| self.parts.get(GENERAL_BUCKET).and_then(|g| g.get(kind, color)))
            .or_else(|| bucket.and_then(|p| p.default.as_ref()))
    }

    /// Configured part names, without the shared bucket.
    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.parts
            .keys()
            .map(String::as_str)
            .filter(|p| *p != GENERAL_BUCKET)
    }

    pub fn default_for(&self, part: &str) -> Option<&MaterialSpec> {
        self.parts.get(part).and_then(|p| p.default.as_ref())
    }
}

/// Asset section of a model configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AssetsConfig {
    pub materials: MaterialLibrary,
    /// Side-loaded animation files
    pub animations: Vec<String>,
    /// Optional environment scene file
    pub scene: Option<String>,
}

/// `{x, y, z}` triple as written in configuration files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Point3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl From<Point3> for Vec3 {
    fn from(p: Point3) -> Self {
        Vec3::new(p.x, p.y, p.z)
    }
}

/// Anchor transform for one letter; rotation is XYZ Euler radians.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Placement {
    pub position: Point3,
    pub rotation: Point3,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    Left,
    #[default]
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InitialsStyle {
    #[default]
    Emboss,
    Engrave,
}

fn default_engraving() -> String {
    "metal_gold".to_string()
}

fn default_scale() -> f32 {
    1.0
}

fn default_thickness() -> f32 {
    0.1
}

/// Initials section of a model configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitialsConfig {
    /// Number of letter anchors
    #[serde(default)]
    pub number: usize,
    #[serde(default)]
    pub fonts: Vec<String>,
    #[serde(default = "default_scale")]
    pub scale: f32,
    #[serde(default = "default_thickness")]
    pub thickness: f32,
    #[serde(default)]
    pub placements: Vec<Placement>,
    /// `material -> type -> record`
    #[serde(default)]
    pub materials: BTreeMap<String, BTreeMap<String, MaterialSpec>>,
    #[serde(default)]
    pub align: Align,
    #[serde(default, rename = "type")]
    pub style: InitialsStyle,
    #[serde(default = "default_engraving")]
    pub engraving: String,
}

impl Default for InitialsConfig {
    fn default() -> Self {
        Self {
            number: 0,
            fonts: Vec::new(),
            scale: default_scale(),
            thickness: default_thickness(),
            placements: Vec::new(),
            materials: BTreeMap::new(),
            align: Align::default(),
            style: InitialsStyle::default(),
            engraving: default_engraving(),
        }
    }
}

impl InitialsConfig {
    /// First configured `(material, type)` pair.
    pub fn first_material(&self) -> Option<(&str, &str)> {
        let (material, kinds) = self.materials.iter().next()?;
        let kind = kinds.keys().next()?;
        Some((material.as_str(), kind.as_str()))
    }
}

/// Full model configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ModelConfig {
    pub assets: AssetsConfig,
    pub initials: Option<InitialsConfig>,
}

impl ModelConfig {
    pub fn from_json(bytes: &[u8]) -> ResourceResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn from_path(path: &Path) -> ResourceResult<Self> {
        if !path.exists() {
            return Err(ResourceError::NotFound(path.display().to_string()));
        }
        Self::from_json(&std::fs::read(path)?)
    }
}

/// Material/color chosen for one part.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
pub struct PartChoice {
    pub material: String,
    pub color: String,
}

impl PartChoice {
    pub fn new(material: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            material: material.into(),
            color: color.into(),
        }
    }
}

/// Ordered `part -> choice` mapping; iteration follows insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartsSelection {
    entries: Vec<(String, PartChoice)>,
}

impl PartsSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a part's choice, keeping its original position.
    pub fn set(&mut self, part: impl Into<String>, choice: PartChoice) {
        let part = part.into();
        match self.entries.iter_mut().find(|(p, _)| *p == part) {
            Some(entry) => entry.1 = choice,
            None => self.entries.push((part, choice)),
        }
    }

    pub fn with(mut self, part: impl Into<String>, material: &str, color: &str) -> Self {
        self.set(part, PartChoice::new(material, color));
        self
    }

    pub fn get(&self, part: &str) -> Option<&PartChoice> {
        self.entries.iter().find(|(p, _)| p == part).map(|(_, c)| c)
    }

    pub fn contains(&self, part: &str) -> bool {
        self.get(part).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PartChoice)> {
        self.entries.iter().map(|(p, c)| (p.as_str(), c))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Stable `part:material:color` query string.
    pub fn query(&self) -> String {
        self.entries
            .iter()
            .map(|(p, c)| format!("p={p}:{}:{}", c.material, c.color))
            .collect::<Vec<_>>()
            .join("&")
    }
}

impl FromIterator<(String, PartChoice)> for PartsSelection {
    fn from_iter<I: IntoIterator<Item = (String, PartChoice)>>(iter: I) -> Self {
        let mut selection = PartsSelection::new();
        for (part, choice) in iter {
            selection.set(part, choice);
        }
        selection
    }
}

impl<'de> Deserialize<'de> for PartsSelection {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SelectionVisitor;

        impl<'de> Visitor<'de> for SelectionVisitor {
            type Value = PartsSelection;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of part names to {material, color}")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut selection = PartsSelection::new();
                while let Some((part, choice)) = map.next_entry::<String, PartChoice>()? {
                    selection.set(part, choice);
                }
                Ok(selection)
            }
        }

        deserializer.deserialize_map(SelectionVisitor)
    }
}

/// Mesh container format, sniffed from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeshFormat {
    #[default]
    Gltf,
    Fbx,
}

impl MeshFormat {
    pub fn sniff(url: &str) -> Self {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        if path.to_ascii_lowercase().ends_with(".fbx") {
            MeshFormat::Fbx
        } else {
            MeshFormat::Gltf
        }
    }
}

fn default_true() -> bool {
    true
}

/// Where a model's assets live.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetLocation {
    /// Base path or URL, expected to end with `/`
    #[serde(default)]
    pub assets_path: String,
    pub brand: String,
    pub model: String,
    /// Mesh URL handed out by the commerce backend for the base variant
    #[serde(default)]
    pub mesh_url: Option<String>,
    /// Mesh path relative to `assets_path`
    #[serde(default)]
    pub model_path: Option<String>,
    #[serde(default)]
    pub format: Option<MeshFormat>,
    /// Apply the initial parts mapping and side animations after loading
    #[serde(default = "default_true")]
    pub uses_build: bool,
}

impl AssetLocation {
    pub fn new(assets_path: impl Into<String>, brand: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            assets_path: assets_path.into(),
            brand: brand.into(),
            model: model.into(),
            mesh_url: None,
            model_path: None,
            format: None,
            uses_build: true,
        }
    }

    pub fn with_model_path(mut self, path: impl Into<String>) -> Self {
        self.model_path = Some(path.into());
        self
    }

    pub fn mesh_url(&self) -> ResourceResult<String> {
        if let Some(url) = &self.mesh_url {
            return Ok(url.clone());
        }
        self.model_path
            .as_ref()
            .map(|p| format!("{}{}", self.assets_path, p))
            .ok_or_else(|| ResourceError::MissingConfig("mesh url or model path".to_string()))
    }

    pub fn mesh_format(&self) -> ResourceResult<MeshFormat> {
        Ok(self.format.unwrap_or(MeshFormat::sniff(&self.mesh_url()?)))
    }

    pub fn animation_url(&self, file: &str) -> String {
        format!("{}{}/animations/{}/{}", self.assets_path, self.brand, self.model, file)
    }

    pub fn scene_url(&self, file: &str) -> String {
        format!("{}{}/scenes/{}", self.assets_path, self.brand, file)
    }

    pub fn texture_url(&self, relative: &str) -> String {
        format!("{}{}/{}/{}", self.assets_path, self.brand, self.model, relative)
    }

    pub fn font_url(&self, name: &str) -> String {
        format!("{}{}/{}/fonts/{}.json", self.assets_path, self.brand, self.model, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r##"{
        "assets": {
            "animations": ["mesh_slide_in_1.glb"],
            "materials": {
                "general": {
                    "crocodile": {
                        "black": {
                            "map": "general/crocodile/black/diffuse.jpg",
                            "specularMap": "general/crocodile/black/specular.jpg",
                            "shininess": 100
                        }
                    }
                },
                "side": {
                    "default": { "color": "#ffffff", "roughness": 0.8 },
                    "nappa": {
                        "beige": {
                            "map": "side_part/nappa/beige/diffuse.jpg",
                            "aoMap": "general/ao/main_ao.jpg",
                            "metalness": 0.2
                        }
                    }
                },
                "hardware": {}
            }
        },
        "initials": {
            "number": 5,
            "fonts": ["arial"],
            "materials": { "metal": { "gold": { "map": "general/metal/gold/diffuse.jpg" } } }
        }
    }"##;

    #[test]
    fn test_material_workflow_decided_at_parse_time() {
        let config = ModelConfig::from_json(CONFIG.as_bytes()).unwrap();
        let library = &config.assets.materials;

        let croc = library.resolve("general", "crocodile", "black").unwrap();
        assert_eq!(croc.workflow(), Workflow::Specular);

        let nappa = library.resolve("side", "nappa", "beige").unwrap();
        assert_eq!(nappa.workflow(), Workflow::Physical);
        assert_eq!(nappa.surface().maps.len(), 2);
        match nappa {
            MaterialSpec::Physical(p) => assert_eq!(p.metalness, Some(0.2)),
            MaterialSpec::Specular(_) => panic!("nappa should be physical"),
        }
    }

    #[test]
    fn test_specular_color_alone_selects_specular() {
        let spec: MaterialSpec = serde_json::from_str(r#"{"specular": 0.5}"#).unwrap();
        assert!(matches!(spec, MaterialSpec::Specular(ref p) if p.specular == Some(Color::gray(0.5))));
    }

    #[test]
    fn test_resolve_falls_back_to_general_then_default() {
        let config = ModelConfig::from_json(CONFIG.as_bytes()).unwrap();
        let library = &config.assets.materials;

        let general = library.resolve("side", "crocodile", "black").unwrap();
        assert_eq!(general.workflow(), Workflow::Specular);

        let fallback = library.resolve("side", "suede", "pink").unwrap();
        assert_eq!(fallback.surface().color, Some(Color::WHITE));

        assert!(library.resolve("hardware", "suede", "pink").is_none());
        assert!(library.resolve("unknown", "suede", "pink").is_none());
    }

    #[test]
    fn test_part_names_skip_general() {
        let config = ModelConfig::from_json(CONFIG.as_bytes()).unwrap();
        let names: Vec<_> = config.assets.materials.part_names().collect();
        assert_eq!(names, vec!["hardware", "side"]);
    }

    #[test]
    fn test_initials_defaults() {
        let config = ModelConfig::from_json(CONFIG.as_bytes()).unwrap();
        let initials = config.initials.unwrap();
        assert_eq!(initials.number, 5);
        assert_eq!(initials.align, Align::Center);
        assert_eq!(initials.style, InitialsStyle::Emboss);
        assert_eq!(initials.engraving, "metal_gold");
        assert_eq!(initials.first_material(), Some(("metal", "gold")));
    }

    #[test]
    fn test_color_values() {
        assert_eq!(ColorValue::Scalar(0.25).to_color(), Color::gray(0.25));
        assert_eq!(ColorValue::Text("#000000".into()).to_color(), Color::BLACK);
        assert_eq!(ColorValue::Text("0.5".into()).to_color(), Color::gray(0.5));
    }

    #[test]
    fn test_parts_selection_keeps_document_order() {
        let parts: PartsSelection = serde_json::from_str(
            r#"{"sole": {"material": "rubber", "color": "white"},
                "front": {"material": "nappa", "color": "black"},
                "laces": {"material": "nylon", "color": "red"}}"#,
        )
        .unwrap();
        let order: Vec<_> = parts.iter().map(|(p, _)| p).collect();
        assert_eq!(order, vec!["sole", "front", "laces"]);
        assert_eq!(parts.get("front").unwrap().color, "black");
    }

    #[test]
    fn test_asset_urls() {
        let location = AssetLocation::new("https://cdn/", "swear", "vyner").with_model_path("swear/vyner.glb");
        assert_eq!(location.mesh_url().unwrap(), "https://cdn/swear/vyner.glb");
        assert_eq!(location.animation_url("a.glb"), "https://cdn/swear/animations/vyner/a.glb");
        assert_eq!(location.scene_url("studio.glb"), "https://cdn/swear/scenes/studio.glb");
        assert_eq!(location.texture_url("side/map.jpg"), "https://cdn/swear/vyner/side/map.jpg");
        assert_eq!(location.font_url("arial"), "https://cdn/swear/vyner/fonts/arial.json");
    }

    #[test]
    fn test_mesh_format_sniffing() {
        assert_eq!(MeshFormat::sniff("a/b/model.FBX"), MeshFormat::Fbx);
        assert_eq!(MeshFormat::sniff("a/b/model.glb?v=2"), MeshFormat::Gltf);
        assert!(AssetLocation::new("", "b", "m").mesh_url().is_err());
    }
}
