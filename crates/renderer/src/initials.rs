//! Engraved initials.
//!
//! Letters are extruded glyph meshes laid out over a row of anchor
//! transforms. When the text length does not line up with the anchors,
//! a letter sits halfway between the two nearest ones.

use glam::Vec3;
use ripe_resources::config::{INITIALS_PART, Placement};
use ripe_resources::font::CURVE_SEGMENTS;
use ripe_resources::{Align, AssetManager, InitialsConfig, ResourceError};
use ripe_scene::{Material, MeshData, Node, NodeId, Scene, Transform};
use tracing::{debug, info};

use crate::error::RendererResult;

const ANCHOR_PREFIX: &str = "initials_part_";
const LOGO_NODE: &str = "logo";

/// Position and XYZ Euler rotation (radians) of one letter.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LetterTransform {
    pub position: Vec3,
    pub rotation: Vec3,
}

impl LetterTransform {
    fn midpoint(a: LetterTransform, b: LetterTransform) -> Self {
        Self {
            position: (a.position + b.position) * 0.5,
            rotation: (a.rotation + b.rotation) * 0.5,
        }
    }

    fn to_transform(self) -> Transform {
        Transform::new()
            .with_position(self.position)
            .with_euler(self.rotation)
    }
}

impl From<Placement> for LetterTransform {
    fn from(placement: Placement) -> Self {
        Self {
            position: placement.position.into(),
            rotation: placement.rotation.into(),
        }
    }
}

/// Placement of letter `index` of a `len` letter text over `anchors`.
///
/// Returns `None` for letters past the last anchor.
pub fn letter_transform(
    anchors: &[LetterTransform],
    align: Align,
    index: usize,
    len: usize,
) -> Option<LetterTransform> {
    let size = anchors.len();
    let len = len.min(size);
    if index >= len {
        return None;
    }
    let slot = match align {
        Align::Left => index as f32,
        Align::Right => (size - len + index) as f32,
        Align::Center => (size - len) as f32 / 2.0 + index as f32,
    };
    if slot.fract() == 0.0 {
        return anchors.get(slot as usize).copied();
    }
    let floor = anchors.get(slot.floor() as usize)?;
    let ceil = anchors.get(slot.ceil() as usize)?;
    Some(LetterTransform::midpoint(*floor, *ceil))
}

/// Split an engraving into its `(material, type)` pair.
///
/// `style::gold_metal` and `gold_metal::viewport` both name `gold_metal`.
pub fn parse_engraving(engraving: &str) -> (&str, &str) {
    let spec = match engraving.strip_prefix("style::") {
        Some(rest) => rest,
        None => engraving.split("::").next().unwrap_or(engraving),
    };
    spec.split_once('_').unwrap_or((spec, ""))
}

#[derive(Debug)]
pub struct Initials {
    config: InitialsConfig,
    anchors: Vec<LetterTransform>,
    logo: Option<NodeId>,
    letters: Vec<NodeId>,
    material: Option<Material>,
    /// Text and engraving of the last rebuild
    applied: Option<(String, String)>,
}

impl Initials {
    pub fn new(config: InitialsConfig) -> Self {
        Self {
            config,
            anchors: Vec::new(),
            logo: None,
            letters: Vec::new(),
            material: None,
            applied: None,
        }
    }

    /// Configuration the letters are built from.
    pub fn config(&self) -> &InitialsConfig {
        &self.config
    }

    pub fn anchors(&self) -> &[LetterTransform] {
        &self.anchors
    }

    /// Letter meshes currently in the scene, in text order.
    pub fn letters(&self) -> &[NodeId] {
        &self.letters
    }

    fn font_name(&self) -> RendererResult<String> {
        self.config
            .fonts
            .first()
            .cloned()
            .ok_or_else(|| ResourceError::MissingConfig("initials.fonts".to_string()).into())
    }

    /// Load the font and collect anchors, either from the configured
    /// placements or from the `initials_part_<n>` nodes of the model.
    pub fn initialize(&mut self, scene: &Scene, assets: &mut AssetManager) -> RendererResult<()> {
        let font = self.font_name()?;
        assets.load_font(&font)?;

        self.anchors = if self.config.placements.is_empty() {
            let mut found: Vec<(usize, LetterTransform)> = scene
                .nodes()
                .filter_map(|(id, node)| {
                    let n = node.name.strip_prefix(ANCHOR_PREFIX)?.parse().ok()?;
                    let world = Transform::from_matrix(scene.world_matrix(id));
                    let anchor = LetterTransform {
                        position: world.position,
                        rotation: world.euler(),
                    };
                    Some((n, anchor))
                })
                .collect();
            found.sort_by_key(|(n, _)| *n);
            found.into_iter().map(|(_, anchor)| anchor).collect()
        } else {
            self.config.placements.iter().copied().map(Into::into).collect()
        };
        if self.config.number > 0 {
            self.anchors.truncate(self.config.number);
        }

        self.logo = scene.find_by_name(LOGO_NODE);
        info!(anchors = self.anchors.len(), font = %font, "Initialized initials");
        Ok(())
    }

    /// Rebuild the letters when `text` or the engraving changed since the
    /// last call. Returns whether anything was rebuilt.
    pub fn update(
        &mut self,
        scene: &mut Scene,
        assets: &mut AssetManager,
        text: &str,
        engraving: Option<&str>,
    ) -> RendererResult<bool> {
        let engraving = engraving.unwrap_or(&self.config.engraving).to_string();
        if engraving.contains("viewport") {
            return Ok(false);
        }
        if let Some((last_text, last_engraving)) = &self.applied
            && last_text == text
            && *last_engraving == engraving
        {
            return Ok(false);
        }

        let was_empty = self.applied.as_ref().is_none_or(|(t, _)| t.is_empty());
        if let Some(logo) = self.logo
            && was_empty != text.is_empty()
            && let Some(node) = scene.node_mut(logo)
        {
            node.visible = text.is_empty();
        }

        let engraving_changed = self.applied.as_ref().is_none_or(|(_, e)| *e != engraving);
        if engraving_changed || self.material.is_none() {
            let (material, kind) = parse_engraving(&engraving);
            self.material = Some(assets.load_material(scene, INITIALS_PART, material, kind)?);
            debug!(%engraving, "Resolved initials material");
        }

        for letter in self.letters.drain(..) {
            assets.dispose_mesh(scene, letter);
        }

        let font_name = self.font_name()?;
        let font = assets.load_font(&font_name)?;
        let Some(material) = &self.material else {
            return Ok(false);
        };
        let len = text.chars().count();
        for (i, ch) in text.chars().enumerate() {
            let Some(placement) = letter_transform(&self.anchors, self.config.align, i, len) else {
                break;
            };
            if ch.is_whitespace() {
                continue;
            }
            let geometry = font.letter_geometry(ch, self.config.scale, self.config.thickness, CURVE_SEGMENTS)?;
            let geometry = scene.add_geometry(geometry);
            let material = scene.add_material(material.clone());
            let mut node = Node::mesh(format!("initials_letter_{i}"), MeshData::new(geometry, Some(material)))
                .with_transform(placement.to_transform());
            node.cast_shadow = true;
            self.letters.push(scene.add_node(node, None));
        }

        info!(letters = self.letters.len(), %engraving, "Updated initials");
        self.applied = Some((text.to_string(), engraving));
        Ok(true)
    }

    /// Remove every letter and forget the last text.
    pub fn dispose(&mut self, scene: &mut Scene, assets: &mut AssetManager) {
        for letter in self.letters.drain(..) {
            assets.dispose_mesh(scene, letter);
        }
        self.material = None;
        self.applied = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ripe_resources::{AssetLocation, MemorySource, ModelConfig};
    use ripe_scene::Color;

    const FONT: &str = r#"{
        "familyName": "Test Sans",
        "resolution": 100,
        "glyphs": {
            "A": { "ha": 100, "o": "m 0 0 l 0 100 l 100 100 l 100 0 l 0 0" },
            "B": { "ha": 100, "o": "m 0 0 l 0 100 l 80 100 l 80 0 l 0 0" },
            "?": { "ha": 60, "o": "m 0 0 l 0 50 l 50 50 l 50 0 l 0 0" }
        }
    }"#;

    const CONFIG: &str = r##"{ "initials": {
        "number": 3,
        "fonts": ["sans"],
        "scale": 0.5,
        "placements": [
            { "position": { "x": -1 }, "rotation": { "y": 0.2 } },
            { "position": { "x": 0 } },
            { "position": { "x": 1 }, "rotation": { "y": -0.2 } }
        ],
        "materials": {
            "metal": { "gold": { "color": "#ffcc00" }, "silver": { "color": "#cccccc" } }
        }
    } }"##;

    fn anchors(n: usize) -> Vec<LetterTransform> {
        (0..n)
            .map(|i| LetterTransform {
                position: Vec3::new(i as f32, 0.0, 0.0),
                rotation: Vec3::new(0.0, i as f32 * 0.1, 0.0),
            })
            .collect()
    }

    fn setup() -> (Initials, Scene, AssetManager) {
        let config = ModelConfig::from_json(CONFIG.as_bytes()).unwrap();
        let source = MemorySource::new().with_file("mem://swear/vyner/fonts/sans.json", FONT);
        let assets = AssetManager::new(AssetLocation::new("mem://", "swear", "vyner"), config.clone(), source);
        let mut scene = Scene::new();
        scene.add_node(Node::group("logo"), None);
        let initials = Initials::new(config.initials.unwrap());
        (initials, scene, assets)
    }

    #[test]
    fn test_matching_parity_uses_exact_anchors() {
        let anchors = anchors(5);
        for i in 0..5 {
            let placed = letter_transform(&anchors, Align::Center, i, 5).unwrap();
            assert_eq!(placed, anchors[i]);
        }
    }

    #[test]
    fn test_mismatched_parity_interpolates() {
        let anchors = anchors(5);
        let placed: Vec<_> = (0..4)
            .map(|i| letter_transform(&anchors, Align::Center, i, 4).unwrap())
            .collect();
        assert!(placed.iter().any(|p| !anchors.contains(p)));
        assert_relative_eq!(placed[0].position.x, 0.5);
        assert_relative_eq!(placed[0].rotation.y, 0.05);
        assert_relative_eq!(placed[3].position.x, 3.5);
    }

    #[test]
    fn test_centered_odd_text_on_odd_anchors() {
        let anchors = anchors(5);
        let placed: Vec<_> = (0..3)
            .map(|i| letter_transform(&anchors, Align::Center, i, 3).unwrap().position.x)
            .collect();
        assert_eq!(placed, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_left_and_right_alignment() {
        let anchors = anchors(5);
        let left = letter_transform(&anchors, Align::Left, 0, 2).unwrap();
        let right = letter_transform(&anchors, Align::Right, 0, 2).unwrap();
        assert_eq!(left, anchors[0]);
        assert_eq!(right, anchors[3]);
    }

    #[test]
    fn test_letters_past_anchors_are_dropped() {
        let anchors = anchors(3);
        assert!(letter_transform(&anchors, Align::Center, 2, 6).is_some());
        assert!(letter_transform(&anchors, Align::Center, 3, 6).is_none());
        assert!(letter_transform(&[], Align::Left, 0, 1).is_none());
    }

    #[test]
    fn test_parse_engraving() {
        assert_eq!(parse_engraving("metal_gold"), ("metal", "gold"));
        assert_eq!(parse_engraving("style::metal_silver"), ("metal", "silver"));
        assert_eq!(parse_engraving("metal_gold::viewport"), ("metal", "gold"));
        assert_eq!(parse_engraving("plain"), ("plain", ""));
    }

    #[test]
    fn test_update_builds_letters_with_own_materials() {
        let (mut initials, mut scene, mut assets) = setup();
        initials.initialize(&scene, &mut assets).unwrap();
        assert_eq!(initials.anchors().len(), 3);

        assert!(initials.update(&mut scene, &mut assets, "AB", None).unwrap());
        assert_eq!(initials.letters().len(), 2);

        let materials: Vec<_> = initials
            .letters()
            .iter()
            .map(|id| scene.node(*id).unwrap().as_mesh().unwrap().material.unwrap())
            .collect();
        assert_ne!(materials[0], materials[1]);
        let color = scene.material(materials[0]).unwrap().color;
        assert!(color.abs_diff_eq(Color::from_hex(0xffcc00), 1e-6));

        let first = scene.node(initials.letters()[0]).unwrap();
        assert_relative_eq!(first.transform.position.x, -0.5);
    }

    #[test]
    fn test_update_is_memoized() {
        let (mut initials, mut scene, mut assets) = setup();
        initials.initialize(&scene, &mut assets).unwrap();
        assert!(initials.update(&mut scene, &mut assets, "AB", None).unwrap());
        let geometries = scene.geometry_count();
        assert!(!initials.update(&mut scene, &mut assets, "AB", None).unwrap());
        assert!(!initials.update(&mut scene, &mut assets, "AB", Some("metal_gold::viewport")).unwrap());
        assert_eq!(scene.geometry_count(), geometries);

        assert!(initials.update(&mut scene, &mut assets, "AB", Some("metal_silver")).unwrap());
        let material = scene.node(initials.letters()[0]).unwrap().as_mesh().unwrap().material.unwrap();
        assert!(scene.material(material).unwrap().color.abs_diff_eq(Color::from_hex(0xcccccc), 1e-6));
        assert_eq!(scene.geometry_count(), geometries, "old letters are released");
    }

    #[test]
    fn test_logo_follows_text_emptiness() {
        let (mut initials, mut scene, mut assets) = setup();
        initials.initialize(&scene, &mut assets).unwrap();
        let logo = scene.find_by_name("logo").unwrap();

        initials.update(&mut scene, &mut assets, "A", None).unwrap();
        assert!(!scene.node(logo).unwrap().visible);
        initials.update(&mut scene, &mut assets, "", None).unwrap();
        assert!(scene.node(logo).unwrap().visible);
        assert!(initials.letters().is_empty());
    }

    #[test]
    fn test_unknown_engraving_falls_back_to_first_material() {
        let (mut initials, mut scene, mut assets) = setup();
        initials.initialize(&scene, &mut assets).unwrap();
        initials.update(&mut scene, &mut assets, "A", Some("wood_oak")).unwrap();
        let material = scene.node(initials.letters()[0]).unwrap().as_mesh().unwrap().material.unwrap();
        assert!(scene.material(material).unwrap().color.abs_diff_eq(Color::from_hex(0xffcc00), 1e-6));
    }

    #[test]
    fn test_missing_font_is_config_error() {
        let mut initials = Initials::new(InitialsConfig::default());
        let mut assets = AssetManager::new(
            AssetLocation::new("mem://", "swear", "vyner"),
            ModelConfig::default(),
            MemorySource::new(),
        );
        let err = initials.initialize(&Scene::new(), &mut assets).unwrap_err();
        assert!(err.to_string().contains("initials.fonts"));
    }

    #[test]
    fn test_dispose_removes_letters() {
        let (mut initials, mut scene, mut assets) = setup();
        initials.initialize(&scene, &mut assets).unwrap();
        initials.update(&mut scene, &mut assets, "AB", None).unwrap();
        let nodes = scene.node_count();
        initials.dispose(&mut scene, &mut assets);
        assert_eq!(scene.node_count(), nodes - 2);
        assert!(initials.update(&mut scene, &mut assets, "AB", None).unwrap());
    }
}
