//! Material definitions.

use std::collections::BTreeMap;

use glam::Vec3;
use serde::Deserialize;

use crate::graph::TextureId;

/// Linear RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const WHITE: Color = Color::new(1.0, 1.0, 1.0);
    pub const BLACK: Color = Color::new(0.0, 0.0, 0.0);

    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Same value on every channel.
    pub const fn gray(value: f32) -> Self {
        Self::new(value, value, value)
    }

    /// From a packed `0xRRGGBB` value.
    pub fn from_hex(hex: u32) -> Self {
        Self::new(
            ((hex >> 16) & 0xff) as f32 / 255.0,
            ((hex >> 8) & 0xff) as f32 / 255.0,
            (hex & 0xff) as f32 / 255.0,
        )
    }

    /// Parse `#rrggbb` (the leading `#` is optional).
    pub fn parse_hex(value: &str) -> Option<Self> {
        let digits = value.trim().trim_start_matches('#');
        if digits.len() != 6 {
            return None;
        }
        u32::from_str_radix(digits, 16).ok().map(Self::from_hex)
    }

    /// Multiply every channel by `factor`.
    pub fn scaled(self, factor: f32) -> Self {
        Self::new(self.r * factor, self.g * factor, self.b * factor)
    }

    pub fn lerp(self, other: Color, t: f32) -> Self {
        Self::new(
            self.r + (other.r - self.r) * t,
            self.g + (other.g - self.g) * t,
            self.b + (other.b - self.b) * t,
        )
    }

    pub fn to_vec3(self) -> Vec3 {
        Vec3::new(self.r, self.g, self.b)
    }

    pub fn abs_diff_eq(self, other: Color, epsilon: f32) -> bool {
        (self.r - other.r).abs() <= epsilon
            && (self.g - other.g).abs() <= epsilon
            && (self.b - other.b).abs() <= epsilon
    }
}

/// Which faces of a triangle are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Side {
    #[default]
    Front,
    Back,
    Double,
}

/// Shading model of a material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Workflow {
    /// Specular/glossiness (Phong)
    Specular,
    /// Metalness/roughness (physical)
    #[default]
    Physical,
    /// Unlit flat color
    Basic,
}

/// Encoding the texel values of a map are stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorSpace {
    /// Display-referred color data
    Srgb,
    /// Raw data (normals, roughness, occlusion)
    #[default]
    Linear,
}

/// Texture slot of a material, named after the configuration keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MapSlot {
    Map,
    AoMap,
    RoughnessMap,
    MetalnessMap,
    NormalMap,
    BumpMap,
    SpecularMap,
    EmissiveMap,
    AlphaMap,
    LightMap,
    DisplacementMap,
}

impl MapSlot {
    pub const ALL: [MapSlot; 11] = [
        MapSlot::Map,
        MapSlot::AoMap,
        MapSlot::RoughnessMap,
        MapSlot::MetalnessMap,
        MapSlot::NormalMap,
        MapSlot::BumpMap,
        MapSlot::SpecularMap,
        MapSlot::EmissiveMap,
        MapSlot::AlphaMap,
        MapSlot::LightMap,
        MapSlot::DisplacementMap,
    ];

    /// Configuration key of this slot.
    pub fn key(self) -> &'static str {
        match self {
            MapSlot::Map => "map",
            MapSlot::AoMap => "aoMap",
            MapSlot::RoughnessMap => "roughnessMap",
            MapSlot::MetalnessMap => "metalnessMap",
            MapSlot::NormalMap => "normalMap",
            MapSlot::BumpMap => "bumpMap",
            MapSlot::SpecularMap => "specularMap",
            MapSlot::EmissiveMap => "emissiveMap",
            MapSlot::AlphaMap => "alphaMap",
            MapSlot::LightMap => "lightMap",
            MapSlot::DisplacementMap => "displacementMap",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|slot| slot.key() == key)
    }

    /// Color-bearing maps are display-referred, everything else is data.
    pub fn color_space(self) -> ColorSpace {
        match self {
            MapSlot::Map | MapSlot::EmissiveMap => ColorSpace::Srgb,
            _ => ColorSpace::Linear,
        }
    }
}

/// A surface description referencing textures by handle.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    pub workflow: Workflow,
    /// Base (diffuse) color
    pub color: Color,
    /// Specular color, only meaningful for [`Workflow::Specular`]
    pub specular: Color,
    pub shininess: f32,
    pub metalness: f32,
    pub roughness: f32,
    pub ao_map_intensity: f32,
    pub emissive: Color,
    pub opacity: f32,
    pub transparent: bool,
    pub side: Side,
    pub wireframe: bool,
    /// Shader variant handles skinned geometry
    pub skinning: bool,
    /// Shader variant handles morph targets
    pub morph_targets: bool,
    pub maps: BTreeMap<MapSlot, TextureId>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: String::new(),
            workflow: Workflow::Physical,
            color: Color::WHITE,
            specular: Color::from_hex(0x111111),
            shininess: 30.0,
            metalness: 0.0,
            roughness: 1.0,
            ao_map_intensity: 1.0,
            emissive: Color::BLACK,
            opacity: 1.0,
            transparent: false,
            side: Side::Front,
            wireframe: false,
            skinning: false,
            morph_targets: false,
            maps: BTreeMap::new(),
        }
    }
}

impl Material {
    pub fn new(workflow: Workflow) -> Self {
        Self {
            workflow,
            ..Default::default()
        }
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    pub fn map(&self, slot: MapSlot) -> Option<TextureId> {
        self.maps.get(&slot).copied()
    }

    /// Every texture this material references.
    pub fn textures(&self) -> impl Iterator<Item = TextureId> + '_ {
        self.maps.values().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex() {
        let c = Color::parse_hex("#ff8000").unwrap();
        assert_eq!(c.r, 1.0);
        assert!((c.g - 128.0 / 255.0).abs() < 1e-6);
        assert_eq!(c.b, 0.0);
        assert_eq!(Color::parse_hex("ff8000"), Some(c));
        assert!(Color::parse_hex("#fff").is_none());
        assert!(Color::parse_hex("#gggggg").is_none());
    }

    #[test]
    fn test_map_slot_color_space() {
        assert_eq!(MapSlot::Map.color_space(), ColorSpace::Srgb);
        assert_eq!(MapSlot::EmissiveMap.color_space(), ColorSpace::Srgb);
        assert_eq!(MapSlot::NormalMap.color_space(), ColorSpace::Linear);
        assert_eq!(MapSlot::AoMap.color_space(), ColorSpace::Linear);
    }

    #[test]
    fn test_map_slot_keys_round_trip() {
        for slot in MapSlot::ALL {
            assert_eq!(MapSlot::from_key(slot.key()), Some(slot));
        }
        assert_eq!(MapSlot::from_key("color"), None);
    }

    #[test]
    fn test_color_lerp_and_scale() {
        let base = Color::new(0.5, 0.5, 1.0);
        let dark = base.scaled(0.6);
        assert!(dark.abs_diff_eq(Color::new(0.3, 0.3, 0.6), 1e-6));
        assert!(base.lerp(dark, 1.0).abs_diff_eq(dark, 1e-6));
        assert!(base.lerp(dark, 0.0).abs_diff_eq(base, 1e-6));
    }
}
