//! Light definitions for the scene.
//!
//! Lights are plain `#[repr(C)]` blocks so a backend can upload them as-is.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use crate::material::Color;

/// Sky/ground gradient light.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct HemisphereLight {
    /// Color received by surfaces facing up
    pub sky_color: Vec3,
    /// Light intensity
    pub intensity: f32,
    /// Color received by surfaces facing down
    pub ground_color: Vec3,
    pub _pad0: f32,
}

impl HemisphereLight {
    pub fn new(sky: Color, ground: Color, intensity: f32) -> Self {
        Self {
            sky_color: sky.to_vec3(),
            intensity,
            ground_color: ground.to_vec3(),
            _pad0: 0.0,
        }
    }

    /// Irradiance for a world-space normal.
    pub fn irradiance(&self, normal: Vec3) -> Vec3 {
        let weight = 0.5 * normal.y + 0.5;
        self.ground_color.lerp(self.sky_color, weight) * self.intensity
    }
}

/// A point light (omnidirectional).
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct PointLight {
    /// Light position in world space
    pub position: Vec3,
    /// Attenuation radius, zero means no falloff
    pub radius: f32,
    /// Light color
    pub color: Vec3,
    /// Light intensity
    pub intensity: f32,
    /// Shadow map edge length in texels
    pub shadow_map_size: u32,
    /// Non-zero when the light casts shadows
    pub cast_shadow: u32,
    pub _pad0: [f32; 2],
}

impl Default for PointLight {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            radius: 10.0,
            color: Vec3::ONE,
            intensity: 1.0,
            shadow_map_size: 1024,
            cast_shadow: 1,
            _pad0: [0.0; 2],
        }
    }
}

impl PointLight {
    pub fn new(position: Vec3, intensity: f32, radius: f32) -> Self {
        Self {
            position,
            intensity,
            radius,
            ..Default::default()
        }
    }

    /// Lambert contribution at a world point with the given normal.
    pub fn contribution(&self, point: Vec3, normal: Vec3) -> Vec3 {
        let to_light = self.position - point;
        let distance = to_light.length();
        if distance <= f32::EPSILON {
            return Vec3::ZERO;
        }
        let falloff = if self.radius > 0.0 {
            (1.0 - distance / self.radius).clamp(0.0, 1.0)
        } else {
            1.0
        };
        let n_dot_l = normal.dot(to_light / distance).max(0.0);
        self.color * self.intensity * n_dot_l * falloff
    }
}

/// The studio rig every configurator scene is lit with.
#[derive(Clone, Debug)]
pub struct LightRig {
    pub hemisphere: HemisphereLight,
    pub points: Vec<PointLight>,
}

impl LightRig {
    /// Key, fill and rim lights scaled to the camera distance.
    pub fn studio(distance: f32) -> Self {
        let range = 9.0 * distance;
        Self {
            hemisphere: HemisphereLight::new(
                Color::from_hex(0xffeeb1),
                Color::from_hex(0x080820),
                0.0,
            ),
            points: vec![
                PointLight::new(Vec3::new(1.0, 1.0, 1.0) * distance, 0.5, range),
                PointLight::new(Vec3::new(-1.0, 0.5, 1.0) * distance, 0.2, range),
                PointLight::new(Vec3::new(-0.5, 0.75, -1.5) * distance, 0.7, range),
            ],
        }
    }

    /// Total diffuse irradiance at a point.
    pub fn irradiance(&self, point: Vec3, normal: Vec3) -> Vec3 {
        self.points
            .iter()
            .fold(self.hemisphere.irradiance(normal), |acc, light| {
                acc + light.contribution(point, normal)
            })
    }
}
