//! Decoded texture images.

use glam::{Vec2, Vec3};
use image::RgbaImage;

use crate::material::ColorSpace;

/// An RGBA8 image plus the sampling state a material needs.
#[derive(Debug, Clone)]
pub struct Texture {
    /// Path the texture was loaded from, also its cache key
    pub path: String,
    pub image: RgbaImage,
    pub color_space: ColorSpace,
    pub anisotropy: u16,
    /// When false, `v = 0` addresses the top row of the image
    pub flip_y: bool,
}

impl Texture {
    pub fn new(path: impl Into<String>, image: RgbaImage) -> Self {
        Self {
            path: path.into(),
            image,
            color_space: ColorSpace::Linear,
            anisotropy: 1,
            flip_y: false,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Nearest-neighbour sample with repeat wrapping, returned in linear space.
    pub fn sample(&self, uv: Vec2) -> Vec3 {
        let (w, h) = self.image.dimensions();
        if w == 0 || h == 0 {
            return Vec3::ONE;
        }
        let u = uv.x.rem_euclid(1.0);
        let mut v = uv.y.rem_euclid(1.0);
        if self.flip_y {
            v = 1.0 - v;
        }
        let x = ((u * w as f32) as u32).min(w - 1);
        let y = ((v * h as f32) as u32).min(h - 1);
        let px = self.image.get_pixel(x, y).0;
        let rgb = Vec3::new(px[0] as f32, px[1] as f32, px[2] as f32) / 255.0;
        match self.color_space {
            ColorSpace::Srgb => Vec3::new(srgb_to_linear(rgb.x), srgb_to_linear(rgb.y), srgb_to_linear(rgb.z)),
            ColorSpace::Linear => rgb,
        }
    }
}

fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}
