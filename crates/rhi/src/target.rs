//! Off-screen render targets.

use bytemuck::{Pod, Zeroable};
use ripe_scene::Color;

use crate::error::{RhiError, RhiResult};

slotmap::new_key_type! {
    /// Handle to an off-screen render target.
    pub struct RenderTargetId;
}

/// One RGBA8 pixel.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct Rgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba8 {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn from_array([r, g, b, a]: [u8; 4]) -> Self {
        Self { r, g, b, a }
    }

    /// Channel-wise `self * (1 - t) + other * t`.
    pub fn mix(self, other: Rgba8, t: f32) -> Rgba8 {
        let t = t.clamp(0.0, 1.0);
        let channel = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
        Rgba8::new(
            channel(self.r, other.r),
            channel(self.g, other.g),
            channel(self.b, other.b),
            channel(self.a, other.a),
        )
    }
}

/// Clear color with alpha.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClearColor {
    pub color: Color,
    pub alpha: f32,
}

impl ClearColor {
    pub const WHITE: ClearColor = ClearColor::new(Color::WHITE, 1.0);
    pub const TRANSPARENT: ClearColor = ClearColor::new(Color::BLACK, 0.0);

    pub const fn new(color: Color, alpha: f32) -> Self {
        Self { color, alpha }
    }

    /// Exact byte value; clear colors are not color managed.
    pub fn to_rgba8(self) -> Rgba8 {
        let byte = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        Rgba8::new(
            byte(self.color.r),
            byte(self.color.g),
            byte(self.color.b),
            byte(self.alpha),
        )
    }
}

impl Default for ClearColor {
    fn default() -> Self {
        Self::TRANSPARENT
    }
}

/// Color plus depth storage of one render surface.
#[derive(Clone, Debug)]
pub struct Framebuffer {
    width: u32,
    height: u32,
    pub(crate) color: Vec<Rgba8>,
    pub(crate) depth: Vec<f32>,
}

impl Framebuffer {
    pub fn new(width: u32, height: u32) -> RhiResult<Self> {
        if width == 0 || height == 0 {
            return Err(RhiError::InvalidSize { width, height });
        }
        let len = width as usize * height as usize;
        Ok(Self {
            width,
            height,
            color: vec![Rgba8::default(); len],
            depth: vec![f32::INFINITY; len],
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn clear(&mut self, color: Rgba8) {
        self.color.fill(color);
        self.depth.fill(f32::INFINITY);
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba8> {
        (x < self.width && y < self.height).then(|| self.color[self.index(x, y)])
    }

    pub(crate) fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// Nearest pixel for normalized coordinates, used when blending targets
    /// of different sizes.
    pub(crate) fn sample(&self, u: f32, v: f32) -> Rgba8 {
        let x = ((u * self.width as f32) as u32).min(self.width - 1);
        let y = ((v * self.height as f32) as u32).min(self.height - 1);
        self.color[self.index(x, y)]
    }

    /// Copy a region out as tightly packed RGBA8 rows, top row first.
    pub fn read(&self, x: u32, y: u32, width: u32, height: u32) -> RhiResult<Vec<u8>> {
        let fits = x.checked_add(width).is_some_and(|r| r <= self.width)
            && y.checked_add(height).is_some_and(|b| b <= self.height);
        if !fits {
            return Err(RhiError::OutOfBounds {
                x,
                y,
                width,
                height,
                target_width: self.width,
                target_height: self.height,
            });
        }
        let mut out = Vec::with_capacity(width as usize * height as usize * 4);
        for row in y..y + height {
            let start = self.index(x, row);
            out.extend_from_slice(bytemuck::cast_slice(&self.color[start..start + width as usize]));
        }
        Ok(out)
    }
}
