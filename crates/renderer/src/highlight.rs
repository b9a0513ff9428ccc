//! Highlight and lowlight color pulses.
//!
//! A highlight darkens the materials of one part toward
//! `base * (1 - mask_opacity)`; a lowlight eases every model material back
//! to its base color. Base colors come from the asset manager snapshot,
//! or from the color a material had when first darkened.

use std::collections::HashMap;

use ripe_core::Easing;
use ripe_resources::AssetManager;
use ripe_scene::{Color, MaterialId, Scene};
use tracing::debug;

use crate::options::RenderOptions;

#[derive(Debug, Clone, Copy)]
struct ColorTween {
    material: MaterialId,
    from: Color,
    to: Color,
    start_ms: f64,
}

#[derive(Debug)]
pub struct Highlighter {
    tweens: Vec<ColorTween>,
    duration_ms: f64,
    opacity: f32,
    easing: Easing,
    highlighted: Option<String>,
    /// Colors of darkened materials the snapshot does not know about
    bases: HashMap<MaterialId, Color>,
}

impl Highlighter {
    pub fn new(options: &RenderOptions) -> Self {
        Self {
            tweens: Vec::new(),
            duration_ms: options.mask_duration,
            opacity: options.mask_opacity,
            easing: options.highlight_easing,
            highlighted: None,
            bases: HashMap::new(),
        }
    }

    pub fn update_options(&mut self, options: &RenderOptions) {
        self.duration_ms = options.mask_duration;
        self.opacity = options.mask_opacity;
        self.easing = options.highlight_easing;
    }

    /// Part currently highlighted.
    pub fn highlighted(&self) -> Option<&str> {
        self.highlighted.as_deref()
    }

    pub fn is_active(&self) -> bool {
        !self.tweens.is_empty()
    }

    fn start(&mut self, scene: &Scene, material: MaterialId, to: Color, now_ms: f64) {
        let Some(current) = scene.material(material) else {
            return;
        };
        self.tweens.retain(|t| t.material != material);
        if current.color.abs_diff_eq(to, f32::EPSILON) {
            return;
        }
        self.tweens.push(ColorTween {
            material,
            from: current.color,
            to,
            start_ms: now_ms,
        });
    }

    /// Darken `materials` as the highlight of `part`.
    pub fn highlight(
        &mut self,
        scene: &Scene,
        assets: &AssetManager,
        part: &str,
        materials: &[MaterialId],
        now_ms: f64,
    ) {
        for material in materials {
            let base = match assets.base_color(*material) {
                Some(base) => base,
                None => match self.bases.get(material).copied() {
                    Some(base) => base,
                    None => {
                        let Some(current) = scene.material(*material) else {
                            continue;
                        };
                        self.bases.insert(*material, current.color);
                        current.color
                    }
                },
            };
            self.start(scene, *material, base.scaled(1.0 - self.opacity), now_ms);
        }
        debug!(part, materials = materials.len(), "Highlight");
        self.highlighted = Some(part.to_string());
    }

    /// Ease every snapshotted or darkened material back to its base color.
    pub fn lowlight(&mut self, scene: &Scene, assets: &AssetManager, now_ms: f64) {
        for (material, base) in assets.parts_colors() {
            self.start(scene, *material, *base, now_ms);
        }
        let bases: Vec<(MaterialId, Color)> = self.bases.drain().collect();
        for (material, base) in bases {
            if assets.base_color(material).is_none() {
                self.start(scene, material, base, now_ms);
            }
        }
        self.highlighted = None;
    }

    /// Step the running tweens. Returns true while a color changed.
    pub fn advance(&mut self, scene: &mut Scene, now_ms: f64) -> bool {
        if self.tweens.is_empty() {
            return false;
        }
        let (duration, easing) = (self.duration_ms, self.easing);
        self.tweens.retain(|tween| {
            let Some(material) = scene.material_mut(tween.material) else {
                return false;
            };
            let pos = if duration > 0.0 {
                ((now_ms - tween.start_ms) / duration) as f32
            } else {
                1.0
            };
            if pos >= 1.0 {
                material.color = tween.to;
                return false;
            }
            material.color = tween.from.lerp(tween.to, easing.curve(pos));
            true
        });
        true
    }

    /// Jump every running tween to its end color.
    pub fn finish(&mut self, scene: &mut Scene) {
        for tween in self.tweens.drain(..) {
            if let Some(material) = scene.material_mut(tween.material) {
                material.color = tween.to;
            }
        }
    }

    /// Drop running tweens without touching the colors.
    pub fn clear(&mut self) {
        self.tweens.clear();
        self.bases.clear();
        self.highlighted = None;
    }
}
