//! Easing curves used by every timed transition.
//!
//! All curves share the `(pos, start, end)` calling convention: `pos` is the
//! normalized progress and is clamped to `[0, 1]`, so callers can pass raw
//! `elapsed / duration` values without worrying about overshoot.

use serde::Deserialize;

/// Named easing curve, deserialized from camelCase names such as
/// `"easeInOutQuad"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Easing {
    Linear,
    EaseInQuad,
    EaseOutQuad,
    #[default]
    EaseInOutQuad,
    EaseInCubic,
    EaseOutCubic,
    EaseInOutCubic,
}

impl Easing {
    /// Shape function mapping progress in `[0, 1]` to eased progress.
    pub fn curve(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::EaseInQuad => t * t,
            Easing::EaseOutQuad => t * (2.0 - t),
            Easing::EaseInOutQuad => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    -1.0 + (4.0 - 2.0 * t) * t
                }
            }
            Easing::EaseInCubic => t * t * t,
            Easing::EaseOutCubic => {
                let u = t - 1.0;
                u * u * u + 1.0
            }
            Easing::EaseInOutCubic => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    let u = 2.0 * t - 2.0;
                    0.5 * u * u * u + 1.0
                }
            }
        }
    }

    /// Interpolate from `start` to `end` at progress `pos`.
    pub fn apply(self, pos: f32, start: f32, end: f32) -> f32 {
        let t = self.curve(pos);
        if t >= 1.0 {
            return end;
        }
        start + (end - start) * t
    }
}
