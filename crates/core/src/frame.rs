//! Frame keys and the conversions between frames and orbit angles.
//!
//! A frame is a `(view, position)` pair written as `"{view}-{position}"`,
//! for example `side-3`. One horizontal revolution is split into
//! [`VIEW_FRAMES`] positions.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::{Error, Result};

/// Number of discrete positions in one horizontal revolution.
pub const VIEW_FRAMES: u32 = 24;

/// Vertical band of the orbit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    #[default]
    Side,
    Top,
    Bottom,
}

impl View {
    pub fn as_str(self) -> &'static str {
        match self {
            View::Side => "side",
            View::Top => "top",
            View::Bottom => "bottom",
        }
    }

    /// Vertical orbit angle (degrees) used to display this view.
    pub fn to_rotation(self, vertical_threshold: f32) -> f32 {
        match self {
            View::Side => 0.0,
            View::Top => vertical_threshold,
            View::Bottom => -vertical_threshold,
        }
    }

    /// View band a vertical orbit angle falls into.
    pub fn from_rotation(rotation_y: f32, threshold: f32) -> Self {
        if rotation_y >= threshold {
            View::Top
        } else if rotation_y <= -threshold {
            View::Bottom
        } else {
            View::Side
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for View {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "side" => Ok(View::Side),
            "top" => Ok(View::Top),
            "bottom" => Ok(View::Bottom),
            other => Err(Error::InvalidFrame(format!("unknown view '{other}'"))),
        }
    }
}

/// A parsed `"{view}-{position}"` key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FrameKey {
    pub view: View,
    pub position: u32,
}

impl FrameKey {
    pub fn new(view: View, position: u32) -> Self {
        Self {
            view,
            position: position % VIEW_FRAMES,
        }
    }
}

impl fmt::Display for FrameKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.view, self.position)
    }
}

impl FromStr for FrameKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (view, position) = s
            .split_once('-')
            .ok_or_else(|| Error::InvalidFrame(format!("'{s}' has no position")))?;
        let view = view.parse::<View>()?;
        let position = position
            .trim()
            .parse::<u32>()
            .map_err(|_| Error::InvalidFrame(format!("'{s}' position is not a number")))?;
        Ok(FrameKey::new(view, position))
    }
}

/// Horizontal orbit angle (degrees) of a frame position.
pub fn position_to_rotation(position: u32) -> f32 {
    position as f32 / VIEW_FRAMES as f32 * 360.0
}

/// Frame position closest to a horizontal orbit angle, modulo one revolution.
pub fn rotation_to_position(rotation_x: f32) -> u32 {
    let normalized = rotation_x.rem_euclid(360.0);
    let step = (normalized / 360.0 * VIEW_FRAMES as f32).round() as u32;
    step % VIEW_FRAMES
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_rotation_round_trip() {
        for position in 0..VIEW_FRAMES {
            let rotation = position_to_rotation(position);
            assert_eq!(
                rotation_to_position(rotation),
                position,
                "position {position} via {rotation} degrees"
            );
        }
    }

    #[test]
    fn test_rotation_to_position_wraps() {
        assert_eq!(rotation_to_position(360.0), 0);
        assert_eq!(rotation_to_position(-15.0), 23);
        assert_eq!(rotation_to_position(375.0), 1);
    }

    #[test]
    fn test_frame_key_parse_and_display() {
        let frame: FrameKey = "side-3".parse().unwrap();
        assert_eq!(frame, FrameKey::new(View::Side, 3));
        assert_eq!(frame.to_string(), "side-3");

        let top: FrameKey = "top-0".parse().unwrap();
        assert_eq!(top.view, View::Top);
    }

    #[test]
    fn test_frame_key_rejects_missing_position() {
        assert!(matches!("side".parse::<FrameKey>(), Err(Error::InvalidFrame(_))));
        assert!(matches!("side-".parse::<FrameKey>(), Err(Error::InvalidFrame(_))));
        assert!(matches!("front-2".parse::<FrameKey>(), Err(Error::InvalidFrame(_))));
    }

    #[test]
    fn test_view_rotation_bands() {
        assert_eq!(View::Top.to_rotation(85.0), 85.0);
        assert_eq!(View::Bottom.to_rotation(85.0), -85.0);
        assert_eq!(View::from_rotation(85.0, 80.0), View::Top);
        assert_eq!(View::from_rotation(-80.0, 80.0), View::Bottom);
        assert_eq!(View::from_rotation(45.0, 80.0), View::Side);
    }
}
