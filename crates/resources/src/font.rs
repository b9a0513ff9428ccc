//! Typeface fonts in the JSON outline format.
//!
//! Each glyph carries an outline string of commands (`m x y`, `l x y`,
//! `q x y cx cy`, `b x y c1x c1y c2x c2y`) in font units. Curves list their
//! end point first, then the control points.

use std::collections::HashMap;
use std::str::SplitWhitespace;

use glam::Vec2;
use ripe_scene::Geometry;
use ripe_scene::shape::{extrude, shapes_from_contours};
use serde::Deserialize;

use crate::error::{ResourceError, ResourceResult};

/// Curve subdivision used for letter meshes.
pub const CURVE_SEGMENTS: usize = 10;

/// Glyph substituted for characters the font lacks.
const FALLBACK_GLYPH: char = '?';

#[derive(Debug, Clone, Copy, PartialEq)]
enum PathCommand {
    MoveTo(Vec2),
    LineTo(Vec2),
    QuadTo { ctrl: Vec2, end: Vec2 },
    CubicTo { c1: Vec2, c2: Vec2, end: Vec2 },
}

#[derive(Debug, Clone)]
struct Glyph {
    advance: f32,
    commands: Vec<PathCommand>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TypefaceJson {
    glyphs: HashMap<String, GlyphJson>,
    resolution: f32,
    #[serde(default)]
    family_name: String,
}

#[derive(Deserialize)]
struct GlyphJson {
    #[serde(default)]
    ha: f32,
    #[serde(default)]
    o: Option<String>,
}

/// A parsed typeface.
#[derive(Debug, Clone)]
pub struct Font {
    pub family: String,
    resolution: f32,
    glyphs: HashMap<char, Glyph>,
}

fn next_point(tokens: &mut SplitWhitespace<'_>, outline: &str) -> ResourceResult<Vec2> {
    let mut number = || {
        tokens
            .next()
            .and_then(|t| t.parse::<f32>().ok())
            .ok_or_else(|| ResourceError::Font(format!("truncated outline '{outline}'")))
    };
    let x = number()?;
    let y = number()?;
    Ok(Vec2::new(x, y))
}

fn parse_outline(outline: &str) -> ResourceResult<Vec<PathCommand>> {
    let mut tokens = outline.split_whitespace();
    let point = |tokens: &mut SplitWhitespace<'_>| next_point(tokens, outline);

    let mut commands = Vec::new();
    while let Some(op) = tokens.next() {
        let command = match op {
            "m" => PathCommand::MoveTo(point(&mut tokens)?),
            "l" => PathCommand::LineTo(point(&mut tokens)?),
            "q" => {
                let end = point(&mut tokens)?;
                let ctrl = point(&mut tokens)?;
                PathCommand::QuadTo { ctrl, end }
            }
            "b" => {
                let end = point(&mut tokens)?;
                let c1 = point(&mut tokens)?;
                let c2 = point(&mut tokens)?;
                PathCommand::CubicTo { c1, c2, end }
            }
            "z" => continue,
            other => return Err(ResourceError::Font(format!("unknown outline command '{other}'"))),
        };
        commands.push(command);
    }
    Ok(commands)
}

/// Flatten commands into closed contours scaled by `scale`.
fn contours(commands: &[PathCommand], scale: f32, segments: usize) -> Vec<Vec<Vec2>> {
    let segments = segments.max(1);
    let mut contours: Vec<Vec<Vec2>> = Vec::new();
    let mut current: Vec<Vec2> = Vec::new();
    let mut pen = Vec2::ZERO;

    for command in commands {
        match *command {
            PathCommand::MoveTo(p) => {
                if !current.is_empty() {
                    contours.push(std::mem::take(&mut current));
                }
                pen = p;
                current.push(p * scale);
            }
            PathCommand::LineTo(p) => {
                pen = p;
                current.push(p * scale);
            }
            PathCommand::QuadTo { ctrl, end } => {
                let start = pen;
                for s in 1..=segments {
                    let t = s as f32 / segments as f32;
                    let u = 1.0 - t;
                    let p = start * (u * u) + ctrl * (2.0 * u * t) + end * (t * t);
                    current.push(p * scale);
                }
                pen = end;
            }
            PathCommand::CubicTo { c1, c2, end } => {
                let start = pen;
                for s in 1..=segments {
                    let t = s as f32 / segments as f32;
                    let u = 1.0 - t;
                    let p = start * (u * u * u)
                        + c1 * (3.0 * u * u * t)
                        + c2 * (3.0 * u * t * t)
                        + end * (t * t * t);
                    current.push(p * scale);
                }
                pen = end;
            }
        }
    }
    if !current.is_empty() {
        contours.push(current);
    }

    for contour in &mut contours {
        if contour.len() > 1 && contour.first() == contour.last() {
            contour.pop();
        }
    }
    contours
}

impl Font {
    pub fn from_json(bytes: &[u8]) -> ResourceResult<Self> {
        let raw: TypefaceJson = serde_json::from_slice(bytes)?;
        if raw.resolution <= 0.0 {
            return Err(ResourceError::Font(format!(
                "invalid resolution {}",
                raw.resolution
            )));
        }
        let mut glyphs = HashMap::with_capacity(raw.glyphs.len());
        for (key, glyph) in raw.glyphs {
            let mut chars = key.chars();
            let (Some(ch), None) = (chars.next(), chars.next()) else {
                continue;
            };
            let commands = match &glyph.o {
                Some(outline) => parse_outline(outline)?,
                None => Vec::new(),
            };
            glyphs.insert(
                ch,
                Glyph {
                    advance: glyph.ha,
                    commands,
                },
            );
        }
        Ok(Self {
            family: raw.family_name,
            resolution: raw.resolution,
            glyphs,
        })
    }

    pub fn has_glyph(&self, ch: char) -> bool {
        self.glyphs.contains_key(&ch)
    }

    fn glyph(&self, ch: char) -> ResourceResult<&Glyph> {
        self.glyphs
            .get(&ch)
            .or_else(|| self.glyphs.get(&FALLBACK_GLYPH))
            .ok_or_else(|| ResourceError::Font(format!("no glyph for '{ch}'")))
    }

    /// Horizontal advance of a glyph at the given size.
    pub fn advance(&self, ch: char, size: f32) -> ResourceResult<f32> {
        Ok(self.glyph(ch)?.advance * size / self.resolution)
    }

    /// Extruded, bounding-box centered mesh of one character.
    pub fn letter_geometry(
        &self,
        ch: char,
        size: f32,
        depth: f32,
        segments: usize,
    ) -> ResourceResult<Geometry> {
        let glyph = self.glyph(ch)?;
        let outline = contours(&glyph.commands, size / self.resolution, segments);
        let shapes = shapes_from_contours(outline);
        let mut geometry = extrude(&shapes, depth);
        geometry.center();
        Ok(geometry)
    }
}
