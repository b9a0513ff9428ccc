//! Keyframe animation clips and a minimal mixer.
//!
//! Tracks address their target node by name, so a clip loaded from a
//! side file binds to whatever scene it is played against.

use std::collections::HashMap;

use glam::{Quat, Vec3};
use tracing::debug;

use crate::graph::{NodeId, Scene};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interpolation {
    #[default]
    Linear,
    Step,
}

/// Keyframe values of one animated property.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackValues {
    Translation(Vec<Vec3>),
    Rotation(Vec<Quat>),
    Scale(Vec<Vec3>),
    /// Flattened `times.len() * targets` weights
    MorphWeights { values: Vec<f32>, targets: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    /// Name of the node this track drives
    pub target: String,
    pub times: Vec<f32>,
    pub values: TrackValues,
    pub interpolation: Interpolation,
}

impl Track {
    /// Keyframe pair bracketing `time` and the blend factor between them.
    fn keyframes(&self, time: f32) -> (usize, usize, f32) {
        let last = self.times.len().saturating_sub(1);
        if self.times.is_empty() || time <= self.times[0] {
            return (0, 0, 0.0);
        }
        if time >= self.times[last] {
            return (last, last, 0.0);
        }
        let next = self.times.partition_point(|t| *t <= time);
        let prev = next - 1;
        let span = self.times[next] - self.times[prev];
        let factor = if span > 0.0 {
            (time - self.times[prev]) / span
        } else {
            0.0
        };
        match self.interpolation {
            Interpolation::Linear => (prev, next, factor),
            Interpolation::Step => (prev, prev, 0.0),
        }
    }

    fn apply(&self, scene: &mut Scene, node: NodeId, time: f32) {
        let (a, b, t) = self.keyframes(time);
        let Some(target) = scene.node_mut(node) else {
            return;
        };
        match &self.values {
            TrackValues::Translation(v) if b < v.len() => {
                target.transform.position = v[a].lerp(v[b], t);
            }
            TrackValues::Rotation(v) if b < v.len() => {
                target.transform.rotation = v[a].slerp(v[b], t);
            }
            TrackValues::Scale(v) if b < v.len() => {
                target.transform.scale = v[a].lerp(v[b], t);
            }
            TrackValues::MorphWeights { values, targets } if (b + 1) * targets <= values.len() => {
                if let Some(mesh) = target.as_mesh_mut() {
                    mesh.morph_weights = (0..*targets)
                        .map(|k| {
                            let wa = values[a * targets + k];
                            let wb = values[b * targets + k];
                            wa + (wb - wa) * t
                        })
                        .collect();
                }
            }
            _ => {}
        }
    }
}

/// A named set of tracks.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationClip {
    pub name: String,
    pub tracks: Vec<Track>,
    /// Length in seconds
    pub duration: f32,
}

impl AnimationClip {
    pub fn new(name: impl Into<String>, tracks: Vec<Track>) -> Self {
        let duration = tracks
            .iter()
            .filter_map(|t| t.times.last().copied())
            .fold(0.0, f32::max);
        Self {
            name: name.into(),
            tracks,
            duration,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopMode {
    Once,
    #[default]
    Repeat,
}

#[derive(Debug)]
struct Action {
    clip: AnimationClip,
    time: f32,
    loop_mode: LoopMode,
    bindings: HashMap<String, Option<NodeId>>,
}

/// Drives one clip at a time from per-frame time deltas.
#[derive(Debug, Default)]
pub struct AnimationMixer {
    action: Option<Action>,
}

impl AnimationMixer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start `clip` from its first frame, replacing any running clip.
    pub fn play(&mut self, clip: AnimationClip, loop_mode: LoopMode) {
        debug!(clip = %clip.name, ?loop_mode, "Playing animation");
        self.action = Some(Action {
            clip,
            time: 0.0,
            loop_mode,
            bindings: HashMap::new(),
        });
    }

    pub fn stop(&mut self) {
        self.action = None;
    }

    pub fn is_playing(&self) -> bool {
        self.action.is_some()
    }

    /// Advance by `delta_secs` and pose the scene. Returns false once a
    /// non-looping clip has reached its end (its last pose stays applied).
    pub fn update(&mut self, scene: &mut Scene, delta_secs: f32) -> bool {
        let Some(action) = self.action.as_mut() else {
            return false;
        };

        action.time += delta_secs.max(0.0);
        let duration = action.clip.duration;
        let finished = match action.loop_mode {
            LoopMode::Repeat => {
                if duration > 0.0 {
                    action.time %= duration;
                }
                false
            }
            LoopMode::Once => {
                if action.time >= duration {
                    action.time = duration;
                    true
                } else {
                    false
                }
            }
        };

        for track in &action.clip.tracks {
            let node = *action
                .bindings
                .entry(track.target.clone())
                .or_insert_with(|| scene.find_by_name(&track.target));
            if let Some(node) = node {
                track.apply(scene, node, action.time);
            }
        }

        if finished {
            debug!(clip = %action.clip.name, "Animation finished");
            self.action = None;
        }
        !finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Node;
    use approx::assert_relative_eq;

    fn slide_clip() -> AnimationClip {
        AnimationClip::new(
            "slide",
            vec![Track {
                target: "shoe".into(),
                times: vec![0.0, 1.0],
                values: TrackValues::Translation(vec![Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0)]),
                interpolation: Interpolation::Linear,
            }],
        )
    }

    #[test]
    fn test_clip_duration() {
        assert_eq!(slide_clip().duration, 1.0);
    }

    #[test]
    fn test_linear_sampling() {
        let mut scene = Scene::new();
        let shoe = scene.add_node(Node::group("shoe"), None);
        let mut mixer = AnimationMixer::new();
        mixer.play(slide_clip(), LoopMode::Repeat);

        assert!(mixer.update(&mut scene, 0.25));
        let x = scene.node(shoe).unwrap().transform.position.x;
        assert_relative_eq!(x, 0.5, epsilon = 1e-5);
    }

    #[test]
    fn test_once_finishes_at_last_pose() {
        let mut scene = Scene::new();
        let shoe = scene.add_node(Node::group("shoe"), None);
        let mut mixer = AnimationMixer::new();
        mixer.play(slide_clip(), LoopMode::Once);

        assert!(mixer.update(&mut scene, 0.5));
        assert!(!mixer.update(&mut scene, 0.75));
        assert!(!mixer.is_playing());
        assert_eq!(scene.node(shoe).unwrap().transform.position.x, 2.0);
    }

    #[test]
    fn test_repeat_wraps() {
        let mut scene = Scene::new();
        let shoe = scene.add_node(Node::group("shoe"), None);
        let mut mixer = AnimationMixer::new();
        mixer.play(slide_clip(), LoopMode::Repeat);
        mixer.update(&mut scene, 1.5);
        let x = scene.node(shoe).unwrap().transform.position.x;
        assert_relative_eq!(x, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_step_interpolation_holds_value() {
        let track = Track {
            target: "x".into(),
            times: vec![0.0, 1.0, 2.0],
            values: TrackValues::Scale(vec![Vec3::ONE; 3]),
            interpolation: Interpolation::Step,
        };
        assert_eq!(track.keyframes(1.5), (1, 1, 0.0));
    }
}
