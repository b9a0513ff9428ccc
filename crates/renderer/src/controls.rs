//! Orbit camera controls.
//!
//! Pointer and wheel input accumulate into a *target* pose; a damping step
//! run every frame moves the *current* pose toward it and hands the result
//! to a [`CameraPoseSink`]. Timed transitions (rotate to a frame, recenter
//! on a part) drive the current pose directly and suspend damping until
//! they finish.

use glam::{Vec2, Vec3};
use ripe_core::frame::position_to_rotation;
use ripe_core::{Easing, FrameKey, View};
use ripe_scene::Aabb;
use tracing::debug;

use crate::options::ControlsOptions;

/// Time constant of the damping step. A 60 Hz tick closes a fifth of the
/// remaining gap.
const DAMPING_TAU_SECS: f32 = 0.074_69;

/// Gap under which a damped axis snaps to its target.
const DAMPING_EPSILON: f32 = 0.01;

/// Screen pixels per world unit of panning.
const PAN_PIXELS_PER_UNIT: f32 = 100.0;

/// Wheel notches between the closest and farthest distance.
const WHEEL_STEPS: f32 = 10.0;

/// Fraction of the viewport a recentered part fills.
const RECENTER_FIT: f32 = 1.7;

/// Where the camera orbits: angles in degrees around `target`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    /// Horizontal orbit angle
    pub rotation_x: f32,
    /// Vertical orbit angle
    pub rotation_y: f32,
    /// Distance from the camera to `target`
    pub distance: f32,
    /// Orbit center, moved by panning and recentering
    pub target: Vec3,
}

/// Receiver of the poses produced by the controls.
pub trait CameraPoseSink {
    /// Place the camera at `pose`.
    fn apply_pose(&mut self, pose: &CameraPose);
}

/// Fraction of the remaining gap covered in `dt_secs`.
pub fn damping_fraction(dt_secs: f32) -> f32 {
    1.0 - (-dt_secs.max(0.0) / DAMPING_TAU_SECS).exp()
}

fn clamp_to(value: f32, min: f32, max: f32) -> f32 {
    value.min(max).max(min)
}

/// Pointer button that started a drag. Only the middle button pans, and
/// only when panning is enabled; the others rotate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Middle,
    Secondary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DragMode {
    Rotate,
    Pan,
}

/// State of a timed camera transition after one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TweenProgress {
    Running,
    Finished,
}

#[derive(Debug, Clone)]
struct PoseTween {
    from: CameraPose,
    to: CameraPose,
    start_ms: f64,
    duration_ms: f64,
    easing: Easing,
}

impl PoseTween {
    fn sample(&self, now_ms: f64) -> (CameraPose, bool) {
        let pos = if self.duration_ms <= 0.0 {
            1.0
        } else {
            ((now_ms - self.start_ms) / self.duration_ms) as f32
        };
        let ease = |start: f32, end: f32| self.easing.apply(pos, start, end);
        let pose = CameraPose {
            rotation_x: ease(self.from.rotation_x, self.to.rotation_x),
            rotation_y: ease(self.from.rotation_y, self.to.rotation_y),
            distance: ease(self.from.distance, self.to.distance),
            target: Vec3::new(
                ease(self.from.target.x, self.to.target.x),
                ease(self.from.target.y, self.to.target.y),
                ease(self.from.target.z, self.to.target.z),
            ),
        };
        (pose, pos >= 1.0)
    }
}

/// Orbit controls holding the damped and target camera poses.
pub struct Controls {
    options: ControlsOptions,
    reference_target: Vec3,
    reference_distance: f32,
    current: CameraPose,
    target: CameraPose,
    rotating: bool,
    panning: bool,
    scrolling: bool,
    drag: Option<DragMode>,
    last_pointer: Vec2,
    tween: Option<PoseTween>,
}

impl Controls {
    /// Controls orbiting `reference_target` at `reference_distance`,
    /// starting at frame `position` of the side view.
    pub fn new(
        options: ControlsOptions,
        reference_target: Vec3,
        reference_distance: f32,
        position: u32,
    ) -> Self {
        let pose = CameraPose {
            rotation_x: options
                .horizontal_angle
                .unwrap_or_else(|| position_to_rotation(position)),
            rotation_y: options.vertical_angle.unwrap_or(0.0),
            distance: reference_distance,
            target: reference_target,
        };
        Self {
            options,
            reference_target,
            reference_distance,
            current: pose,
            target: pose,
            rotating: false,
            panning: false,
            scrolling: false,
            drag: None,
            last_pointer: Vec2::ZERO,
            tween: None,
        }
    }

    /// Current limits and speeds.
    pub fn options(&self) -> &ControlsOptions {
        &self.options
    }

    /// Replace the options, pulling the target distance into the new
    /// range.
    pub fn update_options(&mut self, options: ControlsOptions) {
        self.options = options;
        self.target.distance =
            clamp_to(self.target.distance, self.options.min_distance, self.options.max_distance);
    }

    /// Pose last handed to the sink.
    pub fn current(&self) -> &CameraPose {
        &self.current
    }

    /// Pose the damping step moves toward.
    pub fn target(&self) -> &CameraPose {
        &self.target
    }

    /// Distance restored by frame changes.
    pub fn reference_distance(&self) -> f32 {
        self.reference_distance
    }

    /// A pointer drag is in progress.
    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Any damped axis has not settled yet.
    pub fn is_moving(&self) -> bool {
        self.rotating || self.panning || self.scrolling
    }

    /// A timed transition owns the camera.
    pub fn is_transitioning(&self) -> bool {
        self.tween.is_some()
    }

    /// Horizontal angle folded into one revolution, then clamped to the
    /// configured range unless rotation is free.
    pub fn valid_horizontal_angle(&self, angle: f32) -> f32 {
        let angle = angle.rem_euclid(360.0);
        if self.options.free_rotation() {
            angle
        } else {
            clamp_to(angle, self.options.min_hor_angle, self.options.max_hor_angle)
        }
    }

    /// Vertical angle clamped to the configured range.
    pub fn valid_vertical_angle(&self, angle: f32) -> f32 {
        clamp_to(angle, self.options.min_ver_angle, self.options.max_ver_angle)
    }

    /// Vertical angle of `view`.
    pub fn view_to_rotation(&self, view: View) -> f32 {
        view.to_rotation(self.options.vertical_threshold)
    }

    /// Pose showing `frame` at the reference distance, keeping the pan.
    pub fn frame_pose(&self, frame: FrameKey) -> CameraPose {
        CameraPose {
            rotation_x: position_to_rotation(frame.position),
            rotation_y: self.view_to_rotation(frame.view),
            distance: self.reference_distance,
            target: self.current.target,
        }
    }

    /// Jump both poses to the given angles.
    pub fn set_rotation(&mut self, rotation_x: f32, rotation_y: f32) {
        self.current.rotation_x = rotation_x;
        self.current.rotation_y = rotation_y;
        self.target.rotation_x = rotation_x;
        self.target.rotation_y = rotation_y;
    }

    /// Jump both poses to `pose`, dropping any damping in flight.
    pub fn set_pose(&mut self, pose: CameraPose) {
        self.current = pose;
        self.target = pose;
        self.rotating = false;
        self.panning = false;
        self.scrolling = false;
    }

    /// Start a drag. Refused while a transition owns the camera.
    pub fn pointer_down(&mut self, button: PointerButton, at: Vec2, animating: bool) -> bool {
        if animating {
            return false;
        }
        self.drag = Some(if button == PointerButton::Middle && self.options.can_pan {
            DragMode::Pan
        } else {
            DragMode::Rotate
        });
        self.last_pointer = at;
        true
    }

    /// Feed a pointer move. Returns whether it moved the target pose.
    pub fn pointer_move(&mut self, at: Vec2, blocked: bool) -> bool {
        if blocked {
            return false;
        }
        let Some(mode) = self.drag else {
            return false;
        };
        let delta = at - self.last_pointer;
        match mode {
            DragMode::Rotate => self.drag_rotate(delta),
            DragMode::Pan => self.drag_pan(delta),
        }
        self.last_pointer = at;
        true
    }

    /// End the drag.
    pub fn pointer_up(&mut self) {
        self.drag = None;
    }

    /// Zoom one notch; positive `delta_y` moves away.
    pub fn wheel(&mut self, delta_y: f32, animating: bool) -> bool {
        if animating || !self.options.can_zoom {
            return false;
        }
        self.scrolling = true;
        let step = (self.options.max_distance - self.options.min_distance) / WHEEL_STEPS;
        let step = if delta_y >= 0.0 { step } else { -step };
        self.target.distance = clamp_to(
            self.target.distance + step,
            self.options.min_distance,
            self.options.max_distance,
        );
        true
    }

    fn drag_rotate(&mut self, delta: Vec2) {
        self.rotating = true;
        self.target.rotation_x = if self.options.free_rotation() {
            self.target.rotation_x - delta.x
        } else {
            clamp_to(
                self.target.rotation_x - delta.x,
                self.options.min_hor_angle,
                self.options.max_hor_angle,
            )
        };
        self.target.rotation_y = self.valid_vertical_angle(self.target.rotation_y + delta.y);
    }

    // Screen drag projected on the plane facing the camera.
    fn drag_pan(&mut self, delta: Vec2) {
        self.panning = true;
        let x = -delta.x / PAN_PIXELS_PER_UNIT;
        let y = -delta.y / PAN_PIXELS_PER_UNIT;
        let (sin_x, cos_x) = self.current.rotation_x.to_radians().sin_cos();
        let (sin_y, cos_y) = self.current.rotation_y.to_radians().sin_cos();

        self.target.target.x += x * cos_x * cos_y + x * cos_x * sin_y.abs() + y * sin_x * sin_y;
        self.target.target.y += -y * cos_y;
        self.target.target.z += -x * sin_x * cos_y - x * sin_x * sin_y.abs() + y * cos_x * sin_y;
    }

    /// Damping step: move the current pose toward the target by the
    /// fraction `dt_secs` allows. Returns whether a pose was emitted.
    pub fn update(&mut self, dt_secs: f32, sink: &mut impl CameraPoseSink) -> bool {
        if self.tween.is_some() || !self.is_moving() {
            return false;
        }

        if !self.options.smooth_controls {
            self.current = self.target;
            self.rotating = false;
            self.panning = false;
            self.scrolling = false;
            sink.apply_pose(&self.current);
            return true;
        }

        let fraction = damping_fraction(dt_secs);
        if self.rotating {
            self.damp_rotation(fraction);
        }
        if self.panning {
            self.damp_pan(fraction);
        }
        if self.scrolling {
            self.damp_distance(fraction);
        }
        sink.apply_pose(&self.current);
        true
    }

    fn damp_rotation(&mut self, fraction: f32) {
        let dx = self.target.rotation_x - self.current.rotation_x;
        let dy = self.target.rotation_y - self.current.rotation_y;
        if dx.abs() > DAMPING_EPSILON || dy.abs() > DAMPING_EPSILON {
            self.current.rotation_x += dx * fraction;
            self.current.rotation_y = self.valid_vertical_angle(self.current.rotation_y + dy * fraction);
        } else {
            self.rotating = false;
            self.target.rotation_x %= 360.0;
            self.current.rotation_x = self.target.rotation_x;
            self.current.rotation_y = self.target.rotation_y;
        }
    }

    fn damp_pan(&mut self, fraction: f32) {
        let delta = self.target.target - self.current.target;
        if delta.abs().max_element() > DAMPING_EPSILON {
            self.current.target += delta * fraction;
        } else {
            self.current.target = self.target.target;
            self.panning = false;
        }
    }

    fn damp_distance(&mut self, fraction: f32) {
        let delta = self.target.distance - self.current.distance;
        if delta.abs() > DAMPING_EPSILON {
            self.current.distance += delta * fraction;
        } else {
            self.current.distance = self.target.distance;
            self.scrolling = false;
        }
    }

    /// Ease to the given angles along the shortest horizontal path, bringing
    /// distance and pan back to their reference values.
    pub fn start_rotation_transition(
        &mut self,
        now_ms: f64,
        rotation_x: f32,
        rotation_y: f32,
        duration_ms: Option<f64>,
    ) {
        let mut delta = (rotation_x - self.current.rotation_x).rem_euclid(360.0);
        if delta > 180.0 {
            delta -= 360.0;
        }
        let to = CameraPose {
            rotation_x: self.current.rotation_x + delta,
            rotation_y,
            distance: self.reference_distance,
            target: self.reference_target,
        };
        debug!(from = self.current.rotation_x, to = to.rotation_x, "Rotation transition");
        self.start_tween(now_ms, to, duration_ms.unwrap_or(self.options.rotation_duration));
    }

    /// Ease the pan to the center of `bounds` and the distance to one that
    /// frames it, keeping the angles.
    pub fn start_recenter_transition(&mut self, now_ms: f64, bounds: Aabb, fov_deg: f32) {
        let extent = bounds.size().max_element();
        let distance = clamp_to(
            extent / RECENTER_FIT / (fov_deg / 2.0).to_radians().sin(),
            self.options.min_distance,
            self.options.max_distance,
        );
        let to = CameraPose {
            distance,
            target: bounds.center(),
            ..self.current
        };
        debug!(center = ?to.target, distance, "Recenter transition");
        self.start_tween(now_ms, to, self.options.recenter_duration);
    }

    fn start_tween(&mut self, now_ms: f64, to: CameraPose, duration_ms: f64) {
        self.rotating = false;
        self.panning = false;
        self.scrolling = false;
        self.drag = None;
        self.tween = Some(PoseTween {
            from: self.current,
            to,
            start_ms: now_ms,
            duration_ms,
            easing: self.options.rotation_easing,
        });
    }

    /// Drive the running transition. `None` when there is none.
    pub fn advance_transition(
        &mut self,
        now_ms: f64,
        sink: &mut impl CameraPoseSink,
    ) -> Option<TweenProgress> {
        let (pose, done) = self.tween.as_ref()?.sample(now_ms);
        self.current = pose;
        sink.apply_pose(&self.current);
        if !done {
            return Some(TweenProgress::Running);
        }
        self.target = self.current;
        self.tween = None;
        Some(TweenProgress::Finished)
    }

    /// Drop the running transition, leaving the current pose where it is.
    pub fn cancel_transition(&mut self) {
        self.tween = None;
    }
}
