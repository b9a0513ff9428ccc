//! The renderer core.
//!
//! [`Renderer`] owns the scene, the camera, the lights and the asset
//! manager, and composes controls, picking, initials, highlights,
//! crossfades and animation playback. It is driven by [`Renderer::frame`]
//! once per display refresh and draws only when something changed.
//!
//! # Frame order
//!
//! 1. Running transition (rotation, recenter or crossfade)
//! 2. Controls damping
//! 3. Highlight color tweens
//! 4. Animation playback
//! 5. Throttled raycast
//! 6. Draw (crossfade blend or a dirty scene)

use std::collections::VecDeque;

use glam::{Vec2, Vec3};
use ripe_core::frame::rotation_to_position;
use ripe_core::{FrameKey, Throttle, View};
use ripe_resources::{AssetManager, PartsSelection};
use ripe_rhi::RenderBackend;
use ripe_scene::{Camera, LightRig, MaterialId, NodeId, Scene};
use tracing::{debug, info};

use crate::controls::{CameraPose, CameraPoseSink, Controls, PointerButton, TweenProgress};
use crate::crossfade::{Capture, Crossfade, CrossfadeChange};
use crate::error::{RendererError, RendererResult};
use crate::highlight::Highlighter;
use crate::initials::Initials;
use crate::options::{AnimateKind, RaycastStrategy, RendererOptions};
use crate::picker::{CpuPicker, GpuPicker, Raycaster};
use crate::playback::{Playback, PlaybackStep};
use crate::state::{ElementState, Event, TransitionKind, TransitionState};

const NEAR: f32 = 0.01;
const FAR: f32 = 200.0;

/// The main camera and the frame it currently shows.
#[derive(Debug)]
pub struct Viewpoint {
    /// Camera every scene render and pick goes through
    pub camera: Camera,
    view: View,
    position: u32,
    view_threshold: f32,
    dirty: bool,
}

impl Viewpoint {
    fn new(camera: Camera, view_threshold: f32) -> Self {
        Self {
            camera,
            view: View::Side,
            position: 0,
            view_threshold,
            dirty: true,
        }
    }

    /// Frame nearest to the camera's orbit angles.
    pub fn frame_key(&self) -> FrameKey {
        FrameKey::new(self.view, self.position)
    }

    /// The next frame needs a draw.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Request a draw on the next frame.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }
}

impl CameraPoseSink for Viewpoint {
    fn apply_pose(&mut self, pose: &CameraPose) {
        let rx = pose.rotation_x.to_radians();
        let ry = pose.rotation_y.to_radians();
        let t = pose.target;
        let x_dist = pose.distance * ry.cos();
        self.camera.position = Vec3::new(
            t.x + x_dist * (-rx).sin(),
            t.y + pose.distance * ry.sin(),
            t.z + x_dist * rx.cos(),
        );
        self.camera.look_at(t);
        self.view = View::from_rotation(pose.rotation_y, self.view_threshold);
        self.position = rotation_to_position(pose.rotation_x);
        self.dirty = true;
    }
}

/// What a queued raycast is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PickOp {
    Highlight,
    Select,
    Recenter,
}

#[derive(Debug, Clone, Copy)]
struct PickRequest {
    at: Vec2,
    op: PickOp,
}

/// Configurator renderer over a [`RenderBackend`].
pub struct Renderer<B: RenderBackend> {
    backend: B,
    scene: Scene,
    assets: AssetManager,
    lights: LightRig,
    viewpoint: Viewpoint,
    controls: Controls,
    raycaster: Raycaster,
    initials: Option<Initials>,
    highlighter: Highlighter,
    playback: Playback,
    transition: TransitionState,
    crossfade: Option<Crossfade>,
    /// Pointer driven flags; transition flags are derived
    flags: ElementState,
    options: RendererOptions,
    throttle: Throttle,
    pending_pick: Option<PickRequest>,
    intersected: Option<MaterialId>,
    pointer_down: bool,
    dragged: bool,
    events: VecDeque<Event>,
    wireframe: bool,
    clock_ms: f64,
    last_frame_ms: Option<f64>,
    ready: bool,
}

impl<B: RenderBackend> Renderer<B> {
    /// Renderer sized to `backend`, with the camera placed at the
    /// configured start frame. Nothing loads until [`Renderer::initialize`].
    pub fn new(mut backend: B, assets: AssetManager, options: RendererOptions) -> Self {
        let (width, height) = backend.size();
        let camera_options = &options.camera;
        let mut camera = Camera::perspective(
            camera_options.fov,
            width as f32 / height.max(1) as f32,
            NEAR,
            FAR,
        );
        camera.position = Vec3::new(0.0, camera_options.height, camera_options.distance);
        camera.look_at(camera_options.target());

        let controls = Controls::new(
            camera_options.controls.clone(),
            camera_options.target(),
            camera_options.distance,
            options.position,
        );
        let mut viewpoint = Viewpoint::new(camera, options.view_threshold);
        viewpoint.apply_pose(controls.current());

        let raycaster = match options.raycast_strategy {
            RaycastStrategy::Gpu => Raycaster::Gpu(GpuPicker::new()),
            RaycastStrategy::Cpu => Raycaster::Cpu(CpuPicker),
        };
        backend.set_exposure(options.renderer.exposure);

        Self {
            lights: LightRig::studio(camera_options.distance),
            initials: assets.config().initials.clone().map(Initials::new),
            highlighter: Highlighter::new(&options.renderer),
            throttle: Throttle::new(options.raycast_throttle),
            wireframe: options.renderer.wireframe,
            backend,
            scene: Scene::new(),
            assets,
            viewpoint,
            controls,
            raycaster,
            playback: Playback::new(),
            transition: TransitionState::Idle,
            crossfade: None,
            flags: ElementState::empty(),
            options,
            pending_pick: None,
            intersected: None,
            pointer_down: false,
            dragged: false,
            events: VecDeque::new(),
            clock_ms: 0.0,
            last_frame_ms: None,
            ready: false,
        }
    }

    /// Load the model with `parts` applied, set up initials and queue the
    /// intro animation.
    pub fn initialize(&mut self, parts: &PartsSelection) -> RendererResult<()> {
        self.assets.load_assets(&mut self.scene, parts)?;
        if let Some(initials) = &mut self.initials {
            initials.initialize(&self.scene, &mut self.assets)?;
        }
        self.playback.initialize(&self.assets, &self.options)?;
        if self.wireframe {
            self.assets.set_wireframe(&mut self.scene, true);
        }
        self.viewpoint.mark_dirty();
        self.ready = true;
        self.events.push_back(Event::Ready);
        info!(frame = %self.frame_key(), nodes = self.scene.node_count(), "Renderer ready");
        Ok(())
    }

    /// The model is loaded and not disposed.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Run one display refresh at `now_ms`. Returns whether anything was
    /// drawn.
    pub fn frame(&mut self, now_ms: f64) -> RendererResult<bool> {
        let dt = self
            .last_frame_ms
            .map_or(0.0, |last| ((now_ms - last).max(0.0) / 1000.0) as f32);
        self.last_frame_ms = Some(now_ms);
        self.clock_ms = now_ms;

        self.advance_transition(now_ms);
        self.controls.update(dt, &mut self.viewpoint);
        if self.highlighter.advance(&mut self.scene, now_ms) {
            self.viewpoint.mark_dirty();
        }
        self.advance_playback(dt)?;

        if !self.element_state().contains(ElementState::NO_RAYCAST)
            && self.throttle.try_fire(now_ms, self.pending_pick.is_some())
            && let Some(request) = self.pending_pick.take()
        {
            self.raycast(request)?;
        }

        if let Some(fade) = &self.crossfade {
            fade.draw(&mut self.backend, now_ms)?;
            return Ok(true);
        }
        if self.viewpoint.dirty {
            self.backend
                .render(&self.scene, &self.viewpoint.camera, &self.lights, None)?;
            self.viewpoint.dirty = false;
            return Ok(true);
        }
        Ok(false)
    }

    fn advance_transition(&mut self, now_ms: f64) {
        match self.transition {
            TransitionState::Idle => {}
            TransitionState::Rotating | TransitionState::Recentering => {
                let progress = self.controls.advance_transition(now_ms, &mut self.viewpoint);
                if progress != Some(TweenProgress::Running) {
                    self.finish_transition();
                }
            }
            TransitionState::Crossfading => {
                if self.crossfade.as_ref().is_none_or(|fade| fade.is_finished(now_ms)) {
                    self.stop_crossfade();
                    self.viewpoint.mark_dirty();
                    self.finish_transition();
                }
            }
        }
    }

    fn finish_transition(&mut self) {
        if let Some(kind) = self.transition.kind() {
            info!(?kind, frame = %self.frame_key(), "Transition finished");
            self.events.push_back(Event::TransitionFinished(kind));
        }
        self.transition = TransitionState::Idle;
    }

    fn advance_playback(&mut self, dt: f32) -> RendererResult<()> {
        if self.playback.is_pending() {
            self.playback.prime(
                &mut self.backend,
                &self.scene,
                &self.viewpoint.camera,
                &self.lights,
            )?;
        }
        match self.playback.advance(&mut self.scene, dt) {
            PlaybackStep::Idle => {}
            PlaybackStep::Playing | PlaybackStep::Finished => self.viewpoint.mark_dirty(),
        }
        Ok(())
    }

    /// Show `frame`, animated as configured for a view or a position
    /// change. Returns false while a transition runs or when `frame` is
    /// already shown.
    pub fn change_frame_rotation(&mut self, frame: FrameKey) -> RendererResult<bool> {
        if !self.transition.is_idle() {
            debug!(%frame, "Frame change ignored, transition running");
            return Ok(false);
        }
        let current = self.frame_key();
        if frame == current {
            return Ok(false);
        }

        let pose = self.controls.frame_pose(frame);
        let animate = if frame.view != current.view {
            self.options.view_animate
        } else {
            self.options.position_animate
        };
        match animate {
            AnimateKind::Crossfade => {
                if !self.crossfade(CrossfadeChange::Rotation(pose))? {
                    return Ok(false);
                }
            }
            AnimateKind::Rotate => {
                self.controls.start_rotation_transition(
                    self.clock_ms,
                    pose.rotation_x,
                    pose.rotation_y,
                    None,
                );
                self.transition = TransitionState::Rotating;
            }
            AnimateKind::None => {
                self.controls.set_pose(pose);
                self.viewpoint.apply_pose(&pose);
            }
        }
        info!(from = %current, to = %frame, ?animate, "Changed frame");
        self.events.push_back(Event::ChangedFrame(frame));
        Ok(true)
    }

    /// Capture the current state, apply `change`, capture the new state
    /// and blend between the two. A material change during a running
    /// crossfade replaces it; anything else is refused while a transition
    /// runs.
    pub fn crossfade(&mut self, change: CrossfadeChange) -> RendererResult<bool> {
        match (self.transition, &change) {
            (TransitionState::Idle, _) => {}
            (TransitionState::Crossfading, CrossfadeChange::Materials(parts)) => {
                self.assets.set_materials(&mut self.scene, parts, false)?;
                self.stop_crossfade();
                self.transition = TransitionState::Idle;
            }
            _ => return Ok(false),
        }

        let fade = Crossfade::begin(
            &mut self.backend,
            self.clock_ms,
            self.options.crossfade_duration,
            self.options.renderer.crossfade_easing,
        )?;
        if let Err(e) = self.capture_change(&fade, change) {
            fade.dispose(&mut self.backend);
            return Err(e);
        }
        info!(duration = self.options.crossfade_duration, "Crossfade started");
        self.crossfade = Some(fade);
        self.transition = TransitionState::Crossfading;
        Ok(true)
    }

    fn capture_change(&mut self, fade: &Crossfade, change: CrossfadeChange) -> RendererResult<()> {
        fade.capture(
            &mut self.backend,
            Capture::From,
            &self.scene,
            &self.viewpoint.camera,
            &self.lights,
        )?;
        match change {
            CrossfadeChange::Materials(parts) => {
                self.highlighter.finish(&mut self.scene);
                self.intersected = None;
                self.assets.set_materials(&mut self.scene, &parts, true)?;
            }
            CrossfadeChange::Rotation(pose) => {
                self.controls.set_pose(pose);
                self.viewpoint.apply_pose(&pose);
            }
        }
        self.assets.set_wireframe(&mut self.scene, self.wireframe);
        fade.capture(
            &mut self.backend,
            Capture::To,
            &self.scene,
            &self.viewpoint.camera,
            &self.lights,
        )?;
        Ok(())
    }

    fn stop_crossfade(&mut self) {
        if let Some(fade) = self.crossfade.take() {
            fade.dispose(&mut self.backend);
        }
    }

    /// Apply a new parts selection, crossfading into it when `animate` is
    /// set and no other transition runs.
    pub fn set_parts(&mut self, parts: &PartsSelection, animate: bool) -> RendererResult<()> {
        if !self.ready {
            return Err(RendererError::NotLoaded);
        }
        self.lowlight();
        if animate && self.crossfade(CrossfadeChange::Materials(parts.clone()))? {
            return Ok(());
        }
        self.highlighter.finish(&mut self.scene);
        self.assets.set_materials(&mut self.scene, parts, true)?;
        self.assets.set_wireframe(&mut self.scene, self.wireframe);
        self.viewpoint.mark_dirty();
        Ok(())
    }

    /// Darken the materials of `part`. Missing parts are ignored.
    pub fn highlight_part(&mut self, part: &str) -> bool {
        let materials = self.assets.part_materials(&self.scene, part);
        self.highlight_materials(part, &materials)
    }

    fn highlight_materials(&mut self, label: &str, materials: &[MaterialId]) -> bool {
        if !self.options.renderer.masks_enabled() || materials.is_empty() {
            return false;
        }
        self.highlighter
            .highlight(&self.scene, &self.assets, label, materials, self.clock_ms);
        self.events.push_back(Event::Highlighted(label.to_string()));
        true
    }

    /// Restore every base color.
    pub fn lowlight(&mut self) {
        if !self.options.renderer.masks_enabled() {
            return;
        }
        let was_highlighted = self.highlighter.highlighted().is_some() || self.intersected.is_some();
        self.highlighter.lowlight(&self.scene, &self.assets, self.clock_ms);
        self.intersected = None;
        if was_highlighted {
            self.events.push_back(Event::Lowlighted);
        }
    }

    /// Turn highlight masks on or off. Turning them off lowlights first.
    pub fn set_masks(&mut self, enabled: bool) {
        if !enabled {
            self.lowlight();
        }
        self.options.renderer.use_masks = enabled;
        self.options.renderer.no_masks = !enabled;
    }

    fn raycast(&mut self, request: PickRequest) -> RendererResult<()> {
        let state = self.element_state();
        if state.intersects(ElementState::ANIMATING | ElementState::CROSSFADING) {
            return Ok(());
        }
        if request.op == PickOp::Highlight && state.contains(ElementState::DRAG) {
            return Ok(());
        }

        let hit = self.raycaster.pick(
            &mut self.backend,
            &self.scene,
            &mut self.viewpoint.camera,
            &self.lights,
            request.at.x,
            request.at.y,
        )?;
        let Some(node) = hit else {
            self.lowlight();
            return Ok(());
        };

        let material = self
            .scene
            .node(node)
            .and_then(|n| n.as_mesh())
            .and_then(|m| m.material);
        let part = self.assets.part_of(node).map(str::to_string);
        if request.op == PickOp::Highlight && material.is_some() && material == self.intersected {
            return Ok(());
        }

        self.lowlight();
        let label = part.clone().unwrap_or_else(|| self.node_name(node));
        match &part {
            Some(part) => self.highlight_part(part),
            None => self.highlight_materials(&label, &material.into_iter().collect::<Vec<_>>()),
        };
        self.intersected = material;

        match request.op {
            PickOp::Highlight => {}
            PickOp::Select => {
                debug!(part = %label, "Selected part");
                self.events.push_back(Event::Selected(label));
            }
            PickOp::Recenter => self.recenter(node),
        }
        Ok(())
    }

    fn node_name(&self, node: NodeId) -> String {
        self.scene
            .node(node)
            .map(|n| n.name.clone())
            .unwrap_or_default()
    }

    fn recenter(&mut self, node: NodeId) {
        if !self.transition.is_idle() {
            return;
        }
        let bounds = self.scene.bounding_box(node);
        let fov = self
            .viewpoint
            .camera
            .fov_degrees()
            .unwrap_or(self.options.camera.fov);
        self.controls.start_recenter_transition(self.clock_ms, bounds, fov);
        self.transition = TransitionState::Recentering;
        info!(node = %self.node_name(node), "Recentering");
    }

    /// Press a pointer button at element pixel `(x, y)`. Returns whether a
    /// drag started.
    pub fn pointer_down(&mut self, button: PointerButton, x: f32, y: f32) -> bool {
        let animating = !self.transition.is_idle();
        if !self.controls.pointer_down(button, Vec2::new(x, y), animating) {
            return false;
        }
        self.pointer_down = true;
        self.dragged = false;
        true
    }

    /// Move the pointer: drags while pressed, otherwise queues a
    /// highlight raycast.
    pub fn pointer_move(&mut self, x: f32, y: f32) {
        let at = Vec2::new(x, y);
        if self.pointer_down {
            let blocked = !self.transition.is_idle();
            if self.controls.pointer_move(at, blocked) {
                self.flags.insert(ElementState::DRAG);
                self.dragged = true;
            }
            self.lowlight();
            return;
        }
        self.pending_pick = Some(PickRequest {
            at,
            op: PickOp::Highlight,
        });
    }

    /// Release the pointer, ending any drag.
    pub fn pointer_up(&mut self) {
        self.controls.pointer_up();
        self.pointer_down = false;
        self.flags.remove(ElementState::DRAG);
    }

    /// The pointer left the element.
    pub fn pointer_leave(&mut self) {
        self.pending_pick = None;
        self.lowlight();
    }

    /// Click at `(x, y)`; ignored when it ended a drag.
    pub fn click(&mut self, x: f32, y: f32) {
        if self.dragged {
            self.dragged = false;
            return;
        }
        self.pending_pick = Some(PickRequest {
            at: Vec2::new(x, y),
            op: PickOp::Select,
        });
    }

    /// Double click at `(x, y)`: recenter on the part under the pointer.
    pub fn double_click(&mut self, x: f32, y: f32) -> RendererResult<()> {
        self.raycast(PickRequest {
            at: Vec2::new(x, y),
            op: PickOp::Recenter,
        })
    }

    /// Zoom one wheel notch. Returns false while a transition runs.
    pub fn wheel(&mut self, delta_y: f32) -> bool {
        self.controls.wheel(delta_y, !self.transition.is_idle())
    }

    /// Rebuild the initials when the text or engraving changed.
    pub fn update_initials(&mut self, text: &str, engraving: Option<&str>) -> RendererResult<bool> {
        let Some(initials) = &mut self.initials else {
            return Ok(false);
        };
        let changed = initials.update(&mut self.scene, &mut self.assets, text, engraving)?;
        if changed {
            self.assets.set_wireframe(&mut self.scene, self.wireframe);
            self.viewpoint.mark_dirty();
        }
        Ok(changed)
    }

    /// Resize the screen. A running crossfade is cut short since its
    /// targets no longer match.
    pub fn update_size(&mut self, width: u32, height: u32) -> RendererResult<()> {
        self.backend.set_size(width, height)?;
        self.viewpoint
            .camera
            .set_aspect(width as f32 / height.max(1) as f32);
        if self.crossfade.is_some() {
            self.stop_crossfade();
            self.finish_transition();
        }
        self.viewpoint.mark_dirty();
        Ok(())
    }

    /// Draw every material as wireframe, including ones applied later.
    pub fn set_wireframe(&mut self, wireframe: bool) {
        self.wireframe = wireframe;
        self.assets.set_wireframe(&mut self.scene, wireframe);
        self.viewpoint.mark_dirty();
    }

    /// Release every target, mesh, material and texture.
    pub fn dispose_resources(&mut self) {
        self.stop_crossfade();
        self.controls.cancel_transition();
        self.transition = TransitionState::Idle;
        self.playback.stop();
        self.highlighter.clear();
        self.raycaster.dispose(&mut self.backend);
        if let Some(initials) = &mut self.initials {
            initials.dispose(&mut self.scene, &mut self.assets);
        }
        self.assets.dispose_resources(&mut self.scene);
        self.pending_pick = None;
        self.intersected = None;
        self.ready = false;
        info!("Disposed renderer resources");
    }

    /// Take the queued events.
    pub fn drain_events(&mut self) -> impl Iterator<Item = Event> + '_ {
        self.events.drain(..)
    }

    pub(crate) fn emit(&mut self, event: Event) {
        self.events.push_back(event);
    }

    /// Pointer flags combined with the flags of the running transition
    /// and of intro playback.
    pub fn element_state(&self) -> ElementState {
        let mut state = self.flags | self.transition.flags();
        if self.playback.blocks_raycast() {
            state |= ElementState::NO_RAYCAST;
        }
        state
    }

    /// Transition that owns the camera or the screen, if any.
    pub fn transition_state(&self) -> TransitionState {
        self.transition
    }

    /// Frame the camera currently shows.
    pub fn frame_key(&self) -> FrameKey {
        self.viewpoint.frame_key()
    }

    /// Kind reported when the running transition finishes.
    pub fn transition_kind(&self) -> Option<TransitionKind> {
        self.transition.kind()
    }

    /// Options in effect, including mask toggles made at runtime.
    pub fn options(&self) -> &RendererOptions {
        &self.options
    }

    /// Backend the frames are drawn with.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Mutable backend access. Drawing through it bypasses the dirty
    /// tracking.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Scene holding the model, the environment and the initials.
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Asset manager owning the loaded meshes, materials and clips.
    pub fn assets(&self) -> &AssetManager {
        &self.assets
    }

    /// Main camera.
    pub fn camera(&self) -> &Camera {
        &self.viewpoint.camera
    }

    /// Orbit controls driving the camera.
    pub fn controls(&self) -> &Controls {
        &self.controls
    }

    /// Initials, when the model configures them.
    pub fn initials(&self) -> Option<&Initials> {
        self.initials.as_ref()
    }

    /// Part (or node name) currently highlighted.
    pub fn highlighted(&self) -> Option<&str> {
        self.highlighter.highlighted()
    }
}
