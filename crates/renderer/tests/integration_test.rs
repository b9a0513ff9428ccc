//! End-to-end tests of the renderer core over the software backend.

use image::RgbaImage;
use ripe_core::{FrameKey, View};
use ripe_renderer::{
    ElementState, Event, PointerButton, RaycastStrategy, Renderer, RendererOptions,
    TransitionKind, TransitionState, decode_object_id, encode_object_id,
};
use ripe_resources::{AssetLocation, AssetManager, MemorySource, ModelConfig, PartsSelection};
use ripe_rhi::{
    ClearColor, DrawOverride, RenderBackend, RenderTargetId, RhiResult, SoftwareBackend,
};
use ripe_scene::{Camera, Color, LightRig, MaterialId, Scene};

const SHOE: &[u8] = include_bytes!("../../resources/tests/data/shoe.gltf");
const CONFIG: &str = r##"{ "assets": { "materials": {
    "side": { "nappa": { "black": { "color": "#202020" }, "white": { "color": "#f0f0f0" } } },
    "sole": { "default": { "color": "#808080" } }
} } }"##;
const CONFIG_BARE_SOLE: &str = r##"{ "assets": { "materials": {
    "side": { "nappa": { "black": { "color": "#202020" }, "white": { "color": "#f0f0f0" } } },
    "sole": { "rubber": { "white": { "color": "#ffffff" } } }
} } }"##;

/// One `render` call as seen by the backend.
#[derive(Debug, Clone, Copy)]
struct RenderCall {
    target: Option<RenderTargetId>,
    side_color: Option<Color>,
    picking: bool,
}

/// Software backend that records every render call.
struct RecordingBackend {
    inner: SoftwareBackend,
    calls: Vec<RenderCall>,
    blends: usize,
}

impl RecordingBackend {
    fn new(width: u32, height: u32) -> Self {
        Self {
            inner: SoftwareBackend::new(width, height).unwrap(),
            calls: Vec::new(),
            blends: 0,
        }
    }

    fn scene_calls(&self) -> Vec<RenderCall> {
        self.calls.iter().copied().filter(|c| !c.picking).collect()
    }
}

impl RenderBackend for RecordingBackend {
    fn size(&self) -> (u32, u32) {
        self.inner.size()
    }

    fn set_size(&mut self, width: u32, height: u32) -> RhiResult<()> {
        self.inner.set_size(width, height)
    }

    fn set_exposure(&mut self, exposure: f32) {
        self.inner.set_exposure(exposure);
    }

    fn create_render_target(&mut self, width: u32, height: u32) -> RhiResult<RenderTargetId> {
        self.inner.create_render_target(width, height)
    }

    fn dispose_render_target(&mut self, target: RenderTargetId) -> bool {
        self.inner.dispose_render_target(target)
    }

    fn render_target(&self) -> Option<RenderTargetId> {
        self.inner.render_target()
    }

    fn set_render_target(&mut self, target: Option<RenderTargetId>) -> RhiResult<()> {
        self.inner.set_render_target(target)
    }

    fn clear_color(&self) -> ClearColor {
        self.inner.clear_color()
    }

    fn set_clear_color(&mut self, color: ClearColor) {
        self.inner.set_clear_color(color);
    }

    fn render(
        &mut self,
        scene: &Scene,
        camera: &Camera,
        lights: &LightRig,
        draw_override: Option<&mut dyn DrawOverride>,
    ) -> RhiResult<()> {
        let side_color = scene
            .find_by_name("side_1")
            .and_then(|id| scene.node(id)?.as_mesh()?.material)
            .and_then(|m| scene.material(m))
            .map(|m| m.color);
        self.calls.push(RenderCall {
            target: self.inner.render_target(),
            side_color,
            picking: draw_override.is_some(),
        });
        self.inner.render(scene, camera, lights, draw_override)
    }

    fn blend(&mut self, camera: &Camera, a: RenderTargetId, b: RenderTargetId, mix: f32) -> RhiResult<()> {
        self.blends += 1;
        self.inner.blend(camera, a, b, mix)
    }

    fn read_pixels(
        &self,
        target: Option<RenderTargetId>,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> RhiResult<Vec<u8>> {
        self.inner.read_pixels(target, x, y, width, height)
    }

    fn target_size(&self, target: Option<RenderTargetId>) -> RhiResult<(u32, u32)> {
        self.inner.target_size(target)
    }

    fn snapshot(&self, target: Option<RenderTargetId>) -> RhiResult<RgbaImage> {
        self.inner.snapshot(target)
    }
}

fn options() -> RendererOptions {
    let mut options = RendererOptions::default();
    options.camera.distance = 4.0;
    options.renderer.plays_animation = false;
    options
}

fn renderer(options: RendererOptions) -> Renderer<RecordingBackend> {
    renderer_with(CONFIG, options)
}

fn renderer_with(config: &str, options: RendererOptions) -> Renderer<RecordingBackend> {
    let location = AssetLocation::new("mem://", "swear", "vyner").with_model_path("shoe.gltf");
    let assets = AssetManager::new(
        location,
        ModelConfig::from_json(config.as_bytes()).unwrap(),
        MemorySource::new().with_file("mem://shoe.gltf", SHOE),
    );
    Renderer::new(RecordingBackend::new(32, 32), assets, options)
}

fn parts(color: &str) -> PartsSelection {
    PartsSelection::new().with("side", "nappa", color)
}

fn loaded(options: RendererOptions) -> Renderer<RecordingBackend> {
    let mut renderer = renderer(options);
    renderer.initialize(&parts("black")).unwrap();
    renderer.frame(0.0).unwrap();
    renderer
}

fn node_color(renderer: &Renderer<RecordingBackend>, name: &str) -> (MaterialId, Color) {
    let scene = renderer.scene();
    let node = scene.find_by_name(name).unwrap();
    let material = scene.node(node).unwrap().as_mesh().unwrap().material.unwrap();
    (material, scene.material(material).unwrap().color)
}

fn side_color(renderer: &Renderer<RecordingBackend>) -> Color {
    node_color(renderer, "side_1").1
}

fn is(color: Option<Color>, expected: Color) -> bool {
    color.is_some_and(|c| c.abs_diff_eq(expected, 1e-6))
}

#[test]
fn test_crossfade_renders_old_then_new_state() {
    let mut renderer = loaded(options());
    let black = side_color(&renderer);
    renderer.backend_mut().calls.clear();

    renderer.set_parts(&parts("white"), true).unwrap();
    let white = side_color(&renderer);
    assert!(!white.abs_diff_eq(black, 1e-3));
    assert_eq!(renderer.transition_state(), TransitionState::Crossfading);
    assert!(renderer.element_state().contains(ElementState::CROSSFADING | ElementState::NO_DRAG));

    let captures = renderer.backend().scene_calls();
    assert_eq!(captures.len(), 2);
    let (from, to) = (captures[0], captures[1]);
    assert!(from.target.is_some() && to.target.is_some());
    assert_ne!(from.target, to.target);
    assert!(is(from.side_color, black), "first capture shows the old state");
    assert!(is(to.side_color, white), "second capture shows the new state");
    assert_eq!(renderer.backend().inner.target_count(), 2);

    for now in [100.0, 250.0, 400.0] {
        assert!(renderer.frame(now).unwrap());
    }
    assert_eq!(renderer.backend().blends, 3);
    assert_eq!(renderer.backend().scene_calls().len(), 2, "no direct renders while blending");

    renderer.frame(500.0).unwrap();
    assert!(renderer.transition_state().is_idle());
    assert_eq!(renderer.backend().inner.target_count(), 0);
    let calls = renderer.backend().scene_calls();
    let last = calls.last().unwrap();
    assert_eq!(last.target, None);
    assert!(is(last.side_color, white));
    assert!(calls.iter().all(|c| is(c.side_color, black) || is(c.side_color, white)));
    assert!(
        renderer
            .drain_events()
            .any(|e| e == Event::TransitionFinished(TransitionKind::Crossfade))
    );
}

#[test]
fn test_material_change_during_crossfade_restarts_it() {
    let mut renderer = loaded(options());
    let black = side_color(&renderer);
    renderer.set_parts(&parts("white"), true).unwrap();
    renderer.frame(100.0).unwrap();
    renderer.set_parts(&parts("black"), true).unwrap();
    assert_eq!(renderer.transition_state(), TransitionState::Crossfading);
    assert_eq!(renderer.backend().inner.target_count(), 2);
    renderer.frame(600.0).unwrap();
    assert!(renderer.transition_state().is_idle());
    assert!(side_color(&renderer).abs_diff_eq(black, 1e-6));
}

#[test]
fn test_frame_change_rejected_while_animating() {
    let mut renderer = loaded(options());
    assert!(renderer.change_frame_rotation(FrameKey::new(View::Side, 6)).unwrap());
    assert_eq!(renderer.transition_state(), TransitionState::Rotating);
    assert_eq!(renderer.transition_kind(), Some(TransitionKind::Rotation));
    assert!(renderer.element_state().contains(ElementState::ANIMATING));

    let before = renderer.frame_key();
    let top: FrameKey = "top-0".parse().unwrap();
    assert!(!renderer.change_frame_rotation(top).unwrap());
    assert_eq!(renderer.frame_key(), before);
    assert_eq!(renderer.transition_state(), TransitionState::Rotating);
    assert!(!renderer.pointer_down(PointerButton::Primary, 1.0, 1.0));

    renderer.frame(250.0).unwrap();
    renderer.frame(500.0).unwrap();
    assert!(renderer.transition_state().is_idle());
    assert_eq!(renderer.frame_key(), FrameKey::new(View::Side, 6));
    assert!(!renderer.change_frame_rotation(FrameKey::new(View::Side, 6)).unwrap());
}

#[test]
fn test_view_change_crossfades_to_top() {
    let mut renderer = loaded(options());
    let top: FrameKey = "top-0".parse().unwrap();
    assert!(renderer.change_frame_rotation(top).unwrap());
    assert_eq!(renderer.transition_state(), TransitionState::Crossfading);
    assert_eq!(renderer.frame_key(), top);
    renderer.frame(500.0).unwrap();
    assert!(renderer.transition_state().is_idle());
    assert_eq!(renderer.frame_key(), top);
}

#[test]
fn test_highlight_then_lowlight_restores_base_color() {
    let mut renderer = loaded(options());
    let base = side_color(&renderer);

    assert!(renderer.highlight_part("side"));
    renderer.frame(75.0).unwrap();
    let darkened = side_color(&renderer);
    assert!(darkened.r < base.r);

    renderer.lowlight();
    renderer.frame(300.0).unwrap();
    assert!(side_color(&renderer).abs_diff_eq(base, 1e-6));

    let events: Vec<_> = renderer.drain_events().collect();
    assert!(events.contains(&Event::Highlighted("side".to_string())));
    assert!(events.contains(&Event::Lowlighted));
}

fn bare_sole_highlighted() -> (Renderer<RecordingBackend>, Color) {
    let mut renderer = renderer_with(CONFIG_BARE_SOLE, options());
    renderer.initialize(&parts("black")).unwrap();
    renderer.frame(0.0).unwrap();
    let (_, base) = node_color(&renderer, "sole");

    assert!(renderer.highlight_part("sole"));
    renderer.frame(200.0).unwrap();
    assert!(node_color(&renderer, "sole").1.r < base.r);
    (renderer, base)
}

fn assert_sole_restored(renderer: &mut Renderer<RecordingBackend>, base: Color) {
    let (material, color) = node_color(renderer, "sole");
    assert!(color.abs_diff_eq(base, 1e-6), "sole kept {color:?}, base {base:?}");
    assert!(renderer.assets().base_color(material).is_some_and(|c| c.abs_diff_eq(base, 1e-6)));

    renderer.highlight_part("sole");
    renderer.frame(3000.0).unwrap();
    renderer.lowlight();
    renderer.frame(4000.0).unwrap();
    assert!(node_color(renderer, "sole").1.abs_diff_eq(base, 1e-6));
}

#[test]
fn test_parts_change_restores_unassigned_highlighted_part() {
    let (mut renderer, base) = bare_sole_highlighted();
    renderer.set_parts(&parts("white"), false).unwrap();
    renderer.frame(1000.0).unwrap();
    renderer.lowlight();
    renderer.frame(2000.0).unwrap();
    assert_sole_restored(&mut renderer, base);
}

#[test]
fn test_crossfaded_parts_change_restores_unassigned_highlighted_part() {
    let (mut renderer, base) = bare_sole_highlighted();
    renderer.set_parts(&parts("white"), true).unwrap();
    assert_eq!(renderer.transition_state(), TransitionState::Crossfading);
    renderer.frame(1000.0).unwrap();
    assert!(renderer.transition_state().is_idle());
    renderer.lowlight();
    renderer.frame(2000.0).unwrap();
    assert_sole_restored(&mut renderer, base);
}

#[test]
fn test_pointer_leave_drops_pending_pick_and_lowlights() {
    let mut renderer = loaded(options());
    renderer.pointer_move(20.0, 12.0);
    renderer.frame(100.0).unwrap();
    assert_eq!(renderer.highlighted(), Some("sole"));

    renderer.pointer_move(20.0, 12.0);
    renderer.pointer_leave();
    assert_eq!(renderer.highlighted(), None);
    renderer.frame(200.0).unwrap();
    assert_eq!(renderer.highlighted(), None, "no raycast after leaving");
}

#[test]
fn test_highlight_of_unknown_part_is_a_no_op() {
    let mut renderer = loaded(options());
    assert!(!renderer.highlight_part("tongue"));
    assert_eq!(renderer.highlighted(), None);
}

#[test]
fn test_disabled_masks_skip_highlight() {
    let mut renderer = loaded(options());
    renderer.set_masks(false);
    assert!(!renderer.highlight_part("side"));
    renderer.set_masks(true);
    assert!(renderer.highlight_part("side"));
}

#[test]
fn test_hover_pick_highlights_part_under_pointer() {
    for strategy in [RaycastStrategy::Gpu, RaycastStrategy::Cpu] {
        let mut options = options();
        options.raycast_strategy = strategy;
        let mut renderer = loaded(options);

        renderer.pointer_move(20.0, 12.0);
        renderer.frame(100.0).unwrap();
        assert_eq!(renderer.highlighted(), Some("sole"), "{strategy:?}");

        renderer.pointer_move(8.0, 24.0);
        renderer.frame(110.0).unwrap();
        assert_eq!(renderer.highlighted(), Some("sole"), "throttled");
        renderer.frame(200.0).unwrap();
        assert_eq!(renderer.highlighted(), None, "{strategy:?}");
        assert!(renderer.drain_events().any(|e| e == Event::Lowlighted));
    }
}

#[test]
fn test_click_selects_and_double_click_recenters() {
    let mut renderer = loaded(options());
    renderer.click(20.0, 12.0);
    renderer.frame(100.0).unwrap();
    assert!(renderer.drain_events().any(|e| e == Event::Selected("sole".to_string())));

    renderer.double_click(20.0, 12.0).unwrap();
    assert_eq!(renderer.transition_state(), TransitionState::Recentering);
    renderer.frame(700.0).unwrap();
    assert!(renderer.transition_state().is_idle());
    let target = renderer.controls().current().target;
    assert!((target.z - 1.0).abs() < 1e-4, "centered on the sole, got {target:?}");
}

#[test]
fn test_click_after_drag_is_ignored() {
    let mut renderer = loaded(options());
    assert!(renderer.pointer_down(PointerButton::Primary, 10.0, 10.0));
    renderer.pointer_move(14.0, 10.0);
    assert!(renderer.element_state().contains(ElementState::DRAG));
    renderer.pointer_up();
    assert!(!renderer.element_state().contains(ElementState::DRAG));
    renderer.click(14.0, 10.0);
    renderer.frame(100.0).unwrap();
    assert!(!renderer.drain_events().any(|e| matches!(e, Event::Selected(_))));
}

#[test]
fn test_intro_animation_primes_off_screen_and_blocks_raycast() {
    let mut options = options();
    options.renderer.plays_animation = true;
    options.renderer.animation_loops = false;
    let mut renderer = renderer(options);
    renderer.initialize(&parts("black")).unwrap();
    assert!(renderer.element_state().contains(ElementState::NO_RAYCAST));

    renderer.frame(0.0).unwrap();
    let calls = renderer.backend().scene_calls();
    assert!(calls[0].target.is_some(), "first render goes off-screen");
    assert_eq!(calls.last().unwrap().target, None);
    assert_eq!(renderer.backend().inner.target_count(), 0);

    renderer.pointer_move(20.0, 12.0);
    renderer.frame(500.0).unwrap();
    assert_eq!(renderer.highlighted(), None, "no picking while the clip plays");

    renderer.frame(1500.0).unwrap();
    assert!(!renderer.element_state().contains(ElementState::NO_RAYCAST));
    renderer.frame(1600.0).unwrap();
    assert_eq!(renderer.highlighted(), Some("sole"));
}

#[test]
fn test_unknown_autoplay_animation_fails_initialize() {
    let mut options = options();
    options.renderer.plays_animation = true;
    options.renderer.animation = Some("outro".to_string());
    let mut renderer = renderer(options);
    let err = renderer.initialize(&parts("black")).unwrap_err();
    assert!(err.to_string().contains("outro"));
}

#[test]
fn test_static_scene_is_not_redrawn() {
    let mut renderer = loaded(options());
    assert!(!renderer.frame(16.0).unwrap());
    assert!(renderer.wheel(1.0));
    assert!(renderer.frame(32.0).unwrap());
}

#[test]
fn test_dispose_releases_everything() {
    let mut renderer = loaded(options());
    renderer.pointer_move(20.0, 12.0);
    renderer.frame(100.0).unwrap();
    renderer.dispose_resources();
    renderer.dispose_resources();
    let scene = renderer.scene();
    assert_eq!(scene.node_count(), 0);
    assert_eq!(scene.material_count(), 0);
    assert_eq!(scene.geometry_count(), 0);
    assert_eq!(renderer.backend().inner.target_count(), 0);
    assert!(!renderer.is_ready());
}

#[test]
fn test_object_id_bytes_round_trip() {
    assert_eq!(encode_object_id(0x0102_0304), [0x01, 0x02, 0x03, 0x04]);
    assert_eq!(decode_object_id([0x01, 0x02, 0x03, 0x04]), Some(0x0102_0304));
}
