//! Double-buffered crossfade between two rendered states.
//!
//! The old state is captured into one target, the change is applied, the
//! new state is captured into a second target, and a full-viewport quad
//! mixes the two until the new state fully shows.

use ripe_core::Easing;
use ripe_resources::PartsSelection;
use ripe_rhi::{RenderBackend, RenderTargetId, RhiResult};
use ripe_scene::{Camera, LightRig, Scene};
use tracing::trace;

use crate::controls::CameraPose;

/// What changes between the two captured states.
#[derive(Debug, Clone, PartialEq)]
pub enum CrossfadeChange {
    Materials(PartsSelection),
    Rotation(CameraPose),
}

/// Which side of the fade a capture is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capture {
    From,
    To,
}

#[derive(Debug)]
pub struct Crossfade {
    from: RenderTargetId,
    to: RenderTargetId,
    camera: Camera,
    start_ms: f64,
    duration_ms: f64,
    easing: Easing,
}

impl Crossfade {
    /// Allocate both screen sized targets and the transition camera.
    pub fn begin<B: RenderBackend + ?Sized>(
        backend: &mut B,
        now_ms: f64,
        duration_ms: f64,
        easing: Easing,
    ) -> RhiResult<Self> {
        let (width, height) = backend.size();
        let from = backend.create_render_target(width, height)?;
        let to = match backend.create_render_target(width, height) {
            Ok(target) => target,
            Err(e) => {
                backend.dispose_render_target(from);
                return Err(e);
            }
        };
        let (w, h) = (width as f32, height as f32);
        let camera = Camera::orthographic(-w / 2.0, w / 2.0, h / 2.0, -h / 2.0, -10.0, 10.0);
        Ok(Self {
            from,
            to,
            camera,
            start_ms: now_ms,
            duration_ms,
            easing,
        })
    }

    /// Target holding one side of the fade.
    pub fn target(&self, capture: Capture) -> RenderTargetId {
        match capture {
            Capture::From => self.from,
            Capture::To => self.to,
        }
    }

    /// Render the scene into one of the two targets, then return to the
    /// screen.
    pub fn capture<B: RenderBackend + ?Sized>(
        &self,
        backend: &mut B,
        capture: Capture,
        scene: &Scene,
        camera: &Camera,
        lights: &LightRig,
    ) -> RhiResult<()> {
        backend.set_render_target(Some(self.target(capture)))?;
        let rendered = backend.render(scene, camera, lights, None);
        backend.set_render_target(None)?;
        trace!(?capture, "Captured crossfade state");
        rendered
    }

    /// Eased mix ratio at `now_ms`, 0 showing the old state.
    pub fn mix(&self, now_ms: f64) -> f32 {
        if self.duration_ms <= 0.0 {
            return 1.0;
        }
        let pos = ((now_ms - self.start_ms) / self.duration_ms) as f32;
        self.easing.apply(pos, 0.0, 1.0)
    }

    /// The new state is fully shown.
    pub fn is_finished(&self, now_ms: f64) -> bool {
        now_ms - self.start_ms >= self.duration_ms
    }

    /// Draw the blended quad to the screen.
    pub fn draw<B: RenderBackend + ?Sized>(&self, backend: &mut B, now_ms: f64) -> RhiResult<f32> {
        let mix = self.mix(now_ms);
        backend.blend(&self.camera, self.from, self.to, mix)?;
        Ok(mix)
    }

    /// Release both targets.
    pub fn dispose<B: RenderBackend + ?Sized>(self, backend: &mut B) {
        backend.dispose_render_target(self.from);
        backend.dispose_render_target(self.to);
    }
}
