//! Autoplay of the model's intro animation.

use ripe_resources::AssetManager;
use ripe_rhi::RenderBackend;
use ripe_scene::{AnimationClip, AnimationMixer, Camera, LightRig, LoopMode, Scene};
use tracing::{debug, info};

use crate::error::{RendererError, RendererResult};
use crate::options::RendererOptions;

/// Outcome of one playback tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStep {
    Idle,
    Playing,
    Finished,
}

#[derive(Debug, Default)]
pub struct Playback {
    mixer: AnimationMixer,
    pending: Option<(AnimationClip, LoopMode)>,
    blocks_raycast: bool,
}

impl Playback {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the configured clip, or the first one when none is named.
    /// Returns whether a clip was queued.
    pub fn initialize(&mut self, assets: &AssetManager, options: &RendererOptions) -> RendererResult<bool> {
        if !options.renderer.plays_animation {
            return Ok(false);
        }
        let clip = match &options.renderer.animation {
            Some(name) => assets
                .animation(name)
                .ok_or_else(|| RendererError::AnimationNotFound(name.clone()))?,
            None => match assets.first_animation() {
                Some(clip) => clip,
                None => return Ok(false),
            },
        };
        let loop_mode = if options.renderer.animation_loops {
            LoopMode::Repeat
        } else {
            LoopMode::Once
        };
        info!(clip = %clip.name, ?loop_mode, "Queued animation");
        self.pending = Some((clip.clone(), loop_mode));
        self.blocks_raycast = !options.enable_raycast_animation;
        Ok(true)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// A clip is running in the mixer.
    pub fn is_playing(&self) -> bool {
        self.mixer.is_playing()
    }

    /// Hit testing is suspended while a clip is queued or playing.
    pub fn blocks_raycast(&self) -> bool {
        self.blocks_raycast && (self.is_pending() || self.is_playing())
    }

    /// Render one frame off-screen so the first visible frame does not pay
    /// for lazy setup, then start the queued clip.
    pub fn prime<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        scene: &Scene,
        camera: &Camera,
        lights: &LightRig,
    ) -> RendererResult<()> {
        let Some((clip, loop_mode)) = self.pending.take() else {
            return Ok(());
        };
        let (width, height) = backend.size();
        let target = backend.create_render_target(width, height)?;
        let previous = backend.render_target();
        let rendered = backend
            .set_render_target(Some(target))
            .and_then(|_| backend.render(scene, camera, lights, None));
        let restored = backend.set_render_target(previous);
        backend.dispose_render_target(target);
        rendered?;
        restored?;
        debug!(clip = %clip.name, "Primed first animation frame");
        self.mixer.play(clip, loop_mode);
        Ok(())
    }

    /// Step the running clip by `dt_secs`.
    pub fn advance(&mut self, scene: &mut Scene, dt_secs: f32) -> PlaybackStep {
        if !self.mixer.is_playing() {
            return PlaybackStep::Idle;
        }
        if self.mixer.update(scene, dt_secs) {
            PlaybackStep::Playing
        } else {
            info!("Animation finished");
            PlaybackStep::Finished
        }
    }

    /// Drop the queued clip and stop the running one.
    pub fn stop(&mut self) {
        self.pending = None;
        self.mixer.stop();
    }
}
