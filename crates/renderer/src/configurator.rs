//! The configurator facade.
//!
//! Binds owner state (selected parts, initials) to renderer operations and
//! skips updates whose visible outcome would not change.

use ripe_core::{CancelToken, FrameKey};
use ripe_resources::PartsSelection;
use ripe_rhi::RenderBackend;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::RendererResult;
use crate::renderer::Renderer;
use crate::state::Event;

/// Product state owned by the surrounding application.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConfigState {
    pub parts: PartsSelection,
    pub initials: Option<String>,
    pub engraving: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UpdateOptions {
    /// Crossfade into the new materials
    pub animate: bool,
    /// Apply even when nothing changed
    pub force: bool,
    pub format: String,
    pub background: Option<String>,
}

impl Default for UpdateOptions {
    fn default() -> Self {
        Self {
            animate: true,
            force: false,
            format: "png".to_string(),
            background: None,
        }
    }
}

/// What the last applied update looked like, split so an initials-only
/// change leaves the materials alone.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Signature {
    parts: String,
    initials: String,
}

/// Owner-facing entry point wrapping a [`Renderer`].
pub struct Configurator<B: RenderBackend> {
    renderer: Renderer<B>,
    signature: Option<Signature>,
    cancel: CancelToken,
}

impl<B: RenderBackend> Configurator<B> {
    /// Wrap `renderer`, sharing its asset cancel token.
    pub fn new(renderer: Renderer<B>) -> Self {
        let cancel = renderer.assets().cancel_token();
        Self {
            renderer,
            signature: None,
            cancel,
        }
    }

    /// Load the model with the initial `state`.
    pub fn load(&mut self, state: &ConfigState) -> RendererResult<()> {
        self.renderer.initialize(&state.parts)?;
        if let Some(text) = &state.initials {
            self.renderer.update_initials(text, state.engraving.as_deref())?;
        }
        Ok(())
    }

    fn signature(&self, state: &ConfigState, options: &UpdateOptions) -> Signature {
        let (width, height) = self.renderer.backend().size();
        Signature {
            parts: format!(
                "{}&size={width}x{height}&format={}&background={}&frame={}",
                state.parts.query(),
                options.format,
                options.background.as_deref().unwrap_or_default(),
                self.renderer.frame_key(),
            ),
            initials: format!(
                "initials={}&engraving={}",
                state.initials.as_deref().unwrap_or_default(),
                state.engraving.as_deref().unwrap_or_default(),
            ),
        }
    }

    /// Bring the model in line with `state`. Returns false when nothing
    /// was loaded yet or the state is unchanged.
    pub fn update(&mut self, state: &ConfigState, options: &UpdateOptions) -> RendererResult<bool> {
        if !self.renderer.is_ready() {
            self.renderer.emit(Event::NotLoaded);
            return Ok(false);
        }
        let signature = self.signature(state, options);
        let previous = self.signature.as_ref().filter(|_| !options.force);
        let parts_changed = previous.is_none_or(|p| p.parts != signature.parts);
        let initials_changed = previous.is_none_or(|p| p.initials != signature.initials);
        if !parts_changed && !initials_changed {
            debug!("Update skipped, state unchanged");
            return Ok(false);
        }

        if parts_changed {
            self.renderer.set_parts(&state.parts, options.animate)?;
        }
        if initials_changed && let Some(text) = &state.initials {
            self.renderer.update_initials(text, state.engraving.as_deref())?;
        }
        info!(
            parts = state.parts.len(),
            parts_changed,
            initials_changed,
            animate = options.animate,
            "Configurator updated"
        );
        self.signature = Some(signature);
        Ok(true)
    }

    /// Show the frame written as `"{view}-{position}"`.
    pub fn change_frame(&mut self, frame: &str) -> RendererResult<bool> {
        let frame: FrameKey = frame.parse()?;
        if !self.renderer.is_ready() {
            self.renderer.emit(Event::NotLoaded);
            return Ok(false);
        }
        self.renderer.change_frame_rotation(frame)
    }

    /// Highlight `part`. False when masks are off or the part has no
    /// meshes.
    pub fn highlight(&mut self, part: &str) -> bool {
        self.renderer.highlight_part(part)
    }

    /// Restore every base color.
    pub fn lowlight(&mut self) {
        self.renderer.lowlight();
    }

    /// Allow highlights again.
    pub fn enable_masks(&mut self) {
        self.renderer.set_masks(true);
    }

    /// Lowlight and refuse further highlights.
    pub fn disable_masks(&mut self) {
        self.renderer.set_masks(false);
    }

    /// Resize the screen. The next update is never skipped.
    pub fn resize(&mut self, width: u32, height: u32) -> RendererResult<()> {
        self.renderer.update_size(width, height)
    }

    /// Token that aborts in-flight loads when cancelled from elsewhere.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Abort pending loads and release everything loaded so far.
    pub fn cancel(&mut self) {
        self.cancel.cancel();
        self.renderer.dispose_resources();
        self.signature = None;
    }

    /// Run one display refresh. See [`Renderer::frame`].
    pub fn frame(&mut self, now_ms: f64) -> RendererResult<bool> {
        self.renderer.frame(now_ms)
    }

    /// Take the queued renderer events.
    pub fn drain_events(&mut self) -> impl Iterator<Item = Event> + '_ {
        self.renderer.drain_events()
    }

    pub fn renderer(&self) -> &Renderer<B> {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut Renderer<B> {
        &mut self.renderer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::RendererOptions;
    use ripe_resources::{AssetLocation, AssetManager, MemorySource, ModelConfig, ResourceError};
    use ripe_rhi::SoftwareBackend;

    const SHOE: &[u8] = include_bytes!("../../resources/tests/data/shoe.gltf");
    const CONFIG: &str = r##"{ "assets": { "materials": {
        "side": { "nappa": { "black": { "color": "#202020" }, "white": { "color": "#f0f0f0" } } },
        "sole": { "default": { "color": "#808080" } }
    } } }"##;

    fn configurator() -> Configurator<SoftwareBackend> {
        let location = AssetLocation::new("mem://", "swear", "vyner").with_model_path("shoe.gltf");
        let assets = AssetManager::new(
            location,
            ModelConfig::from_json(CONFIG.as_bytes()).unwrap(),
            MemorySource::new().with_file("mem://shoe.gltf", SHOE),
        );
        let mut options = RendererOptions::default();
        options.renderer.plays_animation = false;
        let renderer = Renderer::new(SoftwareBackend::new(32, 32).unwrap(), assets, options);
        Configurator::new(renderer)
    }

    fn state(color: &str) -> ConfigState {
        ConfigState {
            parts: PartsSelection::new().with("side", "nappa", color),
            ..Default::default()
        }
    }

    #[test]
    fn test_update_before_load_reports_not_loaded() {
        let mut configurator = configurator();
        assert!(!configurator.update(&state("black"), &UpdateOptions::default()).unwrap());
        let events: Vec<_> = configurator.drain_events().collect();
        assert_eq!(events, vec![Event::NotLoaded]);
    }

    #[test]
    fn test_unchanged_update_is_skipped_unless_forced() {
        let mut configurator = configurator();
        configurator.load(&state("black")).unwrap();
        let options = UpdateOptions {
            animate: false,
            ..Default::default()
        };
        assert!(configurator.update(&state("white"), &options).unwrap());
        assert!(!configurator.update(&state("white"), &options).unwrap());
        let forced = UpdateOptions {
            force: true,
            ..options.clone()
        };
        assert!(configurator.update(&state("white"), &forced).unwrap());
        let other_format = UpdateOptions {
            format: "jpeg".to_string(),
            ..options
        };
        assert!(configurator.update(&state("white"), &other_format).unwrap());
    }

    #[test]
    fn test_initials_only_change_keeps_materials() {
        let mut configurator = configurator();
        configurator.load(&state("black")).unwrap();
        assert!(configurator.update(&state("white"), &UpdateOptions::default()).unwrap());
        configurator.frame(0.0).unwrap();
        configurator.frame(1000.0).unwrap();
        assert!(configurator.renderer().transition_state().is_idle());

        let engraved = ConfigState {
            initials: Some("AB".to_string()),
            ..state("white")
        };
        assert!(configurator.update(&engraved, &UpdateOptions::default()).unwrap());
        assert!(
            configurator.renderer().transition_state().is_idle(),
            "no crossfade for an initials change"
        );
        assert!(!configurator.update(&engraved, &UpdateOptions::default()).unwrap());
    }

    #[test]
    fn test_change_frame_validates_key() {
        let mut configurator = configurator();
        configurator.load(&state("black")).unwrap();
        assert!(configurator.change_frame("side").is_err());
        assert!(configurator.change_frame("front-3").is_err());
        assert!(configurator.change_frame("side-3").unwrap());
        assert!(
            configurator
                .drain_events()
                .any(|e| e == Event::ChangedFrame(FrameKey::new(ripe_core::View::Side, 3)))
        );
    }

    #[test]
    fn test_masks_toggle_and_resize() {
        let mut configurator = configurator();
        configurator.load(&state("black")).unwrap();
        configurator.disable_masks();
        assert!(!configurator.highlight("side"));
        configurator.enable_masks();
        assert!(configurator.highlight("side"));
        configurator.lowlight();
        assert_eq!(configurator.renderer().highlighted(), None);

        let options = UpdateOptions {
            animate: false,
            ..Default::default()
        };
        assert!(configurator.update(&state("black"), &options).unwrap());
        assert!(!configurator.update(&state("black"), &options).unwrap());
        configurator.resize(64, 48).unwrap();
        assert_eq!(configurator.renderer().backend().size(), (64, 48));
        assert!(
            configurator.update(&state("black"), &options).unwrap(),
            "a new size changes the signature"
        );
    }

    #[test]
    fn test_state_from_json() {
        let state: ConfigState = serde_json::from_str(
            r#"{"parts": {"side": {"material": "nappa", "color": "white"}}, "initials": "AB"}"#,
        )
        .unwrap();
        assert_eq!(state.parts.get("side").unwrap().color, "white");
        assert_eq!(state.initials.as_deref(), Some("AB"));
        assert!(state.engraving.is_none());
    }

    #[test]
    fn test_cancel_aborts_later_loads() {
        let mut configurator = configurator();
        configurator.cancel();
        let err = configurator.load(&state("black")).unwrap_err();
        assert!(matches!(
            err,
            crate::RendererError::Resource(ResourceError::Cancelled)
        ));
    }
}
