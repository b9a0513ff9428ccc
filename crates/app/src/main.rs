//! RIPE client-side renderer - headless driver
//!
//! Loads a product model, applies a configuration and writes PNG snapshots
//! rendered by the software backend.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use tracing::{debug, info};

use ripe_core::{FrameKey, Timer, VIEW_FRAMES, View};
use ripe_renderer::{
    AnimateKind, ConfigState, Configurator, Event, Renderer, RendererOptions,
};
use ripe_resources::{AssetLocation, AssetManager, FileSource, ModelConfig};
use ripe_rhi::{RenderBackend, SoftwareBackend};

/// Milliseconds between simulated display refreshes.
const TICK_MS: f64 = 1000.0 / 60.0;

#[derive(Parser)]
#[command(name = "ripe-csr", version, about = "Headless RIPE configurator renderer")]
struct Cli {
    #[command(flatten)]
    model: ModelArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct ModelArgs {
    /// Directory asset URLs are resolved against
    #[arg(long, default_value = ".")]
    assets: PathBuf,

    #[arg(long, default_value = "ripe")]
    brand: String,

    #[arg(long, default_value = "model")]
    model: String,

    /// Model configuration (materials, initials) as JSON
    #[arg(long)]
    config: PathBuf,

    /// Mesh path relative to the assets directory
    #[arg(long)]
    mesh: String,

    /// Configurator state (`parts`, `initials`, `engraving`) as JSON
    #[arg(long)]
    parts: Option<PathBuf>,

    /// Renderer options as JSON
    #[arg(long)]
    options: Option<PathBuf>,

    /// Square viewport size in pixels
    #[arg(long, default_value_t = 512)]
    size: u32,

    /// Texture anisotropy level
    #[arg(long, default_value_t = 16)]
    max_anisotropy: u16,
}

#[derive(Subcommand)]
enum Command {
    /// Render one frame to a PNG file
    Render {
        #[arg(long, default_value = "side-0")]
        frame: FrameKey,

        #[arg(long, default_value = "out.png")]
        out: PathBuf,
    },
    /// Print the part under pixel (x, y)
    Pick {
        #[arg(long)]
        x: f32,

        #[arg(long)]
        y: f32,

        #[arg(long, default_value = "side-0")]
        frame: FrameKey,
    },
    /// Render every side frame into a directory
    Frames {
        #[arg(long, default_value = "frames")]
        out_dir: PathBuf,
    },
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("parsing {}", path.display()))
}

struct Session {
    configurator: Configurator<SoftwareBackend>,
    now_ms: f64,
    timer: Timer,
}

impl Session {
    fn open(args: &ModelArgs) -> Result<Self> {
        let config = ModelConfig::from_path(&args.config)
            .with_context(|| format!("loading model config {}", args.config.display()))?;
        let mut options: RendererOptions = match &args.options {
            Some(path) => read_json(path)?,
            None => RendererOptions::default(),
        };
        // Frames are shown immediately and the intro clip is skipped.
        options.view_animate = AnimateKind::None;
        options.position_animate = AnimateKind::None;
        options.renderer.plays_animation = false;

        let state: ConfigState = match &args.parts {
            Some(path) => read_json(path)?,
            None => ConfigState::default(),
        };

        let mut timer = Timer::new();
        let location = AssetLocation::new("", &args.brand, &args.model).with_model_path(&args.mesh);
        let assets = AssetManager::new(location, config, FileSource::new(&args.assets))
            .with_max_anisotropy(args.max_anisotropy);
        let backend = SoftwareBackend::new(args.size, args.size).context("creating backend")?;
        let mut configurator = Configurator::new(Renderer::new(backend, assets, options));
        configurator
            .load(&state)
            .with_context(|| format!("loading {}", args.mesh))?;
        info!(
            mesh = %args.mesh,
            parts = state.parts.len(),
            ms = timer.lap_ms(),
            "Model loaded"
        );

        let mut session = Self {
            configurator,
            now_ms: 0.0,
            timer,
        };
        session.tick()?;
        Ok(session)
    }

    fn tick(&mut self) -> Result<bool> {
        let drawn = self.configurator.frame(self.now_ms)?;
        self.now_ms += TICK_MS;
        for event in self.configurator.drain_events() {
            debug!(?event, "Event");
        }
        Ok(drawn)
    }

    fn show(&mut self, frame: FrameKey) -> Result<()> {
        self.configurator
            .renderer_mut()
            .change_frame_rotation(frame)
            .with_context(|| format!("changing frame to {frame}"))?;
        self.tick()?;
        Ok(())
    }

    fn save(&mut self, path: &Path) -> Result<()> {
        let image = self.configurator.renderer().backend().snapshot(None)?;
        image
            .save(path)
            .with_context(|| format!("writing {}", path.display()))?;
        info!(path = %path.display(), ms = self.timer.lap_ms(), "Snapshot written");
        Ok(())
    }

    fn pick(&mut self, x: f32, y: f32) -> Result<Option<String>> {
        self.configurator.renderer_mut().click(x, y);
        let drawn = self.configurator.frame(self.now_ms)?;
        debug!(drawn, "Pick frame");
        let part = self.configurator.drain_events().find_map(|event| match event {
            Event::Selected(part) => Some(part),
            _ => None,
        });
        Ok(part)
    }
}

fn main() -> Result<()> {
    ripe_core::init_logging();
    let cli = Cli::parse();
    info!("Starting RIPE renderer");

    let mut session = Session::open(&cli.model)?;
    match cli.command {
        Command::Render { frame, out } => {
            session.show(frame)?;
            session.save(&out)?;
        }
        Command::Pick { x, y, frame } => {
            let size = cli.model.size as f32;
            if !(0.0..size).contains(&x) || !(0.0..size).contains(&y) {
                bail!("({x}, {y}) lies outside the {size}px viewport");
            }
            session.show(frame)?;
            match session.pick(x, y)? {
                Some(part) => println!("{part}"),
                None => println!("none"),
            }
        }
        Command::Frames { out_dir } => {
            std::fs::create_dir_all(&out_dir)
                .with_context(|| format!("creating {}", out_dir.display()))?;
            for position in 0..VIEW_FRAMES {
                let frame = FrameKey::new(View::Side, position);
                session.show(frame)?;
                session.save(&out_dir.join(format!("{frame}.png")))?;
            }
        }
    }

    info!(ms = session.timer.elapsed_ms(), "Done");
    Ok(())
}
