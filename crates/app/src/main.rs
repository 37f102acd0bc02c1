use std::{
    path::{Path, PathBuf},
    thread,
    time::Duration,
};

use clap::{Args, Parser, Subcommand};
use clip_sequencer_core::{
    AnimationMixer, AssetStore, EntityId, FrameClock, HookRegistry, RenderLoop, Renderer,
    SceneInstance, Sequencer, SequencerError, SoundBank, StageConfig,
};
use tracing_subscriber::EnvFilter;

fn main() -> clip_sequencer_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Play(args) => run_play(args),
        Commands::Validate { config } => run_validate(&config),
    }
}

type Stage = Sequencer<AnimationMixer, SoundBank>;

fn run_play(args: PlayArgs) -> clip_sequencer_core::Result<()> {
    tracing::info!(config = ?args.config, "loading stage");
    let config = StageConfig::from_path(&args.config)?;
    let base_dir = args.config.parent().unwrap_or_else(|| Path::new("."));

    let hooks = HookRegistry::with_builtins();
    let mut sequencer: Stage = Sequencer::from_config(&config, &hooks, SoundBank::new())?;
    let mut scene = SceneInstance::from_config(&config)?;

    if config.autoplay && !args.no_autoplay {
        sequencer.play();
    }

    load_sounds(&config, base_dir, &mut sequencer)?;
    load_entities(&config, &mut scene, &mut sequencer)?;

    let mut frame_loop = RenderLoop::new(HeadlessRenderer::default(), scene);
    frame_loop.set_frame_hook(|info| {
        for step in &info.transitions {
            tracing::info!(
                entity = %step.entity,
                step = step.step,
                clip = step.clip,
                transition = step.transition,
                at = ?info.elapsed,
                "step started"
            );
        }
    });

    let total = Duration::try_from_secs_f32(args.seconds)
        .map_err(|err| SequencerError::msg(format!("invalid --seconds: {err}")))?;
    let frame = Duration::from_secs_f64(1.0 / f64::from(args.fps));
    let mut toggles = args
        .toggle_at
        .iter()
        .map(|at| Duration::try_from_secs_f32(*at))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| SequencerError::msg(format!("invalid --toggle-at: {err}")))?;
    toggles.sort();
    let mut toggles = toggles.into_iter().peekable();

    let mut clock = FrameClock::start();
    while frame_loop.elapsed() < total {
        while toggles.next_if(|at| *at <= frame_loop.elapsed()).is_some() {
            sequencer.toggle();
            tracing::info!(running = sequencer.is_running(), at = ?frame_loop.elapsed(), "toggled");
        }

        let delta = if args.realtime {
            thread::sleep(frame);
            clock.delta()
        } else {
            frame
        };
        frame_loop.frame(delta, &mut sequencer);
    }

    tracing::info!(
        frames = frame_loop.frames(),
        elapsed = ?frame_loop.elapsed(),
        running = sequencer.is_running(),
        "playback finished"
    );
    Ok(())
}

fn run_validate(path: &Path) -> clip_sequencer_core::Result<()> {
    let config = StageConfig::from_path(path)?;
    let sequencer: Stage =
        Sequencer::from_config(&config, &HookRegistry::with_builtins(), SoundBank::new())?;

    for entity in sequencer.entities() {
        tracing::info!(
            entity = %entity.id(),
            asset = entity.asset(),
            steps = entity.sequence().len(),
            cues = ?entity.sequence().start_cues(),
            "entity"
        );
    }
    tracing::info!(
        entities = sequencer.entities().len(),
        cues = sequencer.sounds().len(),
        "stage is valid"
    );
    Ok(())
}

/// Stands in for the audio loader: a cue loads when its file exists next to
/// the stage file or when the stage declares its length.
fn load_sounds(
    config: &StageConfig,
    base_dir: &Path,
    sequencer: &mut Stage,
) -> clip_sequencer_core::Result<()> {
    let sounds = sequencer.sounds_mut();
    for (name, source) in sounds.loading() {
        let declared = config.sounds.get(&name).and_then(|sound| sound.length);
        let path = base_dir.join(&source);
        if declared.is_some() || path.exists() {
            sounds.finish_loading(&name, declared)?;
        } else {
            sounds.fail_loading(&name, format!("{} not found", path.display()))?;
        }
    }
    Ok(())
}

/// Stands in for the model loader, using the manifests in the stage file.
fn load_entities(
    config: &StageConfig,
    scene: &mut SceneInstance,
    sequencer: &mut Stage,
) -> clip_sequencer_core::Result<()> {
    let assets = AssetStore::from_manifests(&config.models);
    for (index, entity) in config.entities.iter().enumerate() {
        let id = EntityId(index);
        match assets.resolve_entity_asset(entity) {
            Ok(model) => {
                match sequencer.attach_entity(id, AnimationMixer::new(model.clips.clone())) {
                    Ok(()) => {
                        scene.add_entity(entity);
                    }
                    Err(err) => {
                        tracing::warn!(entity = %id, asset = %entity.asset, error = %err, "entity left out of the scene");
                    }
                }
            }
            Err(err) => sequencer.fail_entity(id, err)?,
        }
    }
    Ok(())
}

#[derive(Debug, Default)]
struct HeadlessRenderer {
    width: u32,
    height: u32,
    draws: u64,
}

impl Renderer for HeadlessRenderer {
    fn set_size(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    fn render(&mut self, scene: &SceneInstance) {
        self.draws += 1;
        tracing::trace!(
            draws = self.draws,
            nodes = scene.nodes.len(),
            width = self.width,
            height = self.height,
            "draw"
        );
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Sequences animation clips and sound cues", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Play a stage headless, logging every step transition.
    Play(PlayArgs),
    /// Parse and validate a stage file.
    Validate {
        /// Path to the stage file.
        config: PathBuf,
    },
}

#[derive(Args, Debug)]
struct PlayArgs {
    /// Path to the stage file.
    config: PathBuf,
    /// How long to play, in seconds.
    #[arg(long, default_value_t = 30.0)]
    seconds: f32,
    /// Frames per second of the simulated render loop.
    #[arg(long, default_value_t = 60, value_parser = clap::value_parser!(u32).range(1..))]
    fps: u32,
    /// Toggle playback at this time, in seconds. May be repeated.
    #[arg(long = "toggle-at")]
    toggle_at: Vec<f32>,
    /// Pace frames against the wall clock instead of stepping virtual time.
    #[arg(long)]
    realtime: bool,
    /// Start stopped even when the stage enables autoplay.
    #[arg(long)]
    no_autoplay: bool,
}
