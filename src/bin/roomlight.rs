use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use roomlight::{
    Container, FileBackend, FixedColorScheme, FrameRgba, MemoryBackend, Millis, OsColorScheme,
    RoomConfig, ThemeMode, ThemePreferenceStore, ThemeRuntime, Viewport, ambient::ParticleField,
};

#[derive(Parser, Debug)]
#[command(name = "roomlight", version)]
struct Cli {
    /// Runtime config JSON (timing, walk path, frame interval, viewport, preference file).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a toggle scenario and print the timeline journal as JSON.
    Simulate(SimulateArgs),
    /// Render the room at a virtual time as a PNG.
    Frame(FrameArgs),
    /// Render the background particle field as a PNG.
    Ambient(AmbientArgs),
    /// Inspect or change the persisted theme preference.
    Theme {
        #[command(subcommand)]
        cmd: ThemeCommand,
    },
}

#[derive(Parser, Debug)]
struct ScenarioArgs {
    /// Virtual times (ms) at which the toggle is pressed.
    #[arg(long = "toggle-at", value_delimiter = ',')]
    toggle_at: Vec<u64>,

    /// Answer for the system color-scheme query instead of asking the OS.
    #[arg(long, value_enum)]
    system: Option<SystemScheme>,
}

#[derive(Parser, Debug)]
struct SimulateArgs {
    #[command(flatten)]
    scenario: ScenarioArgs,

    /// Virtual time (ms) to run until.
    #[arg(long, default_value_t = 4000)]
    until: u64,

    /// Run without a mounted room (controller only).
    #[arg(long)]
    headless: bool,
}

#[derive(Parser, Debug)]
struct FrameArgs {
    #[command(flatten)]
    scenario: ScenarioArgs,

    /// Virtual time (ms) of the captured frame.
    #[arg(long)]
    at: u64,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct AmbientArgs {
    #[arg(long, value_enum, default_value_t = ThemeArg::Dark)]
    theme: ThemeArg,

    #[arg(long, default_value_t = 640)]
    width: u32,

    #[arg(long, default_value_t = 360)]
    height: u32,

    /// Frames of spin before the capture.
    #[arg(long, default_value_t = 60)]
    frames: u64,

    #[arg(long, default_value_t = roomlight::ambient::DEFAULT_PARTICLES)]
    particles: usize,

    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Subcommand, Debug)]
enum ThemeCommand {
    /// Print the theme a fresh start would use.
    Show {
        #[arg(long, value_enum)]
        system: Option<SystemScheme>,
    },
    /// Persist a theme choice.
    Set {
        #[arg(value_enum)]
        theme: ThemeArg,
    },
    /// Forget the persisted choice.
    Reset,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SystemScheme {
    Light,
    Dark,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ThemeArg {
    Light,
    Dark,
}

impl From<ThemeArg> for ThemeMode {
    fn from(t: ThemeArg) -> Self {
        match t {
            ThemeArg::Light => ThemeMode::Light,
            ThemeArg::Dark => ThemeMode::Dark,
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = load_config(cli.config.as_deref())?;
    match cli.cmd {
        Command::Simulate(args) => cmd_simulate(&cfg, args),
        Command::Frame(args) => cmd_frame(&cfg, args),
        Command::Ambient(args) => cmd_ambient(&cfg, args),
        Command::Theme { cmd } => cmd_theme(&cfg, cmd),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<RoomConfig> {
    let Some(path) = path else {
        return Ok(RoomConfig::default());
    };
    RoomConfig::from_json_path(path).with_context(|| format!("load config '{}'", path.display()))
}

fn open_store(cfg: &RoomConfig, system: Option<SystemScheme>) -> ThemePreferenceStore {
    match (&cfg.preference_path, system) {
        (Some(p), Some(s)) => {
            ThemePreferenceStore::new(FileBackend::new(p), FixedColorScheme(matches!(s, SystemScheme::Dark)))
        }
        (Some(p), None) => ThemePreferenceStore::new(FileBackend::new(p), OsColorScheme),
        (None, Some(s)) => {
            ThemePreferenceStore::new(MemoryBackend::new(), FixedColorScheme(matches!(s, SystemScheme::Dark)))
        }
        (None, None) => ThemePreferenceStore::new(MemoryBackend::new(), OsColorScheme),
    }
}

fn room_container(cfg: &RoomConfig) -> Container {
    Container::new("theme-toggle-room", cfg.viewport)
}

fn run_scenario(
    cfg: &RoomConfig,
    scenario: &ScenarioArgs,
    until: u64,
    mount: bool,
) -> anyhow::Result<ThemeRuntime> {
    let store = open_store(cfg, scenario.system);
    let mut rt = ThemeRuntime::new(cfg, store).context("build runtime")?;
    if mount {
        rt.mount_room(room_container(cfg)).context("mount room")?;
    }
    let mut presses = scenario.toggle_at.clone();
    presses.sort_unstable();
    for at in presses.into_iter().filter(|t| *t <= until) {
        rt.run_until(Millis(at))?;
        rt.press_toggle();
    }
    rt.run_until(Millis(until))?;
    Ok(rt)
}

fn cmd_simulate(cfg: &RoomConfig, args: SimulateArgs) -> anyhow::Result<()> {
    let mut rt = run_scenario(cfg, &args.scenario, args.until, !args.headless)?;
    let report = serde_json::json!({
        "final": rt.snapshot(),
        "frames": rt.frames_served(),
        "excursions": rt.actor().completed_excursions,
        "timeline": rt.journal(),
    });
    rt.shutdown();
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn write_png(path: &Path, frame: FrameRgba) -> anyhow::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    let frame = frame.unpremultiplied();
    image::save_buffer_with_format(
        path,
        &frame.data,
        frame.width,
        frame.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", path.display()))?;
    eprintln!("wrote {}", path.display());
    Ok(())
}

fn cmd_frame(cfg: &RoomConfig, args: FrameArgs) -> anyhow::Result<()> {
    let mut rt = run_scenario(cfg, &args.scenario, args.at, true)?;
    let frame = rt.frame_pixels().context("render room")?;
    rt.shutdown();
    write_png(&args.out, frame)
}

fn cmd_ambient(cfg: &RoomConfig, args: AmbientArgs) -> anyhow::Result<()> {
    let bounds = Viewport::new(args.width, args.height)?;
    let frame = roomlight::ambient::render_still(
        &Container::new("background", bounds),
        ParticleField::new(args.particles, args.seed),
        args.theme.into(),
        args.frames,
        cfg.frame_interval(),
    )
    .context("render particle field")?;
    write_png(&args.out, frame)
}

fn cmd_theme(cfg: &RoomConfig, cmd: ThemeCommand) -> anyhow::Result<()> {
    if cfg.preference_path.is_none() && !matches!(cmd, ThemeCommand::Show { .. }) {
        anyhow::bail!("no preference_path configured; pass --config with a preference file");
    }
    match cmd {
        ThemeCommand::Show { system } => {
            let store = open_store(cfg, system);
            let stored = store.load();
            println!(
                "{}",
                serde_json::json!({
                    "stored": stored,
                    "resolved": store.resolve_initial(),
                })
            );
        }
        ThemeCommand::Set { theme } => {
            let mut store = open_store(cfg, Some(SystemScheme::Light));
            let mode = ThemeMode::from(theme);
            store.save(mode);
            if store.load() != Some(mode) {
                anyhow::bail!("preference file could not be written");
            }
            println!("{mode}");
        }
        ThemeCommand::Reset => {
            let mut store = open_store(cfg, Some(SystemScheme::Light));
            store.clear();
            println!("cleared");
        }
    }
    Ok(())
}
