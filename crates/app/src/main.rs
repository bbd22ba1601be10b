mod console;
mod settings;

use std::{io, path::PathBuf, sync::Arc};

use clap::{Parser, Subcommand};
use phosphor_core::{
    EffectChannel, EffectLevel, EngineLogLevel, MpvProcessFactory, PlayerConfig, Preset,
    ShaderDirectory,
};
use tracing_subscriber::EnvFilter;

use crate::{
    console::{Console, ConsoleReporter, HELP},
    settings::SettingsStore,
};

fn main() -> phosphor_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Play(args) => run_play(args),
        Commands::Shaders { dir } => run_shaders(dir),
        Commands::Settings { reset } => run_settings(reset),
    }
}

fn run_play(args: PlayArgs) -> phosphor_core::Result<()> {
    let mut store = SettingsStore::open_default();
    store.update(|settings| {
        if let Some(preset) = args.preset {
            if let Some(flags) = preset.flags() {
                settings.apply_flags(flags);
            }
        }
        for (channel, on) in [
            (EffectChannel::Crt, args.crt),
            (EffectChannel::Scanlines, args.scanlines),
            (EffectChannel::Vhs, args.vhs),
        ] {
            if on {
                settings.set_enabled(channel, true);
            }
        }
        for (channel, level) in [
            (EffectChannel::Crt, args.crt_level),
            (EffectChannel::Scanlines, args.scanlines_level),
            (EffectChannel::Vhs, args.vhs_level),
        ] {
            if let Some(level) = level {
                settings.set_level(channel, EffectLevel::new(level));
            }
        }
        if args.retro_audio {
            settings.audio_cb = true;
        }
    });

    let config = PlayerConfig {
        window: args.wid,
        on_screen_controller: !args.no_osc,
        hardware_decoding: args.hwdec,
        engine_log_level: args.engine_log,
        engine_program: args.mpv.clone(),
        ..PlayerConfig::default()
    };
    tracing::info!(file = %args.file.display(), ?config, "starting playback");

    let factory = Arc::new(MpvProcessFactory::new(args.mpv));
    let resolver = Arc::new(ShaderDirectory::bundled());
    let mut console = Console::new(config, factory, resolver, Arc::new(ConsoleReporter), store);

    console.open(&args.file)?;
    println!("{HELP}");
    console.run(io::stdin().lock())
}

fn run_shaders(dir: Option<PathBuf>) -> phosphor_core::Result<()> {
    let shaders = match dir {
        Some(dir) => ShaderDirectory::new(dir),
        None => ShaderDirectory::bundled(),
    };
    println!("shader directory: {}", shaders.root().display());
    for channel in EffectChannel::ALL {
        let levels: Vec<String> = shaders
            .available_levels(channel)
            .into_iter()
            .map(|level| level.to_string())
            .collect();
        if levels.is_empty() {
            println!("  {:<10} (none)", channel.key());
        } else {
            println!("  {:<10} {}", channel.key(), levels.join(" "));
        }
    }
    Ok(())
}

fn run_settings(reset: bool) -> phosphor_core::Result<()> {
    let mut store = SettingsStore::open_default();
    if reset {
        store.reset();
        tracing::info!("settings reset");
    }
    if let Some(path) = store.path() {
        println!("# {}", path.display());
    }
    println!("{}", serde_json::to_string_pretty(store.get())?);
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Retro video player with CRT, scanline and VHS effects", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Play a video and read effect commands from stdin.
    Play(PlayArgs),
    /// List the shader levels available for each effect.
    Shaders {
        /// Shader directory to inspect instead of the bundled one.
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Print the persisted settings.
    Settings {
        /// Restore the defaults before printing.
        #[arg(long)]
        reset: bool,
    },
}

#[derive(clap::Args, Debug)]
struct PlayArgs {
    /// Video file to open.
    file: PathBuf,
    /// Enable the CRT frame effect.
    #[arg(long)]
    crt: bool,
    /// Enable the scanline effect.
    #[arg(long)]
    scanlines: bool,
    /// Enable the VHS noise effect.
    #[arg(long)]
    vhs: bool,
    #[arg(long, allow_hyphen_values = true, value_name = "N")]
    crt_level: Option<i32>,
    #[arg(long, allow_hyphen_values = true, value_name = "N")]
    scanlines_level: Option<i32>,
    #[arg(long, allow_hyphen_values = true, value_name = "N")]
    vhs_level: Option<i32>,
    /// Start from a named preset: clean, 80s-tv or vhs-later.
    #[arg(long, value_name = "NAME")]
    preset: Option<Preset>,
    /// Apply the retro audio filter chain.
    #[arg(long)]
    retro_audio: bool,
    /// Native window id to render into.
    #[arg(long, value_name = "N")]
    wid: Option<u64>,
    /// Hide mpv's on-screen controller.
    #[arg(long)]
    no_osc: bool,
    /// Use hardware decoding.
    #[arg(long)]
    hwdec: bool,
    /// Verbosity of mpv's own log messages.
    #[arg(long, value_name = "LEVEL", default_value = "warn")]
    engine_log: EngineLogLevel,
    /// mpv executable to launch.
    #[arg(long, value_name = "PATH", default_value = "mpv")]
    mpv: PathBuf,
}
