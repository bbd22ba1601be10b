//! Interactive command loop standing in for the desktop window.

use std::{
    io::BufRead,
    path::{Path, PathBuf},
    sync::Arc,
};

use phosphor_core::{
    EffectChannel, EffectLevel, EngineFactory, ErrorReporter, PhosphorError, PlaybackController,
    PlayerConfig, Preset, Result, ShaderAssetResolver,
};
use tracing::{debug, error, info, warn};

use crate::settings::SettingsStore;

/// Prints reports to stderr and records them in the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleReporter;

impl ErrorReporter for ConsoleReporter {
    fn report_error(&self, title: &str, message: &str) {
        error!(title, "{message}");
        eprintln!("{title}: {message}");
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    TogglePause,
    Enable(EffectChannel, bool),
    Level(EffectChannel, f32),
    Preset(Preset),
    RetroAudio(bool),
    Open(PathBuf),
    Status,
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  pause | p                      toggle pause
  crt|scanlines|vhs on|off       enable or disable an effect
  level <channel> <n>            set an effect level (-5..5)
  preset <name>                  clean, 80s-tv, vhs-later
  audio on|off                   retro audio for the next file
  open <file>                    play another file
  status                         show player state
  quit | q                       exit";

/// Parses one input line. Blank lines yield `None`.
pub fn parse_command(line: &str) -> Result<Option<Command>> {
    let line = line.trim();
    let Some((word, rest)) = split_word(line) else {
        return Ok(None);
    };

    let command = match word.to_ascii_lowercase().as_str() {
        "pause" | "p" => Command::TogglePause,
        "status" => Command::Status,
        "help" | "?" => Command::Help,
        "quit" | "q" | "exit" => Command::Quit,
        "audio" => Command::RetroAudio(parse_switch(rest)?),
        "preset" => Command::Preset(rest.parse()?),
        "open" => {
            if rest.is_empty() {
                return Err(PhosphorError::msg("open needs a file path"));
            }
            Command::Open(PathBuf::from(rest))
        }
        "level" => {
            let (channel, value) = split_word(rest)
                .ok_or_else(|| PhosphorError::msg("level needs a channel and a value"))?;
            let value: f32 = value
                .trim()
                .parse()
                .map_err(|_| PhosphorError::msg(format!("invalid level '{}'", value.trim())))?;
            Command::Level(channel.parse()?, value)
        }
        other => match other.parse::<EffectChannel>() {
            Ok(channel) => Command::Enable(channel, parse_switch(rest)?),
            Err(_) => return Err(PhosphorError::msg(format!("unknown command '{word}'"))),
        },
    };
    Ok(Some(command))
}

fn split_word(input: &str) -> Option<(&str, &str)> {
    let input = input.trim_start();
    if input.is_empty() {
        return None;
    }
    match input.split_once(char::is_whitespace) {
        Some((word, rest)) => Some((word, rest.trim())),
        None => Some((input, "")),
    }
}

fn parse_switch(value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "on" | "true" | "1" | "yes" => Ok(true),
        "off" | "false" | "0" | "no" => Ok(false),
        other => Err(PhosphorError::msg(format!("expected on or off, got '{other}'"))),
    }
}

/// One front-end session: the persisted settings and the current player.
pub struct Console {
    config: PlayerConfig,
    factory: Arc<dyn EngineFactory>,
    resolver: Arc<dyn ShaderAssetResolver>,
    reporter: Arc<dyn ErrorReporter>,
    store: SettingsStore,
    player: Option<Arc<PlaybackController>>,
}

impl Console {
    pub fn new(
        config: PlayerConfig,
        factory: Arc<dyn EngineFactory>,
        resolver: Arc<dyn ShaderAssetResolver>,
        reporter: Arc<dyn ErrorReporter>,
        store: SettingsStore,
    ) -> Self {
        Self {
            config,
            factory,
            resolver,
            reporter,
            store,
            player: None,
        }
    }

    /// Replaces the current player with a fresh one playing `file`.
    ///
    /// Saved enable flags go in before the load starts; saved levels follow it.
    pub fn open(&mut self, file: &Path) -> Result<()> {
        if let Some(previous) = self.player.take() {
            drop(previous.terminate());
        }

        let settings = self.store.get().clone();
        let config = PlayerConfig {
            retro_audio: settings.audio_cb,
            ..self.config.clone()
        };
        let player = Arc::new(PlaybackController::new(
            config,
            self.factory.clone(),
            self.resolver.clone(),
            self.reporter.clone(),
        )?);

        for channel in EffectChannel::ALL {
            player.set_effect_enabled(channel, settings.enabled(channel))?;
        }
        self.store.update(|settings| settings.remember_dir(file));

        info!(file = %file.display(), "opening");
        player.load_in_background(file)?;
        for channel in EffectChannel::ALL {
            player.set_shader_level(channel, settings.level(channel))?;
        }

        self.player = Some(player);
        Ok(())
    }

    /// Runs one command. Returns `false` once the session should end.
    pub fn execute(&mut self, command: Command) -> Result<bool> {
        debug!(?command, "console command");
        match command {
            Command::TogglePause => match self.player.as_ref().and_then(|p| p.toggle_pause()) {
                Some(true) => println!("paused"),
                Some(false) => println!("playing"),
                None => println!("nothing is playing"),
            },
            Command::Enable(channel, enabled) => {
                if let Some(player) = &self.player {
                    player.set_effect_enabled(channel, enabled)?;
                }
                self.store.update(|s| s.set_enabled(channel, enabled));
            }
            Command::Level(channel, value) => {
                let level = EffectLevel::from_slider(value);
                if let Some(player) = &self.player {
                    player.set_shader_level(channel, level)?;
                }
                self.store.update(|s| s.set_level(channel, level));
                println!("{channel} level {level}");
            }
            Command::Preset(preset) => {
                if let Some(flags) = preset.flags() {
                    if let Some(player) = &self.player {
                        player.apply_preset(preset)?;
                    }
                    self.store.update(|s| s.apply_flags(flags));
                }
                println!("preset {preset}");
            }
            Command::RetroAudio(enabled) => {
                if let Some(player) = &self.player {
                    player.enable_retro_audio(enabled);
                }
                self.store.update(|s| s.audio_cb = enabled);
                println!("retro audio {} (takes effect on the next file)", on_off(enabled));
            }
            Command::Open(file) => self.open(&file)?,
            Command::Status => self.print_status()?,
            Command::Help => println!("{HELP}"),
            Command::Quit => return Ok(false),
        }
        Ok(true)
    }

    /// Reads commands from `input` until it ends or the user quits.
    pub fn run(&mut self, input: impl BufRead) -> Result<()> {
        for line in input.lines() {
            let line = line?;
            let command = match parse_command(&line) {
                Ok(Some(command)) => command,
                Ok(None) => continue,
                Err(err) => {
                    eprintln!("{err}");
                    continue;
                }
            };
            match self.execute(command) {
                Ok(true) => {}
                Ok(false) => break,
                Err(err) => {
                    warn!(%err, "command failed");
                    eprintln!("{err}");
                }
            }
        }
        self.shutdown()
    }

    /// Tears the current player down and waits for it.
    pub fn shutdown(&mut self) -> Result<()> {
        if let Some(player) = self.player.take() {
            player.terminate().wait()?;
        }
        Ok(())
    }

    fn print_status(&self) -> Result<()> {
        let Some(player) = &self.player else {
            println!("no player");
            return Ok(());
        };
        let status = player.status()?;
        println!(
            "state: {:?}  loaded: {}  paused: {}  preset: {}  retro audio: {}",
            status.state, status.file_loaded, status.paused, status.preset, status.retro_audio
        );
        for channel in EffectChannel::ALL {
            println!(
                "  {:<10} {:<3} level {}",
                channel.key(),
                on_off(status.effects.is_enabled(channel)),
                status.effects.level(channel)
            );
        }
        Ok(())
    }
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}
