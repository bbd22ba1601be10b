//! Boundary to the external media engine.
//!
//! Everything the player needs from an engine is expressed by
//! [`MediaEngine`]; construction goes through an [`EngineFactory`] so tests
//! and alternative backends can stand in for the real process.

mod mpv;

use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
};

use serde::{Deserialize, Serialize};

use crate::{audio::AudioFilterSpec, PhosphorError, Result};

pub use mpv::MpvProcessFactory;

/// Property the player observes to learn that a loaded file is ready.
pub const FILE_READY_PROPERTY: &str = "file-loaded";

/// Callback invoked from the engine's own thread when an observed flag changes.
pub type FlagObserver = Arc<dyn Fn(bool) + Send + Sync>;

/// A live engine instance. Every call is independently fallible.
pub trait MediaEngine: Send + Sync {
    /// Replaces whatever is playing with `path`.
    fn replace_media(&self, path: &Path) -> Result<()>;

    fn set_paused(&self, paused: bool) -> Result<()>;

    /// Replaces the active shader list. An empty slice clears it.
    fn set_shader_chain(&self, shaders: &[PathBuf]) -> Result<()>;

    /// Registers `observer` for `property`, replacing any previous observer.
    fn observe(&self, property: &str, observer: FlagObserver) -> Result<()>;

    fn unobserve(&self, property: &str) -> Result<()>;

    fn shutdown(&self) -> Result<()>;
}

/// Builds engine instances from a fixed option set.
pub trait EngineFactory: Send + Sync {
    /// Either returns a fully constructed engine or fails without leaving
    /// anything running.
    fn create(&self, options: &EngineOptions) -> Result<Arc<dyn MediaEngine>>;
}

/// Where the engine renders video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputMode {
    /// Render into an existing native window.
    Embedded { window: u64 },
    /// Let the engine open its own window.
    Standalone,
}

impl OutputMode {
    pub fn for_window(window: Option<u64>) -> Self {
        match window {
            Some(window) => Self::Embedded { window },
            None => Self::Standalone,
        }
    }
}

/// Input handling the engine performs on its own window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputBindings {
    pub builtin: bool,
    pub default: bool,
    pub vo_keyboard: bool,
}

impl Default for InputBindings {
    fn default() -> Self {
        Self {
            builtin: true,
            default: true,
            vo_keyboard: true,
        }
    }
}

/// Verbosity of messages the engine forwards to the log sink.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineLogLevel {
    Fatal,
    Error,
    #[default]
    Warn,
    Info,
    Debug,
    Trace,
}

impl EngineLogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fatal => "fatal",
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

impl fmt::Display for EngineLogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngineLogLevel {
    type Err = PhosphorError;

    fn from_str(s: &str) -> Result<Self> {
        const ALL: [EngineLogLevel; 6] = [
            EngineLogLevel::Fatal,
            EngineLogLevel::Error,
            EngineLogLevel::Warn,
            EngineLogLevel::Info,
            EngineLogLevel::Debug,
            EngineLogLevel::Trace,
        ];
        let wanted = s.trim().to_ascii_lowercase();
        ALL.into_iter()
            .find(|level| level.as_str() == wanted)
            .ok_or_else(|| PhosphorError::msg(format!("unknown engine log level '{s}'")))
    }
}

/// Construction-time options. None of these can change on a live engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    pub output: OutputMode,
    pub input: InputBindings,
    pub log_level: EngineLogLevel,
    pub on_screen_controller: bool,
    pub hardware_decoding: bool,
    pub keep_open: bool,
    pub start_paused: bool,
    pub audio_filter: Option<AudioFilterSpec>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            output: OutputMode::Standalone,
            input: InputBindings::default(),
            log_level: EngineLogLevel::Warn,
            on_screen_controller: true,
            hardware_decoding: false,
            keep_open: true,
            start_paused: true,
            audio_filter: None,
        }
    }
}

/// Log sink for engine messages. Everything lands under the `mpv` target.
pub fn forward_engine_log(level: &str, component: &str, message: &str) {
    let message = message.trim_end();
    match level {
        "fatal" | "error" => tracing::error!(target: "mpv", component, "{message}"),
        "warn" => tracing::warn!(target: "mpv", component, "{message}"),
        "info" => tracing::info!(target: "mpv", component, "{message}"),
        "v" | "debug" => tracing::debug!(target: "mpv", component, "{message}"),
        _ => tracing::trace!(target: "mpv", component, level, "{message}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_handle_selects_embedded_output() {
        assert_eq!(
            OutputMode::for_window(Some(42)),
            OutputMode::Embedded { window: 42 }
        );
        assert_eq!(OutputMode::for_window(None), OutputMode::Standalone);
    }

    #[test]
    fn default_options_start_paused_without_audio_filter() {
        let options = EngineOptions::default();
        assert!(options.start_paused);
        assert!(options.keep_open);
        assert!(options.audio_filter.is_none());
        assert_eq!(options.log_level.to_string(), "warn");
    }

    #[test]
    fn log_level_parses_case_insensitively() {
        assert_eq!("Debug".parse::<EngineLogLevel>().unwrap(), EngineLogLevel::Debug);
        assert_eq!(" fatal ".parse::<EngineLogLevel>().unwrap(), EngineLogLevel::Fatal);
        assert!("loud".parse::<EngineLogLevel>().is_err());
    }
}
