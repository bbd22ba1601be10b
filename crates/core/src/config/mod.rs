use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{
    audio::AudioFilterSpec,
    engine::{EngineLogLevel, EngineOptions, InputBindings, OutputMode},
};

/// Top-level configuration for a player instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Native window to render into. `None` lets the engine open its own.
    pub window: Option<u64>,
    pub on_screen_controller: bool,
    pub hardware_decoding: bool,
    pub engine_log_level: EngineLogLevel,
    /// Initial retro audio intent. Only read when an engine is constructed.
    pub retro_audio: bool,
    pub engine_program: PathBuf,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            window: None,
            on_screen_controller: true,
            hardware_decoding: false,
            engine_log_level: EngineLogLevel::Warn,
            retro_audio: false,
            engine_program: PathBuf::from("mpv"),
        }
    }
}

impl PlayerConfig {
    /// Construction-time engine options for the given retro audio intent.
    pub fn engine_options(&self, retro_audio: bool) -> EngineOptions {
        EngineOptions {
            output: OutputMode::for_window(self.window),
            input: InputBindings::default(),
            log_level: self.engine_log_level,
            on_screen_controller: self.on_screen_controller,
            hardware_decoding: self.hardware_decoding,
            keep_open: true,
            start_paused: true,
            audio_filter: retro_audio.then(AudioFilterSpec::retro),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retro_audio_adds_filter_to_options() {
        let config = PlayerConfig::default();

        assert!(config.engine_options(false).audio_filter.is_none());
        assert_eq!(
            config.engine_options(true).audio_filter,
            Some(AudioFilterSpec::retro())
        );
    }

    #[test]
    fn window_handle_embeds_output() {
        let config = PlayerConfig {
            window: Some(77),
            ..PlayerConfig::default()
        };

        assert_eq!(
            config.engine_options(false).output,
            OutputMode::Embedded { window: 77 }
        );
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: PlayerConfig =
            serde_json::from_str(r#"{ "hardware_decoding": true, "engine_log_level": "debug" }"#)
                .unwrap();

        assert!(config.hardware_decoding);
        assert!(config.on_screen_controller);
        assert_eq!(config.engine_log_level, EngineLogLevel::Debug);
        assert_eq!(config.engine_program, PathBuf::from("mpv"));
    }
}
