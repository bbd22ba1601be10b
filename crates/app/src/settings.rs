use std::{
    fs,
    path::{Path, PathBuf},
};

use directories::ProjectDirs;
use phosphor_core::{EffectChannel, EffectLevel, EnabledFlags, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

const SETTINGS_FILE: &str = "settings.json";

/// Front-end state persisted between runs.
///
/// Keys this build does not know about are carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub last_dir: String,
    pub crt_cb: bool,
    pub scan_cb: bool,
    pub vhs_cb: bool,
    pub audio_cb: bool,
    pub crt_slider: i32,
    pub scan_slider: i32,
    pub vhs_slider: i32,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            last_dir: String::new(),
            crt_cb: false,
            scan_cb: false,
            vhs_cb: false,
            audio_cb: false,
            crt_slider: 0,
            scan_slider: 0,
            vhs_slider: 0,
            extra: Map::new(),
        }
    }
}

impl Settings {
    pub fn enabled(&self, channel: EffectChannel) -> bool {
        match channel {
            EffectChannel::Crt => self.crt_cb,
            EffectChannel::Scanlines => self.scan_cb,
            EffectChannel::Vhs => self.vhs_cb,
        }
    }

    pub fn set_enabled(&mut self, channel: EffectChannel, enabled: bool) {
        match channel {
            EffectChannel::Crt => self.crt_cb = enabled,
            EffectChannel::Scanlines => self.scan_cb = enabled,
            EffectChannel::Vhs => self.vhs_cb = enabled,
        }
    }

    pub fn apply_flags(&mut self, flags: EnabledFlags) {
        self.crt_cb = flags.crt;
        self.scan_cb = flags.scanlines;
        self.vhs_cb = flags.vhs;
    }

    /// Stored slider position, clamped into the valid level range.
    pub fn level(&self, channel: EffectChannel) -> EffectLevel {
        let raw = match channel {
            EffectChannel::Crt => self.crt_slider,
            EffectChannel::Scanlines => self.scan_slider,
            EffectChannel::Vhs => self.vhs_slider,
        };
        EffectLevel::new(raw)
    }

    pub fn set_level(&mut self, channel: EffectChannel, level: EffectLevel) {
        let raw = i32::from(level);
        match channel {
            EffectChannel::Crt => self.crt_slider = raw,
            EffectChannel::Scanlines => self.scan_slider = raw,
            EffectChannel::Vhs => self.vhs_slider = raw,
        }
    }

    /// Records the directory of `file` as the last browsed location.
    pub fn remember_dir(&mut self, file: &Path) {
        if let Some(dir) = file.parent() {
            self.last_dir = dir.display().to_string();
        }
    }
}

/// Settings bound to the file they were read from.
#[derive(Debug)]
pub struct SettingsStore {
    path: Option<PathBuf>,
    settings: Settings,
}

impl SettingsStore {
    /// Opens the settings in the platform config directory.
    pub fn open_default() -> Self {
        match default_path() {
            Some(path) => Self::open(path),
            None => {
                warn!("no config directory available; settings will not persist");
                Self {
                    path: None,
                    settings: Settings::default(),
                }
            }
        }
    }

    /// Reads `path`, falling back to defaults when it is missing or unreadable.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let settings = match read_settings(&path) {
            Ok(settings) => settings,
            Err(err) => {
                debug!(%err, path = %path.display(), "using default settings");
                Settings::default()
            }
        };
        Self {
            path: Some(path),
            settings,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }

    /// Applies `change` and persists the result. Write failures are logged.
    pub fn update(&mut self, change: impl FnOnce(&mut Settings)) {
        change(&mut self.settings);
        self.save();
    }

    pub fn reset(&mut self) {
        self.update(|settings| *settings = Settings::default());
    }

    pub fn save(&self) {
        let Some(path) = &self.path else {
            return;
        };
        if let Err(err) = write_settings(path, &self.settings) {
            warn!(%err, path = %path.display(), "failed to save settings");
        }
    }
}

fn default_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "Phosphor").map(|dirs| dirs.config_dir().join(SETTINGS_FILE))
}

fn read_settings(path: &Path) -> Result<Settings> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

fn write_settings(path: &Path, settings: &Settings) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    fs::write(path, serde_json::to_string_pretty(settings)?)?;
    Ok(())
}
