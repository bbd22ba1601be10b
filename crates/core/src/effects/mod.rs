//! Effect channel state and the shader chain derived from it.
//!
//! The model is plain data: enable flags and intensity levels per channel.
//! Nothing is resolved or pushed anywhere until [`EffectStageModel::compute_chain`]
//! is called, so setters stay cheap and can be called from any thread that
//! holds the model.

mod preset;

use std::{fmt, path::PathBuf, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{assets::ShaderAssetResolver, PhosphorError};

pub use preset::{EnabledFlags, Preset};

/// Lowest intensity level a channel can be set to.
pub const MIN_LEVEL: i8 = -5;
/// Highest intensity level a channel can be set to.
pub const MAX_LEVEL: i8 = 5;

/// One independently toggleable visual treatment.
///
/// The declaration order is the order stages are emitted in a [`ShaderChain`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectChannel {
    Crt,
    Scanlines,
    Vhs,
}

impl EffectChannel {
    /// Every channel, in chain order.
    pub const ALL: [EffectChannel; 3] = [Self::Crt, Self::Scanlines, Self::Vhs];

    /// Short lowercase name used on the command line and in logs.
    pub fn key(self) -> &'static str {
        match self {
            Self::Crt => "crt",
            Self::Scanlines => "scanlines",
            Self::Vhs => "vhs",
        }
    }

    /// File stem shared by every pre-rendered level of this channel's shader.
    pub fn asset_stem(self) -> &'static str {
        match self {
            Self::Crt => "crt_base",
            Self::Scanlines => "scanlines",
            Self::Vhs => "vhs_noise",
        }
    }

    fn index(self) -> usize {
        match self {
            Self::Crt => 0,
            Self::Scanlines => 1,
            Self::Vhs => 2,
        }
    }
}

impl fmt::Display for EffectChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for EffectChannel {
    type Err = PhosphorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "crt" => Ok(Self::Crt),
            "scanlines" | "scanline" | "scan" => Ok(Self::Scanlines),
            "vhs" => Ok(Self::Vhs),
            _ => Err(PhosphorError::UnknownChannel(s.to_string())),
        }
    }
}

/// Intensity level, always within [`MIN_LEVEL`]..=[`MAX_LEVEL`].
///
/// Out-of-range input is clamped on construction, never rejected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub struct EffectLevel(i8);

impl EffectLevel {
    pub fn new(level: i32) -> Self {
        Self(level.clamp(MIN_LEVEL as i32, MAX_LEVEL as i32) as i8)
    }

    /// Rounds a slider position half away from zero, then clamps.
    /// `NaN` maps to the neutral level.
    pub fn from_slider(level: f32) -> Self {
        Self::new(level.round() as i32)
    }

    pub fn get(self) -> i8 {
        self.0
    }

    /// Every valid level from lowest to highest.
    pub fn all() -> impl Iterator<Item = EffectLevel> {
        (MIN_LEVEL..=MAX_LEVEL).map(EffectLevel)
    }
}

impl From<i32> for EffectLevel {
    fn from(value: i32) -> Self {
        Self::new(value)
    }
}

impl From<f32> for EffectLevel {
    fn from(value: f32) -> Self {
        Self::from_slider(value)
    }
}

impl From<EffectLevel> for i32 {
    fn from(value: EffectLevel) -> Self {
        value.0 as i32
    }
}

impl fmt::Display for EffectLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stored state for a single channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelState {
    pub enabled: bool,
    pub level: EffectLevel,
}

/// A resolved shader asset taking part in the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderStage {
    pub channel: EffectChannel,
    pub level: EffectLevel,
    pub path: PathBuf,
}

/// Ordered shader assets, pushed to the engine as one unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShaderChain {
    stages: Vec<ShaderStage>,
}

impl ShaderChain {
    pub fn stages(&self) -> &[ShaderStage] {
        &self.stages
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.stages.iter().map(|stage| stage.path.clone()).collect()
    }

    pub fn channels(&self) -> Vec<EffectChannel> {
        self.stages.iter().map(|stage| stage.channel).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }
}

/// Enable flags and intensity levels for every [`EffectChannel`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EffectStageModel {
    channels: [ChannelState; 3],
}

impl EffectStageModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_enabled(&mut self, channel: EffectChannel, enabled: bool) {
        self.channels[channel.index()].enabled = enabled;
    }

    /// Stores the clamped level and returns what was stored.
    pub fn set_level(&mut self, channel: EffectChannel, level: impl Into<EffectLevel>) -> EffectLevel {
        let level = level.into();
        self.channels[channel.index()].level = level;
        level
    }

    pub fn channel(&self, channel: EffectChannel) -> ChannelState {
        self.channels[channel.index()]
    }

    pub fn is_enabled(&self, channel: EffectChannel) -> bool {
        self.channel(channel).enabled
    }

    pub fn level(&self, channel: EffectChannel) -> EffectLevel {
        self.channel(channel).level
    }

    pub fn enabled_flags(&self) -> EnabledFlags {
        EnabledFlags {
            crt: self.is_enabled(EffectChannel::Crt),
            scanlines: self.is_enabled(EffectChannel::Scanlines),
            vhs: self.is_enabled(EffectChannel::Vhs),
        }
    }

    /// Sets the three enable flags from `flags`; levels are left alone.
    pub fn apply_flags(&mut self, flags: EnabledFlags) {
        self.set_enabled(EffectChannel::Crt, flags.crt);
        self.set_enabled(EffectChannel::Scanlines, flags.scanlines);
        self.set_enabled(EffectChannel::Vhs, flags.vhs);
    }

    /// Builds the shader chain for the current state.
    ///
    /// Channels are visited in fixed CRT, Scanlines, VHS order. An enabled
    /// channel whose asset cannot be resolved is left out of the chain.
    pub fn compute_chain(&self, resolver: &dyn ShaderAssetResolver) -> ShaderChain {
        let stages = EffectChannel::ALL
            .into_iter()
            .filter_map(|channel| {
                let state = self.channel(channel);
                if !state.enabled {
                    return None;
                }
                resolver
                    .resolve(channel, state.level)
                    .map(|path| ShaderStage {
                        channel,
                        level: state.level,
                        path,
                    })
            })
            .collect();

        ShaderChain { stages }
    }
}
