//! Core library for the Phosphor retro video player.
//!
//! The crate owns everything between the front end and the media engine:
//! effect staging, engine lifecycle, delivery of engine notifications and the
//! controller façade that ties them together. The engine itself sits behind
//! the [`MediaEngine`] trait; [`MpvProcessFactory`] drives an external `mpv`
//! process over its JSON IPC socket.

pub mod assets;
pub mod audio;
pub mod bridge;
pub mod config;
pub mod effects;
pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod player;
mod session;

#[cfg(test)]
mod testing;

pub use assets::{resource_root, MemoryResolver, ShaderAssetResolver, ShaderDirectory};
pub use audio::AudioFilterSpec;
pub use bridge::EventBridge;
pub use config::PlayerConfig;
pub use effects::{
    EffectChannel, EffectLevel, EffectStageModel, EnabledFlags, Preset, ShaderChain, ShaderStage,
};
pub use engine::{
    EngineFactory, EngineLogLevel, EngineOptions, MediaEngine, MpvProcessFactory, OutputMode,
};
pub use error::{PhosphorError, Result};
pub use lifecycle::{EngineLifecycle, LifecycleState};
pub use player::{ErrorReporter, LogReporter, PlaybackController, TeardownHandle};
pub use session::SessionStatus;
