//! Façade the front end drives.
//!
//! A [`PlaybackController`] owns one engine lifecycle. Effect changes land in
//! the shared [`EffectStageModel`](crate::effects::EffectStageModel) and are
//! pushed straight to a live engine; the engine's own file-ready notification
//! re-applies them after every file change. Teardown runs on a worker thread.

mod report;

use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
};

use tracing::{debug, error, info, warn};

use crate::{
    assets::ShaderAssetResolver,
    bridge::{BridgeWorker, EventBridge},
    config::PlayerConfig,
    effects::{EffectChannel, EffectLevel, Preset},
    engine::EngineFactory,
    session::{PlaybackSession, SessionStatus},
    PhosphorError, Result,
};

pub use report::{
    load_error_message, remediation_for, remediation_message, ErrorReporter, HostFamily,
    LogReporter, INIT_ERROR_TITLE, LOAD_ERROR_TITLE,
};

/// Controls one media engine session and the effects applied to it.
pub struct PlaybackController {
    session: Arc<PlaybackSession>,
    factory: Arc<dyn EngineFactory>,
    reporter: Arc<dyn ErrorReporter>,
    config: PlayerConfig,
    retro_audio: AtomicBool,
    bridge: BridgeWorker,
}

impl PlaybackController {
    pub fn new(
        config: PlayerConfig,
        factory: Arc<dyn EngineFactory>,
        resolver: Arc<dyn ShaderAssetResolver>,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Result<Self> {
        let session = Arc::new(PlaybackSession::new(resolver));
        let bridge = BridgeWorker::spawn(EventBridge::new(session.clone()))?;
        Ok(Self {
            session,
            factory,
            reporter,
            retro_audio: AtomicBool::new(config.retro_audio),
            config,
            bridge,
        })
    }

    /// Loads `path`, constructing the engine on first use.
    ///
    /// Failures are reported through the [`ErrorReporter`] before they are
    /// returned; callers may ignore the returned error. The file counts as
    /// loaded only once the engine confirms it.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.session.set_file_loaded(false);

        let options = self.config.engine_options(self.retro_audio_enabled());
        let handle =
            match self
                .session
                .lifecycle
                .ensure_created(self.factory.as_ref(), &options, self.bridge.observer())
            {
                Ok(handle) => handle,
                Err(PhosphorError::Terminated) => {
                    warn!(path = %path.display(), "load ignored; player has been terminated");
                    return Err(PhosphorError::Terminated);
                }
                Err(err) => {
                    error!(%err, "media engine could not be constructed");
                    self.reporter
                        .report_error(INIT_ERROR_TITLE, &remediation_message());
                    return Err(err);
                }
            };

        info!(path = %path.display(), "loading media");
        let loaded = handle
            .replace_media(path)
            .and_then(|()| handle.set_paused(false));
        if let Err(err) = loaded {
            warn!(%err, path = %path.display(), "failed to load media");
            self.reporter
                .report_error(LOAD_ERROR_TITLE, &load_error_message(&err));
            return Err(err);
        }
        self.session.set_paused(false);
        Ok(())
    }

    /// Runs [`load`](Self::load) on a worker thread.
    pub fn load_in_background(self: &Arc<Self>, path: impl Into<PathBuf>) -> Result<JoinHandle<()>> {
        let controller = Arc::clone(self);
        let path = path.into();
        let handle = thread::Builder::new()
            .name("phosphor-load".to_string())
            .spawn(move || {
                if let Err(err) = controller.load(&path) {
                    debug!(%err, "background load finished with an error");
                }
            })?;
        Ok(handle)
    }

    /// Flips pause on a live engine and returns the new state.
    /// Returns `None` when no engine is live.
    pub fn toggle_pause(&self) -> Option<bool> {
        let handle = self.session.lifecycle.live_handle()?;
        let paused = !self.session.paused();
        self.session.set_paused(paused);
        if let Err(err) = handle.set_paused(paused) {
            warn!(%err, paused, "failed to change pause state");
        }
        Some(paused)
    }

    pub fn enable_crt(&self, enabled: bool) -> Result<()> {
        self.set_effect_enabled(EffectChannel::Crt, enabled)
    }

    pub fn enable_scanlines(&self, enabled: bool) -> Result<()> {
        self.set_effect_enabled(EffectChannel::Scanlines, enabled)
    }

    pub fn enable_vhs(&self, enabled: bool) -> Result<()> {
        self.set_effect_enabled(EffectChannel::Vhs, enabled)
    }

    pub fn set_effect_enabled(&self, channel: EffectChannel, enabled: bool) -> Result<()> {
        self.session.lock_effects()?.set_enabled(channel, enabled);
        debug!(%channel, enabled, "effect toggled");
        self.refresh_shaders();
        Ok(())
    }

    /// Stores the clamped level for `channel` and returns it.
    pub fn set_shader_level(
        &self,
        channel: EffectChannel,
        level: impl Into<EffectLevel>,
    ) -> Result<EffectLevel> {
        let stored = self.session.lock_effects()?.set_level(channel, level);
        debug!(%channel, level = %stored, "shader level changed");
        self.refresh_shaders();
        Ok(stored)
    }

    /// Applies the enable flags of `preset`. `Custom` changes nothing.
    pub fn apply_preset(&self, preset: Preset) -> Result<()> {
        let Some(flags) = preset.flags() else {
            return Ok(());
        };
        self.session.lock_effects()?.apply_flags(flags);
        debug!(%preset, "preset applied");
        self.refresh_shaders();
        Ok(())
    }

    /// Sets the retro audio intent for the next engine construction.
    ///
    /// The audio filter is a construction-time option: a live engine keeps
    /// whatever it was built with. Set this before the first load.
    pub fn enable_retro_audio(&self, enabled: bool) {
        self.retro_audio.store(enabled, Ordering::SeqCst);
        if self.session.lifecycle.live_handle().is_some() {
            info!(enabled, "retro audio change applies to the next player only");
        }
    }

    pub fn retro_audio_enabled(&self) -> bool {
        self.retro_audio.load(Ordering::SeqCst)
    }

    /// Tears the engine down on a worker thread. Safe to call repeatedly.
    pub fn terminate(&self) -> TeardownHandle {
        let session = self.session.clone();
        let spawned = thread::Builder::new()
            .name("phosphor-teardown".to_string())
            .spawn(move || session.lifecycle.teardown());

        match spawned {
            Ok(handle) => TeardownHandle::Running(handle),
            Err(err) => {
                warn!(%err, "could not start teardown worker; tearing down inline");
                TeardownHandle::Finished(self.session.lifecycle.teardown())
            }
        }
    }

    pub fn status(&self) -> Result<SessionStatus> {
        self.session.status(self.retro_audio_enabled())
    }

    pub fn is_file_loaded(&self) -> bool {
        self.session.file_loaded()
    }

    /// Entry point for engine notifications delivered outside the engine
    /// observer, e.g. by an embedding front end.
    pub fn event_bridge(&self) -> EventBridge {
        EventBridge::new(self.session.clone())
    }

    fn refresh_shaders(&self) {
        if let Err(err) = self.session.apply_shader_chain() {
            warn!(%err, "failed to push shader chain");
        }
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        self.bridge.stop();
    }
}

impl std::fmt::Debug for PlaybackController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackController")
            .field("lifecycle", &self.session.lifecycle)
            .field("retro_audio", &self.retro_audio_enabled())
            .finish()
    }
}

/// Outcome of [`PlaybackController::terminate`].
///
/// Dropping it leaves the teardown running in the background.
#[derive(Debug)]
pub enum TeardownHandle {
    Running(JoinHandle<Result<bool>>),
    Finished(Result<bool>),
}

impl TeardownHandle {
    /// Blocks until teardown is done. `true` means this call shut the
    /// engine down; `false` means there was nothing to shut down.
    pub fn wait(self) -> Result<bool> {
        match self {
            Self::Running(handle) => handle
                .join()
                .map_err(|_| PhosphorError::msg("teardown worker panicked"))?,
            Self::Finished(result) => result,
        }
    }
}
