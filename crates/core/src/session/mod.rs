use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, MutexGuard,
};

use tracing::{debug, info};

use crate::{
    assets::ShaderAssetResolver,
    effects::{EffectStageModel, Preset, ShaderChain},
    lifecycle::{EngineLifecycle, LifecycleState},
    PhosphorError, Result,
};

/// State shared by the controller, the event bridge and the worker threads.
pub(crate) struct PlaybackSession {
    pub(crate) lifecycle: EngineLifecycle,
    effects: Mutex<EffectStageModel>,
    resolver: Arc<dyn ShaderAssetResolver>,
    file_loaded: AtomicBool,
    paused: AtomicBool,
}

impl PlaybackSession {
    pub(crate) fn new(resolver: Arc<dyn ShaderAssetResolver>) -> Self {
        Self {
            lifecycle: EngineLifecycle::new(),
            effects: Mutex::new(EffectStageModel::new()),
            resolver,
            file_loaded: AtomicBool::new(false),
            paused: AtomicBool::new(true),
        }
    }

    pub(crate) fn lock_effects(&self) -> Result<MutexGuard<'_, EffectStageModel>> {
        self.effects
            .lock()
            .map_err(|_| PhosphorError::poisoned("effect stage model"))
    }

    pub(crate) fn file_loaded(&self) -> bool {
        self.file_loaded.load(Ordering::SeqCst)
    }

    pub(crate) fn set_file_loaded(&self, loaded: bool) {
        self.file_loaded.store(loaded, Ordering::SeqCst);
    }

    pub(crate) fn paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub(crate) fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::SeqCst);
    }

    pub(crate) fn compute_chain(&self) -> Result<ShaderChain> {
        Ok(self.lock_effects()?.compute_chain(self.resolver.as_ref()))
    }

    /// Pushes the chain for the current effect state into the live engine.
    ///
    /// Returns `None` without touching anything when no engine is live.
    pub(crate) fn apply_shader_chain(&self) -> Result<Option<ShaderChain>> {
        let Some(handle) = self.lifecycle.live_handle() else {
            return Ok(None);
        };

        let chain = self.compute_chain()?;
        if chain.is_empty() {
            info!("no shaders loaded (all disabled or assets missing)");
        } else {
            debug!(stages = ?chain.channels(), "applying shader chain");
        }
        handle.set_shader_chain(&chain.paths())?;
        Ok(Some(chain))
    }

    pub(crate) fn status(&self, retro_audio: bool) -> Result<SessionStatus> {
        let effects = self.lock_effects()?.clone();
        Ok(SessionStatus {
            state: self.lifecycle.state()?,
            file_loaded: self.file_loaded(),
            paused: self.paused(),
            retro_audio,
            preset: Preset::matching(effects.enabled_flags()),
            effects,
        })
    }
}

/// Point-in-time view of a player for display and diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    pub state: LifecycleState,
    pub file_loaded: bool,
    pub paused: bool,
    /// Retro audio intent for the next engine construction.
    pub retro_audio: bool,
    pub preset: Preset,
    pub effects: EffectStageModel,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assets::MemoryResolver,
        effects::{EffectChannel, EffectLevel},
    };

    #[test]
    fn fresh_session_is_paused_and_not_loaded() {
        let session = PlaybackSession::new(Arc::new(MemoryResolver::new()));
        let status = session.status(false).unwrap();

        assert_eq!(status.state, LifecycleState::Uninitialized);
        assert!(status.paused);
        assert!(!status.file_loaded);
        assert_eq!(status.preset, Preset::Clean);
    }

    #[test]
    fn applying_without_engine_is_a_noop() {
        let mut resolver = MemoryResolver::new();
        resolver.insert(EffectChannel::Crt, EffectLevel::new(0));
        let session = PlaybackSession::new(Arc::new(resolver));
        session.lock_effects().unwrap().set_enabled(EffectChannel::Crt, true);

        assert!(session.apply_shader_chain().unwrap().is_none());
        assert_eq!(session.compute_chain().unwrap().len(), 1);
    }
}
