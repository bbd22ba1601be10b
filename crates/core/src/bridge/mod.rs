//! Delivery of engine notifications back into the player.
//!
//! The engine invokes its observers on its own thread. The observer handed to
//! the engine only enqueues a [`BridgeMessage`]; a dedicated worker drains the
//! queue and calls [`EventBridge::on_file_ready`], so nothing the player does
//! can block or unwind into the engine's thread.

use std::{
    panic::{self, AssertUnwindSafe},
    sync::Arc,
    thread,
};

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, error, trace, warn};

use crate::{engine::FlagObserver, session::PlaybackSession, Result};

/// Re-applies the current shader chain when the engine reports a ready file.
#[derive(Clone)]
pub struct EventBridge {
    session: Arc<PlaybackSession>,
}

impl EventBridge {
    pub(crate) fn new(session: Arc<PlaybackSession>) -> Self {
        Self { session }
    }

    /// Handles a file-ready notification.
    ///
    /// Does nothing when no engine is live or teardown has already run; the
    /// notification may arrive after `terminate` from the engine's thread.
    pub fn on_file_ready(&self, is_ready: bool) {
        let lifecycle = &self.session.lifecycle;
        if lifecycle.is_terminated() || lifecycle.live_handle().is_none() {
            debug!(is_ready, "file-ready without a live engine; ignoring");
            return;
        }

        self.session.set_file_loaded(is_ready);
        if !is_ready {
            return;
        }

        match self.session.apply_shader_chain() {
            Ok(Some(chain)) => debug!(stages = chain.len(), "shader chain applied to ready file"),
            Ok(None) => debug!("engine went away before shaders could be applied"),
            Err(err) => warn!(%err, "failed to apply shader chain to ready file"),
        }
    }
}

impl std::fmt::Debug for EventBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBridge").finish()
    }
}

pub(crate) enum BridgeMessage {
    FileReady(bool),
    Stop,
}

/// Worker thread that feeds queued notifications into an [`EventBridge`].
pub(crate) struct BridgeWorker {
    sender: Sender<BridgeMessage>,
}

impl BridgeWorker {
    pub(crate) fn spawn(bridge: EventBridge) -> Result<Self> {
        let (sender, receiver) = crossbeam_channel::unbounded();
        thread::Builder::new()
            .name("phosphor-events".to_string())
            .spawn(move || run(bridge, receiver))?;
        Ok(Self { sender })
    }

    /// Observer to register with the engine. It never blocks.
    pub(crate) fn observer(&self) -> FlagObserver {
        let sender = self.sender.clone();
        Arc::new(move |is_ready: bool| {
            if sender.send(BridgeMessage::FileReady(is_ready)).is_err() {
                trace!(is_ready, "event bridge stopped; dropping file-ready");
            }
        })
    }

    pub(crate) fn stop(&self) {
        let _ = self.sender.send(BridgeMessage::Stop);
    }
}

fn run(bridge: EventBridge, receiver: Receiver<BridgeMessage>) {
    for message in receiver.iter() {
        match message {
            BridgeMessage::FileReady(is_ready) => {
                let handled =
                    panic::catch_unwind(AssertUnwindSafe(|| bridge.on_file_ready(is_ready)));
                if handled.is_err() {
                    error!(is_ready, "file-ready handler panicked");
                }
            }
            BridgeMessage::Stop => break,
        }
    }
    debug!("event bridge stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assets::MemoryResolver,
        effects::{EffectChannel, EffectLevel},
        engine::EngineOptions,
        testing::{wait_until, EngineCall, FakeFactory},
    };

    fn session_with_crt() -> Arc<PlaybackSession> {
        let mut resolver = MemoryResolver::new();
        resolver.insert(EffectChannel::Crt, EffectLevel::new(2));
        let session = Arc::new(PlaybackSession::new(Arc::new(resolver)));
        {
            let mut effects = session.lock_effects().unwrap();
            effects.set_enabled(EffectChannel::Crt, true);
            effects.set_level(EffectChannel::Crt, 2);
        }
        session
    }

    #[test]
    fn ready_file_receives_current_chain() {
        let factory = FakeFactory::new();
        let session = session_with_crt();
        let bridge = EventBridge::new(session.clone());
        session
            .lifecycle
            .ensure_created(factory.as_ref(), &EngineOptions::default(), Arc::new(|_: bool| {}))
            .unwrap();

        bridge.on_file_ready(true);

        assert!(session.file_loaded());
        assert_eq!(
            factory.engine(0).last_shader_chain(),
            Some(vec![MemoryResolver::path_for(EffectChannel::Crt, EffectLevel::new(2))])
        );
    }

    #[test]
    fn not_ready_clears_flag_without_pushing() {
        let factory = FakeFactory::new();
        let session = session_with_crt();
        let bridge = EventBridge::new(session.clone());
        session
            .lifecycle
            .ensure_created(factory.as_ref(), &EngineOptions::default(), Arc::new(|_: bool| {}))
            .unwrap();
        session.set_file_loaded(true);

        bridge.on_file_ready(false);

        assert!(!session.file_loaded());
        assert!(factory.engine(0).last_shader_chain().is_none());
    }

    #[test]
    fn ready_after_teardown_is_ignored() {
        let factory = FakeFactory::new();
        let session = session_with_crt();
        let bridge = EventBridge::new(session.clone());
        session
            .lifecycle
            .ensure_created(factory.as_ref(), &EngineOptions::default(), Arc::new(|_: bool| {}))
            .unwrap();
        session.lifecycle.teardown().unwrap();

        bridge.on_file_ready(true);

        assert!(!session.file_loaded());
        assert!(session.lifecycle.live_handle().is_none());
        assert_eq!(factory.created(), 1);
        assert_eq!(
            factory
                .engine(0)
                .count(|call| matches!(call, EngineCall::SetShaderChain(_))),
            0
        );
    }

    #[test]
    fn worker_delivers_observer_calls_from_other_threads() {
        let factory = FakeFactory::new();
        let session = session_with_crt();
        let worker = BridgeWorker::spawn(EventBridge::new(session.clone())).unwrap();
        session
            .lifecycle
            .ensure_created(factory.as_ref(), &EngineOptions::default(), worker.observer())
            .unwrap();

        let engine = factory.engine(0);
        let firing = engine.clone();
        thread::spawn(move || firing.fire(crate::engine::FILE_READY_PROPERTY, true))
            .join()
            .unwrap();

        assert!(wait_until(|| engine.last_shader_chain().is_some()));
        assert!(session.file_loaded());
        worker.stop();
    }
}
