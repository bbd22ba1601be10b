//! Ownership of the single media engine instance.
//!
//! ```text
//! Uninitialized --load--> Creating --> Created --terminate--> Terminating --> Terminated
//!       ^                    |  |          |                                      ^
//!       +---- create fails --+  |          +--- load (replace media), stays Created
//!                               +---- terminate during construction --------------+
//! ```
//!
//! Readers take a clone of the handle only while the state is `Created` and
//! release the slot lock before talking to the engine. The slot lock is never
//! held across engine construction; concurrent constructions are serialized
//! by a separate lock. Teardown runs under its own lock.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, MutexGuard,
};

use tracing::{debug, info, warn};

use crate::{
    engine::{EngineFactory, EngineOptions, FlagObserver, MediaEngine, FILE_READY_PROPERTY},
    PhosphorError, Result,
};

/// Position of an [`EngineLifecycle`] in its state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    /// An engine is being constructed; there is no usable handle yet.
    Creating,
    Created,
    Terminating,
    Terminated,
}

struct EngineSlot {
    state: LifecycleState,
    handle: Option<Arc<dyn MediaEngine>>,
}

/// Owns at most one live [`MediaEngine`] and enforces the state machine above.
pub struct EngineLifecycle {
    slot: Mutex<EngineSlot>,
    creating: Mutex<()>,
    teardown: Mutex<()>,
    terminated: AtomicBool,
}

impl Default for EngineLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineLifecycle {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(EngineSlot {
                state: LifecycleState::Uninitialized,
                handle: None,
            }),
            creating: Mutex::new(()),
            teardown: Mutex::new(()),
            terminated: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> Result<LifecycleState> {
        Ok(self.lock_slot()?.state)
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }

    /// Handle of the live engine, or `None` unless the state is `Created`.
    pub fn live_handle(&self) -> Option<Arc<dyn MediaEngine>> {
        let slot = match self.lock_slot() {
            Ok(slot) => slot,
            Err(err) => {
                warn!(%err, "engine slot unavailable");
                return None;
            }
        };
        match slot.state {
            LifecycleState::Created => slot.handle.clone(),
            _ => None,
        }
    }

    /// Returns the live engine, constructing it first if none exists yet.
    ///
    /// Construction happens without holding the slot lock, so readers see no
    /// handle and carry on instead of waiting. On construction failure
    /// nothing is stored and the state returns to `Uninitialized`, so a later
    /// call may try again. Once teardown has started this always fails with
    /// [`PhosphorError::Terminated`]; an engine finished after that point is
    /// shut down again.
    pub fn ensure_created(
        &self,
        factory: &dyn EngineFactory,
        options: &EngineOptions,
        on_file_ready: FlagObserver,
    ) -> Result<Arc<dyn MediaEngine>> {
        let _creating = self
            .creating
            .lock()
            .map_err(|_| PhosphorError::poisoned("engine construction lock"))?;

        {
            let mut slot = self.lock_slot()?;
            match slot.state {
                LifecycleState::Created => {
                    if let Some(handle) = &slot.handle {
                        return Ok(handle.clone());
                    }
                }
                LifecycleState::Terminating | LifecycleState::Terminated => {
                    return Err(PhosphorError::Terminated)
                }
                LifecycleState::Uninitialized | LifecycleState::Creating => {}
            }
            slot.state = LifecycleState::Creating;
        }

        info!(
            output = ?options.output,
            retro_audio = options.audio_filter.is_some(),
            "creating media engine"
        );
        let created = factory
            .create(options)
            .and_then(|handle| match handle.observe(FILE_READY_PROPERTY, on_file_ready) {
                Ok(()) => Ok(handle),
                Err(err) => {
                    warn!(%err, "file-ready observer registration failed; discarding engine");
                    discard(handle.as_ref());
                    Err(PhosphorError::EngineUnavailable(format!(
                        "could not observe `{FILE_READY_PROPERTY}`: {err}"
                    )))
                }
            });

        let mut slot = self.lock_slot()?;
        let creating = slot.state == LifecycleState::Creating;
        match created {
            Ok(handle) if creating => {
                slot.handle = Some(handle.clone());
                slot.state = LifecycleState::Created;
                Ok(handle)
            }
            Ok(handle) => {
                drop(slot);
                info!("player terminated during construction; shutting new engine down");
                if let Err(err) = handle.unobserve(FILE_READY_PROPERTY) {
                    debug!(%err, "ignoring observer removal failure on discarded engine");
                }
                discard(handle.as_ref());
                Err(PhosphorError::Terminated)
            }
            Err(err) if creating => {
                slot.state = LifecycleState::Uninitialized;
                Err(err)
            }
            Err(err) => {
                debug!(%err, "construction failed after the player was terminated");
                Err(PhosphorError::Terminated)
            }
        }
    }

    /// Unregisters the observer, shuts the engine down and drops the handle.
    ///
    /// Engine failures along the way are swallowed; local bookkeeping always
    /// completes. Returns `true` if this call performed the teardown and
    /// `false` if there was nothing to tear down.
    pub fn teardown(&self) -> Result<bool> {
        let _teardown = self
            .teardown
            .lock()
            .map_err(|_| PhosphorError::poisoned("teardown lock"))?;

        let handle = {
            let mut slot = self.lock_slot()?;
            match slot.state {
                LifecycleState::Created => {}
                LifecycleState::Creating => {
                    // The constructing thread sees this and shuts its engine down.
                    slot.state = LifecycleState::Terminated;
                    self.terminated.store(true, Ordering::SeqCst);
                    info!("media engine terminated during construction");
                    return Ok(true);
                }
                state => {
                    debug!(?state, "nothing to tear down");
                    return Ok(false);
                }
            }
            slot.state = LifecycleState::Terminating;
            slot.handle.clone()
        };

        if let Some(handle) = handle {
            if let Err(err) = handle.unobserve(FILE_READY_PROPERTY) {
                debug!(%err, "ignoring observer removal failure during teardown");
            }
            if let Err(err) = handle.shutdown() {
                debug!(%err, "ignoring engine shutdown failure during teardown");
            }
        }

        {
            let mut slot = self.lock_slot()?;
            slot.handle = None;
            slot.state = LifecycleState::Terminated;
        }
        self.terminated.store(true, Ordering::SeqCst);
        info!("media engine terminated");
        Ok(true)
    }

    fn lock_slot(&self) -> Result<MutexGuard<'_, EngineSlot>> {
        self.slot
            .lock()
            .map_err(|_| PhosphorError::poisoned("engine slot"))
    }
}

fn discard(handle: &dyn MediaEngine) {
    if let Err(err) = handle.shutdown() {
        debug!(%err, "discarded engine did not shut down cleanly");
    }
}

impl std::fmt::Debug for EngineLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineLifecycle")
            .field("state", &self.state().ok())
            .field("terminated", &self.is_terminated())
            .finish()
    }
}
