//! Recording doubles for the engine boundary and the error reporter.

use std::{
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    thread,
    time::{Duration, Instant},
};

use crate::{
    engine::{EngineFactory, EngineOptions, FlagObserver, MediaEngine},
    player::ErrorReporter,
    PhosphorError, Result,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum EngineCall {
    ReplaceMedia(PathBuf),
    SetPaused(bool),
    SetShaderChain(Vec<PathBuf>),
    Observe(String),
    Unobserve(String),
    Shutdown,
}

#[derive(Default)]
pub(crate) struct FakeEngine {
    calls: Mutex<Vec<EngineCall>>,
    observers: Mutex<HashMap<String, FlagObserver>>,
    failing: Mutex<HashSet<&'static str>>,
}

impl FakeEngine {
    pub(crate) fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn count(&self, matches: impl Fn(&EngineCall) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|call| matches(call)).count()
    }

    pub(crate) fn last_shader_chain(&self) -> Option<Vec<PathBuf>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find_map(|call| match call {
                EngineCall::SetShaderChain(chain) => Some(chain.clone()),
                _ => None,
            })
    }

    /// Makes every later call to `command` fail.
    pub(crate) fn fail(&self, command: &'static str) {
        self.failing.lock().unwrap().insert(command);
    }

    /// Invokes the observer registered for `property`, as the engine thread would.
    pub(crate) fn fire(&self, property: &str, value: bool) -> bool {
        let observer = self.observers.lock().unwrap().get(property).cloned();
        match observer {
            Some(observer) => {
                observer(value);
                true
            }
            None => false,
        }
    }

    fn record(&self, command: &'static str, call: EngineCall) -> Result<()> {
        self.calls.lock().unwrap().push(call);
        if self.failing.lock().unwrap().contains(command) {
            return Err(PhosphorError::command(command, "fake failure"));
        }
        Ok(())
    }
}

impl MediaEngine for FakeEngine {
    fn replace_media(&self, path: &Path) -> Result<()> {
        self.record("replace_media", EngineCall::ReplaceMedia(path.to_path_buf()))
    }

    fn set_paused(&self, paused: bool) -> Result<()> {
        self.record("set_paused", EngineCall::SetPaused(paused))
    }

    fn set_shader_chain(&self, shaders: &[PathBuf]) -> Result<()> {
        self.record("set_shader_chain", EngineCall::SetShaderChain(shaders.to_vec()))
    }

    fn observe(&self, property: &str, observer: FlagObserver) -> Result<()> {
        self.record("observe", EngineCall::Observe(property.to_string()))?;
        self.observers
            .lock()
            .unwrap()
            .insert(property.to_string(), observer);
        Ok(())
    }

    fn unobserve(&self, property: &str) -> Result<()> {
        self.observers.lock().unwrap().remove(property);
        self.record("unobserve", EngineCall::Unobserve(property.to_string()))
    }

    fn shutdown(&self) -> Result<()> {
        self.record("shutdown", EngineCall::Shutdown)
    }
}

#[derive(Default)]
pub(crate) struct FakeFactory {
    engines: Mutex<Vec<Arc<FakeEngine>>>,
    options: Mutex<Vec<EngineOptions>>,
    unavailable: AtomicBool,
    failing: Mutex<Vec<&'static str>>,
    create_delay: Mutex<Option<Duration>>,
    attempts: AtomicUsize,
}

impl FakeFactory {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Engines created from now on fail `command`.
    pub(crate) fn fail_on_new_engines(&self, command: &'static str) {
        self.failing.lock().unwrap().push(command);
    }

    /// Makes every later `create` call sleep for `delay` first.
    pub(crate) fn set_create_delay(&self, delay: Duration) {
        *self.create_delay.lock().unwrap() = Some(delay);
    }

    /// Number of `create` calls that have started, including unfinished ones.
    pub(crate) fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub(crate) fn created(&self) -> usize {
        self.engines.lock().unwrap().len()
    }

    pub(crate) fn engine(&self, index: usize) -> Arc<FakeEngine> {
        self.engines.lock().unwrap()[index].clone()
    }

    pub(crate) fn options(&self) -> Vec<EngineOptions> {
        self.options.lock().unwrap().clone()
    }
}

impl EngineFactory for FakeFactory {
    fn create(&self, options: &EngineOptions) -> Result<Arc<dyn MediaEngine>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let delay = *self.create_delay.lock().unwrap();
        if let Some(delay) = delay {
            thread::sleep(delay);
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(PhosphorError::EngineUnavailable("fake engine missing".into()));
        }
        let engine = Arc::new(FakeEngine::default());
        for command in self.failing.lock().unwrap().iter() {
            engine.fail(*command);
        }
        self.engines.lock().unwrap().push(engine.clone());
        self.options.lock().unwrap().push(options.clone());
        Ok(engine)
    }
}

#[derive(Default)]
pub(crate) struct RecordingReporter {
    reports: Mutex<Vec<(String, String)>>,
}

impl RecordingReporter {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn reports(&self) -> Vec<(String, String)> {
        self.reports.lock().unwrap().clone()
    }

    pub(crate) fn titles(&self) -> Vec<String> {
        self.reports().into_iter().map(|(title, _)| title).collect()
    }
}

impl ErrorReporter for RecordingReporter {
    fn report_error(&self, title: &str, message: &str) {
        self.reports
            .lock()
            .unwrap()
            .push((title.to_string(), message.to_string()));
    }
}

/// Polls `condition` until it holds or two seconds pass.
pub(crate) fn wait_until(condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}
