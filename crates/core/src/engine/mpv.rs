use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use crate::Result;

use super::{EngineFactory, EngineOptions, MediaEngine, OutputMode};

const STARTUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Spawns the `mpv` executable and drives it over its JSON IPC socket.
#[derive(Debug, Clone)]
pub struct MpvProcessFactory {
    program: PathBuf,
    socket_dir: PathBuf,
    startup_timeout: Duration,
}

impl Default for MpvProcessFactory {
    fn default() -> Self {
        Self::new("mpv")
    }
}

impl MpvProcessFactory {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            socket_dir: std::env::temp_dir(),
            startup_timeout: STARTUP_TIMEOUT,
        }
    }

    pub fn with_socket_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.socket_dir = dir.into();
        self
    }

    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Command line for an engine built from `options`, listening on `socket`.
    pub fn arguments(options: &EngineOptions, socket: &Path) -> Vec<String> {
        let mut args = vec![
            "--idle=yes".to_string(),
            "--no-terminal".to_string(),
            format!("--input-ipc-server={}", socket.display()),
            format!("--keep-open={}", yes_no(options.keep_open)),
            format!("--pause={}", yes_no(options.start_paused)),
            format!("--hwdec={}", if options.hardware_decoding { "auto" } else { "no" }),
            format!("--osc={}", yes_no(options.on_screen_controller)),
            format!("--input-builtin-bindings={}", yes_no(options.input.builtin)),
            format!("--input-default-bindings={}", yes_no(options.input.default)),
            format!("--input-vo-keyboard={}", yes_no(options.input.vo_keyboard)),
            "--vo=gpu".to_string(),
        ];

        if let OutputMode::Embedded { window } = options.output {
            args.push("--gpu-api=opengl".to_string());
            args.push(format!("--wid={window}"));
        }

        if let Some(filter) = &options.audio_filter {
            args.push(format!("--af={}", filter.to_lavfi()));
        }

        args
    }
}

impl EngineFactory for MpvProcessFactory {
    fn create(&self, options: &EngineOptions) -> Result<Arc<dyn MediaEngine>> {
        #[cfg(unix)]
        {
            let engine = ipc::MpvIpcEngine::spawn(
                &self.program,
                &self.socket_dir,
                self.startup_timeout,
                options,
            )?;
            Ok(Arc::new(engine))
        }

        #[cfg(not(unix))]
        {
            let _ = options;
            Err(crate::PhosphorError::EngineUnavailable(format!(
                "`{}` IPC control is only available on unix hosts",
                self.program.display()
            )))
        }
    }
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

#[cfg(unix)]
mod ipc {
    use std::{
        collections::HashMap,
        fs,
        io::{BufRead, BufReader, Write},
        net::Shutdown,
        os::unix::net::UnixStream,
        path::{Path, PathBuf},
        process::{self, Child, Command, Stdio},
        sync::{
            atomic::{AtomicBool, AtomicU64, Ordering},
            Arc, Mutex, MutexGuard,
        },
        thread::{self, JoinHandle},
        time::{Duration, Instant},
    };

    use crossbeam_channel::{RecvTimeoutError, Sender};
    use serde_json::{json, Value};
    use tracing::{debug, info, trace, warn};

    use super::MpvProcessFactory;
    use crate::engine::{
        forward_engine_log, EngineOptions, FlagObserver, MediaEngine, FILE_READY_PROPERTY,
    };
    use crate::{PhosphorError, Result};

    const REPLY_TIMEOUT: Duration = Duration::from_secs(5);
    const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);
    const POLL_INTERVAL: Duration = Duration::from_millis(25);

    static SOCKET_COUNTER: AtomicU64 = AtomicU64::new(0);

    /// State shared between the engine and its socket reader thread.
    #[derive(Default)]
    struct IpcShared {
        pending: Mutex<HashMap<u64, Sender<Value>>>,
        observers: Mutex<HashMap<String, FlagObserver>>,
        property_ids: Mutex<HashMap<u64, String>>,
        closed: AtomicBool,
    }

    impl IpcShared {
        fn lock_pending(&self) -> Result<MutexGuard<'_, HashMap<u64, Sender<Value>>>> {
            self.pending
                .lock()
                .map_err(|_| PhosphorError::poisoned("mpv request table"))
        }

        fn lock_observers(&self) -> Result<MutexGuard<'_, HashMap<String, FlagObserver>>> {
            self.observers
                .lock()
                .map_err(|_| PhosphorError::poisoned("mpv observer table"))
        }

        fn lock_property_ids(&self) -> Result<MutexGuard<'_, HashMap<u64, String>>> {
            self.property_ids
                .lock()
                .map_err(|_| PhosphorError::poisoned("mpv property table"))
        }

        fn dispatch(&self, message: Value) {
            if let Some(id) = message.get("request_id").and_then(Value::as_u64) {
                let waiter = self
                    .lock_pending()
                    .ok()
                    .and_then(|mut pending| pending.remove(&id));
                match waiter {
                    Some(waiter) => {
                        let _ = waiter.send(message);
                    }
                    None => trace!(id, "reply for abandoned mpv request"),
                }
                return;
            }

            match message.get("event").and_then(Value::as_str) {
                Some("log-message") => forward_engine_log(
                    str_field(&message, "level"),
                    str_field(&message, "prefix"),
                    str_field(&message, "text"),
                ),
                Some("file-loaded") => self.notify(FILE_READY_PROPERTY, true),
                Some("start-file") | Some("end-file") => self.notify(FILE_READY_PROPERTY, false),
                Some("property-change") => {
                    let name = message
                        .get("id")
                        .and_then(Value::as_u64)
                        .and_then(|id| self.lock_property_ids().ok()?.get(&id).cloned());
                    if let Some(name) = name {
                        let value = flag_value(message.get("data").unwrap_or(&Value::Null));
                        self.notify(&name, value);
                    }
                }
                Some("shutdown") => {
                    debug!("mpv announced shutdown");
                    self.closed.store(true, Ordering::SeqCst);
                }
                Some(event) => trace!(event, "unhandled mpv event"),
                None => trace!(%message, "mpv message without event or request id"),
            }
        }

        fn notify(&self, property: &str, value: bool) {
            let observer = match self.lock_observers() {
                Ok(observers) => observers.get(property).cloned(),
                Err(err) => {
                    warn!(%err, "dropping mpv notification");
                    None
                }
            };
            if let Some(observer) = observer {
                observer(value);
            }
        }

        fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
            // Dropping the senders wakes every waiting requester.
            if let Ok(mut pending) = self.lock_pending() {
                pending.clear();
            }
        }
    }

    fn str_field<'a>(message: &'a Value, key: &str) -> &'a str {
        message.get(key).and_then(Value::as_str).unwrap_or_default()
    }

    fn flag_value(value: &Value) -> bool {
        match value {
            Value::Null => false,
            Value::Bool(flag) => *flag,
            Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
            Value::String(text) => !text.is_empty() && text != "no",
            _ => true,
        }
    }

    /// An `mpv` child process controlled through its IPC socket.
    pub(super) struct MpvIpcEngine {
        child: Mutex<Child>,
        writer: Mutex<UnixStream>,
        shared: Arc<IpcShared>,
        reader: Mutex<Option<JoinHandle<()>>>,
        socket_path: PathBuf,
        next_id: AtomicU64,
    }

    impl MpvIpcEngine {
        pub(super) fn spawn(
            program: &Path,
            socket_dir: &Path,
            startup_timeout: Duration,
            options: &EngineOptions,
        ) -> Result<Self> {
            let socket_path = socket_dir.join(format!(
                "phosphor-mpv-{}-{}.sock",
                process::id(),
                SOCKET_COUNTER.fetch_add(1, Ordering::Relaxed)
            ));
            let _ = fs::remove_file(&socket_path);

            let args = MpvProcessFactory::arguments(options, &socket_path);
            debug!(program = %program.display(), ?args, "spawning mpv");
            let mut child = Command::new(program)
                .args(&args)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .spawn()
                .map_err(|err| {
                    PhosphorError::EngineUnavailable(format!(
                        "could not start `{}`: {err}",
                        program.display()
                    ))
                })?;

            let connected = connect(&mut child, &socket_path, startup_timeout).and_then(|stream| {
                let reader_stream = stream.try_clone().map_err(|err| {
                    PhosphorError::EngineUnavailable(format!("could not clone IPC socket: {err}"))
                })?;
                Ok((stream, reader_stream))
            });
            let (stream, reader_stream) = match connected {
                Ok(streams) => streams,
                Err(err) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    let _ = fs::remove_file(&socket_path);
                    return Err(err);
                }
            };

            let shared = Arc::new(IpcShared::default());
            let reader_shared = shared.clone();
            let reader = thread::Builder::new()
                .name("phosphor-mpv-ipc".to_string())
                .spawn(move || read_loop(reader_stream, reader_shared));

            let engine = Self {
                child: Mutex::new(child),
                writer: Mutex::new(stream),
                shared,
                reader: Mutex::new(None),
                socket_path,
                next_id: AtomicU64::new(1),
            };

            match reader {
                Ok(handle) => {
                    if let Ok(mut slot) = engine.reader.lock() {
                        *slot = Some(handle);
                    }
                }
                Err(err) => {
                    return Err(PhosphorError::EngineUnavailable(format!(
                        "could not start IPC reader: {err}"
                    )));
                }
            }

            engine
                .request(json!(["request_log_messages", options.log_level.as_str()]))
                .map_err(|err| PhosphorError::EngineUnavailable(err.to_string()))?;

            info!(socket = %engine.socket_path.display(), "mpv started");
            Ok(engine)
        }

        fn request(&self, command: Value) -> Result<Value> {
            let name = command
                .get(0)
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string();

            if self.shared.closed.load(Ordering::SeqCst) {
                return Err(PhosphorError::command(name, "IPC connection closed"));
            }

            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            let (tx, rx) = crossbeam_channel::bounded(1);
            self.shared.lock_pending()?.insert(id, tx);

            let mut line = serde_json::to_string(&json!({ "command": command, "request_id": id }))?;
            line.push('\n');
            let written = self
                .writer
                .lock()
                .map_err(|_| PhosphorError::poisoned("mpv IPC writer"))
                .and_then(|mut writer| Ok(writer.write_all(line.as_bytes())?));
            if let Err(err) = written {
                self.forget(id);
                return Err(PhosphorError::command(name, err));
            }

            let reply = match rx.recv_timeout(REPLY_TIMEOUT) {
                Ok(reply) => reply,
                Err(RecvTimeoutError::Timeout) => {
                    self.forget(id);
                    return Err(PhosphorError::command(name, "timed out waiting for reply"));
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(PhosphorError::command(name, "IPC connection closed"));
                }
            };

            match reply.get("error").and_then(Value::as_str) {
                Some("success") => Ok(reply.get("data").cloned().unwrap_or(Value::Null)),
                Some(error) => Err(PhosphorError::command(name, error)),
                None => Err(PhosphorError::command(name, "malformed reply")),
            }
        }

        fn forget(&self, id: u64) {
            if let Ok(mut pending) = self.shared.lock_pending() {
                pending.remove(&id);
            }
        }

        fn wait_for_exit(&self, grace: Duration) -> Result<()> {
            let mut child = self
                .child
                .lock()
                .map_err(|_| PhosphorError::poisoned("mpv child process"))?;
            let deadline = Instant::now() + grace;
            loop {
                if child.try_wait()?.is_some() {
                    return Ok(());
                }
                if Instant::now() >= deadline {
                    warn!("mpv did not exit in time; killing it");
                    child.kill()?;
                    child.wait()?;
                    return Ok(());
                }
                thread::sleep(POLL_INTERVAL);
            }
        }

        fn close_socket(&self) {
            if let Ok(writer) = self.writer.lock() {
                let _ = writer.shutdown(Shutdown::Both);
            }
            let _ = fs::remove_file(&self.socket_path);
        }
    }

    impl MediaEngine for MpvIpcEngine {
        fn replace_media(&self, path: &Path) -> Result<()> {
            let path = path.to_string_lossy();
            self.request(json!(["loadfile", path, "replace"]))?;
            Ok(())
        }

        fn set_paused(&self, paused: bool) -> Result<()> {
            self.request(json!(["set_property", "pause", paused]))?;
            Ok(())
        }

        fn set_shader_chain(&self, shaders: &[PathBuf]) -> Result<()> {
            let shaders: Vec<String> = shaders
                .iter()
                .map(|path| path.to_string_lossy().into_owned())
                .collect();
            self.request(json!(["set_property", "glsl-shaders", shaders]))?;
            Ok(())
        }

        fn observe(&self, property: &str, observer: FlagObserver) -> Result<()> {
            if property != FILE_READY_PROPERTY {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                self.shared
                    .lock_property_ids()?
                    .insert(id, property.to_string());
                self.request(json!(["observe_property", id, property]))?;
            }
            self.shared
                .lock_observers()?
                .insert(property.to_string(), observer);
            Ok(())
        }

        fn unobserve(&self, property: &str) -> Result<()> {
            self.shared.lock_observers()?.remove(property);

            let id = {
                let mut ids = self.shared.lock_property_ids()?;
                let id = ids
                    .iter()
                    .find(|(_, name)| name.as_str() == property)
                    .map(|(id, _)| *id);
                if let Some(id) = id {
                    ids.remove(&id);
                }
                id
            };
            if let Some(id) = id {
                self.request(json!(["unobserve_property", id]))?;
            }
            Ok(())
        }

        fn shutdown(&self) -> Result<()> {
            if let Err(err) = self.request(json!(["quit"])) {
                debug!(%err, "quit was not acknowledged");
            }
            let exited = self.wait_for_exit(SHUTDOWN_GRACE);
            self.close_socket();
            self.shared.close();

            let reader = self.reader.lock().ok().and_then(|mut slot| slot.take());
            if let Some(reader) = reader {
                if reader.thread().id() != thread::current().id() {
                    let _ = reader.join();
                }
            }
            exited
        }
    }

    impl Drop for MpvIpcEngine {
        fn drop(&mut self) {
            if let Ok(mut child) = self.child.lock() {
                if matches!(child.try_wait(), Ok(None)) {
                    debug!("killing mpv left running at drop");
                    let _ = child.kill();
                    let _ = child.wait();
                }
            }
            self.close_socket();
        }
    }

    fn connect(child: &mut Child, socket: &Path, timeout: Duration) -> Result<UnixStream> {
        let started = Instant::now();
        loop {
            if let Some(status) = child.try_wait()? {
                return Err(PhosphorError::EngineUnavailable(format!(
                    "mpv exited during startup ({status})"
                )));
            }
            match UnixStream::connect(socket) {
                Ok(stream) => return Ok(stream),
                Err(err) if started.elapsed() >= timeout => {
                    return Err(PhosphorError::EngineUnavailable(format!(
                        "timed out waiting for IPC socket {}: {err}",
                        socket.display()
                    )));
                }
                Err(_) => thread::sleep(POLL_INTERVAL),
            }
        }
    }

    fn read_loop(stream: UnixStream, shared: Arc<IpcShared>) {
        for line in BufReader::new(stream).lines() {
            let line = match line {
                Ok(line) => line,
                Err(err) => {
                    debug!(%err, "mpv IPC read failed");
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Value>(&line) {
                Ok(message) => shared.dispatch(message),
                Err(err) => warn!(%err, "discarding malformed mpv IPC message"),
            }
        }
        shared.close();
        debug!("mpv IPC reader finished");
    }

    #[cfg(test)]
    mod tests {
        use std::sync::atomic::AtomicUsize;

        use super::*;

        #[test]
        fn replies_are_routed_to_waiting_requests() {
            let shared = IpcShared::default();
            let (tx, rx) = crossbeam_channel::bounded(1);
            shared.lock_pending().unwrap().insert(7, tx);

            shared.dispatch(json!({ "request_id": 7, "error": "success", "data": true }));

            let reply = rx.try_recv().expect("reply should be delivered");
            assert_eq!(reply["data"], json!(true));
            assert!(shared.lock_pending().unwrap().is_empty());
        }

        #[test]
        fn file_events_drive_the_file_ready_observer() {
            let shared = IpcShared::default();
            let seen = Arc::new(Mutex::new(Vec::new()));
            let sink = seen.clone();
            shared.lock_observers().unwrap().insert(
                FILE_READY_PROPERTY.to_string(),
                Arc::new(move |ready: bool| sink.lock().unwrap().push(ready)),
            );

            shared.dispatch(json!({ "event": "start-file" }));
            shared.dispatch(json!({ "event": "file-loaded" }));
            shared.dispatch(json!({ "event": "end-file", "reason": "eof" }));

            assert_eq!(*seen.lock().unwrap(), vec![false, true, false]);
        }

        #[test]
        fn property_changes_map_back_to_names() {
            let shared = IpcShared::default();
            let hits = Arc::new(AtomicUsize::new(0));
            let counter = hits.clone();
            shared.lock_property_ids().unwrap().insert(3, "pause".to_string());
            shared.lock_observers().unwrap().insert(
                "pause".to_string(),
                Arc::new(move |paused: bool| {
                    if paused {
                        counter.fetch_add(1, Ordering::SeqCst);
                    }
                }),
            );

            shared.dispatch(json!({ "event": "property-change", "id": 3, "name": "pause", "data": true }));
            shared.dispatch(json!({ "event": "property-change", "id": 9, "name": "other", "data": true }));

            assert_eq!(hits.load(Ordering::SeqCst), 1);
        }

        #[test]
        fn closing_wakes_pending_requests() {
            let shared = IpcShared::default();
            let (tx, rx) = crossbeam_channel::bounded::<Value>(1);
            shared.lock_pending().unwrap().insert(1, tx);

            shared.close();

            assert!(matches!(
                rx.recv_timeout(Duration::from_millis(10)),
                Err(RecvTimeoutError::Disconnected)
            ));
            assert!(shared.closed.load(Ordering::SeqCst));
        }

        #[test]
        fn missing_program_is_reported_as_unavailable() {
            let dir = tempfile::tempdir().unwrap();
            let result = MpvIpcEngine::spawn(
                &dir.path().join("no-such-mpv"),
                dir.path(),
                Duration::from_millis(100),
                &EngineOptions::default(),
            );

            assert!(matches!(result, Err(PhosphorError::EngineUnavailable(_))));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioFilterSpec;

    #[test]
    fn standalone_arguments_use_gpu_output() {
        let args = MpvProcessFactory::arguments(&EngineOptions::default(), Path::new("/tmp/s.sock"));

        assert!(args.contains(&"--vo=gpu".to_string()));
        assert!(args.contains(&"--input-ipc-server=/tmp/s.sock".to_string()));
        assert!(args.contains(&"--pause=yes".to_string()));
        assert!(args.contains(&"--hwdec=no".to_string()));
        assert!(!args.iter().any(|arg| arg.starts_with("--wid=")));
        assert!(!args.iter().any(|arg| arg.starts_with("--af=")));
    }

    #[test]
    fn embedded_arguments_carry_window_and_audio_filter() {
        let options = EngineOptions {
            output: OutputMode::Embedded { window: 4242 },
            audio_filter: Some(AudioFilterSpec::retro()),
            ..EngineOptions::default()
        };
        let args = MpvProcessFactory::arguments(&options, Path::new("/tmp/s.sock"));

        assert!(args.contains(&"--wid=4242".to_string()));
        assert!(args.contains(&"--gpu-api=opengl".to_string()));
        let filter = args
            .iter()
            .find(|arg| arg.starts_with("--af="))
            .expect("audio filter should be passed");
        assert!(filter.starts_with("--af=lavfi=[highpass=f=150"));
    }
}
