//! Polling tail watcher.
//!
//! A `TailWatcher` samples one file's length and modification time on a
//! background thread. Growth triggers an incremental reload: the sink is asked
//! how many lines it already holds, the file is re-read and only the lines
//! past that count are appended. Shrinking triggers a full reload. Each
//! reload holds the sink lock from first read to `batch_complete`, so two
//! reloads never interleave.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::SystemTime;

use async_channel::{Receiver, Sender, TrySendError};
use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, warn};

use crate::config::WatchConfig;
use crate::error::{Result, TailError};
use crate::file_loader::LoadedFile;
use crate::line_sink::{LineSink, NullSink};

pub const NO_LOG_FILE: &str = "No log file";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    Stopped,
    Starting,
    Polling,
    Reloading,
}

/// What a poll compares between ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStamp {
    pub len: u64,
    pub modified: Option<SystemTime>,
}

impl FileStamp {
    pub fn of(path: &Path) -> io::Result<Self> {
        fs::metadata(path).map(|meta| Self::from_metadata(&meta))
    }

    fn from_metadata(meta: &fs::Metadata) -> Self {
        Self {
            len: meta.len(),
            modified: meta.modified().ok(),
        }
    }
}

/// Notifications for observers of a watcher. Line data only ever goes
/// through the sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// Sent after the reload for this change has reached the sink
    Changed { old_len: u64, new_len: u64 },
    /// Sampling or reading the file failed; polling continues
    ReadFailed {
        path: PathBuf,
        kind: io::ErrorKind,
        message: String,
    },
}

/// Result of a single poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing attached, or the watcher is stopped
    Idle,
    Unchanged,
    Reloaded {
        old_len: u64,
        new_len: u64,
        full: bool,
        appended: usize,
    },
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReloadKind {
    Full,
    Incremental,
}

struct WatchedFile {
    path: PathBuf,
    stamp: FileStamp,
}

struct Shared {
    // lock order: sink, then file
    sink: Mutex<Box<dyn LineSink>>,
    file: Mutex<Option<WatchedFile>>,
    listeners: Mutex<Vec<Sender<WatchEvent>>>,
    state: Mutex<WatcherState>,
    cancelled: Mutex<bool>,
    wake: Condvar,
}

impl Shared {
    fn set_state(&self, state: WatcherState) {
        *self.state.lock() = state;
    }

    fn current_path(&self) -> Option<PathBuf> {
        self.file.lock().as_ref().map(|f| f.path.clone())
    }

    fn load(&self) -> Result<usize> {
        let mut sink = self.sink.lock();
        let Some(path) = self.current_path() else {
            return Ok(0);
        };

        let stamp = FileStamp::of(&path).map_err(|e| TailError::transient(&path, e))?;
        let appended = reload(&mut **sink, &path, ReloadKind::Full)?;
        if let Some(file) = self.file.lock().as_mut() {
            file.stamp = stamp;
        }
        debug!(path = %path.display(), lines = appended, "full load");
        Ok(appended)
    }

    fn tick(&self) -> TickOutcome {
        let mut sink = self.sink.lock();
        let Some((path, last)) = self
            .file
            .lock()
            .as_ref()
            .map(|f| (f.path.clone(), f.stamp))
        else {
            return TickOutcome::Idle;
        };

        let current = match FileStamp::of(&path) {
            Ok(stamp) => stamp,
            Err(err) => {
                drop(sink);
                self.report(TailError::transient(&path, err));
                return TickOutcome::Failed;
            }
        };
        if current == last {
            return TickOutcome::Unchanged;
        }

        let kind = if current.len < last.len {
            ReloadKind::Full
        } else {
            ReloadKind::Incremental
        };

        self.set_state(WatcherState::Reloading);
        let result = reload(&mut **sink, &path, kind);
        self.set_state(WatcherState::Polling);

        match result {
            Ok(appended) => {
                if let Some(file) = self.file.lock().as_mut() {
                    file.stamp = current;
                }
                drop(sink);
                debug!(
                    path = %path.display(),
                    old_len = last.len,
                    new_len = current.len,
                    ?kind,
                    appended,
                    "reloaded"
                );
                self.emit(WatchEvent::Changed {
                    old_len: last.len,
                    new_len: current.len,
                });
                TickOutcome::Reloaded {
                    old_len: last.len,
                    new_len: current.len,
                    full: kind == ReloadKind::Full,
                    appended,
                }
            }
            Err(err) => {
                drop(sink);
                self.report(err);
                TickOutcome::Failed
            }
        }
    }

    fn report(&self, err: TailError) {
        warn!("{}", err);
        if let TailError::TransientRead { path, source } = &err {
            self.emit(WatchEvent::ReadFailed {
                path: path.clone(),
                kind: source.kind(),
                message: source.to_string(),
            });
        }
    }

    fn emit(&self, event: WatchEvent) {
        self.listeners
            .lock()
            .retain(|tx| match tx.try_send(event.clone()) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    warn!("listener queue full, dropping event");
                    true
                }
                Err(TrySendError::Closed(_)) => false,
            });
    }
}

/// Reads `path` and pushes its lines into `sink`. The whole file is read
/// before the sink is touched, so a failed read leaves the sink as it was.
fn reload(sink: &mut dyn LineSink, path: &Path, kind: ReloadKind) -> Result<usize> {
    let loaded = LoadedFile::read(path).map_err(|e| TailError::transient(path, e))?;

    let skip = match kind {
        ReloadKind::Full => {
            sink.clear();
            0
        }
        ReloadKind::Incremental => sink.line_count(),
    };

    let mut appended = 0;
    for line in loaded.lines_from(skip) {
        sink.append(line);
        appended += 1;
    }
    sink.batch_complete();

    Ok(appended)
}

fn poll_loop(shared: Arc<Shared>, config: WatchConfig) {
    loop {
        {
            let mut cancelled = shared.cancelled.lock();
            if !*cancelled {
                shared.wake.wait_for(&mut cancelled, config.poll_interval);
            }
            if *cancelled {
                break;
            }
        }
        shared.tick();
    }
    debug!("poll loop exited");
}

/// Checks that `path` can be tailed and returns its current stamp.
fn validate(path: &Path) -> Result<FileStamp> {
    let meta = fs::metadata(path).map_err(|e| TailError::from_open(path, e))?;
    if !meta.is_file() {
        return Err(TailError::NotAFile {
            path: path.to_path_buf(),
        });
    }
    File::open(path).map_err(|e| TailError::from_open(path, e))?;
    Ok(FileStamp::from_metadata(&meta))
}

pub struct TailWatcher {
    config: WatchConfig,
    shared: Arc<Shared>,
    poller: Option<JoinHandle<()>>,
}

impl TailWatcher {
    pub fn new(config: WatchConfig) -> Self {
        Self::with_sink(config, NullSink)
    }

    pub fn with_sink<S: LineSink + 'static>(config: WatchConfig, sink: S) -> Self {
        Self {
            config,
            shared: Arc::new(Shared {
                sink: Mutex::new(Box::new(sink)),
                file: Mutex::new(None),
                listeners: Mutex::new(Vec::new()),
                state: Mutex::new(WatcherState::Stopped),
                cancelled: Mutex::new(false),
                wake: Condvar::new(),
            }),
            poller: None,
        }
    }

    /// Replaces the consumer. Waits for any reload in progress.
    pub fn set_sink<S: LineSink + 'static>(&self, sink: S) {
        *self.shared.sink.lock() = Box::new(sink);
    }

    pub fn add_listener(&self, listener: Sender<WatchEvent>) {
        self.shared.listeners.lock().push(listener);
    }

    pub fn subscribe(&self) -> Receiver<WatchEvent> {
        let (tx, rx) = async_channel::unbounded();
        self.add_listener(tx);
        rx
    }

    /// Attaches `path`, loads it into the sink and starts polling.
    ///
    /// Any running poll loop is stopped first. Errors opening the file are
    /// returned here rather than through the event channel.
    pub fn start<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.stop();

        let path = path.as_ref().to_path_buf();
        self.shared.set_state(WatcherState::Starting);

        if let Err(err) = self.attach_and_load(&path) {
            *self.shared.file.lock() = None;
            self.shared.set_state(WatcherState::Stopped);
            return Err(err);
        }

        let shared = Arc::clone(&self.shared);
        let config = self.config;
        let spawned = thread::Builder::new()
            .name("followtail-poll".to_string())
            .spawn(move || poll_loop(shared, config));

        match spawned {
            Ok(handle) => {
                self.poller = Some(handle);
                self.shared.set_state(WatcherState::Polling);
                info!(
                    path = %path.display(),
                    interval_ms = self.config.poll_interval.as_millis() as u64,
                    "watching"
                );
                Ok(())
            }
            Err(err) => {
                self.shared.set_state(WatcherState::Stopped);
                Err(TailError::Io(err))
            }
        }
    }

    fn attach_and_load(&self, path: &Path) -> Result<()> {
        let stamp = validate(path)?;
        *self.shared.file.lock() = Some(WatchedFile {
            path: path.to_path_buf(),
            stamp,
        });
        self.shared.load()?;
        Ok(())
    }

    /// Stops the poll loop and waits for it to exit. A reload already in
    /// progress is allowed to finish.
    pub fn stop(&mut self) {
        let Some(handle) = self.poller.take() else {
            return;
        };

        *self.shared.cancelled.lock() = true;
        self.shared.wake.notify_all();

        if handle.thread().id() != thread::current().id() && handle.join().is_err() {
            warn!("poll thread panicked");
        }

        *self.shared.cancelled.lock() = false;
        self.shared.set_state(WatcherState::Stopped);
        if let Some(path) = self.shared.current_path() {
            info!(path = %path.display(), "stopped watching");
        }
    }

    /// Clears the sink and reads the whole file again.
    pub fn load(&self) -> Result<usize> {
        self.shared.load()
    }

    /// Runs one poll on the calling thread, serialized with the poll loop.
    pub fn poll_once(&self) -> TickOutcome {
        if self.state() == WatcherState::Stopped {
            return TickOutcome::Idle;
        }
        self.shared.tick()
    }

    pub fn state(&self) -> WatcherState {
        *self.shared.state.lock()
    }

    pub fn is_running(&self) -> bool {
        self.poller.is_some()
    }

    pub fn config(&self) -> WatchConfig {
        self.config
    }

    pub fn path(&self) -> Option<PathBuf> {
        self.shared.current_path()
    }

    pub fn file_name(&self) -> String {
        self.path()
            .as_deref()
            .and_then(Path::file_name)
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| NO_LOG_FILE.to_string())
    }
}

impl Drop for TailWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}
