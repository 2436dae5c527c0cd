use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_channel::{Receiver, Sender};
use parking_lot::Mutex;
use tracing::info;

use crate::config::WatchConfig;
use crate::error::Result;
use crate::line_sink::{LineBuffer, LineSink};
use crate::watcher::{TailWatcher, WatchEvent, NO_LOG_FILE};

/// A display slot: one sink and at most one watcher feeding it.
///
/// Attaching a new file stops and joins the previous watcher before the new
/// one reads anything, so two poll loops never feed the same sink.
pub struct Viewer<S: LineSink + 'static = LineBuffer> {
    config: WatchConfig,
    sink: Arc<Mutex<S>>,
    watcher: Option<TailWatcher>,
    listeners: Vec<Sender<WatchEvent>>,
}

impl Viewer<LineBuffer> {
    pub fn with_buffer(config: WatchConfig) -> Self {
        Self::new(config, LineBuffer::new())
    }
}

impl<S: LineSink + 'static> Viewer<S> {
    pub fn new(config: WatchConfig, sink: S) -> Self {
        Self {
            config,
            sink: Arc::new(Mutex::new(sink)),
            watcher: None,
            listeners: Vec::new(),
        }
    }

    pub fn sink(&self) -> &Arc<Mutex<S>> {
        &self.sink
    }

    /// Events from whichever file is attached now or later.
    pub fn subscribe(&mut self) -> Receiver<WatchEvent> {
        let (tx, rx) = async_channel::unbounded();
        if let Some(watcher) = &self.watcher {
            watcher.add_listener(tx.clone());
        }
        self.listeners.push(tx);
        rx
    }

    /// Starts showing `path`. Its current content is in the sink when this
    /// returns. On failure the slot is left empty.
    pub fn attach<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.detach();
        self.listeners.retain(|tx| !tx.is_closed());

        let mut watcher = TailWatcher::with_sink(self.config, Arc::clone(&self.sink));
        for tx in &self.listeners {
            watcher.add_listener(tx.clone());
        }

        match watcher.start(path.as_ref()) {
            Ok(()) => {
                info!(file = %watcher.file_name(), "attached");
                self.watcher = Some(watcher);
                Ok(())
            }
            Err(err) => {
                let mut sink = self.sink.lock();
                sink.clear();
                sink.batch_complete();
                Err(err)
            }
        }
    }

    pub fn detach(&mut self) {
        if let Some(mut watcher) = self.watcher.take() {
            watcher.stop();
        }
    }

    /// Re-reads the attached file from scratch.
    pub fn reload(&self) -> Result<usize> {
        match &self.watcher {
            Some(watcher) => watcher.load(),
            None => Ok(0),
        }
    }

    pub fn watcher(&self) -> Option<&TailWatcher> {
        self.watcher.as_ref()
    }

    pub fn path(&self) -> Option<PathBuf> {
        self.watcher.as_ref().and_then(TailWatcher::path)
    }

    pub fn title(&self) -> String {
        match &self.watcher {
            Some(watcher) => watcher.file_name(),
            None => NO_LOG_FILE.to_string(),
        }
    }
}

impl<S: LineSink + 'static> Drop for Viewer<S> {
    fn drop(&mut self) {
        self.detach();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watcher::TickOutcome;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    fn manual() -> WatchConfig {
        WatchConfig::default().with_poll_interval(Duration::from_secs(3600))
    }

    fn texts(viewer: &Viewer) -> Vec<String> {
        viewer
            .sink()
            .lock()
            .lines()
            .iter()
            .map(|l| l.as_str().to_string())
            .collect()
    }

    #[test]
    fn test_attach_loads_before_returning() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("server.log");
        fs::write(&path, "one\ntwo\n").unwrap();

        let mut viewer = Viewer::with_buffer(manual());
        assert_eq!(viewer.title(), NO_LOG_FILE);

        viewer.attach(&path).unwrap();
        assert_eq!(texts(&viewer), vec!["one", "two"]);
        assert_eq!(viewer.title(), "server.log");
        assert_eq!(viewer.path(), Some(path));
    }

    #[test]
    fn test_failed_attach_leaves_slot_empty() {
        let dir = TempDir::new().unwrap();
        let good = dir.path().join("good.log");
        fs::write(&good, "content\n").unwrap();

        let mut viewer = Viewer::with_buffer(manual());
        viewer.attach(&good).unwrap();
        assert!(viewer.attach(dir.path().join("nope.log")).is_err());

        assert!(viewer.watcher().is_none());
        assert!(texts(&viewer).is_empty());
        assert_eq!(viewer.title(), NO_LOG_FILE);
    }

    #[test]
    fn test_switching_files_replaces_content() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.log");
        let b = dir.path().join("b.log");
        fs::write(&a, "A1\nA2\n").unwrap();
        fs::write(&b, "B1\n").unwrap();

        let mut viewer = Viewer::with_buffer(manual());
        viewer.attach(&a).unwrap();
        viewer.attach(&b).unwrap();

        assert_eq!(texts(&viewer), vec!["B1"]);
        assert_eq!(viewer.sink().lock().batches(), 2);
    }

    #[test]
    fn test_subscription_survives_reattach() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.log");
        let b = dir.path().join("b.log");
        fs::write(&a, "A1\n").unwrap();
        fs::write(&b, "B1\n").unwrap();

        let mut viewer = Viewer::with_buffer(manual());
        let events = viewer.subscribe();
        viewer.attach(&a).unwrap();
        viewer.attach(&b).unwrap();

        fs::write(&b, "B1\nB2\n").unwrap();
        let outcome = viewer.watcher().unwrap().poll_once();
        assert!(matches!(outcome, TickOutcome::Reloaded { .. }));
        assert_eq!(
            events.try_recv().unwrap(),
            WatchEvent::Changed {
                old_len: 3,
                new_len: 6
            }
        );
    }

    #[test]
    fn test_detach_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        fs::write(&path, "x\n").unwrap();

        let mut viewer = Viewer::with_buffer(manual());
        assert_eq!(viewer.reload().unwrap(), 0);

        viewer.attach(&path).unwrap();
        assert_eq!(viewer.reload().unwrap(), 1);
        assert_eq!(texts(&viewer), vec!["x"]);

        viewer.detach();
        viewer.detach();
        assert!(viewer.watcher().is_none());
        // last good content stays visible
        assert_eq!(texts(&viewer), vec!["x"]);
    }
}
