//! Live log-file follower.
//!
//! A [`TailWatcher`] polls one file and feeds its lines, in order, into a
//! [`LineSink`]. Growth is read incrementally, shrinking (truncation or
//! rotation) reloads from the start. [`Viewer`] is the slot that owns a sink
//! and swaps watchers when another file is attached.

pub mod config;
pub mod error;
pub mod file_loader;
pub mod highlight;
pub mod line_sink;
pub mod viewer;
pub mod watcher;

pub use config::WatchConfig;
pub use error::{Result, TailError};
pub use file_loader::{Line, LoadedFile, TAB_IN_SPACES};
pub use highlight::{Color, HighlightRule, Highlighter};
pub use line_sink::{LineBuffer, LineSink, NullSink};
pub use viewer::Viewer;
pub use watcher::{FileStamp, TailWatcher, TickOutcome, WatchEvent, WatcherState, NO_LOG_FILE};
