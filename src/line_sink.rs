use std::sync::Arc;

use parking_lot::Mutex;

use crate::file_loader::Line;

/// Consumer of the lines a watcher reads.
///
/// The watcher asks the sink how many lines it holds to decide what is new,
/// so `line_count` must reflect every `append` immediately.
pub trait LineSink: Send {
    /// Appends one line after all previously appended lines
    fn append(&mut self, line: Line);

    /// Drops every line; called at the start of a full reload
    fn clear(&mut self);

    fn line_count(&self) -> usize;

    /// Called once per reload, after its last `append`
    fn batch_complete(&mut self);
}

/// Sink used when nothing is attached. Ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl LineSink for NullSink {
    fn append(&mut self, _line: Line) {}

    fn clear(&mut self) {}

    fn line_count(&self) -> usize {
        0
    }

    fn batch_complete(&mut self) {}
}

/// In-memory line store.
#[derive(Debug, Default)]
pub struct LineBuffer {
    lines: Vec<Line>,
    batches: usize,
    widest: usize,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    pub fn get_lines(&self, start_line: usize, count: usize) -> &[Line] {
        let start = start_line.min(self.lines.len());
        let end = start_line.saturating_add(count).min(self.lines.len());
        &self.lines[start..end]
    }

    /// Number of completed reloads seen so far.
    pub fn batches(&self) -> usize {
        self.batches
    }

    /// Width in characters of the longest line, as of the last completed batch.
    pub fn widest_line(&self) -> usize {
        self.widest
    }
}

impl LineSink for LineBuffer {
    fn append(&mut self, line: Line) {
        self.lines.push(line);
    }

    fn clear(&mut self) {
        self.lines.clear();
        self.widest = 0;
    }

    fn line_count(&self) -> usize {
        self.lines.len()
    }

    fn batch_complete(&mut self) {
        self.batches += 1;
        self.widest = self
            .lines
            .iter()
            .map(|l| l.as_str().chars().count())
            .max()
            .unwrap_or(0);
    }
}

/// Lets a consumer keep a handle on the sink it gave to a watcher.
impl<S: LineSink> LineSink for Arc<Mutex<S>> {
    fn append(&mut self, line: Line) {
        self.lock().append(line);
    }

    fn clear(&mut self) {
        self.lock().clear();
    }

    fn line_count(&self) -> usize {
        self.lock().line_count()
    }

    fn batch_complete(&mut self) {
        self.lock().batch_complete();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(text: &str) -> Line {
        Line::from_bytes(text.as_bytes())
    }

    #[test]
    fn test_null_sink_reports_nothing() {
        let mut sink = NullSink;
        sink.append(line("ignored"));
        sink.batch_complete();
        assert_eq!(sink.line_count(), 0);
    }

    #[test]
    fn test_buffer_append_and_clear() {
        let mut buffer = LineBuffer::new();
        buffer.append(line("a"));
        buffer.append(line("bb"));
        assert_eq!(buffer.line_count(), 2);
        assert_eq!(buffer.widest_line(), 0);

        buffer.batch_complete();
        assert_eq!(buffer.batches(), 1);
        assert_eq!(buffer.widest_line(), 2);

        buffer.clear();
        assert_eq!(buffer.line_count(), 0);
        assert_eq!(buffer.widest_line(), 0);
        assert_eq!(buffer.batches(), 1);
    }

    #[test]
    fn test_buffer_get_lines_clamps() {
        let mut buffer = LineBuffer::new();
        for i in 0..5 {
            buffer.append(line(&format!("line {}", i)));
        }

        let window = buffer.get_lines(3, 10);
        assert_eq!(window.len(), 2);
        assert_eq!(window[0].as_str(), "line 3");
        assert!(buffer.get_lines(7, 2).is_empty());
    }

    #[test]
    fn test_shared_buffer_count_is_immediate() {
        let shared = Arc::new(Mutex::new(LineBuffer::new()));
        let mut handle = Arc::clone(&shared);

        handle.append(line("x"));
        assert_eq!(handle.line_count(), 1);
        assert_eq!(shared.lock().lines()[0].as_str(), "x");
    }
}
