//! Transcript fan-out.
//!
//! Every piece of user-visible text goes through a [`SinkSet`] so the
//! console, a log file, and test capture all observe the same stream.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use parking_lot::Mutex;
use tracing::warn;

pub trait TranscriptSink: Send + Sync {
    /// Append text without a trailing newline, for streamed deltas.
    fn write(&self, text: &str);

    fn write_line(&self, text: &str) {
        self.write(text);
        self.write("\n");
    }
}

impl<T: TranscriptSink + ?Sized> TranscriptSink for std::sync::Arc<T> {
    fn write(&self, text: &str) {
        (**self).write(text);
    }

    fn write_line(&self, text: &str) {
        (**self).write_line(text);
    }
}

/// Stdout, flushed per write so streamed deltas appear as they arrive.
#[derive(Default)]
pub struct ConsoleSink;

impl TranscriptSink for ConsoleSink {
    fn write(&self, text: &str) {
        let mut out = std::io::stdout().lock();
        if out.write_all(text.as_bytes()).and_then(|_| out.flush()).is_err() {
            warn!("Failed to write transcript to stdout");
        }
    }
}

/// Appends the transcript to a file.
pub struct FileSink {
    file: Mutex<File>,
}

impl FileSink {
    pub fn create(path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl TranscriptSink for FileSink {
    fn write(&self, text: &str) {
        let mut file = self.file.lock();
        if file.write_all(text.as_bytes()).is_err() {
            warn!("Failed to write transcript to file");
        }
    }
}

/// In-memory capture, used by tests to assert on transcript output.
#[derive(Default)]
pub struct MemorySink {
    buffer: Mutex<String>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        self.buffer.lock().clone()
    }
}

impl TranscriptSink for MemorySink {
    fn write(&self, text: &str) {
        self.buffer.lock().push_str(text);
    }
}

/// Broadcasts each write to every attached sink.
pub struct SinkSet {
    sinks: Vec<Box<dyn TranscriptSink>>,
}

impl SinkSet {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    pub fn attach(mut self, sink: Box<dyn TranscriptSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl Default for SinkSet {
    fn default() -> Self {
        Self::new().attach(Box::new(ConsoleSink))
    }
}

impl TranscriptSink for SinkSet {
    fn write(&self, text: &str) {
        for sink in &self.sinks {
            sink.write(text);
        }
    }

    fn write_line(&self, text: &str) {
        for sink in &self.sinks {
            sink.write_line(text);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::sync::Arc;

    #[test]
    fn memory_sink_captures_in_order() {
        let sink = MemorySink::new();
        sink.write("a");
        sink.write_line("b");
        sink.write("c");
        assert_eq!(sink.contents(), "ab\nc");
    }

    #[test]
    fn file_sink_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transcript.txt");
        {
            let sink = FileSink::create(&path).unwrap();
            sink.write_line("first");
        }
        {
            let sink = FileSink::create(&path).unwrap();
            sink.write_line("second");
        }
        let mut text = String::new();
        File::open(&path).unwrap().read_to_string(&mut text).unwrap();
        assert_eq!(text, "first\nsecond\n");
    }

    #[test]
    fn sink_set_fans_out() {
        let a = Arc::new(MemorySink::new());
        let b = Arc::new(MemorySink::new());
        let set = SinkSet::new()
            .attach(Box::new(a.clone()))
            .attach(Box::new(b.clone()));
        set.write_line("hello");
        assert_eq!(a.contents(), "hello\n");
        assert_eq!(b.contents(), "hello\n");
    }
}
