//! Line-oriented output sinks.
//!
//! Sinks take raw bytes, so binary keys and values reach the dump
//! unchanged. They are shared by all workers, so every implementation
//! serialises writes internally; one `write_line` call is never
//! interleaved with another.

use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::Path,
    sync::Arc,
};

use parking_lot::Mutex;
use tracing::error;

/// Destination for dump text and diagnostics.
pub trait OutputSink: Send + Sync {
    /// Writes `line` followed by a newline, unless it already ends with one.
    fn write_line(
        &self,
        line: &[u8],
    );

    fn flush(&self) {}
}

/// Shared handle to a sink.
pub type SharedSink = Arc<dyn OutputSink>;

/// Standard output or standard error.
pub struct ConsoleSink {
    target: ConsoleTarget,
    lock: Mutex<()>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleTarget {
    Stdout,
    Stderr,
}

impl ConsoleSink {
    pub fn stdout() -> Self {
        Self {
            target: ConsoleTarget::Stdout,
            lock: Mutex::new(()),
        }
    }

    pub fn stderr() -> Self {
        Self {
            target: ConsoleTarget::Stderr,
            lock: Mutex::new(()),
        }
    }

    pub fn target(&self) -> ConsoleTarget {
        self.target
    }
}

impl OutputSink for ConsoleSink {
    fn write_line(
        &self,
        line: &[u8],
    ) {
        let _guard = self.lock.lock();
        let result = match self.target {
            ConsoleTarget::Stdout => write_terminated(&mut io::stdout().lock(), line),
            ConsoleTarget::Stderr => write_terminated(&mut io::stderr().lock(), line),
        };
        if let Err(e) = result {
            error!(stream = ?self.target, "write failed: {e}");
        }
    }

    fn flush(&self) {
        let _guard = self.lock.lock();
        let result = match self.target {
            ConsoleTarget::Stdout => io::stdout().flush(),
            ConsoleTarget::Stderr => io::stderr().flush(),
        };
        if let Err(e) = result {
            error!(stream = ?self.target, "flush failed: {e}");
        }
    }
}

/// Buffered file output.
pub struct FileSink {
    writer: Mutex<BufWriter<File>>,
}

impl FileSink {
    /// Creates (or truncates) the file.
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
        })
    }
}

impl OutputSink for FileSink {
    fn write_line(
        &self,
        line: &[u8],
    ) {
        if let Err(e) = write_terminated(&mut *self.writer.lock(), line) {
            error!("write to dump file failed: {e}");
        }
    }

    fn flush(&self) {
        if let Err(e) = self.writer.lock().flush() {
            error!("flush of dump file failed: {e}");
        }
    }
}

impl Drop for FileSink {
    fn drop(&mut self) {
        let _ = self.writer.get_mut().flush();
    }
}

/// Collects lines in memory.
#[derive(Default)]
pub struct MemorySink {
    lines: Mutex<Vec<Vec<u8>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines as written, without the line terminator. Invalid UTF-8 is
    /// replaced; use [`MemorySink::bytes`] for the exact output.
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .iter()
            .map(|line| String::from_utf8_lossy(line).into_owned())
            .collect()
    }

    /// Everything written, newline-terminated, in write order.
    pub fn bytes(&self) -> Vec<u8> {
        let lines = self.lines.lock();
        let mut out = Vec::with_capacity(lines.iter().map(|l| l.len() + 1).sum());
        for line in lines.iter() {
            out.extend_from_slice(line);
            out.push(b'\n');
        }
        out
    }

    /// [`MemorySink::bytes`] as text, lossily.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.bytes()).into_owned()
    }

    pub fn len(&self) -> usize {
        self.lines.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.lock().is_empty()
    }
}

impl OutputSink for MemorySink {
    fn write_line(
        &self,
        line: &[u8],
    ) {
        let line = line.strip_suffix(b"\n").unwrap_or(line);
        self.lines.lock().push(line.to_vec());
    }
}

fn write_terminated<W: Write>(
    writer: &mut W,
    line: &[u8],
) -> io::Result<()> {
    writer.write_all(line)?;
    if !line.ends_with(b"\n") {
        writer.write_all(b"\n")?;
    }
    Ok(())
}
