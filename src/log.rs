//! Append-only activity log sinks.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use tracing::{info, warn};

/// Write-only sink for human readable activity records.
pub trait EventLog {
    fn record(&mut self, line: &str);
}

/// Keeps records in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryLog {
    lines: Vec<String>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}

impl EventLog for MemoryLog {
    fn record(&mut self, line: &str) {
        self.lines.push(line.to_string());
    }
}

/// Forwards records to the `event_log` tracing target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLog;

impl EventLog for TracingLog {
    fn record(&mut self, line: &str) {
        info!(target: "event_log", "{line}");
    }
}

/// Appends records to a file, one per line.
pub struct FileLog {
    writer: BufWriter<File>,
}

impl FileLog {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }
}

impl EventLog for FileLog {
    fn record(&mut self, line: &str) {
        // a broken log must not stop the machine
        if let Err(e) = writeln!(self.writer, "{line}").and_then(|_| self.writer.flush()) {
            warn!(reason = %e, "failed to write event log record");
        }
    }
}

impl<L: EventLog + ?Sized> EventLog for &mut L {
    fn record(&mut self, line: &str) {
        (**self).record(line);
    }
}

impl<L: EventLog + ?Sized> EventLog for Box<L> {
    fn record(&mut self, line: &str) {
        (**self).record(line);
    }
}
