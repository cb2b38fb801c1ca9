use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

use crate::error::{EquitrainError, Result};

/// Sink for the human-readable lines a training run produces.
///
/// A reporter is created once per run and passed to every component that
/// logs. Processes that are not responsible for I/O get a `NoOpReporter`.
pub trait Reporter {
    fn info(&self, line: &str);
}

/// Forwards lines to `tracing` and, when an output directory is given,
/// appends them with a timestamp to `<output_dir>/debug.log`.
pub struct FileLogger {
    file: Option<Mutex<BufWriter<File>>>,
}

impl FileLogger {
    /// Console-only logger.
    pub fn console() -> Self {
        FileLogger { file: None }
    }

    /// Logger that also writes `debug.log` inside `output_dir`.
    pub fn new(output_dir: &Path) -> Result<Self> {
        let path = output_dir.join("debug.log");
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| EquitrainError::io(&path, e))?;
        Ok(FileLogger { file: Some(Mutex::new(BufWriter::new(file))) })
    }
}

impl Reporter for FileLogger {
    fn info(&self, line: &str) {
        tracing::info!("{line}");

        if let Some(file) = &self.file {
            // A poisoned lock only means another thread panicked mid-write.
            let mut writer = file.lock().unwrap_or_else(|e| e.into_inner());
            let stamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
            if writeln!(writer, "{stamp} - {line}").and_then(|_| writer.flush()).is_err() {
                tracing::warn!("failed to append to debug.log");
            }
        }
    }
}

/// Swallows every line.
pub struct NoOpReporter;

impl Reporter for NoOpReporter {
    fn info(&self, _line: &str) {}
}

/// Collects lines in memory. Handy for tests and for embedding the harness.
#[derive(Default)]
pub struct MemoryReporter {
    lines: Mutex<Vec<String>>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Reporter for MemoryReporter {
    fn info(&self, line: &str) {
        self.lines
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(line.to_string());
    }
}
