use std::{
    fs::File,
    io::{LineWriter, Write},
    path::PathBuf,
    sync::Mutex,
};

use eyre::Context;
use serde_json::{Map, Value};

use super::{LogFormatter, LogSink};
use crate::sentry::Record;

/// Appends formatted records to a file. The file is never rotated or truncated.
pub struct FileSink {
    file: Mutex<LineWriter<File>>,
    file_path: PathBuf,
    formatter: Box<dyn LogFormatter>,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>, formatter: Box<dyn LogFormatter>) -> eyre::Result<Self> {
        let file_path: PathBuf = path.into();

        if let Some(parent) = file_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed creating log directory {}", parent.display())
                })?;
            }
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&file_path)
            .with_context(|| {
                format!("Failed opening or creating log file {}", file_path.display())
            })?;

        Ok(Self {
            file: Mutex::new(LineWriter::new(file)),
            file_path,
            formatter,
        })
    }

    pub fn path(&self) -> &PathBuf {
        &self.file_path
    }
}

impl LogSink for FileSink {
    fn write_log(&self, record: &Record, fields: &Map<String, Value>) -> eyre::Result<()> {
        let mut file = self.file.lock().map_err(|e| eyre::eyre!(e.to_string()))?;
        writeln!(file, "{}", self.formatter.format(record, fields))?;
        file.flush().context("Can't flush file")
    }

    fn flush(&self) -> eyre::Result<()> {
        let mut file = self.file.lock().map_err(|e| eyre::eyre!(e.to_string()))?;
        file.flush().context("Can't flush file")
    }
}

pub struct StderrSink {
    handle: std::io::Stderr,
    formatter: Box<dyn LogFormatter>,
}

impl StderrSink {
    pub fn new(formatter: Box<dyn LogFormatter>) -> Self {
        Self {
            handle: std::io::stderr(),
            formatter,
        }
    }
}

impl LogSink for StderrSink {
    fn write_log(&self, record: &Record, fields: &Map<String, Value>) -> eyre::Result<()> {
        let mut writer = self.handle.lock();

        writeln!(writer, "{}", self.formatter.format(record, fields))?;
        writer.flush().context("Can't flush stderr")
    }

    fn flush(&self) -> eyre::Result<()> {
        self.handle.lock().flush().context("Can't flush stderr")
    }
}

pub struct NullSink {}

impl NullSink {
    pub fn new() -> Self {
        Self {}
    }
}

impl LogSink for NullSink {
    fn write_log(&self, _record: &Record, _fields: &Map<String, Value>) -> eyre::Result<()> {
        Ok(())
    }

    fn flush(&self) -> eyre::Result<()> {
        Ok(())
    }
}
