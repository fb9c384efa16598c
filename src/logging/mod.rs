mod formatters;
mod logger;
mod sinks;

use serde_json::{Map, Value};

use crate::sentry::Record;

pub use formatters::{DefaultFormatter, JsonFormatter};
pub use logger::{default_logger, Builder, Config, Logger, Stage};
pub use sinks::{FileSink, NullSink, StderrSink};

pub trait LogFormatter: Sync + Send {
    fn format(&self, record: &Record, fields: &Map<String, Value>) -> String;
}

pub trait LogSink: Sync + Send {
    fn write_log(&self, record: &Record, fields: &Map<String, Value>) -> eyre::Result<()>;
    fn flush(&self) -> eyre::Result<()>;
}
