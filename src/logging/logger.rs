use core::fmt;
use std::{
    io::IsTerminal,
    path::PathBuf,
    str::FromStr,
    sync::{Arc, OnceLock},
};

use eyre::Context;
use log::{LevelFilter, Log};
use serde_json::Value;

use super::{
    formatters::{DefaultFormatter, JsonFormatter},
    sinks::{FileSink, NullSink, StderrSink},
    LogFormatter, LogSink,
};
use crate::{
    level::Level,
    sentry::{Configuration, Fields, Record, SentryCore, Tags, Transport},
};

static DEFAULT: OnceLock<Logger> = OnceLock::new();

/// The logger installed with [`Logger::init`], if any.
pub fn default_logger() -> Option<&'static Logger> {
    DEFAULT.get()
}

#[derive(Debug, Clone)]
pub struct Config {
    pub enabled: bool,
    pub datetime_format: String,
    pub use_ansi: bool,
}

impl Config {
    pub fn new() -> Self {
        Self {
            enabled: true,
            datetime_format: "%Y-%m-%d %H:%M:%S".to_string(),
            use_ansi: true,
        }
    }
}

/// Preset for the local side of the tee. The remote side is attached in every stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Stage {
    #[default]
    Development,
    Production,
    Nop,
}

impl FromStr for Stage {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Stage::Development),
            "production" | "prod" => Ok(Stage::Production),
            "nop" => Ok(Stage::Nop),
            other => Err(eyre::eyre!("unknown stage: {:?}", other)),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Development => write!(f, "development"),
            Stage::Production => write!(f, "production"),
            Stage::Nop => write!(f, "nop"),
        }
    }
}

/// Writes every record to a local sink and, for actionable levels, to the error tracking
/// service.
///
/// Loggers are cheap to clone. [`Logger::with`] derives a logger carrying extra context without
/// affecting the one it was derived from.
#[derive(Clone)]
pub struct Logger {
    filter: Level,
    sink: Arc<dyn LogSink>,
    remote: SentryCore,
    fields: Fields,
    config: Config,
}

impl Logger {
    pub fn new(filter: Level, sink: Arc<dyn LogSink>, remote: SentryCore, config: Config) -> Self {
        Self {
            filter,
            sink,
            remote,
            fields: Fields::new(),
            config,
        }
    }

    pub fn remote(&self) -> &SentryCore {
        &self.remote
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn level_enabled(&self, level: Level) -> bool {
        self.local_enabled(level) || self.remote.enabled(level)
    }

    fn local_enabled(&self, level: Level) -> bool {
        self.config.enabled && level >= self.filter
    }

    pub fn with<I, K>(&self, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let fields: Vec<(String, Value)> =
            fields.into_iter().map(|(k, v)| (k.into(), v)).collect();

        Self {
            filter: self.filter,
            sink: self.sink.clone(),
            remote: self.remote.with(fields.clone()),
            fields: self.fields.derive(fields),
            config: self.config.clone(),
        }
    }

    pub fn write(&self, record: &Record) {
        if self.local_enabled(record.level) {
            let fields = self.fields.derive(record.fields.iter().cloned()).to_map();
            if let Err(err) = self.sink.write_log(record, &fields) {
                tracing::warn!("failed writing log record: {:#}", err);
            }
        }

        if self.remote.enabled(record.level) {
            self.remote.write(record);
        }
    }

    pub fn log<I, K>(&self, level: Level, message: impl Into<String>, fields: I)
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        if self.level_enabled(level) {
            self.write(&Record::new(level, message).with_fields(fields));
        }
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.log(Level::DEBUG, message, no_fields());
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(Level::INFO, message, no_fields());
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.log(Level::WARN, message, no_fields());
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(Level::ERROR, message, no_fields());
    }

    pub fn dpanic(&self, message: impl Into<String>) {
        self.log(Level::DPANIC, message, no_fields());
    }

    /// Logs at [`Level::PANIC`]. Only logs; unwinding is left to the caller.
    pub fn panic(&self, message: impl Into<String>) {
        self.log(Level::PANIC, message, no_fields());
    }

    /// Logs at [`Level::FATAL`] and returns once the report has been flushed. Terminating the
    /// process is left to the caller.
    pub fn fatal(&self, message: impl Into<String>) {
        self.log(Level::FATAL, message, no_fields());
    }

    /// Flushes the local sink and waits for outstanding reports.
    pub fn sync(&self) -> eyre::Result<()> {
        let local = self.sink.flush();
        let remote = self.remote.sync();
        local.and(remote)
    }

    fn max_level(&self) -> LevelFilter {
        let local = if self.config.enabled {
            LevelFilter::from(self.filter)
        } else {
            LevelFilter::Off
        };
        let remote = if self.remote.is_nop() {
            LevelFilter::Off
        } else {
            LevelFilter::from(self.remote.gate())
        };
        local.max(remote)
    }

    /// Installs this logger as the `log` backend and as the process wide default. Can only
    /// succeed once per process. When another backend is already registered nothing is
    /// installed and [`default_logger`] keeps returning `None`.
    pub fn init(self) -> eyre::Result<()> {
        let max_level = self.max_level();
        log::set_boxed_logger(Box::new(self.clone()))
            .context("Failed registering boxed logger")?;
        log::set_max_level(max_level);

        DEFAULT
            .set(self)
            .map_err(|_| eyre::eyre!("Default logger is already initialized"))?;

        Ok(())
    }
}

fn no_fields() -> Vec<(String, Value)> {
    Vec::new()
}

impl Log for Logger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        self.level_enabled(Level::from(metadata.level()))
    }

    fn log(&self, record: &log::Record) {
        let level = Level::from(record.level());
        if !self.level_enabled(level) {
            return;
        }

        let mut collector = FieldCollector::default();
        if let Err(err) = record.key_values().visit(&mut collector) {
            tracing::debug!("failed collecting record fields: {}", err);
        }

        let entry = Record::new(level, record.args().to_string())
            .with_target(record.target())
            .with_fields(collector.fields);
        self.write(&entry);
    }

    fn flush(&self) {
        if let Err(err) = self.sync() {
            tracing::warn!("failed flushing logger: {:#}", err);
        }
    }
}

#[derive(Default)]
struct FieldCollector {
    fields: Vec<(String, Value)>,
}

impl<'kvs> log::kv::VisitSource<'kvs> for FieldCollector {
    fn visit_pair(
        &mut self,
        key: log::kv::Key<'kvs>,
        value: log::kv::Value<'kvs>,
    ) -> Result<(), log::kv::Error> {
        self.fields.push((key.as_str().to_string(), to_json(&value)));
        Ok(())
    }
}

fn to_json(value: &log::kv::Value) -> Value {
    if let Some(b) = value.to_bool() {
        Value::Bool(b)
    } else if let Some(i) = value.to_i64() {
        Value::from(i)
    } else if let Some(u) = value.to_u64() {
        Value::from(u)
    } else if let Some(f) = value.to_f64() {
        serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    } else if let Some(s) = value.to_borrowed_str() {
        Value::from(s)
    } else {
        Value::String(value.to_string())
    }
}

type SinkConstructor =
    Box<dyn Fn(Box<dyn LogFormatter + 'static>) -> eyre::Result<Box<dyn LogSink + 'static>>>;
type FormatterConstructor = Box<dyn Fn(Config) -> Box<dyn LogFormatter + 'static>>;
type TransportConstructor = Box<dyn Fn(&Configuration) -> eyre::Result<Arc<dyn Transport>>>;

pub struct Builder {
    filter: Level,
    constructor: SinkConstructor,
    formatter_builder: FormatterConstructor,
    config: Config,
    sentry: Option<Configuration>,
    sentry_fields: Vec<(String, Value)>,
    transport: Option<TransportConstructor>,
}

impl Builder {
    pub fn new() -> Self {
        Self {
            filter: Level::DEBUG,
            constructor: Box::new(|formatter| Ok(Box::new(StderrSink::new(formatter)))),
            formatter_builder: Box::new(|config| Box::new(DefaultFormatter::new(config))),
            config: Config::new(),
            sentry: None,
            sentry_fields: Vec::new(),
            transport: None,
        }
        .with_stage(Stage::Development)
    }

    pub fn with_stage(self, stage: Stage) -> Self {
        match stage {
            Stage::Development => Self {
                filter: Level::DEBUG,
                constructor: Box::new(|formatter| Ok(Box::new(StderrSink::new(formatter)))),
                formatter_builder: Box::new(|config| Box::new(DefaultFormatter::new(config))),
                config: Config {
                    enabled: true,
                    use_ansi: std::io::stderr().is_terminal(),
                    ..self.config.clone()
                },
                ..self
            },
            Stage::Production => Self {
                filter: Level::INFO,
                constructor: Box::new(|formatter| Ok(Box::new(StderrSink::new(formatter)))),
                formatter_builder: Box::new(|_| Box::new(JsonFormatter::new())),
                config: Config {
                    enabled: true,
                    use_ansi: false,
                    ..self.config.clone()
                },
                ..self
            },
            Stage::Nop => Self {
                constructor: Box::new(|_| Ok(Box::new(NullSink::new()))),
                config: Config {
                    enabled: false,
                    ..self.config.clone()
                },
                ..self
            },
        }
    }

    pub fn with_level(self, filter: Level) -> Self {
        Self { filter, ..self }
    }

    pub fn with_ansi(self, use_ansi: bool) -> Self {
        Self {
            config: Config {
                use_ansi,
                ..self.config.clone()
            },
            ..self
        }
    }

    pub fn with_file_sink(self, path: impl Into<PathBuf>) -> Self {
        let path: PathBuf = path.into();
        Self {
            constructor: Box::new(move |formatter| {
                let sink = FileSink::new(path.clone(), formatter)?;
                Ok(Box::new(sink))
            }),
            ..self
        }
    }

    pub fn with_stderr_sink(self) -> Self {
        Self {
            constructor: Box::new(move |formatter| {
                let sink = StderrSink::new(formatter);
                Ok(Box::new(sink))
            }),
            ..self
        }
    }

    pub fn with_sink<S>(self, sink: Arc<S>) -> Self
    where
        S: LogSink + 'static,
    {
        Self {
            constructor: Box::new(move |_| Ok(Box::new(SharedSink(sink.clone())))),
            ..self
        }
    }

    /// Tees records at error level and above into the service identified by `dsn`. `fields` are
    /// attached to every report but not to local output.
    pub fn with_sentry<I, K>(self, dsn: impl Into<String>, tags: Tags, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Self {
            sentry: Some(Configuration::new(dsn).with_tags(tags)),
            sentry_fields: fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            ..self
        }
    }

    pub fn with_sentry_configuration(self, configuration: Configuration) -> Self {
        Self {
            sentry: Some(configuration),
            ..self
        }
    }

    /// Replaces the HTTP transport, e.g. with an in-memory one in tests.
    pub fn with_transport<F>(self, connect: F) -> Self
    where
        F: Fn(&Configuration) -> eyre::Result<Arc<dyn Transport>> + 'static,
    {
        Self {
            transport: Some(Box::new(connect)),
            ..self
        }
    }

    pub fn build(&self) -> eyre::Result<Logger> {
        let sink = ((self.constructor)((self.formatter_builder)(self.config.clone())))?;

        let remote = match (&self.sentry, &self.transport) {
            (None, _) => SentryCore::nop(),
            (Some(configuration), Some(connect)) => configuration.build_with(|c| connect(c))?,
            (Some(configuration), None) => configuration.build()?,
        };

        Ok(Logger::new(
            self.filter,
            Arc::from(sink),
            remote.with(self.sentry_fields.clone()),
            self.config.clone(),
        ))
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

struct SharedSink<S>(Arc<S>);

impl<S: LogSink> LogSink for SharedSink<S> {
    fn write_log(
        &self,
        record: &Record,
        fields: &serde_json::Map<String, Value>,
    ) -> eyre::Result<()> {
        self.0.write_log(record, fields)
    }

    fn flush(&self) -> eyre::Result<()> {
        self.0.flush()
    }
}
