use std::sync::Arc;

use serde_json::Value;

use super::{
    config::Trace,
    fields::Fields,
    report::{Record, Report},
    stacktrace::Stacktrace,
    transport::{Tags, Transport},
};
use crate::level::Level;

// Frames of the capture call itself and of `SentryCore::write`.
const TRACE_SKIP_FRAMES: usize = 2;
const TRACE_CONTEXT_LINES: usize = 3;

/// Sink that turns log records into error reports.
///
/// Cloning or deriving a core is cheap: the transport and tags are shared, and the field store
/// is persistent. A core built without a transport accepts every call and does nothing.
#[derive(Clone)]
pub struct SentryCore {
    transport: Option<Arc<dyn Transport>>,
    gate: Level,
    fields: Fields,
    tags: Arc<Tags>,
    trace: Trace,
}

impl SentryCore {
    pub fn new(transport: Arc<dyn Transport>, gate: Level, tags: Tags, trace: Trace) -> Self {
        Self {
            transport: Some(transport),
            gate,
            fields: Fields::new(),
            tags: Arc::new(tags),
            trace,
        }
    }

    pub fn nop() -> Self {
        Self {
            transport: None,
            gate: Level::ERROR,
            fields: Fields::new(),
            tags: Arc::new(Tags::new()),
            trace: Trace::default(),
        }
    }

    pub fn is_nop(&self) -> bool {
        self.transport.is_none()
    }

    pub fn gate(&self) -> Level {
        self.gate
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn tags(&self) -> &Tags {
        &self.tags
    }

    pub fn enabled(&self, level: Level) -> bool {
        self.transport.is_some() && level >= self.gate
    }

    /// Returns a core that attaches `fields` to every report on top of the current ones.
    pub fn with<I, K>(&self, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Self {
            transport: self.transport.clone(),
            gate: self.gate,
            fields: self.fields.derive(fields),
            tags: self.tags.clone(),
            trace: self.trace.clone(),
        }
    }

    /// Builds a report for `record` and hands it to the transport.
    ///
    /// Delivery failures are not reported back. Records above [`Level::ERROR`] block until the
    /// transport has flushed, since the process may be about to go down.
    #[inline(never)]
    pub fn write(&self, record: &Record) {
        let Some(transport) = &self.transport else {
            return;
        };
        if !self.enabled(record.level) {
            return;
        }

        let extra = self.fields.derive(record.fields.iter().cloned()).to_map();
        let mut report = Report::new(record, extra);

        if !self.trace.disabled {
            report.stacktrace = Stacktrace::capture(TRACE_SKIP_FRAMES, TRACE_CONTEXT_LINES);
        }

        let _ = transport.capture(report, &self.tags);

        if record.level > Level::ERROR {
            if let Err(err) = transport.wait() {
                tracing::warn!(severity = %record.level, "failed flushing reports: {:#}", err);
            }
        }
    }

    pub fn sync(&self) -> eyre::Result<()> {
        match &self.transport {
            Some(transport) => transport.wait(),
            None => Ok(()),
        }
    }
}
