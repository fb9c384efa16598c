#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use sentry_tee::{
    logging::LogSink,
    sentry::{Delivery, Report},
    Record, Tags, Transport,
};
use serde_json::{Map, Value};

/// Transport that keeps every report in memory.
#[derive(Default)]
pub struct MockTransport {
    reports: Mutex<Vec<(Report, Tags)>>,
    calls: Mutex<Vec<&'static str>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reports(&self) -> Vec<(Report, Tags)> {
        self.reports.lock().unwrap().clone()
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn connector(
        self: &Arc<Self>,
    ) -> impl Fn(&sentry_tee::Configuration) -> eyre::Result<Arc<dyn Transport>> + 'static {
        let transport = self.clone();
        move |_| Ok(transport.clone() as Arc<dyn Transport>)
    }
}

impl Transport for MockTransport {
    fn capture(&self, report: Report, tags: &Tags) -> Delivery {
        let event_id = report.event_id.clone();
        self.calls.lock().unwrap().push("capture");
        self.reports.lock().unwrap().push((report, tags.clone()));
        Delivery::ready(Ok(event_id))
    }

    fn wait(&self) -> eyre::Result<()> {
        self.calls.lock().unwrap().push("wait");
        Ok(())
    }
}

/// Local sink that keeps messages and their fields in memory.
#[derive(Default)]
pub struct MemorySink {
    pub lines: Mutex<Vec<(String, Map<String, Value>)>>,
}

impl LogSink for MemorySink {
    fn write_log(&self, record: &Record, fields: &Map<String, Value>) -> eyre::Result<()> {
        self.lines
            .lock()
            .unwrap()
            .push((record.message.clone(), fields.clone()));
        Ok(())
    }

    fn flush(&self) -> eyre::Result<()> {
        Ok(())
    }
}
