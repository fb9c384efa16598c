use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use super::{severity::Severity, stacktrace::Stacktrace};
use crate::level::Level;

pub const PLATFORM: &str = "native";

/// One log event as submitted to the error tracking service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub event_id: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub level: Severity,
    pub platform: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logger: Option<String>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stacktrace: Option<Stacktrace>,
}

impl Report {
    pub fn new(record: &Record, extra: Map<String, Value>) -> Self {
        Self {
            event_id: Uuid::new_v4().as_simple().to_string(),
            message: record.message.clone(),
            timestamp: record.timestamp,
            level: Severity::from(record.level),
            platform: PLATFORM,
            logger: record.target.clone(),
            extra,
            stacktrace: None,
        }
    }
}

/// A log record as handed to a sink: message, severity, time, and the fields attached to this
/// particular call.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub level: Level,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub target: Option<String>,
    pub fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            timestamp: Utc::now(),
            target: None,
            fields: Vec::new(),
        }
    }

    pub fn with_target(self, target: impl Into<String>) -> Self {
        Self {
            target: Some(target.into()),
            ..self
        }
    }

    pub fn with_timestamp(self, timestamp: DateTime<Utc>) -> Self {
        Self { timestamp, ..self }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.push((key.into(), value.into()));
        self
    }

    pub fn with_fields<I, K>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        self.fields
            .extend(fields.into_iter().map(|(k, v)| (k.into(), v)));
        self
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn report_serializes_without_empty_sections() {
        let record = Record::new(Level::ERROR, "disk full");
        let report = Report::new(&record, Map::new());

        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["message"], "disk full");
        assert_eq!(value["level"], "error");
        assert_eq!(value["platform"], PLATFORM);
        assert_eq!(value["event_id"].as_str().unwrap().len(), 32);
        assert!(value.get("extra").is_none());
        assert!(value.get("stacktrace").is_none());
        assert!(value.get("logger").is_none());
    }

    #[test]
    fn record_builder_keeps_field_order() {
        let record = Record::new(Level::WARN, "slow")
            .with_target("db")
            .with_field("ms", 1200)
            .with_fields([("ms", json!(1300))]);

        assert_eq!(record.target.as_deref(), Some("db"));
        assert_eq!(
            record.fields,
            vec![("ms".to_string(), json!(1200)), ("ms".to_string(), json!(1300))]
        );
    }
}
