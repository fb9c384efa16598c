use serde_json::{Map, Value};

use super::{logger::Config, LogFormatter};
use crate::{level::Level, sentry::Record};

/// Human readable single line format used during development.
pub struct DefaultFormatter {
    config: Config,
}

impl DefaultFormatter {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    fn timestamp(&self, record: &Record) -> String {
        let color = if self.config.use_ansi {
            "\x1b[0;90m"
        } else {
            ""
        };

        let time = record
            .timestamp
            .with_timezone(&chrono::Local)
            .format(&self.config.datetime_format);
        format!("{}[{}]{}", color, time, self.reset())
    }

    fn format_level(&self, level: Level) -> &str {
        if self.config.use_ansi {
            match level {
                Level::DEBUG => "\x1b[0;34mDEB\x1b[0m",
                Level::INFO => "\x1b[0;32mINF\x1b[0m",
                Level::WARN => "\x1b[0;33mWRN\x1b[0m",
                Level::ERROR => "\x1b[0;31mERR\x1b[0m",
                Level::DPANIC => "\x1b[1;31mDPN\x1b[0m",
                Level::PANIC => "\x1b[1;31mPNC\x1b[0m",
                _ => "\x1b[1;31mFTL\x1b[0m",
            }
        } else {
            match level {
                Level::DEBUG => "DEB",
                Level::INFO => "INF",
                Level::WARN => "WRN",
                Level::ERROR => "ERR",
                Level::DPANIC => "DPN",
                Level::PANIC => "PNC",
                _ => "FTL",
            }
        }
    }

    fn reset(&self) -> &str {
        if self.config.use_ansi {
            "\x1b[0m"
        } else {
            ""
        }
    }

    fn format_msg(&self, message: &str) -> String {
        let color = if self.config.use_ansi {
            "\x1b[0;1m"
        } else {
            ""
        };

        format!("{}{}{}", color, message, self.reset())
    }

    fn format_fields(&self, fields: &Map<String, Value>) -> String {
        let color = if self.config.use_ansi {
            "\x1b[0;36m"
        } else {
            ""
        };

        fields
            .iter()
            .map(|(k, v)| match v {
                Value::String(s) => format!(" {}{}={}{}", color, k, self.reset(), s),
                other => format!(" {}{}={}{}", color, k, self.reset(), other),
            })
            .collect()
    }
}

impl LogFormatter for DefaultFormatter {
    fn format(&self, record: &Record, fields: &Map<String, Value>) -> String {
        let target = record
            .target
            .as_deref()
            .map(|t| format!(" {}", t))
            .unwrap_or_default();

        format!(
            "{} {}{}: {}{}",
            self.timestamp(record),
            self.format_level(record.level),
            target,
            self.format_msg(&record.message),
            self.format_fields(fields),
        )
    }
}

/// One JSON object per line, used in production.
pub struct JsonFormatter {}

impl JsonFormatter {
    pub fn new() -> Self {
        Self {}
    }
}

impl LogFormatter for JsonFormatter {
    fn format(&self, record: &Record, fields: &Map<String, Value>) -> String {
        let mut line = Map::new();
        line.insert("level".to_string(), Value::from(record.level.as_str()));
        line.insert(
            "ts".to_string(),
            Value::from(
                record
                    .timestamp
                    .to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            ),
        );
        if let Some(target) = &record.target {
            line.insert("logger".to_string(), Value::from(target.as_str()));
        }
        line.insert("msg".to_string(), Value::from(record.message.as_str()));

        for (k, v) in fields {
            // Record keys win over fields sharing their name.
            line.entry(k.clone()).or_insert_with(|| v.clone());
        }

        Value::Object(line).to_string()
    }
}
