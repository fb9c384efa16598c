use core::fmt;

use serde::Serialize;

use crate::level::Level;

/// Severity vocabulary understood by the error tracking service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Fatal,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Fatal => "fatal",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Level> for Severity {
    fn from(level: Level) -> Self {
        match level {
            Level::DEBUG | Level::INFO => Severity::Info,
            Level::WARN => Severity::Warning,
            Level::ERROR => Severity::Error,
            Level::DPANIC | Level::PANIC | Level::FATAL => Severity::Fatal,
            // Unrecognized levels are fatal.
            _ => Severity::Fatal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_every_known_level() {
        let mapped: Vec<_> = Level::ALL.iter().map(|l| Severity::from(*l)).collect();
        assert_eq!(
            mapped,
            vec![
                Severity::Info,
                Severity::Info,
                Severity::Warning,
                Severity::Error,
                Severity::Fatal,
                Severity::Fatal,
                Severity::Fatal,
            ]
        );
    }

    #[test]
    fn unknown_levels_are_fatal_every_time() {
        for raw in [i8::MIN, -2, 6, 42, i8::MAX] {
            let level = Level::from_i8(raw);
            assert_eq!(Severity::from(level), Severity::Fatal);
            assert_eq!(Severity::from(level), Severity::from(level));
        }
    }

    #[test]
    fn debug_records_report_as_info() {
        assert_eq!(Severity::from(Level::DEBUG).as_str(), "info");
    }

    #[test]
    fn serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&Severity::Warning).unwrap(),
            "\"warning\""
        );
    }
}
