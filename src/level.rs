use core::fmt;
use std::str::FromStr;

/// Severity of a log record.
///
/// Levels are totally ordered by increasing severity. The numeric representation leaves room for
/// values outside the named set; those still order correctly and are treated as the most severe
/// by the remote severity mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Level(i8);

impl Level {
    pub const DEBUG: Level = Level(-1);
    pub const INFO: Level = Level(0);
    pub const WARN: Level = Level(1);
    pub const ERROR: Level = Level(2);
    /// More severe than [`Level::ERROR`]. Reports at this level and above are flushed before
    /// the write returns.
    pub const DPANIC: Level = Level(3);
    pub const PANIC: Level = Level(4);
    pub const FATAL: Level = Level(5);

    pub const ALL: [Level; 7] = [
        Level::DEBUG,
        Level::INFO,
        Level::WARN,
        Level::ERROR,
        Level::DPANIC,
        Level::PANIC,
        Level::FATAL,
    ];

    pub const fn from_i8(value: i8) -> Self {
        Level(value)
    }

    pub const fn as_i8(self) -> i8 {
        self.0
    }

    pub fn is_known(self) -> bool {
        Self::ALL.contains(&self)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
            Level::DPANIC => "dpanic",
            Level::PANIC => "panic",
            Level::FATAL => "fatal",
            _ => "unknown",
        }
    }
}

impl Default for Level {
    fn default() -> Self {
        Level::INFO
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_known() {
            f.write_str(self.as_str())
        } else {
            write!(f, "Level({})", self.0)
        }
    }
}

impl FromStr for Level {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" | "trace" => Ok(Level::DEBUG),
            "info" => Ok(Level::INFO),
            "warn" | "warning" => Ok(Level::WARN),
            "error" => Ok(Level::ERROR),
            "dpanic" => Ok(Level::DPANIC),
            "panic" => Ok(Level::PANIC),
            "fatal" => Ok(Level::FATAL),
            other => Err(eyre::eyre!("unrecognized level: {:?}", other)),
        }
    }
}

impl From<log::Level> for Level {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Error => Level::ERROR,
            log::Level::Warn => Level::WARN,
            log::Level::Info => Level::INFO,
            log::Level::Debug | log::Level::Trace => Level::DEBUG,
        }
    }
}

impl From<Level> for log::LevelFilter {
    fn from(level: Level) -> Self {
        if level <= Level::DEBUG {
            log::LevelFilter::Trace
        } else if level == Level::INFO {
            log::LevelFilter::Info
        } else if level == Level::WARN {
            log::LevelFilter::Warn
        } else {
            log::LevelFilter::Error
        }
    }
}
