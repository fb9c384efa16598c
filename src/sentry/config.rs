use std::{path::Path, sync::Arc, time::Duration};

use eyre::Context;
use serde::Deserialize;

use super::{
    sink::SentryCore,
    transport::{Tags, Transport},
};
use crate::{
    http::{Dsn, HttpTransport},
    level::Level,
};

/// Credential value that switches remote reporting off, kept for existing deployments. Prefer
/// [`Configuration::disabled`].
pub const TEST_DSN: &str = "test";

/// Minimal set of parameters for error tracking integration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Configuration {
    #[serde(alias = "DSN")]
    pub dsn: String,
    pub tags: Tags,
    pub trace: Trace,
    pub disabled: bool,
    #[serde(skip)]
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Trace {
    pub disabled: bool,
}

impl Configuration {
    pub fn new(dsn: impl Into<String>) -> Self {
        Self {
            dsn: dsn.into(),
            ..Default::default()
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed reading sentry configuration {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Invalid sentry configuration in {}", path.display()))
    }

    pub fn with_tags(self, tags: Tags) -> Self {
        Self { tags, ..self }
    }

    pub fn with_trace(self, enabled: bool) -> Self {
        Self {
            trace: Trace { disabled: !enabled },
            ..self
        }
    }

    pub fn with_timeout(self, timeout: Option<Duration>) -> Self {
        Self { timeout, ..self }
    }

    /// True when no reports should leave the process: the explicit flag is set, no credential
    /// was given, or the credential is [`TEST_DSN`].
    pub fn is_disabled(&self) -> bool {
        self.disabled || self.dsn.trim().is_empty() || self.dsn == TEST_DSN
    }

    /// Builds a core backed by the HTTP transport.
    pub fn build(&self) -> eyre::Result<SentryCore> {
        self.build_with(|config| {
            let dsn: Dsn = config.dsn.parse()?;
            let transport = HttpTransport::builder(dsn)
                .with_timeout(config.timeout)
                .build()?;
            Ok(Arc::new(transport) as Arc<dyn Transport>)
        })
    }

    /// Builds a core around the transport returned by `connect`.
    ///
    /// `connect` is not called when reporting is disabled; a no-op core is returned instead. Any
    /// error from `connect` is returned as is, there is no fallback.
    pub fn build_with<F>(&self, connect: F) -> eyre::Result<SentryCore>
    where
        F: FnOnce(&Configuration) -> eyre::Result<Arc<dyn Transport>>,
    {
        if self.is_disabled() {
            return Ok(SentryCore::nop());
        }

        let transport = connect(self).wrap_err("Failed constructing sentry transport")?;

        Ok(SentryCore::new(
            transport,
            Level::ERROR,
            self.tags.clone(),
            self.trace.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::sentry::{report::Record, test_support::RecordingTransport};

    fn write_all_levels(core: &SentryCore) {
        for level in Level::ALL {
            if core.enabled(level) {
                core.write(&Record::new(level, "message"));
            }
        }
    }

    #[test]
    fn disabled_credentials_never_reach_the_transport() {
        for config in [
            Configuration::new(""),
            Configuration::new("   "),
            Configuration::new(TEST_DSN),
            Configuration {
                disabled: true,
                ..Configuration::new("https://key@example.com/1")
            },
        ] {
            let transport = Arc::new(RecordingTransport::default());
            let connected = transport.clone();
            let core = config
                .build_with(move |_| Ok(connected as Arc<dyn Transport>))
                .unwrap();

            for _ in 0..10 {
                write_all_levels(&core);
                core.write(&Record::new(Level::FATAL, "forced"));
            }

            assert!(core.is_nop());
            assert!(core.sync().is_ok());
            assert_eq!(transport.captured().len(), 0);
            assert_eq!(transport.waits(), 0);
        }
    }

    #[test]
    fn gate_is_fixed_at_error() {
        let transport = Arc::new(RecordingTransport::default());
        let connected = transport.clone();
        let core = Configuration::new("abc123")
            .build_with(move |_| Ok(connected as Arc<dyn Transport>))
            .unwrap();

        assert_eq!(core.gate(), Level::ERROR);
        assert!(!core.enabled(Level::WARN));
        core.write(&Record::new(Level::WARN, "not actionable"));
        assert_eq!(transport.captured().len(), 0);
    }

    #[test]
    fn disk_full_scenario() {
        let transport = Arc::new(RecordingTransport::default());
        let connected = transport.clone();
        let core = Configuration::new("abc123")
            .with_tags(Tags::from([("env".to_string(), "prod".to_string())]))
            .with_trace(false)
            .build_with(move |_| Ok(connected as Arc<dyn Transport>))
            .unwrap();

        core.write(&Record::new(Level::ERROR, "disk full").with_field("disk", "/dev/sda1"));

        let captured = transport.captured();
        assert_eq!(captured.len(), 1);
        let (report, tags) = &captured[0];
        assert_eq!(report.message, "disk full");
        assert_eq!(report.level.as_str(), "error");
        assert_eq!(
            serde_json::Value::Object(report.extra.clone()),
            json!({"disk": "/dev/sda1"})
        );
        assert_eq!(
            tags,
            &Tags::from([("env".to_string(), "prod".to_string())])
        );
        assert!(report.stacktrace.is_none());
    }

    #[test]
    fn connect_errors_are_returned() {
        let result = Configuration::new("abc123").build_with(|_| Err(eyre::eyre!("no route")));
        let err = result.err().expect("construction should fail");
        assert!(format!("{:#}", err).contains("no route"));
    }

    #[test]
    fn malformed_dsn_fails_the_default_build() {
        assert!(Configuration::new("abc123").build().is_err());
    }

    #[test]
    fn deserializes_with_defaults() {
        let config: Configuration = serde_json::from_str(
            r#"{"DSN": "https://key@example.com/42", "tags": {"region": "eu"}}"#,
        )
        .unwrap();

        assert_eq!(config.dsn, "https://key@example.com/42");
        assert_eq!(config.tags.get("region").map(String::as_str), Some("eu"));
        assert_eq!(config.trace, Trace::default());
        assert!(!config.disabled);
    }
}
