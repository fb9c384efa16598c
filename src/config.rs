use std::{collections::HashMap, path::PathBuf};

use sentry_tee::{Stage, Tags};

use crate::utils::{parse_bool, parse_tags};

pub const SENTRY_DSN: &str = "SENTRY_DSN";
pub const SENTRY_TAGS: &str = "SENTRY_TAGS";
pub const SENTRY_TRACE: &str = "SENTRY_TRACE";
pub const SENTRY_DISABLED: &str = "SENTRY_DISABLED";
pub const LOG_STAGE: &str = "LOG_STAGE";

pub trait ConfigManager: Sized + Clone + Send + Sync {
    fn get_log_path(&self) -> eyre::Result<String>;
    fn get_dsn(&self) -> Option<String>;
    fn get_tags(&self) -> eyre::Result<Tags>;
    fn get_trace(&self) -> eyre::Result<Option<bool>>;
    fn get_disabled(&self) -> eyre::Result<bool>;
    fn get_stage(&self) -> eyre::Result<Option<Stage>>;
}

/// Settings taken from the environment of the current process.
#[derive(Default, Clone, Debug)]
pub struct LocalConfigManager {
    vars: HashMap<String, String>,
}

impl LocalConfigManager {
    pub fn new() -> Self {
        Self::from_vars(std::env::vars())
    }

    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: vars
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    fn var(&self, name: &str) -> Option<&str> {
        self.vars
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    #[cfg(not(target_os = "windows"))]
    fn home_dir(&self) -> eyre::Result<PathBuf> {
        self.var("HOME")
            .map(PathBuf::from)
            .ok_or_else(|| eyre::eyre!("$HOME not found"))
    }

    #[cfg(target_os = "windows")]
    fn home_dir(&self) -> eyre::Result<PathBuf> {
        self.var("USERPROFILE")
            .map(PathBuf::from)
            .ok_or_else(|| eyre::eyre!("%userprofile% not found"))
    }

    fn data_dir(&self) -> eyre::Result<PathBuf> {
        let data_dir = match self.var("XDG_DATA_HOME") {
            Some(dir) => PathBuf::from(dir),
            None => self.home_dir()?.join(".local").join("share"),
        };

        Ok(data_dir.join("sentry-tee"))
    }
}

impl ConfigManager for LocalConfigManager {
    fn get_log_path(&self) -> eyre::Result<String> {
        let path = self.data_dir()?.join("sentry-tee.log");

        match path.to_str() {
            Some(path) => Ok(path.to_string()),
            None => Err(eyre::eyre!("Can't construct log path in data dir!")),
        }
    }

    fn get_dsn(&self) -> Option<String> {
        self.var(SENTRY_DSN).map(str::to_string)
    }

    fn get_tags(&self) -> eyre::Result<Tags> {
        match self.var(SENTRY_TAGS) {
            Some(tags) => parse_tags(tags),
            None => Ok(Tags::new()),
        }
    }

    fn get_trace(&self) -> eyre::Result<Option<bool>> {
        self.var(SENTRY_TRACE).map(parse_bool).transpose()
    }

    fn get_disabled(&self) -> eyre::Result<bool> {
        Ok(self
            .var(SENTRY_DISABLED)
            .map(parse_bool)
            .transpose()?
            .unwrap_or(false))
    }

    fn get_stage(&self) -> eyre::Result<Option<Stage>> {
        self.var(LOG_STAGE).map(str::parse).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_sentry_settings() {
        let config = LocalConfigManager::from_vars([
            (SENTRY_DSN, "https://key@example.com/1"),
            (SENTRY_TAGS, "env=prod, region=eu"),
            (SENTRY_TRACE, "off"),
            (SENTRY_DISABLED, "1"),
            (LOG_STAGE, "production"),
        ]);

        assert_eq!(config.get_dsn().unwrap(), "https://key@example.com/1");
        let tags = config.get_tags().unwrap();
        assert_eq!(tags["env"], "prod");
        assert_eq!(tags["region"], "eu");
        assert_eq!(config.get_trace().unwrap(), Some(false));
        assert!(config.get_disabled().unwrap());
        assert_eq!(config.get_stage().unwrap(), Some(Stage::Production));
    }

    #[test]
    fn missing_settings_fall_back() {
        let config = LocalConfigManager::from_vars([(SENTRY_DSN, "  ")]);

        assert!(config.get_dsn().is_none());
        assert!(config.get_tags().unwrap().is_empty());
        assert_eq!(config.get_trace().unwrap(), None);
        assert!(!config.get_disabled().unwrap());
        assert_eq!(config.get_stage().unwrap(), None);
    }

    #[test]
    fn invalid_values_are_errors() {
        let config = LocalConfigManager::from_vars([
            (SENTRY_TRACE, "maybe"),
            (LOG_STAGE, "staging"),
            (SENTRY_TAGS, "novalue"),
        ]);

        assert!(config.get_trace().is_err());
        assert!(config.get_stage().is_err());
        assert!(config.get_tags().is_err());
    }

    #[cfg(not(target_os = "windows"))]
    #[test]
    fn log_path_prefers_xdg() {
        let config = LocalConfigManager::from_vars([("HOME", "/home/me")]);
        assert_eq!(
            config.get_log_path().unwrap(),
            "/home/me/.local/share/sentry-tee/sentry-tee.log"
        );

        let config =
            LocalConfigManager::from_vars([("HOME", "/home/me"), ("XDG_DATA_HOME", "/data")]);
        assert_eq!(
            config.get_log_path().unwrap(),
            "/data/sentry-tee/sentry-tee.log"
        );

        assert!(LocalConfigManager::from_vars(Vec::<(String, String)>::new())
            .get_log_path()
            .is_err());
    }
}
