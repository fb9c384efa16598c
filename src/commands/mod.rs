use std::{fmt::Display, path::PathBuf, str::FromStr, time::Duration};

use clap::{command, Parser, Subcommand};
use eyre::Context;
use sentry_tee::{logging, Configuration, Stage};
use tracing_subscriber::filter::LevelFilter;

use crate::{
    config::{ConfigManager, LocalConfigManager},
    utils::{parse_duration, parse_key_value},
};

mod emit;
mod info;

#[derive(Subcommand, Debug)]
pub enum TeeCmd {
    Emit(emit::Cmd),

    Info(info::Cmd),
}

impl Display for TeeCmd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TeeCmd::Emit(cmd) => write!(f, "emit {}", cmd.level),
            TeeCmd::Info(_cmd) => write!(f, "info"),
        }
    }
}

#[derive(Parser)]
#[command(version, long_version = "")]
#[command(about = "Send log records to the terminal and actionable ones to a Sentry compatible error tracker.", long_about = None, disable_help_subcommand = true)]
pub struct Tee {
    #[arg(
        global = true,
        long,
        help = "Credential of the error tracking project. By default it is read from the SENTRY_DSN environment variable.",
        display_order = 0
    )]
    pub dsn: Option<String>,

    #[arg(
        global = true,
        long = "tag",
        value_parser = parse_key_value,
        help = "Tag attached to every report, as key=value. Can be repeated and adds to SENTRY_TAGS.",
        display_order = 0
    )]
    pub tags: Vec<(String, String)>,

    #[arg(
        global = true,
        long,
        value_parser = Stage::from_str,
        help = "Local output preset: development, production or nop. Defaults to LOG_STAGE or development.",
        display_order = 1
    )]
    pub stage: Option<Stage>,

    #[arg(
        global = true,
        long,
        help = "Don't attach stack traces to reports.",
        display_order = 1
    )]
    pub no_trace: bool,

    #[arg(
        global = true,
        long,
        help = "Never send reports, whatever the credential says.",
        display_order = 1
    )]
    pub disabled: bool,

    #[arg(
        global = true,
        long,
        help = "JSON file with dsn, tags, trace and disabled settings. Flags and environment variables take precedence.",
        display_order = 2
    )]
    pub config: Option<PathBuf>,

    #[arg(
        global = true,
        long,
        value_parser = parse_duration,
        help = "Timeout for a single report delivery, e.g. 5s. Defaults to 30s.",
        display_order = 2
    )]
    pub timeout: Option<Duration>,

    #[arg(
        global = true,
        long,
        help = "Append local output to the log file in the data directory instead of stderr.",
        display_order = 2
    )]
    pub log_file: bool,

    #[arg(
        long,
        short = 'v',
        action = clap::ArgAction::Count,
        global = true,
        help = "Write verbose messages about report delivery to stderr.",
        display_order = 999
    )]
    pub verbose: u8,

    #[command(subcommand)]
    pub cmd: TeeCmd,
}

impl Tee {
    fn trace_filter(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::OFF,
            1 => LevelFilter::WARN,
            2 => LevelFilter::INFO,
            3 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    }

    fn setup_tracing(&self) {
        let filter = self.trace_filter();
        if filter == LevelFilter::OFF {
            return;
        }

        let _ = tracing_subscriber::fmt()
            .with_max_level(filter)
            .with_writer(std::io::stderr)
            .try_init();
    }

    /// Combines the configuration file, the environment and the command line, in increasing
    /// order of precedence.
    fn resolve<T>(&self, config: &T) -> eyre::Result<(Stage, Configuration)>
    where
        T: ConfigManager,
    {
        let mut configuration = match &self.config {
            Some(path) => Configuration::from_file(path)?,
            None => Configuration::default(),
        };

        if let Some(dsn) = self.dsn.clone().or_else(|| config.get_dsn()) {
            configuration.dsn = dsn;
        }

        configuration.tags.extend(config.get_tags()?);
        configuration.tags.extend(self.tags.iter().cloned());

        if let Some(trace) = config.get_trace()? {
            configuration = configuration.with_trace(trace);
        }
        if self.no_trace {
            configuration = configuration.with_trace(false);
        }

        configuration.disabled |= self.disabled || config.get_disabled()?;
        configuration = configuration.with_timeout(self.timeout);

        let stage = match self.stage {
            Some(stage) => stage,
            None => config.get_stage()?.unwrap_or_default(),
        };

        Ok((stage, configuration))
    }

    fn setup_logging(
        &self,
        config: &LocalConfigManager,
        stage: Stage,
        configuration: &Configuration,
    ) -> eyre::Result<()> {
        let mut builder = logging::Builder::new()
            .with_stage(stage)
            .with_sentry_configuration(configuration.clone());

        if self.log_file {
            let log_path = config
                .get_log_path()
                .context("Failed constructing file sink log path")?;
            builder = builder.with_file_sink(&log_path).with_ansi(false);
        }

        builder.build()?.init()
    }

    pub fn run(self) -> eyre::Result<()> {
        self.setup_tracing();

        let config = LocalConfigManager::new();
        let (stage, configuration) = self.resolve(&config)?;

        if let TeeCmd::Info(info) = &self.cmd {
            return info.run(&config, stage, &configuration);
        }

        self.setup_logging(&config, stage, &configuration)?;
        tracing::debug!(%stage, disabled = configuration.is_disabled(), "running command {}", &self.cmd);

        let logger = logging::default_logger()
            .ok_or_else(|| eyre::eyre!("Logger was not initialized"))?;

        let result = match &self.cmd {
            TeeCmd::Emit(emit) => emit.run(logger),
            TeeCmd::Info(_) => Ok(()),
        };

        if let Err(msg) = &result {
            tracing::error!("failed running command {}, error={} cause={}", &self.cmd, msg, msg.root_cause());
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;
    use crate::config::{LOG_STAGE, SENTRY_DSN, SENTRY_TAGS, SENTRY_TRACE};

    #[test]
    fn cli_is_well_formed() {
        Tee::command().debug_assert();
    }

    #[test]
    fn flags_take_precedence_over_environment() {
        let tee = Tee::parse_from([
            "sentry-tee",
            "--dsn",
            "https://flag@example.com/2",
            "--tag",
            "env=staging",
            "--stage",
            "nop",
            "--timeout",
            "5s",
            "info",
        ]);
        let config = LocalConfigManager::from_vars([
            (SENTRY_DSN, "https://env@example.com/1"),
            (SENTRY_TAGS, "env=prod,team=core"),
            (LOG_STAGE, "production"),
        ]);

        let (stage, configuration) = tee.resolve(&config).unwrap();

        assert_eq!(stage, Stage::Nop);
        assert_eq!(configuration.dsn, "https://flag@example.com/2");
        assert_eq!(configuration.tags["env"], "staging");
        assert_eq!(configuration.tags["team"], "core");
        assert_eq!(configuration.timeout, Some(Duration::from_secs(5)));
        assert!(!configuration.trace.disabled);
    }

    #[test]
    fn environment_fills_in_missing_flags() {
        let tee = Tee::parse_from(["sentry-tee", "--no-trace", "emit", "boom"]);
        let config = LocalConfigManager::from_vars([
            (SENTRY_DSN, "test"),
            (SENTRY_TRACE, "true"),
            (LOG_STAGE, "production"),
        ]);

        let (stage, configuration) = tee.resolve(&config).unwrap();

        assert_eq!(stage, Stage::Production);
        assert!(configuration.is_disabled());
        assert!(configuration.trace.disabled);
    }
}
