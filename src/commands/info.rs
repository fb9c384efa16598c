use clap::{Args, CommandFactory};
use sentry_tee::{http::Dsn, Configuration, Stage};

use crate::{commands::Tee, config::ConfigManager};

#[derive(Args, Debug)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cmd {}

impl Cmd {
    pub fn run(
        &self,
        config: &impl ConfigManager,
        stage: Stage,
        configuration: &Configuration,
    ) -> eyre::Result<()> {
        let endpoint = if configuration.is_disabled() {
            "disabled".to_string()
        } else {
            let dsn: Dsn = configuration.dsn.parse()?;
            dsn.store_url()
        };

        let tags = configuration
            .tags
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(", ");

        println!(
            "Version:        {}",
            Tee::command().get_version().unwrap_or("")
        );
        println!("Stage:          {}", stage);
        println!("Endpoint:       {}", endpoint);
        println!("Tags:           {}", tags);
        println!("Stack traces:   {}", !configuration.trace.disabled);
        println!(
            "Timeout:        {}",
            humantime::format_duration(
                configuration
                    .timeout
                    .unwrap_or(sentry_tee::http::DEFAULT_TIMEOUT)
            )
        );
        println!(
            "Logs:           {}",
            config.get_log_path().unwrap_or("".to_string())
        );
        Ok(())
    }
}
