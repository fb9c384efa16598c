use std::str::FromStr;

use clap::Args;
use eyre::Context;
use sentry_tee::{Level, Logger};
use serde_json::Value;

use crate::utils::parse_field;

#[derive(Args, Debug)]
pub struct Cmd {
    #[arg(help = "Message of the record.")]
    pub message: String,

    #[arg(
        long,
        short,
        default_value = "error",
        value_parser = Level::from_str,
        help = "One of debug, info, warn, error, dpanic, panic or fatal."
    )]
    pub level: Level,

    #[arg(
        long = "field",
        short = 'f',
        value_parser = parse_field,
        help = "Structured field as key=value. Values that parse as JSON keep their type."
    )]
    pub fields: Vec<(String, Value)>,
}

impl Cmd {
    /// Logs one record through the tee and waits until any report it produced has been sent.
    pub fn run(&self, logger: &Logger) -> eyre::Result<()> {
        logger.log(self.level, self.message.clone(), self.fields.clone());
        logger.sync().context("Failed delivering report")?;

        if logger.remote().enabled(self.level) {
            println!("Report sent.");
        }

        Ok(())
    }
}
