mod commands;
mod config;
mod utils;

use crate::commands::Tee;
use clap::Parser;
use std::process::ExitCode;

fn main() -> ExitCode {
    let tee = Tee::parse();

    let result = tee.run();

    if let Some(logger) = sentry_tee::logging::default_logger() {
        if let Err(err) = logger.sync() {
            tracing::warn!("failed flushing logger: {:#}", err);
        }
    }

    match result {
        Err(err) => {
            let root = err.root_cause();

            eprint!("\x1b[31m");
            eprintln!("Error: {}", err);
            eprintln!();
            eprintln!("Caused by:");
            eprint!("  {}", root);
            eprintln!("\x1b[0m");
            ExitCode::from(1)
        }
        Ok(_) => ExitCode::from(0),
    }
}
