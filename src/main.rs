mod cli;
mod commands;
mod config;
mod paths;
mod progress;
mod render;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use commands::execute::ReleaseIncomplete;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

/// Global context for the application
pub struct Context {
    pub quiet: bool,
    pub db: Option<PathBuf>,
}

/// Exit code for an error: 2 when the request itself was wrong, 3 when a
/// release finished incomplete, 1 otherwise
fn exit_code(err: &anyhow::Error) -> u8 {
    for cause in err.chain() {
        if cause.downcast_ref::<ReleaseIncomplete>().is_some() {
            return 3;
        }
        if let Some(err) = cause.downcast_ref::<orchestration::Error>() {
            return if err.is_client_error() { 2 } else { 1 };
        }
        if let Some(err) = cause.downcast_ref::<plm_store::Error>() {
            return if err.is_client_error() { 2 } else { 1 };
        }
    }
    1
}

fn run(cli: Cli) -> Result<()> {
    let ctx = Context {
        quiet: cli.quiet,
        db: cli.db,
    };

    match cli.command {
        Command::Plan(args) => commands::plan::run(&ctx, args),
        Command::Execute(args) => commands::execute::run(&ctx, args),
        Command::Rulesets { json } => commands::rulesets::run(json),
        Command::Esign(cmd) => commands::esign::run(&ctx, cmd),
        Command::Import { path } => commands::import::run(&ctx, &path),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "relorch", &mut io::stdout());
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            ui::error(&format!("{err:#}"));
            ExitCode::from(exit_code(&err))
        }
    }
}
