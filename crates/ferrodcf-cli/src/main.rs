mod cli;
mod commands;
mod error;
mod inputs;
mod logging;
mod metadata;
mod output;

use clap::Parser;
use ferrodcf_core::Settings;
use std::process::ExitCode;

use crate::cli::{Cli, Command};
use crate::error::{exit_code_for_error_code, CliError};

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::from(error.exit_code())
        }
    }
}

async fn run() -> Result<ExitCode, CliError> {
    let cli = Cli::parse();

    let mut settings = Settings::load(cli.config.as_deref())?;
    cli.apply_overrides(&mut settings);
    settings.validate()?;
    logging::init_logging(&settings.logging.level, settings.logging.format);

    let output = commands::run(&cli, settings).await?;
    let envelope = &output.envelope;
    // The session already wrote its transcript to stdout.
    if !matches!(cli.command, Command::Interactive(_)) {
        output::render(envelope, &output.tables, cli.format, cli.pretty)?;
    }

    if cli.strict && (!envelope.meta.warnings.is_empty() || !envelope.errors.is_empty()) {
        return Err(CliError::StrictModeViolation {
            warning_count: envelope.meta.warnings.len(),
            error_count: envelope.errors.len(),
        });
    }

    if let Some(first) = envelope.errors.first() {
        return Ok(ExitCode::from(exit_code_for_error_code(&first.code)));
    }

    Ok(ExitCode::SUCCESS)
}
