use anyhow::Context;
use arpseek::cli::{settings_path, Cli, Commands};
use arpseek::config::AppSettings;
use arpseek::{logging, output, CliError};
use clap::Parser;
use std::process::ExitCode;

/// Exit status when the MAC was not found before the deadline.
const EXIT_NOT_FOUND: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.verbose) {
        output::print_warning(&format!("logging unavailable: {}", e));
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::print_error(&format!("{:#}", e));
            let not_found = e
                .downcast_ref::<CliError>()
                .map_or(false, CliError::is_not_found);
            if not_found {
                ExitCode::from(EXIT_NOT_FOUND)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Lookup(cmd) => {
            let path = settings_path(cli.config.as_deref())?;
            let settings = AppSettings::load_from(&path)
                .map_err(CliError::from)
                .with_context(|| format!("failed to load settings from {}", path.display()))?;
            cmd.execute(&settings, cli.verbose, cli.quiet).await?;
        }
        Commands::Settings(cmd) => cmd.execute(cli.config.as_deref(), cli.quiet)?,
    }

    Ok(())
}
