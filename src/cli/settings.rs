//! Settings subcommand implementation.

use crate::cli::settings_path;
use crate::config::AppSettings;
use crate::error::{CliError, CliResult};
use crate::output;
use clap::{Parser, Subcommand};
use std::path::Path;

/// Show or initialize default settings.
#[derive(Parser, Debug)]
pub struct SettingsCommand {
    #[command(subcommand)]
    pub action: SettingsAction,
}

/// Settings actions.
#[derive(Subcommand, Debug)]
pub enum SettingsAction {
    /// Print the effective settings as JSON
    Show,

    /// Print the settings file location
    Path,

    /// Write a settings file with default values
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

impl SettingsCommand {
    /// Execute the settings command.
    pub fn execute(&self, config: Option<&Path>, quiet: bool) -> CliResult<()> {
        let path = settings_path(config)?;

        match &self.action {
            SettingsAction::Show => {
                let settings = AppSettings::load_from(&path)?;
                let json = serde_json::to_string_pretty(&settings)
                    .map_err(|e| CliError::Other(e.to_string()))?;
                println!("{}", json);
            }
            SettingsAction::Path => {
                println!("{}", path.display());
            }
            SettingsAction::Init { force } => {
                if path.exists() && !force {
                    return Err(CliError::Other(format!(
                        "{} already exists (use --force to overwrite)",
                        path.display()
                    )));
                }
                AppSettings::default().save_to(&path)?;
                if !quiet {
                    output::print_success(&format!("Wrote default settings to {}", path.display()));
                }
            }
        }

        Ok(())
    }
}
