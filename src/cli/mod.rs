//! CLI subcommand definitions and handlers.
//!
//! - `arpseek lookup --mac <MAC>` - Resolve a MAC to its current IP
//! - `arpseek settings show|path|init` - Manage default settings

mod lookup;
mod settings;

pub use lookup::LookupCommand;
pub use settings::SettingsCommand;

use crate::config::Paths;
use crate::error::CliResult;
use clap::{ArgAction, Parser, Subcommand};
use std::path::{Path, PathBuf};

/// arpseek - find the IP address a MAC currently answers for.
///
/// Races a read of the kernel neighbor table against ARP requests over the
/// given networks, retrying until the timeout elapses.
#[derive(Parser, Debug)]
#[command(name = "arpseek")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Resolve a MAC address to its current IP on the local segment", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to custom settings file
    #[arg(long, global = true, value_name = "PATH", env = "ARPSEEK_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve a MAC address to an IP address
    #[command(alias = "l")]
    Lookup(LookupCommand),

    /// Show or initialize default settings
    Settings(SettingsCommand),
}

/// Output format for results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable plain text
    #[default]
    Plain,
    /// JSON structured output
    Json,
    /// CSV format for data analysis
    Csv,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plain => write!(f, "plain"),
            Self::Json => write!(f, "json"),
            Self::Csv => write!(f, "csv"),
        }
    }
}

/// The settings file to use: `--config` if given, else the XDG default.
pub fn settings_path(config: Option<&Path>) -> CliResult<PathBuf> {
    match config {
        Some(path) => Ok(path.to_path_buf()),
        None => Ok(Paths::new()?.settings_file()),
    }
}
