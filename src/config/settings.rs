//! Application settings and paths.
//!
//! Settings live in `settings.json` under the XDG config directory
//! (`~/.config/arpseek`). A missing file means defaults.

use crate::error::{ConfigError, ConfigResult};
use crate::resolver::{DEFAULT_BACKOFF, DEFAULT_TIMEOUT};
use crate::types::AddressSet;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Application directory paths following the XDG Base Directory Specification.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Configuration directory (~/.config/arpseek)
    pub config_dir: PathBuf,
}

impl Paths {
    /// Resolve the XDG directories for the current user.
    pub fn new() -> ConfigResult<Self> {
        let project =
            ProjectDirs::from("", "", "arpseek").ok_or(ConfigError::DirectoryNotFound)?;

        Ok(Self {
            config_dir: project.config_dir().to_path_buf(),
        })
    }

    /// Get the path to the settings file.
    pub fn settings_file(&self) -> PathBuf {
        self.config_dir.join("settings.json")
    }
}

/// Defaults applied to every lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// CIDR prefixes searched when a lookup names none.
    pub network: Vec<String>,
    /// Interface used when a lookup names none.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interface: Option<String>,
    /// Wait between discovery iterations.
    #[serde(with = "humantime_serde")]
    pub backoff: Duration,
    /// Overall deadline of one lookup.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Warm the neighbor cache with a raw ICMP socket. Unset means "only
    /// when running as root".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub privileged_ping: Option<bool>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            network: Vec::new(),
            interface: None,
            backoff: DEFAULT_BACKOFF,
            timeout: DEFAULT_TIMEOUT,
            privileged_ping: None,
        }
    }
}

impl AppSettings {
    /// Load settings from the default location.
    pub fn load() -> ConfigResult<Self> {
        Self::load_from(&Paths::new()?.settings_file())
    }

    /// Load settings from a specific file, falling back to defaults if it
    /// does not exist.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "no settings file, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let settings: Self = serde_json::from_str(&content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Save settings to the default location.
    pub fn save(&self) -> ConfigResult<PathBuf> {
        let file = Paths::new()?.settings_file();
        self.save_to(&file)?;
        Ok(file)
    }

    /// Save settings to a specific file, creating its directory.
    pub fn save_to(&self, path: &Path) -> ConfigResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).map_err(|e| ConfigError::WriteFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Reject default networks that do not form a valid address set.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.network.is_empty() {
            return Ok(());
        }
        AddressSet::build(&self.network)
            .map(|_| ())
            .map_err(|e| ConfigError::InvalidFormat(format!("network: {}", e)))
    }

    /// The networks for one lookup: the requested ones if any, otherwise
    /// the configured defaults.
    pub fn networks<'a>(&'a self, requested: &'a [String]) -> &'a [String] {
        if requested.is_empty() {
            &self.network
        } else {
            requested
        }
    }
}
