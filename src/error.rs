//! Error types for arpseek.
//!
//! Uses `thiserror` for ergonomic error definitions.

use crate::types::HardwareAddress;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for a MAC-to-IP resolution.
#[derive(Error, Debug)]
pub enum LookupError {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("provided IP prefixes create an invalid set of addresses: {0}")]
    Set(String),

    #[error("no network specified: a network must be given either per lookup or in the settings")]
    NoNetworkSpecified,

    #[error("interface not found: {0}")]
    InterfaceNotFound(String),

    #[error("interface address error: {0}")]
    InterfaceAddress(String),

    #[error("capability error: {0}")]
    Capability(String),

    #[error("probe I/O error: {0}")]
    ProbeIo(String),

    #[error("malformed neighbor table entry {line:?}: {reason}")]
    CacheParse { line: String, reason: String },

    #[error("IP address for {0} not found before the deadline")]
    NotFound(HardwareAddress),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LookupError {
    /// Whether this is the deadline-elapsed outcome callers may recover from
    /// by falling back to a previously known address.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Result type alias for lookup operations.
pub type LookupResult<T> = Result<T, LookupError>;

/// Errors from the settings layer.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not determine a configuration directory")]
    DirectoryNotFound,

    #[error("failed to read {path}: {reason}")]
    ReadFailed { path: PathBuf, reason: String },

    #[error("failed to write {path}: {reason}")]
    WriteFailed { path: PathBuf, reason: String },

    #[error("invalid settings format: {0}")]
    InvalidFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        Self::InvalidFormat(e.to_string())
    }
}

/// Result type alias for settings operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors surfaced by the command-line front end.
#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl CliError {
    /// Whether the command failed only because the MAC was not found.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Lookup(e) if e.is_not_found())
    }
}

impl From<csv::Error> for CliError {
    fn from(e: csv::Error) -> Self {
        Self::Other(format!("CSV output failed: {}", e))
    }
}

/// Result type alias for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_is_recoverable() {
        let mac: HardwareAddress = "3e:50:6e:54:28:3d".parse().unwrap();
        assert!(LookupError::NotFound(mac).is_not_found());
        assert!(!LookupError::ProbeIo("boom".to_string()).is_not_found());
        assert!(CliError::from(LookupError::NotFound(mac)).is_not_found());
        assert!(!CliError::Other("x".to_string()).is_not_found());
    }

    #[test]
    fn test_error_messages() {
        let err = LookupError::CacheParse {
            line: "bogus".to_string(),
            reason: "too few columns".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "malformed neighbor table entry \"bogus\": too few columns"
        );
        assert_eq!(
            LookupError::InterfaceNotFound("eth9".to_string()).to_string(),
            "interface not found: eth9"
        );
    }
}
