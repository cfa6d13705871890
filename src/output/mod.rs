//! Output formatting module.
//!
//! Provides formatters for plain text, JSON, and CSV output of a resolution.

mod csv_format;
mod json_format;
mod plain;

pub use csv_format::write_csv;
pub use json_format::write_json;
pub use plain::{print_error, print_success, print_warning, write_plain};

use crate::cli::OutputFormat;
use crate::types::{Address, HardwareAddress};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::io::{self, Write};
use std::net::IpAddr;
use std::time::Duration;

/// How the reported address was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Read from the OS neighbor table.
    Cache,
    /// Answered an ARP request.
    Probe,
    /// Not found in time; the caller's previously known address.
    Fallback,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Cache => write!(f, "cache"),
            Source::Probe => write!(f, "probe"),
            Source::Fallback => write!(f, "fallback"),
        }
    }
}

/// The outcome of one lookup as reported to the user.
#[derive(Debug, Clone, Serialize)]
pub struct Resolution {
    pub mac: HardwareAddress,
    pub ip: IpAddr,
    pub source: Source,
    pub interface: String,
    pub elapsed_ms: u64,
    pub resolved_at: DateTime<Utc>,
}

impl Resolution {
    /// A record for an address the resolver found.
    pub fn found(
        mac: HardwareAddress,
        address: Address,
        interface: impl Into<String>,
        elapsed: Duration,
    ) -> Self {
        let source = if address.from_cache {
            Source::Cache
        } else {
            Source::Probe
        };
        Self::new(mac, address.ip, source, interface.into(), elapsed)
    }

    /// A record reporting the caller's fallback address.
    pub fn fallback(
        mac: HardwareAddress,
        ip: IpAddr,
        interface: impl Into<String>,
        elapsed: Duration,
    ) -> Self {
        Self::new(mac, ip, Source::Fallback, interface.into(), elapsed)
    }

    fn new(
        mac: HardwareAddress,
        ip: IpAddr,
        source: Source,
        interface: String,
        elapsed: Duration,
    ) -> Self {
        Self {
            mac,
            ip,
            source,
            interface,
            elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            resolved_at: Utc::now(),
        }
    }
}

/// Write a resolution in the requested format.
pub fn write_results<W: Write>(out: &mut W, record: &Resolution, format: OutputFormat) -> io::Result<()> {
    match format {
        OutputFormat::Plain => write_plain(out, record),
        OutputFormat::Json => write_json(out, record),
        OutputFormat::Csv => write_csv(out, record),
    }
}

/// Print a resolution to stdout in the requested format.
pub fn print_results(record: &Resolution, format: OutputFormat) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_results(&mut out, record, format)?;
    out.flush()
}
