//! Plain text output formatting.
//!
//! Produces human-readable output with colors and formatting.

use super::{Resolution, Source};
use console::{style, Style};
use std::io::{self, Write};

/// Write a resolution in human-readable plain text format.
pub fn write_plain<W: Write>(out: &mut W, record: &Resolution) -> io::Result<()> {
    let source_style = match record.source {
        Source::Probe => Style::new().green().bold(),
        Source::Cache => Style::new().cyan(),
        Source::Fallback => Style::new().yellow(),
    };

    writeln!(
        out,
        "{} {} {}",
        style(record.mac).bold(),
        style("→").dim(),
        style(record.ip).white().bold()
    )?;
    writeln!(
        out,
        "  {} {}",
        style("Source:").bold(),
        source_style.apply_to(record.source)
    )?;
    writeln!(out, "  {} {}", style("Interface:").bold(), record.interface)?;
    writeln!(
        out,
        "  {} {:.2}s",
        style("Elapsed:").bold(),
        record.elapsed_ms as f64 / 1000.0
    )?;
    writeln!(
        out,
        "  {} {}",
        style("At:").bold(),
        style(record.resolved_at.format("%Y-%m-%d %H:%M:%S UTC")).dim()
    )?;

    Ok(())
}

/// Print an error message.
pub fn print_error(msg: &str) {
    eprintln!("{} {}", style("Error:").red().bold(), msg);
}

/// Print a warning message.
pub fn print_warning(msg: &str) {
    eprintln!("{} {}", style("Warning:").yellow().bold(), msg);
}

/// Print a success message.
pub fn print_success(msg: &str) {
    eprintln!("{} {}", style("✓").green().bold(), msg);
}
