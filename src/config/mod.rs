//! Configuration management for arpseek.
//!
//! Provides XDG-compliant storage of the defaults applied to every lookup.

mod settings;

pub use settings::{AppSettings, Paths};
