//! # arpseek - MAC-to-IP resolution on the local segment
//!
//! Given a hardware address and the networks it may live in, arpseek finds
//! the IP address that currently answers for it. Machines with dynamic
//! addresses can be located without DHCP or DNS cooperation.
//!
//! ## How it works
//!
//! Each resolution races two producers:
//!
//! - a passive read of the kernel neighbor table (`/proc/net/arp`);
//! - an active scan sending ARP requests, addressed to the target MAC, for
//!   every valid host of the given networks.
//!
//! The first answer wins. If neither finds anything the attempt is repeated
//! every `backoff` until the overall `timeout` elapses, which yields
//! [`LookupError::NotFound`].
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use arpseek::resolver::{lookup, ResolutionConfig};
//! use arpseek::arp::ArpOptions;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), arpseek::LookupError> {
//!     let mac = "3e:50:6e:54:28:3d".parse()?;
//!     let config = ResolutionConfig::from_inputs("eth0", &["10.18.0.0/17"], "5s", "10s")?;
//!
//!     let address = lookup(mac, &config, ArpOptions::default()).await?;
//!     println!("{} is at {}", mac, address);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`types`] - Hardware addresses, address sets and the host filter
//! - [`arp`] - The `ArpClient` trait, the raw-socket client and a stub
//! - [`resolver`] - The discovery loop
//! - [`config`] - Saved lookup defaults
//! - [`error`] - Error types
//! - [`output`] - Output formatting utilities

pub mod arp;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod output;
pub mod resolver;
pub mod types;

// Re-export commonly used types
pub use arp::ArpClient;
pub use error::{CliError, ConfigError, LookupError};
pub use resolver::{resolve, ResolutionConfig};
pub use types::{Address, AddressSet, HardwareAddress};
