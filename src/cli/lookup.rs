//! Lookup subcommand implementation.
//!
//! Handles `arpseek lookup --mac <MAC>`: merges flags with the saved
//! settings, runs one resolution and prints the record.

use crate::cli::OutputFormat;
use crate::config::AppSettings;
use crate::error::{CliError, CliResult, LookupError, LookupResult};
use crate::output::{self, Resolution};
use crate::resolver::ResolutionConfig;
use crate::types::{parse_duration, Address, HardwareAddress};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::net::IpAddr;
use std::time::{Duration, Instant};

/// Resolve a MAC address to an IP address.
#[derive(Parser, Debug)]
pub struct LookupCommand {
    /// Hardware address to resolve (aa:bb:cc:dd:ee:ff, aa-bb-..., aabb.ccdd.eeff)
    #[arg(short, long, value_parser = HardwareAddress::parse)]
    pub mac: HardwareAddress,

    /// CIDR prefix to search; repeatable. Defaults to the saved networks
    ///
    /// Examples:
    ///   10.18.0.0/17
    ///   192.168.1.0/24
    #[arg(short = 'n', long = "network", value_name = "CIDR")]
    pub networks: Vec<String>,

    /// Network interface to probe on
    #[arg(short, long)]
    pub interface: Option<String>,

    /// Wait between discovery iterations (e.g. "5s", "500ms")
    #[arg(short, long, value_parser = parse_duration)]
    pub backoff: Option<Duration>,

    /// Overall deadline (e.g. "30s", "1m")
    #[arg(short, long, value_parser = parse_duration)]
    pub timeout: Option<Duration>,

    /// Previously known IP to report if the MAC is not found in time
    #[arg(long, value_name = "IP")]
    pub fallback: Option<IpAddr>,

    /// Output format for results
    #[arg(short, long, value_enum, default_value = "plain")]
    pub output: OutputFormat,
}

impl LookupCommand {
    /// Execute the lookup command.
    pub async fn execute(&self, settings: &AppSettings, verbose: u8, quiet: bool) -> CliResult<()> {
        let config = self.resolution_config(settings)?;

        let progress = (verbose > 0 && !quiet && self.output == OutputFormat::Plain)
            .then(|| spinner(&self.mac, &config));

        let started = Instant::now();
        let outcome = run_lookup(self.mac, &config, settings).await;
        let elapsed = started.elapsed();

        if let Some(progress) = progress {
            progress.finish_and_clear();
        }

        let (address, fell_back) = settle(outcome, self.fallback)?;
        let record = if fell_back {
            if !quiet {
                output::print_warning(&format!(
                    "{} not found within {}, reporting fallback {}",
                    self.mac,
                    humantime::format_duration(config.timeout()),
                    address.ip
                ));
            }
            Resolution::fallback(self.mac, address.ip, config.interface(), elapsed)
        } else {
            Resolution::found(self.mac, address, config.interface(), elapsed)
        };

        output::print_results(&record, self.output)?;
        Ok(())
    }

    /// Merge flags over saved settings.
    fn resolution_config(&self, settings: &AppSettings) -> CliResult<ResolutionConfig> {
        let interface = self
            .interface
            .as_deref()
            .or(settings.interface.as_deref())
            .ok_or_else(|| {
                CliError::Other(
                    "no interface specified: pass --interface or set one in the settings"
                        .to_string(),
                )
            })?;

        let config = ResolutionConfig::build(interface, settings.networks(&self.networks))?
            .with_backoff(self.backoff.unwrap_or(settings.backoff))
            .with_timeout(self.timeout.unwrap_or(settings.timeout));

        Ok(config)
    }
}

#[cfg(target_os = "linux")]
async fn run_lookup(
    mac: HardwareAddress,
    config: &ResolutionConfig,
    settings: &AppSettings,
) -> LookupResult<Address> {
    let options = crate::arp::ArpOptions {
        privileged_ping: settings.privileged_ping,
        ..Default::default()
    };
    crate::resolver::lookup(mac, config, options).await
}

#[cfg(not(target_os = "linux"))]
async fn run_lookup(
    _mac: HardwareAddress,
    _config: &ResolutionConfig,
    _settings: &AppSettings,
) -> LookupResult<Address> {
    Err(LookupError::Capability(
        "raw ARP sockets are only supported on Linux".to_string(),
    ))
}

/// Apply the fallback policy: only `NotFound` may be replaced by a
/// previously known address. Returns the address and whether it is the
/// fallback.
fn settle(
    outcome: LookupResult<Address>,
    fallback: Option<IpAddr>,
) -> Result<(Address, bool), LookupError> {
    match (outcome, fallback) {
        (Ok(address), _) => Ok((address, false)),
        (Err(e), Some(ip)) if e.is_not_found() => Ok((Address::cached(ip), true)),
        (Err(e), _) => Err(e),
    }
}

fn spinner(mac: &HardwareAddress, config: &ResolutionConfig) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.green} [{elapsed}] {msg}") {
        pb.set_style(style);
    }
    pb.set_message(format!(
        "looking for {} in {} on {}",
        mac,
        config.addresses(),
        config.interface()
    ));
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};

    fn parse(args: &[&str]) -> LookupCommand {
        let mut argv = vec!["arpseek", "lookup"];
        argv.extend_from_slice(args);
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Lookup(cmd) => cmd,
            other => panic!("unexpected command: {other:?}"),
        }
    }

    fn mac() -> HardwareAddress {
        "3e:50:6e:54:28:3d".parse().unwrap()
    }

    #[test]
    fn test_parse_lookup_flags() {
        let cmd = parse(&[
            "--mac",
            "3E-50-6E-54-28-3D",
            "-n",
            "10.18.0.0/17",
            "-n",
            "10.19.0.0/24",
            "-i",
            "eth0",
            "--timeout",
            "10s",
            "--fallback",
            "10.18.6.1",
            "-o",
            "json",
        ]);

        assert_eq!(cmd.mac, mac());
        assert_eq!(cmd.networks.len(), 2);
        assert_eq!(cmd.timeout, Some(Duration::from_secs(10)));
        assert_eq!(cmd.backoff, None);
        assert_eq!(cmd.output, OutputFormat::Json);
    }

    #[test]
    fn test_bad_mac_rejected_by_parser() {
        let argv = ["arpseek", "lookup", "--mac", "not-a-mac"];
        assert!(Cli::try_parse_from(argv).is_err());
    }

    #[test]
    fn test_flags_override_settings() {
        let settings = AppSettings {
            network: vec!["192.168.0.0/24".to_string()],
            interface: Some("wlan0".to_string()),
            backoff: Duration::from_secs(2),
            ..Default::default()
        };

        let cmd = parse(&["--mac", "3e:50:6e:54:28:3d", "-i", "eth0", "-t", "10s"]);
        let config = cmd.resolution_config(&settings).unwrap();
        assert_eq!(config.interface(), "eth0");
        assert_eq!(config.addresses().to_string(), "192.168.0.0/24");
        assert_eq!(config.backoff(), Duration::from_secs(2));
        assert_eq!(config.timeout(), Duration::from_secs(10));

        let cmd = parse(&["--mac", "3e:50:6e:54:28:3d", "-n", "10.18.0.0/17"]);
        let config = cmd.resolution_config(&settings).unwrap();
        assert_eq!(config.interface(), "wlan0");
        assert_eq!(config.addresses().to_string(), "10.18.0.0/17");
    }

    #[test]
    fn test_missing_network_or_interface() {
        let cmd = parse(&["--mac", "3e:50:6e:54:28:3d", "-i", "eth0"]);
        let err = cmd.resolution_config(&AppSettings::default()).unwrap_err();
        assert!(matches!(
            err,
            CliError::Lookup(LookupError::NoNetworkSpecified)
        ));

        let cmd = parse(&["--mac", "3e:50:6e:54:28:3d", "-n", "10.0.0.0/24"]);
        let err = cmd.resolution_config(&AppSettings::default()).unwrap_err();
        assert!(matches!(err, CliError::Other(_)));
    }

    #[test]
    fn test_fallback_only_replaces_not_found() {
        let fallback: IpAddr = "10.18.6.1".parse().unwrap();
        let found = Address::fresh(std::net::Ipv4Addr::new(10, 18, 6, 18));

        assert_eq!(settle(Ok(found), Some(fallback)).unwrap(), (found, false));

        let (address, fell_back) =
            settle(Err(LookupError::NotFound(mac())), Some(fallback)).unwrap();
        assert!(fell_back);
        assert_eq!(address.ip, fallback);

        assert!(settle(Err(LookupError::NotFound(mac())), None)
            .unwrap_err()
            .is_not_found());
        assert!(matches!(
            settle(Err(LookupError::ProbeIo("down".into())), Some(fallback)),
            Err(LookupError::ProbeIo(_))
        ));
    }
}
