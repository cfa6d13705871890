//! MAC-to-IP resolution loop.
//!
//! One resolution initializes an [`ArpClient`], then races a passive
//! neighbor-table read against an active range scan, retrying every
//! `backoff` until an address or an error arrives or the overall timeout
//! elapses. The client is destroyed exactly once on every exit path.
//!
//! # Producers
//!
//! At most one scan and one table read are in flight at any time. A new
//! iteration only relaunches a producer whose previous run has finished,
//! so a slow scan keeps going across backoff ticks instead of being
//! duplicated. When the loop reaches a terminal state it broadcasts stop
//! and waits for the producers to wind down before touching the client
//! again. Dropping the resolution future aborts them.

mod scan;

pub use scan::scan;

use crate::arp::{ArpClient, Sinks};
use crate::error::{LookupError, LookupResult};
use crate::types::{parse_duration, Address, AddressSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[cfg(target_os = "linux")]
use crate::arp::{ArpOptions, LinuxArpClient};
#[cfg(target_os = "linux")]
use crate::types::HardwareAddress;

/// Default wait between discovery iterations.
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(5);
/// Default overall deadline of one resolution.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const MIN_BACKOFF: Duration = Duration::from_millis(1);
const SINK_CAPACITY: usize = 4;

/// Inputs of one resolution call.
#[derive(Debug, Clone)]
pub struct ResolutionConfig {
    interface: String,
    addresses: AddressSet,
    backoff: Duration,
    timeout: Duration,
}

impl ResolutionConfig {
    /// A configuration with the default backoff and timeout.
    pub fn new(interface: impl Into<String>, addresses: AddressSet) -> Self {
        Self {
            interface: interface.into(),
            addresses,
            backoff: DEFAULT_BACKOFF,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Build the address set from CIDR prefixes.
    ///
    /// An empty prefix list is [`LookupError::NoNetworkSpecified`].
    pub fn build<S: AsRef<str>>(interface: impl Into<String>, prefixes: &[S]) -> LookupResult<Self> {
        if prefixes.is_empty() {
            return Err(LookupError::NoNetworkSpecified);
        }
        Ok(Self::new(interface, AddressSet::build(prefixes)?))
    }

    /// Build a configuration from unvalidated text inputs.
    pub fn from_inputs<S: AsRef<str>>(
        interface: &str,
        prefixes: &[S],
        backoff: &str,
        timeout: &str,
    ) -> LookupResult<Self> {
        Ok(Self::build(interface, prefixes)?
            .with_backoff(parse_duration(backoff)?)
            .with_timeout(parse_duration(timeout)?))
    }

    /// Set the wait between iterations. Clamped to at least 1ms.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff.max(MIN_BACKOFF);
        self
    }

    /// Set the overall deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    pub fn addresses(&self) -> &AddressSet {
        &self.addresses
    }

    pub fn backoff(&self) -> Duration {
        self.backoff
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Resolve the client's target MAC to an address.
///
/// Returns [`LookupError::NotFound`] when the timeout elapses without an
/// answer. Any other error is fatal and returned as soon as it is seen.
pub async fn resolve<C>(mut client: C, config: &ResolutionConfig) -> LookupResult<Address>
where
    C: ArpClient + 'static,
{
    let mac = client.target();
    info!(
        mac = %mac,
        interface = config.interface(),
        networks = %config.addresses(),
        "resolving"
    );

    // The timeout covers init as well as discovery.
    let deadline = tokio::time::Instant::now() + config.timeout();

    if let Err(e) = client.init(config.interface()).await {
        if let Err(released) = client.destroy().await {
            warn!(error = %released, "failed to release ARP client");
        }
        return Err(e);
    }

    let client = Arc::new(client);
    let started = Instant::now();
    let outcome = run(Arc::clone(&client), config, deadline).await;
    let released = client.destroy().await;

    match &outcome {
        Ok(address) => info!(
            mac = %mac,
            ip = %address,
            cached = address.from_cache,
            elapsed = ?started.elapsed(),
            "found"
        ),
        Err(e) if e.is_not_found() => info!(mac = %mac, elapsed = ?started.elapsed(), "timed out"),
        Err(e) => warn!(mac = %mac, error = %e, "resolution failed"),
    }

    match (outcome, released) {
        (Err(e), Err(released)) => {
            warn!(error = %released, "failed to release ARP client");
            Err(e)
        }
        (Ok(_), Err(released)) => Err(released),
        (outcome, Ok(())) => outcome,
    }
}

/// Resolve `mac` on a raw-socket client bound to the configured interface.
#[cfg(target_os = "linux")]
pub async fn lookup(
    mac: HardwareAddress,
    config: &ResolutionConfig,
    options: ArpOptions,
) -> LookupResult<Address> {
    resolve(LinuxArpClient::new(mac, options), config).await
}

async fn run<C>(
    client: Arc<C>,
    config: &ResolutionConfig,
    deadline: tokio::time::Instant,
) -> LookupResult<Address>
where
    C: ArpClient + 'static,
{
    let (result_tx, mut results) = mpsc::channel(SINK_CAPACITY);
    let (error_tx, mut errors) = mpsc::channel(SINK_CAPACITY);
    let (stop, stop_rx) = watch::channel(false);
    let sinks = Sinks::new(result_tx, error_tx, stop_rx);
    let addresses = Arc::new(config.addresses().clone());

    let mut producers = Producers::default();
    let deadline = tokio::time::sleep_until(deadline);
    tokio::pin!(deadline);

    let mut iteration = 0u64;
    let outcome = loop {
        iteration += 1;
        debug!(iteration, "discovery iteration");
        producers.launch(&client, &addresses, &sinks);

        let backoff = tokio::time::sleep(config.backoff());
        tokio::select! {
            biased;

            Some(address) = results.recv() => break Ok(address),
            Some(error) = errors.recv() => break Err(error),
            _ = &mut deadline => break Err(LookupError::NotFound(client.target())),
            _ = backoff => continue,
        }
    };

    stop.send_replace(true);
    producers.drain().await;

    if let Ok(address) = &outcome {
        if let Err(e) = client.cache(address).await {
            warn!(ip = %address, error = %e, "failed to warm neighbor cache");
        }
    }

    outcome
}

/// Handles of the scan and table-read tasks. Aborted on drop.
#[derive(Default)]
struct Producers {
    scan: Option<JoinHandle<()>>,
    cache: Option<JoinHandle<()>>,
}

impl Producers {
    /// Start each producer that is not already running.
    fn launch<C>(&mut self, client: &Arc<C>, addresses: &Arc<AddressSet>, sinks: &Sinks)
    where
        C: ArpClient + 'static,
    {
        if is_idle(&self.cache) {
            let client = Arc::clone(client);
            let sinks = sinks.clone();
            self.cache = Some(tokio::spawn(async move {
                client.try_cache(&sinks).await;
            }));
        }

        if is_idle(&self.scan) {
            let client = Arc::clone(client);
            let addresses = Arc::clone(addresses);
            let sinks = sinks.clone();
            self.scan = Some(tokio::spawn(async move {
                scan(client.as_ref(), &addresses, &sinks).await;
            }));
        } else {
            debug!("previous scan still running");
        }
    }

    /// Wait for both producers to finish.
    async fn drain(&mut self) {
        for handle in [self.scan.take(), self.cache.take()].into_iter().flatten() {
            if let Err(e) = handle.await {
                if e.is_panic() {
                    warn!(error = %e, "discovery task panicked");
                }
            }
        }
    }
}

impl Drop for Producers {
    fn drop(&mut self) {
        for handle in self.scan.iter().chain(self.cache.iter()) {
            handle.abort();
        }
    }
}

fn is_idle(handle: &Option<JoinHandle<()>>) -> bool {
    handle.as_ref().map_or(true, JoinHandle::is_finished)
}
