//! In-memory ARP client.
//!
//! Simulates one host on a network without touching sockets: probes succeed
//! only for the configured needle, and the neighbor table holds at most one
//! entry. Every call is counted so callers can assert on lifecycle and
//! cancellation behavior.

use super::{ArpClient, Sinks};
use crate::error::{LookupError, LookupResult};
use crate::types::{Address, HardwareAddress};
use async_trait::async_trait;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Shared call counters of a [`StubArpClient`].
#[derive(Debug, Clone, Default)]
pub struct StubCounters {
    inits: Arc<AtomicUsize>,
    destroys: Arc<AtomicUsize>,
    probes: Arc<AtomicUsize>,
    cache_reads: Arc<AtomicUsize>,
    warms: Arc<AtomicUsize>,
}

impl StubCounters {
    pub fn inits(&self) -> usize {
        self.inits.load(Ordering::SeqCst)
    }

    pub fn destroys(&self) -> usize {
        self.destroys.load(Ordering::SeqCst)
    }

    pub fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    pub fn cache_reads(&self) -> usize {
        self.cache_reads.load(Ordering::SeqCst)
    }

    /// Cache warm calls that actually warmed (fresh addresses only).
    pub fn warms(&self) -> usize {
        self.warms.load(Ordering::SeqCst)
    }
}

/// Simulated ARP client.
#[derive(Debug, Clone)]
pub struct StubArpClient {
    target: HardwareAddress,
    needle: Option<IpAddr>,
    cache_entry: Option<IpAddr>,
    probe_delay: Duration,
    init_delay: Duration,
    fail_probes: bool,
    fail_cache: bool,
    fail_init: bool,
    counters: StubCounters,
}

impl StubArpClient {
    /// A client for a host that never answers and is never cached.
    pub fn new(target: HardwareAddress) -> Self {
        Self {
            target,
            needle: None,
            cache_entry: None,
            probe_delay: Duration::ZERO,
            init_delay: Duration::ZERO,
            fail_probes: false,
            fail_cache: false,
            fail_init: false,
            counters: StubCounters::default(),
        }
    }

    /// The host answers probes for `ip`.
    pub fn with_needle(mut self, ip: impl Into<IpAddr>) -> Self {
        self.needle = Some(ip.into());
        self
    }

    /// The neighbor table maps the target to `ip`.
    pub fn with_cache_entry(mut self, ip: impl Into<IpAddr>) -> Self {
        self.cache_entry = Some(ip.into());
        self
    }

    /// Each probe takes `delay` before answering.
    pub fn with_probe_delay(mut self, delay: Duration) -> Self {
        self.probe_delay = delay;
        self
    }

    /// `init` takes `delay` to bind.
    pub fn with_init_delay(mut self, delay: Duration) -> Self {
        self.init_delay = delay;
        self
    }

    /// Every probe fails with a socket error.
    pub fn with_failing_probes(mut self) -> Self {
        self.fail_probes = true;
        self
    }

    /// Every neighbor table read reports a malformed line.
    pub fn with_failing_cache(mut self) -> Self {
        self.fail_cache = true;
        self
    }

    /// `init` fails as if the interface did not exist.
    pub fn with_failing_init(mut self) -> Self {
        self.fail_init = true;
        self
    }

    /// Handle to the call counters, shared with every clone.
    pub fn counters(&self) -> StubCounters {
        self.counters.clone()
    }
}

#[async_trait]
impl ArpClient for StubArpClient {
    fn target(&self) -> HardwareAddress {
        self.target
    }

    async fn init(&mut self, interface: &str) -> LookupResult<()> {
        self.counters.inits.fetch_add(1, Ordering::SeqCst);
        if !self.init_delay.is_zero() {
            tokio::time::sleep(self.init_delay).await;
        }
        if self.fail_init {
            return Err(LookupError::InterfaceNotFound(interface.to_string()));
        }
        Ok(())
    }

    async fn destroy(&self) -> LookupResult<()> {
        self.counters.destroys.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn request(&self, candidate: IpAddr) -> LookupResult<Option<Address>> {
        self.counters.probes.fetch_add(1, Ordering::SeqCst);
        if !self.probe_delay.is_zero() {
            tokio::time::sleep(self.probe_delay).await;
        }
        if self.fail_probes {
            return Err(LookupError::ProbeIo(format!(
                "simulated send failure for {}",
                candidate
            )));
        }

        Ok((self.needle == Some(candidate)).then(|| Address::fresh(candidate)))
    }

    async fn try_cache(&self, sinks: &Sinks) {
        self.counters.cache_reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_cache {
            sinks.fail(LookupError::CacheParse {
                line: "garbage".to_string(),
                reason: "simulated malformed entry".to_string(),
            });
            return;
        }

        if let Some(ip) = self.cache_entry {
            if !sinks.stopped() {
                sinks.emit(Address::cached(ip));
            }
        }
    }

    async fn cache(&self, address: &Address) -> LookupResult<()> {
        if !address.from_cache {
            self.counters.warms.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}
