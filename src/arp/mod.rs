//! ARP client abstraction.
//!
//! An [`ArpClient`] is bound to one network interface and looks for one
//! target hardware address. It offers active request/reply probing, a
//! passive read of the OS neighbor table, and cache warming. The resolver
//! drives any implementation through this trait: the raw-socket
//! [`LinuxArpClient`] in production and [`StubArpClient`] in tests.

#[cfg(target_os = "linux")]
pub mod linux;
pub mod ping;
#[cfg(target_os = "linux")]
pub mod privilege;
pub mod stub;
pub mod table;

#[cfg(target_os = "linux")]
pub use linux::{ArpOptions, LinuxArpClient};
pub use stub::{StubArpClient, StubCounters};

use crate::error::{LookupError, LookupResult};
use crate::types::{Address, HardwareAddress};
use async_trait::async_trait;
use std::net::IpAddr;
use tokio::sync::{mpsc, watch};
use tracing::debug;

/// Where concurrent discovery work reports to.
///
/// Bundles the shared result and error channels with the stop broadcast.
/// Writes never block: once the consumer has its answer, late values are
/// dropped.
#[derive(Debug, Clone)]
pub struct Sinks {
    results: mpsc::Sender<Address>,
    errors: mpsc::Sender<LookupError>,
    stop: watch::Receiver<bool>,
}

impl Sinks {
    /// Create a new set of sinks.
    pub fn new(
        results: mpsc::Sender<Address>,
        errors: mpsc::Sender<LookupError>,
        stop: watch::Receiver<bool>,
    ) -> Self {
        Self {
            results,
            errors,
            stop,
        }
    }

    /// Whether the stop broadcast has been sent.
    pub fn stopped(&self) -> bool {
        *self.stop.borrow()
    }

    /// Deliver a found address. Returns `false` if it was dropped.
    pub fn emit(&self, address: Address) -> bool {
        match self.results.try_send(address) {
            Ok(()) => true,
            Err(e) => {
                debug!(ip = %address, reason = %e, "dropping late result");
                false
            }
        }
    }

    /// Deliver a fatal error. Returns `false` if it was dropped.
    pub fn fail(&self, error: LookupError) -> bool {
        match self.errors.try_send(error) {
            Ok(()) => true,
            Err(e) => {
                debug!(reason = %e, "dropping late error");
                false
            }
        }
    }
}

/// Capability set over one network interface for finding one MAC.
///
/// `init` is called once before any other method and `destroy` exactly once
/// afterwards, on every exit path. Between the two, `request`, `try_cache`
/// and `cache` may run concurrently from different tasks.
#[async_trait]
pub trait ArpClient: Send + Sync {
    /// The hardware address being looked for.
    fn target(&self) -> HardwareAddress;

    /// Bind to the named interface, raising privilege if needed.
    async fn init(&mut self, interface: &str) -> LookupResult<()>;

    /// Release the socket and restore any privilege raised by `init`.
    async fn destroy(&self) -> LookupResult<()>;

    /// Send one ARP request for `candidate` and wait briefly for the target
    /// to answer. `Ok(None)` means no answer within the request deadline.
    async fn request(&self, candidate: IpAddr) -> LookupResult<Option<Address>>;

    /// Look the target up in the OS neighbor table without sending traffic.
    ///
    /// A match is emitted on the result sink, a malformed table on the error
    /// sink. Nothing is emitted when the target is absent.
    async fn try_cache(&self, sinks: &Sinks);

    /// Prime the OS neighbor cache for a freshly probed address.
    ///
    /// No-op for addresses already read from the cache.
    async fn cache(&self, address: &Address) -> LookupResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn sinks(capacity: usize) -> (Sinks, mpsc::Receiver<Address>, watch::Sender<bool>) {
        let (results, result_rx) = mpsc::channel(capacity);
        let (errors, _error_rx) = mpsc::channel(capacity);
        let (stop_tx, stop_rx) = watch::channel(false);
        (Sinks::new(results, errors, stop_rx), result_rx, stop_tx)
    }

    #[tokio::test]
    async fn test_emit_never_blocks_when_full() {
        let (sinks, mut rx, _stop) = sinks(1);
        let addr = Address::fresh(Ipv4Addr::new(10, 0, 0, 1));

        assert!(sinks.emit(addr));
        assert!(!sinks.emit(addr));
        assert_eq!(rx.recv().await, Some(addr));
    }

    #[tokio::test]
    async fn test_emit_after_consumer_gone() {
        let (sinks, rx, _stop) = sinks(1);
        drop(rx);
        assert!(!sinks.emit(Address::cached(Ipv4Addr::new(10, 0, 0, 1))));
    }

    #[test]
    fn test_stop_broadcast() {
        let (sinks, _rx, stop) = sinks(1);
        let clone = sinks.clone();
        assert!(!clone.stopped());
        stop.send_replace(true);
        assert!(sinks.stopped());
        assert!(clone.stopped());
    }
}
