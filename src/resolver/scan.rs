//! Active range scan.

use crate::arp::{ArpClient, Sinks};
use crate::types::{is_valid_host, AddressSet};
use tracing::{debug, trace};

/// Candidates probed between cooperative yields.
const YIELD_EVERY: usize = 256;

/// Probe every valid host of `addresses` in ascending order.
///
/// The stop broadcast is checked before each candidate. The first reply is
/// emitted on the result sink and ends the scan, as does the first error.
/// Ranges that are not IPv4 are skipped.
pub async fn scan<C>(client: &C, addresses: &AddressSet, sinks: &Sinks)
where
    C: ArpClient + ?Sized,
{
    let mut probed = 0usize;

    for range in addresses.ranges().iter().filter(|r| r.is_ipv4()) {
        for candidate in range.iter() {
            if sinks.stopped() {
                trace!(probed, "scan stopped");
                return;
            }
            if !is_valid_host(candidate) {
                continue;
            }

            probed += 1;
            if probed % YIELD_EVERY == 0 {
                tokio::task::yield_now().await;
            }

            match client.request(candidate).await {
                Ok(Some(address)) => {
                    debug!(ip = %address, probed, "probe answered");
                    sinks.emit(address);
                    return;
                }
                Ok(None) => {}
                Err(e) => {
                    sinks.fail(e);
                    return;
                }
            }
        }
    }

    trace!(probed, "scan exhausted all ranges");
}
