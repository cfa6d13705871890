//! Merged, disjoint address ranges built from CIDR prefixes.
//!
//! An `AddressSet` holds its ranges sorted ascending (IPv4 before IPv6) and
//! maximally merged: no two ranges overlap or touch. Building a set from the
//! set's own prefixes or ranges yields the same set.

use crate::error::{LookupError, LookupResult};
use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Address family tag used for ordering; IPv4 sorts before IPv6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Family {
    V4,
    V6,
}

impl Family {
    fn of(ip: IpAddr) -> Self {
        match ip {
            IpAddr::V4(_) => Self::V4,
            IpAddr::V6(_) => Self::V6,
        }
    }

    fn bits(self) -> u32 {
        match self {
            Self::V4 => 32,
            Self::V6 => 128,
        }
    }

    fn addr(self, n: u128) -> IpAddr {
        match self {
            Self::V4 => IpAddr::V4(Ipv4Addr::from(n as u32)),
            Self::V6 => IpAddr::V6(Ipv6Addr::from(n)),
        }
    }
}

fn to_u128(ip: IpAddr) -> u128 {
    match ip {
        IpAddr::V4(v4) => u32::from(v4) as u128,
        IpAddr::V6(v6) => u128::from(v6),
    }
}

/// Mask with the low `bits` bits set.
fn low_mask(bits: u32) -> u128 {
    if bits >= 128 {
        u128::MAX
    } else {
        (1u128 << bits) - 1
    }
}

/// A contiguous, inclusive block of addresses of one family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AddressRange {
    from: IpAddr,
    to: IpAddr,
}

impl AddressRange {
    /// Create a range. Both ends must share a family and `from <= to`.
    pub fn new(from: IpAddr, to: IpAddr) -> LookupResult<Self> {
        if Family::of(from) != Family::of(to) {
            return Err(LookupError::Set(format!(
                "range {}-{} mixes address families",
                from, to
            )));
        }
        if to_u128(from) > to_u128(to) {
            return Err(LookupError::Set(format!(
                "range start {} is after range end {}",
                from, to
            )));
        }
        Ok(Self { from, to })
    }

    /// The range covered by a CIDR prefix (host bits are ignored).
    pub fn from_network(network: IpNetwork) -> Self {
        let family = Family::of(network.ip());
        let host_bits = family.bits() - network.prefix() as u32;
        let host_mask = low_mask(host_bits);
        let base = to_u128(network.ip()) & !host_mask;

        Self {
            from: family.addr(base),
            to: family.addr(base | host_mask),
        }
    }

    /// First address of the range.
    pub fn from(&self) -> IpAddr {
        self.from
    }

    /// Last address of the range.
    pub fn to(&self) -> IpAddr {
        self.to
    }

    /// Whether this is an IPv4 range.
    pub fn is_ipv4(&self) -> bool {
        self.from.is_ipv4()
    }

    /// Check if the range contains an address.
    pub fn contains(&self, ip: IpAddr) -> bool {
        Family::of(ip) == Family::of(self.from)
            && to_u128(self.from) <= to_u128(ip)
            && to_u128(ip) <= to_u128(self.to)
    }

    /// Number of addresses in the range, saturating at `u128::MAX`.
    pub fn len(&self) -> u128 {
        (to_u128(self.to) - to_u128(self.from)).saturating_add(1)
    }

    /// Ranges are never empty.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Iterate over every address in ascending order.
    pub fn iter(&self) -> AddressRangeIter {
        AddressRangeIter {
            family: Family::of(self.from),
            next: Some(to_u128(self.from)),
            last: to_u128(self.to),
        }
    }

    /// Decompose into the minimal list of covering CIDR prefixes.
    pub fn prefixes(&self) -> Vec<IpNetwork> {
        let family = Family::of(self.from);
        let width = family.bits();
        let last = to_u128(self.to);
        let mut start = to_u128(self.from);
        let mut out = Vec::new();

        loop {
            let align = start.trailing_zeros().min(width);
            let span = last - start;
            let fit = if span == u128::MAX {
                128
            } else {
                127 - (span + 1).leading_zeros()
            };
            let host_bits = align.min(fit);

            // The prefix length is always within the family width here.
            if let Ok(net) = IpNetwork::new(family.addr(start), (width - host_bits) as u8) {
                out.push(net);
            }

            let block_end = start | low_mask(host_bits);
            if block_end >= last {
                break;
            }
            start = block_end + 1;
        }

        out
    }
}

impl fmt::Display for AddressRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.from, self.to)
    }
}

/// Ascending iterator over the addresses of one range.
#[derive(Debug, Clone)]
pub struct AddressRangeIter {
    family: Family,
    next: Option<u128>,
    last: u128,
}

impl Iterator for AddressRangeIter {
    type Item = IpAddr;

    fn next(&mut self) -> Option<IpAddr> {
        let current = self.next?;
        self.next = if current < self.last {
            Some(current + 1)
        } else {
            None
        };
        Some(self.family.addr(current))
    }
}

/// Sorted, maximally merged, non-overlapping address ranges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressSet {
    ranges: Vec<AddressRange>,
}

impl AddressSet {
    /// Build a set from CIDR prefix strings.
    ///
    /// Fails with [`LookupError::Parse`] on a malformed prefix and with
    /// [`LookupError::Set`] if the union is empty.
    pub fn build<S: AsRef<str>>(prefixes: &[S]) -> LookupResult<Self> {
        let mut ranges = Vec::with_capacity(prefixes.len());
        for prefix in prefixes {
            let prefix = prefix.as_ref().trim();
            let network: IpNetwork = prefix.parse().map_err(|e| {
                LookupError::Parse(format!("malformed or invalid CIDR prefix {:?}: {}", prefix, e))
            })?;
            ranges.push(AddressRange::from_network(network));
        }
        Self::from_ranges(ranges)
    }

    /// Build a set from arbitrary ranges, merging overlaps and neighbours.
    pub fn from_ranges<I>(ranges: I) -> LookupResult<Self>
    where
        I: IntoIterator<Item = AddressRange>,
    {
        let mut spans: Vec<(Family, u128, u128)> = ranges
            .into_iter()
            .map(|r| (Family::of(r.from), to_u128(r.from), to_u128(r.to)))
            .collect();

        if spans.is_empty() {
            return Err(LookupError::Set("no address ranges given".to_string()));
        }

        spans.sort_unstable();

        let mut merged: Vec<(Family, u128, u128)> = Vec::with_capacity(spans.len());
        for (family, start, end) in spans {
            match merged.last_mut() {
                Some((f, _, e)) if *f == family && start <= e.saturating_add(1) => {
                    *e = (*e).max(end);
                }
                _ => merged.push((family, start, end)),
            }
        }

        Ok(Self {
            ranges: merged
                .into_iter()
                .map(|(family, start, end)| AddressRange {
                    from: family.addr(start),
                    to: family.addr(end),
                })
                .collect(),
        })
    }

    /// The merged ranges in ascending order.
    pub fn ranges(&self) -> &[AddressRange] {
        &self.ranges
    }

    /// Check if any range contains the address.
    pub fn contains(&self, ip: IpAddr) -> bool {
        self.ranges.iter().any(|r| r.contains(ip))
    }

    /// Iterate over every address of every range in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = IpAddr> + '_ {
        self.ranges.iter().flat_map(AddressRange::iter)
    }

    /// The minimal CIDR prefixes covering exactly this set.
    pub fn prefixes(&self) -> Vec<IpNetwork> {
        self.ranges.iter().flat_map(AddressRange::prefixes).collect()
    }
}

impl fmt::Display for AddressSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefixes: Vec<String> = self.prefixes().iter().map(|p| p.to_string()).collect();
        write!(f, "{}", prefixes.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    fn assert_canonical(set: &AddressSet) {
        for pair in set.ranges().windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if Family::of(a.to) == Family::of(b.from) {
                // Sorted, disjoint and not adjacent.
                assert!(to_u128(a.to) + 1 < to_u128(b.from), "{} touches {}", a, b);
            } else {
                assert!(a.is_ipv4() && !b.is_ipv4());
            }
        }
    }

    #[test]
    fn test_single_prefix() {
        let set = AddressSet::build(&["10.0.0.0/24"]).unwrap();
        assert_eq!(set.ranges().len(), 1);
        assert_eq!(set.ranges()[0].from(), ip("10.0.0.0"));
        assert_eq!(set.ranges()[0].to(), ip("10.0.0.255"));
    }

    #[test]
    fn test_host_bits_are_masked() {
        let set = AddressSet::build(&["192.168.34.0/16"]).unwrap();
        assert_eq!(set.ranges()[0].from(), ip("192.168.0.0"));
        assert_eq!(set.ranges()[0].to(), ip("192.168.255.255"));
    }

    #[test]
    fn test_adjacent_and_overlapping_merge() {
        let set = AddressSet::build(&[
            "10.0.1.0/24",
            "10.0.0.0/24",
            "10.0.0.128/25",
            "192.168.1.0/24",
            "10.0.2.0/23",
        ])
        .unwrap();

        assert_eq!(set.ranges().len(), 2);
        assert_eq!(set.ranges()[0].to_string(), "10.0.0.0-10.0.3.255");
        assert_eq!(set.ranges()[1].to_string(), "192.168.1.0-192.168.1.255");
        assert_canonical(&set);
    }

    #[test]
    fn test_families_sorted_v4_first() {
        let set = AddressSet::build(&["fd00::/120", "10.0.0.0/30", "10.0.0.8/30"]).unwrap();
        assert_eq!(set.ranges().len(), 3);
        assert!(set.ranges()[0].is_ipv4());
        assert!(set.ranges()[1].is_ipv4());
        assert!(!set.ranges()[2].is_ipv4());
        assert_canonical(&set);
    }

    #[test]
    fn test_rebuild_is_idempotent() {
        let inputs = [
            "10.18.0.0/17",
            "10.18.128.0/18",
            "10.18.200.7/32",
            "172.16.0.0/12",
            "192.168.3.0/24",
            "192.168.2.0/24",
            "fd00::/64",
        ];
        let set = AddressSet::build(&inputs).unwrap();
        assert_canonical(&set);

        let from_ranges = AddressSet::from_ranges(set.ranges().to_vec()).unwrap();
        assert_eq!(from_ranges, set);

        let prefixes: Vec<String> = set.prefixes().iter().map(|p| p.to_string()).collect();
        let from_prefixes = AddressSet::build(&prefixes).unwrap();
        assert_eq!(from_prefixes, set);
    }

    #[test]
    fn test_prefixes_are_minimal() {
        let range = AddressRange::new(ip("10.0.0.1"), ip("10.0.0.6")).unwrap();
        let prefixes: Vec<String> = range.prefixes().iter().map(|p| p.to_string()).collect();
        assert_eq!(
            prefixes,
            vec!["10.0.0.1/32", "10.0.0.2/31", "10.0.0.4/31", "10.0.0.6/32"]
        );

        let set = AddressSet::build(&["192.168.2.0/24", "192.168.3.0/24"]).unwrap();
        assert_eq!(set.to_string(), "192.168.2.0/23");
    }

    #[test]
    fn test_full_ranges_do_not_overflow() {
        let set = AddressSet::build(&["0.0.0.0/0", "::/0"]).unwrap();
        assert_eq!(set.ranges().len(), 2);
        assert_eq!(set.ranges()[0].len(), 1u128 << 32);
        assert_eq!(set.ranges()[1].len(), u128::MAX);
        assert_eq!(set.to_string(), "0.0.0.0/0, ::/0");
    }

    #[test]
    fn test_iteration_is_ascending() {
        let set = AddressSet::build(&["10.0.0.4/31", "10.0.0.0/31"]).unwrap();
        let all: Vec<IpAddr> = set.iter().collect();
        assert_eq!(
            all,
            vec![ip("10.0.0.0"), ip("10.0.0.1"), ip("10.0.0.4"), ip("10.0.0.5")]
        );
    }

    #[test]
    fn test_iteration_ends_at_family_max() {
        let range = AddressRange::new(ip("255.255.255.254"), ip("255.255.255.255")).unwrap();
        assert_eq!(range.iter().count(), 2);
    }

    #[test]
    fn test_contains() {
        let set = AddressSet::build(&["10.18.0.0/17"]).unwrap();
        assert!(set.contains(ip("10.18.6.18")));
        assert!(!set.contains(ip("10.18.128.1")));
        assert!(!set.contains(ip("::1")));
    }

    #[test]
    fn test_malformed_prefix() {
        let err = AddressSet::build(&["10.0.0.0/33"]).unwrap_err();
        assert!(matches!(err, LookupError::Parse(_)));
        let err = AddressSet::build(&["not-a-network"]).unwrap_err();
        assert!(matches!(err, LookupError::Parse(_)));
    }

    #[test]
    fn test_empty_set_is_rejected() {
        let none: [&str; 0] = [];
        assert!(matches!(AddressSet::build(&none), Err(LookupError::Set(_))));
    }

    #[test]
    fn test_invalid_range() {
        assert!(AddressRange::new(ip("10.0.0.9"), ip("10.0.0.1")).is_err());
        assert!(AddressRange::new(ip("10.0.0.1"), ip("::1")).is_err());
    }
}
