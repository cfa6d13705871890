//! OS neighbor (ARP) table parsing.
//!
//! Linux exposes the table at `/proc/net/arp`:
//!
//! ```text
//! IP address       HW type     Flags       HW address            Mask     Device
//! 10.18.6.18       0x1         0x2         3e:50:6e:54:28:3d     *        eth0
//! ```

use crate::error::{LookupError, LookupResult};
use crate::types::HardwareAddress;
use std::net::IpAddr;

/// Default location of the kernel neighbor table.
pub const PROC_NET_ARP: &str = "/proc/net/arp";

const IP_COLUMN: usize = 0;
const HW_COLUMN: usize = 3;

/// Find the address the table currently maps `target` to.
///
/// The header line is skipped. A line with too few columns, or a matching
/// line whose address does not parse, is reported as
/// [`LookupError::CacheParse`].
pub fn find(contents: &str, target: HardwareAddress) -> LookupResult<Option<IpAddr>> {
    for line in contents.lines().skip(1) {
        if line.trim().is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() <= HW_COLUMN {
            return Err(LookupError::CacheParse {
                line: line.to_string(),
                reason: format!("expected at least {} columns", HW_COLUMN + 1),
            });
        }

        if !target.matches_str(fields[HW_COLUMN]) {
            continue;
        }

        let ip = fields[IP_COLUMN]
            .parse::<IpAddr>()
            .map_err(|e| LookupError::CacheParse {
                line: line.to_string(),
                reason: e.to_string(),
            })?;

        return Ok(Some(ip));
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str =
        "IP address       HW type     Flags       HW address            Mask     Device\n";

    fn mac() -> HardwareAddress {
        "3e:50:6e:54:28:3d".parse().unwrap()
    }

    #[test]
    fn test_finds_matching_entry() {
        let table = format!(
            "{HEADER}10.18.0.1        0x1         0x2         0b:de:ad:be:ef:0b     *        eth0\n\
             10.18.6.18       0x1         0x2         3E:50:6E:54:28:3D     *        eth0\n"
        );
        assert_eq!(find(&table, mac()).unwrap(), Some("10.18.6.18".parse().unwrap()));
    }

    #[test]
    fn test_absent_entry() {
        let table = format!(
            "{HEADER}10.18.0.1        0x1         0x2         0b:de:ad:be:ef:0b     *        eth0\n"
        );
        assert_eq!(find(&table, mac()).unwrap(), None);
        assert_eq!(find(HEADER, mac()).unwrap(), None);
        assert_eq!(find("", mac()).unwrap(), None);
    }

    #[test]
    fn test_short_line_is_malformed() {
        let table = format!("{HEADER}10.18.0.1 0x1\n");
        assert!(matches!(
            find(&table, mac()),
            Err(LookupError::CacheParse { .. })
        ));
    }

    #[test]
    fn test_matching_line_with_bad_ip_is_malformed() {
        let table = format!(
            "{HEADER}10.18.6.999      0x1         0x2         3e:50:6e:54:28:3d     *        eth0\n"
        );
        let err = find(&table, mac()).unwrap_err();
        match err {
            LookupError::CacheParse { line, .. } => assert!(line.starts_with("10.18.6.999")),
            other => panic!("unexpected error: {other}"),
        }
    }
}
