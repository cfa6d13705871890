//! Hardware (MAC-48) address type.
//!
//! `HardwareAddress` is an opaque 6-byte identifier. Parsing accepts the
//! colon, hyphen and dotted-quad notations in any letter case, and two
//! addresses compare equal when their normalized forms match.

use crate::error::LookupError;
use pnet::util::MacAddr;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A validated 6-byte hardware address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HardwareAddress([u8; 6]);

impl HardwareAddress {
    /// Create a hardware address from raw octets.
    #[inline]
    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    /// Get the raw octets.
    #[inline]
    pub const fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// Parse a hardware address.
    ///
    /// Supported forms:
    /// - `3e:50:6e:54:28:3d`
    /// - `3E-50-6E-54-28-3D`
    /// - `3e50.6e54.283d`
    pub fn parse(s: &str) -> Result<Self, LookupError> {
        let s = s.trim();
        let invalid = || LookupError::Parse(format!("malformed or invalid MAC {:?}", s));

        if !s.is_ascii() {
            return Err(invalid());
        }

        let hex: String = if s.len() == 17 {
            let sep = s.as_bytes()[2];
            if sep != b':' && sep != b'-' {
                return Err(invalid());
            }
            let groups: Vec<&str> = s.split(sep as char).collect();
            if groups.len() != 6 || groups.iter().any(|g| g.len() != 2) {
                return Err(invalid());
            }
            groups.concat()
        } else if s.len() == 14 {
            let groups: Vec<&str> = s.split('.').collect();
            if groups.len() != 3 || groups.iter().any(|g| g.len() != 4) {
                return Err(invalid());
            }
            groups.concat()
        } else {
            return Err(invalid());
        };

        // from_str_radix also takes a leading sign.
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        let mut octets = [0u8; 6];
        for (i, octet) in octets.iter_mut().enumerate() {
            *octet = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).map_err(|_| invalid())?;
        }

        Ok(Self(octets))
    }

    /// Compare against a textual address in any supported notation.
    ///
    /// Returns `false` when `other` does not parse.
    pub fn matches_str(&self, other: &str) -> bool {
        Self::parse(other).map_or(false, |mac| mac == *self)
    }
}

impl fmt::Display for HardwareAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let o = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            o[0], o[1], o[2], o[3], o[4], o[5]
        )
    }
}

impl FromStr for HardwareAddress {
    type Err = LookupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<MacAddr> for HardwareAddress {
    fn from(mac: MacAddr) -> Self {
        Self([mac.0, mac.1, mac.2, mac.3, mac.4, mac.5])
    }
}

impl From<HardwareAddress> for MacAddr {
    fn from(mac: HardwareAddress) -> Self {
        let o = mac.0;
        MacAddr::new(o[0], o[1], o[2], o[3], o[4], o[5])
    }
}

impl Serialize for HardwareAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for HardwareAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_colon() {
        let mac = HardwareAddress::parse("3e:50:6e:54:28:3d").unwrap();
        assert_eq!(mac.octets(), [0x3e, 0x50, 0x6e, 0x54, 0x28, 0x3d]);
    }

    #[test]
    fn test_parse_variants_are_equal() {
        let a: HardwareAddress = "3E:50:6E:54:28:3D".parse().unwrap();
        let b: HardwareAddress = "3e-50-6e-54-28-3d".parse().unwrap();
        let c: HardwareAddress = "3e50.6e54.283d".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(a.to_string(), "3e:50:6e:54:28:3d");
    }

    #[test]
    fn test_matches_str_ignores_case() {
        let mac: HardwareAddress = "0b:de:ad:be:ef:0b".parse().unwrap();
        assert!(mac.matches_str("0B:DE:AD:BE:EF:0B"));
        assert!(!mac.matches_str("0b:de:ad:be:ef:0c"));
        assert!(!mac.matches_str("00:00:00:00:00:00:00"));
    }

    #[test]
    fn test_parse_invalid() {
        assert!(HardwareAddress::parse("xx:xx:xx:xx:xx:xx").is_err());
        assert!(HardwareAddress::parse("3e:50:6e:54:28").is_err());
        assert!(HardwareAddress::parse("3e:50-6e:54:28:3d").is_err());
        assert!(HardwareAddress::parse("").is_err());
    }

    #[test]
    fn test_parse_rejects_signs() {
        assert!(HardwareAddress::parse("+3:50:6e:54:28:3d").is_err());
        assert!(HardwareAddress::parse("3e:50:6e:54:28:+d").is_err());
        assert!(HardwareAddress::parse("3e-50-6e-54-28-+d").is_err());
        assert!(HardwareAddress::parse("+e50.6e54.283d").is_err());
        assert!(!HardwareAddress::new([0x03, 0x50, 0x6e, 0x54, 0x28, 0x3d])
            .matches_str("+3:50:6e:54:28:3d"));
    }

    #[test]
    fn test_pnet_conversion() {
        let mac: HardwareAddress = "00:11:22:33:44:55".parse().unwrap();
        let pnet_mac: MacAddr = mac.into();
        assert_eq!(HardwareAddress::from(pnet_mac), mac);
    }
}
