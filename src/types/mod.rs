//! Core type definitions using newtype patterns for type safety.
//!
//! These types make malformed hardware addresses and overlapping address
//! ranges unrepresentable once parsing has succeeded.

mod address;
mod address_set;
mod mac;

pub use address::{is_valid_host, parse_duration, Address};
pub use address_set::{AddressRange, AddressRangeIter, AddressSet};
pub use mac::HardwareAddress;
