//! IPv4 addresses and CIDR subnetting.
//!
//! Every port in a simulated topology carries an [`Ipv4Address`] and, once
//! configured, an [`Ipv4Net`]. Routers match destinations against networks,
//! firewall rules match source and destination networks, and interfaces
//! derive their default gateway from their network.

mod address;
pub use address::{AddressParseError, Ipv4Address};

pub mod subnetting;
pub use subnetting::{cidr_to_ip, CidrParseError, Ipv4Mask, Ipv4Net};
