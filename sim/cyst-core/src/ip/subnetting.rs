//! CIDR subnetting.
//!
//! Only classless networks are supported. A network is always stored by its
//! network ID, so two [`Ipv4Net`]s built from different hosts of the same
//! subnet compare equal.

use super::Ipv4Address;
use std::{fmt, str::FromStr};

/// An IPv4 subnet mask. (A thin wrapper around a u32.)
#[derive(Clone, Copy, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct Ipv4Mask(u32);

impl Ipv4Mask {
    /// Returns a mask of `size` leading 1s. Values above 32 are clamped.
    ///
    /// # Examples
    ///
    /// ```
    /// # use cyst_core::ip::Ipv4Mask;
    /// let mask = Ipv4Mask::from_bitcount(16);
    /// assert_eq!(mask.to_u32(), 0xFF_FF_00_00);
    /// ```
    pub const fn from_bitcount(size: u32) -> Ipv4Mask {
        if size == 0 {
            Ipv4Mask(0)
        } else if size >= 32 {
            Ipv4Mask(u32::MAX)
        } else {
            Ipv4Mask(u32::MAX << (32 - size))
        }
    }

    /// The number of 1s in this mask, i.e. the prefix length.
    pub const fn count_ones(&self) -> u32 {
        self.0.count_ones()
    }

    pub const fn to_u32(self) -> u32 {
        self.0
    }

    /// Number of addresses in a network using this mask, including the
    /// network ID and the broadcast address.
    pub const fn ips_in_net(&self) -> u64 {
        (!self.0) as u64 + 1
    }
}

impl fmt::Debug for Ipv4Mask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Ipv4Mask")
            .field(&Ipv4Address::from(self.0))
            .finish()
    }
}

impl TryFrom<u32> for Ipv4Mask {
    type Error = u32;

    /// Fails with the number itself when it has 0s between its 1s.
    fn try_from(mask: u32) -> Result<Ipv4Mask, u32> {
        let result = Ipv4Mask::from_bitcount(mask.count_ones());
        if result.0 == mask {
            Ok(result)
        } else {
            Err(mask)
        }
    }
}

impl TryFrom<Ipv4Address> for Ipv4Mask {
    type Error = Ipv4Address;

    fn try_from(mask: Ipv4Address) -> Result<Ipv4Mask, Ipv4Address> {
        Ipv4Mask::try_from(mask.to_u32()).or(Err(mask))
    }
}

/// A network identified by its network ID and mask.
#[derive(Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ipv4Net {
    /// Always a network ID, never a host address.
    network_id: Ipv4Address,
    mask: Ipv4Mask,
}

impl Ipv4Net {
    /// The network `0.0.0.0/0`, which contains every address.
    pub const ANY: Ipv4Net = Ipv4Net {
        network_id: Ipv4Address::CURRENT_NETWORK,
        mask: Ipv4Mask::from_bitcount(0),
    };

    pub fn new(ip: Ipv4Address, mask: Ipv4Mask) -> Self {
        Self {
            network_id: Ipv4Address::from(ip.to_u32() & mask.to_u32()),
            mask,
        }
    }

    /// Creates a network from anything convertible into an address and a
    /// prefix length.
    ///
    /// ```
    /// # use cyst_core::ip::*;
    /// let net1 = Ipv4Net::new_short([12, 13, 12, 0], 28);
    /// let net2 = Ipv4Net::new(Ipv4Address::new([12, 13, 12, 9]), Ipv4Mask::from_bitcount(28));
    /// assert_eq!(net1, net2);
    /// ```
    pub fn new_short(ip: impl Into<Ipv4Address>, prefix_len: u32) -> Ipv4Net {
        Ipv4Net::new(ip.into(), Ipv4Mask::from_bitcount(prefix_len))
    }

    /// Parses a string in CIDR notation, e.g. `10.0.0.0/24`.
    pub fn from_cidr(cidr: &str) -> Result<Ipv4Net, CidrParseError> {
        cidr_to_ip(cidr).map(|(ip, mask)| Ipv4Net::new(ip, mask))
    }

    pub fn id(&self) -> Ipv4Address {
        self.network_id
    }

    pub fn mask(&self) -> Ipv4Mask {
        self.mask
    }

    pub fn prefix_len(&self) -> u32 {
        self.mask.count_ones()
    }

    /// The last address of the network.
    pub fn broadcast(&self) -> Ipv4Address {
        Ipv4Address::from(self.network_id.to_u32() | !self.mask.to_u32())
    }

    /// The first usable host address. Point-to-point (/31) and single host
    /// (/32) networks have no reserved network ID, so their first host is
    /// the ID itself.
    ///
    /// ```
    /// # use cyst_core::ip::*;
    /// let net = Ipv4Net::from_cidr("192.168.0.77/24").unwrap();
    /// assert_eq!(net.first_host(), Ipv4Address::new([192, 168, 0, 1]));
    /// ```
    pub fn first_host(&self) -> Ipv4Address {
        if self.prefix_len() >= 31 {
            self.network_id
        } else {
            Ipv4Address::from(self.network_id.to_u32() + 1)
        }
    }

    /// Returns a network with the same prefix length containing `ip`.
    pub fn rebased(&self, ip: Ipv4Address) -> Ipv4Net {
        Ipv4Net::new(ip, self.mask)
    }

    /// Returns `true` if `address` lies within this network.
    pub fn contains(&self, address: Ipv4Address) -> bool {
        self.network_id.to_u32() == address.to_u32() & self.mask.to_u32()
    }

    /// Returns `true` if the two networks share any address.
    pub fn overlaps(&self, other: Self) -> bool {
        self.id() <= other.broadcast() && self.broadcast() >= other.id()
    }
}

impl fmt::Debug for Ipv4Net {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ipv4Net {{{self}}}")
    }
}

impl fmt::Display for Ipv4Net {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network_id, self.prefix_len())
    }
}

impl FromStr for Ipv4Net {
    type Err = CidrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ipv4Net::from_cidr(s)
    }
}

#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
pub enum CidrParseError {
    #[error("'{0}' is not of form address/prefix")]
    Format(String),
    #[error("invalid address in '{0}'")]
    Address(String),
    #[error("invalid prefix length in '{0}'")]
    Prefix(String),
}

/// Splits a CIDR string into an address and a mask.
///
/// ```
/// # use cyst_core::ip::*;
/// let (ip, mask) = cidr_to_ip("123.45.67.8/14").unwrap();
/// assert_eq!(ip, Ipv4Address::new([123, 45, 67, 8]));
/// assert_eq!(mask, Ipv4Mask::from_bitcount(14));
/// assert!(cidr_to_ip("5.6.7.8").is_err());
/// ```
pub fn cidr_to_ip(cidr: &str) -> Result<(Ipv4Address, Ipv4Mask), CidrParseError> {
    let (ip_str, prefix_str) = cidr
        .split_once('/')
        .ok_or_else(|| CidrParseError::Format(cidr.to_string()))?;
    let ip: Ipv4Address = ip_str
        .parse()
        .map_err(|_| CidrParseError::Address(cidr.to_string()))?;
    let prefix: u32 = prefix_str
        .trim()
        .parse()
        .map_err(|_| CidrParseError::Prefix(cidr.to_string()))?;
    if prefix > 32 {
        return Err(CidrParseError::Prefix(cidr.to_string()));
    }
    Ok((ip, Ipv4Mask::from_bitcount(prefix)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_from_bitcount() {
        assert_eq!(Ipv4Mask::from_bitcount(0).to_u32(), 0);
        assert_eq!(Ipv4Mask::from_bitcount(8).to_u32(), 0xFF_00_00_00);
        assert_eq!(Ipv4Mask::from_bitcount(32).to_u32(), u32::MAX);
        assert_eq!(Ipv4Mask::from_bitcount(40).to_u32(), u32::MAX);
    }

    #[test]
    fn mask_rejects_holes() {
        assert!(Ipv4Mask::try_from(0xFF_00_FF_00u32).is_err());
        assert_eq!(
            Ipv4Mask::try_from(0xFF_FF_FF_00u32),
            Ok(Ipv4Mask::from_bitcount(24))
        );
    }

    #[test]
    fn net_normalizes_host_bits() {
        let net = Ipv4Net::from_cidr("10.1.2.3/16").unwrap();
        assert_eq!(net.id(), Ipv4Address::new([10, 1, 0, 0]));
        assert_eq!(net.broadcast(), Ipv4Address::new([10, 1, 255, 255]));
        assert_eq!(net.to_string(), "10.1.0.0/16");
    }

    #[test]
    fn containment_and_overlap() {
        let wide = Ipv4Net::from_cidr("192.168.0.0/16").unwrap();
        let narrow = Ipv4Net::from_cidr("192.168.4.0/24").unwrap();
        let other = Ipv4Net::from_cidr("10.0.0.0/8").unwrap();
        assert!(wide.contains(Ipv4Address::new([192, 168, 4, 20])));
        assert!(!narrow.contains(Ipv4Address::new([192, 168, 5, 20])));
        assert!(wide.overlaps(narrow));
        assert!(!wide.overlaps(other));
        assert!(Ipv4Net::ANY.contains(Ipv4Address::new([8, 8, 8, 8])));
    }

    #[test]
    fn first_host_of_small_nets() {
        let p2p = Ipv4Net::from_cidr("10.0.0.4/31").unwrap();
        assert_eq!(p2p.first_host(), Ipv4Address::new([10, 0, 0, 4]));
        let lan = Ipv4Net::from_cidr("10.0.0.0/30").unwrap();
        assert_eq!(lan.first_host(), Ipv4Address::new([10, 0, 0, 1]));
    }

    #[test]
    fn rebased_keeps_prefix() {
        let net = Ipv4Net::from_cidr("10.0.0.0/24").unwrap();
        let moved = net.rebased(Ipv4Address::new([172, 16, 9, 9]));
        assert_eq!(moved, Ipv4Net::from_cidr("172.16.9.0/24").unwrap());
    }

    #[test]
    fn bad_cidr_strings() {
        assert!(matches!(cidr_to_ip("1.2.3.4"), Err(CidrParseError::Format(_))));
        assert!(matches!(cidr_to_ip("1.2.3/4"), Err(CidrParseError::Address(_))));
        assert!(matches!(cidr_to_ip("1.2.3.4/33"), Err(CidrParseError::Prefix(_))));
    }
}
