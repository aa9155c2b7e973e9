//! Ports and interfaces.
//!
//! A [`Port`] is an addressable attachment point of a node. Routers expose
//! plain ports. Hosts expose [`Interface`]s, which additionally know the
//! address of their default gateway.

use super::Endpoint;
use crate::ip::{Ipv4Address, Ipv4Mask, Ipv4Net};
use std::ops::Deref;

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("cannot set a network on port {0} without an IP address")]
    NetWithoutIp(usize),
    #[error("network {net} does not contain the port address {ip}")]
    NetMismatch { ip: Ipv4Address, net: Ipv4Net },
    #[error("gateway {got} does not match the expected gateway {expected:?}")]
    GatewayMismatch {
        got: Ipv4Address,
        expected: Option<Ipv4Address>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Port {
    index: usize,
    ip: Option<Ipv4Address>,
    net: Option<Ipv4Net>,
    endpoint: Option<Endpoint>,
}

impl Port {
    /// Creates a port. Supplying a mask without an address is a
    /// configuration error.
    pub fn new(
        index: usize,
        ip: Option<Ipv4Address>,
        mask: Option<Ipv4Mask>,
    ) -> Result<Self, AddressError> {
        let mut port = Self {
            index,
            ip,
            net: None,
            endpoint: None,
        };
        if let Some(mask) = mask {
            port.set_mask(mask)?;
        }
        Ok(port)
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn ip(&self) -> Option<Ipv4Address> {
        self.ip
    }

    pub fn net(&self) -> Option<Ipv4Net> {
        self.net
    }

    /// The endpoint at the other end of the link, if connected.
    pub fn endpoint(&self) -> Option<&Endpoint> {
        self.endpoint.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.endpoint.is_some()
    }

    /// Changes the address. An existing network is moved so that it contains
    /// the new address, keeping its prefix length.
    pub fn set_ip(&mut self, ip: Ipv4Address) {
        self.ip = Some(ip);
        self.net = self.net.map(|net| net.rebased(ip));
    }

    pub fn set_mask(&mut self, mask: Ipv4Mask) -> Result<(), AddressError> {
        let ip = self.ip.ok_or(AddressError::NetWithoutIp(self.index))?;
        self.net = Some(Ipv4Net::new(ip, mask));
        Ok(())
    }

    pub fn set_net(&mut self, net: Ipv4Net) -> Result<(), AddressError> {
        let ip = self.ip.ok_or(AddressError::NetWithoutIp(self.index))?;
        if !net.contains(ip) {
            return Err(AddressError::NetMismatch { ip, net });
        }
        self.net = Some(net);
        Ok(())
    }

    pub fn connect_endpoint(&mut self, endpoint: Endpoint) {
        self.endpoint = Some(endpoint);
    }

    /// Whether `ip` belongs to the network of this port.
    pub fn routes(&self, ip: Ipv4Address) -> bool {
        self.net.map_or(false, |net| net.contains(ip))
    }

    /// The endpoint describing this port itself.
    pub fn local_endpoint(&self, node: &str) -> Endpoint {
        Endpoint::new(node, self.index, self.ip)
    }
}

/// A host port that also tracks its default gateway.
///
/// The gateway is the first host address of the interface network and is
/// recomputed whenever the network changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interface {
    port: Port,
    gateway_ip: Option<Ipv4Address>,
}

impl Interface {
    pub fn new(
        index: usize,
        ip: Option<Ipv4Address>,
        mask: Option<Ipv4Mask>,
    ) -> Result<Self, AddressError> {
        let port = Port::new(index, ip, mask)?;
        let gateway_ip = port.net().map(|net| net.first_host());
        Ok(Self { port, gateway_ip })
    }

    pub fn gateway_ip(&self) -> Option<Ipv4Address> {
        self.gateway_ip
    }

    pub fn set_ip(&mut self, ip: Ipv4Address) {
        self.port.set_ip(ip);
        self.refresh_gateway();
    }

    pub fn set_mask(&mut self, mask: Ipv4Mask) -> Result<(), AddressError> {
        self.port.set_mask(mask)?;
        self.refresh_gateway();
        Ok(())
    }

    pub fn set_net(&mut self, net: Ipv4Net) -> Result<(), AddressError> {
        self.port.set_net(net)?;
        self.refresh_gateway();
        Ok(())
    }

    pub fn connect_endpoint(&mut self, endpoint: Endpoint) {
        self.port.connect_endpoint(endpoint);
    }

    /// Connects the interface to its gateway. Fails when `ip` is not the
    /// gateway address derived from the interface network.
    pub fn connect_gateway(
        &mut self,
        ip: Ipv4Address,
        endpoint: Endpoint,
    ) -> Result<(), AddressError> {
        if self.gateway_ip != Some(ip) {
            return Err(AddressError::GatewayMismatch {
                got: ip,
                expected: self.gateway_ip,
            });
        }
        self.port.connect_endpoint(endpoint);
        Ok(())
    }

    fn refresh_gateway(&mut self) {
        self.gateway_ip = self.port.net().map(|net| net.first_host());
    }
}

impl Deref for Interface {
    type Target = Port;

    fn deref(&self) -> &Port {
        &self.port
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> Ipv4Address {
        s.parse().unwrap()
    }

    #[test]
    fn mask_without_ip_is_rejected() {
        let result = Port::new(0, None, Some(Ipv4Mask::from_bitcount(24)));
        assert_eq!(result, Err(AddressError::NetWithoutIp(0)));
    }

    #[test]
    fn changing_ip_moves_network() {
        let mut port = Port::new(1, Some(ip("10.0.0.5")), Some(Ipv4Mask::from_bitcount(24))).unwrap();
        port.set_ip(ip("172.16.3.7"));
        assert_eq!(port.net(), Some(Ipv4Net::from_cidr("172.16.3.0/24").unwrap()));
        assert!(port.routes(ip("172.16.3.200")));
        assert!(!port.routes(ip("10.0.0.6")));
    }

    #[test]
    fn gateway_follows_network() {
        let mut iface =
            Interface::new(0, Some(ip("192.168.1.20")), Some(Ipv4Mask::from_bitcount(24))).unwrap();
        assert_eq!(iface.gateway_ip(), Some(ip("192.168.1.1")));
        iface.set_net(Ipv4Net::from_cidr("192.168.0.0/16").unwrap()).unwrap();
        assert_eq!(iface.gateway_ip(), Some(ip("192.168.0.1")));
        iface.set_ip(ip("10.10.10.10"));
        assert_eq!(iface.gateway_ip(), Some(ip("10.10.0.1")));
    }

    #[test]
    fn gateway_mismatch_fails() {
        let mut iface =
            Interface::new(0, Some(ip("192.168.1.20")), Some(Ipv4Mask::from_bitcount(24))).unwrap();
        let router = Endpoint::new("router", 0, Some(ip("192.168.1.254")));
        let err = iface.connect_gateway(ip("192.168.1.254"), router.clone());
        assert!(matches!(err, Err(AddressError::GatewayMismatch { .. })));
        assert!(!iface.is_connected());

        let router = Endpoint::new("router", 0, Some(ip("192.168.1.1")));
        iface.connect_gateway(ip("192.168.1.1"), router.clone()).unwrap();
        assert_eq!(iface.endpoint(), Some(&router));
    }

    #[test]
    fn net_must_contain_ip() {
        let mut port = Port::new(2, Some(ip("10.0.0.1")), None).unwrap();
        let err = port.set_net(Ipv4Net::from_cidr("10.1.0.0/16").unwrap());
        assert!(matches!(err, Err(AddressError::NetMismatch { .. })));
    }
}
