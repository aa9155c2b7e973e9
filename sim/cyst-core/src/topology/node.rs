use super::{AddressError, Endpoint, Hop, Interface, Router};
use crate::{
    ip::{Ipv4Address, Ipv4Mask},
    service::{Service, ServiceKind},
};
use rustc_hash::FxHashMap;

/// How a node treats traffic that is not addressed to it.
#[derive(Debug)]
pub enum Forwarding {
    /// Plain hosts only relay traffic that exits a session on them.
    None,
    Router(Router),
}

/// A machine in the simulated network.
///
/// Hosts are addressed through their interfaces. Routers are addressed
/// through the ports of their [`Router`]; for them a port index is what an
/// interface index is for a host.
#[derive(Debug)]
pub struct Node {
    id: String,
    interfaces: Vec<Interface>,
    services: FxHashMap<String, Service>,
    shell: Option<String>,
    forwarding: Forwarding,
}

impl Node {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            interfaces: Vec::new(),
            services: FxHashMap::default(),
            shell: None,
            forwarding: Forwarding::None,
        }
    }

    pub fn router(id: impl Into<String>) -> Self {
        Self {
            forwarding: Forwarding::Router(Router::new()),
            ..Self::new(id)
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> &'static str {
        match self.forwarding {
            Forwarding::None => "Node",
            Forwarding::Router(_) => "Router",
        }
    }

    pub fn is_router(&self) -> bool {
        matches!(self.forwarding, Forwarding::Router(_))
    }

    pub fn as_router(&self) -> Option<&Router> {
        match &self.forwarding {
            Forwarding::Router(router) => Some(router),
            Forwarding::None => None,
        }
    }

    pub fn as_router_mut(&mut self) -> Option<&mut Router> {
        match &mut self.forwarding {
            Forwarding::Router(router) => Some(router),
            Forwarding::None => None,
        }
    }

    /// Adds an interface (or a router port) and returns its index. Nodes
    /// already in a network get new interfaces through
    /// `Network::add_interface`, which keeps the address index current.
    pub(crate) fn add_interface(
        &mut self,
        ip: Option<Ipv4Address>,
        mask: Option<Ipv4Mask>,
    ) -> Result<usize, AddressError> {
        match &mut self.forwarding {
            Forwarding::Router(router) => router.add_port(ip, mask),
            Forwarding::None => {
                let index = self.interfaces.len();
                self.interfaces.push(Interface::new(index, ip, mask)?);
                Ok(index)
            }
        }
    }

    /// Adds an addressed interface (or router port) while building the node.
    pub fn with_interface(
        mut self,
        ip: Ipv4Address,
        prefix_len: u32,
    ) -> Result<Self, AddressError> {
        self.add_interface(Some(ip), Some(Ipv4Mask::from_bitcount(prefix_len)))?;
        Ok(self)
    }

    pub fn interfaces(&self) -> &[Interface] {
        &self.interfaces
    }

    pub(crate) fn interface_mut(&mut self, index: usize) -> Option<&mut Interface> {
        self.interfaces.get_mut(index)
    }

    pub fn port_count(&self) -> usize {
        match &self.forwarding {
            Forwarding::Router(router) => router.ports().len(),
            Forwarding::None => self.interfaces.len(),
        }
    }

    pub fn port_ip(&self, port: usize) -> Option<Ipv4Address> {
        match &self.forwarding {
            Forwarding::Router(router) => router.port(port).and_then(|p| p.ip()),
            Forwarding::None => self.interfaces.get(port).and_then(|i| i.ip()),
        }
    }

    /// The far end of the link on `port`.
    pub fn peer(&self, port: usize) -> Option<&Endpoint> {
        match &self.forwarding {
            Forwarding::Router(router) => router.port(port).and_then(|p| p.endpoint()),
            Forwarding::None => self.interfaces.get(port).and_then(|i| i.endpoint()),
        }
    }

    /// The endpoint of `port` on this node.
    pub fn endpoint(&self, port: usize) -> Endpoint {
        Endpoint::new(self.id.clone(), port, self.port_ip(port))
    }

    pub fn ips(&self) -> Vec<Ipv4Address> {
        (0..self.port_count())
            .filter_map(|port| self.port_ip(port))
            .collect()
    }

    pub fn has_ip(&self, ip: Ipv4Address) -> bool {
        (0..self.port_count()).any(|port| self.port_ip(port) == Some(ip))
    }

    /// The port carrying `ip`, if any.
    pub fn port_with_ip(&self, ip: Ipv4Address) -> Option<usize> {
        (0..self.port_count()).find(|&port| self.port_ip(port) == Some(ip))
    }

    /// The first hop of a message this node sends towards `dst`.
    ///
    /// Hosts prefer an interface on the destination network and otherwise
    /// fall back to the first interface connected to a gateway.
    pub fn route_to(&self, dst: Ipv4Address) -> Option<Hop> {
        match &self.forwarding {
            Forwarding::Router(router) => {
                let port = router.port(router.egress_port(dst)?)?;
                let peer = port.endpoint()?.clone();
                Some(Hop::new(port.local_endpoint(&self.id), peer))
            }
            Forwarding::None => {
                let interface = self
                    .interfaces
                    .iter()
                    .find(|i| i.is_connected() && i.routes(dst))
                    .or_else(|| {
                        self.interfaces
                            .iter()
                            .find(|i| i.is_connected() && i.gateway_ip().is_some())
                    })?;
                let peer = interface.endpoint()?.clone();
                Some(Hop::new(interface.local_endpoint(&self.id), peer))
            }
        }
    }

    pub fn add_service(&mut self, service: Service) {
        self.services.insert(service.name().to_string(), service);
    }

    pub fn with_service(mut self, service: Service) -> Self {
        self.add_service(service);
        self
    }

    pub fn service(&self, name: &str) -> Option<&Service> {
        self.services.get(name)
    }

    pub fn services(&self) -> impl Iterator<Item = &Service> {
        self.services.values()
    }

    pub fn has_active_service(&self, name: &str) -> bool {
        matches!(
            self.services.get(name).map(Service::kind),
            Some(ServiceKind::Active)
        )
    }

    pub fn shell(&self) -> Option<&str> {
        self.shell.as_deref()
    }

    /// Names the service acting as the node shell.
    pub fn set_shell(&mut self, service: impl Into<String>) {
        self.shell = Some(service.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> Ipv4Address {
        s.parse().unwrap()
    }

    #[test]
    fn router_ports_are_interfaces() {
        let mut router = Node::router("r");
        assert_eq!(router.kind(), "Router");
        router
            .add_interface(Some(ip("10.0.0.1")), Some(Ipv4Mask::from_bitcount(24)))
            .unwrap();
        router
            .add_interface(Some(ip("10.0.1.1")), Some(Ipv4Mask::from_bitcount(24)))
            .unwrap();
        assert_eq!(router.port_count(), 2);
        assert!(router.interfaces().is_empty());
        assert_eq!(router.ips(), vec![ip("10.0.0.1"), ip("10.0.1.1")]);
        assert_eq!(router.port_with_ip(ip("10.0.1.1")), Some(1));
        assert_eq!(router.endpoint(1), Endpoint::new("r", 1, Some(ip("10.0.1.1"))));
    }

    #[test]
    fn unconnected_host_has_no_route() {
        let host = Node::new("h").with_interface(ip("10.0.0.2"), 24).unwrap();
        assert_eq!(host.kind(), "Node");
        assert!(host.has_ip(ip("10.0.0.2")));
        assert_eq!(host.route_to(ip("10.0.0.3")), None);
    }
}
