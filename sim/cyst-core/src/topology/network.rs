//! The node arena and the links between nodes.

use super::{
    AddressError, Connection, ConnectionId, Endpoint, FirewallChainType, FirewallRule, Hop, Link,
    Node, Route,
};
use crate::ip::{Ipv4Address, Ipv4Mask};
use rustc_hash::FxHashMap;

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum NetworkError {
    #[error("Node {0} already exists")]
    DuplicateNode(String),
    #[error("Unknown node {0}")]
    UnknownNode(String),
    #[error("Node {node} has no port {port}")]
    UnknownPort { node: String, port: usize },
    #[error("Port {port} of node {node} is already connected")]
    PortInUse { node: String, port: usize },
    #[error("Node {0} cannot be connected to itself")]
    SelfConnection(String),
    #[error("Address {ip} is used by both {first} and {second}")]
    DuplicateIp {
        ip: Ipv4Address,
        first: String,
        second: String,
    },
    #[error("Node {0} is not a router")]
    NotARouter(String),
    #[error("Port {port} of router {node} has no address")]
    MissingAddress { node: String, port: usize },
    #[error(transparent)]
    Address(#[from] AddressError),
}

/// All nodes of a simulation and the connections between them.
#[derive(Debug, Default)]
pub struct Network {
    nodes: Vec<Node>,
    index: FxHashMap<String, usize>,
    ips: FxHashMap<Ipv4Address, usize>,
    connections: Vec<Connection>,
    ports: FxHashMap<(String, usize), ConnectionId>,
}

impl Network {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node and registers its addresses.
    pub fn add_node(&mut self, node: Node) -> Result<(), NetworkError> {
        if self.index.contains_key(node.id()) {
            return Err(NetworkError::DuplicateNode(node.id().to_string()));
        }
        for ip in node.ips() {
            if let Some(&other) = self.ips.get(&ip) {
                return Err(NetworkError::DuplicateIp {
                    ip,
                    first: self.nodes[other].id().to_string(),
                    second: node.id().to_string(),
                });
            }
        }
        let position = self.nodes.len();
        for ip in node.ips() {
            self.ips.insert(ip, position);
        }
        self.index.insert(node.id().to_string(), position);
        self.nodes.push(node);
        Ok(())
    }

    /// Adds an addressed interface to a node already in the network.
    pub fn add_interface(
        &mut self,
        id: &str,
        ip: Ipv4Address,
        prefix_len: u32,
    ) -> Result<usize, NetworkError> {
        let position = *self
            .index
            .get(id)
            .ok_or_else(|| NetworkError::UnknownNode(id.to_string()))?;
        match self.ips.get(&ip) {
            Some(&other) if other != position => {
                return Err(NetworkError::DuplicateIp {
                    ip,
                    first: self.nodes[other].id().to_string(),
                    second: id.to_string(),
                });
            }
            _ => {}
        }
        let mask = Ipv4Mask::from_bitcount(prefix_len);
        let port = self.nodes[position].add_interface(Some(ip), Some(mask))?;
        self.ips.insert(ip, position);
        Ok(port)
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.index.get(id).map(|&i| &mut self.nodes[i])
    }

    /// Nodes in the order they were added.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    pub fn node_by_ip(&self, ip: Ipv4Address) -> Option<&Node> {
        self.ips.get(&ip).map(|&i| &self.nodes[i])
    }

    fn known(&self, id: &str) -> Result<&Node, NetworkError> {
        self.node(id)
            .ok_or_else(|| NetworkError::UnknownNode(id.to_string()))
    }

    fn router_mut(&mut self, id: &str) -> Result<&mut super::Router, NetworkError> {
        self.node_mut(id)
            .ok_or_else(|| NetworkError::UnknownNode(id.to_string()))?
            .as_router_mut()
            .ok_or_else(|| NetworkError::NotARouter(id.to_string()))
    }

    /// The endpoint of a free port.
    fn free_port(&self, id: &str, port: usize) -> Result<Endpoint, NetworkError> {
        let node = self.known(id)?;
        if port >= node.port_count() {
            return Err(NetworkError::UnknownPort {
                node: id.to_string(),
                port,
            });
        }
        if node.peer(port).is_some() {
            return Err(NetworkError::PortInUse {
                node: id.to_string(),
                port,
            });
        }
        Ok(node.endpoint(port))
    }

    /// Links port `a_port` of `a` with port `b_port` of `b`.
    ///
    /// A host linked to a router must see the router port address as its
    /// gateway. The addresses of linked nodes become local to a router.
    pub fn add_connection(
        &mut self,
        a: &str,
        a_port: usize,
        b: &str,
        b_port: usize,
        link: Link,
    ) -> Result<ConnectionId, NetworkError> {
        if a == b {
            return Err(NetworkError::SelfConnection(a.to_string()));
        }
        let a_end = self.free_port(a, a_port)?;
        let b_end = self.free_port(b, b_port)?;

        // The host side is the only one that can fail, so it goes first.
        let (first, second) = if self.known(a)?.is_router() {
            ((b_end.clone(), a_end.clone()), (a_end.clone(), b_end.clone()))
        } else {
            ((a_end.clone(), b_end.clone()), (b_end.clone(), a_end.clone()))
        };
        self.attach(&first.0, first.1)?;
        self.attach(&second.0, second.1)?;

        let id = ConnectionId(self.connections.len());
        self.ports.insert((a.to_string(), a_port), id);
        self.ports.insert((b.to_string(), b_port), id);
        self.connections
            .push(Connection::new(id, Hop::new(a_end, b_end), link));
        Ok(id)
    }

    fn attach(&mut self, local: &Endpoint, peer: Endpoint) -> Result<(), NetworkError> {
        let peer_is_router = self.known(&peer.node)?.is_router();
        let node = self
            .node_mut(&local.node)
            .ok_or_else(|| NetworkError::UnknownNode(local.node.clone()))?;
        let unknown_port = || NetworkError::UnknownPort {
            node: local.node.clone(),
            port: local.port,
        };
        match node.as_router_mut() {
            Some(router) => {
                if let Some(ip) = peer.ip {
                    router.add_local_ip(ip, local.port);
                }
                router
                    .port_mut(local.port)
                    .ok_or_else(unknown_port)?
                    .connect_endpoint(peer);
            }
            None => {
                let interface = node.interface_mut(local.port).ok_or_else(unknown_port)?;
                if peer_is_router {
                    let gateway = peer.ip.ok_or_else(|| NetworkError::MissingAddress {
                        node: peer.node.clone(),
                        port: peer.port,
                    })?;
                    interface.connect_gateway(gateway, peer)?;
                } else {
                    interface.connect_endpoint(peer);
                }
            }
        }
        Ok(())
    }

    pub fn connection(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(id.0)
    }

    pub fn connection_mut(&mut self, id: ConnectionId) -> Option<&mut Connection> {
        self.connections.get_mut(id.0)
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// The connection plugged into `port` of `node`.
    pub fn connection_at(&self, node: &str, port: usize) -> Option<&Connection> {
        self.ports
            .get(&(node.to_string(), port))
            .and_then(|&id| self.connection(id))
    }

    /// The first connection linking `a` and `b` directly.
    pub fn connection_between(&self, a: &str, b: &str) -> Option<&Connection> {
        self.connections.iter().find(|c| {
            let (x, y) = c.ends();
            (x.node == a && y.node == b) || (x.node == b && y.node == a)
        })
    }

    pub fn add_route(&mut self, router: &str, route: Route) -> Result<(), NetworkError> {
        let target = self.router_mut(router)?;
        if target.port(route.port).is_none() {
            return Err(NetworkError::UnknownPort {
                node: router.to_string(),
                port: route.port,
            });
        }
        target.add_route(route);
        Ok(())
    }

    pub fn add_firewall_rule(
        &mut self,
        router: &str,
        chain: FirewallChainType,
        rule: FirewallRule,
    ) -> Result<(), NetworkError> {
        self.router_mut(router)?.add_firewall_rule(chain, rule);
        Ok(())
    }

    pub fn set_firewall(
        &mut self,
        router: &str,
        firewall: super::Firewall,
    ) -> Result<(), NetworkError> {
        self.router_mut(router)?.set_firewall(firewall);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> Ipv4Address {
        s.parse().unwrap()
    }

    fn lan() -> Network {
        let mut network = Network::new();
        network
            .add_node(Node::new("a").with_interface(ip("10.0.0.2"), 24).unwrap())
            .unwrap();
        network
            .add_node(Node::router("r").with_interface(ip("10.0.0.1"), 24).unwrap())
            .unwrap();
        network
    }

    #[test]
    fn duplicates_are_rejected() {
        let mut network = lan();
        assert_eq!(
            network.add_node(Node::new("a")),
            Err(NetworkError::DuplicateNode("a".into()))
        );
        assert!(matches!(
            network.add_node(Node::new("b").with_interface(ip("10.0.0.2"), 24).unwrap()),
            Err(NetworkError::DuplicateIp { .. })
        ));
        assert_eq!(network.node_by_ip(ip("10.0.0.1")).map(Node::id), Some("r"));
    }

    #[test]
    fn late_interfaces_are_indexed() {
        let mut network = lan();
        assert_eq!(network.add_interface("a", ip("10.5.0.2"), 24), Ok(1));
        assert_eq!(network.node_by_ip(ip("10.5.0.2")).map(Node::id), Some("a"));
        assert!(matches!(
            network.add_interface("r", ip("10.5.0.2"), 24),
            Err(NetworkError::DuplicateIp { .. })
        ));
        assert_eq!(network.add_interface("r", ip("10.0.0.1"), 24), Ok(1));
        assert_eq!(
            network.add_interface("nobody", ip("10.9.0.1"), 24),
            Err(NetworkError::UnknownNode("nobody".into()))
        );
    }

    #[test]
    fn host_router_link_sets_gateway_and_local_ip() {
        let mut network = lan();
        let id = network.add_connection("r", 0, "a", 0, Link::default()).unwrap();
        let router = network.node("r").unwrap().as_router().unwrap();
        assert_eq!(router.local_ips().get(&ip("10.0.0.2")), Some(&0));
        assert_eq!(network.node("a").unwrap().peer(0).map(|e| e.node.as_str()), Some("r"));
        assert_eq!(network.connection_at("a", 0).map(Connection::id), Some(id));
        assert!(network.connection_between("a", "r").is_some());
        assert_eq!(
            network.add_connection("a", 0, "r", 0, Link::default()),
            Err(NetworkError::PortInUse {
                node: "a".into(),
                port: 0
            })
        );
    }

    #[test]
    fn wrong_gateway_leaves_ports_free() {
        let mut network = Network::new();
        network
            .add_node(Node::new("a").with_interface(ip("10.0.0.2"), 24).unwrap())
            .unwrap();
        network
            .add_node(Node::router("r").with_interface(ip("10.0.0.254"), 24).unwrap())
            .unwrap();
        let err = network.add_connection("a", 0, "r", 0, Link::default());
        assert!(matches!(
            err,
            Err(NetworkError::Address(AddressError::GatewayMismatch { .. }))
        ));
        assert!(network.node("a").unwrap().peer(0).is_none());
        assert!(network.node("r").unwrap().peer(0).is_none());
        assert!(network.connections().is_empty());
    }

    #[test]
    fn routes_need_a_router_port() {
        let mut network = lan();
        let net = "10.9.0.0/16".parse().unwrap();
        assert_eq!(
            network.add_route("a", Route::new(net, 0)),
            Err(NetworkError::NotARouter("a".into()))
        );
        assert!(matches!(
            network.add_route("r", Route::new(net, 5)),
            Err(NetworkError::UnknownPort { .. })
        ));
        network.add_route("r", Route::new(net, 0)).unwrap();
    }
}
