//! Forwarding decisions of router nodes.

use super::{
    AddressError, Endpoint, Firewall, FirewallChainType, FirewallRule, Port, Route, RoutingTable,
};
use crate::{
    ip::{Ipv4Address, Ipv4Mask, Ipv4Net},
    message::{Message, MessageId},
};
use lru::LruCache;
use rustc_hash::FxHashMap;
use std::num::NonZeroUsize;

/// What a router decided to do with a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The next hop has been set; the message continues after the delay.
    Forward { processing_time: u64 },
    /// The message is addressed to the router itself.
    Local,
    /// The request is refused. The caller answers with a network failure
    /// carrying `reason`.
    Reject {
        reason: &'static str,
        processing_time: u64,
    },
    /// The message is discarded without an answer.
    Drop { reason: &'static str },
}

pub const TTL_EXPIRED: &str = "TTL expired";
pub const STUCK_IN_CYCLE: &str = "Message stuck in a cycle";
pub const HOST_UNREACHABLE: &str = "Host unreachable";
pub const BLOCKED_BY_FIREWALL: &str = "Blocked by firewall";
pub const NOT_ROUTABLE: &str = "Network address not routable";
pub const OFF_REQUEST_PATH: &str = "Response left the path of its request";

/// Routing state of a router node.
///
/// Every request the router forwards is remembered in a bounded cache keyed
/// by message id. Seeing the same request again means it is looping, and the
/// matching response pops the entry on its way back and must leave through
/// the port the request came in on.
#[derive(Debug)]
pub struct Router {
    ports: Vec<Port>,
    /// Addresses of attached nodes, mapped to the port they hang off.
    local_ips: FxHashMap<Ipv4Address, usize>,
    routes: RoutingTable,
    firewall: Option<Firewall>,
    /// Ingress port of every forwarded request.
    requests: LruCache<MessageId, usize>,
    processing_time: u64,
}

impl Router {
    pub const DEFAULT_CACHE_CAPACITY: usize = 64;

    pub fn new() -> Self {
        Self {
            ports: Vec::new(),
            local_ips: FxHashMap::default(),
            routes: RoutingTable::new(),
            firewall: None,
            requests: LruCache::new(default_capacity()),
            processing_time: 1,
        }
    }

    pub fn set_cache_capacity(&mut self, capacity: NonZeroUsize) {
        self.requests.resize(capacity);
    }

    pub fn set_processing_time(&mut self, processing_time: u64) {
        self.processing_time = processing_time;
    }

    pub fn add_port(
        &mut self,
        ip: Option<Ipv4Address>,
        mask: Option<Ipv4Mask>,
    ) -> Result<usize, AddressError> {
        let index = self.ports.len();
        self.ports.push(Port::new(index, ip, mask)?);
        Ok(index)
    }

    pub fn ports(&self) -> &[Port] {
        &self.ports
    }

    pub fn port(&self, index: usize) -> Option<&Port> {
        self.ports.get(index)
    }

    pub(crate) fn port_mut(&mut self, index: usize) -> Option<&mut Port> {
        self.ports.get_mut(index)
    }

    /// Registers a node address reachable directly through `port`.
    pub(crate) fn add_local_ip(&mut self, ip: Ipv4Address, port: usize) {
        self.local_ips.insert(ip, port);
    }

    pub fn local_ips(&self) -> &FxHashMap<Ipv4Address, usize> {
        &self.local_ips
    }

    /// Networks configured on the router ports.
    pub fn local_networks(&self) -> impl Iterator<Item = Ipv4Net> + '_ {
        self.ports.iter().filter_map(Port::net)
    }

    pub fn add_route(&mut self, route: Route) {
        self.routes.add(route);
    }

    pub fn remove_route(&mut self, route: &Route) -> bool {
        self.routes.remove(route)
    }

    pub fn list_routes(&self) -> &[Route] {
        self.routes.list_routes()
    }

    pub fn firewall(&self) -> Option<&Firewall> {
        self.firewall.as_ref()
    }

    pub fn set_firewall(&mut self, firewall: Firewall) {
        self.firewall = Some(firewall);
    }

    /// Adds a rule, creating a default-deny firewall on first use.
    pub fn add_firewall_rule(&mut self, chain: FirewallChainType, rule: FirewallRule) {
        self.firewall
            .get_or_insert_with(Firewall::default)
            .add_rule(chain, rule);
    }

    /// Whether `ip` is one of the router's own port addresses.
    pub fn owns(&self, ip: Ipv4Address) -> bool {
        self.ports.iter().any(|port| port.ip() == Some(ip))
    }

    /// The port a message for `dst` leaves through when the router itself
    /// originates it.
    pub fn egress_port(&self, dst: Ipv4Address) -> Option<usize> {
        self.local_ips
            .get(&dst)
            .copied()
            .or_else(|| self.ports.iter().position(|port| port.routes(dst)))
            .or_else(|| self.routes.get_route(dst).map(|route| route.port))
    }

    /// Evaluates `chain` for traffic the router receives (`Input`) or
    /// originates (`Output`). Without a firewall everything passes.
    pub fn admits(&self, chain: FirewallChainType, message: &Message) -> (bool, u64) {
        let (Some(firewall), Some(dst)) = (&self.firewall, message.dst_ip()) else {
            return (true, 0);
        };
        let src = message.src_ip().unwrap_or(Ipv4Address::CURRENT_NETWORK);
        firewall.evaluate(chain, src, dst, message.dst_service())
    }

    pub fn cached_requests(&self) -> usize {
        self.requests.len()
    }

    /// Decides the fate of `message`, which has just arrived at `node`.
    ///
    /// On [`Verdict::Forward`] the next hop of the message is set.
    pub fn process(&mut self, node: &str, message: &mut Message) -> Verdict {
        if message.decrement_ttl() == 0 {
            return self.refuse(message, TTL_EXPIRED);
        }

        if message.in_session() {
            message.advance_planned();
            return self.forwarded();
        }

        if message.is_response() {
            let cached = self.requests.pop(&message.id());
            if message.advance_planned() {
                let leaving = message.legs().last().map(|leg| leg.hop.src.port);
                if cached.is_some() && cached != leaving {
                    return Verdict::Drop {
                        reason: OFF_REQUEST_PATH,
                    };
                }
                return self.forwarded();
            }
            if let Some(port) = cached {
                return self.forward(node, message, port, port, self.processing_time);
            }
        } else if self.requests.contains(&message.id()) {
            return self.refuse(message, STUCK_IN_CYCLE);
        }

        let Some(dst) = message.dst_ip() else {
            return self.refuse(message, NOT_ROUTABLE);
        };
        if self.owns(dst) {
            if message.is_request() {
                let (allowed, cost) = self.admits(FirewallChainType::Input, message);
                if !allowed {
                    return Verdict::Reject {
                        reason: BLOCKED_BY_FIREWALL,
                        processing_time: self.processing_time.saturating_add(cost),
                    };
                }
            }
            return Verdict::Local;
        }

        let arrival = message.current().map_or(0, |endpoint| endpoint.port);
        let src = message.src_ip().unwrap_or(Ipv4Address::CURRENT_NETWORK);
        let mut processing_time = self.processing_time;

        if let Some(&port) = self.local_ips.get(&dst) {
            let arrival_net = self.ports.get(arrival).and_then(Port::net);
            let same_network = arrival_net.is_some() && arrival_net == self.ports[port].net();
            if !same_network {
                match &self.firewall {
                    None => return self.refuse(message, HOST_UNREACHABLE),
                    Some(firewall) => {
                        let (allowed, cost) = firewall.evaluate(
                            FirewallChainType::Forward,
                            src,
                            dst,
                            message.dst_service(),
                        );
                        processing_time = processing_time.saturating_add(cost);
                        if !allowed {
                            return self.refuse(message, BLOCKED_BY_FIREWALL);
                        }
                    }
                }
            }
            return self.forward(node, message, arrival, port, processing_time);
        }

        if self.ports.iter().any(|port| port.routes(dst)) {
            return self.refuse(message, HOST_UNREACHABLE);
        }

        if let Some(firewall) = &self.firewall {
            let (allowed, cost) =
                firewall.evaluate(FirewallChainType::Forward, src, dst, message.dst_service());
            processing_time = processing_time.saturating_add(cost);
            if !allowed {
                return self.refuse(message, BLOCKED_BY_FIREWALL);
            }
        }

        match self.routes.get_route(dst) {
            Some(route) => {
                let port = route.port;
                self.forward(node, message, arrival, port, processing_time)
            }
            None => self.refuse(message, NOT_ROUTABLE),
        }
    }

    fn forward(
        &mut self,
        node: &str,
        message: &mut Message,
        arrival: usize,
        egress: usize,
        processing_time: u64,
    ) -> Verdict {
        let Some(port) = self.ports.get(egress) else {
            return self.refuse(message, NOT_ROUTABLE);
        };
        let Some(peer) = port.endpoint().cloned() else {
            return self.refuse(message, HOST_UNREACHABLE);
        };
        let local: Endpoint = port.local_endpoint(node);
        if message.is_request() {
            self.requests.put(message.id(), arrival);
        }
        message.set_next_hop(local, peer);
        Verdict::Forward { processing_time }
    }

    fn forwarded(&self) -> Verdict {
        Verdict::Forward {
            processing_time: self.processing_time,
        }
    }

    /// Requests are refused with an answer, anything else is dropped.
    fn refuse(&self, message: &Message, reason: &'static str) -> Verdict {
        if message.is_request() {
            Verdict::Reject {
                reason,
                processing_time: self.processing_time,
            }
        } else {
            Verdict::Drop { reason }
        }
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

fn default_capacity() -> NonZeroUsize {
    NonZeroUsize::new(Router::DEFAULT_CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN)
}
