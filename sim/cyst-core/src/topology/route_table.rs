use crate::ip::{Ipv4Address, Ipv4Net};
use std::fmt;

/// A routing table entry: destinations in `net` leave through `port`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Route {
    pub net: Ipv4Net,
    pub port: usize,
    pub metric: u32,
}

impl Route {
    pub const DEFAULT_METRIC: u32 = 100;

    pub fn new(net: Ipv4Net, port: usize) -> Self {
        Self {
            net,
            port,
            metric: Self::DEFAULT_METRIC,
        }
    }

    pub fn with_metric(mut self, metric: u32) -> Self {
        self.metric = metric;
        self
    }

    /// Lower keys are consulted first: by metric, then most specific prefix.
    fn key(&self) -> (u32, u32) {
        (self.metric, 32 - self.net.prefix_len())
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} via port {} (metric {})", self.net, self.port, self.metric)
    }
}

/// Routes ordered by metric, then by prefix length (longest first).
///
/// Insertion is stable: routes with equal keys stay in the order they were
/// added, including exact duplicates.
#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    routes: Vec<Route>,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, route: Route) {
        let key = route.key();
        let position = self.routes.partition_point(|r| r.key() <= key);
        self.routes.insert(position, route);
    }

    /// Removes the first route equal to `route`.
    pub fn remove(&mut self, route: &Route) -> bool {
        match self.routes.iter().position(|r| r == route) {
            Some(index) => {
                self.routes.remove(index);
                true
            }
            None => false,
        }
    }

    /// The first route whose network contains `address`.
    pub fn get_route(&self, address: Ipv4Address) -> Option<&Route> {
        self.routes.iter().find(|route| route.net.contains(address))
    }

    pub fn list_routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn net(s: &str) -> Ipv4Net {
        Ipv4Net::from_cidr(s).unwrap()
    }

    #[test]
    fn metric_dominates_prefix_length() {
        let mut table = RoutingTable::new();
        table.add(Route::new(net("192.168.0.0/30"), 0));
        table.add(Route::new(net("192.168.0.0/26"), 1).with_metric(30));
        table.add(Route::new(net("192.168.0.0/22"), 2));
        table.add(Route::new(net("192.168.0.0/16"), 3));
        table.add(Route::new(net("192.168.0.0/16"), 4));

        let ports: Vec<usize> = table.list_routes().iter().map(|r| r.port).collect();
        assert_eq!(ports, vec![1, 0, 2, 3, 4]);
        assert_eq!(table.list_routes()[0].net, net("192.168.0.0/26"));
        assert_eq!(table.list_routes()[1].net, net("192.168.0.0/30"));
    }

    #[test]
    fn longest_prefix_wins_on_equal_metric() {
        let mut table = RoutingTable::new();
        table.add(Route::new(net("0.0.0.0/0"), 0));
        table.add(Route::new(net("10.0.0.0/8"), 1));
        table.add(Route::new(net("10.1.0.0/16"), 2));

        let lookup = |s: &str| table.get_route(s.parse().unwrap()).map(|r| r.port);
        assert_eq!(lookup("10.1.2.3"), Some(2));
        assert_eq!(lookup("10.2.2.3"), Some(1));
        assert_eq!(lookup("8.8.8.8"), Some(0));
    }

    #[test]
    fn missing_route() {
        let mut table = RoutingTable::new();
        table.add(Route::new(net("10.0.0.0/8"), 1));
        assert!(table.get_route("11.0.0.1".parse().unwrap()).is_none());
    }

    #[test]
    fn remove_route() {
        let mut table = RoutingTable::new();
        let route = Route::new(net("1.2.3.0/24"), 6);
        table.add(Route::new(net("1.2.0.0/16"), 4));
        table.add(route.clone());
        assert_eq!(table.get_route("1.2.3.4".parse().unwrap()), Some(&route));
        assert!(table.remove(&route));
        assert!(!table.remove(&route));
        assert_eq!(table.get_route("1.2.3.4".parse().unwrap()).map(|r| r.port), Some(4));
    }
}
