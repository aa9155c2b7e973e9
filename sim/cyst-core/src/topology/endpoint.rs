use crate::ip::Ipv4Address;
use std::fmt;

/// One side of a hop: a port of a node, optionally with its address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub node: String,
    pub port: usize,
    pub ip: Option<Ipv4Address>,
}

impl Endpoint {
    pub fn new(node: impl Into<String>, port: usize, ip: Option<Ipv4Address>) -> Self {
        Self {
            node: node.into(),
            port,
            ip,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ip {
            Some(ip) => write!(f, "{}[{}]({})", self.node, self.port, ip),
            None => write!(f, "{}[{}]", self.node, self.port),
        }
    }
}

/// A directed traversal of a single link.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Hop {
    pub src: Endpoint,
    pub dst: Endpoint,
}

impl Hop {
    pub fn new(src: Endpoint, dst: Endpoint) -> Self {
        Self { src, dst }
    }

    /// The same link traversed the other way.
    pub fn swap(&self) -> Hop {
        Hop {
            src: self.dst.clone(),
            dst: self.src.clone(),
        }
    }
}

impl fmt::Display for Hop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.src, self.dst)
    }
}
