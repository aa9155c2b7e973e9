use super::{Endpoint, Hop};
use std::fmt;

/// Index of a connection inside its [`Network`](super::Network).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(pub(crate) usize);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Attributes of a link, given when two ports are connected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Link {
    /// Virtual time added to every traversal.
    pub delay: u64,
    /// A blocked link refuses all traffic.
    pub blocked: bool,
}

impl Link {
    pub fn with_delay(delay: u64) -> Self {
        Self {
            delay,
            blocked: false,
        }
    }

    pub fn blocked() -> Self {
        Self {
            delay: 0,
            blocked: true,
        }
    }
}

/// A bidirectional link between two ports, recorded in the direction it was
/// created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    id: ConnectionId,
    hop: Hop,
    link: Link,
}

impl Connection {
    pub(crate) fn new(id: ConnectionId, hop: Hop, link: Link) -> Self {
        Self { id, hop, link }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn hop(&self) -> &Hop {
        &self.hop
    }

    pub fn delay(&self) -> u64 {
        self.link.delay
    }

    pub fn is_blocked(&self) -> bool {
        self.link.blocked
    }

    pub fn set_blocked(&mut self, blocked: bool) {
        self.link.blocked = blocked;
    }

    pub fn set_delay(&mut self, delay: u64) {
        self.link.delay = delay;
    }

    /// The hop leaving `node` over this connection, if `node` is one of its
    /// ends.
    pub fn hop_from(&self, node: &str) -> Option<Hop> {
        if self.hop.src.node == node {
            Some(self.hop.clone())
        } else if self.hop.dst.node == node {
            Some(self.hop.swap())
        } else {
            None
        }
    }

    pub fn ends(&self) -> (&Endpoint, &Endpoint) {
        (&self.hop.src, &self.hop.dst)
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}", self.id, self.hop)?;
        if self.link.blocked {
            write!(f, " (blocked)")?;
        }
        Ok(())
    }
}
