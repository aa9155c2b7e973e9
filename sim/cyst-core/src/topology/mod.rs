//! Nodes, ports and the connections between them.

mod connection;
mod endpoint;
pub mod firewall;
mod network;
mod node;
mod port;
mod route_table;
pub mod router;

pub use connection::{Connection, ConnectionId, Link};
pub use endpoint::{Endpoint, Hop};
pub use firewall::{Firewall, FirewallChain, FirewallChainType, FirewallPolicy, FirewallRule};
pub use network::{Network, NetworkError};
pub use node::{Forwarding, Node};
pub use port::{AddressError, Interface, Port};
pub use route_table::{Route, RoutingTable};
pub use router::{Router, Verdict};
