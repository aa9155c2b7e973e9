//! Prebuilt simulation setups for testing, benchmarking, and the command line.
//!
//! Every simulation builds its environment, runs it to completion and checks
//! the outcome it is meant to demonstrate. The finished environment is
//! returned for inspection.

use cyst_core::{
    access::{AccessError, AccessLevel},
    environment::EnvironmentError,
    ip::Ipv4Address,
    message::{Status, StatusOrigin, StatusValue},
    service::Service,
    topology::{AddressError, Link},
    Environment, EnvironmentConfig, EnvironmentState, Node, ScriptedActor,
};

mod unroutable;
pub use unroutable::unroutable;

mod router_cycle;
pub use router_cycle::router_cycle;

mod ttl_chain;
pub use ttl_chain::ttl_chain;

mod firewall;
pub use firewall::firewall;

mod session_tunnel;
pub use session_tunnel::session_tunnel;

mod access;
pub use access::access;

#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error(transparent)]
    Environment(#[from] EnvironmentError),
    #[error(transparent)]
    Address(#[from] AddressError),
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error("{0}")]
    Unexpected(String),
}

pub type Simulation = fn(EnvironmentConfig) -> Result<Environment, SimulationError>;

/// Every built-in simulation by name.
pub const SIMULATIONS: [(&str, Simulation); 6] = [
    ("unroutable", unroutable),
    ("router_cycle", router_cycle),
    ("ttl_chain", ttl_chain),
    ("firewall", firewall),
    ("session_tunnel", session_tunnel),
    ("access", access),
];

pub fn find(name: &str) -> Option<Simulation> {
    SIMULATIONS
        .iter()
        .find(|(candidate, _)| *candidate == name)
        .map(|(_, simulation)| *simulation)
}

pub(crate) const ATTACKER: &str = "attacker";
pub(crate) const SCANNER: &str = "scanner";

/// A small office network.
///
/// ```text
/// attacker 10.0.0.2 --- [0] gw [1] --- web 10.0.1.2 (http)
///                               [2] --- db  10.0.1.3 (postgresql)
/// ```
///
/// The attacker runs a [`ScriptedActor`] named `scanner`. The gateway has no
/// firewall, so nothing crosses between the two subnets yet.
pub(crate) fn office(config: EnvironmentConfig) -> Result<Environment, SimulationError> {
    let mut env = Environment::create(config);
    env.add_node(Node::new(ATTACKER).with_interface([10, 0, 0, 2].into(), 24)?)?;
    env.add_node(
        Node::router("gw")
            .with_interface([10, 0, 0, 1].into(), 24)?
            .with_interface([10, 0, 1, 1].into(), 24)?
            .with_interface([10, 0, 1, 1].into(), 24)?,
    )?;
    env.add_node(
        Node::new("web")
            .with_interface([10, 0, 1, 2].into(), 24)?
            .with_service(Service::passive("http", "www-data", "2.4.54", AccessLevel::Limited)),
    )?;
    env.add_node(
        Node::new("db")
            .with_interface([10, 0, 1, 3].into(), 24)?
            .with_service(Service::passive("postgresql", "postgres", "15.1", AccessLevel::Elevated)),
    )?;
    env.add_connection(ATTACKER, 0, "gw", 0, Link::default())?;
    env.add_connection("web", 0, "gw", 1, Link::default())?;
    env.add_connection("db", 0, "gw", 2, Link::default())?;
    env.add_active_service(ATTACKER, SCANNER, "attacker", ScriptedActor::new())?;
    Ok(env)
}

pub(crate) fn web_ip() -> Ipv4Address {
    [10, 0, 1, 2].into()
}

pub(crate) fn db_ip() -> Ipv4Address {
    [10, 0, 1, 3].into()
}

/// Initializes the environment if needed and runs it until the queue drains.
pub(crate) fn run_to_completion(env: &mut Environment) -> Result<(), SimulationError> {
    env.init()?;
    match env.run() {
        (true, EnvironmentState::Finished) => Ok(()),
        (_, state) => Err(SimulationError::Unexpected(format!(
            "simulation stopped in state {}",
            state
        ))),
    }
}

/// Checks the last response received by the scripted actor `service` at
/// `node`. `content` is only compared when given.
pub(crate) fn expect_response(
    env: &Environment,
    node: &str,
    service: &str,
    origin: StatusOrigin,
    value: StatusValue,
    content: Option<&str>,
) -> Result<(), SimulationError> {
    let response = env
        .active_service::<ScriptedActor>(node, service)
        .and_then(ScriptedActor::last_response)
        .ok_or_else(|| SimulationError::Unexpected(format!("{}.{} got no response", node, service)))?;
    let expected = Status::new(origin, value);
    let content_matches = content.map_or(true, |content| response.content() == Some(content));
    if response.status() != Some(expected) || !content_matches {
        return Err(SimulationError::Unexpected(format!(
            "{}.{} expected {} {}, got {}",
            node,
            service,
            expected,
            content.unwrap_or(""),
            response
        )));
    }
    Ok(())
}
