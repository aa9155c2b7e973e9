#![allow(dead_code)]

use cyst_core::{
    access::AccessLevel,
    ip::Ipv4Address,
    message::{Action, Message, RequestSpec, Status, StatusOrigin, StatusValue},
    service::Service,
    topology::{Firewall, FirewallChainType, FirewallPolicy, FirewallRule, Link},
    Environment, EnvironmentConfig, Node, ScriptedActor,
};

pub const ATTACKER: &str = "attacker";
pub const SCANNER: &str = "scanner";

pub fn ip(s: &str) -> Ipv4Address {
    s.parse().expect("valid address")
}

pub fn status(origin: StatusOrigin, value: StatusValue) -> Status {
    Status::new(origin, value)
}

pub fn echo() -> Action {
    Action::new("cyst:test:echo_success")
}

/// ```text
/// attacker 10.0.0.2 --- [0] r [1] --- target 10.0.1.2
///                              [2] --- other  10.0.1.3
/// ```
///
/// The attacker runs a [`ScriptedActor`] named `scanner` and a passive `ftp`
/// service; target and other run a passive `ssh`.
pub fn two_subnets(config: EnvironmentConfig) -> anyhow::Result<Environment> {
    let mut env = Environment::create(config);
    env.add_node(
        Node::new(ATTACKER)
            .with_interface(ip("10.0.0.2"), 24)?
            .with_service(Service::passive("ftp", "root", "3.0", AccessLevel::Limited)),
    )?;
    env.add_node(
        Node::router("r")
            .with_interface(ip("10.0.0.1"), 24)?
            .with_interface(ip("10.0.1.1"), 24)?
            .with_interface(ip("10.0.1.1"), 24)?,
    )?;
    for (name, address) in [("target", "10.0.1.2"), ("other", "10.0.1.3")] {
        env.add_node(
            Node::new(name)
                .with_interface(ip(address), 24)?
                .with_service(Service::passive("ssh", "root", "8.2", AccessLevel::Elevated)),
        )?;
    }
    env.add_connection(ATTACKER, 0, "r", 0, Link::default())?;
    env.add_connection("target", 0, "r", 1, Link::default())?;
    env.add_connection("other", 0, "r", 2, Link::default())?;
    env.add_active_service(ATTACKER, SCANNER, "attacker", ScriptedActor::new())?;
    Ok(env)
}

/// Lets the attacker subnet reach the target subnet through `r`.
pub fn open_firewall(env: &mut Environment) -> anyhow::Result<()> {
    env.set_firewall("r", Firewall::new(FirewallPolicy::Deny))?;
    env.add_routing_rule(
        "r",
        FirewallChainType::Forward,
        FirewallRule::new(
            "10.0.0.0/24".parse()?,
            "10.0.1.0/24".parse()?,
            "*",
            FirewallPolicy::Allow,
        ),
    )?;
    Ok(())
}

pub fn send(env: &mut Environment, spec: RequestSpec) -> anyhow::Result<()> {
    let request = env.create_request(ATTACKER, SCANNER, spec);
    env.send_message(request, 0)?;
    Ok(())
}

pub fn responses(env: &Environment) -> &[Message] {
    env.active_service::<ScriptedActor>(ATTACKER, SCANNER)
        .map(ScriptedActor::responses)
        .unwrap_or_default()
}

pub fn last_response(env: &Environment) -> Option<&Message> {
    responses(env).last()
}

/// Initializes the environment and runs it until it stops.
pub fn run(env: &mut Environment) -> anyhow::Result<()> {
    env.init()?;
    env.run();
    Ok(())
}
