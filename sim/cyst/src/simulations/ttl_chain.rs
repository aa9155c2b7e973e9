use super::{expect_response, run_to_completion, SimulationError, ATTACKER, SCANNER};
use cyst_core::{
    access::AccessLevel,
    ip::{Ipv4Address, Ipv4Net},
    message::{Action, StatusOrigin, StatusValue},
    service::Service,
    topology::{Firewall, FirewallPolicy, Link, Route},
    Environment, EnvironmentConfig, Node, ScriptedActor,
};

/// Runs a request along a chain of routers as long as its TTL.
///
/// Each router on the way takes one from the TTL, so the request dies at the
/// last router in front of its target. The response starts with a fresh TTL
/// and makes it back.
pub fn ttl_chain(config: EnvironmentConfig) -> Result<Environment, SimulationError> {
    let routers = config.max_ttl.max(1);
    let mut env = Environment::create(config);
    env.add_node(Node::new(ATTACKER).with_interface([10, 0, 0, 2].into(), 24)?)?;
    env.add_node(
        Node::new("target")
            .with_interface([10, 9, 0, 2].into(), 24)?
            .with_service(Service::passive("ssh", "root", "8.2", AccessLevel::Elevated)),
    )?;

    let remote = Ipv4Net::new_short(Ipv4Address::new([10, 9, 0, 0]), 24);
    for i in 0..routers {
        let name = format!("r{}", i);
        let (upstream, up_len) = match i {
            0 => ([10, 0, 0, 1], 24),
            _ => ([172, 16, i - 1, 2], 30),
        };
        let (downstream, down_len) = if i + 1 == routers {
            ([10, 9, 0, 1], 24)
        } else {
            ([172, 16, i, 1], 30)
        };
        env.add_node(
            Node::router(name.as_str())
                .with_interface(upstream.into(), up_len)?
                .with_interface(downstream.into(), down_len)?,
        )?;
        env.add_route(&name, Route::new(remote, 1))?;
        match i {
            0 => env.add_connection(ATTACKER, 0, &name, 0, Link::default())?,
            _ => env.add_connection(&format!("r{}", i - 1), 1, &name, 0, Link::default())?,
        };
    }
    let last = format!("r{}", routers - 1);
    env.add_connection("target", 0, &last, 1, Link::default())?;
    env.set_firewall(&last, Firewall::new(FirewallPolicy::Allow))?;
    env.add_active_service(ATTACKER, SCANNER, "attacker", ScriptedActor::new())?;

    let request = env.request(
        ATTACKER,
        SCANNER,
        [10, 9, 0, 2].into(),
        "ssh",
        Action::new("cyst:test:echo_success"),
    );
    env.send_message(request, 0)?;
    run_to_completion(&mut env)?;

    expect_response(
        &env,
        ATTACKER,
        SCANNER,
        StatusOrigin::Network,
        StatusValue::Failure,
        Some("TTL expired"),
    )?;
    Ok(env)
}
