use super::{
    db_ip, expect_response, office, run_to_completion, web_ip, SimulationError, ATTACKER, SCANNER,
};
use cyst_core::{
    ip::{Ipv4Address, Ipv4Net},
    message::{Action, RequestSpec, StatusOrigin, StatusValue},
    topology::{Firewall, FirewallChainType, FirewallPolicy, FirewallRule},
    Environment, EnvironmentConfig, ScriptedActor,
};

/// Runs traffic through a gateway firewall that is open in one direction.
///
/// The attacker subnet may reach the server subnet. A backup job on the
/// database server tries to connect back to the attacker and is refused.
pub fn firewall(config: EnvironmentConfig) -> Result<Environment, SimulationError> {
    let mut env = office(config)?;
    let attacker_net = Ipv4Net::new_short(Ipv4Address::new([10, 0, 0, 0]), 24);
    let server_net = Ipv4Net::new_short(web_ip(), 24);
    env.set_firewall("gw", Firewall::new(FirewallPolicy::Deny))?;
    env.add_routing_rule(
        "gw",
        FirewallChainType::Forward,
        FirewallRule::new(attacker_net, server_net, "*", FirewallPolicy::Allow),
    )?;

    let callback = RequestSpec::new(
        Ipv4Address::new([10, 0, 0, 2]),
        "sshd",
        Action::new("cyst:test:echo_success"),
    );
    env.add_active_service("db", "backup", "postgres", ScriptedActor::with_script([callback]))?;

    let content = Action::new("cyst:test:echo_success").with_parameter("content", "It works!");
    let request = env.request(ATTACKER, SCANNER, web_ip(), "http", content);
    env.send_message(request, 0)?;
    let request = env.request(ATTACKER, SCANNER, db_ip(), "postgresql", Action::new("cyst:test:echo_failure"));
    env.send_message(request, 5)?;
    run_to_completion(&mut env)?;

    expect_response(
        &env,
        "db",
        "backup",
        StatusOrigin::Network,
        StatusValue::Failure,
        Some("Blocked by firewall"),
    )?;
    expect_response(&env, ATTACKER, SCANNER, StatusOrigin::Service, StatusValue::Failure, None)?;
    let answered = env
        .active_service::<ScriptedActor>(ATTACKER, SCANNER)
        .map(|scanner| scanner.responses().len())
        .unwrap_or_default();
    if answered != 2 {
        return Err(SimulationError::Unexpected(format!(
            "the attacker expected two responses, got {}",
            answered
        )));
    }
    Ok(env)
}
