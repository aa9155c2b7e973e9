use super::{
    db_ip, expect_response, office, run_to_completion, web_ip, SimulationError, ATTACKER, SCANNER,
};
use cyst_core::{
    environment::SessionSpec,
    message::{Action, RequestSpec, StatusOrigin, StatusValue},
    topology::{Firewall, FirewallPolicy},
    Environment, EnvironmentConfig, ScriptedActor, SessionId,
};

/// Runs an attacker through a closed gateway using sessions.
///
/// The attacker holds a session to the web server, established when the
/// environment starts. Through it the attacker reaches the database server,
/// opens a nested session there and uses that one directly.
pub fn session_tunnel(config: EnvironmentConfig) -> Result<Environment, SimulationError> {
    let mut env = office(config)?;
    env.set_firewall("gw", Firewall::new(FirewallPolicy::Deny))?;
    let foothold = env.defer_session(SessionSpec::new(SCANNER, [ATTACKER, "gw", "web"]));
    env.init()?;
    let foothold = env
        .deferred_session(foothold)
        .ok_or_else(|| SimulationError::Unexpected("the foothold session was not created".into()))?;

    // without the session the gateway refuses
    let direct = env.request(ATTACKER, SCANNER, db_ip(), "postgresql", echo());
    env.send_message(direct, 0)?;
    run_to_completion(&mut env)?;
    expect_response(
        &env,
        ATTACKER,
        SCANNER,
        StatusOrigin::Network,
        StatusValue::Failure,
        Some("Blocked by firewall"),
    )?;

    let spec = RequestSpec::new(web_ip(), "http", echo()).with_session(foothold);
    send(&mut env, spec)?;
    expect_response(&env, ATTACKER, SCANNER, StatusOrigin::Service, StatusValue::Success, None)?;

    let spec = RequestSpec::new(db_ip(), "postgresql", Action::new("cyst:network:create_session"))
        .with_session(foothold);
    send(&mut env, spec)?;
    expect_response(&env, ATTACKER, SCANNER, StatusOrigin::Service, StatusValue::Success, None)?;
    let pivot = last_session(&env)?;

    let spec = RequestSpec::new(db_ip(), "postgresql", echo()).with_session(pivot);
    send(&mut env, spec)?;
    expect_response(&env, ATTACKER, SCANNER, StatusOrigin::Service, StatusValue::Success, None)?;
    Ok(env)
}

fn echo() -> Action {
    Action::new("cyst:test:echo_success")
}

fn send(env: &mut Environment, spec: RequestSpec) -> Result<(), SimulationError> {
    let request = env.create_request(ATTACKER, SCANNER, spec);
    env.send_message(request, 0)?;
    run_to_completion(env)
}

fn last_session(env: &Environment) -> Result<SessionId, SimulationError> {
    env.active_service::<ScriptedActor>(ATTACKER, SCANNER)
        .and_then(ScriptedActor::last_response)
        .and_then(|response| response.session())
        .ok_or_else(|| SimulationError::Unexpected("no session in the last response".into()))
}
