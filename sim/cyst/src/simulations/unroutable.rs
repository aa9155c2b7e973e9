use super::{expect_response, office, run_to_completion, SimulationError, ATTACKER, SCANNER};
use cyst_core::{
    message::{Action, StatusOrigin, StatusValue},
    Environment, EnvironmentConfig,
};

/// Runs a request to an address no router knows about.
///
/// The attacker probes a public address. Its gateway has no route for it, so
/// the request is answered by the gateway itself.
pub fn unroutable(config: EnvironmentConfig) -> Result<Environment, SimulationError> {
    let mut env = office(config)?;
    let probe = env.request(
        ATTACKER,
        SCANNER,
        [8, 8, 8, 8].into(),
        "dns",
        Action::new("cyst:test:echo_success"),
    );
    env.send_message(probe, 0)?;
    run_to_completion(&mut env)?;

    expect_response(
        &env,
        ATTACKER,
        SCANNER,
        StatusOrigin::Network,
        StatusValue::Failure,
        Some("Network address not routable"),
    )?;
    if env.messages().len() != 1 {
        return Err(SimulationError::Unexpected(format!(
            "expected only the response to be delivered, got {} messages",
            env.messages().len()
        )));
    }
    Ok(env)
}
