use super::{expect_response, run_to_completion, SimulationError, ATTACKER, SCANNER};
use cyst_core::{
    ip::Ipv4Net,
    message::{Action, StatusOrigin, StatusValue},
    topology::{Link, Route},
    Environment, EnvironmentConfig, Node, ScriptedActor,
};

/// Runs a request into a routing loop.
///
/// Two routers send everything they do not know to each other. The request
/// comes back to the first router, which recognizes it and gives up.
pub fn router_cycle(config: EnvironmentConfig) -> Result<Environment, SimulationError> {
    let mut env = Environment::create(config);
    env.add_node(Node::new(ATTACKER).with_interface([10, 0, 0, 2].into(), 24)?)?;
    env.add_node(
        Node::router("edge")
            .with_interface([10, 0, 0, 1].into(), 24)?
            .with_interface([172, 16, 0, 1].into(), 30)?,
    )?;
    env.add_node(Node::router("core").with_interface([172, 16, 0, 2].into(), 30)?)?;
    env.add_connection(ATTACKER, 0, "edge", 0, Link::default())?;
    env.add_connection("edge", 1, "core", 0, Link::default())?;
    env.add_route("edge", Route::new(Ipv4Net::ANY, 1))?;
    env.add_route("core", Route::new(Ipv4Net::ANY, 0))?;
    env.add_active_service(ATTACKER, SCANNER, "attacker", ScriptedActor::new())?;

    let probe = env.request(
        ATTACKER,
        SCANNER,
        [198, 51, 100, 7].into(),
        "http",
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
        Some("Message stuck in a cycle"),
    )?;
    Ok(env)
}
