//! Sessions carry messages along fixed paths, past router decisions.

mod common;

use common::*;
use cyst_core::{
    environment::{EnvironmentError, MessagingError, SessionSpec},
    message::{Action, RequestSpec, StatusOrigin, StatusValue},
    session::SessionError,
    topology::{Firewall, FirewallPolicy},
    Environment, EnvironmentConfig, ScriptedActor, SessionId,
};

fn closed() -> anyhow::Result<Environment> {
    let mut env = two_subnets(EnvironmentConfig::default())?;
    env.set_firewall("r", Firewall::new(FirewallPolicy::Deny))?;
    Ok(env)
}

fn tunnel(env: &mut Environment) -> anyhow::Result<SessionId> {
    Ok(env.create_session(SessionSpec::new(SCANNER, [ATTACKER, "r", "target"]))?)
}

fn succeeded(env: &Environment) -> bool {
    last_response(env).and_then(|response| response.status())
        == Some(status(StatusOrigin::Service, StatusValue::Success))
}

#[test]
fn session_passes_a_closed_firewall() -> anyhow::Result<()> {
    let mut env = closed()?;
    send(&mut env, RequestSpec::new(ip("10.0.1.2"), "ssh", echo()))?;
    run(&mut env)?;
    assert_eq!(
        last_response(&env).and_then(|response| response.content()),
        Some("Blocked by firewall")
    );

    let session = tunnel(&mut env)?;
    send(&mut env, RequestSpec::new(ip("10.0.1.2"), "ssh", echo()).with_session(session))?;
    env.run();
    assert!(succeeded(&env));

    let response = last_response(&env).expect("a response");
    assert_eq!(response.session(), Some(session));
    assert!(response.legs().iter().all(|leg| leg.in_session));
    Ok(())
}

#[test]
fn pivot_from_the_session_end() -> anyhow::Result<()> {
    let mut env = closed()?;
    let session = tunnel(&mut env)?;
    send(&mut env, RequestSpec::new(ip("10.0.1.3"), "ssh", echo()).with_session(session))?;
    run(&mut env)?;
    assert!(succeeded(&env));

    let request = env
        .messages()
        .iter()
        .find(|record| record.node == "other")
        .expect("the request reached other");
    assert_eq!(request.src_ip, Some(ip("10.0.0.2")));
    assert_eq!(request.hops, 4);

    let response = last_response(&env).expect("a response");
    let hops: Vec<&str> = response.path().map(|hop| hop.dst.node.as_str()).collect();
    assert_eq!(hops, ["r", "target", "r", ATTACKER]);
    assert_eq!(response.non_session_path().count(), 2);
    Ok(())
}

#[test]
fn create_session_action() -> anyhow::Result<()> {
    let mut env = two_subnets(EnvironmentConfig::default())?;
    open_firewall(&mut env)?;
    let action = Action::new("cyst:network:create_session");
    send(&mut env, RequestSpec::new(ip("10.0.1.2"), "ssh", action))?;
    run(&mut env)?;

    assert!(succeeded(&env));
    let session = last_response(&env)
        .and_then(|response| response.session())
        .expect("the response carries the session");
    assert_eq!(
        last_response(&env).and_then(|response| response.content()),
        Some(session.to_string().as_str())
    );
    let created = env.sessions().get(session).expect("session exists");
    assert_eq!(created.owner(), SCANNER);
    assert_eq!(created.start().node, ATTACKER);
    assert_eq!(created.end().node, "target");

    // the session keeps working once the firewall closes
    env.set_firewall("r", Firewall::new(FirewallPolicy::Deny))?;
    send(&mut env, RequestSpec::new(ip("10.0.1.2"), "ssh", echo()).with_session(session))?;
    env.run();
    assert!(succeeded(&env));
    Ok(())
}

#[test]
fn nested_session_from_a_pivot() -> anyhow::Result<()> {
    let mut env = closed()?;
    let outer = tunnel(&mut env)?;
    let action = Action::new("cyst:network:create_session");
    send(&mut env, RequestSpec::new(ip("10.0.1.3"), "ssh", action).with_session(outer))?;
    run(&mut env)?;

    let inner = last_response(&env)
        .and_then(|response| response.session())
        .expect("a nested session");
    assert_ne!(inner, outer);
    let sessions = env.sessions();
    assert_eq!(sessions.get(inner).and_then(|s| s.parent()), Some(outer));
    assert_eq!(sessions.start(inner)?.node, ATTACKER);
    assert_eq!(sessions.end(inner)?.node, "other");
    assert_eq!(sessions.forward(inner)?.count(), 4);

    send(&mut env, RequestSpec::new(ip("10.0.1.3"), "ssh", echo()).with_session(inner))?;
    env.run();
    assert!(succeeded(&env));
    assert!(last_response(&env)
        .expect("a response")
        .legs()
        .iter()
        .all(|leg| leg.in_session));
    Ok(())
}

#[test]
fn deferred_reversed_session() -> anyhow::Result<()> {
    let mut env = closed()?;
    env.add_active_service("target", "agent", "root", ScriptedActor::new())?;
    let index = env.defer_session(SessionSpec::new("root", [ATTACKER, "r", "target"]).reversed());
    assert_eq!(env.deferred_session(index), None);
    env.init()?;

    let session = env.deferred_session(index).expect("created by init");
    assert_eq!(env.sessions().start(session)?.node, "target");

    let request = env.create_request(
        "target",
        "agent",
        RequestSpec::new(ip("10.0.0.2"), "ftp", echo()).with_session(session),
    );
    env.send_message(request, 0)?;
    env.run();

    let response = env
        .active_service::<ScriptedActor>("target", "agent")
        .and_then(ScriptedActor::last_response)
        .expect("a response");
    assert_eq!(
        response.status(),
        Some(status(StatusOrigin::Service, StatusValue::Success))
    );
    Ok(())
}

#[test]
fn sessions_work_from_either_end() -> anyhow::Result<()> {
    let mut env = closed()?;
    let session = tunnel(&mut env)?;
    env.add_active_service("target", "agent", "root", ScriptedActor::new())?;
    env.add_active_service("other", "agent", "root", ScriptedActor::new())?;

    let back = env.create_request(
        "target",
        "agent",
        RequestSpec::new(ip("10.0.0.2"), "ftp", echo()).with_session(session),
    );
    env.send_message(back, 0)?;

    let stray = env.create_request(
        "other",
        "agent",
        RequestSpec::new(ip("10.0.0.2"), "ftp", echo()).with_session(session),
    );
    assert!(matches!(
        env.send_message(stray, 0),
        Err(EnvironmentError::Messaging(MessagingError::SessionNotAnchored { .. }))
    ));

    run(&mut env)?;
    let response = env
        .active_service::<ScriptedActor>("target", "agent")
        .and_then(ScriptedActor::last_response)
        .expect("a response");
    assert_eq!(
        response.status(),
        Some(status(StatusOrigin::Service, StatusValue::Success))
    );
    Ok(())
}

#[test]
fn invalid_sessions() -> anyhow::Result<()> {
    let mut env = closed()?;
    assert!(matches!(
        env.create_session(SessionSpec::new(SCANNER, [ATTACKER, "target"])),
        Err(EnvironmentError::Session(SessionError::Disconnected(..)))
    ));
    assert!(matches!(
        env.create_session(SessionSpec::new(SCANNER, [ATTACKER])),
        Err(EnvironmentError::Session(SessionError::TooFewWaypoints))
    ));
    assert!(matches!(
        env.create_session(SessionSpec::new("", [ATTACKER, "r"])),
        Err(EnvironmentError::Session(SessionError::EmptyOwner))
    ));

    let outer = tunnel(&mut env)?;
    let foreign = SessionSpec::new("root", ["target", "r", "other"]).with_parent(outer);
    assert!(matches!(
        env.create_session(foreign),
        Err(EnvironmentError::Session(SessionError::OwnerMismatch { .. }))
    ));
    let detached = SessionSpec::new(SCANNER, ["other", "r"]).with_parent(outer);
    assert!(matches!(
        env.create_session(detached),
        Err(EnvironmentError::Session(SessionError::Discontinuous(..)))
    ));
    Ok(())
}

#[test]
fn appended_sessions() -> anyhow::Result<()> {
    let mut env = closed()?;
    let base = tunnel(&mut env)?;
    let extension = env.create_session(SessionSpec::new(SCANNER, ["target", "r", "other"]))?;
    let joined = env.append_session(base, extension)?;

    assert_eq!(env.sessions().start(joined)?.node, ATTACKER);
    assert_eq!(env.sessions().end(joined)?.node, "other");
    let reversed: Vec<String> = env
        .sessions()
        .reverse(joined)?
        .map(|hop| hop.dst.node.clone())
        .collect();
    assert_eq!(reversed, ["r", "target", "r", ATTACKER]);
    Ok(())
}
