//! Work and control arriving from outside the run loop.

mod common;

use common::*;
use cyst_core::{
    message::{RequestSpec, StatusOrigin, StatusValue},
    store::MemoryDataStore,
    EnvironmentConfig, EnvironmentState, ScriptedActor,
};

#[tokio::test]
async fn request_from_another_task() -> anyhow::Result<()> {
    let mut env = two_subnets(EnvironmentConfig::default())?;
    open_firewall(&mut env)?;
    env.init()?;

    let sender = env.external();
    let queued = tokio::spawn(async move {
        let spec = RequestSpec::new(ip("10.0.1.2"), "ssh", echo());
        sender.send_request(ATTACKER, SCANNER, spec, 2)
    })
    .await?;
    assert!(queued);

    assert_eq!(env.run(), (true, EnvironmentState::Finished));
    let response = last_response(&env).expect("a response");
    assert_eq!(
        response.status(),
        Some(status(StatusOrigin::Service, StatusValue::Success))
    );
    assert_eq!(env.current_time(), 5);
    Ok(())
}

#[tokio::test]
async fn wake_up_from_another_task() -> anyhow::Result<()> {
    let mut env = two_subnets(EnvironmentConfig::default())?;
    open_firewall(&mut env)?;
    env.init()?;
    env.run();

    // the scanner sends what it has queued when it wakes up
    env.active_service_mut::<ScriptedActor>(ATTACKER, SCANNER)
        .expect("scanner is installed")
        .queue(RequestSpec::new(ip("10.0.1.3"), "ssh", echo()));
    let sender = env.external();
    tokio::spawn(async move { sender.wake(ATTACKER, SCANNER, "tick", 10) }).await?;

    assert_eq!(env.run(), (true, EnvironmentState::Finished));
    let scanner = env
        .active_service::<ScriptedActor>(ATTACKER, SCANNER)
        .expect("scanner is installed");
    assert_eq!(scanner.timeouts(), ["tick"]);
    assert_eq!(scanner.responses().len(), 1);
    assert_eq!(env.current_time(), 13);
    Ok(())
}

#[tokio::test]
async fn state_changes_are_published() -> anyhow::Result<()> {
    let mut env = two_subnets(EnvironmentConfig::default())?;
    let mut handle = env.control();
    let watcher = tokio::spawn(async move {
        let mut seen = Vec::new();
        while let Some(state) = handle.changed().await {
            seen.push(state);
            if state == EnvironmentState::Finished {
                break;
            }
        }
        seen
    });

    env.init()?;
    env.run();
    let seen = watcher.await?;
    assert_eq!(seen.last(), Some(&EnvironmentState::Finished));
    Ok(())
}

#[test]
fn senders_outliving_the_environment() -> anyhow::Result<()> {
    let env = two_subnets(EnvironmentConfig::default())?;
    let sender = env.external();
    let handle = env.control();
    drop(env);

    let spec = RequestSpec::new(ip("10.0.1.2"), "ssh", echo());
    assert!(!sender.send_request(ATTACKER, SCANNER, spec, 0));
    assert_eq!(handle.state(), EnvironmentState::Init);
    Ok(())
}

#[test]
fn commit_writes_new_records_once() -> anyhow::Result<()> {
    let mut env = two_subnets(EnvironmentConfig::default().with_run_id("commit"))?;
    open_firewall(&mut env)?;
    send(&mut env, RequestSpec::new(ip("10.0.1.2"), "ssh", echo()))?;
    run(&mut env)?;

    let mut store = MemoryDataStore::new();
    env.commit(&mut store)?;
    env.commit(&mut store)?;

    assert_eq!(store.messages().len(), 2);
    let statistics = store.statistics().last().expect("statistics were written");
    assert_eq!(statistics.run_id, "commit");
    assert_eq!(statistics.end_time_virtual, 3);
    assert_eq!(statistics.messages, 2);
    Ok(())
}
