//! Run loop ordering and its state machine.

mod common;

use common::*;
use cyst_core::{
    environment::{ControlHandle, ServiceContext},
    message::{Message, RequestSpec},
    ActiveService, Environment, EnvironmentConfig, EnvironmentState, Node, ScriptedActor,
};

/// Wakes itself up at fixed delays and records when it was woken.
#[derive(Default)]
struct Ticker {
    schedule: Vec<(u64, &'static str)>,
    /// Delay of one more timeout, scheduled when the first one fires.
    rearm: Option<u64>,
    woken: Vec<(u64, String)>,
}

impl ActiveService for Ticker {
    fn run(&mut self, ctx: &mut ServiceContext<'_>) {
        for (delay, tag) in &self.schedule {
            ctx.schedule_timeout(*delay, *tag);
        }
    }

    fn process_message(&mut self, message: &Message, ctx: &mut ServiceContext<'_>) -> (bool, u64) {
        match message.timeout_info() {
            Some((tag, _, _)) => {
                self.woken.push((ctx.current_time(), tag.to_string()));
                if let Some(delay) = self.rearm.take() {
                    ctx.schedule_timeout(delay, "rearmed");
                }
                (true, 0)
            }
            None => (false, 0),
        }
    }
}

enum Interrupt {
    Pause,
    Terminate,
    Remote(ControlHandle),
}

/// Interrupts the run on every timeout it receives.
struct Interrupter {
    interrupt: Interrupt,
    delays: Vec<u64>,
}

impl ActiveService for Interrupter {
    fn run(&mut self, ctx: &mut ServiceContext<'_>) {
        for delay in &self.delays {
            ctx.schedule_timeout(*delay, "interrupt");
        }
    }

    fn process_message(&mut self, _message: &Message, ctx: &mut ServiceContext<'_>) -> (bool, u64) {
        match &self.interrupt {
            Interrupt::Pause => ctx.pause(),
            Interrupt::Terminate => ctx.terminate(),
            Interrupt::Remote(handle) => {
                let (sent, state) = handle.pause();
                assert!(sent);
                assert_eq!(state, EnvironmentState::Running);
            }
        }
        (true, 0)
    }
}

fn single_node() -> anyhow::Result<Environment> {
    let mut env = Environment::create(EnvironmentConfig::default());
    env.add_node(Node::new("host").with_interface(ip("10.0.0.2"), 24)?)?;
    Ok(env)
}

fn interrupted(interrupt: Interrupt, delays: Vec<u64>) -> anyhow::Result<Environment> {
    let mut env = single_node()?;
    env.add_active_service("host", "clock", "root", Interrupter { interrupt, delays })?;
    env.init()?;
    Ok(env)
}

#[test]
fn lifecycle() -> anyhow::Result<()> {
    let mut env = single_node()?;
    assert_eq!(env.state(), EnvironmentState::Init);
    assert_eq!(env.run(), (false, EnvironmentState::Init));
    assert_eq!(env.pause(), (false, EnvironmentState::Init));

    assert_eq!(env.init()?, (true, EnvironmentState::Paused));
    assert_eq!(env.init()?, (true, EnvironmentState::Paused));
    assert_eq!(env.control().pause(), (false, EnvironmentState::Paused));

    assert_eq!(env.run(), (true, EnvironmentState::Finished));
    assert_eq!(env.run(), (true, EnvironmentState::Finished));
    assert_eq!(env.terminate(), (false, EnvironmentState::Finished));
    assert_eq!(env.control().state(), EnvironmentState::Finished);
    Ok(())
}

#[test]
fn terminate_needs_a_running_environment() -> anyhow::Result<()> {
    let mut env = single_node()?;
    assert_eq!(env.terminate(), (false, EnvironmentState::Init));
    env.init()?;
    assert_eq!(env.terminate(), (false, EnvironmentState::Paused));
    assert_eq!(env.control().terminate(), (false, EnvironmentState::Paused));
    assert_eq!(env.run(), (true, EnvironmentState::Finished));
    Ok(())
}

#[test]
#[tracing_test::traced_test]
fn timeouts_in_time_then_insertion_order() -> anyhow::Result<()> {
    let mut env = single_node()?;
    let ticker = Ticker {
        schedule: vec![(5, "a"), (1, "b"), (3, "c"), (1, "d")],
        ..Ticker::default()
    };
    env.add_active_service("host", "ticker", "root", ticker)?;
    run(&mut env)?;

    let woken = &env
        .active_service::<Ticker>("host", "ticker")
        .expect("ticker is installed")
        .woken;
    let expected = [(1, "b"), (1, "d"), (3, "c"), (5, "a")];
    assert_eq!(woken.len(), expected.len());
    for ((time, tag), (expected_time, expected_tag)) in woken.iter().zip(expected) {
        assert_eq!((*time, tag.as_str()), (expected_time, expected_tag));
    }
    assert_eq!(env.current_time(), 5);
    Ok(())
}

#[test]
fn timeouts_past_the_end_of_time_saturate() -> anyhow::Result<()> {
    let mut env = single_node()?;
    let ticker = Ticker {
        schedule: vec![(7, "first")],
        rearm: Some(u64::MAX),
        ..Ticker::default()
    };
    env.add_active_service("host", "ticker", "root", ticker)?;
    run(&mut env)?;

    let woken = &env
        .active_service::<Ticker>("host", "ticker")
        .expect("ticker is installed")
        .woken;
    assert_eq!(woken.len(), 2);
    assert_eq!((woken[0].0, woken[0].1.as_str()), (7, "first"));
    assert_eq!((woken[1].0, woken[1].1.as_str()), (u64::MAX, "rearmed"));
    assert_eq!(env.state(), EnvironmentState::Finished);
    Ok(())
}

#[test]
fn pause_on_request() -> anyhow::Result<()> {
    let mut env = two_subnets(EnvironmentConfig::default())?;
    open_firewall(&mut env)?;
    env.active_service_mut::<ScriptedActor>(ATTACKER, SCANNER)
        .expect("scanner is installed")
        .queue(RequestSpec::new(ip("10.0.1.2"), "ssh", echo()));
    env.add_pause_on_request("attacker.scanner");
    env.init()?;

    assert_eq!(env.run(), (true, EnvironmentState::Paused));
    assert_eq!(env.pending(), 1);
    assert!(env.messages().is_empty());

    assert_eq!(env.run(), (true, EnvironmentState::Finished));
    assert_eq!(responses(&env).len(), 1);
    assert!(env.remove_pause_on_request("attacker.scanner"));
    assert!(!env.remove_pause_on_request("attacker.scanner"));
    Ok(())
}

#[test]
fn pause_on_response_steps_through_a_batch() -> anyhow::Result<()> {
    let mut env = two_subnets(EnvironmentConfig::default())?;
    open_firewall(&mut env)?;
    send(&mut env, RequestSpec::new(ip("10.0.1.2"), "ssh", echo()))?;
    send(&mut env, RequestSpec::new(ip("10.0.1.3"), "ssh", echo()))?;
    env.add_pause_on_response("attacker.scanner");
    env.init()?;

    // both responses arrive at the same time
    assert_eq!(env.run(), (true, EnvironmentState::Paused));
    assert_eq!(responses(&env).len(), 1);
    assert_eq!(env.pending(), 1);
    assert_eq!(env.current_time(), 3);

    assert_eq!(env.run(), (true, EnvironmentState::Paused));
    assert_eq!(responses(&env).len(), 2);
    assert_eq!(env.pending(), 0);
    assert_eq!(env.current_time(), 3);

    assert_eq!(env.run(), (true, EnvironmentState::Finished));
    Ok(())
}

#[test]
fn pause_from_a_service() -> anyhow::Result<()> {
    let mut env = interrupted(Interrupt::Pause, vec![1, 2])?;
    assert_eq!(env.run(), (true, EnvironmentState::Paused));
    assert_eq!((env.current_time(), env.pending()), (1, 1));
    assert_eq!(env.run(), (true, EnvironmentState::Paused));
    assert_eq!((env.current_time(), env.pending()), (2, 0));
    assert_eq!(env.run(), (true, EnvironmentState::Finished));
    Ok(())
}

#[test]
fn pause_through_a_control_handle() -> anyhow::Result<()> {
    let mut env = single_node()?;
    let handle = env.control();
    env.add_active_service(
        "host",
        "clock",
        "root",
        Interrupter {
            interrupt: Interrupt::Remote(handle),
            delays: vec![4, 9],
        },
    )?;
    env.init()?;

    assert_eq!(env.run(), (true, EnvironmentState::Paused));
    assert_eq!((env.current_time(), env.pending()), (4, 1));
    assert_eq!(env.run(), (true, EnvironmentState::Paused));
    assert_eq!(env.run(), (true, EnvironmentState::Finished));
    assert_eq!(env.current_time(), 9);
    Ok(())
}

#[test]
fn terminate_from_a_service() -> anyhow::Result<()> {
    let mut env = interrupted(Interrupt::Terminate, vec![3, 7])?;
    assert_eq!(env.run(), (true, EnvironmentState::Terminated));
    assert_eq!(env.pending(), 0);
    assert_eq!(env.current_time(), 0);
    assert_eq!(env.run(), (false, EnvironmentState::Terminated));
    Ok(())
}

#[test]
fn finished_environment_runs_again() -> anyhow::Result<()> {
    let mut env = two_subnets(EnvironmentConfig::default())?;
    open_firewall(&mut env)?;
    run(&mut env)?;
    assert_eq!(env.state(), EnvironmentState::Finished);

    send(&mut env, RequestSpec::new(ip("10.0.1.2"), "ssh", echo()))?;
    assert_eq!(env.run(), (true, EnvironmentState::Finished));
    assert_eq!(responses(&env).len(), 1);

    let times: Vec<u64> = env.messages().iter().map(|record| record.time).collect();
    assert!(times.windows(2).all(|pair| pair[0] <= pair[1]));
    Ok(())
}
