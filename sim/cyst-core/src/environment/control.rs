//! Handles for steering an environment from outside its run loop.
//!
//! Signals travel over an unbounded channel and are drained by the run loop
//! between batches, so the loop itself stays single threaded.

use crate::message::RequestSpec;
use std::fmt;
use tokio::sync::{mpsc, watch};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnvironmentState {
    Init,
    Running,
    Paused,
    Finished,
    Terminated,
}

impl fmt::Display for EnvironmentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EnvironmentState::Init => "INIT",
            EnvironmentState::Running => "RUNNING",
            EnvironmentState::Paused => "PAUSED",
            EnvironmentState::Finished => "FINISHED",
            EnvironmentState::Terminated => "TERMINATED",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub(crate) enum Signal {
    Pause,
    Terminate,
    Request {
        node: String,
        service: String,
        spec: RequestSpec,
        delay: u64,
    },
    Wake {
        node: String,
        service: String,
        tag: String,
        delay: u64,
    },
}

/// Lets other threads or tasks pause or terminate a running environment.
#[derive(Debug, Clone)]
pub struct ControlHandle {
    state: watch::Receiver<EnvironmentState>,
    signals: mpsc::UnboundedSender<Signal>,
}

impl ControlHandle {
    pub(crate) fn new(
        state: watch::Receiver<EnvironmentState>,
        signals: mpsc::UnboundedSender<Signal>,
    ) -> Self {
        Self { state, signals }
    }

    pub fn state(&self) -> EnvironmentState {
        *self.state.borrow()
    }

    /// Asks a running environment to pause after the current step.
    pub fn pause(&self) -> (bool, EnvironmentState) {
        self.request(Signal::Pause)
    }

    /// Asks a running environment to stop and drop its pending messages.
    pub fn terminate(&self) -> (bool, EnvironmentState) {
        self.request(Signal::Terminate)
    }

    fn request(&self, signal: Signal) -> (bool, EnvironmentState) {
        let state = self.state();
        if state != EnvironmentState::Running {
            return (false, state);
        }
        (self.signals.send(signal).is_ok(), state)
    }

    /// Waits until the published state changes.
    pub async fn changed(&mut self) -> Option<EnvironmentState> {
        self.state.changed().await.ok()?;
        Some(self.state())
    }
}

/// Injects work into an environment once an outside operation completes.
#[derive(Debug, Clone)]
pub struct ExternalSender {
    signals: mpsc::UnboundedSender<Signal>,
}

impl ExternalSender {
    pub(crate) fn new(signals: mpsc::UnboundedSender<Signal>) -> Self {
        Self { signals }
    }

    /// Queues a request sent on behalf of `service` at `node`. Returns
    /// `false` once the environment is gone.
    pub fn send_request(
        &self,
        node: impl Into<String>,
        service: impl Into<String>,
        spec: RequestSpec,
        delay: u64,
    ) -> bool {
        self.signals
            .send(Signal::Request {
                node: node.into(),
                service: service.into(),
                spec,
                delay,
            })
            .is_ok()
    }

    /// Wakes an active service with a timeout tagged `tag`.
    pub fn wake(
        &self,
        node: impl Into<String>,
        service: impl Into<String>,
        tag: impl Into<String>,
        delay: u64,
    ) -> bool {
        self.signals
            .send(Signal::Wake {
                node: node.into(),
                service: service.into(),
                tag: tag.into(),
                delay,
            })
            .is_ok()
    }
}
