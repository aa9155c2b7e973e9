//! Services hosted by nodes.
//!
//! Passive services are descriptors whose behavior comes from a behavioral
//! model. Active services carry their own logic and implement
//! [`ActiveService`].

use crate::{
    access::AccessLevel,
    environment::ServiceContext,
    message::{Message, RequestSpec},
};
use std::{any::Any, collections::VecDeque};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassiveService {
    pub version: String,
    /// Only reachable by requests sent from the node itself.
    pub local: bool,
    pub access_level: AccessLevel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceKind {
    Passive(PassiveService),
    Active,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Service {
    name: String,
    owner: String,
    kind: ServiceKind,
}

impl Service {
    pub fn passive(
        name: impl Into<String>,
        owner: impl Into<String>,
        version: impl Into<String>,
        access_level: AccessLevel,
    ) -> Self {
        Self {
            name: name.into(),
            owner: owner.into(),
            kind: ServiceKind::Passive(PassiveService {
                version: version.into(),
                local: false,
                access_level,
            }),
        }
    }

    /// Restricts a passive service to requests sent from its own node.
    pub fn with_local(mut self, local: bool) -> Self {
        if let ServiceKind::Passive(passive) = &mut self.kind {
            passive.local = local;
        }
        self
    }

    pub fn active(name: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            owner: owner.into(),
            kind: ServiceKind::Active,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn kind(&self) -> &ServiceKind {
        &self.kind
    }
}

/// Access to the concrete type behind a trait object.
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A service with its own behavior, e.g. an attacker or a shell.
pub trait ActiveService: AsAny {
    /// Called once, when the environment runs for the first time.
    fn run(&mut self, _ctx: &mut ServiceContext<'_>) {}

    /// Called for every message delivered to the service. Returns whether the
    /// message was handled and the time its processing took.
    fn process_message(&mut self, message: &Message, ctx: &mut ServiceContext<'_>) -> (bool, u64);
}

/// An active service driven from outside the simulation.
///
/// Queued requests go out when the simulation starts and whenever the actor
/// receives a timeout. Every response it receives is kept for inspection.
#[derive(Debug, Default)]
pub struct ScriptedActor {
    outbox: VecDeque<RequestSpec>,
    responses: Vec<Message>,
    timeouts: Vec<String>,
}

impl ScriptedActor {
    pub fn new() -> Self {
        Self::default()
    }

    /// An actor that sends `requests` when the simulation starts.
    pub fn with_script(requests: impl IntoIterator<Item = RequestSpec>) -> Self {
        Self {
            outbox: requests.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn queue(&mut self, request: RequestSpec) {
        self.outbox.push_back(request);
    }

    pub fn responses(&self) -> &[Message] {
        &self.responses
    }

    pub fn last_response(&self) -> Option<&Message> {
        self.responses.last()
    }

    /// Tags of the timeouts received so far.
    pub fn timeouts(&self) -> &[String] {
        &self.timeouts
    }

    fn flush(&mut self, ctx: &mut ServiceContext<'_>) {
        while let Some(spec) = self.outbox.pop_front() {
            let request = ctx.create_request(spec);
            if let Err(e) = ctx.send_message(request, 0) {
                tracing::warn!(node = ctx.node_id(), service = ctx.service(), "cannot send request: {}", e);
            }
        }
    }
}

impl ActiveService for ScriptedActor {
    fn run(&mut self, ctx: &mut ServiceContext<'_>) {
        self.flush(ctx);
    }

    fn process_message(&mut self, message: &Message, ctx: &mut ServiceContext<'_>) -> (bool, u64) {
        if let Some((tag, _, _)) = message.timeout_info() {
            self.timeouts.push(tag.to_string());
            self.flush(ctx);
            return (true, 0);
        }
        if message.is_response() {
            self.responses.push(message.clone());
            return (true, 0);
        }
        (false, 0)
    }
}
