//! Addressing and transmission of messages, and the context handed to
//! services.

use super::{control::EnvironmentState, queue::TaskQueue, EnvironmentConfig};
use crate::{
    access::{Access, Policy},
    id::Counter,
    ip::Ipv4Address,
    logging,
    message::{Message, MessageId, RequestSpec, Status, StatusOrigin, StatusValue, Time},
    session::{SessionError, SessionId, Sessions},
    store::MessageRecord,
    topology::{router::BLOCKED_BY_FIREWALL, FirewallChainType, Hop, Network, Node},
};
use rustc_hash::FxHashSet;
use tokio::sync::watch;

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum MessagingError {
    #[error("Message {0} was already sent")]
    AlreadySent(MessageId),
    #[error("Unknown origin node {0}")]
    UnknownNode(String),
    #[error("Node {node} has no interface able to reach {dst}")]
    NoRoute { node: String, dst: Ipv4Address },
    #[error("{session} neither starts nor ends at node {node}")]
    SessionNotAnchored { session: SessionId, node: String },
    #[error("Message {0} has nowhere to go")]
    NoNextHop(MessageId),
    #[error(transparent)]
    Session(#[from] SessionError),
}

pub const CONNECTION_BLOCKED: &str = "Connection blocked";

/// A session described by the nodes it passes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSpec {
    pub owner: String,
    pub waypoints: Vec<String>,
    pub parent: Option<SessionId>,
    /// Orients the session from the last waypoint back to the first.
    pub reverse: bool,
}

impl SessionSpec {
    pub fn new<I, S>(owner: impl Into<String>, waypoints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            owner: owner.into(),
            waypoints: waypoints.into_iter().map(Into::into).collect(),
            parent: None,
            reverse: false,
        }
    }

    pub fn with_parent(mut self, parent: SessionId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn reversed(mut self) -> Self {
        self.reverse = true;
        self
    }
}

/// Everything of an environment except its services and models, so that
/// those can be handed a mutable view of it.
#[derive(Debug)]
pub(crate) struct Core {
    pub(crate) config: EnvironmentConfig,
    pub(crate) state: EnvironmentState,
    state_tx: watch::Sender<EnvironmentState>,
    pub(crate) clock: Time,
    /// Latest time any batch ran at; survives termination.
    pub(crate) horizon: Time,
    pub(crate) queue: TaskQueue,
    pub(crate) counter: Counter,
    pub(crate) network: Network,
    pub(crate) sessions: Sessions,
    pub(crate) access: Access,
    pub(crate) pause_on_request: FxHashSet<String>,
    pub(crate) pause_on_response: FxHashSet<String>,
    pub(crate) pause_requested: bool,
    pub(crate) terminate_requested: bool,
    pub(crate) records: Vec<MessageRecord>,
}

impl Core {
    pub(crate) fn new(config: EnvironmentConfig, state_tx: watch::Sender<EnvironmentState>) -> Self {
        let access = Access::new(config.seed);
        Self {
            config,
            state: EnvironmentState::Init,
            state_tx,
            clock: 0,
            horizon: 0,
            queue: TaskQueue::new(),
            counter: Counter::new(),
            network: Network::new(),
            sessions: Sessions::new(),
            access,
            pause_on_request: FxHashSet::default(),
            pause_on_response: FxHashSet::default(),
            pause_requested: false,
            terminate_requested: false,
            records: Vec::new(),
        }
    }

    pub(crate) fn set_state(&mut self, state: EnvironmentState) {
        logging::state_event(self.state, state);
        self.state = state;
        self.state_tx.send_replace(state);
    }

    pub(crate) fn create_request(&mut self, node: &str, service: &str, spec: RequestSpec) -> Message {
        Message::request(self.counter.next_id(), node, service, spec, self.config.max_ttl)
    }

    pub(crate) fn create_response(
        &self,
        request: &Message,
        status: Status,
        content: Option<String>,
    ) -> Message {
        Message::response_to(request, status, content, self.config.max_ttl)
    }

    pub(crate) fn schedule_timeout(&mut self, node: &str, service: &str, tag: String, delay: u64) {
        let timeout = Message::timeout(self.counter.next_id(), node, service, tag, self.clock, delay);
        self.queue.push(self.clock.saturating_add(delay), timeout);
    }

    /// Sends a message created by a service or from outside.
    pub(crate) fn send(&mut self, mut message: Message, delay: u64) -> Result<(), MessagingError> {
        if message.sent() {
            return Err(MessagingError::AlreadySent(message.id()));
        }
        if message.is_request() {
            self.address(&mut message)?;
            let key = format!("{}.{}", message.origin_node(), message.src_service());
            if self.pause_on_request.contains(&key) {
                self.pause_requested = true;
            }
            if let Some(cost) = self.blocked_on_output(&message) {
                let node = message.origin_node().to_string();
                message.retract_hop();
                message.mark_sent();
                self.reject(&node, &message, BLOCKED_BY_FIREWALL, delay.saturating_add(cost));
                return Ok(());
            }
        } else if !message.advance_planned() {
            message.deliver_locally();
        }
        message.mark_sent();
        self.transmit(message, delay);
        Ok(())
    }

    /// Resolves the origin and the first hop of a request.
    fn address(&self, message: &mut Message) -> Result<(), MessagingError> {
        let node = self
            .network
            .node(message.origin_node())
            .ok_or_else(|| MessagingError::UnknownNode(message.origin_node().to_string()))?;

        if let Some(session) = message.session() {
            let hops: Vec<Hop> = if self.sessions.start(session)?.node == node.id() {
                self.sessions.forward(session)?.cloned().collect()
            } else if self.sessions.end(session)?.node == node.id() {
                self.sessions.reverse(session)?.collect()
            } else {
                return Err(MessagingError::SessionNotAnchored {
                    session,
                    node: node.id().to_string(),
                });
            };
            message.set_origin(hops[0].src.clone());
            message.plan_session(hops);
            message.advance_planned();
            return Ok(());
        }

        let Some(dst) = message.dst_ip() else {
            return Err(MessagingError::NoNextHop(message.id()));
        };
        if let Some(port) = node.port_with_ip(dst) {
            message.set_origin(node.endpoint(port));
            message.deliver_locally();
            return Ok(());
        }
        let hop = node.route_to(dst).ok_or_else(|| MessagingError::NoRoute {
            node: node.id().to_string(),
            dst,
        })?;
        message.set_origin(hop.src.clone());
        message.set_next_hop(hop.src, hop.dst);
        Ok(())
    }

    /// Returns the firewall time spent when the Output chain of a router
    /// refuses a request it originates. Session traffic and requests for the
    /// router itself are not filtered.
    fn blocked_on_output(&self, message: &Message) -> Option<u64> {
        if message.session().is_some() || message.next_hop() == message.current() {
            return None;
        }
        let router = self.network.node(message.origin_node())?.as_router()?;
        match router.admits(FirewallChainType::Output, message) {
            (false, cost) => Some(cost),
            (true, _) => None,
        }
    }

    /// Queues a message for its next hop, applying the attributes of the
    /// link it crosses.
    pub(crate) fn transmit(&mut self, mut message: Message, delay: u64) {
        let (Some(current), Some(next)) = (message.current(), message.next_hop()) else {
            tracing::warn!(message_id = message.id().into_inner(), "message has no next hop");
            return;
        };
        let mut link_delay = 0;
        if current.node != next.node {
            let crossing = message
                .legs()
                .last()
                .and_then(|leg| self.network.connection_at(&leg.hop.src.node, leg.hop.src.port));
            if let Some(connection) = crossing {
                if connection.is_blocked() {
                    let node = current.node.clone();
                    if message.is_request() {
                        message.retract_hop();
                        self.reject(&node, &message, CONNECTION_BLOCKED, delay);
                    } else {
                        logging::drop_event(self.clock, &node, &message, CONNECTION_BLOCKED);
                    }
                    return;
                }
                link_delay = connection.delay();
            }
        }
        let time = self.clock.saturating_add(delay).saturating_add(link_delay);
        self.queue.push(time, message);
    }

    /// Answers a request with a network failure at `node`.
    pub(crate) fn reject(&mut self, node: &str, request: &Message, reason: &str, delay: u64) {
        logging::rejection_event(self.clock, node, request, reason);
        let status = Status::new(StatusOrigin::Network, StatusValue::Failure);
        self.respond(request, status, reason.to_string(), delay);
    }

    /// Sends a response to `request`. Responses are never answered.
    pub(crate) fn respond(&mut self, request: &Message, status: Status, content: String, delay: u64) {
        if !request.is_request() {
            return;
        }
        let response = self.create_response(request, status, Some(content));
        if let Err(e) = self.send(response, delay) {
            tracing::warn!(message_id = request.id().into_inner(), "cannot answer request: {}", e);
        }
    }

    pub(crate) fn create_session(&mut self, spec: &SessionSpec) -> Result<SessionId, SessionError> {
        if spec.waypoints.len() < 2 {
            return Err(SessionError::TooFewWaypoints);
        }
        let mut waypoints: Vec<&str> = spec.waypoints.iter().map(String::as_str).collect();
        if spec.reverse {
            waypoints.reverse();
        }
        let hops = waypoints
            .windows(2)
            .map(|pair| {
                self.network
                    .connection_between(pair[0], pair[1])
                    .and_then(|connection| connection.hop_from(pair[0]))
                    .ok_or_else(|| SessionError::Disconnected(pair[0].to_string(), pair[1].to_string()))
            })
            .collect::<Result<Vec<Hop>, SessionError>>()?;
        self.sessions.create(spec.owner.clone(), hops, spec.parent)
    }

    /// Opens a session along the hops `message` took outside of sessions,
    /// nested in the session it used.
    pub(crate) fn create_session_from_message(
        &mut self,
        message: &Message,
    ) -> Result<SessionId, SessionError> {
        let owner = message
            .auth()
            .map(|auth| auth.identity().to_string())
            .unwrap_or_else(|| message.src_service().to_string());
        let hops: Vec<Hop> = message.non_session_path().cloned().collect();
        self.sessions.create(owner, hops, message.session())
    }

    pub(crate) fn record(&mut self, node: &str, message: &Message) {
        self.records.push(MessageRecord::new(self.clock, node, message));
    }
}

/// The view of the environment a service or behavioral model works with.
pub struct ServiceContext<'a> {
    core: &'a mut Core,
    node: String,
    service: String,
}

impl<'a> ServiceContext<'a> {
    pub(crate) fn new(core: &'a mut Core, node: &str, service: &str) -> Self {
        Self {
            core,
            node: node.to_string(),
            service: service.to_string(),
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// The node the service runs on.
    pub fn node(&self) -> Option<&Node> {
        self.core.network.node(&self.node)
    }

    pub fn network(&self) -> &Network {
        &self.core.network
    }

    pub fn sessions(&self) -> &Sessions {
        &self.core.sessions
    }

    pub fn policy(&self) -> &Policy {
        self.core.access.policy()
    }

    pub fn current_time(&self) -> Time {
        self.core.clock
    }

    /// A request from this service.
    pub fn create_request(&mut self, spec: RequestSpec) -> Message {
        self.core.create_request(&self.node, &self.service, spec)
    }

    pub fn create_response(
        &self,
        request: &Message,
        status: Status,
        content: Option<String>,
    ) -> Message {
        self.core.create_response(request, status, content)
    }

    pub fn send_message(&mut self, message: Message, delay: u64) -> Result<(), MessagingError> {
        self.core.send(message, delay)
    }

    /// Delivers a timeout tagged `tag` to this service after `delay`.
    pub fn schedule_timeout(&mut self, delay: u64, tag: impl Into<String>) {
        self.core
            .schedule_timeout(&self.node, &self.service, tag.into(), delay);
    }

    pub fn create_session_from_message(
        &mut self,
        message: &Message,
    ) -> Result<SessionId, SessionError> {
        self.core.create_session_from_message(message)
    }

    /// Pauses the run loop after the current message.
    pub fn pause(&mut self) {
        self.core.pause_requested = true;
    }

    /// Terminates the run loop after the current message.
    pub fn terminate(&mut self) {
        self.core.terminate_requested = true;
    }
}
