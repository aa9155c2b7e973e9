//! Messages exchanged between services.
//!
//! A message records every hop it has taken. Hops are either planned (a
//! session being traversed, or the way back of a response) or chosen on the
//! fly by the nodes it passes.

mod action;
mod status;

pub use action::Action;
pub use status::{Status, StatusOrigin, StatusValue};

pub use crate::id::MessageId;
use crate::{
    access::Authorization,
    ip::Ipv4Address,
    session::SessionId,
    topology::{Endpoint, Hop},
};
use std::{collections::VecDeque, fmt};

/// Virtual time.
pub type Time = u64;

pub const DEFAULT_TTL: u8 = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Request,
    Response,
    Timeout,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageKind::Request => "Request",
            MessageKind::Response => "Response",
            MessageKind::Timeout => "Timeout",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Body {
    Request {
        action: Action,
    },
    Response {
        status: Status,
        content: Option<String>,
    },
    Timeout {
        tag: String,
        start_time: Time,
        duration: u64,
    },
}

/// A traversed or planned hop. Session legs are passed through without
/// routing decisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leg {
    pub hop: Hop,
    pub in_session: bool,
}

/// What a service needs to describe a request; the environment fills in the
/// origin and the id.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSpec {
    pub dst_ip: Ipv4Address,
    pub dst_service: String,
    pub action: Action,
    pub session: Option<SessionId>,
    pub auth: Option<Authorization>,
}

impl RequestSpec {
    pub fn new(dst_ip: Ipv4Address, dst_service: impl Into<String>, action: Action) -> Self {
        Self {
            dst_ip,
            dst_service: dst_service.into(),
            action,
            session: None,
            auth: None,
        }
    }

    pub fn with_session(mut self, session: SessionId) -> Self {
        self.session = Some(session);
        self
    }

    pub fn with_auth(mut self, auth: Authorization) -> Self {
        self.auth = Some(auth);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    id: MessageId,
    body: Body,
    origin_node: String,
    origin: Option<Endpoint>,
    src_ip: Option<Ipv4Address>,
    dst_ip: Option<Ipv4Address>,
    src_service: String,
    dst_service: String,
    session: Option<SessionId>,
    auth: Option<Authorization>,
    current: Option<Endpoint>,
    next_hop: Option<Endpoint>,
    path: Vec<Leg>,
    plan: VecDeque<Leg>,
    ttl: u8,
    sent: bool,
}

impl Message {
    pub(crate) fn request(
        id: MessageId,
        node: impl Into<String>,
        src_service: impl Into<String>,
        spec: RequestSpec,
        ttl: u8,
    ) -> Self {
        Self {
            id,
            body: Body::Request {
                action: spec.action,
            },
            origin_node: node.into(),
            origin: None,
            src_ip: None,
            dst_ip: Some(spec.dst_ip),
            src_service: src_service.into(),
            dst_service: spec.dst_service,
            session: spec.session,
            auth: spec.auth,
            current: None,
            next_hop: None,
            path: Vec::new(),
            plan: VecDeque::new(),
            ttl,
            sent: false,
        }
    }

    /// Builds the answer to `request` at the node the request currently sits
    /// on. The answer retraces the recorded path of the request.
    pub(crate) fn response_to(
        request: &Message,
        status: Status,
        content: Option<String>,
        ttl: u8,
    ) -> Self {
        let plan = request
            .path
            .iter()
            .rev()
            .map(|leg| Leg {
                hop: leg.hop.swap(),
                in_session: leg.in_session,
            })
            .collect();
        let origin_node = request
            .current
            .as_ref()
            .map_or_else(|| request.origin_node.clone(), |endpoint| endpoint.node.clone());
        Self {
            id: request.id,
            body: Body::Response { status, content },
            origin_node,
            origin: request.current.clone(),
            src_ip: request.dst_ip,
            dst_ip: request.src_ip,
            src_service: request.dst_service.clone(),
            dst_service: request.src_service.clone(),
            session: request.session,
            auth: request.auth.clone(),
            current: request.current.clone(),
            next_hop: None,
            path: Vec::new(),
            plan,
            ttl,
            sent: false,
        }
    }

    /// A wake-up delivered straight to `service` at `node`.
    pub(crate) fn timeout(
        id: MessageId,
        node: impl Into<String>,
        service: impl Into<String>,
        tag: impl Into<String>,
        start_time: Time,
        duration: u64,
    ) -> Self {
        let node = node.into();
        let service = service.into();
        Self {
            id,
            body: Body::Timeout {
                tag: tag.into(),
                start_time,
                duration,
            },
            origin_node: node,
            origin: None,
            src_ip: None,
            dst_ip: None,
            src_service: service.clone(),
            dst_service: service,
            session: None,
            auth: None,
            current: None,
            next_hop: None,
            path: Vec::new(),
            plan: VecDeque::new(),
            ttl: 0,
            sent: true,
        }
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn kind(&self) -> MessageKind {
        match self.body {
            Body::Request { .. } => MessageKind::Request,
            Body::Response { .. } => MessageKind::Response,
            Body::Timeout { .. } => MessageKind::Timeout,
        }
    }

    pub fn is_request(&self) -> bool {
        matches!(self.body, Body::Request { .. })
    }

    pub fn is_response(&self) -> bool {
        matches!(self.body, Body::Response { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.body, Body::Timeout { .. })
    }

    pub fn action(&self) -> Option<&Action> {
        match &self.body {
            Body::Request { action } => Some(action),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<Status> {
        match &self.body {
            Body::Response { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn content(&self) -> Option<&str> {
        match &self.body {
            Body::Response { content, .. } => content.as_deref(),
            _ => None,
        }
    }

    /// Tag, start time and duration of a timeout.
    pub fn timeout_info(&self) -> Option<(&str, Time, u64)> {
        match &self.body {
            Body::Timeout {
                tag,
                start_time,
                duration,
            } => Some((tag, *start_time, *duration)),
            _ => None,
        }
    }

    /// The node the message was created at.
    pub fn origin_node(&self) -> &str {
        &self.origin_node
    }

    /// The port the message left its origin through, once it was sent.
    pub fn origin(&self) -> Option<&Endpoint> {
        self.origin.as_ref()
    }

    pub fn src_ip(&self) -> Option<Ipv4Address> {
        self.src_ip
    }

    pub fn dst_ip(&self) -> Option<Ipv4Address> {
        self.dst_ip
    }

    pub fn src_service(&self) -> &str {
        &self.src_service
    }

    pub fn dst_service(&self) -> &str {
        &self.dst_service
    }

    pub fn session(&self) -> Option<SessionId> {
        self.session
    }

    /// Hands a session to the receiver of a response. Does not change the
    /// way the message travels.
    pub fn set_session(&mut self, session: Option<SessionId>) {
        self.session = session;
    }

    pub fn auth(&self) -> Option<&Authorization> {
        self.auth.as_ref()
    }

    pub fn set_auth(&mut self, auth: Option<Authorization>) {
        self.auth = auth;
    }

    pub fn current(&self) -> Option<&Endpoint> {
        self.current.as_ref()
    }

    pub fn next_hop(&self) -> Option<&Endpoint> {
        self.next_hop.as_ref()
    }

    pub fn ttl(&self) -> u8 {
        self.ttl
    }

    pub fn sent(&self) -> bool {
        self.sent
    }

    /// Every hop taken so far.
    pub fn path(&self) -> impl Iterator<Item = &Hop> {
        self.path.iter().map(|leg| &leg.hop)
    }

    /// Hops taken outside of any session.
    pub fn non_session_path(&self) -> impl Iterator<Item = &Hop> {
        self.path
            .iter()
            .filter(|leg| !leg.in_session)
            .map(|leg| &leg.hop)
    }

    pub fn legs(&self) -> &[Leg] {
        &self.path
    }

    /// Whether the next planned hop belongs to a session.
    pub fn in_session(&self) -> bool {
        self.plan.front().map_or(false, |leg| leg.in_session)
    }

    pub fn has_planned_hops(&self) -> bool {
        !self.plan.is_empty()
    }

    pub(crate) fn decrement_ttl(&mut self) -> u8 {
        self.ttl = self.ttl.saturating_sub(1);
        self.ttl
    }

    pub(crate) fn mark_sent(&mut self) {
        self.sent = true;
    }

    /// Fixes where the message starts. Used once, when it is first sent.
    pub(crate) fn set_origin(&mut self, origin: Endpoint) {
        if self.src_ip.is_none() {
            self.src_ip = origin.ip;
        }
        self.current = Some(origin.clone());
        self.origin = Some(origin);
    }

    pub(crate) fn plan_session<I>(&mut self, hops: I)
    where
        I: IntoIterator<Item = Hop>,
    {
        self.plan = hops
            .into_iter()
            .map(|hop| Leg {
                hop,
                in_session: true,
            })
            .collect();
    }

    /// Moves the message onto its next hop.
    pub(crate) fn hop(&mut self) {
        if let Some(next) = self.next_hop.take() {
            self.current = Some(next);
        }
    }

    pub(crate) fn set_next_hop(&mut self, src: Endpoint, dst: Endpoint) {
        self.next_hop = Some(dst.clone());
        self.path.push(Leg {
            hop: Hop::new(src, dst),
            in_session: false,
        });
    }

    /// Takes the next planned hop. Returns `false` when nothing is planned.
    pub(crate) fn advance_planned(&mut self) -> bool {
        match self.plan.pop_front() {
            Some(leg) => {
                self.next_hop = Some(leg.hop.dst.clone());
                self.path.push(leg);
                true
            }
            None => false,
        }
    }

    /// Undoes the last [`set_next_hop`](Self::set_next_hop) or
    /// [`advance_planned`](Self::advance_planned).
    pub(crate) fn retract_hop(&mut self) {
        if let Some(leg) = self.path.pop() {
            if leg.in_session {
                self.plan.push_front(leg);
            }
        }
        self.next_hop = None;
    }

    /// Points the next hop at the current endpoint.
    pub(crate) fn deliver_locally(&mut self) {
        self.next_hop = self.current.clone();
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} #{} ", self.kind(), self.id)?;
        match &self.body {
            Body::Request { action } => write!(
                f,
                "{}.{} -> {}:{} [{}]",
                self.origin_node,
                self.src_service,
                DisplayIp(self.dst_ip),
                self.dst_service,
                action
            ),
            Body::Response { status, content } => {
                write!(
                    f,
                    "{}:{} -> {}.{} {}",
                    DisplayIp(self.src_ip),
                    self.src_service,
                    DisplayIp(self.dst_ip),
                    self.dst_service,
                    status
                )?;
                if let Some(content) = content {
                    write!(f, " \"{}\"", content)?;
                }
                Ok(())
            }
            Body::Timeout { tag, duration, .. } => write!(
                f,
                "{}.{} [{}] after {}",
                self.origin_node, self.dst_service, tag, duration
            ),
        }
    }
}

struct DisplayIp(Option<Ipv4Address>);

impl fmt::Display for DisplayIp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(ip) => write!(f, "{}", ip),
            None => f.write_str("?"),
        }
    }
}
