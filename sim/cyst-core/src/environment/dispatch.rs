//! What a node does with a message that just arrived.

use super::{Environment, ServiceContext};
use crate::{
    access::{AccessLevel, WILDCARD},
    logging,
    message::{Message, Status, StatusOrigin, StatusValue},
    service::ServiceKind,
    topology::{
        router::{NOT_ROUTABLE, TTL_EXPIRED},
        Verdict,
    },
};

enum Target {
    Active,
    Passive { local: bool },
    Missing,
}

impl Environment {
    pub(super) fn process(&mut self, mut message: Message) {
        if message.is_timeout() {
            let node = message.origin_node().to_string();
            let service = message.dst_service().to_string();
            self.deliver_to_active(&node, &service, message);
            return;
        }

        message.hop();
        let Some(node_id) = message.current().map(|endpoint| endpoint.node.clone()) else {
            tracing::warn!(message_id = message.id().into_inner(), "message is nowhere");
            return;
        };
        logging::hop_event(self.core.clock, &node_id, &message);

        let verdict = match self.core.network.node_mut(&node_id) {
            Some(node) => node
                .as_router_mut()
                .map(|router| router.process(&node_id, &mut message)),
            None => {
                tracing::warn!(node = %node_id, "message arrived at an unknown node");
                return;
            }
        };
        match verdict {
            Some(Verdict::Forward { processing_time }) => {
                self.core.transmit(message, processing_time);
                return;
            }
            Some(Verdict::Reject {
                reason,
                processing_time,
            }) => {
                self.core.reject(&node_id, &message, reason, processing_time);
                return;
            }
            Some(Verdict::Drop { reason }) => {
                logging::drop_event(self.core.clock, &node_id, &message, reason);
                return;
            }
            Some(Verdict::Local) | None => {}
        }

        let processing_time = self.core.config.node_processing_time;
        if message.in_session() || (message.is_response() && message.has_planned_hops()) {
            message.advance_planned();
            self.core.transmit(message, processing_time);
            return;
        }

        if message.is_request() {
            if let Some(dst) = message.dst_ip() {
                let relay = self
                    .core
                    .network
                    .node(&node_id)
                    .filter(|node| !node.has_ip(dst))
                    .map(|node| node.route_to(dst));
                if let Some(hop) = relay {
                    if message.decrement_ttl() == 0 {
                        self.core.reject(&node_id, &message, TTL_EXPIRED, processing_time);
                        return;
                    }
                    match hop {
                        Some(hop) => {
                            message.set_next_hop(hop.src, hop.dst);
                            self.core.transmit(message, processing_time);
                        }
                        None => self.core.reject(&node_id, &message, NOT_ROUTABLE, processing_time),
                    }
                    return;
                }
            }
        }

        self.deliver(&node_id, message);
    }

    /// Hands a message to the service it is addressed to.
    fn deliver(&mut self, node_id: &str, message: Message) {
        let service = message.dst_service().to_string();
        self.core.record(node_id, &message);
        logging::delivery_event(self.core.clock, node_id, &message);

        if message.is_response()
            && self
                .core
                .pause_on_response
                .contains(&format!("{}.{}", node_id, service))
        {
            self.core.pause_requested = true;
        }

        let target = match self
            .core
            .network
            .node(node_id)
            .and_then(|node| node.service(&service))
            .map(|s| s.kind())
        {
            Some(ServiceKind::Active) => Target::Active,
            Some(ServiceKind::Passive(passive)) => Target::Passive {
                local: passive.local,
            },
            None if service.is_empty() => Target::Passive { local: false },
            None => Target::Missing,
        };

        match target {
            Target::Active => self.deliver_to_active(node_id, &service, message),
            _ if !message.is_request() => {
                logging::drop_event(self.core.clock, node_id, &message, "no active service to receive it");
            }
            Target::Missing => {
                let status = Status::new(StatusOrigin::Node, StatusValue::Error);
                let content = format!("Nonexistent service {} at node {}", service, node_id);
                let delay = self.core.config.node_processing_time;
                self.core.respond(&message, status, content, delay);
            }
            Target::Passive { local: true } if message.origin_node() != node_id => {
                let status = Status::new(StatusOrigin::Service, StatusValue::Failure);
                let content = format!(
                    "Service {} at node {} is only available locally",
                    service, node_id
                );
                let delay = self.core.config.node_processing_time;
                self.core.respond(&message, status, content, delay);
            }
            Target::Passive { .. } => self.evaluate(node_id, &service, message),
        }
    }

    /// Interprets a request for a passive service, or for the node itself.
    fn evaluate(&mut self, node_id: &str, service: &str, request: Message) {
        let processing_time = self.core.config.node_processing_time;
        let Some(action) = request.action() else {
            return;
        };

        let required = action.required_access();
        if required > AccessLevel::None {
            let target = if service.is_empty() { WILDCARD } else { service };
            let (granted, reason) = match request.auth() {
                Some(auth) => self.core.access.policy().decide(node_id, target, required, auth),
                None => (false, String::from("No authorization provided")),
            };
            if !granted {
                let status = Status::new(StatusOrigin::Service, StatusValue::Failure);
                self.core.respond(&request, status, reason, processing_time);
                return;
            }
        }

        let namespace = action.namespace().to_string();
        let Some(mut model) = self.models.take(&namespace) else {
            let status = Status::new(StatusOrigin::System, StatusValue::Error);
            let content = format!("No behavioral model registered for namespace '{}'", namespace);
            self.core.respond(&request, status, content, processing_time);
            return;
        };
        let (delay, response) = {
            let mut ctx = ServiceContext::new(&mut self.core, node_id, service);
            model.evaluate(&request, &mut ctx)
        };
        self.models.restore(namespace, model);
        if let Err(e) = self.core.send(response, processing_time.saturating_add(delay)) {
            tracing::warn!(node = node_id, "cannot send the model response: {}", e);
        }
    }

    pub(super) fn deliver_to_active(&mut self, node_id: &str, service: &str, message: Message) {
        let key = (node_id.to_string(), service.to_string());
        let Some(mut active) = self.actives.remove(&key) else {
            logging::drop_event(self.core.clock, node_id, &message, "no active service implementation");
            return;
        };
        let (handled, delay) = {
            let mut ctx = ServiceContext::new(&mut self.core, node_id, service);
            active.process_message(&message, &mut ctx)
        };
        self.actives.insert(key, active);
        tracing::trace!(node = node_id, service, handled, delay, "active service processed message");
    }
}
