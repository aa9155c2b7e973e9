//! Wrappers for the events the engine logs repeatedly.
//!
//! Each function corresponds to one kind of event. The engine never installs
//! a subscriber; that is left to the program embedding it.

use crate::{
    environment::EnvironmentState,
    message::{Message, Time},
};
use tracing::{event, Level};

/// A message arrived at `node`.
pub(crate) fn hop_event(time: Time, node: &str, message: &Message) {
    event!(
        target: "MESSAGE",
        Level::TRACE,
        time,
        node,
        message_id = message.id().into_inner(),
        ttl = message.ttl(),
        "hop"
    );
}

/// A message reached the service or node it was addressed to.
pub(crate) fn delivery_event(time: Time, node: &str, message: &Message) {
    event!(
        target: "MESSAGE",
        Level::DEBUG,
        time,
        node,
        message_id = message.id().into_inner(),
        kind = %message.kind(),
        service = message.dst_service(),
        status = ?message.status(),
        "delivered: {}",
        message
    );
}

/// A request was answered with a failure on its way.
pub(crate) fn rejection_event(time: Time, node: &str, message: &Message, reason: &str) {
    event!(
        target: "MESSAGE",
        Level::DEBUG,
        time,
        node,
        message_id = message.id().into_inner(),
        reason,
        "rejected"
    );
}

/// A message vanished without an answer.
pub(crate) fn drop_event(time: Time, node: &str, message: &Message, reason: &str) {
    event!(
        target: "MESSAGE",
        Level::DEBUG,
        time,
        node,
        message_id = message.id().into_inner(),
        reason,
        "dropped"
    );
}

pub(crate) fn state_event(from: EnvironmentState, to: EnvironmentState) {
    event!(target: "ENVIRONMENT", Level::INFO, from = %from, to = %to, "state change");
}
