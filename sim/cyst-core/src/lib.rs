//! The core of a cyber range: a discrete-event simulator of services that
//! exchange requests and responses over a modeled network.
//!
//! Active services (attackers, defenders, shells) send requests. Requests
//! travel hop by hop through hosts and routers, obey routing tables and
//! firewalls, may tunnel through pre-established sessions, and are answered
//! by the targeted service. Passive services answer through behavioral
//! models, after the access policy has been consulted.
//!
//! # Organization
//! - [`ip`] and [`topology`] describe the network: addresses, nodes,
//!   routers, connections
//! - [`Message`] and [`session`] describe what travels through it
//! - [`access`] decides who may do what
//! - [`Environment`] owns all of the above and runs the event loop
//! - [`behavior`] and [`service`] plug behavior into the simulation
//! - [`store`] receives what happened

mod logging;

pub mod ip;

pub mod topology;
pub use topology::{Network, Node};

pub mod message;
pub use message::Message;

pub mod session;
pub use session::{Session, SessionId};

pub mod access;

pub mod environment;
pub use environment::{Environment, EnvironmentConfig, EnvironmentState};

pub mod service;
pub use service::{ActiveService, ScriptedActor};

pub mod behavior;

pub mod store;

mod id;
pub use id::{Counter, MessageId};
