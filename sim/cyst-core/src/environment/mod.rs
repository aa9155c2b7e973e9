//! The simulation environment: configuration, the scheduler loop and its
//! state machine.
//!
//! ```text
//! INIT --init()--> PAUSED --run()--> RUNNING --queue empty--> FINISHED
//!                    ^                  |  \
//!                    +-----pause()------+   terminate()--> TERMINATED
//! ```
//!
//! Messages are processed in batches of equal virtual time. A pause or a
//! termination takes effect after the message being processed; the rest of
//! its batch stays queued.

mod config;
mod control;
mod dispatch;
mod messaging;
mod queue;

pub use config::EnvironmentConfig;
pub use control::{ControlHandle, EnvironmentState, ExternalSender};
pub use messaging::{MessagingError, ServiceContext, SessionSpec, CONNECTION_BLOCKED};

use crate::{
    access::{Access, AccessError},
    behavior::{BehavioralModel, ModelRegistry},
    ip::Ipv4Address,
    message::{Message, RequestSpec, Time},
    service::{ActiveService, Service},
    session::{SessionError, SessionId, Sessions},
    store::{DataStore, DataStoreError, MessageRecord, Statistics},
    topology::{
        ConnectionId, Firewall, FirewallChainType, FirewallRule, Link, Network, NetworkError, Node,
        Route,
    },
};
use control::Signal;
use messaging::Core;
use rustc_hash::FxHashMap;
use tokio::sync::{mpsc, watch};

#[derive(Debug, thiserror::Error)]
pub enum EnvironmentError {
    #[error(transparent)]
    Network(#[from] NetworkError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error(transparent)]
    Messaging(#[from] MessagingError),
    #[error(transparent)]
    Store(#[from] DataStoreError),
}

type ServiceKey = (String, String);

pub struct Environment {
    core: Core,
    actives: FxHashMap<ServiceKey, Box<dyn ActiveService>>,
    models: ModelRegistry,
    initialized: bool,
    started: bool,
    deferred: Vec<SessionSpec>,
    resolved: Vec<SessionId>,
    committed: usize,
    state_rx: watch::Receiver<EnvironmentState>,
    signals_tx: mpsc::UnboundedSender<Signal>,
    signals_rx: mpsc::UnboundedReceiver<Signal>,
}

impl Environment {
    /// Creates an empty environment with the built-in behavioral model.
    pub fn create(config: EnvironmentConfig) -> Self {
        let (state_tx, state_rx) = watch::channel(EnvironmentState::Init);
        let (signals_tx, signals_rx) = mpsc::unbounded_channel();
        Self {
            core: Core::new(config, state_tx),
            actives: FxHashMap::default(),
            models: ModelRegistry::with_builtin(),
            initialized: false,
            started: false,
            deferred: Vec::new(),
            resolved: Vec::new(),
            committed: 0,
            state_rx,
            signals_tx,
            signals_rx,
        }
    }

    pub fn config(&self) -> &EnvironmentConfig {
        &self.core.config
    }

    pub fn state(&self) -> EnvironmentState {
        self.core.state
    }

    pub fn current_time(&self) -> Time {
        self.core.clock
    }

    /// Messages waiting in the queue.
    pub fn pending(&self) -> usize {
        self.core.queue.len()
    }

    pub fn control(&self) -> ControlHandle {
        ControlHandle::new(self.state_rx.clone(), self.signals_tx.clone())
    }

    pub fn external(&self) -> ExternalSender {
        ExternalSender::new(self.signals_tx.clone())
    }

    pub fn network(&self) -> &Network {
        &self.core.network
    }

    pub fn network_mut(&mut self) -> &mut Network {
        &mut self.core.network
    }

    pub fn sessions(&self) -> &Sessions {
        &self.core.sessions
    }

    pub fn access(&self) -> &Access {
        &self.core.access
    }

    pub fn access_mut(&mut self) -> &mut Access {
        &mut self.core.access
    }

    /// Adds a node. Routers take their cache size and processing time from
    /// the configuration.
    pub fn add_node(&mut self, mut node: Node) -> Result<(), EnvironmentError> {
        if let Some(router) = node.as_router_mut() {
            router.set_cache_capacity(self.core.config.router_cache_capacity);
            router.set_processing_time(self.core.config.router_processing_time);
        }
        self.core.network.add_node(node)?;
        Ok(())
    }

    /// Adds an addressed interface (a port, on routers) to a node that was
    /// already added.
    pub fn add_interface(
        &mut self,
        node: &str,
        ip: Ipv4Address,
        prefix_len: u32,
    ) -> Result<usize, EnvironmentError> {
        Ok(self.core.network.add_interface(node, ip, prefix_len)?)
    }

    pub fn add_connection(
        &mut self,
        a: &str,
        a_port: usize,
        b: &str,
        b_port: usize,
        link: Link,
    ) -> Result<ConnectionId, EnvironmentError> {
        Ok(self.core.network.add_connection(a, a_port, b, b_port, link)?)
    }

    pub fn add_route(&mut self, router: &str, route: Route) -> Result<(), EnvironmentError> {
        Ok(self.core.network.add_route(router, route)?)
    }

    pub fn set_firewall(&mut self, router: &str, firewall: Firewall) -> Result<(), EnvironmentError> {
        Ok(self.core.network.set_firewall(router, firewall)?)
    }

    pub fn add_routing_rule(
        &mut self,
        router: &str,
        chain: FirewallChainType,
        rule: FirewallRule,
    ) -> Result<(), EnvironmentError> {
        Ok(self.core.network.add_firewall_rule(router, chain, rule)?)
    }

    /// Adds a service descriptor to an existing node.
    pub fn add_service(&mut self, node: &str, service: Service) -> Result<(), EnvironmentError> {
        self.core
            .network
            .node_mut(node)
            .ok_or_else(|| NetworkError::UnknownNode(node.to_string()))?
            .add_service(service);
        Ok(())
    }

    /// Installs an active service implementation on `node`.
    pub fn add_active_service(
        &mut self,
        node: &str,
        name: &str,
        owner: &str,
        service: impl ActiveService + 'static,
    ) -> Result<(), EnvironmentError> {
        self.add_service(node, Service::active(name, owner))?;
        self.actives
            .insert((node.to_string(), name.to_string()), Box::new(service));
        Ok(())
    }

    pub fn active_service<T: ActiveService + 'static>(&self, node: &str, name: &str) -> Option<&T> {
        self.actives
            .get(&(node.to_string(), name.to_string()))
            .and_then(|service| (**service).as_any().downcast_ref::<T>())
    }

    pub fn active_service_mut<T: ActiveService + 'static>(&mut self, node: &str, name: &str) -> Option<&mut T> {
        self.actives
            .get_mut(&(node.to_string(), name.to_string()))
            .and_then(|service| (**service).as_any_mut().downcast_mut::<T>())
    }

    pub fn register_model(
        &mut self,
        namespace: impl Into<String>,
        model: impl BehavioralModel + 'static,
    ) {
        self.models.register(namespace, model);
    }

    pub fn create_session(&mut self, spec: SessionSpec) -> Result<SessionId, EnvironmentError> {
        Ok(self.core.create_session(&spec)?)
    }

    /// Records a session to be created by [`init`](Self::init). Returns its
    /// position for [`deferred_session`](Self::deferred_session).
    pub fn defer_session(&mut self, spec: SessionSpec) -> usize {
        self.deferred.push(spec);
        self.deferred.len() - 1
    }

    pub fn deferred_session(&self, index: usize) -> Option<SessionId> {
        self.resolved.get(index).copied()
    }

    pub fn append_session(
        &mut self,
        base: SessionId,
        extension: SessionId,
    ) -> Result<SessionId, EnvironmentError> {
        Ok(self.core.sessions.append(base, extension)?)
    }

    pub fn create_session_from_message(
        &mut self,
        message: &Message,
    ) -> Result<SessionId, EnvironmentError> {
        Ok(self.core.create_session_from_message(message)?)
    }

    /// A request from `service` at `node`.
    pub fn create_request(&mut self, node: &str, service: &str, spec: RequestSpec) -> Message {
        self.core.create_request(node, service, spec)
    }

    /// Convenience for a request without session or authorization.
    pub fn request(
        &mut self,
        node: &str,
        service: &str,
        dst_ip: Ipv4Address,
        dst_service: &str,
        action: crate::message::Action,
    ) -> Message {
        self.create_request(node, service, RequestSpec::new(dst_ip, dst_service, action))
    }

    pub fn send_message(&mut self, message: Message, delay: u64) -> Result<(), EnvironmentError> {
        Ok(self.core.send(message, delay)?)
    }

    /// Pauses the run whenever `id` (`node.service`) sends a request.
    pub fn add_pause_on_request(&mut self, id: impl Into<String>) {
        self.core.pause_on_request.insert(id.into());
    }

    pub fn remove_pause_on_request(&mut self, id: &str) -> bool {
        self.core.pause_on_request.remove(id)
    }

    /// Pauses the run whenever `id` (`node.service`) receives a response.
    pub fn add_pause_on_response(&mut self, id: impl Into<String>) {
        self.core.pause_on_response.insert(id.into());
    }

    pub fn remove_pause_on_response(&mut self, id: &str) -> bool {
        self.core.pause_on_response.remove(id)
    }

    /// Messages delivered so far.
    pub fn messages(&self) -> &[MessageRecord] {
        &self.core.records
    }

    /// Establishes deferred sessions and moves to PAUSED. Repeated calls do
    /// nothing.
    pub fn init(&mut self) -> Result<(bool, EnvironmentState), EnvironmentError> {
        if self.initialized {
            return Ok((true, self.core.state));
        }
        if self.core.state != EnvironmentState::Init {
            return Ok((false, self.core.state));
        }
        for spec in &self.deferred {
            let id = self.core.create_session(spec)?;
            self.resolved.push(id);
        }
        self.initialized = true;
        self.core.set_state(EnvironmentState::Paused);
        Ok((true, self.core.state))
    }

    /// Processes messages until the queue drains or the run is paused or
    /// terminated. A finished environment can run again once new messages
    /// were sent.
    pub fn run(&mut self) -> (bool, EnvironmentState) {
        let state = self.core.state;
        if !self.initialized
            || !matches!(state, EnvironmentState::Paused | EnvironmentState::Finished)
        {
            return (false, state);
        }
        self.core.set_state(EnvironmentState::Running);
        if !self.started {
            self.started = true;
            self.start_services();
        }

        loop {
            self.drain_signals();
            if self.core.terminate_requested {
                self.stop();
                break;
            }
            if self.core.pause_requested {
                self.core.pause_requested = false;
                self.core.set_state(EnvironmentState::Paused);
                break;
            }

            let batch = self.core.queue.pop_batch();
            let Some(time) = batch.first().map(|task| task.time) else {
                self.core.set_state(EnvironmentState::Finished);
                break;
            };
            self.core.clock = time;
            self.core.horizon = self.core.horizon.max(time);

            let mut tasks = batch.into_iter();
            while let Some(task) = tasks.next() {
                self.process(task.message);
                if self.core.pause_requested || self.core.terminate_requested {
                    self.core.queue.restore(tasks);
                    break;
                }
            }
        }
        (true, self.core.state)
    }

    /// Only meaningful while running; use a [`ControlHandle`] or the
    /// [`ServiceContext`] to pause from inside the loop.
    pub fn pause(&mut self) -> (bool, EnvironmentState) {
        if self.core.state != EnvironmentState::Running {
            return (false, self.core.state);
        }
        self.core.pause_requested = true;
        (true, self.core.state)
    }

    /// Asks a running environment to stop. The loop drops pending messages
    /// and resets the clock at the next batch boundary.
    pub fn terminate(&mut self) -> (bool, EnvironmentState) {
        if self.core.state != EnvironmentState::Running {
            return (false, self.core.state);
        }
        self.core.terminate_requested = true;
        (true, self.core.state)
    }

    /// Writes the records delivered since the last commit and the run
    /// statistics to `store`.
    pub fn commit(&mut self, store: &mut dyn DataStore) -> Result<(), EnvironmentError> {
        for record in &self.core.records[self.committed..] {
            store.add_message(record)?;
        }
        self.committed = self.core.records.len();
        store.add_statistics(&Statistics {
            run_id: self.core.config.run_id.clone(),
            start_time_virtual: 0,
            end_time_virtual: self.core.horizon,
            messages: self.core.records.len(),
        })?;
        Ok(())
    }

    fn stop(&mut self) {
        self.core.terminate_requested = false;
        self.core.pause_requested = false;
        self.core.queue.clear();
        self.core.clock = 0;
        self.core.set_state(EnvironmentState::Terminated);
    }

    /// Runs every active service once, ordered by node and service name.
    fn start_services(&mut self) {
        let mut keys: Vec<ServiceKey> = self.actives.keys().cloned().collect();
        keys.sort();
        for key in keys {
            if let Some(mut service) = self.actives.remove(&key) {
                let mut ctx = ServiceContext::new(&mut self.core, &key.0, &key.1);
                service.run(&mut ctx);
                self.actives.insert(key, service);
            }
        }
    }

    fn drain_signals(&mut self) {
        while let Ok(signal) = self.signals_rx.try_recv() {
            match signal {
                Signal::Pause => self.core.pause_requested = true,
                Signal::Terminate => self.core.terminate_requested = true,
                Signal::Request {
                    node,
                    service,
                    spec,
                    delay,
                } => {
                    let request = self.core.create_request(&node, &service, spec);
                    if let Err(e) = self.core.send(request, delay) {
                        tracing::warn!(node = %node, service = %service, "cannot send external request: {}", e);
                    }
                }
                Signal::Wake {
                    node,
                    service,
                    tag,
                    delay,
                } => self.core.schedule_timeout(&node, &service, tag, delay),
            }
        }
    }
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("state", &self.core.state)
            .field("time", &self.core.clock)
            .field("pending", &self.core.queue.len())
            .field("models", &self.models)
            .finish()
    }
}
