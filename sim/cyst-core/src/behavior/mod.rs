//! Interpreters for the actions sent to passive services.
//!
//! Models are registered per namespace, the first fragment of an action id.

mod cyst;

pub use self::cyst::CystModel;

use crate::{environment::ServiceContext, message::Message};
use rustc_hash::FxHashMap;

pub trait BehavioralModel {
    /// Evaluates `request` at the node and service of `ctx`. Returns the
    /// processing delay and the response to send back.
    fn evaluate(&mut self, request: &Message, ctx: &mut ServiceContext<'_>) -> (u64, Message);
}

#[derive(Default)]
pub struct ModelRegistry {
    models: FxHashMap<String, Box<dyn BehavioralModel>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry with the built-in `cyst` model.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register("cyst", CystModel::new());
        registry
    }

    pub fn register(&mut self, namespace: impl Into<String>, model: impl BehavioralModel + 'static) {
        self.models.insert(namespace.into(), Box::new(model));
    }

    pub fn contains(&self, namespace: &str) -> bool {
        self.models.contains_key(namespace)
    }

    pub(crate) fn take(&mut self, namespace: &str) -> Option<Box<dyn BehavioralModel>> {
        self.models.remove(namespace)
    }

    pub(crate) fn restore(&mut self, namespace: String, model: Box<dyn BehavioralModel>) {
        self.models.insert(namespace, model);
    }
}

impl std::fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.models.keys()).finish()
    }
}

pub type ActionHandler<M> = fn(&mut M, &Message, &mut ServiceContext<'_>) -> (u64, Message);

/// Maps action ids to handlers, with a handler for everything else.
pub struct ActionTable<M> {
    handlers: FxHashMap<&'static str, ActionHandler<M>>,
    fallback: ActionHandler<M>,
}

impl<M> ActionTable<M> {
    pub fn new(fallback: ActionHandler<M>) -> Self {
        Self {
            handlers: FxHashMap::default(),
            fallback,
        }
    }

    pub fn with(mut self, action: &'static str, handler: ActionHandler<M>) -> Self {
        self.handlers.insert(action, handler);
        self
    }

    pub fn handler(&self, action: &str) -> ActionHandler<M> {
        self.handlers.get(action).copied().unwrap_or(self.fallback)
    }

    pub fn actions(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.handlers.keys().copied()
    }
}
