use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;

/// Engine parameters of an environment. Topology is configured separately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    pub run_id: String,
    /// Seeds token generation.
    pub seed: u64,
    /// Initial TTL of every request and response.
    pub max_ttl: u8,
    /// Requests remembered per router for cycle detection.
    pub router_cache_capacity: NonZeroUsize,
    pub router_processing_time: u64,
    /// Time a host spends relaying or answering a message.
    pub node_processing_time: u64,
}

impl EnvironmentConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_max_ttl(mut self, max_ttl: u8) -> Self {
        self.max_ttl = max_ttl;
        self
    }

    pub fn with_router_cache_capacity(mut self, capacity: NonZeroUsize) -> Self {
        self.router_cache_capacity = capacity;
        self
    }

    pub fn with_router_processing_time(mut self, time: u64) -> Self {
        self.router_processing_time = time;
        self
    }

    pub fn with_node_processing_time(mut self, time: u64) -> Self {
        self.node_processing_time = time;
        self
    }
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            run_id: String::from("cyst"),
            seed: 0,
            max_ttl: crate::message::DEFAULT_TTL,
            router_cache_capacity: NonZeroUsize::new(crate::topology::Router::DEFAULT_CACHE_CAPACITY)
                .unwrap_or(NonZeroUsize::MIN),
            router_processing_time: 1,
            node_processing_time: 1,
        }
    }
}
