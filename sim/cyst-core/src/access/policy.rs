//! The authorization store.

use super::{AccessLevel, Authorization, WILDCARD};
use rand::{rngs::SmallRng, Rng, SeedableRng};
use rustc_hash::FxHashMap;

/// One expanded row of an authorization: a single node and service.
#[derive(Debug, Clone)]
struct Grant {
    identity: String,
    access_level: AccessLevel,
    token: String,
}

/// Stores authorizations and decides whether presented ones are valid.
///
/// An authorization naming several nodes and services is expanded into one
/// grant per node/service pair. Grants are indexed by that pair, so a
/// decision looks at the exact pair and its three wildcard variants only.
#[derive(Debug)]
pub struct Policy {
    authorizations: Vec<Authorization>,
    grants: FxHashMap<(String, String), Vec<Grant>>,
    next_id: u64,
    rng: SmallRng,
}

pub const AUTHORIZATION_VALID: &str = "Authorization valid";

impl Policy {
    pub fn new(seed: u64) -> Self {
        Self {
            authorizations: Vec::new(),
            grants: FxHashMap::default(),
            next_id: 0,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// A random token, reproducible for a given seed.
    pub fn generate_token(&mut self) -> String {
        format!("{:032x}", self.rng.gen::<u128>())
    }

    /// Creates an authorization without registering it. A token is generated
    /// when none is given.
    pub fn create_authorization(
        &mut self,
        identity: impl Into<String>,
        nodes: &[&str],
        services: &[&str],
        access_level: AccessLevel,
        token: Option<&str>,
    ) -> Authorization {
        let token = match token {
            Some(token) => token.to_string(),
            None => self.generate_token(),
        };
        let id = self.next_id;
        self.next_id += 1;
        Authorization::new(
            id,
            identity.into(),
            nodes.iter().map(|n| n.to_string()).collect(),
            services.iter().map(|s| s.to_string()).collect(),
            access_level,
            token,
        )
    }

    /// Registers an authorization as valid.
    pub fn add_authorization(&mut self, authorization: &Authorization) {
        self.authorizations.push(authorization.clone());
        for node in authorization.nodes() {
            for service in authorization.services() {
                self.grants
                    .entry((node.clone(), service.clone()))
                    .or_default()
                    .push(Grant {
                        identity: authorization.identity().to_string(),
                        access_level: authorization.access_level(),
                        token: authorization.token().to_string(),
                    });
            }
        }
    }

    /// Removes every registered authorization equal to `authorization`.
    pub fn remove_authorization(&mut self, authorization: &Authorization) -> bool {
        let before = self.authorizations.len();
        let kept: Vec<Authorization> = self
            .authorizations
            .drain(..)
            .filter(|a| a != authorization)
            .collect();
        let removed = kept.len() != before;
        self.grants.clear();
        for a in &kept {
            self.add_authorization(a);
        }
        removed
    }

    pub fn authorizations(&self) -> &[Authorization] {
        &self.authorizations
    }

    /// Registered authorizations usable on `service` at `node` with at least
    /// `access_level`.
    pub fn get_authorizations(
        &self,
        node: &str,
        service: &str,
        access_level: AccessLevel,
    ) -> Vec<&Authorization> {
        self.authorizations
            .iter()
            .filter(|a| {
                a.covers_node(node) && a.covers_service(service) && a.access_level() >= access_level
            })
            .collect()
    }

    /// Decides whether `authorization` grants `access_level` on `service` at
    /// `node`. The reason explains a refusal.
    pub fn decide(
        &self,
        node: &str,
        service: &str,
        access_level: AccessLevel,
        authorization: &Authorization,
    ) -> (bool, String) {
        if !authorization.covers_node(node) {
            return (false, format!("Authorization not valid for node {}", node));
        }
        if !authorization.covers_service(service) {
            return (false, format!("Authorization not valid for service {}", service));
        }
        if authorization.access_level() < access_level {
            return (
                false,
                format!(
                    "Authorization grants {} but {} is required",
                    authorization.access_level(),
                    access_level
                ),
            );
        }

        let keys = [
            (node, service),
            (node, WILDCARD),
            (WILDCARD, service),
            (WILDCARD, WILDCARD),
        ];
        let granted = keys
            .iter()
            .filter_map(|(n, s)| self.grants.get(&(n.to_string(), s.to_string())))
            .flatten()
            .any(|grant| {
                (grant.identity == authorization.identity() || grant.identity == WILDCARD)
                    && grant.access_level >= access_level
                    && (grant.token == authorization.token() || grant.token == WILDCARD)
            });
        if granted {
            (true, AUTHORIZATION_VALID.to_string())
        } else {
            (
                false,
                "Authorization does not match valid authorizations".to_string(),
            )
        }
    }

    pub fn reset(&mut self) {
        self.authorizations.clear();
        self.grants.clear();
    }

    #[cfg(test)]
    fn grant_count(&self) -> usize {
        self.grants.values().map(Vec::len).sum()
    }
}
