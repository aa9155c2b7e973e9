use std::fmt;

/// Matches any identity, node, service or token.
pub const WILDCARD: &str = "*";

/// Ordered privilege levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum AccessLevel {
    #[default]
    None,
    Limited,
    Elevated,
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AccessLevel::None => "NONE",
            AccessLevel::Limited => "LIMITED",
            AccessLevel::Elevated => "ELEVATED",
        };
        f.write_str(name)
    }
}

/// A grant of access for an identity to services on nodes.
///
/// Two authorizations are equal when they have the same id, or when every
/// field other than the id matches.
#[derive(Debug, Clone)]
pub struct Authorization {
    id: u64,
    identity: String,
    nodes: Vec<String>,
    services: Vec<String>,
    access_level: AccessLevel,
    token: String,
}

impl Authorization {
    pub(crate) fn new(
        id: u64,
        identity: String,
        nodes: Vec<String>,
        services: Vec<String>,
        access_level: AccessLevel,
        token: String,
    ) -> Self {
        Self {
            id,
            identity,
            nodes,
            services,
            access_level,
            token,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    pub fn services(&self) -> &[String] {
        &self.services
    }

    pub fn access_level(&self) -> AccessLevel {
        self.access_level
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn covers_node(&self, node: &str) -> bool {
        covers(&self.nodes, node)
    }

    pub fn covers_service(&self, service: &str) -> bool {
        covers(&self.services, service)
    }
}

impl PartialEq for Authorization {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            || (self.identity == other.identity
                && self.nodes == other.nodes
                && self.services == other.services
                && self.access_level == other.access_level
                && self.token == other.token)
    }
}

impl fmt::Display for Authorization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} on [{}]/[{}] at {}",
            self.identity,
            self.nodes.join(","),
            self.services.join(","),
            self.access_level
        )
    }
}

fn covers(names: &[String], name: &str) -> bool {
    names.iter().any(|n| n == name || n == WILDCARD)
}
