//! Authentication providers and multi-factor access schemes.

use super::Authorization;
use crate::ip::Ipv4Address;
use rustc_hash::FxHashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthenticationProviderType {
    /// Checked on the node that hosts the service.
    Local,
    /// Checked by a service on another node on behalf of the target.
    Proxy,
    /// An external identity provider.
    Remote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthenticationTokenType {
    None,
    Password,
    Biometric,
    Device,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthenticationTokenSecurity {
    Open,
    Sealed,
    Hidden,
}

/// Where a token of a provider has to be presented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticationTarget {
    pub address: Option<Ipv4Address>,
    pub service: String,
    pub tokens: Vec<AuthenticationTokenType>,
}

impl AuthenticationTarget {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            address: None,
            service: service.into(),
            tokens: Vec::new(),
        }
    }
}

/// Proof of identity issued by a provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AuthenticationToken {
    identity: String,
    provider: String,
    token_type: AuthenticationTokenType,
    security: AuthenticationTokenSecurity,
    content: String,
}

impl AuthenticationToken {
    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn token_type(&self) -> AuthenticationTokenType {
        self.token_type
    }

    pub fn security(&self) -> AuthenticationTokenSecurity {
        self.security
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

/// Issues tokens and recognizes the ones it issued.
#[derive(Debug, Clone)]
pub struct AuthenticationProvider {
    id: String,
    kind: AuthenticationProviderType,
    token_type: AuthenticationTokenType,
    security: AuthenticationTokenSecurity,
    target: AuthenticationTarget,
    issued: FxHashSet<String>,
}

impl AuthenticationProvider {
    pub fn new(
        id: impl Into<String>,
        kind: AuthenticationProviderType,
        token_type: AuthenticationTokenType,
        security: AuthenticationTokenSecurity,
        target: AuthenticationTarget,
    ) -> Self {
        let mut target = target;
        if !target.tokens.contains(&token_type) {
            target.tokens.push(token_type);
        }
        Self {
            id: id.into(),
            kind,
            token_type,
            security,
            target,
            issued: FxHashSet::default(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> AuthenticationProviderType {
        self.kind
    }

    pub fn target(&self) -> &AuthenticationTarget {
        &self.target
    }

    pub fn set_target_address(&mut self, address: Ipv4Address) {
        self.target.address = Some(address);
    }

    pub(crate) fn issue(&mut self, identity: &str, content: String) -> AuthenticationToken {
        self.issued.insert(content.clone());
        AuthenticationToken {
            identity: identity.to_string(),
            provider: self.id.clone(),
            token_type: self.token_type,
            security: self.security,
            content,
        }
    }

    pub fn recognizes(&self, token: &AuthenticationToken) -> bool {
        token.provider == self.id
            && token.token_type == self.token_type
            && self.issued.contains(&token.content)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthorizationDomainType {
    Local,
    Federated,
}

/// The authorizations an access scheme hands out, one per identity.
#[derive(Debug, Clone)]
pub struct AuthorizationDomain {
    kind: AuthorizationDomainType,
    authorizations: Vec<Authorization>,
}

impl AuthorizationDomain {
    pub fn new(kind: AuthorizationDomainType) -> Self {
        Self {
            kind,
            authorizations: Vec::new(),
        }
    }

    pub fn kind(&self) -> AuthorizationDomainType {
        self.kind
    }

    pub fn add_authorization(&mut self, authorization: Authorization) {
        self.authorizations.push(authorization);
    }

    pub fn authorizations(&self) -> &[Authorization] {
        &self.authorizations
    }

    pub fn authorization_for(&self, identity: &str) -> Option<&Authorization> {
        self.authorizations
            .iter()
            .find(|a| a.identity() == identity)
    }
}

/// An ordered list of authentication factors guarding a domain.
#[derive(Debug, Clone)]
pub struct AccessScheme {
    factors: Vec<String>,
    domain: AuthorizationDomain,
}

impl AccessScheme {
    pub fn new(domain: AuthorizationDomain) -> Self {
        Self {
            factors: Vec::new(),
            domain,
        }
    }

    /// Appends a factor, checked after the ones already present.
    pub fn add_factor(&mut self, provider: impl Into<String>) {
        self.factors.push(provider.into());
    }

    pub fn factors(&self) -> &[String] {
        &self.factors
    }

    pub fn domain(&self) -> &AuthorizationDomain {
        &self.domain
    }

    pub fn domain_mut(&mut self) -> &mut AuthorizationDomain {
        &mut self.domain
    }
}

/// The result of presenting a token to an access scheme.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenAssessment {
    /// The token satisfied the last factor.
    Authorized(Authorization),
    /// The token satisfied an intermediate factor; the next one must be
    /// presented at the target.
    Continue(AuthenticationTarget),
    /// The scheme has no use for the token.
    Inapplicable,
}
