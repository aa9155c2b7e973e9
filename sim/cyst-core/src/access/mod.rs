//! Authorization, authentication and the policy deciding access.

mod authentication;
mod authorization;
pub mod policy;

pub use authentication::{
    AccessScheme, AuthenticationProvider, AuthenticationProviderType, AuthenticationTarget,
    AuthenticationToken, AuthenticationTokenSecurity, AuthenticationTokenType,
    AuthorizationDomain, AuthorizationDomainType, TokenAssessment,
};
pub use authorization::{AccessLevel, Authorization, WILDCARD};
pub use policy::Policy;

use rustc_hash::FxHashMap;

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum AccessError {
    #[error("Unknown authentication provider {0}")]
    UnknownProvider(String),
    #[error("Provider {0} already exists")]
    DuplicateProvider(String),
    #[error("Unknown access scheme {0}")]
    UnknownScheme(usize),
    #[error("Access scheme has no authentication factors")]
    NoFactors,
}

/// Owns the policy together with the authentication providers and the
/// access schemes built on them.
#[derive(Debug)]
pub struct Access {
    policy: Policy,
    providers: FxHashMap<String, AuthenticationProvider>,
    schemes: Vec<AccessScheme>,
}

impl Access {
    pub fn new(seed: u64) -> Self {
        Self {
            policy: Policy::new(seed),
            providers: FxHashMap::default(),
            schemes: Vec::new(),
        }
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn policy_mut(&mut self) -> &mut Policy {
        &mut self.policy
    }

    pub fn add_provider(&mut self, provider: AuthenticationProvider) -> Result<(), AccessError> {
        if self.providers.contains_key(provider.id()) {
            return Err(AccessError::DuplicateProvider(provider.id().to_string()));
        }
        self.providers.insert(provider.id().to_string(), provider);
        Ok(())
    }

    pub fn provider(&self, id: &str) -> Option<&AuthenticationProvider> {
        self.providers.get(id)
    }

    pub fn provider_mut(&mut self, id: &str) -> Option<&mut AuthenticationProvider> {
        self.providers.get_mut(id)
    }

    /// Issues a token for `identity` from the provider `provider`.
    pub fn create_token(
        &mut self,
        provider: &str,
        identity: &str,
    ) -> Result<AuthenticationToken, AccessError> {
        let content = self.policy.generate_token();
        let provider = self
            .providers
            .get_mut(provider)
            .ok_or_else(|| AccessError::UnknownProvider(provider.to_string()))?;
        Ok(provider.issue(identity, content))
    }

    /// Registers a scheme. Every factor must name a known provider.
    pub fn add_scheme(&mut self, scheme: AccessScheme) -> Result<usize, AccessError> {
        if scheme.factors().is_empty() {
            return Err(AccessError::NoFactors);
        }
        if let Some(unknown) = scheme
            .factors()
            .iter()
            .find(|factor| !self.providers.contains_key(factor.as_str()))
        {
            return Err(AccessError::UnknownProvider(unknown.clone()));
        }
        self.schemes.push(scheme);
        Ok(self.schemes.len() - 1)
    }

    pub fn scheme(&self, index: usize) -> Option<&AccessScheme> {
        self.schemes.get(index)
    }

    /// Presents a token to the scheme at `index`.
    ///
    /// The first factor whose provider recognizes the token is taken as the
    /// satisfied one. Satisfying the last factor yields the authorization of
    /// the token identity; an earlier factor points at the next one.
    pub fn assess_token(
        &self,
        index: usize,
        token: &AuthenticationToken,
    ) -> Result<TokenAssessment, AccessError> {
        let scheme = self
            .schemes
            .get(index)
            .ok_or(AccessError::UnknownScheme(index))?;
        let factors = scheme.factors();
        let satisfied = factors.iter().position(|factor| {
            self.providers
                .get(factor)
                .map_or(false, |provider| provider.recognizes(token))
        });
        let assessment = match satisfied {
            None => TokenAssessment::Inapplicable,
            Some(i) if i + 1 == factors.len() => scheme
                .domain()
                .authorization_for(token.identity())
                .cloned()
                .map_or(TokenAssessment::Inapplicable, TokenAssessment::Authorized),
            Some(i) => {
                let next = &factors[i + 1];
                let provider = self
                    .providers
                    .get(next)
                    .ok_or_else(|| AccessError::UnknownProvider(next.clone()))?;
                TokenAssessment::Continue(provider.target().clone())
            }
        };
        Ok(assessment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(id: &str, service: &str) -> AuthenticationProvider {
        AuthenticationProvider::new(
            id,
            AuthenticationProviderType::Local,
            AuthenticationTokenType::Password,
            AuthenticationTokenSecurity::Sealed,
            AuthenticationTarget::new(service),
        )
    }

    fn two_factor_access() -> (Access, usize, Authorization) {
        let mut access = Access::new(3);
        access.add_provider(provider("pwd", "ssh")).unwrap();
        access.add_provider(provider("otp", "otp_service")).unwrap();
        let auth = access.policy_mut().create_authorization(
            "alice",
            &["server"],
            &["ssh"],
            AccessLevel::Limited,
            None,
        );
        let mut domain = AuthorizationDomain::new(AuthorizationDomainType::Local);
        domain.add_authorization(auth.clone());
        let mut scheme = AccessScheme::new(domain);
        scheme.add_factor("pwd");
        scheme.add_factor("otp");
        let index = access.add_scheme(scheme).unwrap();
        (access, index, auth)
    }

    #[test]
    fn factors_are_walked_in_order() {
        let (mut access, scheme, auth) = two_factor_access();
        let first = access.create_token("pwd", "alice").unwrap();
        let second = access.create_token("otp", "alice").unwrap();

        match access.assess_token(scheme, &first).unwrap() {
            TokenAssessment::Continue(target) => assert_eq!(target.service, "otp_service"),
            other => panic!("unexpected assessment {:?}", other),
        }
        assert_eq!(
            access.assess_token(scheme, &second).unwrap(),
            TokenAssessment::Authorized(auth)
        );
    }

    #[test]
    fn foreign_tokens_are_inapplicable() {
        let (mut access, scheme, _) = two_factor_access();
        access.add_provider(provider("other", "web")).unwrap();
        let token = access.create_token("other", "alice").unwrap();
        assert_eq!(
            access.assess_token(scheme, &token).unwrap(),
            TokenAssessment::Inapplicable
        );
        assert!(!access.provider("pwd").unwrap().recognizes(&token));
        assert_eq!(
            access.assess_token(9, &token),
            Err(AccessError::UnknownScheme(9))
        );
    }

    #[test]
    fn unknown_provider() {
        let mut access = Access::new(0);
        assert_eq!(
            access.create_token("nope", "bob"),
            Err(AccessError::UnknownProvider("nope".into()))
        );
        let mut scheme = AccessScheme::new(AuthorizationDomain::new(AuthorizationDomainType::Local));
        assert_eq!(access.add_scheme(scheme.clone()), Err(AccessError::NoFactors));
        scheme.add_factor("nope");
        assert!(access.add_scheme(scheme).is_err());
        access.add_provider(provider("p", "s")).unwrap();
        assert_eq!(
            access.add_provider(provider("p", "s")),
            Err(AccessError::DuplicateProvider("p".into()))
        );
    }
}
