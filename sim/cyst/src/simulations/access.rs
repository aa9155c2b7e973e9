use super::{expect_response, office, run_to_completion, web_ip, SimulationError, ATTACKER, SCANNER};
use cyst_core::{
    access::{
        AccessLevel, AccessScheme, AuthenticationProvider, AuthenticationProviderType,
        AuthenticationTarget, AuthenticationTokenSecurity, AuthenticationTokenType,
        AuthorizationDomain, AuthorizationDomainType, TokenAssessment,
    },
    ip::{Ipv4Address, Ipv4Net},
    message::{Action, RequestSpec, StatusOrigin, StatusValue},
    topology::{Firewall, FirewallChainType, FirewallPolicy, FirewallRule},
    Environment, EnvironmentConfig,
};

/// Runs requests against a service that demands authorization.
///
/// The web server's admin action needs limited access. The attacker first
/// tries without credentials, then logs in with a password token, trades it
/// for an authorization and retries.
pub fn access(config: EnvironmentConfig) -> Result<Environment, SimulationError> {
    let mut env = office(config)?;
    env.set_firewall("gw", Firewall::new(FirewallPolicy::Deny))?;
    env.add_routing_rule(
        "gw",
        FirewallChainType::Forward,
        FirewallRule::new(
            Ipv4Net::new_short(Ipv4Address::new([10, 0, 0, 0]), 24),
            Ipv4Net::new_short(web_ip(), 24),
            "http",
            FirewallPolicy::Allow,
        ),
    )?;

    let access = env.access_mut();
    let mut login = AuthenticationProvider::new(
        "web_login",
        AuthenticationProviderType::Local,
        AuthenticationTokenType::Password,
        AuthenticationTokenSecurity::Sealed,
        AuthenticationTarget::new("http"),
    );
    login.set_target_address(web_ip());
    access.add_provider(login)?;

    let admin = access.policy_mut().create_authorization(
        SCANNER,
        &["web"],
        &["http"],
        AccessLevel::Limited,
        None,
    );
    access.policy_mut().add_authorization(&admin);
    let mut domain = AuthorizationDomain::new(AuthorizationDomainType::Local);
    domain.add_authorization(admin);
    let mut scheme = AccessScheme::new(domain);
    scheme.add_factor("web_login");
    let scheme = access.add_scheme(scheme)?;

    let guarded = || {
        Action::new("cyst:test:echo_success")
            .with_access(AccessLevel::Limited)
            .with_parameter("content", "admin panel")
    };

    let anonymous = env.request(ATTACKER, SCANNER, web_ip(), "http", guarded());
    env.send_message(anonymous, 0)?;
    run_to_completion(&mut env)?;
    expect_response(
        &env,
        ATTACKER,
        SCANNER,
        StatusOrigin::Service,
        StatusValue::Failure,
        Some("No authorization provided"),
    )?;

    let token = env.access_mut().create_token("web_login", SCANNER)?;
    let authorization = match env.access().assess_token(scheme, &token)? {
        TokenAssessment::Authorized(authorization) => authorization,
        other => {
            return Err(SimulationError::Unexpected(format!(
                "the password alone should authorize, got {:?}",
                other
            )))
        }
    };
    let spec = RequestSpec::new(web_ip(), "http", guarded()).with_auth(authorization);
    let request = env.create_request(ATTACKER, SCANNER, spec);
    env.send_message(request, 0)?;
    run_to_completion(&mut env)?;
    expect_response(
        &env,
        ATTACKER,
        SCANNER,
        StatusOrigin::Service,
        StatusValue::Success,
        Some("admin panel"),
    )?;
    Ok(env)
}

#[cfg(test)]
mod tests {
    use cyst_core::EnvironmentConfig;

    #[test]
    fn access() {
        let env = super::access(EnvironmentConfig::default()).unwrap();
        assert_eq!(env.access().policy().authorizations().len(), 1);
    }

    #[test]
    fn seeds_do_not_matter_for_the_outcome() {
        for seed in [0, 7, 1 << 40] {
            super::access(EnvironmentConfig::default().with_seed(seed)).unwrap();
        }
    }
}
