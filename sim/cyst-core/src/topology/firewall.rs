//! Firewall chains.
//!
//! Evaluation is first-match over an ordered rule list; when no rule matches
//! the chain's default policy applies.

use crate::ip::{Ipv4Address, Ipv4Net};
use std::fmt;

/// Matches any service name in a [`FirewallRule`].
pub const ANY_SERVICE: &str = "*";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FirewallPolicy {
    Allow,
    Deny,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FirewallChainType {
    Input,
    Output,
    Forward,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FirewallRule {
    pub src_net: Ipv4Net,
    pub dst_net: Ipv4Net,
    pub service: String,
    pub policy: FirewallPolicy,
}

impl FirewallRule {
    pub fn new(
        src_net: Ipv4Net,
        dst_net: Ipv4Net,
        service: impl Into<String>,
        policy: FirewallPolicy,
    ) -> Self {
        Self {
            src_net,
            dst_net,
            service: service.into(),
            policy,
        }
    }

    pub fn matches(&self, src: Ipv4Address, dst: Ipv4Address, service: &str) -> bool {
        self.src_net.contains(src)
            && self.dst_net.contains(dst)
            && (self.service == ANY_SERVICE || self.service == service)
    }
}

impl fmt::Display for FirewallRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} [{}]: {:?}",
            self.src_net, self.dst_net, self.service, self.policy
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirewallChain {
    kind: FirewallChainType,
    policy: FirewallPolicy,
    rules: Vec<FirewallRule>,
}

impl FirewallChain {
    pub fn new(kind: FirewallChainType, policy: FirewallPolicy) -> Self {
        Self {
            kind,
            policy,
            rules: Vec::new(),
        }
    }

    pub fn kind(&self) -> FirewallChainType {
        self.kind
    }

    pub fn policy(&self) -> FirewallPolicy {
        self.policy
    }

    pub fn rules(&self) -> &[FirewallRule] {
        &self.rules
    }

    pub fn evaluate(&self, src: Ipv4Address, dst: Ipv4Address, service: &str) -> FirewallPolicy {
        self.rules
            .iter()
            .find(|rule| rule.matches(src, dst, service))
            .map_or(self.policy, |rule| rule.policy)
    }
}

/// One chain per [`FirewallChainType`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Firewall {
    input: FirewallChain,
    output: FirewallChain,
    forward: FirewallChain,
    processing_time: u64,
}

impl Firewall {
    /// Creates a firewall whose chains all default to `policy`.
    pub fn new(policy: FirewallPolicy) -> Self {
        Self {
            input: FirewallChain::new(FirewallChainType::Input, policy),
            output: FirewallChain::new(FirewallChainType::Output, policy),
            forward: FirewallChain::new(FirewallChainType::Forward, policy),
            processing_time: 0,
        }
    }

    /// Extra virtual time spent on every evaluation.
    pub fn with_processing_time(mut self, processing_time: u64) -> Self {
        self.processing_time = processing_time;
        self
    }

    pub fn processing_time(&self) -> u64 {
        self.processing_time
    }

    pub fn chain(&self, kind: FirewallChainType) -> &FirewallChain {
        match kind {
            FirewallChainType::Input => &self.input,
            FirewallChainType::Output => &self.output,
            FirewallChainType::Forward => &self.forward,
        }
    }

    fn chain_mut(&mut self, kind: FirewallChainType) -> &mut FirewallChain {
        match kind {
            FirewallChainType::Input => &mut self.input,
            FirewallChainType::Output => &mut self.output,
            FirewallChainType::Forward => &mut self.forward,
        }
    }

    pub fn set_default_policy(&mut self, kind: FirewallChainType, policy: FirewallPolicy) {
        self.chain_mut(kind).policy = policy;
    }

    /// Appends a rule at the end of the chain.
    pub fn add_rule(&mut self, kind: FirewallChainType, rule: FirewallRule) {
        self.chain_mut(kind).rules.push(rule);
    }

    pub fn remove_rule(&mut self, kind: FirewallChainType, index: usize) -> Option<FirewallRule> {
        let rules = &mut self.chain_mut(kind).rules;
        (index < rules.len()).then(|| rules.remove(index))
    }

    pub fn list_rules(&self, kind: FirewallChainType) -> &[FirewallRule] {
        self.chain(kind).rules()
    }

    /// Returns whether the traffic is allowed and the time the decision took.
    pub fn evaluate(
        &self,
        kind: FirewallChainType,
        src: Ipv4Address,
        dst: Ipv4Address,
        service: &str,
    ) -> (bool, u64) {
        let allowed = self.chain(kind).evaluate(src, dst, service) == FirewallPolicy::Allow;
        (allowed, self.processing_time)
    }
}

impl Default for Firewall {
    fn default() -> Self {
        Self::new(FirewallPolicy::Deny)
    }
}
