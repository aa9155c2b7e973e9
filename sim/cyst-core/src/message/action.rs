use crate::access::AccessLevel;
use std::{collections::BTreeMap, fmt};

/// An action a request asks its target to perform.
///
/// Action ids are colon separated, e.g. `cyst:test:echo_success`. The first
/// fragment names the behavioral model that interprets the action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    id: String,
    required_access: AccessLevel,
    parameters: BTreeMap<String, String>,
}

impl Action {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            required_access: AccessLevel::None,
            parameters: BTreeMap::new(),
        }
    }

    /// Passive services check the request authorization when this is above
    /// [`AccessLevel::None`].
    pub fn with_access(mut self, level: AccessLevel) -> Self {
        self.required_access = level;
        self
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn namespace(&self) -> &str {
        self.fragments().next().unwrap_or_default()
    }

    pub fn fragments(&self) -> impl Iterator<Item = &str> {
        self.id.split(':')
    }

    pub fn required_access(&self) -> AccessLevel {
        self.required_access
    }

    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).map(String::as_str)
    }

    pub fn parameters(&self) -> &BTreeMap<String, String> {
        &self.parameters
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}
