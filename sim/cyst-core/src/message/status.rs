use std::fmt;

/// Which layer produced a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StatusOrigin {
    Network,
    Node,
    Service,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StatusValue {
    Success,
    Failure,
    Error,
    Partial,
}

/// The outcome carried by a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Status {
    pub origin: StatusOrigin,
    pub value: StatusValue,
}

impl Status {
    pub const fn new(origin: StatusOrigin, value: StatusValue) -> Self {
        Self { origin, value }
    }

    pub fn is_success(&self) -> bool {
        self.value == StatusValue::Success
    }
}

impl fmt::Display for StatusOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StatusOrigin::Network => "NETWORK",
            StatusOrigin::Node => "NODE",
            StatusOrigin::Service => "SERVICE",
            StatusOrigin::System => "SYSTEM",
        };
        f.write_str(name)
    }
}

impl fmt::Display for StatusValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StatusValue::Success => "SUCCESS",
            StatusValue::Failure => "FAILURE",
            StatusValue::Error => "ERROR",
            StatusValue::Partial => "PARTIAL",
        };
        f.write_str(name)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.origin, self.value)
    }
}
