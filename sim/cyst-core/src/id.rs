use std::fmt::Display;

/// A unique identifier for a message. Responses share the id of the request
/// they answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MessageId(u64);

impl MessageId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Gets the underlying ID number.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl From<u64> for MessageId {
    fn from(n: u64) -> Self {
        Self(n)
    }
}

impl From<MessageId> for u64 {
    fn from(id: MessageId) -> Self {
        id.0
    }
}

impl Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hands out message ids. Each environment owns one, so ids are unique and
/// dense within a run and start over in a new environment.
#[derive(Debug, Default, Clone)]
pub struct Counter {
    next: u64,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> MessageId {
        let id = MessageId(self.next);
        self.next += 1;
        id
    }

    /// How many ids were handed out so far.
    pub fn issued(&self) -> u64 {
        self.next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_sequential() {
        let mut counter = Counter::new();
        assert_eq!(counter.next_id(), MessageId::new(0));
        assert_eq!(counter.next_id(), MessageId::new(1));
        assert_eq!(counter.issued(), 2);
        assert_eq!(Counter::new().next_id().into_inner(), 0);
    }
}
