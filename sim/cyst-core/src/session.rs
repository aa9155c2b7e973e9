//! Sessions: pre-established tunnels through the network.
//!
//! Sessions live in an arena owned by the environment and refer to their
//! parents by [`SessionId`]. The full route of a session is its parent's
//! route followed by its own hops.

use crate::topology::{Endpoint, Hop};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(usize);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Session owner must not be empty")]
    EmptyOwner,
    #[error("Session must contain at least one hop")]
    EmptyPath,
    #[error("Session owner {owner} differs from the parent owner {parent_owner}")]
    OwnerMismatch { owner: String, parent_owner: String },
    #[error("Session would end at {0}, where its parent already ends")]
    SelfLoop(String),
    #[error("Session hops are not contiguous at {0}")]
    Discontinuous(String),
    #[error("Unknown session {0}")]
    UnknownSession(SessionId),
    #[error("Nodes {0} and {1} are not directly connected")]
    Disconnected(String, String),
    #[error("Session needs at least two waypoints")]
    TooFewWaypoints,
}

#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    owner: String,
    parent: Option<SessionId>,
    hops: Vec<Hop>,
}

impl Session {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn parent(&self) -> Option<SessionId> {
        self.parent
    }

    /// The hops added by this session, without the parent's.
    pub fn hops(&self) -> &[Hop] {
        &self.hops
    }

    /// Where this segment starts.
    pub fn start(&self) -> &Endpoint {
        &self.hops[0].src
    }

    /// Where the session ends.
    pub fn end(&self) -> &Endpoint {
        &self.hops[self.hops.len() - 1].dst
    }
}

/// Sessions compare by owner, parent and hops; the arena slot is ignored.
impl PartialEq for Session {
    fn eq(&self, other: &Self) -> bool {
        self.owner == other.owner && self.parent == other.parent && self.hops == other.hops
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} of {}: {} -> {}", self.id, self.owner, self.start(), self.end())
    }
}

/// Arena of all sessions of an environment.
#[derive(Debug, Clone, Default)]
pub struct Sessions {
    arena: Vec<Session>,
}

impl Sessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    pub fn get(&self, id: SessionId) -> Option<&Session> {
        self.arena.get(id.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Session> {
        self.arena.iter()
    }

    /// Creates a session of `owner` over `hops`, optionally extending
    /// `parent`.
    pub fn create(
        &mut self,
        owner: impl Into<String>,
        hops: Vec<Hop>,
        parent: Option<SessionId>,
    ) -> Result<SessionId, SessionError> {
        let owner = owner.into();
        if owner.is_empty() {
            return Err(SessionError::EmptyOwner);
        }
        if hops.is_empty() {
            return Err(SessionError::EmptyPath);
        }
        if let Some(gap) = hops.windows(2).find(|pair| pair[0].dst.node != pair[1].src.node) {
            return Err(SessionError::Discontinuous(gap[0].dst.node.clone()));
        }
        if let Some(parent) = parent {
            let parent = self.get(parent).ok_or(SessionError::UnknownSession(parent))?;
            if parent.owner != owner {
                return Err(SessionError::OwnerMismatch {
                    owner,
                    parent_owner: parent.owner.clone(),
                });
            }
            let end = &hops[hops.len() - 1].dst.node;
            if *end == parent.end().node {
                return Err(SessionError::SelfLoop(end.clone()));
            }
            if hops[0].src.node != parent.end().node {
                return Err(SessionError::Discontinuous(parent.end().node.clone()));
            }
        }

        let id = SessionId(self.arena.len());
        self.arena.push(Session {
            id,
            owner,
            parent,
            hops,
        });
        Ok(id)
    }

    /// Composes `base` with `extension` into a new session that starts where
    /// `base` starts and ends where `extension` ends.
    pub fn append(
        &mut self,
        base: SessionId,
        extension: SessionId,
    ) -> Result<SessionId, SessionError> {
        let owner = self
            .get(extension)
            .ok_or(SessionError::UnknownSession(extension))?
            .owner
            .clone();
        let hops = self.forward(extension)?.cloned().collect();
        self.create(owner, hops, Some(base))
    }

    /// Sessions from the outermost ancestor down to `id`.
    fn lineage(&self, id: SessionId) -> Result<Vec<&Session>, SessionError> {
        let mut chain = Vec::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let session = self.get(current).ok_or(SessionError::UnknownSession(current))?;
            chain.push(session);
            cursor = session.parent;
        }
        chain.reverse();
        Ok(chain)
    }

    /// All hops from the session start to its end.
    pub fn forward(&self, id: SessionId) -> Result<impl Iterator<Item = &Hop>, SessionError> {
        let lineage = self.lineage(id)?;
        Ok(lineage.into_iter().flat_map(|session| session.hops.iter()))
    }

    /// All hops from the session end back to its start.
    pub fn reverse(&self, id: SessionId) -> Result<impl Iterator<Item = Hop> + '_, SessionError> {
        let lineage = self.lineage(id)?;
        Ok(lineage
            .into_iter()
            .rev()
            .flat_map(|session| session.hops.iter().rev().map(Hop::swap)))
    }

    /// Where the whole session starts, including its ancestors.
    pub fn start(&self, id: SessionId) -> Result<&Endpoint, SessionError> {
        let lineage = self.lineage(id)?;
        Ok(lineage[0].start())
    }

    pub fn end(&self, id: SessionId) -> Result<&Endpoint, SessionError> {
        self.get(id)
            .map(Session::end)
            .ok_or(SessionError::UnknownSession(id))
    }

    /// Structural equality that also compares the parents structurally.
    pub fn equivalent(&self, a: SessionId, b: SessionId) -> bool {
        match (self.get(a), self.get(b)) {
            (Some(x), Some(y)) => {
                x.owner == y.owner
                    && x.hops == y.hops
                    && match (x.parent, y.parent) {
                        (None, None) => true,
                        (Some(p), Some(q)) => self.equivalent(p, q),
                        _ => false,
                    }
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hop(a: &str, ap: usize, b: &str, bp: usize) -> Hop {
        Hop::new(Endpoint::new(a, ap, None), Endpoint::new(b, bp, None))
    }

    #[test]
    fn construction_errors() {
        let mut sessions = Sessions::new();
        assert_eq!(
            sessions.create("", vec![hop("a", 0, "b", 0)], None),
            Err(SessionError::EmptyOwner)
        );
        assert_eq!(sessions.create("x", vec![], None), Err(SessionError::EmptyPath));
        assert!(matches!(
            sessions.create("x", vec![hop("a", 0, "b", 0), hop("c", 0, "d", 0)], None),
            Err(SessionError::Discontinuous(_))
        ));

        let parent = sessions.create("x", vec![hop("a", 0, "b", 0)], None).unwrap();
        assert!(matches!(
            sessions.create("y", vec![hop("b", 1, "c", 0)], Some(parent)),
            Err(SessionError::OwnerMismatch { .. })
        ));
        assert_eq!(
            sessions.create("x", vec![hop("b", 1, "c", 0), hop("c", 1, "b", 2)], Some(parent)),
            Err(SessionError::SelfLoop("b".into()))
        );
    }

    #[test]
    fn traversal_through_parent() {
        let mut sessions = Sessions::new();
        let first = sessions
            .create("x", vec![hop("a", 0, "r", 0), hop("r", 1, "b", 0)], None)
            .unwrap();
        let second = sessions
            .create("x", vec![hop("b", 1, "c", 0)], Some(first))
            .unwrap();

        let forward: Vec<Hop> = sessions.forward(second).unwrap().cloned().collect();
        assert_eq!(
            forward,
            vec![hop("a", 0, "r", 0), hop("r", 1, "b", 0), hop("b", 1, "c", 0)]
        );
        let reverse: Vec<Hop> = sessions.reverse(second).unwrap().collect();
        assert_eq!(
            reverse,
            vec![hop("c", 0, "b", 1), hop("b", 0, "r", 1), hop("r", 0, "a", 0)]
        );
        assert_eq!(sessions.start(second).unwrap().node, "a");
        assert_eq!(sessions.end(second).unwrap().node, "c");
    }

    #[test]
    fn append_and_equality() {
        let mut sessions = Sessions::new();
        let base = sessions.create("x", vec![hop("a", 0, "b", 0)], None).unwrap();
        let ext = sessions.create("x", vec![hop("b", 1, "c", 0)], None).unwrap();
        let joined = sessions.append(base, ext).unwrap();
        assert_eq!(sessions.get(joined).unwrap().parent(), Some(base));
        assert_eq!(sessions.forward(joined).unwrap().count(), 2);

        let again = sessions.append(base, ext).unwrap();
        assert_ne!(joined, again);
        assert_eq!(sessions.get(joined), sessions.get(again));
        assert!(sessions.equivalent(joined, again));
        assert!(!sessions.equivalent(joined, ext));
        assert_eq!(
            sessions.forward(SessionId(99)).err(),
            Some(SessionError::UnknownSession(SessionId(99)))
        );
    }
}
