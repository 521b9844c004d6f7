//! Session context token
//!
//! The transport opens sessions; the codec receives a token for the session a
//! call arrived on with every read. The dispatcher never looks inside it.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque per-session token threaded through codec reads
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionContext {
    id: u64,
    peer: Option<String>,
}

impl SessionContext {
    /// Allocate a new session with a process-unique id
    pub fn new() -> Self {
        Self {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            peer: None,
        }
    }

    /// Allocate a new session bound to a peer address
    pub fn with_peer(peer: impl Into<String>) -> Self {
        Self {
            peer: Some(peer.into()),
            ..Self::new()
        }
    }

    /// Session id
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Peer the session is connected to, if known
    pub fn peer(&self) -> Option<&str> {
        self.peer.as_deref()
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.peer {
            Some(peer) => write!(f, "Session({}@{})", self.id, peer),
            None => write!(f, "Session({})", self.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_ids_unique() {
        let a = SessionContext::new();
        let b = SessionContext::with_peer("10.0.0.1:135");
        assert_ne!(a.id(), b.id());
        assert_eq!(b.peer(), Some("10.0.0.1:135"));
        assert_eq!(a.peer(), None);
    }
}
