// The set of live sessions and fan-out messaging across them.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use hearth_core::RoomId;
use tracing::{debug, warn};

use crate::session::{Session, SessionId};

/// Server-owned registry of connected sessions.
///
/// One mutex serializes join, leave and every enumeration, so a name check
/// and the insert that claims the name cannot interleave with another join. Broadcasts hold it
/// for the whole fan-out, which is safe because delivery never waits: each
/// recipient's mailbox either accepts the message immediately or drops it.
/// A recipient whose lifetime drop count reaches `max_dropped` is evicted in
/// the same pass.
pub struct SessionRegistry {
    sessions: Mutex<BTreeMap<SessionId, Arc<Session>>>,
    max_dropped: u64,
}

impl SessionRegistry {
    pub fn new(max_dropped: u64) -> Self {
        Self {
            sessions: Mutex::new(BTreeMap::new()),
            max_dropped: max_dropped.max(1),
        }
    }

    fn sessions(&self) -> MutexGuard<'_, BTreeMap<SessionId, Arc<Session>>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a session and share it.
    ///
    /// The session is handed back unregistered if its ID is already present
    /// or a live session already uses its name (case-insensitive).
    pub fn join(&self, session: Session) -> Result<Arc<Session>, Session> {
        let mut sessions = self.sessions();
        let taken = sessions.contains_key(&session.id())
            || sessions
                .values()
                .any(|s| s.name().eq_ignore_ascii_case(session.name()));
        if taken {
            return Err(session);
        }

        debug!("Session {} ({}) joined", session.id(), session.name());
        let session = Arc::new(session);
        sessions.insert(session.id(), Arc::clone(&session));
        Ok(session)
    }

    /// Remove a session, returning it if it was registered.
    pub fn leave(&self, id: SessionId) -> Option<Arc<Session>> {
        let removed = self.sessions().remove(&id);
        if let Some(session) = &removed {
            debug!("Session {} ({}) left", id, session.name());
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.sessions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions().is_empty()
    }

    /// Names of the sessions standing in `room`, excluding `except`.
    pub fn names_in_room(&self, room: RoomId, except: SessionId) -> Vec<String> {
        self.sessions()
            .values()
            .filter(|s| s.id() != except && s.room() == room)
            .map(|s| s.name().to_string())
            .collect()
    }

    /// Send a message to every session except `except`, rendering it per
    /// recipient. Returns how many recipients accepted the message.
    pub fn broadcast<F>(&self, except: Option<SessionId>, render: F) -> usize
    where
        F: Fn(&Session) -> String,
    {
        let mut sessions = self.sessions();
        let mut delivered = 0;
        let mut to_evict = Vec::new();

        for session in sessions.values() {
            if Some(session.id()) == except {
                continue;
            }
            if session.send(render(session)) {
                delivered += 1;
                continue;
            }
            let drops = session.dropped();
            if drops >= self.max_dropped {
                warn!(
                    "Evicting session {} ({}) after {} dropped messages",
                    session.id(),
                    session.name(),
                    drops
                );
                to_evict.push(session.id());
            } else {
                warn!(
                    "Mailbox full for session {} ({}), message dropped (total {})",
                    session.id(),
                    session.name(),
                    drops
                );
            }
        }

        for id in to_evict {
            if let Some(session) = sessions.remove(&id) {
                session.evict();
            }
        }

        delivered
    }
}
