// Live player sessions and their bounded outbound mailboxes.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use hearth_core::RoomId;
use tokio::sync::{mpsc, Notify};

/// Process-unique session identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Mailbox
// ---------------------------------------------------------------------------

/// Sending half of a session's outbound queue.
///
/// Delivery never waits: when the queue is full (or the transport has gone
/// away) the message is dropped and counted. The transport owns the receiving
/// half and drains it to the socket.
#[derive(Debug)]
pub struct Mailbox {
    tx: mpsc::Sender<String>,
    dropped: AtomicU64,
}

impl Mailbox {
    /// Create a mailbox holding at most `capacity` undelivered messages.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                tx,
                dropped: AtomicU64::new(0),
            },
            rx,
        )
    }

    /// Queue a message. Returns `false` (and bumps the drop counter) if the
    /// queue is full or closed.
    pub fn send(&self, message: impl Into<String>) -> bool {
        if self.tx.try_send(message.into()).is_ok() {
            true
        } else {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Messages dropped over the mailbox's lifetime.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A connected player.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    name: String,
    prompt: String,
    /// Current location. Only a lookup key into the world graph.
    room: RoomId,
    mailbox: Mailbox,
    evicted: AtomicBool,
    eviction: Notify,
}

impl Session {
    pub fn new(
        id: SessionId,
        name: impl Into<String>,
        prompt: impl Into<String>,
        room: RoomId,
        mailbox: Mailbox,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            prompt: prompt.into(),
            room,
            mailbox,
            evicted: AtomicBool::new(false),
            eviction: Notify::new(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn room(&self) -> RoomId {
        self.room
    }

    /// Queue text for this player. See [`Mailbox::send`].
    pub fn send(&self, message: impl Into<String>) -> bool {
        self.mailbox.send(message)
    }

    pub fn dropped(&self) -> u64 {
        self.mailbox.dropped()
    }

    /// Give up the session, keeping its outbound queue. Used when the
    /// registry refuses the session and the player must pick again.
    pub fn into_mailbox(self) -> Mailbox {
        self.mailbox
    }

    /// Mark the session as forcibly disconnected and wake its session loop.
    pub fn evict(&self) {
        self.evicted.store(true, Ordering::SeqCst);
        self.eviction.notify_one();
    }

    pub fn is_evicted(&self) -> bool {
        self.evicted.load(Ordering::SeqCst)
    }

    /// Resolves once the session has been evicted.
    pub async fn evicted(&self) {
        if self.is_evicted() {
            return;
        }
        self.eviction.notified().await;
    }
}
