// Monotonic exit identity source.

use std::sync::atomic::{AtomicI64, Ordering};

use crate::error::IdExhausted;
use crate::model::{ExitId, World};

/// Thread-safe, strictly increasing source of [`ExitId`]s.
///
/// The counter holds the last ID handed out (0 before the first allocation),
/// so a fresh allocator starts at 1.
#[derive(Debug, Default)]
pub struct IdAllocator {
    last: AtomicI64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next exit ID. Never repeats within the process; once the
    /// counter reaches `i64::MAX` every call fails.
    pub fn next_id(&self) -> Result<ExitId, IdExhausted> {
        self.last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| last.checked_add(1))
            .map(|prev| ExitId(prev + 1))
            .map_err(|_| IdExhausted)
    }

    /// Raise the counter past every exit already present in `world`, so the
    /// next allocation is `max(exit id) + 1`.
    ///
    /// The counter only ever moves forward: seeding from a graph whose exits
    /// are all below the current position is a no-op. Call this before minting
    /// any exit that will be saved into a store that may already hold exits.
    pub fn seed_from_graph(&self, world: &World) {
        if let Some(max) = world.max_exit_id() {
            self.last.fetch_max(max.0, Ordering::SeqCst);
        }
    }
}
