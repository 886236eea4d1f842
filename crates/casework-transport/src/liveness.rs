//! Closed-loop keep-alive.
//!
//! Any inbound frame marks the connection alive. At each ping tick the alive
//! flag is checked and cleared; a connection that stayed silent for a whole
//! interval counts a miss. `max_missed` consecutive misses mean the peer is
//! gone even though the socket still looks open.

use std::sync::atomic::{AtomicBool, Ordering};

/// Alive flag plus missed-tick counter.
#[derive(Debug)]
pub struct Liveness {
    alive: AtomicBool,
    missed: u32,
    max_missed: u32,
}

/// Result of a keep-alive tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tick {
    /// Traffic seen since the last tick.
    Alive,
    /// Silent, but still within tolerance.
    Missed(u32),
    /// Silent for `max_missed` ticks in a row.
    TimedOut(u32),
}

impl Liveness {
    /// New tracker, initially alive. `max_missed` is clamped to at least 1.
    #[must_use]
    pub fn new(max_missed: u32) -> Self {
        Self {
            alive: AtomicBool::new(true),
            missed: 0,
            max_missed: max_missed.max(1),
        }
    }

    /// Record inbound traffic.
    pub fn mark_alive(&self) {
        self.alive.store(true, Ordering::Relaxed);
    }

    /// Check and clear the alive flag.
    pub fn tick(&mut self) -> Tick {
        if self.alive.swap(false, Ordering::Relaxed) {
            self.missed = 0;
            Tick::Alive
        } else {
            self.missed += 1;
            if self.missed >= self.max_missed {
                Tick::TimedOut(self.missed)
            } else {
                Tick::Missed(self.missed)
            }
        }
    }
}
