#![allow(dead_code)]

use crate::clock::TimerId;

use super::SessionClock;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Pending,
    Worshipped,
    Ignored,
}

impl Outcome {
    pub fn is_resolved(self) -> bool {
        self != Outcome::Pending
    }
}

/// Single-shot countdown bound to one spawned item. Whichever of `act` and
/// `expire` runs first decides the outcome; the other becomes a no-op.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ItemTimer {
    token: TimerId,
    started_at: u64,
    duration: u64,
    outcome: Outcome,
}

impl ItemTimer {
    pub fn new(token: TimerId, started_at: u64, duration: u64) -> Self {
        Self {
            token,
            started_at,
            duration,
            outcome: Outcome::Pending,
        }
    }

    pub fn token(&self) -> TimerId {
        self.token
    }

    pub fn deadline(&self) -> u64 {
        self.started_at.saturating_add(self.duration)
    }

    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    /// User acted on the item. Cancels the countdown if it is still running.
    pub fn act(&mut self, clock: &mut SessionClock) -> Option<Outcome> {
        if self.outcome.is_resolved() {
            return None;
        }
        clock.cancel(self.token);
        self.outcome = Outcome::Worshipped;
        Some(self.outcome)
    }

    /// Countdown ran out.
    pub fn expire(&mut self) -> Option<Outcome> {
        if self.outcome.is_resolved() {
            return None;
        }
        self.outcome = Outcome::Ignored;
        Some(self.outcome)
    }

    /// Drops the countdown without resolving, used when the item leaves the
    /// stage before either side fired.
    pub fn disarm(&self, clock: &mut SessionClock) {
        clock.cancel(self.token);
    }
}
