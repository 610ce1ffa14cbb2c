//! Cooperative virtual clock.
//!
//! All timed work in a session (line reveals, spawn ticks, item countdowns,
//! resource ticks) is a timer on this clock. Time only moves when the frame
//! driver calls [`Clock::pop_due`] / [`Clock::settle`], and due timers are
//! handed out one at a time so each runs to completion before the next one
//! is looked at. A timer cancelled by an earlier callback never fires.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Fired<S, T> {
    pub id: TimerId,
    pub scope: S,
    pub task: T,
    pub at: u64,
}

#[derive(Clone, Debug)]
struct Entry<S, T> {
    id: TimerId,
    scope: S,
    task: T,
    period: Option<u64>,
}

#[derive(Clone, Debug)]
pub struct Clock<S, T> {
    now: u64,
    next_id: u64,
    next_order: u64,
    queue: BTreeMap<(u64, u64), Entry<S, T>>,
    index: HashMap<TimerId, (u64, u64)>,
}

impl<S, T> Default for Clock<S, T> {
    fn default() -> Self {
        Self {
            now: 0,
            next_id: 0,
            next_order: 0,
            queue: BTreeMap::new(),
            index: HashMap::new(),
        }
    }
}

impl<S: Copy + PartialEq, T: Copy> Clock<S, T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> u64 {
        self.now
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn is_scheduled(&self, id: TimerId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn deadline(&self, id: TimerId) -> Option<u64> {
        self.index.get(&id).map(|(due, _)| *due)
    }

    pub fn schedule_once(&mut self, scope: S, delay: u64, task: T) -> TimerId {
        self.insert(scope, delay, task, None)
    }

    /// First fire after `delay`, then every `period` until cancelled.
    pub fn schedule_every(&mut self, scope: S, delay: u64, period: u64, task: T) -> TimerId {
        self.insert(scope, delay, task, Some(period.max(1)))
    }

    /// Takes effect from the next re-arm; the pending deadline is kept.
    pub fn set_period(&mut self, id: TimerId, period: u64) -> bool {
        let Some(key) = self.index.get(&id) else {
            return false;
        };
        match self.queue.get_mut(key) {
            Some(entry) if entry.period.is_some() => {
                entry.period = Some(period.max(1));
                true
            }
            _ => false,
        }
    }

    /// Moves a pending timer to `now + delay`, keeping its id, scope and
    /// period.
    pub fn reschedule(&mut self, id: TimerId, delay: u64) -> bool {
        let Some(key) = self.index.remove(&id) else {
            return false;
        };
        let Some(entry) = self.queue.remove(&key) else {
            return false;
        };
        let moved = (self.now.saturating_add(delay), self.take_order());
        self.index.insert(id, moved);
        self.queue.insert(moved, entry);
        true
    }

    pub fn cancel(&mut self, id: TimerId) -> bool {
        match self.index.remove(&id) {
            Some(key) => self.queue.remove(&key).is_some(),
            None => false,
        }
    }

    /// Drops every timer owned by `scope`, returning how many were live.
    pub fn cancel_scope(&mut self, scope: S) -> usize {
        let doomed: Vec<(u64, u64)> = self
            .queue
            .iter()
            .filter(|(_, entry)| entry.scope == scope)
            .map(|(key, _)| *key)
            .collect();
        for key in &doomed {
            if let Some(entry) = self.queue.remove(key) {
                self.index.remove(&entry.id);
            }
        }
        doomed.len()
    }

    /// Pops the earliest timer due at or before `until` and moves `now` to its
    /// deadline. Recurring timers are re-armed before being returned.
    pub fn pop_due(&mut self, until: u64) -> Option<Fired<S, T>> {
        let (&key, _) = self.queue.first_key_value()?;
        if key.0 > until {
            return None;
        }
        let entry = self.queue.remove(&key)?;
        self.index.remove(&entry.id);
        self.now = self.now.max(key.0);

        if let Some(period) = entry.period {
            let rearm = (key.0 + period, self.take_order());
            self.index.insert(entry.id, rearm);
            self.queue.insert(rearm, entry.clone());
        }

        Some(Fired {
            id: entry.id,
            scope: entry.scope,
            task: entry.task,
            at: key.0,
        })
    }

    /// Moves `now` forward once nothing else is due.
    pub fn settle(&mut self, until: u64) {
        self.now = self.now.max(until);
    }

    fn insert(&mut self, scope: S, delay: u64, task: T, period: Option<u64>) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        let key = (self.now.saturating_add(delay), self.take_order());
        self.index.insert(id, key);
        self.queue.insert(
            key,
            Entry {
                id,
                scope,
                task,
                period,
            },
        );
        id
    }

    fn take_order(&mut self) -> u64 {
        let order = self.next_order;
        self.next_order += 1;
        order
    }
}
