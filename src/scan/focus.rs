// SPDX-License-Identifier: GPL-3.0-only

//! Autofocus scheduling
//!
//! Each autofocus request gets a cycle number. A completion only applies
//! when it belongs to the cycle still in progress, so a late result from an
//! abandoned cycle cannot move the schedule.

use std::time::{Duration, Instant};
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FocusState {
    /// No camera
    Disabled,
    /// Next cycle due at the given time
    Waiting(Instant),
    /// A request is outstanding
    InProgress(u64),
}

/// When to trigger the next autofocus cycle
#[derive(Debug, Clone)]
pub struct FocusSchedule {
    state: FocusState,
    next_cycle: u64,
    interval: Duration,
}

impl FocusSchedule {
    /// Disabled schedule rescheduling `interval` after each successful cycle
    pub fn new(interval: Duration) -> Self {
        Self {
            state: FocusState::Disabled,
            next_cycle: 0,
            interval,
        }
    }

    /// Make a cycle due immediately, abandoning any outstanding one
    pub fn schedule_now(&mut self, now: Instant) {
        self.state = FocusState::Waiting(now);
    }

    /// Stop scheduling (camera closed)
    pub fn disable(&mut self) {
        self.state = FocusState::Disabled;
    }

    /// Start a cycle if one is due, returning its number
    pub fn begin_if_due(&mut self, now: Instant) -> Option<u64> {
        match self.state {
            FocusState::Waiting(due) if now >= due => {
                let cycle = self.next_cycle;
                self.next_cycle += 1;
                self.state = FocusState::InProgress(cycle);
                trace!(cycle, "Autofocus cycle started");
                Some(cycle)
            }
            _ => None,
        }
    }

    /// Apply the outcome of `cycle`
    ///
    /// Success waits a full interval before the next cycle, failure retries
    /// right away. Returns `false` when the result is stale and was ignored.
    pub fn complete(&mut self, cycle: u64, success: bool, now: Instant) -> bool {
        if self.state != FocusState::InProgress(cycle) {
            trace!(cycle, "Ignoring stale autofocus result");
            return false;
        }
        let next = if success { now + self.interval } else { now };
        self.state = FocusState::Waiting(next);
        true
    }

    /// Time of the next cycle, `None` while disabled or in progress
    pub fn next_focus_time(&self) -> Option<Instant> {
        match self.state {
            FocusState::Waiting(due) => Some(due),
            _ => None,
        }
    }

    pub fn is_in_progress(&self) -> bool {
        matches!(self.state, FocusState::InProgress(_))
    }

    pub fn is_disabled(&self) -> bool {
        self.state == FocusState::Disabled
    }
}
