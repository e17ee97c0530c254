// SPDX-License-Identifier: GPL-3.0-only

//! Session state and deferred actions
//!
//! Every configuration change reaches the control loop as a closure pushed
//! onto an [`ActionQueue`]. The queue and the session state share one lock,
//! so a push can never slip in after the state turned [`SessionState::Destroyed`].

use crate::errors::AppResult;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tracing::trace;

/// Lifecycle of a scan session; transitions are one-way
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NotStarted,
    Running,
    Destroyed,
}

/// Deferred operation run on the control loop thread against its state `T`
pub type Action<T> = Box<dyn FnOnce(&mut T) -> AppResult<()> + Send>;

struct Shared<T> {
    state: SessionState,
    actions: VecDeque<Action<T>>,
}

/// Thread-safe FIFO of actions plus the session state flag
pub struct ActionQueue<T> {
    shared: Arc<Mutex<Shared<T>>>,
}

impl<T> Clone for ActionQueue<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Default for ActionQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ActionQueue<T> {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared {
                state: SessionState::NotStarted,
                actions: VecDeque::new(),
            })),
        }
    }

    pub fn state(&self) -> SessionState {
        self.shared.lock().unwrap_or_else(|e| e.into_inner()).state
    }

    /// `NotStarted → Running`; returns whether the transition happened
    pub fn start(&self) -> bool {
        let mut shared = self.shared.lock().unwrap_or_else(|e| e.into_inner());
        if shared.state != SessionState::NotStarted {
            return false;
        }
        shared.state = SessionState::Running;
        true
    }

    /// Move to `Destroyed` and drop pending actions; idempotent
    ///
    /// Returns whether this call performed the transition.
    pub fn destroy(&self) -> bool {
        let mut shared = self.shared.lock().unwrap_or_else(|e| e.into_inner());
        if shared.state == SessionState::Destroyed {
            return false;
        }
        shared.state = SessionState::Destroyed;
        let dropped = shared.actions.len();
        shared.actions.clear();
        if dropped > 0 {
            trace!(dropped, "Discarded pending actions");
        }
        true
    }

    /// Append an action; silently dropped once the session is destroyed
    ///
    /// Actions pushed before `start` are kept and run on the first drain.
    pub fn push<F>(&self, action: F) -> bool
    where
        F: FnOnce(&mut T) -> AppResult<()> + Send + 'static,
    {
        let mut shared = self.shared.lock().unwrap_or_else(|e| e.into_inner());
        if shared.state == SessionState::Destroyed {
            return false;
        }
        shared.actions.push_back(Box::new(action));
        true
    }

    /// Take every pending action in FIFO order
    ///
    /// Returns `None` once the session is no longer running, which tells the
    /// loop to exit. The actions run outside the lock so they may push more.
    pub fn drain(&self) -> Option<VecDeque<Action<T>>> {
        let mut shared = self.shared.lock().unwrap_or_else(|e| e.into_inner());
        if shared.state != SessionState::Running {
            return None;
        }
        Some(std::mem::take(&mut shared.actions))
    }

    pub fn pending(&self) -> usize {
        self.shared
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .actions
            .len()
    }
}

/// Run drained actions in order, stopping at the first error
pub fn run_actions<T>(actions: VecDeque<Action<T>>, target: &mut T) -> AppResult<()> {
    for action in actions {
        action(target)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AppError;

    #[test]
    fn test_actions_run_in_fifo_order() {
        let queue: ActionQueue<Vec<u32>> = ActionQueue::new();
        for i in 0..5 {
            queue.push(move |log: &mut Vec<u32>| {
                log.push(i);
                Ok(())
            });
        }
        assert!(queue.drain().is_none());
        assert!(queue.start());
        let mut log = Vec::new();
        run_actions(queue.drain().unwrap(), &mut log).unwrap();
        assert_eq!(log, vec![0, 1, 2, 3, 4]);
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn test_push_after_destroy_is_dropped() {
        let queue: ActionQueue<u32> = ActionQueue::new();
        queue.start();
        queue.push(|n: &mut u32| {
            *n += 1;
            Ok(())
        });
        assert!(queue.destroy());
        assert!(!queue.destroy());
        assert!(!queue.push(|n: &mut u32| {
            *n += 1;
            Ok(())
        }));
        assert_eq!(queue.pending(), 0);
        assert!(queue.drain().is_none());
        assert_eq!(queue.state(), SessionState::Destroyed);
    }

    #[test]
    fn test_start_only_from_not_started() {
        let queue: ActionQueue<()> = ActionQueue::new();
        assert!(queue.start());
        assert!(!queue.start());
        queue.destroy();
        assert!(!queue.start());
    }

    #[test]
    fn test_run_stops_at_first_error() {
        let queue: ActionQueue<Vec<u32>> = ActionQueue::new();
        queue.start();
        queue.push(|log: &mut Vec<u32>| {
            log.push(1);
            Ok(())
        });
        queue.push(|_: &mut Vec<u32>| Err(AppError::Other("boom".into())));
        queue.push(|log: &mut Vec<u32>| {
            log.push(3);
            Ok(())
        });
        let mut log = Vec::new();
        assert!(run_actions(queue.drain().unwrap(), &mut log).is_err());
        assert_eq!(log, vec![1]);
    }
}
