//! Settleable one-shot task handles
//!
//! A [`TaskHandle`] is the engine's replacement for "returns a future that
//! settles later": a cheap observer for a fade or piece transition that ends
//! in exactly one of two terminal states. Cancellation is cooperative - it
//! settles the handle but does not roll back work already done.
//!
//! Everything runs on one logical thread of control, so the shared state is
//! a plain `Rc<Cell<_>>`.

use std::cell::Cell;
use std::rc::Rc;

/// Terminal (or not-yet-terminal) state of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Still in flight
    Pending,

    /// Ran to completion
    Completed,

    /// Cancelled or superseded before completion
    Cancelled,
}

/// Observer for a cancellable, time-boxed task
///
/// Cloning yields another observer of the same task. Once settled, a
/// handle's outcome never changes.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    state: Rc<Cell<TaskOutcome>>,
}

impl TaskHandle {
    /// Create a handle for a task that is still in flight
    pub(crate) fn pending() -> Self {
        Self {
            state: Rc::new(Cell::new(TaskOutcome::Pending)),
        }
    }

    /// Create a handle that is already settled
    pub(crate) fn settled(outcome: TaskOutcome) -> Self {
        Self {
            state: Rc::new(Cell::new(outcome)),
        }
    }

    /// Settle the task. First settlement wins; later calls are no-ops.
    pub(crate) fn settle(&self, outcome: TaskOutcome) {
        if self.state.get() == TaskOutcome::Pending {
            self.state.set(outcome);
        }
    }

    /// Current outcome
    pub fn outcome(&self) -> TaskOutcome {
        self.state.get()
    }

    /// Check if the task has reached a terminal state
    pub fn is_settled(&self) -> bool {
        self.state.get() != TaskOutcome::Pending
    }

    /// Check if the task ran to completion
    pub fn is_completed(&self) -> bool {
        self.state.get() == TaskOutcome::Completed
    }

    /// Check if the task was cancelled
    pub fn is_cancelled(&self) -> bool {
        self.state.get() == TaskOutcome::Cancelled
    }
}
