//! One-shot timers for reconnect backoff
//!
//! `setTimeout`/`clearTimeout` on web; [`ManualScheduler`] is a virtual clock
//! for tests and headless runs.

use std::cell::{Cell, RefCell};
use std::time::Duration;

use super::error::SchedulerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(pub u64);

pub trait Scheduler {
    /// Run `task` once after `delay`. On error the task is dropped unrun.
    fn schedule(&self, delay: Duration, task: Box<dyn FnOnce()>) -> Result<TimerId, SchedulerError>;
    /// Cancel a pending task. Unknown or already-fired ids are ignored.
    fn cancel(&self, id: TimerId);
}

struct PendingTask {
    id: TimerId,
    due: Duration,
    task: Box<dyn FnOnce()>,
}

/// Virtual-time scheduler; tasks run only inside [`advance`](Self::advance)
#[derive(Default)]
pub struct ManualScheduler {
    now: Cell<Duration>,
    next_id: Cell<u64>,
    pending: RefCell<Vec<PendingTask>>,
    history: RefCell<Vec<Duration>>,
    refusals_left: Cell<u32>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` calls to `schedule` fail
    pub fn refuse_next(&self, n: u32) {
        self.refusals_left.set(n);
    }

    pub fn now(&self) -> Duration {
        self.now.get()
    }

    pub fn pending(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Delays of every task ever scheduled, in order
    pub fn history(&self) -> Vec<Duration> {
        self.history.borrow().clone()
    }

    /// Move the clock forward, running due tasks in due order. Tasks may
    /// schedule further tasks; those run too if they fall due in the window.
    pub fn advance(&self, by: Duration) {
        let target = self.now.get() + by;
        loop {
            let next = {
                let mut pending = self.pending.borrow_mut();
                let earliest = pending
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| t.due <= target)
                    .min_by_key(|(_, t)| (t.due, t.id.0))
                    .map(|(i, _)| i);
                earliest.map(|i| pending.remove(i))
            };
            let Some(task) = next else { break };
            self.now.set(task.due);
            (task.task)();
        }
        self.now.set(target);
    }

    /// Run everything pending, however far in the future
    pub fn run_all(&self) {
        loop {
            let latest = self.pending.borrow().iter().map(|t| t.due).max();
            let Some(due) = latest else { break };
            self.advance(due.saturating_sub(self.now.get()));
        }
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, task: Box<dyn FnOnce()>) -> Result<TimerId, SchedulerError> {
        let refusals = self.refusals_left.get();
        if refusals > 0 {
            self.refusals_left.set(refusals - 1);
            return Err(SchedulerError::Rejected("refused by test clock".to_string()));
        }
        let id = TimerId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.history.borrow_mut().push(delay);
        self.pending.borrow_mut().push(PendingTask {
            id,
            due: self.now.get() + delay,
            task,
        });
        Ok(id)
    }

    fn cancel(&self, id: TimerId) {
        self.pending.borrow_mut().retain(|t| t.id != id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn test_runs_in_due_order() {
        let scheduler = ManualScheduler::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        for (name, ms) in [("b", 20u64), ("a", 10), ("c", 30)] {
            let log = log.clone();
            scheduler
                .schedule(Duration::from_millis(ms), Box::new(move || log.borrow_mut().push(name)))
                .unwrap();
        }
        scheduler.advance(Duration::from_millis(25));
        assert_eq!(*log.borrow(), ["a", "b"]);
        assert_eq!(scheduler.pending(), 1);
        scheduler.run_all();
        assert_eq!(*log.borrow(), ["a", "b", "c"]);
    }

    #[test]
    fn test_cancel() {
        let scheduler = ManualScheduler::new();
        let fired = Rc::new(Cell::new(false));
        let flag = fired.clone();
        let id = scheduler
            .schedule(Duration::from_millis(5), Box::new(move || flag.set(true)))
            .unwrap();
        scheduler.cancel(id);
        scheduler.advance(Duration::from_secs(1));
        assert!(!fired.get());
        assert_eq!(scheduler.history(), [Duration::from_millis(5)]);
    }

    #[test]
    fn test_refused_task_is_dropped() {
        let scheduler = ManualScheduler::new();
        scheduler.refuse_next(1);
        let fired = Rc::new(Cell::new(false));
        let flag = fired.clone();
        let refused = scheduler.schedule(Duration::from_millis(5), Box::new(move || flag.set(true)));
        assert!(matches!(refused, Err(SchedulerError::Rejected(_))));
        assert_eq!(scheduler.pending(), 0);
        scheduler.run_all();
        assert!(!fired.get());

        assert!(scheduler.schedule(Duration::from_millis(5), Box::new(|| {})).is_ok());
        assert_eq!(scheduler.pending(), 1);
    }
}
