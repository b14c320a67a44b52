//! The test pump: nothing runs until the test says so.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::time::Duration;

use super::{Scheduler, Task};

/// A scheduler whose queue is drained explicitly by [`run_all`].
///
/// Delays are ignored: a delayed task joins the same FIFO queue as an
/// immediate one (documented escape hatch for deterministic tests;
/// timer-based nodes guard against early fires themselves).
///
/// [`run_all`]: ManualScheduler::run_all
#[derive(Default)]
pub struct ManualScheduler {
    queue: RefCell<VecDeque<Task>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        ManualScheduler::default()
    }

    /// The number of queued tasks.
    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Runs everything queued so far. Tasks that schedule more work
    /// while running leave that work for the next call, so each call is
    /// one well-defined "tick".
    pub fn run_all(&self) {
        let batch: Vec<Task> = self.queue.borrow_mut().drain(..).collect();
        for task in batch {
            task();
        }
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, task: Task) {
        self.queue.borrow_mut().push_back(task);
    }

    fn schedule_after(&self, _delay: Duration, task: Task) {
        self.queue.borrow_mut().push_back(task);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    #[test]
    fn nothing_runs_until_pumped() {
        let scheduler = ManualScheduler::new();
        let log: Rc<RefCell<Vec<i32>>> = Rc::new(RefCell::new(Vec::new()));

        for i in 0..3 {
            let log = Rc::clone(&log);
            scheduler.schedule(Box::new(move || log.borrow_mut().push(i)));
        }
        assert!(log.borrow().is_empty());
        assert_eq!(scheduler.pending(), 3);

        scheduler.run_all();
        assert_eq!(*log.borrow(), vec![0, 1, 2]);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn rescheduled_work_waits_for_the_next_tick() {
        let scheduler = Rc::new(ManualScheduler::new());
        let log: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(Vec::new()));

        let inner_log = Rc::clone(&log);
        let inner_scheduler = Rc::clone(&scheduler);
        scheduler.schedule(Box::new(move || {
            inner_log.borrow_mut().push("first");
            let log = Rc::clone(&inner_log);
            inner_scheduler.schedule(Box::new(move || log.borrow_mut().push("second")));
        }));

        scheduler.run_all();
        assert_eq!(*log.borrow(), vec!["first"]);
        scheduler.run_all();
        assert_eq!(*log.borrow(), vec!["first", "second"]);
    }
}
