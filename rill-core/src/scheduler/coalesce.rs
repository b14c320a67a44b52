//! Collapsing repeated schedules into one run.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use super::{Scheduler, Task};

/// Wraps an inner scheduler so that repeated [`schedule`] calls before
/// the queued drain runs replace the pending task instead of queueing
/// behind it: only the latest task actually executes.
///
/// Useful in front of a recompute-happy node whose inputs change in
/// bursts; the node recomputes once per burst. Delayed tasks pass
/// through to the inner scheduler untouched.
///
/// [`schedule`]: Scheduler::schedule
pub struct CoalescingScheduler {
    inner: Rc<dyn Scheduler>,
    pending: Rc<RefCell<Option<Task>>>,
}

impl CoalescingScheduler {
    pub fn new(inner: Rc<dyn Scheduler>) -> Self {
        CoalescingScheduler {
            inner,
            pending: Rc::new(RefCell::new(None)),
        }
    }
}

impl Scheduler for CoalescingScheduler {
    fn schedule(&self, task: Task) {
        let drain_queued = self.pending.borrow().is_some();
        *self.pending.borrow_mut() = Some(task);
        if drain_queued {
            return;
        }
        let slot = Rc::clone(&self.pending);
        self.inner.schedule(Box::new(move || {
            let task = slot.borrow_mut().take();
            if let Some(task) = task {
                task();
            }
        }));
    }

    fn schedule_after(&self, delay: Duration, task: Task) {
        self.inner.schedule_after(delay, task);
    }
}
