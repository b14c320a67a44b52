//! Incremental computation: a long-running task sliced into scheduler
//! steps.
//!
//! Each step runs as its own scheduled task, so other work interleaves
//! between steps. A step may publish an intermediate result; the last
//! step publishes the final one. If every observer leaves mid-run the
//! next step finds the node disconnected and stops rescheduling, and a
//! completed task is not restarted on reconnect.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::scheduler::Scheduler;

use super::node::{Node, NodeCore, Observable};
use super::value::Value;

/// A computation that proceeds in chunks.
pub trait IncrementalTask<T> {
    /// Runs one chunk of work. Returns the result so far, or `None` if
    /// there is nothing to show yet.
    fn execute(&mut self) -> Option<T>;

    /// Whether the computation has finished.
    fn is_done(&self) -> bool;
}

pub(crate) struct IncrementalNode<T: 'static> {
    core: NodeCore<T>,
    weak_self: Weak<IncrementalNode<T>>,
    scheduler: Rc<dyn Scheduler>,
    task: RefCell<Box<dyn IncrementalTask<T>>>,
    completed: Cell<bool>,
}

pub(crate) fn incremental<T: 'static>(
    task: Box<dyn IncrementalTask<T>>,
    scheduler: Rc<dyn Scheduler>,
) -> Observable<T> {
    let node = Rc::new_cyclic(|weak| IncrementalNode {
        core: NodeCore::new(Value::Loading),
        weak_self: weak.clone(),
        scheduler,
        task: RefCell::new(task),
        completed: Cell::new(false),
    });
    Observable::from_node(node)
}

impl<T: 'static> Node<T> for IncrementalNode<T> {
    fn core(&self) -> &NodeCore<T> {
        &self.core
    }

    fn on_connect(self: Rc<Self>) {
        if !self.completed.get() {
            self.schedule_step();
        }
    }
}

impl<T: 'static> IncrementalNode<T> {
    fn schedule_step(&self) {
        let weak = self.weak_self.clone();
        self.scheduler.schedule(Box::new(move || {
            let Some(node) = weak.upgrade() else {
                return;
            };
            // Cooperative cancellation: nobody is listening anymore.
            if !node.core.is_connected() && !node.core.is_connecting() {
                return;
            }
            let result = node.task.borrow_mut().execute();
            node.core.fire_change(match result {
                Some(value) => Value::of(value),
                None => Value::Loading,
            });
            if node.task.borrow().is_done() {
                node.completed.set(true);
            } else {
                node.schedule_step();
            }
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observable::Observable;
    use crate::scheduler::ManualScheduler;

    /// Sums 1..=total one addend per step, publishing the running sum.
    struct SlowSum {
        total: i32,
        next: i32,
        sum: i32,
    }

    impl SlowSum {
        fn new(total: i32) -> Self {
            SlowSum {
                total,
                next: 1,
                sum: 0,
            }
        }
    }

    impl IncrementalTask<i32> for SlowSum {
        fn execute(&mut self) -> Option<i32> {
            self.sum += self.next;
            self.next += 1;
            Some(self.sum)
        }

        fn is_done(&self) -> bool {
            self.next > self.total
        }
    }

    #[test]
    fn publishes_intermediate_and_final_results() {
        let scheduler = Rc::new(ManualScheduler::new());
        let sum = Observable::incremental(Box::new(SlowSum::new(4)), scheduler.clone());

        let seen: Rc<RefCell<Vec<Option<i32>>>> = Rc::new(RefCell::new(Vec::new()));
        let probe = Rc::clone(&seen);
        let _subscription = sum.subscribe(move |value: &Value<i32>| {
            probe.borrow_mut().push(value.loaded().map(|loaded| **loaded));
        });

        // Steps run one per pump; each publishes its running sum.
        while scheduler.pending() > 0 {
            scheduler.run_all();
        }
        assert_eq!(
            *seen.borrow(),
            vec![None, Some(1), Some(3), Some(6), Some(10)]
        );
    }

    #[test]
    fn stops_when_all_observers_leave() {
        let scheduler = Rc::new(ManualScheduler::new());
        let sum = Observable::incremental(Box::new(SlowSum::new(100)), scheduler.clone());

        let subscription = sum.subscribe(|_: &Value<i32>| {});
        scheduler.run_all();
        scheduler.run_all();
        subscription.unsubscribe();

        // The already-queued step notices the disconnect and does not
        // reschedule.
        scheduler.run_all();
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn completed_task_is_not_restarted() {
        let scheduler = Rc::new(ManualScheduler::new());
        let sum = Observable::incremental(Box::new(SlowSum::new(2)), scheduler.clone());

        let subscription = sum.subscribe(|_: &Value<i32>| {});
        while scheduler.pending() > 0 {
            scheduler.run_all();
        }
        subscription.unsubscribe();

        // Reconnect: the final value is served from the slot, with no
        // new steps scheduled.
        assert_eq!(*sum.wait_for().unwrap(), 3);
        assert_eq!(scheduler.pending(), 0);
    }
}
