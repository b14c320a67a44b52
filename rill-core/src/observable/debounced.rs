//! Quiet-window coalescing.
//!
//! A debounced node re-arms a one-shot timer on every source change and
//! forwards only the value that survives a full quiet window. The very
//! first delivery, the one that arrives while the node is connecting,
//! passes through synchronously so a fresh subscriber is not left
//! staring at nothing for a whole window.

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;

use crate::scheduler::{Scheduler, Timer};

use super::node::{Node, NodeCore, Observable, Subscription};
use super::value::Value;

pub(crate) struct DebouncedNode<T: 'static> {
    core: NodeCore<T>,
    weak_self: Weak<DebouncedNode<T>>,
    source: Observable<T>,
    delay: Duration,
    scheduler: Rc<dyn Scheduler>,
    timer: RefCell<Option<Timer>>,
    pending: RefCell<Value<T>>,
    subscription: RefCell<Option<Subscription>>,
}

pub(crate) fn debounced<T: 'static>(
    source: Observable<T>,
    delay: Duration,
    scheduler: Rc<dyn Scheduler>,
) -> Observable<T> {
    let node = Rc::new_cyclic(|weak| DebouncedNode {
        core: NodeCore::new(Value::Loading),
        weak_self: weak.clone(),
        source,
        delay,
        scheduler,
        timer: RefCell::new(None),
        pending: RefCell::new(Value::Loading),
        subscription: RefCell::new(None),
    });
    Observable::from_node(node)
}

impl<T: 'static> Node<T> for DebouncedNode<T> {
    fn core(&self) -> &NodeCore<T> {
        &self.core
    }

    fn on_connect(self: Rc<Self>) {
        let weak = self.weak_self.clone();
        let subscription = self.source.subscribe(move |value: &Value<T>| {
            let Some(node) = weak.upgrade() else {
                return;
            };
            if node.core.is_connecting() {
                node.core.fire_change(value.clone());
            } else {
                *node.pending.borrow_mut() = value.clone();
                node.arm_timer();
            }
        });
        *self.subscription.borrow_mut() = Some(subscription);
    }

    fn on_disconnect(&self) {
        self.core.reset(Value::Loading);
        *self.pending.borrow_mut() = Value::Loading;
        if let Some(timer) = self.timer.borrow().as_ref() {
            timer.cancel();
        }
        if let Some(subscription) = self.subscription.borrow_mut().take() {
            subscription.unsubscribe();
        }
    }
}

impl<T: 'static> DebouncedNode<T> {
    fn arm_timer(&self) {
        let mut timer = self.timer.borrow_mut();
        if timer.is_none() {
            let weak = self.weak_self.clone();
            *timer = Some(Timer::new(Rc::clone(&self.scheduler), move || {
                if let Some(node) = weak.upgrade() {
                    let pending = node.pending.borrow().clone();
                    node.core.fire_change(pending);
                }
            }));
        }
        if let Some(timer) = timer.as_ref() {
            // Re-arming resets the window; an earlier pending fire is
            // invalidated.
            timer.schedule(self.delay);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::observable::StateCell;
    use crate::scheduler::ManualScheduler;

    #[test]
    fn first_value_passes_through_synchronously() {
        let scheduler = Rc::new(ManualScheduler::new());
        let cell = StateCell::new(1);
        let calm = cell
            .observable()
            .debounce(Duration::from_millis(100), scheduler.clone());

        let heard: Rc<Cell<Option<i32>>> = Rc::new(Cell::new(None));
        let probe = Rc::clone(&heard);
        let _subscription = calm.subscribe(move |value: &Value<i32>| {
            probe.set(value.loaded().map(|loaded| **loaded));
        });
        assert_eq!(heard.get(), Some(1));
    }

    #[test]
    fn only_the_last_value_in_a_burst_fires() {
        let scheduler = Rc::new(ManualScheduler::new());
        let cell = StateCell::new(0);
        let calm = cell
            .observable()
            .debounce(Duration::from_millis(100), scheduler.clone());

        let heard: Rc<Cell<Option<i32>>> = Rc::new(Cell::new(None));
        let notifications = Rc::new(Cell::new(0));
        let value_probe = Rc::clone(&heard);
        let count_probe = Rc::clone(&notifications);
        let _subscription = calm.subscribe(move |value: &Value<i32>| {
            count_probe.set(count_probe.get() + 1);
            value_probe.set(value.loaded().map(|loaded| **loaded));
        });
        assert_eq!(notifications.get(), 1);

        cell.set(1);
        cell.set(2);
        cell.set(3);
        assert_eq!(heard.get(), Some(0));

        scheduler.run_all();
        assert_eq!(heard.get(), Some(3));
        // One notification for the whole burst.
        assert_eq!(notifications.get(), 2);
    }

    #[test]
    fn disconnect_discards_the_pending_value() {
        let scheduler = Rc::new(ManualScheduler::new());
        let cell = StateCell::new(0);
        let calm = cell
            .observable()
            .debounce(Duration::from_millis(100), scheduler.clone());

        let subscription = calm.subscribe(|_: &Value<i32>| {});
        cell.set(7);
        subscription.unsubscribe();
        scheduler.run_all();
        assert!(calm.is_loading());
    }
}
