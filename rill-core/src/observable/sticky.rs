//! First-value freeze.
//!
//! A sticky node waits for the first value its source produces, keeps
//! it forever, and releases the source immediately. Later source
//! changes, disconnects, and reconnects leave the captured value
//! untouched. Useful for expensive sources whose first answer is good
//! enough for the lifetime of the consumer.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use super::node::{Node, NodeCore, Observable, Subscription};
use super::value::Value;

pub(crate) struct StickyNode<T: 'static> {
    core: NodeCore<T>,
    weak_self: Weak<StickyNode<T>>,
    source: Observable<T>,
    subscription: RefCell<Option<Subscription>>,
}

pub(crate) fn sticky<T: 'static>(source: Observable<T>) -> Observable<T> {
    let node = Rc::new_cyclic(|weak| StickyNode {
        core: NodeCore::new(Value::Loading),
        weak_self: weak.clone(),
        source,
        subscription: RefCell::new(None),
    });
    Observable::from_node(node)
}

impl<T: 'static> Node<T> for StickyNode<T> {
    fn core(&self) -> &NodeCore<T> {
        &self.core
    }

    fn on_connect(self: Rc<Self>) {
        // A previous connection may already have captured the value.
        if self.core.value().is_loaded() {
            return;
        }

        let weak = self.weak_self.clone();
        let subscription = self.source.subscribe(move |value: &Value<T>| {
            let Some(node) = weak.upgrade() else {
                return;
            };
            if node.core.value().is_loaded() {
                return;
            }
            if value.is_loaded() {
                node.core.fire_change(value.clone());
                // If the subscribe call is still in progress, there is
                // no handle to release yet; on_connect takes care of it.
                if let Some(subscription) = node.subscription.borrow_mut().take() {
                    subscription.unsubscribe();
                }
            }
        });

        if self.core.value().is_loaded() {
            // The source produced its value during the subscribe call
            // itself; release it right away.
            subscription.unsubscribe();
        } else {
            *self.subscription.borrow_mut() = Some(subscription);
        }
    }

    fn on_disconnect(&self) {
        if let Some(subscription) = self.subscription.borrow_mut().take() {
            subscription.unsubscribe();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::observable::{PendingCell, StateCell};
    use crate::scheduler::ManualScheduler;

    #[test]
    fn captures_first_value_and_releases_source() {
        let cell = PendingCell::new();
        let frozen = cell.observable().sticky();

        let heard: Rc<Cell<Option<i32>>> = Rc::new(Cell::new(None));
        let probe = Rc::clone(&heard);
        let _subscription = frozen.subscribe(move |value: &Value<i32>| {
            probe.set(value.loaded().map(|loaded| **loaded));
        });
        assert_eq!(heard.get(), None);
        assert!(cell.observable().is_connected());

        cell.set(42);
        assert_eq!(heard.get(), Some(42));
        // The source is released the moment the value lands.
        assert!(!cell.observable().is_connected());

        // Later source changes no longer reach us.
        cell.set(43);
        assert_eq!(heard.get(), Some(42));
    }

    #[test]
    fn synchronous_source_is_released_during_connect() {
        let cell = StateCell::new(7);
        let frozen = cell.observable().sticky();

        assert_eq!(*frozen.wait_for().unwrap(), 7);
        assert!(!cell.observable().is_connected());
    }

    #[test]
    fn value_survives_reconnect() {
        let scheduler = Rc::new(ManualScheduler::new());
        let cell = StateCell::new(1);
        let frozen = cell
            .observable()
            .transform_with(scheduler.clone(), |n: &i32| *n)
            .sticky();

        let subscription = frozen.subscribe(|_: &Value<i32>| {});
        assert_eq!(*frozen.wait_for().unwrap(), 1);
        subscription.unsubscribe();

        cell.set(2);
        scheduler.run_all();

        // Reconnect does not resubscribe; the first capture stands.
        assert_eq!(*frozen.wait_for().unwrap(), 1);
        assert!(!cell.observable().is_connected());
    }
}
