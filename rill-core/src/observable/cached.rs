//! Equality-gated forwarding.
//!
//! Identity-based change detection reports a change whenever a source
//! reallocates, even if the new value is equal to the old one. A cached
//! node sits in front of such a source and forwards only values that
//! fail a caller-supplied equality predicate against the last value it
//! let through, cutting redundant recomputation out of everything
//! downstream.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use super::node::{Node, NodeCore, Observable, Subscription};
use super::value::Value;

pub(crate) struct CachedNode<T: 'static> {
    core: NodeCore<T>,
    weak_self: Weak<CachedNode<T>>,
    source: Observable<T>,
    same: Box<dyn Fn(&T, &T) -> bool>,
    subscription: RefCell<Option<Subscription>>,
}

pub(crate) fn cached<T: 'static>(
    source: Observable<T>,
    same: Box<dyn Fn(&T, &T) -> bool>,
) -> Observable<T> {
    let node = Rc::new_cyclic(|weak| CachedNode {
        core: NodeCore::new(Value::Loading),
        weak_self: weak.clone(),
        source,
        same,
        subscription: RefCell::new(None),
    });
    Observable::from_node(node)
}

impl<T: 'static> Node<T> for CachedNode<T> {
    fn core(&self) -> &NodeCore<T> {
        &self.core
    }

    fn on_connect(self: Rc<Self>) {
        let weak = self.weak_self.clone();
        let subscription = self.source.subscribe(move |value: &Value<T>| {
            if let Some(node) = weak.upgrade() {
                node.source_changed(value);
            }
        });
        *self.subscription.borrow_mut() = Some(subscription);
    }

    fn on_disconnect(&self) {
        // The last forwarded value is kept: if the source reproduces an
        // equal value on reconnect, downstream stays quiet.
        if let Some(subscription) = self.subscription.borrow_mut().take() {
            subscription.unsubscribe();
        }
    }
}

impl<T: 'static> CachedNode<T> {
    fn source_changed(&self, value: &Value<T>) {
        let current = self.core.value();
        match (current.loaded(), value.loaded()) {
            (None, None) => {}
            (Some(old), Some(new)) => {
                if !(self.same)(old, new) {
                    self.core.fire_change(value.clone());
                }
            }
            _ => self.core.fire_change(value.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::observable::StateCell;

    #[test]
    fn equal_values_are_suppressed() {
        let cell = StateCell::new(String::from("a"));
        let gated = cell.observable().cache_if_equal();

        let notifications = Rc::new(Cell::new(0));
        let probe = Rc::clone(&notifications);
        let _subscription = gated.subscribe(move |_: &Value<String>| {
            probe.set(probe.get() + 1);
        });
        assert_eq!(notifications.get(), 1);

        // Fresh allocation, equal content: swallowed.
        cell.set(String::from("a"));
        assert_eq!(notifications.get(), 1);

        cell.set(String::from("b"));
        assert_eq!(notifications.get(), 2);
    }

    #[test]
    fn downstream_recomputation_is_skipped_across_reconnects() {
        let cell = StateCell::new(1);
        let computations = Rc::new(Cell::new(0));
        let count_probe = Rc::clone(&computations);
        let derived = cell.observable().cache_if_equal().transform(move |n: &i32| {
            count_probe.set(count_probe.get() + 1);
            n * 10
        });

        for _ in 0..3 {
            assert_eq!(*derived.wait_for().unwrap(), 10);
        }
        // The gate remembered the value across reconnects, so the
        // transform ran once.
        assert_eq!(computations.get(), 1);
    }

    #[test]
    fn custom_predicate_decides_sameness() {
        let cell = StateCell::new(10);
        // Same decade counts as the same value.
        let by_decade = cell.observable().cache(|a, b| a / 10 == b / 10);

        let notifications = Rc::new(Cell::new(0));
        let probe = Rc::clone(&notifications);
        let _subscription = by_decade.subscribe(move |_: &Value<i32>| {
            probe.set(probe.get() + 1);
        });
        assert_eq!(notifications.get(), 1);

        cell.set(17);
        assert_eq!(notifications.get(), 1);
        cell.set(23);
        assert_eq!(notifications.get(), 2);
    }
}
