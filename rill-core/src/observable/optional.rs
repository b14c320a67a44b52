//! The always-loaded view of an observable.
//!
//! An optional node maps its source's slot into an `Option`: loading
//! becomes `None`, a value becomes `Some`. The result itself is never
//! loading, so downstream combinators that must produce *something*
//! even while a source loads (`or`, placeholder rendering) can build on
//! it.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use super::node::{Node, NodeCore, Observable, Subscription};
use super::value::Value;

pub(crate) struct OptionalNode<T: 'static> {
    core: NodeCore<Option<Rc<T>>>,
    weak_self: Weak<OptionalNode<T>>,
    source: Observable<T>,
    subscription: RefCell<Option<Subscription>>,
}

pub(crate) fn optional<T: 'static>(source: Observable<T>) -> Observable<Option<Rc<T>>> {
    let node = Rc::new_cyclic(|weak| OptionalNode {
        core: NodeCore::new(Value::of(None)),
        weak_self: weak.clone(),
        source,
        subscription: RefCell::new(None),
    });
    Observable::from_node(node)
}

impl<T: 'static> Node<Option<Rc<T>>> for OptionalNode<T> {
    fn core(&self) -> &NodeCore<Option<Rc<T>>> {
        &self.core
    }

    fn on_connect(self: Rc<Self>) {
        let weak = self.weak_self.clone();
        let subscription = self.source.subscribe(move |value: &Value<T>| {
            if let Some(node) = weak.upgrade() {
                node.core.fire_change(Value::of(value.loaded().cloned()));
            }
        });
        *self.subscription.borrow_mut() = Some(subscription);
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

    #[test]
    fn loading_becomes_none() {
        let cell: PendingCell<i32> = PendingCell::new();
        let optional = cell.observable().to_option();

        let heard: Rc<Cell<Option<Option<i32>>>> = Rc::new(Cell::new(None));
        let probe = Rc::clone(&heard);
        let _subscription = optional.subscribe(move |value: &Value<Option<Rc<i32>>>| {
            probe.set(
                value
                    .loaded()
                    .map(|loaded| (**loaded).as_ref().map(|inner| **inner)),
            );
        });

        // Never loading: the subscriber hears Some(None) immediately.
        assert_eq!(heard.get(), Some(None));

        cell.set(3);
        assert_eq!(heard.get(), Some(Some(3)));
        cell.clear();
        assert_eq!(heard.get(), Some(None));
    }

    #[test]
    fn or_prefers_the_primary_once_it_loads() {
        let primary: PendingCell<i32> = PendingCell::new();
        let fallback = primary.observable().or(Observable::just(41));

        let heard: Rc<Cell<Option<i32>>> = Rc::new(Cell::new(None));
        let probe = Rc::clone(&heard);
        let _subscription = fallback.subscribe(move |value: &Value<i32>| {
            probe.set(value.loaded().map(|loaded| **loaded));
        });
        assert_eq!(heard.get(), Some(41));

        primary.set(42);
        assert_eq!(heard.get(), Some(42));
    }

    #[test]
    fn or_with_loaded_primary_never_consults_the_backup() {
        let primary = StateCell::new(1);
        let backup = StateCell::new(99);
        let chosen = primary.observable().or(backup.observable());

        let _subscription = chosen.subscribe(|_: &Value<i32>| {});
        assert!(!backup.observable().is_connected());
    }
}
