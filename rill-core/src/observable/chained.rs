//! Join: an observable of observables, flattened to the inner value.
//!
//! The chained node tracks an outer `Observable<Observable<T>>`. Each
//! time the outer produces a different inner observable (by handle
//! identity), the node drops its subscription to the previous inner and
//! subscribes to the new one; the inner's slot states pass straight
//! through. While the outer is loading, the result is loading.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use super::node::{Node, NodeCore, Observable, Subscription};
use super::value::Value;

pub(crate) struct ChainedNode<T: 'static> {
    core: NodeCore<T>,
    weak_self: Weak<ChainedNode<T>>,
    outer: Observable<Observable<T>>,
    inner: RefCell<Option<Observable<T>>>,
    outer_subscription: RefCell<Option<Subscription>>,
    inner_subscription: RefCell<Option<Subscription>>,
}

pub(crate) fn chained<T: 'static>(outer: Observable<Observable<T>>) -> Observable<T> {
    let node = Rc::new_cyclic(|weak| ChainedNode {
        core: NodeCore::new(Value::Loading),
        weak_self: weak.clone(),
        outer,
        inner: RefCell::new(None),
        outer_subscription: RefCell::new(None),
        inner_subscription: RefCell::new(None),
    });
    Observable::from_node(node)
}

impl<T: 'static> Node<T> for ChainedNode<T> {
    fn core(&self) -> &NodeCore<T> {
        &self.core
    }

    fn on_connect(self: Rc<Self>) {
        debug_assert!(self.outer_subscription.borrow().is_none(), "already connected");
        let weak = self.weak_self.clone();
        let subscription = self.outer.subscribe(move |value: &Value<Observable<T>>| {
            if let Some(node) = weak.upgrade() {
                node.outer_changed(value.loaded().map(|inner| (**inner).clone()));
            }
        });
        *self.outer_subscription.borrow_mut() = Some(subscription);
    }

    fn on_disconnect(&self) {
        *self.inner.borrow_mut() = None;
        self.core.reset(Value::Loading);
        if let Some(subscription) = self.outer_subscription.borrow_mut().take() {
            subscription.unsubscribe();
        }
        if let Some(subscription) = self.inner_subscription.borrow_mut().take() {
            subscription.unsubscribe();
        }
    }
}

impl<T: 'static> ChainedNode<T> {
    fn outer_changed(&self, new_inner: Option<Observable<T>>) {
        let unchanged = {
            let current = self.inner.borrow();
            match (current.as_ref(), new_inner.as_ref()) {
                (Some(current), Some(new)) => current.ptr_eq(new),
                (None, None) => true,
                _ => false,
            }
        };
        if unchanged {
            return;
        }

        *self.inner.borrow_mut() = None;
        if let Some(subscription) = self.inner_subscription.borrow_mut().take() {
            subscription.unsubscribe();
        }

        match new_inner {
            None => self.core.fire_change(Value::Loading),
            Some(inner) => {
                *self.inner.borrow_mut() = Some(inner.clone());
                let weak = self.weak_self.clone();
                let subscription = inner.subscribe(move |value: &Value<T>| {
                    if let Some(node) = weak.upgrade() {
                        node.core.fire_change(value.clone());
                    }
                });
                *self.inner_subscription.borrow_mut() = Some(subscription);
            }
        }
    }
}
