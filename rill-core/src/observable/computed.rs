//! Derived observables computed from one or more source observables.
//!
//! A computed node subscribes to all of its sources on connect and keeps
//! one slot per source. Argument handling follows three rules:
//!
//! - While the node is connecting, incoming argument values are only
//!   buffered; the connect sequence decides what to compute afterwards.
//! - A source dropping to loading makes the result loading immediately
//!   and synchronously. Partial results are never exposed.
//! - A source producing a new value (by identity) schedules a recompute
//!   on the node's scheduler; the recompute runs only when every source
//!   is loaded.
//!
//! On reconnect the node compares the buffered argument values against
//! those the cached value was computed from and recomputes only if one
//! actually changed while disconnected.
//!
//! Sources of different types feed one node through type erasure: each
//! argument slot holds an `Rc<dyn Any>`, downcast again inside the typed
//! closure built by the `transform`/`flatten` factories. Erasure via
//! `Rc` preserves pointer identity, which is all the change detection
//! needs.

use std::any::Any;
use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};

use crate::scheduler::Scheduler;

use super::node::{Node, NodeCore, Observable, Subscription};
use super::value::Value;

/// A type-erased argument slot: `None` while the source is loading.
pub(crate) type ArgSlot = Option<Rc<dyn Any>>;

/// A type-erased source: subscribing routes the source's slot states to
/// the listener as `ArgSlot`s.
pub(crate) struct ArgSource {
    subscribe: Box<dyn Fn(Rc<dyn Fn(ArgSlot)>) -> Subscription>,
}

impl<T: 'static> Observable<T> {
    /// Erases this observable's value type for use as a computed
    /// argument.
    pub(crate) fn as_arg(&self) -> ArgSource {
        let source = self.clone();
        ArgSource {
            subscribe: Box::new(move |listener| {
                let listener = Rc::clone(&listener);
                source.subscribe(move |value: &Value<T>| {
                    listener(value.loaded().map(|loaded| Rc::clone(loaded) as Rc<dyn Any>));
                })
            }),
        }
    }
}

/// Recovers a printable message from a caught panic payload.
pub(crate) fn payload_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

pub(crate) struct ComputedNode<T: 'static> {
    core: NodeCore<T>,
    weak_self: Weak<ComputedNode<T>>,
    scheduler: Rc<dyn Scheduler>,
    sources: Vec<ArgSource>,
    args: RefCell<Vec<ArgSlot>>,
    subscriptions: RefCell<Vec<Option<Subscription>>>,
    compute: Box<dyn Fn(&[Rc<dyn Any>]) -> T>,
}

pub(crate) fn computed<T: 'static>(
    scheduler: Rc<dyn Scheduler>,
    sources: Vec<ArgSource>,
    compute: Box<dyn Fn(&[Rc<dyn Any>]) -> T>,
) -> Observable<T> {
    let arity = sources.len();
    let node = Rc::new_cyclic(|weak| ComputedNode {
        core: NodeCore::new(Value::Loading),
        weak_self: weak.clone(),
        scheduler,
        sources,
        args: RefCell::new(vec![None; arity]),
        subscriptions: RefCell::new((0..arity).map(|_| None).collect()),
        compute,
    });
    Observable::from_node(node)
}

impl<T: 'static> Node<T> for ComputedNode<T> {
    fn core(&self) -> &NodeCore<T> {
        &self.core
    }

    fn on_connect(self: Rc<Self>) {
        // If a previous connection computed a value, remember which
        // argument values it came from; the initial deliveries below
        // overwrite the buffer.
        let previous_args = if self.core.value().is_loaded() {
            Some(self.args.borrow().clone())
        } else {
            None
        };

        for (index, source) in self.sources.iter().enumerate() {
            let weak = self.weak_self.clone();
            let subscription = (source.subscribe)(Rc::new(move |new_value: ArgSlot| {
                if let Some(node) = weak.upgrade() {
                    node.argument_changed(index, new_value);
                }
            }));
            let mut subscriptions = self.subscriptions.borrow_mut();
            debug_assert!(subscriptions[index].is_none(), "already connected");
            subscriptions[index] = Some(subscription);
        }

        match previous_args {
            Some(previous) => self.maybe_recompute(&previous),
            None => self.recompute(),
        }
    }

    fn on_disconnect(&self) {
        // Argument values and the cached result are kept for reconnect.
        for slot in self.subscriptions.borrow_mut().iter_mut() {
            if let Some(subscription) = slot.take() {
                subscription.unsubscribe();
            }
        }
    }
}

impl<T: 'static> ComputedNode<T> {
    fn argument_changed(&self, index: usize, new_value: ArgSlot) {
        if self.core.is_connecting() {
            self.args.borrow_mut()[index] = new_value;
            return;
        }
        match new_value {
            None => {
                self.args.borrow_mut()[index] = None;
                // A loading source makes the result loading right away.
                self.core.fire_change(Value::Loading);
            }
            Some(value) => {
                let changed = match &self.args.borrow()[index] {
                    Some(current) => !Rc::ptr_eq(current, &value),
                    None => true,
                };
                if changed {
                    self.args.borrow_mut()[index] = Some(value);
                    self.schedule_recompute();
                }
            }
        }
    }

    fn schedule_recompute(&self) {
        let weak = self.weak_self.clone();
        self.scheduler.schedule(Box::new(move || {
            let Some(node) = weak.upgrade() else {
                return;
            };
            // The last observer may have left while this task sat in
            // the queue; a disconnected node stays silent.
            if node.core.is_connected() || node.core.is_connecting() {
                node.recompute();
            }
        }));
    }

    /// Recomputes after a reconnect only if an argument changed while
    /// the node was disconnected. A still-loading argument means a
    /// recompute is already on its way once it loads.
    fn maybe_recompute(&self, previous: &[ArgSlot]) {
        let mut changed = false;
        {
            let args = self.args.borrow();
            for (old, new) in previous.iter().zip(args.iter()) {
                match (old, new) {
                    (Some(old), Some(new)) => {
                        if !Rc::ptr_eq(old, new) {
                            changed = true;
                        }
                    }
                    _ => return,
                }
            }
        }
        if changed {
            self.recompute();
        }
    }

    fn recompute(&self) {
        let args: Vec<Rc<dyn Any>> = {
            let slots = self.args.borrow();
            let mut values = Vec::with_capacity(slots.len());
            for slot in slots.iter() {
                match slot {
                    Some(value) => values.push(Rc::clone(value)),
                    // Not all sources have loaded yet.
                    None => return,
                }
            }
            values
        };

        match panic::catch_unwind(AssertUnwindSafe(|| (self.compute)(&args))) {
            Ok(value) => self.core.fire_change(Value::of(value)),
            Err(payload) => {
                tracing::error!(
                    panic = payload_message(payload.as_ref()),
                    "computation panicked, result stays loading"
                );
                self.core.fire_change(Value::Loading);
            }
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
    fn synchronous_transform_tracks_source() {
        let number = PendingCell::new();
        let doubled = number.observable().transform(|n: &i32| n * 2);

        let heard: Rc<Cell<Option<i32>>> = Rc::new(Cell::new(None));
        let notifications = Rc::new(Cell::new(0));
        let value_probe = Rc::clone(&heard);
        let count_probe = Rc::clone(&notifications);
        let _subscription = doubled.subscribe(move |value: &Value<i32>| {
            count_probe.set(count_probe.get() + 1);
            value_probe.set(value.loaded().map(|loaded| **loaded));
        });

        assert_eq!(notifications.get(), 1);
        assert_eq!(heard.get(), None);

        number.set(42);
        assert_eq!(notifications.get(), 2);
        assert_eq!(heard.get(), Some(84));

        number.clear();
        assert_eq!(notifications.get(), 3);
        assert_eq!(heard.get(), None);

        number.set(13);
        assert_eq!(heard.get(), Some(26));
    }

    #[test]
    fn deferred_transform_waits_for_scheduler() {
        let scheduler = Rc::new(ManualScheduler::new());
        let number = StateCell::new(1);
        let doubled = number
            .observable()
            .transform_with(scheduler.clone(), |n: &i32| n * 2);

        let heard: Rc<Cell<Option<i32>>> = Rc::new(Cell::new(None));
        let probe = Rc::clone(&heard);
        let _subscription = doubled.subscribe(move |value: &Value<i32>| {
            probe.set(value.loaded().map(|loaded| **loaded));
        });
        // The initial computation happens during connect, not via the
        // scheduler.
        assert_eq!(heard.get(), Some(2));

        number.set(5);
        assert_eq!(heard.get(), Some(2));
        scheduler.run_all();
        assert_eq!(heard.get(), Some(10));
    }

    #[test]
    fn loading_source_propagates_without_scheduler() {
        let scheduler = Rc::new(ManualScheduler::new());
        let number = PendingCell::with_value(3);
        let tripled = number
            .observable()
            .transform_with(scheduler.clone(), |n: &i32| n * 3);

        let loading = Rc::new(Cell::new(false));
        let probe = Rc::clone(&loading);
        let _subscription = tripled.subscribe(move |value: &Value<i32>| {
            probe.set(value.is_loading());
        });
        scheduler.run_all();
        assert!(!loading.get());

        number.clear();
        // No scheduler tick needed: loading propagates synchronously.
        assert!(loading.get());
    }

    #[test]
    fn reconnect_without_source_change_does_not_recompute() {
        let computations = Rc::new(Cell::new(0));
        let number = StateCell::new(2);
        let count_probe = Rc::clone(&computations);
        let doubled = number.observable().transform(move |n: &i32| {
            count_probe.set(count_probe.get() + 1);
            n * 2
        });

        doubled.subscribe(|_: &Value<i32>| {}).unsubscribe();
        assert_eq!(computations.get(), 1);

        // Nothing changed while disconnected: the cached value stands.
        doubled.subscribe(|_: &Value<i32>| {}).unsubscribe();
        assert_eq!(computations.get(), 1);

        // A change made while disconnected is picked up on reconnect.
        number.set(4);
        doubled.subscribe(|_: &Value<i32>| {}).unsubscribe();
        assert_eq!(computations.get(), 2);
    }

    #[test]
    fn binary_transform_combines_both_sources() {
        let a = StateCell::new(2);
        let b = StateCell::new(3);
        let sum = Observable::transform2(&a.observable(), &b.observable(), |a, b| a + b);

        let heard = Rc::new(Cell::new(0));
        let probe = Rc::clone(&heard);
        let _subscription = sum.subscribe(move |value: &Value<i32>| {
            if let Some(loaded) = value.loaded() {
                probe.set(**loaded);
            }
        });
        assert_eq!(heard.get(), 5);

        a.set(10);
        assert_eq!(heard.get(), 13);
        b.set(1);
        assert_eq!(heard.get(), 11);
    }

    #[test]
    fn flatten_collects_all_sources() {
        let a = StateCell::new(1);
        let b = PendingCell::new();
        let all = Observable::flatten(vec![a.observable(), b.observable()]);

        let heard: Rc<RefCell<Option<Vec<i32>>>> = Rc::new(RefCell::new(None));
        let probe = Rc::clone(&heard);
        let _subscription = all.subscribe(move |value: &Value<Vec<Rc<i32>>>| {
            *probe.borrow_mut() = value
                .loaded()
                .map(|items| items.iter().map(|item| **item).collect());
        });
        assert_eq!(*heard.borrow(), None);

        b.set(2);
        assert_eq!(*heard.borrow(), Some(vec![1, 2]));
    }

    #[test]
    fn empty_flatten_is_immediately_loaded() {
        let all: Observable<Vec<Rc<i32>>> = Observable::flatten(vec![]);
        assert!(all.wait_for().unwrap().is_empty());
    }
}
