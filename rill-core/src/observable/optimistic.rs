//! Staleness policies: keep showing the previous value while a new one
//! loads.
//!
//! Identity-preserving sources invalidate and reload; by default every
//! reload surfaces as a loading state downstream. The nodes here trade
//! that honesty for stability:
//!
//! - [`OptimisticNode`] simply never forwards loading (optionally
//!   starting from a default value instead of loading).
//! - [`TimeoutNode`] holds the last value through a reload but gives up
//!   and reports loading if the reload exceeds a timeout.
//! - [`ExplicitNode`] always shows a value but labels it: downstream
//!   receives a [`MaybeStale`] pair and can render stale data
//!   differently.

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;

use crate::scheduler::{Scheduler, Timer};

use super::node::{Node, NodeCore, Observable, Subscription};
use super::value::Value;

/// A value together with a flag recording whether the source has
/// invalidated it since it was produced.
#[derive(Debug)]
pub struct MaybeStale<T> {
    value: Rc<T>,
    stale: bool,
}

impl<T> MaybeStale<T> {
    fn fresh(value: Rc<T>) -> Self {
        MaybeStale { value, stale: false }
    }

    pub fn value(&self) -> &Rc<T> {
        &self.value
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// The stale rendition of a cached slot. Reuses the allocation when
    /// it is already marked, so repeated invalidations do not look like
    /// changes.
    fn outdated(this: &Rc<MaybeStale<T>>) -> Rc<MaybeStale<T>> {
        if this.stale {
            Rc::clone(this)
        } else {
            Rc::new(MaybeStale {
                value: Rc::clone(&this.value),
                stale: true,
            })
        }
    }
}

impl<T> Clone for MaybeStale<T> {
    fn clone(&self) -> Self {
        MaybeStale {
            value: Rc::clone(&self.value),
            stale: self.stale,
        }
    }
}

impl<T: PartialEq> PartialEq for MaybeStale<T> {
    fn eq(&self, other: &Self) -> bool {
        self.stale == other.stale && self.value == other.value
    }
}

impl<T: Eq> Eq for MaybeStale<T> {}

/// Forwards loaded values and swallows loading transitions entirely.
pub(crate) struct OptimisticNode<T: 'static> {
    core: NodeCore<T>,
    weak_self: Weak<OptimisticNode<T>>,
    source: Observable<T>,
    subscription: RefCell<Option<Subscription>>,
}

pub(crate) fn optimistic<T: 'static>(
    source: Observable<T>,
    initial: Option<T>,
) -> Observable<T> {
    let initial = match initial {
        Some(value) => Value::of(value),
        None => Value::Loading,
    };
    let node = Rc::new_cyclic(|weak| OptimisticNode {
        core: NodeCore::new(initial),
        weak_self: weak.clone(),
        source,
        subscription: RefCell::new(None),
    });
    Observable::from_node(node)
}

impl<T: 'static> Node<T> for OptimisticNode<T> {
    fn core(&self) -> &NodeCore<T> {
        &self.core
    }

    fn on_connect(self: Rc<Self>) {
        let weak = self.weak_self.clone();
        let subscription = self.source.subscribe(move |value: &Value<T>| {
            if let Some(node) = weak.upgrade() {
                if value.is_loaded() {
                    node.core.fire_change(value.clone());
                }
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

/// Holds the last value through reloads, but only for so long: if the
/// source stays loading past the timeout, loading is reported after
/// all.
pub(crate) struct TimeoutNode<T: 'static> {
    core: NodeCore<T>,
    weak_self: Weak<TimeoutNode<T>>,
    source: Observable<T>,
    timeout: Duration,
    scheduler: Rc<dyn Scheduler>,
    timer: RefCell<Option<Timer>>,
    subscription: RefCell<Option<Subscription>>,
}

pub(crate) fn optimistic_with_timeout<T: 'static>(
    source: Observable<T>,
    timeout: Duration,
    scheduler: Rc<dyn Scheduler>,
) -> Observable<T> {
    let node = Rc::new_cyclic(|weak| TimeoutNode {
        core: NodeCore::new(Value::Loading),
        weak_self: weak.clone(),
        source,
        timeout,
        scheduler,
        timer: RefCell::new(None),
        subscription: RefCell::new(None),
    });
    Observable::from_node(node)
}

impl<T: 'static> Node<T> for TimeoutNode<T> {
    fn core(&self) -> &NodeCore<T> {
        &self.core
    }

    fn on_connect(self: Rc<Self>) {
        if self.timer.borrow().is_none() {
            let weak = self.weak_self.clone();
            *self.timer.borrow_mut() = Some(Timer::new(
                Rc::clone(&self.scheduler),
                move || {
                    if let Some(node) = weak.upgrade() {
                        // Patience exhausted.
                        node.core.fire_change(Value::Loading);
                    }
                },
            ));
        }

        let weak = self.weak_self.clone();
        let subscription = self.source.subscribe(move |value: &Value<T>| {
            let Some(node) = weak.upgrade() else {
                return;
            };
            match value.loaded() {
                Some(_) => {
                    if let Some(timer) = node.timer.borrow().as_ref() {
                        timer.cancel();
                    }
                    node.core.fire_change(value.clone());
                }
                None => {
                    let timer = node.timer.borrow();
                    if let Some(timer) = timer.as_ref() {
                        if !timer.is_running() {
                            timer.schedule(node.timeout);
                        }
                    }
                }
            }
        });
        *self.subscription.borrow_mut() = Some(subscription);
    }

    fn on_disconnect(&self) {
        if let Some(timer) = self.timer.borrow().as_ref() {
            timer.cancel();
        }
        if let Some(subscription) = self.subscription.borrow_mut().take() {
            subscription.unsubscribe();
        }
    }
}

/// Always shows a value once one exists, flagged stale while the source
/// reloads it.
pub(crate) struct ExplicitNode<T: 'static> {
    core: NodeCore<MaybeStale<T>>,
    weak_self: Weak<ExplicitNode<T>>,
    source: Observable<T>,
    subscription: RefCell<Option<Subscription>>,
}

pub(crate) fn explicitly_optimistic<T: 'static>(
    source: Observable<T>,
) -> Observable<MaybeStale<T>> {
    let node = Rc::new_cyclic(|weak| ExplicitNode {
        core: NodeCore::new(Value::Loading),
        weak_self: weak.clone(),
        source,
        subscription: RefCell::new(None),
    });
    Observable::from_node(node)
}

impl<T: 'static> Node<MaybeStale<T>> for ExplicitNode<T> {
    fn core(&self) -> &NodeCore<MaybeStale<T>> {
        &self.core
    }

    fn on_connect(self: Rc<Self>) {
        let weak = self.weak_self.clone();
        let subscription = self.source.subscribe(move |value: &Value<T>| {
            let Some(node) = weak.upgrade() else {
                return;
            };
            match value.loaded() {
                Some(loaded) => {
                    node.core
                        .fire_change(Value::of(MaybeStale::fresh(Rc::clone(loaded))));
                }
                None => {
                    if let Some(cached) = node.core.value().loaded() {
                        node.core
                            .fire_change(Value::Loaded(MaybeStale::outdated(cached)));
                    }
                }
            }
        });
        *self.subscription.borrow_mut() = Some(subscription);
    }

    fn on_disconnect(&self) {
        // Whatever happens while we are away, the value cannot be
        // trusted as fresh on reconnect.
        if let Some(cached) = self.core.value().loaded() {
            self.core.reset(Value::Loaded(MaybeStale::outdated(cached)));
        }
        if let Some(subscription) = self.subscription.borrow_mut().take() {
            subscription.unsubscribe();
        }
    }
}
