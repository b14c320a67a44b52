//! The observable core: node state, the connect/disconnect lifecycle,
//! change notification, and subscriptions.
//!
//! # Lifecycle
//!
//! A node is *connected* while it has at least one observer. The first
//! subscriber triggers `on_connect`, where a derived node acquires its
//! own upstream subscriptions; when the last subscriber leaves,
//! `on_disconnect` releases them again. A node with no observers does no
//! work and holds no upstream resources.
//!
//! While `on_connect` runs, the `connecting` flag is set: values fired
//! during that window update the cached slot silently instead of
//! notifying observers, because the subscribe call itself delivers the
//! final slot state to the new observer exactly once afterwards.
//!
//! # Notification
//!
//! `fire_change` compares the new slot against the cached one by
//! identity and does nothing if they are the same. Otherwise it stores
//! the new slot and notifies a snapshot of the observer list in
//! subscription order, so observers that subscribe or unsubscribe during
//! a notification never disturb the sweep in progress.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use smallvec::SmallVec;

use crate::error::WaitError;

use super::value::Value;

/// A callback invoked whenever an observable's slot changes, and once on
/// subscription with the current slot. Observers must not panic.
pub trait Observer<T> {
    fn on_change(&self, value: &Value<T>);
}

impl<T, F> Observer<T> for F
where
    F: Fn(&Value<T>),
{
    fn on_change(&self, value: &Value<T>) {
        self(value)
    }
}

/// Internal contract implemented by every observable node.
///
/// `on_connect` takes `Rc<Self>` so a node can hand weak references to
/// the upstream observers and scheduled tasks it creates there.
pub(crate) trait Node<T: 'static>: 'static {
    fn core(&self) -> &NodeCore<T>;

    fn on_connect(self: Rc<Self>) {}

    fn on_disconnect(&self) {}
}

struct ObserverEntry<T> {
    id: u64,
    observer: Rc<dyn Observer<T>>,
}

/// State shared by all node implementations: the cached slot, the
/// observer list, and the `connecting` flag.
pub(crate) struct NodeCore<T> {
    connecting: Cell<bool>,
    value: RefCell<Value<T>>,
    observers: RefCell<SmallVec<[ObserverEntry<T>; 1]>>,
    next_observer_id: Cell<u64>,
}

impl<T: 'static> NodeCore<T> {
    pub(crate) fn new(initial: Value<T>) -> Self {
        NodeCore {
            connecting: Cell::new(false),
            value: RefCell::new(initial),
            observers: RefCell::new(SmallVec::new()),
            next_observer_id: Cell::new(0),
        }
    }

    /// A copy of the current slot.
    pub(crate) fn value(&self) -> Value<T> {
        self.value.borrow().clone()
    }

    pub(crate) fn is_connected(&self) -> bool {
        !self.observers.borrow().is_empty()
    }

    pub(crate) fn is_connecting(&self) -> bool {
        self.connecting.get()
    }

    /// Replaces the cached slot without notifying anyone. Used by nodes
    /// that reset or adjust their state on disconnect.
    pub(crate) fn reset(&self, value: Value<T>) {
        *self.value.borrow_mut() = value;
    }

    /// Stores `value` and notifies observers, unless the slot already
    /// holds the identical value. No notification goes out while the
    /// node is still connecting; the pending subscribe call delivers the
    /// slot itself.
    pub(crate) fn fire_change(&self, value: Value<T>) {
        if self.value.borrow().same_as(&value) {
            return;
        }
        *self.value.borrow_mut() = value;
        if self.connecting.get() {
            return;
        }
        let snapshot: SmallVec<[Rc<dyn Observer<T>>; 1]> = self
            .observers
            .borrow()
            .iter()
            .map(|entry| Rc::clone(&entry.observer))
            .collect();
        let current = self.value.borrow().clone();
        for observer in snapshot {
            observer.on_change(&current);
        }
    }
}

/// Resets the connecting flag even if `on_connect` panics.
struct ConnectingGuard<'a>(&'a Cell<bool>);

impl Drop for ConnectingGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// A handle owning one observer registration.
///
/// Dropping the handle unsubscribes; [`Subscription::unsubscribe`] does
/// so explicitly and consumes the handle, so a registration cannot be
/// released twice.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub(crate) fn new(cancel: impl FnOnce() + 'static) -> Self {
        Subscription {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Removes the observer from its observable. If it was the last
    /// observer, the observable disconnects.
    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

/// A value that may still be loading and can change over time.
///
/// `Observable` is a cheap-clone handle; clones share the same
/// underlying node. Derived observables are constructed through the
/// combinator methods on this type and stay disconnected from their
/// sources until somebody subscribes.
pub struct Observable<T: 'static> {
    node: Rc<dyn Node<T>>,
}

impl<T: 'static> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Observable {
            node: Rc::clone(&self.node),
        }
    }
}

impl<T: 'static> Observable<T> {
    pub(crate) fn from_node(node: Rc<dyn Node<T>>) -> Self {
        Observable { node }
    }

    /// Whether this observable currently has at least one observer.
    pub fn is_connected(&self) -> bool {
        self.node.core().is_connected()
    }

    /// Whether the current slot is still loading. Meaningful only while
    /// connected; a disconnected derived observable is not kept current.
    pub fn is_loading(&self) -> bool {
        self.node.core().value().is_loading()
    }

    /// Whether two handles refer to the same underlying node.
    pub fn ptr_eq(&self, other: &Observable<T>) -> bool {
        Rc::ptr_eq(&self.node, &other.node)
    }

    /// Registers `observer` and synchronously delivers the current slot
    /// to it exactly once. The first observer connects the node.
    pub fn subscribe(&self, observer: impl Observer<T> + 'static) -> Subscription {
        self.subscribe_rc(Rc::new(observer))
    }

    pub(crate) fn subscribe_rc(&self, observer: Rc<dyn Observer<T>>) -> Subscription {
        let core = self.node.core();
        if !core.connecting.get() && !core.is_connected() {
            core.connecting.set(true);
            let guard = ConnectingGuard(&core.connecting);
            Rc::clone(&self.node).on_connect();
            drop(guard);
        }

        let id = core.next_observer_id.get();
        core.next_observer_id.set(id + 1);
        core.observers.borrow_mut().push(ObserverEntry {
            id,
            observer: Rc::clone(&observer),
        });

        let current = core.value();
        observer.on_change(&current);

        let node = Rc::clone(&self.node);
        Subscription::new(move || {
            let core = node.core();
            let emptied = {
                let mut observers = core.observers.borrow_mut();
                let before = observers.len();
                observers.retain(|entry| entry.id != id);
                debug_assert!(observers.len() < before, "observer already removed");
                observers.is_empty()
            };
            if emptied {
                node.on_disconnect();
            }
        })
    }

    /// Captures the first value this observable produces synchronously
    /// during a subscribe/unsubscribe round trip. A test and tooling
    /// escape hatch: real consumers stay subscribed.
    pub fn wait_for(&self) -> Result<Rc<T>, WaitError> {
        let captured: Rc<RefCell<Option<Rc<T>>>> = Rc::new(RefCell::new(None));
        let slot = Rc::clone(&captured);
        let subscription = self.subscribe(move |value: &Value<T>| {
            if let Some(loaded) = value.loaded() {
                slot.borrow_mut().get_or_insert_with(|| Rc::clone(loaded));
            }
        });
        subscription.unsubscribe();
        let value = captured.borrow_mut().take();
        value.ok_or(WaitError)
    }
}

impl<T: fmt::Debug + 'static> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.node.core();
        f.debug_struct("Observable")
            .field("connected", &core.is_connected())
            .field("value", &core.value())
            .finish()
    }
}
