//! A memoized key-to-observable map derived from an observable key
//! collection.
//!
//! Given an observable list of keys and a factory from key to
//! observable, the map node maintains `key -> Observable<R>` for the
//! current keys. The factory runs at most once per key while the key
//! stays in the collection; keys that drop out are swept from the memo
//! cache after the new map has been published. A reordered or
//! reallocated key collection with the same key *set* publishes nothing
//! at all, so downstream consumers holding per-key subscriptions are
//! not churned.
//!
//! On disconnect the whole memo cache is swept one scheduler tick
//! later; a subscriber that comes right back (a remount) finds its
//! observables still cached.

use std::cell::RefCell;
use std::hash::Hash;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use crate::scheduler::Scheduler;

use super::node::{Node, NodeCore, Observable, Subscription};
use super::value::Value;

pub(crate) struct ComputedMapNode<K, R>
where
    K: Clone + Eq + Hash + 'static,
    R: 'static,
{
    core: NodeCore<IndexMap<K, Observable<R>>>,
    weak_self: Weak<ComputedMapNode<K, R>>,
    keys: Observable<Vec<K>>,
    factory: Box<dyn Fn(&K) -> Observable<R>>,
    scheduler: Rc<dyn Scheduler>,
    cache: RefCell<IndexMap<K, Observable<R>>>,
    subscription: RefCell<Option<Subscription>>,
}

/// Derives a memoized `key -> Observable<R>` map from an observable
/// key collection. See the module docs for the full contract.
pub fn compute_map<K, R>(
    keys: &Observable<Vec<K>>,
    scheduler: Rc<dyn Scheduler>,
    factory: impl Fn(&K) -> Observable<R> + 'static,
) -> Observable<IndexMap<K, Observable<R>>>
where
    K: Clone + Eq + Hash + 'static,
    R: 'static,
{
    let node = Rc::new_cyclic(|weak| ComputedMapNode {
        core: NodeCore::new(Value::Loading),
        weak_self: weak.clone(),
        keys: keys.clone(),
        factory: Box::new(factory),
        scheduler,
        cache: RefCell::new(IndexMap::new()),
        subscription: RefCell::new(None),
    });
    Observable::from_node(node)
}

impl<K, R> Node<IndexMap<K, Observable<R>>> for ComputedMapNode<K, R>
where
    K: Clone + Eq + Hash + 'static,
    R: 'static,
{
    fn core(&self) -> &NodeCore<IndexMap<K, Observable<R>>> {
        &self.core
    }

    fn on_connect(self: Rc<Self>) {
        let weak = self.weak_self.clone();
        let subscription = self.keys.subscribe(move |value: &Value<Vec<K>>| {
            if let Some(node) = weak.upgrade() {
                node.keys_changed(value);
            }
        });
        *self.subscription.borrow_mut() = Some(subscription);
    }

    fn on_disconnect(&self) {
        if let Some(subscription) = self.subscription.borrow_mut().take() {
            subscription.unsubscribe();
        }
        let weak = self.weak_self.clone();
        self.scheduler.schedule(Box::new(move || {
            let Some(node) = weak.upgrade() else {
                return;
            };
            // A remount in the meantime keeps the cache.
            if !node.core.is_connected() {
                node.cache.borrow_mut().clear();
            }
        }));
    }
}

impl<K, R> ComputedMapNode<K, R>
where
    K: Clone + Eq + Hash + 'static,
    R: 'static,
{
    fn keys_changed(&self, value: &Value<Vec<K>>) {
        let Some(new_keys) = value.loaded() else {
            self.core.fire_change(Value::Loading);
            return;
        };

        if let Some(current) = self.core.value().loaded() {
            if Self::same_key_set(new_keys, current) {
                tracing::trace!("key set unchanged, keeping published map");
                return;
            }
        }

        let mut map = IndexMap::with_capacity(new_keys.len());
        for key in new_keys.iter() {
            let cached = self.cache.borrow().get(key).cloned();
            let observable = match cached {
                Some(existing) => existing,
                None => {
                    let created = (self.factory)(key);
                    self.cache.borrow_mut().insert(key.clone(), created.clone());
                    created
                }
            };
            map.insert(key.clone(), observable);
        }
        self.core.fire_change(Value::of(map));

        // Sweep keys that fell out of the collection, after publishing
        // so consumers resubscribed to the survivors first.
        let keep = Rc::clone(new_keys);
        self.cache.borrow_mut().retain(|key, _| keep.contains(key));
    }

    fn same_key_set(new_keys: &[K], current: &IndexMap<K, Observable<R>>) -> bool {
        new_keys.len() == current.len() && new_keys.iter().all(|key| current.contains_key(key))
    }
}
