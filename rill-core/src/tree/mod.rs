//! Aggregating a tree of observables into one observable value.
//!
//! A [`TreeLoader`] describes a tree whose nodes each live behind their
//! own observable: the loader names the root key, resolves a key to an
//! observable node, lists a node's children, and builds the aggregate
//! once the nodes are in hand. [`ObservableTree`] drives it: starting
//! from the root it crawls the currently reachable keys, subscribing to
//! each node at most once, and publishes a freshly built aggregate
//! whenever every reachable node is loaded.
//!
//! # Crawling
//!
//! Each crawl walks the tree from the root with a visited set, so a key
//! reachable along several paths is processed once (and a cyclic
//! reference is truncated at the repeated key rather than looping).
//! Keys that were subscribed before but are no longer reachable are
//! unsubscribed after the walk. A node arriving *while* a crawl is in
//! progress does not start a nested crawl; it flags the crawl as stale
//! and one follow-up crawl is scheduled after the current one finishes,
//! however many nodes arrived in the meantime.
//!
//! A crawl begins by publishing loading, so observers always see the
//! aggregate go stale before a new one arrives.

use std::cell::{Cell, RefCell};
use std::fmt::Debug;
use std::hash::Hash;
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};

use indexmap::{IndexMap, IndexSet};

use crate::observable::{payload_message, Node, NodeCore, Observable, Subscription, Value};
use crate::scheduler::Scheduler;

/// Describes a tree of observable nodes and how to aggregate it.
pub trait TreeLoader {
    type Key: Clone + Eq + Hash + Debug + 'static;
    type Node: 'static;
    type Tree: 'static;

    /// The key the crawl starts from.
    fn root_key(&self) -> Self::Key;

    /// The observable node behind `key`.
    fn get(&self, key: &Self::Key) -> Observable<Self::Node>;

    /// The keys of `node`'s children. A key that resolves back to an
    /// ancestor does not recurse forever; the crawl truncates at keys
    /// it has already visited.
    fn children(&self, node: &Self::Node) -> Vec<Self::Key>;

    /// Builds the aggregate from the loaded nodes, keyed in crawl
    /// order. A panic here is caught and logged, and the previously
    /// published aggregate stays in place.
    fn build(&self, nodes: &IndexMap<Self::Key, Option<Rc<Self::Node>>>) -> Self::Tree;
}

/// The observable aggregate of a [`TreeLoader`]'s tree. Construct with
/// [`ObservableTree::new`]; the result is an ordinary [`Observable`].
pub struct ObservableTree<L: TreeLoader + 'static> {
    core: NodeCore<L::Tree>,
    weak_self: Weak<ObservableTree<L>>,
    loader: L,
    scheduler: Rc<dyn Scheduler>,
    nodes: RefCell<IndexMap<L::Key, Observable<L::Node>>>,
    loaded: RefCell<IndexMap<L::Key, Option<Rc<L::Node>>>>,
    subscriptions: RefCell<IndexMap<L::Key, Subscription>>,
    crawling: Cell<bool>,
    crawl_pending: Cell<bool>,
}

impl<L: TreeLoader + 'static> ObservableTree<L> {
    pub fn new(loader: L, scheduler: Rc<dyn Scheduler>) -> Observable<L::Tree> {
        let node = Rc::new_cyclic(|weak| ObservableTree {
            core: NodeCore::new(Value::Loading),
            weak_self: weak.clone(),
            loader,
            scheduler,
            nodes: RefCell::new(IndexMap::new()),
            loaded: RefCell::new(IndexMap::new()),
            subscriptions: RefCell::new(IndexMap::new()),
            crawling: Cell::new(false),
            crawl_pending: Cell::new(false),
        });
        Observable::from_node(node)
    }

    /// Subscribes to `key`'s node if this tree is not following it yet.
    fn connect_to(&self, key: &L::Key) {
        if self.nodes.borrow().contains_key(key) {
            return;
        }
        tracing::trace!(key = ?key, "following node");
        let observable = self.loader.get(key);

        let weak = self.weak_self.clone();
        let observer_key = key.clone();
        let initial = Cell::new(true);
        let subscription = observable.subscribe(move |value: &Value<L::Node>| {
            let Some(tree) = weak.upgrade() else {
                return;
            };
            let loaded = value.loaded().cloned();
            if initial.get() {
                // The delivery from the subscribe call itself: record
                // it and let the crawl in progress pick it up.
                initial.set(false);
                tree.loaded.borrow_mut().insert(observer_key.clone(), loaded);
            } else {
                tree.node_changed(&observer_key, loaded);
            }
        });

        self.nodes.borrow_mut().insert(key.clone(), observable);
        self.subscriptions.borrow_mut().insert(key.clone(), subscription);
    }

    fn disconnect_from(&self, key: &L::Key) {
        tracing::trace!(key = ?key, "dropping unreachable node");
        self.nodes.borrow_mut().shift_remove(key);
        self.loaded.borrow_mut().shift_remove(key);
        if let Some(subscription) = self.subscriptions.borrow_mut().shift_remove(key) {
            subscription.unsubscribe();
        }
    }

    fn node_changed(&self, key: &L::Key, loaded: Option<Rc<L::Node>>) {
        let arrived = loaded.is_some();
        self.loaded.borrow_mut().insert(key.clone(), loaded);
        if !arrived {
            return;
        }
        if self.crawling.get() {
            self.crawl_pending.set(true);
        } else {
            self.recrawl();
        }
    }

    fn recrawl(&self) {
        let mut reachable = IndexSet::new();
        let mut loading = IndexSet::new();

        self.crawling.set(true);
        self.core.fire_change(Value::Loading);

        self.crawl(self.loader.root_key(), &mut reachable, &mut loading);

        let unreachable: Vec<L::Key> = self
            .nodes
            .borrow()
            .keys()
            .filter(|key| !reachable.contains(*key))
            .cloned()
            .collect();
        for key in &unreachable {
            self.disconnect_from(key);
        }

        tracing::debug!(
            reachable = reachable.len(),
            loading = loading.len(),
            dropped = unreachable.len(),
            "crawl finished"
        );

        if loading.is_empty() {
            self.rebuild();
        }
        self.crawling.set(false);

        if self.crawl_pending.get() {
            self.crawl_pending.set(false);
            let weak = self.weak_self.clone();
            self.scheduler.schedule(Box::new(move || {
                if let Some(tree) = weak.upgrade() {
                    if tree.core.is_connected() {
                        tree.recrawl();
                    }
                }
            }));
        }
    }

    fn crawl(
        &self,
        key: L::Key,
        reachable: &mut IndexSet<L::Key>,
        loading: &mut IndexSet<L::Key>,
    ) {
        if !reachable.insert(key.clone()) {
            return;
        }
        self.connect_to(&key);

        let node = self.loaded.borrow().get(&key).cloned().flatten();
        match node {
            None => {
                loading.insert(key);
            }
            Some(node) => {
                for child in self.loader.children(&node) {
                    self.crawl(child, reachable, loading);
                }
            }
        }
    }

    fn rebuild(&self) {
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            self.loader.build(&self.loaded.borrow())
        }));
        match result {
            Ok(tree) => self.core.fire_change(Value::of(tree)),
            Err(payload) => {
                tracing::error!(
                    panic = payload_message(payload.as_ref()),
                    "tree build panicked, keeping previous aggregate"
                );
            }
        }
    }
}

impl<L: TreeLoader + 'static> Node<L::Tree> for ObservableTree<L> {
    fn core(&self) -> &NodeCore<L::Tree> {
        &self.core
    }

    fn on_connect(self: Rc<Self>) {
        self.connect_to(&self.loader.root_key());
        self.recrawl();
    }

    fn on_disconnect(&self) {
        for (_, subscription) in self.subscriptions.borrow_mut().drain(..) {
            subscription.unsubscribe();
        }
        self.nodes.borrow_mut().clear();
        self.loaded.borrow_mut().clear();
    }
}
