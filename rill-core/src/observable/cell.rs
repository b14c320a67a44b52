//! Mutable leaf sources: the cells that feed the observable graph.
//!
//! A cell is the write side; [`StateCell::observable`] /
//! [`PendingCell::observable`] hand out the read side. Cells keep their
//! value across connect/disconnect cycles, and every `set` wraps the new
//! value in a fresh allocation, so setting an equal value still notifies
//! (use [`StateCell::set_if_changed`] or a downstream `cache` to
//! suppress that).

use std::rc::Rc;

use super::node::{Node, NodeCore, Observable};
use super::value::Value;

struct CellNode<T> {
    core: NodeCore<T>,
}

impl<T: 'static> Node<T> for CellNode<T> {
    fn core(&self) -> &NodeCore<T> {
        &self.core
    }
}

/// A mutable cell that always holds a value. Its observable is never
/// loading.
pub struct StateCell<T: 'static> {
    node: Rc<CellNode<T>>,
}

impl<T: 'static> StateCell<T> {
    pub fn new(value: T) -> Self {
        StateCell {
            node: Rc::new(CellNode {
                core: NodeCore::new(Value::of(value)),
            }),
        }
    }

    /// The observable view of this cell. All handles and clones share
    /// the same underlying state.
    pub fn observable(&self) -> Observable<T> {
        Observable::from_node(Rc::clone(&self.node) as Rc<dyn Node<T>>)
    }

    pub fn get(&self) -> Rc<T> {
        match self.node.core.value().loaded() {
            Some(value) => Rc::clone(value),
            // The slot is loaded at construction and never cleared.
            None => unreachable!("state cell always holds a value"),
        }
    }

    /// Stores a new value and notifies observers.
    pub fn set(&self, value: T) {
        self.node.core.fire_change(Value::of(value));
    }

    /// Derives the next value from the current one.
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        let current = self.get();
        self.set(f(&current));
    }

    /// Stores `value` only if it differs from the current value.
    /// Returns whether a change was made.
    pub fn set_if_changed(&self, value: T) -> bool
    where
        T: PartialEq,
    {
        if *self.get() == value {
            false
        } else {
            self.set(value);
            true
        }
    }
}

impl<T: 'static> Clone for StateCell<T> {
    fn clone(&self) -> Self {
        StateCell {
            node: Rc::clone(&self.node),
        }
    }
}

/// A mutable cell that starts out loading and can return to loading.
pub struct PendingCell<T: 'static> {
    node: Rc<CellNode<T>>,
}

impl<T: 'static> PendingCell<T> {
    /// A cell with no value yet.
    pub fn new() -> Self {
        PendingCell {
            node: Rc::new(CellNode {
                core: NodeCore::new(Value::Loading),
            }),
        }
    }

    /// A cell that already holds a value.
    pub fn with_value(value: T) -> Self {
        PendingCell {
            node: Rc::new(CellNode {
                core: NodeCore::new(Value::of(value)),
            }),
        }
    }

    pub fn observable(&self) -> Observable<T> {
        Observable::from_node(Rc::clone(&self.node) as Rc<dyn Node<T>>)
    }

    pub fn get(&self) -> Option<Rc<T>> {
        self.node.core.value().loaded().cloned()
    }

    pub fn set(&self, value: T) {
        self.node.core.fire_change(Value::of(value));
    }

    /// Drops the current value; the observable reports loading until
    /// the next `set`.
    pub fn clear(&self) {
        self.node.core.fire_change(Value::Loading);
    }

    pub fn set_if_changed(&self, value: T) -> bool
    where
        T: PartialEq,
    {
        match self.get() {
            Some(current) if *current == value => false,
            _ => {
                self.set(value);
                true
            }
        }
    }
}

impl<T: 'static> Default for PendingCell<T> {
    fn default() -> Self {
        PendingCell::new()
    }
}

impl<T: 'static> Clone for PendingCell<T> {
    fn clone(&self) -> Self {
        PendingCell {
            node: Rc::clone(&self.node),
        }
    }
}
