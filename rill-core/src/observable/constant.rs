//! Constant observables: always loaded, or never loaded.

use std::rc::Rc;

use super::node::{Node, NodeCore};
use super::value::Value;

/// Holds a fixed value forever. No connect work: the slot is loaded
/// from construction on.
pub(crate) struct ConstantNode<T> {
    core: NodeCore<T>,
}

impl<T: 'static> ConstantNode<T> {
    pub(crate) fn new(value: Rc<T>) -> Rc<Self> {
        Rc::new(ConstantNode {
            core: NodeCore::new(Value::Loaded(value)),
        })
    }
}

impl<T: 'static> Node<T> for ConstantNode<T> {
    fn core(&self) -> &NodeCore<T> {
        &self.core
    }
}

/// Stays loading forever.
pub(crate) struct NeverNode<T> {
    core: NodeCore<T>,
}

impl<T: 'static> NeverNode<T> {
    pub(crate) fn new() -> Rc<Self> {
        Rc::new(NeverNode {
            core: NodeCore::new(Value::Loading),
        })
    }
}

impl<T: 'static> Node<T> for NeverNode<T> {
    fn core(&self) -> &NodeCore<T> {
        &self.core
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use crate::observable::{Observable, Value};

    #[test]
    fn constant_delivers_its_value() {
        let observable = Observable::just("fixed");
        assert_eq!(*observable.wait_for().unwrap(), "fixed");
    }

    #[test]
    fn loading_never_delivers() {
        let observable: Observable<i32> = Observable::loading();
        let loading_seen = Rc::new(Cell::new(false));
        let probe = Rc::clone(&loading_seen);
        let subscription = observable.subscribe(move |value: &Value<i32>| {
            probe.set(value.is_loading());
        });
        assert!(loading_seen.get());
        subscription.unsubscribe();
        assert!(observable.wait_for().is_err());
    }
}
