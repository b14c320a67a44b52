//! The loading-or-loaded value slot.
//!
//! Every observable's current state is a [`Value`]: either the value is
//! still being computed or fetched (`Loading`), or it has been produced
//! and is shared behind an `Rc` (`Loaded`). Loading is an ordinary state,
//! not an error, and every observable starts there until its first value
//! arrives.
//!
//! Change detection throughout the engine is identity-based: two slots
//! are "the same" when both are loading or when both hold the *same*
//! allocation. Producing a value always allocates a fresh `Rc`, so a
//! recomputation that yields an equal-but-distinct value still counts as
//! a change unless an equality gate (`cache`) is layered on top.

use std::fmt;
use std::rc::Rc;

/// The current state of an observable: still loading, or loaded with a
/// shared, immutable value.
pub enum Value<T> {
    /// No value has been produced yet (or the previous value was
    /// invalidated and a new one is on its way).
    Loading,
    /// A value is available. The engine never mutates through this `Rc`.
    Loaded(Rc<T>),
}

impl<T> Value<T> {
    /// Wraps a freshly produced value.
    pub fn of(value: T) -> Self {
        Value::Loaded(Rc::new(value))
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Value::Loading)
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, Value::Loaded(_))
    }

    /// The loaded value, if any.
    pub fn loaded(&self) -> Option<&Rc<T>> {
        match self {
            Value::Loading => None,
            Value::Loaded(value) => Some(value),
        }
    }

    /// Identity comparison: both loading, or both loaded with the same
    /// allocation. This is the engine's change-detection primitive.
    pub fn same_as(&self, other: &Value<T>) -> bool {
        match (self, other) {
            (Value::Loading, Value::Loading) => true,
            (Value::Loaded(a), Value::Loaded(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl<T> Clone for Value<T> {
    fn clone(&self) -> Self {
        match self {
            Value::Loading => Value::Loading,
            Value::Loaded(value) => Value::Loaded(Rc::clone(value)),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Value<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Loading => write!(f, "Loading"),
            Value::Loaded(value) => f.debug_tuple("Loaded").field(value).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_not_equality() {
        let a = Value::of(42);
        let b = Value::of(42);
        assert!(!a.same_as(&b));
        assert!(a.same_as(&a.clone()));
    }

    #[test]
    fn loading_is_only_same_as_loading() {
        let loading: Value<i32> = Value::Loading;
        assert!(loading.same_as(&Value::Loading));
        assert!(!loading.same_as(&Value::of(1)));
        assert!(!Value::of(1).same_as(&loading));
    }

    #[test]
    fn loaded_accessor() {
        let value = Value::of("hello");
        assert!(value.is_loaded());
        assert_eq!(**value.loaded().unwrap(), "hello");
        assert!(Value::<i32>::Loading.loaded().is_none());
    }
}
