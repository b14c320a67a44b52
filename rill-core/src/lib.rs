//! Rill Core
//!
//! This crate provides the reactive value-propagation engine for the Rill
//! UI framework. It implements:
//!
//! - The `Observable` graph: push-based nodes whose values may still be
//!   loading, with lazy connect-on-first-subscriber lifecycle
//! - Combinators for deriving observables from other observables
//!   (transform, join, caching, staleness policies, debouncing,
//!   incremental computation, keyed maps)
//! - Cooperative schedulers for deferring and coalescing recomputation
//! - A recursive dependency-tree crawler that aggregates a whole tree of
//!   observables into a single observable value
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `observable`: The `Observable` core contract and its combinators
//! - `scheduler`: The `Scheduler` capability and its implementations
//! - `tree`: `ObservableTree`, the recursive dependency aggregator
//! - `error`: Error types
//!
//! The engine assumes a single logical thread of control with a
//! cooperative task queue; there is no parallelism and no locking.
//! Cross-node communication happens exclusively through change
//! notifications, never by mutating another node's state directly.
//!
//! # Example
//!
//! ```rust
//! use rill_core::observable::{StateCell, Value};
//!
//! let count = StateCell::new(2);
//! let doubled = count.observable().transform(|n| n * 2);
//!
//! let subscription = doubled.subscribe(|value: &Value<i32>| {
//!     if let Some(doubled) = value.loaded() {
//!         println!("doubled: {doubled}");
//!     }
//! });
//!
//! count.set(5); // prints: "doubled: 10"
//! drop(subscription);
//! ```

pub mod error;
pub mod observable;
pub mod scheduler;
pub mod tree;
