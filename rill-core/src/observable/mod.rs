//! The observable graph: values that may still be loading, and the
//! combinators that derive new values from them.
//!
//! # Concepts
//!
//! - An [`Observable`] is a handle to a value that changes over time
//!   and may currently be [`Value::Loading`].
//! - [`StateCell`] and [`PendingCell`] are the mutable leaves that feed
//!   the graph; everything else is derived through the combinator
//!   methods on [`Observable`].
//! - A derived observable does no work and holds no upstream
//!   subscriptions until someone subscribes to it, and releases
//!   everything again when its last observer leaves.
//!
//! The factory methods here only construct nodes; all connection
//! semantics live with the node implementations in the submodules.

mod cached;
mod cell;
mod chained;
mod computed;
mod computed_map;
mod constant;
mod debounced;
mod incremental;
mod node;
mod optimistic;
mod optional;
mod sticky;
mod value;

use std::any::Any;
use std::rc::Rc;
use std::time::Duration;

use crate::scheduler::{Scheduler, SyncScheduler};

pub use cell::{PendingCell, StateCell};
pub use computed_map::compute_map;
pub use incremental::IncrementalTask;
pub use node::{Observable, Observer, Subscription};
pub use optimistic::MaybeStale;
pub use value::Value;

pub(crate) use computed::payload_message;
pub(crate) use node::{Node, NodeCore};

fn downcast<T: 'static>(value: &Rc<dyn Any>) -> Rc<T> {
    match Rc::clone(value).downcast::<T>() {
        Ok(value) => value,
        // Argument slots are filled by the typed wrappers below; a
        // mismatch is a bug in this module, not in caller code.
        Err(_) => unreachable!("computed argument holds a different type"),
    }
}

impl<T: 'static> Observable<T> {
    /// An observable that always holds `value`.
    pub fn just(value: T) -> Observable<T> {
        Observable::from_node(constant::ConstantNode::new(Rc::new(value)))
    }

    /// An observable that always holds an already-shared value.
    pub fn just_shared(value: Rc<T>) -> Observable<T> {
        Observable::from_node(constant::ConstantNode::new(value))
    }

    /// An observable that never finishes loading.
    pub fn loading() -> Observable<T> {
        Observable::from_node(constant::NeverNode::new())
    }

    /// Derives a value through `f`, recomputing synchronously whenever
    /// this observable changes.
    pub fn transform<R: 'static>(&self, f: impl Fn(&T) -> R + 'static) -> Observable<R> {
        self.transform_with(Rc::new(SyncScheduler), f)
    }

    /// Derives a value through `f`, deferring recomputation to
    /// `scheduler`. The initial computation on connect is synchronous
    /// either way; loading states always propagate synchronously.
    pub fn transform_with<R: 'static>(
        &self,
        scheduler: Rc<dyn Scheduler>,
        f: impl Fn(&T) -> R + 'static,
    ) -> Observable<R> {
        computed::computed(
            scheduler,
            vec![self.as_arg()],
            Box::new(move |args| f(&downcast::<T>(&args[0]))),
        )
    }

    /// Combines two observables through `f`.
    pub fn transform2<A: 'static, B: 'static>(
        a: &Observable<A>,
        b: &Observable<B>,
        f: impl Fn(&A, &B) -> T + 'static,
    ) -> Observable<T> {
        Self::transform2_with(Rc::new(SyncScheduler), a, b, f)
    }

    pub fn transform2_with<A: 'static, B: 'static>(
        scheduler: Rc<dyn Scheduler>,
        a: &Observable<A>,
        b: &Observable<B>,
        f: impl Fn(&A, &B) -> T + 'static,
    ) -> Observable<T> {
        computed::computed(
            scheduler,
            vec![a.as_arg(), b.as_arg()],
            Box::new(move |args| f(&downcast::<A>(&args[0]), &downcast::<B>(&args[1]))),
        )
    }

    /// Derives a value that only exists for some inputs: `None` maps to
    /// a loading result.
    pub fn transform_if<R: 'static>(
        &self,
        f: impl Fn(&T) -> Option<R> + 'static,
    ) -> Observable<R> {
        self.join(move |value| match f(value) {
            Some(result) => Observable::just(result),
            None => Observable::loading(),
        })
    }

    /// Collects many observables of the same type into one observable
    /// of all their values, loaded once every source is.
    pub fn flatten(sources: Vec<Observable<T>>) -> Observable<Vec<Rc<T>>> {
        Self::flatten_with(Rc::new(SyncScheduler), sources)
    }

    pub fn flatten_with(
        scheduler: Rc<dyn Scheduler>,
        sources: Vec<Observable<T>>,
    ) -> Observable<Vec<Rc<T>>> {
        let args = sources.iter().map(Observable::as_arg).collect();
        computed::computed(
            scheduler,
            args,
            Box::new(|values| values.iter().map(downcast::<T>).collect()),
        )
    }

    /// Maps each input through an observable-producing `f` and collects
    /// the results.
    pub fn flat_join<I>(
        inputs: impl IntoIterator<Item = I>,
        f: impl Fn(I) -> Observable<T>,
    ) -> Observable<Vec<Rc<T>>> {
        Self::flatten(inputs.into_iter().map(f).collect())
    }

    /// Maps each element of an observable collection through an
    /// observable-producing `f` and collects the results.
    pub fn flat_map<R: 'static>(
        collection: &Observable<Vec<T>>,
        f: impl Fn(&T) -> Observable<R> + 'static,
    ) -> Observable<Vec<Rc<R>>> {
        collection.join(move |items: &Vec<T>| Observable::flatten(items.iter().map(&f).collect()))
    }

    /// Selects an inner observable through `f` and follows it: the
    /// result tracks whichever inner the current value of `self`
    /// selects.
    pub fn join<R: 'static>(&self, f: impl Fn(&T) -> Observable<R> + 'static) -> Observable<R> {
        chained::chained(self.transform(f))
    }

    pub fn join_with<R: 'static>(
        &self,
        scheduler: Rc<dyn Scheduler>,
        f: impl Fn(&T) -> Observable<R> + 'static,
    ) -> Observable<R> {
        chained::chained(self.transform_with(scheduler, f))
    }

    /// Selects an inner observable from two sources.
    pub fn join2<A: 'static, B: 'static>(
        a: &Observable<A>,
        b: &Observable<B>,
        f: impl Fn(&A, &B) -> Observable<T> + 'static,
    ) -> Observable<T> {
        chained::chained(Observable::transform2(a, b, f))
    }

    /// Suppresses changes whose new value `same` judges equal to the
    /// last forwarded one.
    pub fn cache(&self, same: impl Fn(&T, &T) -> bool + 'static) -> Observable<T> {
        cached::cached(self.clone(), Box::new(same))
    }

    /// [`cache`](Observable::cache) with `==`.
    pub fn cache_if_equal(&self) -> Observable<T>
    where
        T: PartialEq,
    {
        self.cache(|a, b| a == b)
    }

    /// Freezes the first value this observable produces and releases
    /// the source immediately.
    pub fn sticky(&self) -> Observable<T> {
        sticky::sticky(self.clone())
    }

    /// Keeps showing the last value while the source reloads; loading
    /// states never propagate.
    pub fn optimistic(&self) -> Observable<T> {
        optimistic::optimistic(self.clone(), None)
    }

    /// [`optimistic`](Observable::optimistic), starting from `initial`
    /// instead of loading before the first real value arrives.
    pub fn optimistic_with_default(&self, initial: T) -> Observable<T> {
        optimistic::optimistic(self.clone(), Some(initial))
    }

    /// Keeps showing the last value while the source reloads, unless
    /// the reload takes longer than `timeout`.
    pub fn optimistic_with_timeout(
        &self,
        timeout: Duration,
        scheduler: Rc<dyn Scheduler>,
    ) -> Observable<T> {
        optimistic::optimistic_with_timeout(self.clone(), timeout, scheduler)
    }

    /// Keeps showing the last value while the source reloads, labelled
    /// with an explicit staleness flag.
    pub fn explicitly_optimistic(&self) -> Observable<MaybeStale<T>> {
        optimistic::explicitly_optimistic(self.clone())
    }

    /// Forwards only the last value of any burst: each change re-arms a
    /// `delay` timer and only a full quiet window lets a value through.
    pub fn debounce(&self, delay: Duration, scheduler: Rc<dyn Scheduler>) -> Observable<T> {
        debounced::debounced(self.clone(), delay, scheduler)
    }

    /// The always-loaded view: loading becomes `None`, a value becomes
    /// `Some`.
    pub fn to_option(&self) -> Observable<Option<Rc<T>>> {
        optional::optional(self.clone())
    }

    /// This observable's value once it loads; `backup`'s value until
    /// then.
    pub fn or(&self, backup: Observable<T>) -> Observable<T> {
        self.to_option().join(move |primary: &Option<Rc<T>>| match primary {
            Some(value) => Observable::just_shared(Rc::clone(value)),
            None => backup.clone(),
        })
    }

    /// Runs `task` one step per scheduler tick, publishing each
    /// intermediate result it reports.
    pub fn incremental(
        task: Box<dyn IncrementalTask<T>>,
        scheduler: Rc<dyn Scheduler>,
    ) -> Observable<T> {
        incremental::incremental(task, scheduler)
    }
}
