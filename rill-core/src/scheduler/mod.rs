//! Scheduling: when deferred work actually runs.
//!
//! Observable nodes never spin up threads or block; anything that must
//! happen later is handed to a [`Scheduler`] as a boxed task. Which
//! scheduler a node gets is always an explicit constructor argument,
//! so a whole graph can run synchronously under test
//! ([`ManualScheduler`]) and deferred in production ([`EventLoop`])
//! without touching the graph code.
//!
//! Scheduled tasks must tolerate running late: a node captures only a
//! weak reference into its tasks and re-checks that it is still
//! connected when the task fires.

mod coalesce;
mod event_loop;
mod manual;
mod timer;

use std::time::Duration;

pub use coalesce::CoalescingScheduler;
pub use event_loop::EventLoop;
pub use manual::ManualScheduler;
pub use timer::Timer;

/// A unit of deferred work.
pub type Task = Box<dyn FnOnce()>;

/// Where and when deferred work runs.
pub trait Scheduler {
    /// Queues `task` to run as soon as the scheduler gets around to it.
    fn schedule(&self, task: Task);

    /// Queues `task` to run no earlier than `delay` from now. A
    /// scheduler without a clock may treat the delay as elapsed
    /// immediately.
    fn schedule_after(&self, delay: Duration, task: Task) {
        let _ = delay;
        self.schedule(task);
    }
}

/// Runs every task immediately on the calling stack. Deferral
/// degenerates to a plain call; delays are treated as elapsed.
#[derive(Debug, Default, Clone, Copy)]
pub struct SyncScheduler;

impl Scheduler for SyncScheduler {
    fn schedule(&self, task: Task) {
        task();
    }
}
