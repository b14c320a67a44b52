//! A one-shot timer that can be re-armed and cancelled.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use super::Scheduler;

struct TimerState {
    scheduler: Rc<dyn Scheduler>,
    task: Box<dyn Fn()>,
    generation: Cell<u64>,
    armed: Cell<bool>,
}

/// Fires its task once, `delay` after the most recent
/// [`schedule`](Timer::schedule) call. Re-arming or cancelling
/// invalidates any fire already queued on the underlying scheduler:
/// each arm bumps a generation counter and a queued fire runs the task
/// only if its generation is still current.
pub struct Timer {
    state: Rc<TimerState>,
}

impl Timer {
    pub fn new(scheduler: Rc<dyn Scheduler>, task: impl Fn() + 'static) -> Self {
        Timer {
            state: Rc::new(TimerState {
                scheduler,
                task: Box::new(task),
                generation: Cell::new(0),
                armed: Cell::new(false),
            }),
        }
    }

    /// Arms the timer, resetting the countdown if it was already armed.
    pub fn schedule(&self, delay: Duration) {
        let generation = self.state.generation.get().wrapping_add(1);
        self.state.generation.set(generation);
        self.state.armed.set(true);

        let state = Rc::clone(&self.state);
        self.state.scheduler.schedule_after(
            delay,
            Box::new(move || {
                if state.armed.get() && state.generation.get() == generation {
                    state.armed.set(false);
                    (state.task)();
                }
            }),
        );
    }

    pub fn cancel(&self) {
        self.state.armed.set(false);
    }

    pub fn is_running(&self) -> bool {
        self.state.armed.get()
    }
}
