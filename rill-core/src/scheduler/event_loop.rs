//! A minimal single-threaded run loop for driving an observable graph
//! outside of tests.

use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

use super::{Scheduler, Task};

struct Delayed {
    deadline: Instant,
    // Tie-breaker preserving submission order for equal deadlines.
    seq: u64,
    task: Task,
}

impl PartialEq for Delayed {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl Eq for Delayed {}

impl PartialOrd for Delayed {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Delayed {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap, we want the earliest
        // deadline on top.
        (other.deadline, other.seq).cmp(&(self.deadline, self.seq))
    }
}

#[derive(Default)]
struct LoopState {
    ready: RefCell<VecDeque<Task>>,
    delayed: RefCell<BinaryHeap<Delayed>>,
    next_seq: Cell<u64>,
}

/// A FIFO task queue plus a deadline queue, drained by
/// [`run_until_idle`](EventLoop::run_until_idle). Hand
/// [`scheduler`](EventLoop::scheduler) to the nodes that should run on
/// this loop.
#[derive(Default)]
pub struct EventLoop {
    state: Rc<LoopState>,
}

struct EventLoopScheduler {
    state: Rc<LoopState>,
}

impl Scheduler for EventLoopScheduler {
    fn schedule(&self, task: Task) {
        self.state.ready.borrow_mut().push_back(task);
    }

    fn schedule_after(&self, delay: Duration, task: Task) {
        let seq = self.state.next_seq.get();
        self.state.next_seq.set(seq + 1);
        self.state.delayed.borrow_mut().push(Delayed {
            deadline: Instant::now() + delay,
            seq,
            task,
        });
    }
}

impl EventLoop {
    pub fn new() -> Self {
        EventLoop::default()
    }

    /// An injectable scheduler feeding this loop.
    pub fn scheduler(&self) -> Rc<dyn Scheduler> {
        Rc::new(EventLoopScheduler {
            state: Rc::clone(&self.state),
        })
    }

    pub fn is_idle(&self) -> bool {
        self.state.ready.borrow().is_empty() && self.state.delayed.borrow().is_empty()
    }

    /// Runs ready tasks, sleeping through delays as needed, until both
    /// queues are empty.
    pub fn run_until_idle(&self) {
        loop {
            let task = self.state.ready.borrow_mut().pop_front();
            if let Some(task) = task {
                task();
                continue;
            }

            let next_deadline = self.state.delayed.borrow().peek().map(|d| d.deadline);
            let Some(deadline) = next_deadline else {
                return;
            };
            let now = Instant::now();
            if deadline > now {
                thread::sleep(deadline - now);
            }

            let now = Instant::now();
            let mut due: Vec<Task> = Vec::new();
            {
                let mut delayed = self.state.delayed.borrow_mut();
                while delayed.peek().is_some_and(|d| d.deadline <= now) {
                    if let Some(delayed_task) = delayed.pop() {
                        due.push(delayed_task.task);
                    }
                }
            }
            self.state.ready.borrow_mut().extend(due);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ready_tasks_run_in_order() {
        let event_loop = EventLoop::new();
        let scheduler = event_loop.scheduler();
        let log: Rc<RefCell<Vec<i32>>> = Rc::new(RefCell::new(Vec::new()));

        for i in 0..3 {
            let log = Rc::clone(&log);
            scheduler.schedule(Box::new(move || log.borrow_mut().push(i)));
        }
        event_loop.run_until_idle();
        assert_eq!(*log.borrow(), vec![0, 1, 2]);
        assert!(event_loop.is_idle());
    }

    #[test]
    fn delayed_tasks_run_after_their_deadline() {
        let event_loop = EventLoop::new();
        let scheduler = event_loop.scheduler();
        let log: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(Vec::new()));

        let late = Rc::clone(&log);
        scheduler.schedule_after(
            Duration::from_millis(5),
            Box::new(move || late.borrow_mut().push("late")),
        );
        let early = Rc::clone(&log);
        scheduler.schedule(Box::new(move || early.borrow_mut().push("early")));

        let start = Instant::now();
        event_loop.run_until_idle();
        assert!(start.elapsed() >= Duration::from_millis(5));
        assert_eq!(*log.borrow(), vec!["early", "late"]);
    }

    #[test]
    fn tasks_may_schedule_more_tasks() {
        let event_loop = EventLoop::new();
        let scheduler = event_loop.scheduler();
        let count = Rc::new(Cell::new(0));

        fn countdown(scheduler: Rc<dyn Scheduler>, count: Rc<Cell<i32>>, remaining: i32) {
            if remaining == 0 {
                return;
            }
            let inner = Rc::clone(&scheduler);
            scheduler.schedule(Box::new(move || {
                count.set(count.get() + 1);
                countdown(Rc::clone(&inner), count, remaining - 1);
            }));
        }

        countdown(scheduler, Rc::clone(&count), 5);
        event_loop.run_until_idle();
        assert_eq!(count.get(), 5);
    }
}
