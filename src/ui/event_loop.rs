//! Single-threaded cooperative event loop ("the UI thread").
//!
//! Owns every deferred UI-side continuation. A task passed to [`EventLoop::defer`]
//! runs on the *next* turn, never on the turn that scheduled it, so state
//! changes made by a turn settle before the continuation observes them.
//! Worker threads never touch the loop directly: they send results over
//! channels and a polled source drains them on the UI thread.

use std::cell::{Cell, RefCell};
use std::collections::{HashSet, VecDeque};
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{trace, warn};

/// Upper bound on turns taken by [`EventLoop::run_until_idle`].
const MAX_IDLE_TURNS: usize = 1024;

/// Sleep between turns while waiting for worker results.
const POLL_INTERVAL: Duration = Duration::from_millis(2);

/// Returned by a polled source to stay registered or to remove itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlFlow {
    Continue,
    Break,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceId(u64);

type Task = Box<dyn FnOnce()>;

struct Source {
    id: u64,
    poll: Box<dyn FnMut() -> ControlFlow>,
}

#[derive(Default)]
struct LoopInner {
    queue: RefCell<VecDeque<Task>>,
    sources: RefCell<Vec<Source>>,
    removed: RefCell<HashSet<u64>>,
    next_source_id: Cell<u64>,
    turns: Cell<u64>,
}

/// Cheaply clonable handle to the UI-thread task queue.
#[derive(Clone, Default)]
pub struct EventLoop {
    inner: Rc<LoopInner>,
}

impl EventLoop {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules `task` for the next turn.
    pub fn defer<F>(&self, task: F)
    where
        F: FnOnce() + 'static,
    {
        self.inner.queue.borrow_mut().push_back(Box::new(task));
    }

    /// Registers a poller that runs once per turn, after the deferred tasks.
    pub fn add_source<F>(&self, poll: F) -> SourceId
    where
        F: FnMut() -> ControlFlow + 'static,
    {
        let id = self.inner.next_source_id.get().wrapping_add(1);
        self.inner.next_source_id.set(id);
        self.inner.sources.borrow_mut().push(Source {
            id,
            poll: Box::new(poll),
        });
        SourceId(id)
    }

    pub fn remove_source(&self, id: SourceId) {
        self.inner.removed.borrow_mut().insert(id.0);
    }

    /// Number of tasks waiting for the next turn.
    pub fn pending(&self) -> usize {
        self.inner.queue.borrow().len()
    }

    pub fn has_pending(&self) -> bool {
        self.pending() > 0
    }

    /// Number of completed turns.
    pub fn turns(&self) -> u64 {
        self.inner.turns.get()
    }

    /// Runs one turn: every task queued before the turn started, then every source.
    ///
    /// Returns the number of deferred tasks that ran.
    pub fn turn(&self) -> usize {
        let batch: Vec<Task> = self.inner.queue.borrow_mut().drain(..).collect();
        let ran = batch.len();
        for task in batch {
            task();
        }

        self.poll_sources();
        self.inner.turns.set(self.inner.turns.get() + 1);
        ran
    }

    /// Turns until no deferred task is left. Always takes at least one turn.
    pub fn run_until_idle(&self) -> usize {
        let mut turns = 0;
        loop {
            self.turn();
            turns += 1;
            if !self.has_pending() {
                break;
            }
            if turns >= MAX_IDLE_TURNS {
                warn!(pending = self.pending(), "Event loop did not settle");
                break;
            }
        }
        turns
    }

    /// Turns until `done` holds or `timeout` elapses, sleeping briefly between
    /// idle turns so worker threads can make progress.
    pub fn run_until<F>(&self, timeout: Duration, mut done: F) -> bool
    where
        F: FnMut() -> bool,
    {
        let started = Instant::now();
        loop {
            self.turn();
            if done() {
                return true;
            }
            if started.elapsed() >= timeout {
                trace!(?timeout, "Event loop wait timed out");
                return false;
            }
            if !self.has_pending() {
                thread::sleep(POLL_INTERVAL);
            }
        }
    }

    fn poll_sources(&self) {
        // Polled outside the borrow: a source may add or remove sources.
        let mut sources = std::mem::take(&mut *self.inner.sources.borrow_mut());
        sources.retain_mut(|source| {
            if self.inner.removed.borrow().contains(&source.id) {
                return false;
            }
            (source.poll)() == ControlFlow::Continue
        });

        let mut current = self.inner.sources.borrow_mut();
        sources.append(&mut current);
        let mut removed = self.inner.removed.borrow_mut();
        sources.retain(|source| !removed.contains(&source.id));
        removed.clear();
        *current = sources;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deferred_task_runs_on_next_turn() {
        let event_loop = EventLoop::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        let log_outer = Rc::clone(&log);
        let loop_inner = event_loop.clone();
        event_loop.defer(move || {
            log_outer.borrow_mut().push("first");
            let log_nested = Rc::clone(&log_outer);
            loop_inner.defer(move || log_nested.borrow_mut().push("nested"));
        });

        assert!(log.borrow().is_empty());
        assert_eq!(event_loop.turn(), 1);
        assert_eq!(*log.borrow(), vec!["first"]);

        assert_eq!(event_loop.turn(), 1);
        assert_eq!(*log.borrow(), vec!["first", "nested"]);
    }

    #[test]
    fn test_run_until_idle_drains_chains() {
        let event_loop = EventLoop::new();
        let count = Rc::new(Cell::new(0));

        fn chain(event_loop: EventLoop, count: Rc<Cell<u32>>, left: u32) {
            if left == 0 {
                return;
            }
            let next_loop = event_loop.clone();
            event_loop.defer(move || {
                count.set(count.get() + 1);
                chain(next_loop, count, left - 1);
            });
        }

        chain(event_loop.clone(), Rc::clone(&count), 5);
        let turns = event_loop.run_until_idle();
        assert_eq!(count.get(), 5);
        assert_eq!(turns, 5);
        assert!(!event_loop.has_pending());
    }

    #[test]
    fn test_source_polled_until_break() {
        let event_loop = EventLoop::new();
        let polls = Rc::new(Cell::new(0));
        let polls_in = Rc::clone(&polls);
        event_loop.add_source(move || {
            polls_in.set(polls_in.get() + 1);
            if polls_in.get() >= 3 {
                ControlFlow::Break
            } else {
                ControlFlow::Continue
            }
        });

        for _ in 0..5 {
            event_loop.turn();
        }
        assert_eq!(polls.get(), 3);
    }

    #[test]
    fn test_removed_source_is_not_polled() {
        let event_loop = EventLoop::new();
        let polls = Rc::new(Cell::new(0));
        let polls_in = Rc::clone(&polls);
        let id = event_loop.add_source(move || {
            polls_in.set(polls_in.get() + 1);
            ControlFlow::Continue
        });

        event_loop.turn();
        event_loop.remove_source(id);
        event_loop.turn();
        event_loop.turn();
        assert_eq!(polls.get(), 1);
    }

    #[test]
    fn test_source_added_while_polling_survives() {
        let event_loop = EventLoop::new();
        let inner_polls = Rc::new(Cell::new(0));
        let loop_handle = event_loop.clone();
        let inner_polls_in = Rc::clone(&inner_polls);
        event_loop.add_source(move || {
            let counter = Rc::clone(&inner_polls_in);
            loop_handle.add_source(move || {
                counter.set(counter.get() + 1);
                ControlFlow::Continue
            });
            ControlFlow::Break
        });

        event_loop.turn();
        event_loop.turn();
        assert_eq!(inner_polls.get(), 1);
    }

    #[test]
    fn test_run_until_times_out() {
        let event_loop = EventLoop::new();
        assert!(!event_loop.run_until(Duration::from_millis(10), || false));
        assert!(event_loop.run_until(Duration::from_millis(10), || true));
    }
}
