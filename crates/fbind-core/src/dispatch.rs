#![forbid(unsafe_code)]

//! Thread-dispatcher contract.
//!
//! The binding engine never hops threads itself. Components that must run an
//! update on a particular execution context hand a closure to a
//! [`ThreadDispatcher`], which either runs it inline or queues it.
//!
//! Bindings are `Rc`-based and confined to the thread that created them, so
//! handlers are not `Send`. A dispatcher that serves another thread accepts
//! the request on the owning thread and defers it; [`QueueDispatcher`] models
//! that: queued work runs when the owner calls [`QueueDispatcher::drain`].

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;

/// Where a dispatched handler should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ExecutionMode {
    /// Whatever context the caller is on.
    #[default]
    Current,
    /// The main (UI) context; inline when already there.
    Main,
    /// The main context, always deferred.
    MainAsync,
    /// A background context, always deferred.
    Background,
}

/// Runs handlers on an execution context.
pub trait ThreadDispatcher {
    /// Whether a handler for `mode` would run synchronously right now.
    fn can_execute_inline(&self, mode: ExecutionMode) -> bool;

    /// Run `handler` according to `mode`.
    fn execute(&self, mode: ExecutionMode, handler: Box<dyn FnOnce()>);
}

/// Dispatcher that runs every handler immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineDispatcher;

impl ThreadDispatcher for InlineDispatcher {
    fn can_execute_inline(&self, _mode: ExecutionMode) -> bool {
        true
    }

    fn execute(&self, _mode: ExecutionMode, handler: Box<dyn FnOnce()>) {
        handler();
    }
}

/// Upper bound on handlers run by one [`QueueDispatcher::drain`], so a
/// handler that keeps re-queuing itself cannot spin forever.
const MAX_DRAIN: usize = 10_000;

/// Dispatcher that defers asynchronous and background work to a queue.
pub struct QueueDispatcher {
    on_main: Cell<bool>,
    queue: RefCell<VecDeque<(ExecutionMode, Box<dyn FnOnce()>)>>,
}

impl Default for QueueDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl QueueDispatcher {
    /// Dispatcher whose caller is on the main context.
    #[must_use]
    pub fn new() -> Self {
        Self {
            on_main: Cell::new(true),
            queue: RefCell::new(VecDeque::new()),
        }
    }

    /// Tell the dispatcher whether the caller is currently on the main context.
    pub fn set_on_main(&self, on_main: bool) {
        self.on_main.set(on_main);
    }

    /// Number of queued handlers.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Run queued handlers in FIFO order, including handlers queued while
    /// draining. Returns how many ran.
    pub fn drain(&self) -> usize {
        let mut ran = 0;
        while ran < MAX_DRAIN {
            let next = self.queue.borrow_mut().pop_front();
            let Some((_mode, handler)) = next else {
                break;
            };
            handler();
            ran += 1;
        }
        ran
    }
}

impl ThreadDispatcher for QueueDispatcher {
    fn can_execute_inline(&self, mode: ExecutionMode) -> bool {
        match mode {
            ExecutionMode::Current => true,
            ExecutionMode::Main => self.on_main.get(),
            ExecutionMode::MainAsync | ExecutionMode::Background => false,
        }
    }

    fn execute(&self, mode: ExecutionMode, handler: Box<dyn FnOnce()>) {
        if self.can_execute_inline(mode) {
            handler();
        } else {
            self.queue.borrow_mut().push_back((mode, handler));
        }
    }
}

impl fmt::Debug for QueueDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueDispatcher")
            .field("on_main", &self.on_main.get())
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn inline_runs_immediately() {
        let ran = Rc::new(Cell::new(false));
        let r = Rc::clone(&ran);
        InlineDispatcher.execute(ExecutionMode::Background, Box::new(move || r.set(true)));
        assert!(ran.get());
    }

    #[test]
    fn queue_defers_async_modes() {
        let dispatcher = QueueDispatcher::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        for (mode, tag) in [
            (ExecutionMode::Current, "current"),
            (ExecutionMode::MainAsync, "async"),
            (ExecutionMode::Main, "main"),
            (ExecutionMode::Background, "bg"),
        ] {
            let l = Rc::clone(&log);
            dispatcher.execute(mode, Box::new(move || l.borrow_mut().push(tag)));
        }
        assert_eq!(*log.borrow(), ["current", "main"]);
        assert_eq!(dispatcher.pending(), 2);
        assert_eq!(dispatcher.drain(), 2);
        assert_eq!(*log.borrow(), ["current", "main", "async", "bg"]);
    }

    #[test]
    fn main_is_deferred_off_main() {
        let dispatcher = QueueDispatcher::new();
        dispatcher.set_on_main(false);
        assert!(!dispatcher.can_execute_inline(ExecutionMode::Main));
        assert!(dispatcher.can_execute_inline(ExecutionMode::Current));
        dispatcher.execute(ExecutionMode::Main, Box::new(|| {}));
        assert_eq!(dispatcher.pending(), 1);
    }

    #[test]
    fn drain_runs_handlers_queued_during_drain() {
        let dispatcher = Rc::new(QueueDispatcher::new());
        let hits = Rc::new(Cell::new(0));
        let d = Rc::clone(&dispatcher);
        let h = Rc::clone(&hits);
        dispatcher.execute(
            ExecutionMode::MainAsync,
            Box::new(move || {
                h.set(h.get() + 1);
                let h2 = Rc::clone(&h);
                d.execute(ExecutionMode::MainAsync, Box::new(move || h2.set(h2.get() + 1)));
            }),
        );
        assert_eq!(dispatcher.drain(), 2);
        assert_eq!(hits.get(), 2);
    }
}
