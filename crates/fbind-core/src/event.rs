#![forbid(unsafe_code)]

//! Weak event plumbing shared by observable objects and path observers.
//!
//! Publishers keep an [`EventListenerCollection`]. Subscribers hand in an
//! [`EventListener`]; the usual subscriber is a [`WeakEventListener`] so the
//! publisher never keeps the observer graph alive. Every subscription returns
//! an [`ActionToken`] that removes the listener when disposed or dropped.
//!
//! # Invariants
//!
//! 1. Listeners are invoked in registration order.
//! 2. `raise` never holds the collection borrow while a listener runs, so
//!    listeners may subscribe, unsubscribe, or raise again.
//! 3. A listener that reports `is_alive() == false`, or answers `false`
//!    from `try_handle`, is removed before `raise` returns and is not
//!    invoked again.
//! 4. An [`ActionToken`] releases at most once.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::value::Value;

/// Payload carried by a change notification.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Message {
    /// Something changed; no detail.
    #[default]
    Empty,
    /// A named member changed. An empty name means every member.
    Member(Rc<str>),
    /// An arbitrary payload (event arguments).
    Value(Value),
}

impl Message {
    /// Member-changed message.
    pub fn member(name: impl Into<Rc<str>>) -> Self {
        Self::Member(name.into())
    }

    /// Whether a listener interested in `member` should react.
    #[must_use]
    pub fn affects(&self, member: &str) -> bool {
        match self {
            Self::Member(name) => name.is_empty() || &**name == member,
            Self::Empty | Self::Value(_) => true,
        }
    }
}

/// Receiver of change notifications.
pub trait EventListener {
    /// Whether the logical subscriber still exists.
    fn is_alive(&self) -> bool {
        true
    }

    /// Whether this listener refers to its subscriber weakly.
    fn is_weak(&self) -> bool {
        false
    }

    /// Handle a notification. Returning `false` asks the publisher to drop
    /// this listener.
    fn try_handle(&self, sender: &Value, message: &Message) -> bool;
}

/// Listener that forwards to a subscriber without owning it.
#[derive(Clone)]
pub struct WeakEventListener {
    target: Weak<dyn EventListener>,
}

impl WeakEventListener {
    /// Create a weak listener for `target`.
    #[must_use]
    pub fn new(target: &Rc<dyn EventListener>) -> Self {
        Self {
            target: Rc::downgrade(target),
        }
    }

    /// Create a weak listener from an existing weak handle.
    #[must_use]
    pub fn from_weak(target: Weak<dyn EventListener>) -> Self {
        Self { target }
    }

    /// Wrap into a shared listener suitable for a collection.
    #[must_use]
    pub fn into_shared(self) -> Rc<dyn EventListener> {
        Rc::new(self)
    }
}

impl EventListener for WeakEventListener {
    fn is_alive(&self) -> bool {
        self.target.strong_count() > 0
    }

    fn is_weak(&self) -> bool {
        true
    }

    fn try_handle(&self, sender: &Value, message: &Message) -> bool {
        match self.target.upgrade() {
            Some(target) => target.is_alive() && target.try_handle(sender, message),
            None => false,
        }
    }
}

impl fmt::Debug for WeakEventListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakEventListener")
            .field("alive", &self.is_alive())
            .finish()
    }
}

/// Listener backed by a closure. Always stays subscribed.
pub struct FnEventListener<F> {
    handler: F,
}

impl<F: Fn(&Value, &Message) + 'static> FnEventListener<F> {
    /// Wrap `handler` as a shared listener.
    pub fn shared(handler: F) -> Rc<dyn EventListener> {
        Rc::new(Self { handler })
    }
}

impl<F: Fn(&Value, &Message)> EventListener for FnEventListener<F> {
    fn try_handle(&self, sender: &Value, message: &Message) -> bool {
        (self.handler)(sender, message);
        true
    }
}

/// Disposable handle for a subscription or any other release action.
///
/// Runs its release closure exactly once: on [`ActionToken::dispose`] or on
/// drop, whichever comes first.
#[must_use = "dropping the token releases the subscription immediately"]
pub struct ActionToken {
    release: Option<Box<dyn FnOnce()>>,
}

impl ActionToken {
    /// Token that runs `release` when disposed.
    pub fn new(release: impl FnOnce() + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// Token with nothing to release.
    pub fn noop() -> Self {
        Self { release: None }
    }

    /// Release now.
    pub fn dispose(mut self) {
        self.release_now();
    }

    /// Whether the token still has a pending release action.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.release.is_some()
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for ActionToken {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl fmt::Debug for ActionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionToken")
            .field("pending", &self.is_pending())
            .finish()
    }
}

struct CollectionInner {
    entries: Vec<(u64, Rc<dyn EventListener>)>,
    next_id: u64,
}

/// Ordered set of listeners owned by a publisher.
pub struct EventListenerCollection {
    inner: Rc<RefCell<CollectionInner>>,
}

impl Default for EventListenerCollection {
    fn default() -> Self {
        Self::new()
    }
}

impl EventListenerCollection {
    /// Create an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(CollectionInner {
                entries: Vec::new(),
                next_id: 1,
            })),
        }
    }

    /// Register `listener`. Disposing the returned token removes it.
    pub fn add(&self, listener: Rc<dyn EventListener>) -> ActionToken {
        let id = {
            let mut inner = self.inner.borrow_mut();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.entries.push((id, listener));
            id
        };
        let weak = Rc::downgrade(&self.inner);
        ActionToken::new(move || {
            if let Some(inner) = weak.upgrade() {
                // Take the entry out first so its drop runs outside the borrow.
                let removed = {
                    let mut inner = inner.borrow_mut();
                    inner
                        .entries
                        .iter()
                        .position(|(entry_id, _)| *entry_id == id)
                        .map(|pos| inner.entries.remove(pos))
                };
                drop(removed);
            }
        })
    }

    /// Notify every listener, pruning dead ones. Returns how many listeners
    /// handled the message.
    pub fn raise(&self, sender: &Value, message: &Message) -> usize {
        let snapshot: Vec<(u64, Rc<dyn EventListener>)> = self.inner.borrow().entries.clone();
        if snapshot.is_empty() {
            return 0;
        }

        let mut handled = 0;
        let mut dead = Vec::new();
        for (id, listener) in &snapshot {
            if listener.is_alive() && listener.try_handle(sender, message) {
                handled += 1;
            } else {
                dead.push(*id);
            }
        }

        if !dead.is_empty() {
            let removed: Vec<_> = {
                let mut inner = self.inner.borrow_mut();
                let (gone, kept) = inner
                    .entries
                    .drain(..)
                    .partition(|(id, _)| dead.contains(id));
                inner.entries = kept;
                gone
            };
            drop(removed);
        }
        handled
    }

    /// Number of registered listeners, including dead ones not yet pruned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    /// Whether no listener is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().entries.is_empty()
    }

    /// Remove every listener.
    pub fn clear(&self) {
        let removed = std::mem::take(&mut self.inner.borrow_mut().entries);
        drop(removed);
    }
}

impl fmt::Debug for EventListenerCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventListenerCollection")
            .field("len", &self.len())
            .finish()
    }
}
