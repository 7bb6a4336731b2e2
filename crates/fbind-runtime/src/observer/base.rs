#![forbid(unsafe_code)]

//! State shared by every observer variant: root, listeners, member lookup.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use fbind_core::{
    ActionToken, BindingError, EventListener, MemberInfo, MemberKinds, MemberPath, MemberProvider,
    Message, RootRef, Value,
};

use super::{MemberPathObserver, MemberPathObserverListener, ObserverFlags, ObserverRequest};

/// Receives segment notifications on behalf of an observer.
pub(super) trait SegmentSink {
    /// Segment `index` of the walked chain reported a change. Returning
    /// `false` drops the subscription.
    fn on_segment_changed(&self, index: usize, sender: &Value) -> bool;
}

/// Subscription callback for one walked segment. Refers to its observer
/// weakly so publishers never keep observers alive.
pub(super) struct SegmentListener {
    sink: Weak<dyn SegmentSink>,
    index: usize,
}

impl SegmentListener {
    pub(super) fn shared(sink: Weak<dyn SegmentSink>, index: usize) -> Rc<dyn EventListener> {
        Rc::new(Self { sink, index })
    }
}

impl EventListener for SegmentListener {
    fn is_alive(&self) -> bool {
        self.sink.strong_count() > 0
    }

    fn is_weak(&self) -> bool {
        true
    }

    fn try_handle(&self, sender: &Value, _message: &Message) -> bool {
        match self.sink.upgrade() {
            Some(sink) => sink.on_segment_changed(self.index, sender),
            None => false,
        }
    }
}

pub(super) struct ObserverBase {
    pub(super) path: MemberPath,
    pub(super) flags: ObserverFlags,
    root: RootRef,
    trigger: Option<Rc<str>>,
    provider: Rc<dyn MemberProvider>,
    listeners: RefCell<Vec<Weak<dyn MemberPathObserverListener>>>,
    observing: Cell<bool>,
    disposed: Cell<bool>,
}

impl ObserverBase {
    pub(super) fn new(request: ObserverRequest, provider: Rc<dyn MemberProvider>) -> Self {
        let root = request.root();
        Self {
            path: request.path,
            flags: request.flags,
            root,
            trigger: request.trigger,
            provider,
            listeners: RefCell::new(Vec::new()),
            observing: Cell::new(true),
            disposed: Cell::new(false),
        }
    }

    pub(super) fn target(&self) -> Value {
        self.root.get()
    }

    /// Handle to the root with the configured ownership, for caches that
    /// must not extend a weak root's lifetime.
    pub(super) fn root_ref(&self) -> RootRef {
        self.root.clone()
    }

    pub(super) fn is_alive(&self) -> bool {
        self.root.is_alive()
    }

    pub(super) fn is_disposed(&self) -> bool {
        self.disposed.get()
    }

    /// Mark disposed. Returns `false` if it already was.
    pub(super) fn begin_dispose(&self) -> bool {
        if self.disposed.replace(true) {
            return false;
        }
        let listeners = std::mem::take(&mut *self.listeners.borrow_mut());
        drop(listeners);
        true
    }

    /// Stop subscribing for good; reads keep working.
    pub(super) fn stop_observing(&self) {
        self.observing.set(false);
    }

    /// Whether walks should establish subscriptions.
    pub(super) fn wants_subscriptions(&self) -> bool {
        !self.disposed.get() && self.observing.get() && self.has_listeners()
    }

    /// Whether segment `index` of a path with `len` segments is observed.
    pub(super) fn observes_segment(&self, index: usize, len: usize) -> bool {
        if index + 1 == len {
            self.flags.contains(ObserverFlags::OBSERVE_LAST)
        } else {
            self.flags.contains(ObserverFlags::OBSERVABLE)
        }
    }

    /// Register `listener`. Returns `Some(first)` when added, `None` when it
    /// was already present.
    pub(super) fn add_listener(&self, listener: &Rc<dyn MemberPathObserverListener>) -> Option<bool> {
        if self.disposed.get() {
            return None;
        }
        let mut listeners = self.listeners.borrow_mut();
        listeners.retain(|w| w.strong_count() > 0);
        if listeners
            .iter()
            .any(|w| std::ptr::addr_eq(w.as_ptr(), Rc::as_ptr(listener)))
        {
            return None;
        }
        listeners.push(Rc::downgrade(listener));
        Some(listeners.len() == 1)
    }

    /// Unregister `listener`. Returns `Some(now_empty)` when removed.
    pub(super) fn remove_listener(&self, listener: &Rc<dyn MemberPathObserverListener>) -> Option<bool> {
        let mut listeners = self.listeners.borrow_mut();
        let pos = listeners
            .iter()
            .position(|w| std::ptr::addr_eq(w.as_ptr(), Rc::as_ptr(listener)))?;
        listeners.remove(pos);
        listeners.retain(|w| w.strong_count() > 0);
        Some(listeners.is_empty())
    }

    pub(super) fn has_listeners(&self) -> bool {
        self.listeners.borrow().iter().any(|w| w.strong_count() > 0)
    }

    /// Live listeners in registration order; dead ones are pruned. The flag
    /// is set when pruning removed the last listener, so the caller can
    /// release its subscriptions.
    pub(super) fn prune_listeners(&self) -> (Vec<Rc<dyn MemberPathObserverListener>>, bool) {
        let mut live = Vec::new();
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|w| match w.upgrade() {
            Some(listener) if listener.is_alive() => {
                live.push(listener);
                true
            }
            _ => false,
        });
        let emptied = before > 0 && listeners.is_empty();
        (live, emptied)
    }

    /// Each `raise_*` returns `true` when no listener is left afterwards.
    #[must_use]
    pub(super) fn raise_path_members_changed(&self, observer: &dyn MemberPathObserver) -> bool {
        let (live, emptied) = self.prune_listeners();
        for listener in live {
            listener.on_path_members_changed(observer);
        }
        emptied
    }

    #[must_use]
    pub(super) fn raise_last_member_changed(&self, observer: &dyn MemberPathObserver) -> bool {
        let (live, emptied) = self.prune_listeners();
        for listener in live {
            listener.on_last_member_changed(observer);
        }
        emptied
    }

    #[must_use]
    pub(super) fn raise_error(&self, observer: &dyn MemberPathObserver, error: &BindingError) -> bool {
        tracing::debug!(path = %self.path, %error, "member path walk failed");
        let (live, emptied) = self.prune_listeners();
        for listener in live {
            listener.on_error(observer, error);
        }
        emptied
    }

    /// Resolve segment `name` on `target`. `Ok(None)` is a tolerated miss.
    pub(super) fn resolve(
        &self,
        target: &Value,
        name: &str,
    ) -> Result<Option<Rc<dyn MemberInfo>>, BindingError> {
        let Some(ty) = target.type_key() else {
            return Ok(None);
        };
        match self.provider.try_get_member(ty, name, MemberKinds::ACCESSOR) {
            Some(member) => Ok(Some(member)),
            None if self.flags.contains(ObserverFlags::OPTIONAL) => Ok(None),
            None => Err(BindingError::member_not_found(ty.name(), name)),
        }
    }

    /// Subscribe `listener` to changes of `member` on `target`, or to the
    /// trigger event when one is configured.
    pub(super) fn observe(
        &self,
        target: &Value,
        member: &Rc<dyn MemberInfo>,
        listener: Rc<dyn EventListener>,
    ) -> Option<ActionToken> {
        match &self.trigger {
            Some(trigger) => self
                .provider
                .try_get_member_of(target, trigger, MemberKinds::EVENT | MemberKinds::ACCESSOR)
                .filter(|m| m.can_observe())
                .and_then(|m| m.try_observe(target, listener)),
            None => member.try_observe(target, listener),
        }
    }
}

impl fmt::Debug for ObserverBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverBase")
            .field("path", &self.path.path())
            .field("flags", &self.flags)
            .field("trigger", &self.trigger)
            .field("root", &self.root)
            .field("listeners", &self.listeners.borrow().len())
            .field("disposed", &self.disposed.get())
            .finish()
    }
}
