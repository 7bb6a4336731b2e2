#![forbid(unsafe_code)]

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use fbind_core::{
    ActionToken, BindingError, MemberInfo, MemberPath, MemberProvider, Metadata, Value,
};

use super::base::{ObserverBase, SegmentListener, SegmentSink};
use super::{
    MemberPathLastMember, MemberPathMembers, MemberPathObserver, MemberPathObserverListener,
    ObserverRequest,
};

/// Cached resolution. The root is not part of it, so a weak root stays weak.
#[derive(Debug, Clone)]
enum Resolution {
    Member(Rc<dyn MemberInfo>),
    Unresolved,
    Error(BindingError),
}

impl Resolution {
    fn of(last: &MemberPathLastMember) -> Self {
        match last {
            MemberPathLastMember::Resolved { member, .. } => Self::Member(Rc::clone(member)),
            MemberPathLastMember::Unresolved => Self::Unresolved,
            MemberPathLastMember::Error(e) => Self::Error(e.clone()),
        }
    }
}

#[derive(Default)]
struct SingleState {
    /// Only kept while subscribed.
    last: Option<Resolution>,
    subscription: Option<ActionToken>,
}

/// Observer of a one-segment path. The root never changes identity, so the
/// member is resolved once per subscription.
pub struct SinglePathObserver {
    base: ObserverBase,
    self_ref: Weak<SinglePathObserver>,
    state: RefCell<SingleState>,
}

impl SinglePathObserver {
    /// Create an observer for `request`.
    pub fn new(request: ObserverRequest, provider: Rc<dyn MemberProvider>) -> Rc<Self> {
        Rc::new_cyclic(|self_ref| Self {
            base: ObserverBase::new(request, provider),
            self_ref: Weak::clone(self_ref),
            state: RefCell::new(SingleState::default()),
        })
    }

    fn name(&self) -> &str {
        self.base.path.last().unwrap_or_default()
    }

    fn walk(&self, subscribe: bool) -> MemberPathLastMember {
        let target = self.base.target();
        if target.is_null() {
            return MemberPathLastMember::Unresolved;
        }
        let member = match self.base.resolve(&target, self.name()) {
            Ok(Some(member)) => member,
            Ok(None) => return MemberPathLastMember::Unresolved,
            Err(e) => return MemberPathLastMember::Error(e),
        };
        if subscribe && self.base.observes_segment(0, 1) {
            let sink: Weak<dyn SegmentSink> = self.self_ref.clone();
            let token = self
                .base
                .observe(&target, &member, SegmentListener::shared(sink, 0));
            self.state.borrow_mut().subscription = token;
        }
        MemberPathLastMember::Resolved { target, member }
    }

    /// Walk and subscribe, caching the result. Reports walk errors.
    fn refresh(&self) -> MemberPathLastMember {
        self.release();
        let last = self.walk(true);
        self.state.borrow_mut().last = Some(Resolution::of(&last));
        if let MemberPathLastMember::Error(e) = &last {
            if self.base.raise_error(self, e) {
                self.release();
            }
        }
        last
    }

    fn release(&self) {
        let released = {
            let mut state = self.state.borrow_mut();
            state.last = None;
            state.subscription.take()
        };
        drop(released);
    }
}

impl SegmentSink for SinglePathObserver {
    fn on_segment_changed(&self, _index: usize, sender: &Value) -> bool {
        if self.base.is_disposed() {
            return false;
        }
        if !matches!(self.state.borrow().last, Some(Resolution::Member(_))) {
            return true;
        }
        if !sender.is_null() && *sender != self.base.target() {
            return true;
        }
        if self.base.raise_last_member_changed(self) {
            self.release();
        }
        true
    }
}

impl MemberPathObserver for SinglePathObserver {
    fn path(&self) -> &MemberPath {
        &self.base.path
    }

    fn target(&self) -> Value {
        self.base.target()
    }

    fn is_alive(&self) -> bool {
        self.base.is_alive()
    }

    fn add_listener(&self, listener: &Rc<dyn MemberPathObserverListener>) -> bool {
        match self.base.add_listener(listener) {
            Some(first) => {
                if first && self.base.wants_subscriptions() {
                    self.refresh();
                }
                true
            }
            None => false,
        }
    }

    fn remove_listener(&self, listener: &Rc<dyn MemberPathObserverListener>) -> bool {
        match self.base.remove_listener(listener) {
            Some(now_empty) => {
                if now_empty {
                    self.release();
                }
                true
            }
            None => false,
        }
    }

    fn get_listeners(&self) -> Vec<Rc<dyn MemberPathObserverListener>> {
        let (live, emptied) = self.base.prune_listeners();
        if emptied {
            self.release();
        }
        live
    }

    fn get_members(&self, metadata: Option<&Metadata>) -> MemberPathMembers {
        match self.get_last_member(metadata) {
            MemberPathLastMember::Resolved { target, member } => MemberPathMembers::Resolved {
                targets: Rc::from(vec![target]),
                members: Rc::from(vec![member]),
            },
            MemberPathLastMember::Unresolved => MemberPathMembers::Unresolved,
            MemberPathLastMember::Error(e) => MemberPathMembers::Error(e),
        }
    }

    fn get_last_member(&self, _metadata: Option<&Metadata>) -> MemberPathLastMember {
        if self.base.is_disposed() {
            return MemberPathLastMember::Error(BindingError::Disposed("member path observer"));
        }
        if !self.base.is_alive() {
            self.release();
            return MemberPathLastMember::Unresolved;
        }
        if !self.base.wants_subscriptions() {
            return self.walk(false);
        }
        let cached = self.state.borrow().last.clone();
        match cached {
            Some(Resolution::Member(member)) => MemberPathLastMember::Resolved {
                target: self.base.target(),
                member,
            },
            Some(Resolution::Unresolved) => MemberPathLastMember::Unresolved,
            Some(Resolution::Error(e)) => MemberPathLastMember::Error(e),
            None => self.refresh(),
        }
    }

    fn unsubscribe(&self) {
        self.base.stop_observing();
        self.release();
    }

    fn dispose(&self) {
        if self.base.begin_dispose() {
            self.release();
        }
    }

    fn is_disposed(&self) -> bool {
        self.base.is_disposed()
    }
}

impl fmt::Debug for SinglePathObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("SinglePathObserver")
            .field("base", &self.base)
            .field("last", &state.last)
            .field("subscribed", &state.subscription.is_some())
            .finish()
    }
}
