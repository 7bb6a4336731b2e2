#![forbid(unsafe_code)]

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use fbind_core::{
    ActionToken, BindingError, MemberInfo, MemberPath, MemberProvider, Metadata, SelfMember, Value,
};

use super::base::{ObserverBase, SegmentListener, SegmentSink};
use super::{
    MemberPathLastMember, MemberPathMembers, MemberPathObserver, MemberPathObserverListener,
    ObserverRequest,
};

/// Observer of the empty path: its last member is the root itself.
///
/// Without a trigger nothing is subscribed; with one, the root's trigger
/// event reports a last-member change.
pub struct EmptyPathObserver {
    base: ObserverBase,
    self_ref: Weak<EmptyPathObserver>,
    member: Rc<dyn MemberInfo>,
    subscription: RefCell<Option<ActionToken>>,
}

impl EmptyPathObserver {
    /// Create an observer for `request`.
    pub fn new(request: ObserverRequest, provider: Rc<dyn MemberProvider>) -> Rc<Self> {
        Rc::new_cyclic(|self_ref| Self {
            base: ObserverBase::new(request, provider),
            self_ref: Weak::clone(self_ref),
            member: Rc::new(SelfMember),
            subscription: RefCell::new(None),
        })
    }

    fn subscribe(&self) {
        if !self.base.wants_subscriptions() || !self.base.observes_segment(0, 1) {
            return;
        }
        let root = self.base.target();
        if root.is_null() || self.subscription.borrow().is_some() {
            return;
        }
        let sink: Weak<dyn SegmentSink> = self.self_ref.clone();
        let token = self
            .base
            .observe(&root, &self.member, SegmentListener::shared(sink, 0));
        *self.subscription.borrow_mut() = token;
    }

    fn release(&self) {
        let token = self.subscription.borrow_mut().take();
        drop(token);
    }
}

impl SegmentSink for EmptyPathObserver {
    fn on_segment_changed(&self, _index: usize, _sender: &Value) -> bool {
        if self.base.is_disposed() {
            return false;
        }
        if self.base.raise_last_member_changed(self) {
            self.release();
        }
        true
    }
}

impl MemberPathObserver for EmptyPathObserver {
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
                if first {
                    self.subscribe();
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
        let target = self.base.target();
        if target.is_null() {
            self.release();
            return MemberPathLastMember::Unresolved;
        }
        MemberPathLastMember::Resolved {
            target,
            member: Rc::clone(&self.member),
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

impl fmt::Debug for EmptyPathObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmptyPathObserver")
            .field("base", &self.base)
            .field("subscribed", &self.subscription.borrow().is_some())
            .finish()
    }
}
