#![forbid(unsafe_code)]

//! Observer of multi-segment paths with incremental re-resolution.
//!
//! The walked chain is kept as three parallel vectors:
//!
//! ```text
//! targets:  root ── A ── A.B          (object each member applies to)
//! members:  .A      .B   .C           (resolved accessor per segment)
//! subs:     sub0    sub1 sub2         (subscription of member k on targets[k])
//! ```
//!
//! When segment `i` reports a change, only the tail after `i` is rebuilt:
//! member `i` is re-read, and if the value differs from `targets[i + 1]`
//! the subscriptions `i + 1..` are released before the tail is walked and
//! subscribed again. A change on the last segment only raises
//! `on_last_member_changed`.
//!
//! Walks run on a chain moved out of the cell, since accessors may raise
//! notifications that re-enter the observer. Every replacement of the
//! cached chain bumps a generation; a walk whose generation is stale when it
//! finishes is dropped, so the nested rebuild wins.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use fbind_core::{
    ActionToken, BindingError, MemberInfo, MemberPath, MemberProvider, Metadata, RootRef, Value,
};

use super::base::{ObserverBase, SegmentListener, SegmentSink};
use super::{
    MemberPathLastMember, MemberPathMembers, MemberPathObserver, MemberPathObserverListener,
    ObserverRequest,
};

#[derive(Debug, Clone)]
enum Outcome {
    Resolved,
    Unresolved,
    Error(BindingError),
}

struct Chain {
    root: RootRef,
    /// `targets[0]` is a placeholder; the root is read through `root` so a
    /// weak root stays weak.
    targets: Vec<Value>,
    members: Vec<Rc<dyn MemberInfo>>,
    subs: Vec<Option<ActionToken>>,
    outcome: Outcome,
}

impl Chain {
    fn new(root: RootRef) -> Self {
        Self {
            root,
            targets: vec![Value::Null],
            members: Vec::new(),
            subs: Vec::new(),
            outcome: Outcome::Unresolved,
        }
    }

    fn target(&self, index: usize) -> Option<Value> {
        match index {
            0 => Some(self.root.get()),
            _ => self.targets.get(index).cloned(),
        }
    }

    /// Keep segments `..=index`; returns the released subscriptions so the
    /// caller can drop them outside the borrow.
    fn truncate_after(&mut self, index: usize) -> Vec<Option<ActionToken>> {
        self.targets.truncate(index + 1);
        self.members.truncate(index + 1);
        self.subs.split_off((index + 1).min(self.subs.len()))
    }

    fn members(&self) -> MemberPathMembers {
        match &self.outcome {
            Outcome::Resolved => MemberPathMembers::Resolved {
                targets: (0..self.members.len())
                    .filter_map(|i| self.target(i))
                    .collect(),
                members: Rc::from(self.members.as_slice()),
            },
            Outcome::Unresolved => MemberPathMembers::Unresolved,
            Outcome::Error(e) => MemberPathMembers::Error(e.clone()),
        }
    }

    fn last_member(&self) -> MemberPathLastMember {
        let last = self.members.len().checked_sub(1).and_then(|i| self.target(i));
        match (&self.outcome, self.members.last(), last) {
            (Outcome::Resolved, Some(member), Some(target)) => MemberPathLastMember::Resolved {
                target,
                member: Rc::clone(member),
            },
            (Outcome::Error(e), _, _) => MemberPathLastMember::Error(e.clone()),
            _ => MemberPathLastMember::Unresolved,
        }
    }
}

/// Observer of paths with two or more segments.
pub struct MultiPathObserver {
    base: ObserverBase,
    self_ref: Weak<MultiPathObserver>,
    /// Walked chain; `None` while nothing is subscribed or a walk is running.
    chain: RefCell<Option<Chain>>,
    generation: Cell<u64>,
}

impl MultiPathObserver {
    /// Create an observer for `request`.
    pub fn new(request: ObserverRequest, provider: Rc<dyn MemberProvider>) -> Rc<Self> {
        Rc::new_cyclic(|self_ref| Self {
            base: ObserverBase::new(request, provider),
            self_ref: Weak::clone(self_ref),
            chain: RefCell::new(None),
            generation: Cell::new(0),
        })
    }

    /// Number of live segment subscriptions.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.chain
            .borrow()
            .as_ref()
            .map_or(0, |c| c.subs.iter().filter(|s| s.is_some()).count())
    }

    /// Continue the walk at `chain.targets[start]`.
    fn walk_from(&self, chain: &mut Chain, start: usize, subscribe: bool) -> Outcome {
        let segments = self.base.path.members();
        let len = segments.len();
        if start >= len {
            return Outcome::Unresolved;
        }
        let mut index = start;
        loop {
            let target = chain.target(index).unwrap_or_default();
            if target.is_null() {
                return Outcome::Unresolved;
            }
            let member = match self.base.resolve(&target, &segments[index]) {
                Ok(Some(member)) => member,
                Ok(None) => return Outcome::Unresolved,
                Err(e) => return Outcome::Error(e),
            };
            let sub = if subscribe && self.base.observes_segment(index, len) {
                let sink: Weak<dyn SegmentSink> = self.self_ref.clone();
                self.base
                    .observe(&target, &member, SegmentListener::shared(sink, index))
            } else {
                None
            };
            chain.members.push(Rc::clone(&member));
            chain.subs.push(sub);
            if index + 1 == len {
                return Outcome::Resolved;
            }
            match member.get_value(&target) {
                Ok(value) => chain.targets.push(value),
                Err(e) => return Outcome::Error(e),
            }
            index += 1;
        }
    }

    fn walk(&self, subscribe: bool) -> Chain {
        let _span = tracing::trace_span!("member_path_walk", path = %self.base.path).entered();
        let mut chain = Chain::new(self.base.root_ref());
        chain.outcome = self.walk_from(&mut chain, 0, subscribe);
        chain
    }

    fn bump(&self) -> u64 {
        let next = self.generation.get().wrapping_add(1);
        self.generation.set(next);
        next
    }

    /// Store `chain` unless the cache was replaced since `generation`.
    /// Returns whether it was stored; a rejected chain is dropped here,
    /// outside the borrow.
    fn store(&self, generation: u64, chain: Chain) -> bool {
        if self.generation.get() != generation || !self.base.wants_subscriptions() {
            drop(chain);
            return false;
        }
        let previous = self.chain.borrow_mut().replace(chain);
        drop(previous);
        true
    }

    /// Full walk with subscriptions; replaces the cached chain.
    fn refresh(&self) -> Option<BindingError> {
        self.release();
        let generation = self.generation.get();
        let chain = self.walk(true);
        let error = match &chain.outcome {
            Outcome::Error(e) => Some(e.clone()),
            _ => None,
        };
        self.store(generation, chain);
        error
    }

    /// [`Self::refresh`], reporting a walk error to the listeners.
    fn refresh_reporting(&self) {
        if let Some(e) = self.refresh() {
            if self.base.raise_error(self, &e) {
                self.release();
            }
        }
    }

    fn release(&self) {
        self.bump();
        let released = self.chain.borrow_mut().take();
        drop(released);
    }

    /// Rebuild the tail after segment `index` if its value changed identity.
    /// Returns `None` when nothing changed or a nested rebuild took over.
    fn reresolve(&self, index: usize, sender: &Value) -> Option<Outcome> {
        let (target, member) = {
            let chain = self.chain.borrow();
            let chain = chain.as_ref()?;
            let target = chain.target(index)?;
            if !sender.is_null() && *sender != target {
                return None;
            }
            (target, Rc::clone(chain.members.get(index)?))
        };

        let next = member.get_value(&target);

        let (mut chain, released, generation) = {
            let mut guard = self.chain.borrow_mut();
            let chain = guard.as_mut()?;
            // A nested notification may have rebuilt the chain meanwhile.
            if chain.target(index).as_ref() != Some(&target) {
                return None;
            }
            if let Ok(value) = &next {
                if chain.targets.get(index + 1) == Some(value) {
                    return None;
                }
            }
            let released = chain.truncate_after(index);
            let chain = guard.take()?;
            (chain, released, self.bump())
        };
        drop(released);

        tracing::trace!(path = %self.base.path, segment = index, "member path re-resolved");

        let outcome = match next {
            Ok(value) => {
                chain.targets.push(value);
                self.walk_from(&mut chain, index + 1, true)
            }
            Err(e) => Outcome::Error(e),
        };
        chain.outcome = outcome.clone();
        self.store(generation, chain).then_some(outcome)
    }
}

impl SegmentSink for MultiPathObserver {
    fn on_segment_changed(&self, index: usize, sender: &Value) -> bool {
        if self.base.is_disposed() {
            return false;
        }
        let len = self.base.path.len();
        if index + 1 == len {
            let current = self
                .chain
                .borrow()
                .as_ref()
                .and_then(|c| c.target(index));
            match current {
                Some(target) if sender.is_null() || *sender == target => {
                    if self.base.raise_last_member_changed(self) {
                        self.release();
                    }
                }
                _ => {}
            }
            return true;
        }

        if let Some(outcome) = self.reresolve(index, sender) {
            let mut emptied = self.base.raise_path_members_changed(self);
            if let Outcome::Error(e) = outcome {
                emptied |= self.base.raise_error(self, &e);
            }
            if emptied {
                self.release();
            }
        }
        true
    }
}

impl MemberPathObserver for MultiPathObserver {
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
                    self.refresh_reporting();
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

    fn get_members(&self, _metadata: Option<&Metadata>) -> MemberPathMembers {
        if self.base.is_disposed() {
            return MemberPathMembers::Error(BindingError::Disposed("member path observer"));
        }
        if !self.base.is_alive() {
            self.release();
            return MemberPathMembers::Unresolved;
        }
        if !self.base.wants_subscriptions() {
            return self.walk(false).members();
        }
        if self.chain.borrow().is_none() {
            self.refresh_reporting();
        }
        self.chain
            .borrow()
            .as_ref()
            .map_or(MemberPathMembers::Unresolved, Chain::members)
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
            return self.walk(false).last_member();
        }
        if self.chain.borrow().is_none() {
            self.refresh_reporting();
        }
        self.chain
            .borrow()
            .as_ref()
            .map_or(MemberPathLastMember::Unresolved, Chain::last_member)
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

impl fmt::Debug for MultiPathObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let chain = self.chain.borrow();
        f.debug_struct("MultiPathObserver")
            .field("base", &self.base)
            .field("walked", &chain.as_ref().map(|c| c.members.len()))
            .field("outcome", &chain.as_ref().map(|c| c.outcome.clone()))
            .field("subscriptions", &self.subscription_count())
            .finish()
    }
}
