#![forbid(unsafe_code)]

//! Live views of member paths over an object graph.
//!
//! A [`MemberPathObserver`] walks a [`MemberPath`] from a root value, keeps
//! one subscription per walked segment, and tells its listeners when the
//! resolved chain or the last member changes.
//!
//! | Variant | Path | Subscriptions |
//! |---------|------|---------------|
//! | [`EmptyPathObserver`] | `""` | none, or the trigger event on the root |
//! | [`SinglePathObserver`] | `A` | one, on the root |
//! | [`MultiPathObserver`] | `A.B.C` | one per walked segment |
//!
//! Each variant has a method-triggered form ([`ObserverRequest::trigger`]):
//! instead of per-member change notifications it re-walks when a named
//! event member of the walked objects fires.
//!
//! # Invariants
//!
//! 1. The subscription set always matches the last walked chain: stale
//!    subscriptions are released before new ones are made.
//! 2. `get_members` / `get_last_member` never fail; errors come back as
//!    sentinels and are delivered to listeners through `on_error`.
//! 3. Listeners are held weakly. Adding the same listener twice is a no-op.
//! 4. `dispose` is idempotent and releases every subscription.
//!
//! # Failure Modes
//!
//! | Situation | Result |
//! |-----------|--------|
//! | Null root or null intermediate | `Unresolved`, no error |
//! | Weak root dropped | `Unresolved` |
//! | Missing member | `Error(MemberNotFound)`, or `Unresolved` with `OPTIONAL` |
//! | Getter fails mid-walk | `Error(..)` carrying the accessor error |
//! | Used after `dispose` | `Error(Disposed)` |

mod base;
mod empty;
mod multi;
mod single;

use std::fmt;
use std::rc::Rc;

use bitflags::bitflags;
use fbind_core::{
    BindResult, BindingError, MemberInfo, MemberPath, MemberProvider, Metadata, PathKind, RootRef,
    Value,
};

pub use empty::EmptyPathObserver;
pub use multi::MultiPathObserver;
pub use single::SinglePathObserver;

bitflags! {
    /// Behaviour switches for a path observer.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ObserverFlags: u8 {
        /// Subscribe to intermediate segments.
        const OBSERVABLE = 1 << 0;
        /// Subscribe to the last member as well.
        const OBSERVE_LAST = 1 << 1;
        /// A missing member reads as unresolved instead of an error.
        const OPTIONAL = 1 << 2;
        /// Hold the root weakly.
        const WEAK_TARGET = 1 << 3;
    }
}

impl Default for ObserverFlags {
    fn default() -> Self {
        Self::OBSERVABLE | Self::OBSERVE_LAST
    }
}

/// Receiver of observer notifications.
///
/// Observers hold listeners weakly; keep the `Rc` alive for as long as the
/// notifications matter.
pub trait MemberPathObserverListener {
    /// Whether the listener still wants notifications.
    fn is_alive(&self) -> bool {
        true
    }

    /// An intermediate object of the path changed identity.
    fn on_path_members_changed(&self, _observer: &dyn MemberPathObserver) {}

    /// The value behind the last member changed.
    fn on_last_member_changed(&self, _observer: &dyn MemberPathObserver) {}

    /// A walk failed.
    fn on_error(&self, _observer: &dyn MemberPathObserver, _error: &BindingError) {}
}

/// The resolved chain of a path.
#[derive(Clone)]
pub enum MemberPathMembers {
    /// Every segment resolved. `targets[k]` is the object `members[k]` is
    /// applied to; `targets[0]` is the root.
    Resolved {
        /// Object each member reads from.
        targets: Rc<[Value]>,
        /// Resolved member per segment.
        members: Rc<[Rc<dyn MemberInfo>]>,
    },
    /// A null root or intermediate value stopped the walk.
    Unresolved,
    /// The walk failed.
    Error(BindingError),
}

impl MemberPathMembers {
    /// Whether every segment resolved.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved { .. })
    }

    /// Captured error, if any.
    #[must_use]
    pub fn error(&self) -> Option<&BindingError> {
        match self {
            Self::Error(e) => Some(e),
            _ => None,
        }
    }

    /// Number of resolved members; zero unless resolved.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Resolved { members, .. } => members.len(),
            _ => 0,
        }
    }

    /// Whether no member resolved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for MemberPathMembers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resolved { targets, members } => f
                .debug_struct("Resolved")
                .field("targets", targets)
                .field(
                    "members",
                    &members.iter().map(|m| m.name().to_owned()).collect::<Vec<_>>(),
                )
                .finish(),
            Self::Unresolved => f.write_str("Unresolved"),
            Self::Error(e) => f.debug_tuple("Error").field(e).finish(),
        }
    }
}

/// The final segment of a path: the object and the member a binding reads
/// and writes.
#[derive(Clone)]
pub enum MemberPathLastMember {
    /// The last member resolved on `target`.
    Resolved {
        /// Object the member belongs to.
        target: Value,
        /// The member.
        member: Rc<dyn MemberInfo>,
    },
    /// An earlier segment was null.
    Unresolved,
    /// The walk failed.
    Error(BindingError),
}

impl MemberPathLastMember {
    /// Whether the last member resolved.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved { .. })
    }

    /// Captured error, if any.
    #[must_use]
    pub fn error(&self) -> Option<&BindingError> {
        match self {
            Self::Error(e) => Some(e),
            _ => None,
        }
    }

    /// Resolved member, if any.
    #[must_use]
    pub fn member(&self) -> Option<&Rc<dyn MemberInfo>> {
        match self {
            Self::Resolved { member, .. } => Some(member),
            _ => None,
        }
    }

    /// Read the current value. `Ok(None)` means unresolved.
    pub fn get_value(&self) -> BindResult<Option<Value>> {
        match self {
            Self::Resolved { target, member } => member.get_value(target).map(Some),
            Self::Unresolved => Ok(None),
            Self::Error(e) => Err(e.clone()),
        }
    }

    /// Write `value`. `Ok(false)` means unresolved, nothing was written.
    pub fn try_set_value(&self, value: Value) -> BindResult<bool> {
        match self {
            Self::Resolved { target, member } => member.set_value(target, value).map(|()| true),
            Self::Unresolved => Ok(false),
            Self::Error(e) => Err(e.clone()),
        }
    }
}

impl fmt::Debug for MemberPathLastMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resolved { target, member } => f
                .debug_struct("Resolved")
                .field("target", target)
                .field("member", &member.name())
                .finish(),
            Self::Unresolved => f.write_str("Unresolved"),
            Self::Error(e) => f.debug_tuple("Error").field(e).finish(),
        }
    }
}

/// Live view of a member path over a root object.
pub trait MemberPathObserver {
    /// The observed path.
    fn path(&self) -> &MemberPath;

    /// Current root; null once a weak root is gone.
    fn target(&self) -> Value;

    /// Whether the root is still reachable.
    fn is_alive(&self) -> bool;

    /// Register `listener`. Returns `false` if it was already registered.
    fn add_listener(&self, listener: &Rc<dyn MemberPathObserverListener>) -> bool;

    /// Unregister `listener`. Returns `false` if it was not registered.
    fn remove_listener(&self, listener: &Rc<dyn MemberPathObserverListener>) -> bool;

    /// Snapshot of the live listeners.
    fn get_listeners(&self) -> Vec<Rc<dyn MemberPathObserverListener>>;

    /// The resolved chain.
    fn get_members(&self, metadata: Option<&Metadata>) -> MemberPathMembers;

    /// The resolved last member.
    fn get_last_member(&self, metadata: Option<&Metadata>) -> MemberPathLastMember;

    /// Release every subscription without detaching listeners. Used by
    /// one-time bindings that stop listening after the first update.
    fn unsubscribe(&self);

    /// Release subscriptions and listeners. Idempotent.
    fn dispose(&self);

    /// Whether `dispose` has run.
    fn is_disposed(&self) -> bool;
}

impl fmt::Debug for dyn MemberPathObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemberPathObserver")
            .field("path", &self.path().path())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Everything needed to build an observer.
#[derive(Clone)]
pub struct ObserverRequest {
    /// Root object.
    pub target: Value,
    /// Path to observe.
    pub path: MemberPath,
    /// Behaviour switches.
    pub flags: ObserverFlags,
    /// Event member that triggers re-walks instead of per-member
    /// notifications.
    pub trigger: Option<Rc<str>>,
}

impl ObserverRequest {
    /// Request with default flags.
    #[must_use]
    pub fn new(target: Value, path: MemberPath) -> Self {
        Self {
            target,
            path,
            flags: ObserverFlags::default(),
            trigger: None,
        }
    }

    /// Replace the flags.
    #[must_use]
    pub fn flags(mut self, flags: ObserverFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Re-walk when the event member `name` fires.
    #[must_use]
    pub fn trigger(mut self, name: &str) -> Self {
        self.trigger = Some(Rc::from(name));
        self
    }

    pub(crate) fn root(&self) -> RootRef {
        if self.flags.contains(ObserverFlags::WEAK_TARGET) {
            RootRef::weak(&self.target)
        } else {
            RootRef::strong(self.target.clone())
        }
    }
}

impl fmt::Debug for ObserverRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverRequest")
            .field("target", &self.target)
            .field("path", &self.path.path())
            .field("flags", &self.flags)
            .field("trigger", &self.trigger)
            .finish()
    }
}

/// Build the observer variant that fits the path.
pub fn create_observer(
    request: ObserverRequest,
    provider: Rc<dyn MemberProvider>,
) -> Rc<dyn MemberPathObserver> {
    match request.path.kind() {
        PathKind::Empty => EmptyPathObserver::new(request, provider),
        PathKind::Single => SinglePathObserver::new(request, provider),
        PathKind::Multi => MultiPathObserver::new(request, provider),
    }
}
