#![forbid(unsafe_code)]

//! Bindings: keep a target member in sync with one or more sources.
//!
//! - [`DataBinding`]: the live binding. Owns its target observer and source
//!   observers, hosts components (modes, converters, listeners, dispatch).
//! - [`InvalidBinding`]: a binding that failed to build. Every update call
//!   returns the captured construction error.
//!
//! # Lifecycle
//!
//! ```text
//! Created ─► Attaching ─► Attached ⇄ Suspended
//!                            │
//!                            ▼
//!                        Detaching ─► Detached ─► Disposed
//! ```
//!
//! `Suspended` is entered for the duration of an update started while
//! attached; observer notifications caused by the update's own write are
//! ignored there. `Detached` can be reached from any state.
//!
//! # Invariants
//!
//! 1. A `Detached` or `Disposed` binding never reads or writes.
//! 2. Only an `Attached` binding reacts to observer notifications.
//! 3. At most one update direction is in flight per binding.
//! 4. Update failures never escape `DataBinding::update_target` /
//!    `update_source`; they reach `TargetListener` / `SourceListener`.

pub mod components;
pub mod converter;
pub mod data;
pub mod dispatch;
pub mod invalid;
pub mod mode;

use std::fmt;
use std::rc::Rc;

use fbind_core::BindResult;

use crate::observer::MemberPathObserver;

pub use components::{
    BindingObserverListener, BindingStateListener, InterceptResult, SourceListener,
    SourceValueInterceptor, TargetListener, TargetValueInterceptor, UpdateDispatch,
    ValueFormatter,
};
pub use converter::{BindingConverter, ConverterInterceptor, DefaultValueConverter, ValueConverter};
pub use data::{BindingSource, DataBinding, SourceParameter};
pub use dispatch::DispatchComponent;
pub use invalid::InvalidBinding;
pub use mode::{BindingMode, ModeComponent};

/// Lifecycle state of a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingState {
    /// Built, not yet attached.
    Created,
    /// Subscribing to observers.
    Attaching,
    /// Live: reacts to observer notifications.
    Attached,
    /// Attached, but inside an update; notifications are ignored.
    Suspended,
    /// Releasing observer listeners.
    Detaching,
    /// No longer propagates. Terminal except for disposal.
    Detached,
    /// Released for good.
    Disposed,
}

impl BindingState {
    /// Whether explicit update calls are honoured.
    #[must_use]
    pub fn accepts_updates(self) -> bool {
        !matches!(self, Self::Detaching | Self::Detached | Self::Disposed)
    }

    /// Whether observer notifications trigger reactions.
    #[must_use]
    pub fn reacts_to_changes(self) -> bool {
        self == Self::Attached
    }

    /// Whether the binding has been detached or disposed.
    #[must_use]
    pub fn is_finished(self) -> bool {
        matches!(self, Self::Detached | Self::Disposed)
    }
}

impl fmt::Display for BindingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Attaching => "attaching",
            Self::Attached => "attached",
            Self::Suspended => "suspended",
            Self::Detaching => "detaching",
            Self::Detached => "detached",
            Self::Disposed => "disposed",
        };
        f.write_str(name)
    }
}

/// Which observer of a binding reported something.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObserverRole {
    /// The target observer.
    Target,
    /// A source observer.
    Source,
}

/// A binding between a target member path and its sources.
pub trait Binding {
    /// Current lifecycle state.
    fn state(&self) -> BindingState;

    /// Observer of the target path.
    fn target(&self) -> &Rc<dyn MemberPathObserver>;

    /// Target path as written by the caller; holders index by it.
    fn target_path(&self) -> &str {
        self.target().path().path()
    }

    /// Push the source value to the target.
    ///
    /// Live bindings always return `Ok`; failures are reported to
    /// listeners. An [`InvalidBinding`] returns its construction error.
    fn update_target(&self) -> BindResult<()>;

    /// Push the target value back to the source.
    fn update_source(&self) -> BindResult<()>;

    /// Start reacting to observer notifications.
    fn attach(&self);

    /// Stop reacting to observer notifications.
    fn detach(&self);

    /// Detach and release every observer and component. Idempotent.
    fn dispose(&self);
}

impl fmt::Debug for dyn Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("target", &self.target_path())
            .field("state", &self.state())
            .finish()
    }
}
