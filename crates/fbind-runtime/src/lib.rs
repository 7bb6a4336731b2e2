#![forbid(unsafe_code)]

//! Runtime of FrankenBind: path observers, bindings, and the binding
//! manager.
//!
//! # Architecture
//!
//! ```text
//! BindingManager ── parsers ──► BindingBuilder ──► DataBinding
//!       │                                           │      │
//!    holders ◄── lifecycle ◄── relay component ─────┘      │
//!                                                  target / source
//!                                               MemberPathObserver(s)
//!                                                          │
//!                                              fbind_core members & events
//! ```
//!
//! - [`observer`]: live views of member paths with incremental
//!   re-subscription.
//! - [`binding`]: the binding state machine, update pipeline, and its
//!   components (modes, converters, dispatch).
//! - [`manager`]: expression parsing, holders, lifecycle fan-out.
//! - [`scope`]: disposal of binding groups.
//! - [`config`]: defaults for manager-built bindings.

pub mod binding;
pub mod config;
pub mod manager;
pub mod observer;
pub mod scope;

pub use binding::{
    Binding, BindingMode, BindingSource, BindingState, DataBinding, InvalidBinding,
    SourceParameter,
};
pub use config::BindingConfig;
pub use manager::{BindingBuilder, BindingLifecycleState, BindingManager};
pub use observer::{
    create_observer, MemberPathLastMember, MemberPathMembers, MemberPathObserver,
    MemberPathObserverListener, ObserverFlags, ObserverRequest,
};
pub use scope::BindingScope;
