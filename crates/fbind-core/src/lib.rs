#![forbid(unsafe_code)]

//! Core model for FrankenBind member-path bindings.
//!
//! This crate provides the pieces the binding runtime walks over:
//!
//! - [`Value`] / [`Object`]: dynamically typed values with identity-based
//!   object equality.
//! - [`MemberPath`]: parsed, immutable dotted paths (`Owner.Items[0].Name`).
//! - [`MemberInfo`] / [`MemberProvider`]: resolved member accessors and the
//!   provider seam that finds them per `(type, name)`.
//! - [`EventListener`] / [`EventListenerCollection`] / [`ActionToken`]: weak
//!   change notifications with RAII unsubscription.
//! - [`ComponentCollection`]: typed, priority-ordered plug-in registry with
//!   cached per-interface snapshots.
//! - [`ThreadDispatcher`]: the contract for running updates on an execution
//!   context.
//!
//! # Architecture
//!
//! Everything here is `Rc`-based and confined to one thread, like the rest
//! of the binding engine. Thread hops happen only through a
//! [`ThreadDispatcher`].

pub mod component;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod member;
pub mod metadata;
pub mod object;
pub mod path;
pub mod provider;
pub mod value;

pub use component::{Component, ComponentCollection, Registrar};
pub use dispatch::{ExecutionMode, InlineDispatcher, QueueDispatcher, ThreadDispatcher};
pub use error::{BindResult, BindingError};
pub use event::{
    ActionToken, EventListener, EventListenerCollection, FnEventListener, Message,
    WeakEventListener,
};
pub use member::{
    AccessorMember, EventMember, MemberFlags, MemberInfo, MemberKind, MemberKinds, MethodMember,
    SelfMember,
};
pub use metadata::Metadata;
pub use object::{ObservableList, PropertyBag};
pub use path::{MemberPath, MemberPathCache, PathKind};
pub use provider::{MemberProvider, MemberRegistry};
pub use value::{AsAny, Object, RootRef, TypeKey, Value, ValueType};
