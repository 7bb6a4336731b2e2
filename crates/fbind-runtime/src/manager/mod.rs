#![forbid(unsafe_code)]

//! Binding manager: expressions in, registered live bindings out.
//!
//! # Architecture
//!
//! The manager is a host for components; every step is pluggable:
//!
//! ```text
//! expression ──► BindingExpressionParser ──► BindingBuilder(s)
//!                                                │ build + attach
//!                                                ▼
//!                                             Binding ──► on_lifecycle_changed(Initialized)
//!                                                              │
//!                                      BindingLifecycleListener ─► BindingHolder(s)
//! ```
//!
//! Bindings built here carry a relay component that reports their disposal
//! back through [`BindingManager::on_lifecycle_changed`], so holders drop
//! disposed bindings without the caller doing anything.
//!
//! # Defaults
//!
//! [`BindingManager::new`] installs [`BuilderParser`],
//! [`TextExpressionParser`], a [`WeakTargetBindingHolder`], and the
//! [`HolderLifecycleListener`]. [`BindingManager::empty`] installs nothing.

mod builder;
mod holder;
mod lifecycle;
mod parser;

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use fbind_core::{
    BindResult, BindingError, ComponentCollection, MemberPath, MemberPathCache, MemberProvider,
    Metadata, ThreadDispatcher, Value,
};

use crate::binding::Binding;
use crate::config::BindingConfig;

pub use builder::{BindingBuilder, SourceSpec};
pub use holder::{BindingHolder, HolderLifecycleListener, WeakTargetBindingHolder};
pub use lifecycle::{BindingLifecycleListener, BindingLifecycleState, ManagerLifecycleRelay};
pub use parser::{BindingExpressionParser, BuilderParser, TextExpressionParser};

/// Entry point for creating and looking up bindings.
pub struct BindingManager {
    self_ref: Weak<BindingManager>,
    provider: Rc<dyn MemberProvider>,
    config: BindingConfig,
    dispatcher: RefCell<Option<Rc<dyn ThreadDispatcher>>>,
    paths: MemberPathCache,
    components: ComponentCollection<BindingManager>,
}

impl BindingManager {
    /// Manager with the default configuration and components.
    #[must_use]
    pub fn new(provider: Rc<dyn MemberProvider>) -> Rc<Self> {
        Self::with_config(provider, BindingConfig::default())
    }

    /// Manager with `config` and the default components.
    #[must_use]
    pub fn with_config(provider: Rc<dyn MemberProvider>, config: BindingConfig) -> Rc<Self> {
        let replace_existing = config.replace_existing;
        let manager = Self::empty(provider, config);
        manager.components.add(&manager, Rc::new(BuilderParser));
        manager.components.add(&manager, Rc::new(TextExpressionParser));
        manager
            .components
            .add(&manager, WeakTargetBindingHolder::new(replace_existing));
        manager.components.add(&manager, Rc::new(HolderLifecycleListener));
        manager
    }

    /// Manager without any component.
    #[must_use]
    pub fn empty(provider: Rc<dyn MemberProvider>, config: BindingConfig) -> Rc<Self> {
        Rc::new_cyclic(|self_ref| Self {
            self_ref: Weak::clone(self_ref),
            provider,
            config,
            dispatcher: RefCell::new(None),
            paths: MemberPathCache::new(),
            components: ComponentCollection::new(),
        })
    }

    /// Member resolution used by every observer this manager creates.
    #[must_use]
    pub fn provider(&self) -> Rc<dyn MemberProvider> {
        Rc::clone(&self.provider)
    }

    /// Defaults for builders.
    #[must_use]
    pub fn config(&self) -> &BindingConfig {
        &self.config
    }

    /// Hosted components (parsers, holders, lifecycle listeners).
    #[must_use]
    pub fn components(&self) -> &ComponentCollection<BindingManager> {
        &self.components
    }

    /// Dispatcher used by bindings with a non-`Current` execution mode.
    pub fn set_dispatcher(&self, dispatcher: Option<Rc<dyn ThreadDispatcher>>) {
        *self.dispatcher.borrow_mut() = dispatcher;
    }

    /// Configured dispatcher.
    #[must_use]
    pub fn dispatcher(&self) -> Option<Rc<dyn ThreadDispatcher>> {
        self.dispatcher.borrow().clone()
    }

    pub(crate) fn weak(&self) -> Weak<BindingManager> {
        Weak::clone(&self.self_ref)
    }

    pub(crate) fn parse_path(&self, raw: &str) -> BindResult<MemberPath> {
        self.paths.get_or_parse(raw)
    }

    /// Ask the parser components to turn `expression` into builders.
    ///
    /// Fails with [`BindingError::UnsupportedExpression`] when no parser
    /// understands it.
    pub fn try_parse_binding_expression(
        &self,
        expression: &dyn Any,
        metadata: Option<&Metadata>,
    ) -> BindResult<Vec<BindingBuilder>> {
        for parser in self.components.get::<dyn BindingExpressionParser>().iter() {
            if let Some(result) = parser.try_parse(expression, metadata) {
                return result;
            }
        }
        Err(BindingError::UnsupportedExpression(
            "no parser understood the expression".to_owned(),
        ))
    }

    /// Build `builder` over `target` and `source`, attach it, and report it
    /// as initialized. Build errors come back as an
    /// [`InvalidBinding`](crate::binding::InvalidBinding).
    pub fn build(
        &self,
        builder: &BindingBuilder,
        target: &Value,
        source: &Value,
        metadata: Option<&Metadata>,
    ) -> Rc<dyn Binding> {
        let binding = builder.create(self, target, source);
        binding.attach();
        self.on_lifecycle_changed(&binding, BindingLifecycleState::Initialized, None, metadata);
        binding
    }

    /// Parse `expression` and build every resulting binding.
    pub fn bind(
        &self,
        expression: &dyn Any,
        target: &Value,
        source: &Value,
        metadata: Option<&Metadata>,
    ) -> BindResult<Vec<Rc<dyn Binding>>> {
        let builders = self.try_parse_binding_expression(expression, metadata)?;
        Ok(builders
            .iter()
            .map(|builder| self.build(builder, target, source, metadata))
            .collect())
    }

    /// Bindings registered for `target`, optionally only on `path`, merged
    /// across holders.
    #[must_use]
    pub fn get_bindings(
        &self,
        target: &Value,
        path: Option<&str>,
        metadata: Option<&Metadata>,
    ) -> Vec<Rc<dyn Binding>> {
        let mut found: Vec<Rc<dyn Binding>> = Vec::new();
        for holder in self.components.get::<dyn BindingHolder>().iter() {
            for binding in holder.try_get_bindings(target, path, metadata) {
                if !found
                    .iter()
                    .any(|b| std::ptr::addr_eq(Rc::as_ptr(b), Rc::as_ptr(&binding)))
                {
                    found.push(binding);
                }
            }
        }
        found
    }

    /// Report a lifecycle event to every lifecycle listener component.
    pub fn on_lifecycle_changed(
        &self,
        binding: &Rc<dyn Binding>,
        state: BindingLifecycleState,
        extra: Option<&Value>,
        metadata: Option<&Metadata>,
    ) {
        tracing::debug!(path = binding.target_path(), ?state, "binding lifecycle changed");
        for listener in self.components.get::<dyn BindingLifecycleListener>().iter() {
            listener.on_lifecycle_changed(self, binding, state, extra, metadata);
        }
    }
}

impl fmt::Debug for BindingManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingManager")
            .field("config", &self.config)
            .field("components", &self.components.len())
            .field("cached_paths", &self.paths.len())
            .field("has_dispatcher", &self.dispatcher.borrow().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests;
