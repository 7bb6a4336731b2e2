#![forbid(unsafe_code)]

//! Lifetime management for groups of bindings.

use std::rc::Rc;

use crate::binding::Binding;

/// Collects bindings for a logical owner (e.g., a view).
///
/// When the scope is dropped, every held binding is disposed, cleanly
/// disconnecting the owner from its sources.
///
/// # Usage
///
/// ```
/// use std::rc::Rc;
///
/// use fbind_core::{MemberRegistry, PropertyBag, Value};
/// use fbind_runtime::{BindingManager, BindingScope};
///
/// let manager = BindingManager::new(Rc::new(MemberRegistry::new()));
/// let model = PropertyBag::from_pairs([("Name", "Ann")]);
/// let view = PropertyBag::new();
/// {
///     let mut scope = BindingScope::new();
///     for binding in manager.bind(&"Text = Name", &view.to_value(), &model.to_value(), None)? {
///         scope.hold(binding);
///     }
///     assert_eq!(view.get("Text"), Some(Value::from("Ann")));
/// }
/// // The scope dropped, so the binding no longer propagates.
/// model.set("Name", "Bea");
/// assert_eq!(view.get("Text"), Some(Value::from("Ann")));
/// # Ok::<(), fbind_core::BindingError>(())
/// ```
///
/// # Invariants
///
/// 1. Bindings are disposed in reverse registration order.
/// 2. After drop, no binding of this scope propagates.
/// 3. `clear()` disposes immediately and leaves the scope reusable.
pub struct BindingScope {
    bindings: Vec<Rc<dyn Binding>>,
}

impl BindingScope {
    /// Create an empty binding scope.
    #[must_use]
    pub fn new() -> Self {
        Self {
            bindings: Vec::new(),
        }
    }

    /// Add a binding to this scope; it stays alive until the scope is
    /// cleared or dropped.
    pub fn hold(&mut self, binding: Rc<dyn Binding>) -> &mut Self {
        self.bindings.push(binding);
        self
    }

    /// Bindings held by this scope, in registration order.
    #[must_use]
    pub fn bindings(&self) -> &[Rc<dyn Binding>] {
        &self.bindings
    }

    /// Number of held bindings.
    #[must_use]
    pub fn binding_count(&self) -> usize {
        self.bindings.len()
    }

    /// Whether the scope holds no bindings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Dispose every binding now (scope becomes empty but reusable).
    pub fn clear(&mut self) {
        while let Some(binding) = self.bindings.pop() {
            binding.dispose();
        }
    }
}

impl Default for BindingScope {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for BindingScope {
    fn drop(&mut self) {
        self.clear();
    }
}

impl std::fmt::Debug for BindingScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindingScope")
            .field("binding_count", &self.bindings.len())
            .finish()
    }
}
