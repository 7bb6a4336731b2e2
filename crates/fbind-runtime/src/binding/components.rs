#![forbid(unsafe_code)]

//! Capability interfaces a binding looks up in its component collection.
//!
//! Every method has an empty default so a component implements only the
//! hooks it cares about.

use fbind_core::{BindResult, BindingError, Value};

use super::{BindingState, ObserverRole};
use crate::binding::data::DataBinding;

/// Result of a value interceptor.
#[derive(Debug, Clone, PartialEq)]
pub enum InterceptResult {
    /// Continue with this value.
    Value(Value),
    /// Abandon the update; reported as canceled.
    Cancel,
}

/// Transforms the value on its way from the source to the target.
pub trait TargetValueInterceptor {
    /// Intercept `value` before it is written to the target.
    fn intercept_target_value(&self, binding: &DataBinding, value: Value) -> BindResult<InterceptResult>;
}

/// Transforms the value on its way from the target back to the source.
pub trait SourceValueInterceptor {
    /// Intercept `value` before it is written to the source.
    fn intercept_source_value(&self, binding: &DataBinding, value: Value) -> BindResult<InterceptResult>;
}

/// Outcome notifications of `update_target`.
pub trait TargetListener {
    /// The target was written with `value`.
    fn on_target_updated(&self, _binding: &DataBinding, _value: &Value) {}

    /// Reading, converting, or writing failed.
    fn on_target_update_failed(&self, _binding: &DataBinding, _error: &BindingError) {}

    /// The update was abandoned because something was unresolved or an
    /// interceptor canceled it.
    fn on_target_update_canceled(&self, _binding: &DataBinding) {}
}

/// Outcome notifications of `update_source`.
pub trait SourceListener {
    /// The source was written with `value`.
    fn on_source_updated(&self, _binding: &DataBinding, _value: &Value) {}

    /// Reading, converting, or writing failed.
    fn on_source_update_failed(&self, _binding: &DataBinding, _error: &BindingError) {}

    /// The update was abandoned.
    fn on_source_update_canceled(&self, _binding: &DataBinding) {}
}

/// Reacts to changes reported by the binding's observers while attached.
pub trait BindingObserverListener {
    /// A source observer reported a change.
    fn on_source_changed(&self, _binding: &DataBinding) {}

    /// The target observer reported a change.
    fn on_target_changed(&self, _binding: &DataBinding) {}

    /// An observer failed to resolve its path.
    fn on_observer_error(&self, _binding: &DataBinding, _role: ObserverRole, _error: &BindingError) {}
}

/// Lifecycle transitions of a binding.
pub trait BindingStateListener {
    /// The binding moved from `old` to `new`.
    fn on_state_changed(&self, binding: &DataBinding, old: BindingState, new: BindingState);
}

/// Decides where change reactions run. Only the first provider is used.
pub trait UpdateDispatch {
    /// Run `handler` now or later.
    fn dispatch(&self, binding: &DataBinding, handler: Box<dyn FnOnce()>);
}

/// Aggregates the values of a multi-source binding, in source order.
pub trait ValueFormatter {
    /// Combine `values` into the value written to the target.
    fn format(&self, values: &[Value]) -> BindResult<Value>;
}

impl<F> ValueFormatter for F
where
    F: Fn(&[Value]) -> BindResult<Value>,
{
    fn format(&self, values: &[Value]) -> BindResult<Value> {
        self(values)
    }
}
