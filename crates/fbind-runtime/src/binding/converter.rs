#![forbid(unsafe_code)]

//! Value conversion between a source value and a member's declared type.
//!
//! Two layers exist:
//!
//! - [`ValueConverter`]: the binding-wide coercion applied when the member
//!   being written declares a [`ValueType`] that does not accept the value.
//! - [`BindingConverter`]: a user converter installed per binding through a
//!   [`ConverterInterceptor`] component; it sees the value before coercion
//!   in both directions.

use std::fmt;
use std::rc::Rc;

use fbind_core::{BindResult, BindingError, Component, Registrar, Value, ValueType};

use super::components::{InterceptResult, SourceValueInterceptor, TargetValueInterceptor};
use super::data::DataBinding;

/// Coerces a value into a declared type.
pub trait ValueConverter {
    /// Convert `value` so that `to.accepts(&result)` holds.
    fn convert(&self, value: Value, to: ValueType) -> BindResult<Value>;
}

impl<F> ValueConverter for F
where
    F: Fn(Value, ValueType) -> BindResult<Value>,
{
    fn convert(&self, value: Value, to: ValueType) -> BindResult<Value> {
        self(value, to)
    }
}

/// Lossless numeric conversion plus parsing and formatting of strings.
///
/// | From \ To | Bool | Int | Float | Str |
/// |-----------|------|-----|-------|-----|
/// | Bool | = | 0/1 | 0.0/1.0 | `"true"` |
/// | Int | != 0 | = | widen | decimal |
/// | Float | != 0.0 | integral, in range | = | shortest |
/// | Str | parse | parse | parse | = |
///
/// Objects never convert.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultValueConverter;

fn conversion_error(value: &Value, to: ValueType) -> BindingError {
    BindingError::Conversion {
        from: value.type_label(),
        to: to.label(),
    }
}

fn float_to_int(v: f64) -> Option<i64> {
    // 2^63 is exactly representable; the range is half-open.
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    (v.fract() == 0.0 && v >= -LIMIT && v < LIMIT).then(|| v as i64)
}

impl ValueConverter for DefaultValueConverter {
    fn convert(&self, value: Value, to: ValueType) -> BindResult<Value> {
        if to.accepts(&value) {
            return Ok(value);
        }
        let converted = match (&value, to) {
            (Value::Bool(b), ValueType::Int) => Some(Value::Int(i64::from(*b))),
            (Value::Bool(b), ValueType::Float) => Some(Value::Float(if *b { 1.0 } else { 0.0 })),
            (Value::Bool(b), ValueType::Str) => Some(Value::from(b.to_string())),
            (Value::Int(i), ValueType::Bool) => Some(Value::Bool(*i != 0)),
            #[allow(clippy::cast_precision_loss)]
            (Value::Int(i), ValueType::Float) => Some(Value::Float(*i as f64)),
            (Value::Int(i), ValueType::Str) => Some(Value::from(i.to_string())),
            (Value::Float(f), ValueType::Bool) => Some(Value::Bool(*f != 0.0)),
            (Value::Float(f), ValueType::Int) => float_to_int(*f).map(Value::Int),
            (Value::Float(f), ValueType::Str) => Some(Value::from(f.to_string())),
            (Value::Str(s), ValueType::Bool) => s.trim().parse::<bool>().ok().map(Value::Bool),
            (Value::Str(s), ValueType::Int) => s.trim().parse::<i64>().ok().map(Value::Int),
            (Value::Str(s), ValueType::Float) => s.trim().parse::<f64>().ok().map(Value::Float),
            _ => None,
        };
        converted.ok_or_else(|| conversion_error(&value, to))
    }
}

/// Per-binding converter with an optional parameter.
pub trait BindingConverter {
    /// Source to target.
    fn convert(&self, value: Value, parameter: &Value) -> BindResult<Value>;

    /// Target to source. Defaults to the identity.
    fn convert_back(&self, value: Value, _parameter: &Value) -> BindResult<Value> {
        Ok(value)
    }
}

/// Component running a [`BindingConverter`] in both update directions.
pub struct ConverterInterceptor {
    converter: Rc<dyn BindingConverter>,
    parameter: Value,
}

impl ConverterInterceptor {
    /// Wrap `converter`; `parameter` is passed to every call.
    #[must_use]
    pub fn new(converter: Rc<dyn BindingConverter>, parameter: Value) -> Rc<Self> {
        Rc::new(Self {
            converter,
            parameter,
        })
    }
}

impl TargetValueInterceptor for ConverterInterceptor {
    fn intercept_target_value(&self, _binding: &DataBinding, value: Value) -> BindResult<InterceptResult> {
        self.converter
            .convert(value, &self.parameter)
            .map(InterceptResult::Value)
    }
}

impl SourceValueInterceptor for ConverterInterceptor {
    fn intercept_source_value(&self, _binding: &DataBinding, value: Value) -> BindResult<InterceptResult> {
        self.converter
            .convert_back(value, &self.parameter)
            .map(InterceptResult::Value)
    }
}

impl Component<DataBinding> for ConverterInterceptor {
    fn register(self: Rc<Self>, registrar: &mut Registrar) {
        registrar.provide::<dyn TargetValueInterceptor>(Rc::clone(&self) as Rc<dyn TargetValueInterceptor>);
        registrar.provide::<dyn SourceValueInterceptor>(self);
    }
}

impl fmt::Debug for ConverterInterceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterInterceptor")
            .field("parameter", &self.parameter)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn convert(value: impl Into<Value>, to: ValueType) -> BindResult<Value> {
        DefaultValueConverter.convert(value.into(), to)
    }

    #[test]
    fn accepted_values_pass_through() {
        assert_eq!(convert(3, ValueType::Int).unwrap(), Value::Int(3));
        assert_eq!(convert("x", ValueType::Any).unwrap(), Value::from("x"));
        assert_eq!(convert(Value::Null, ValueType::Int).unwrap(), Value::Null);
    }

    #[test]
    fn numbers_and_strings() {
        assert_eq!(convert(3, ValueType::Float).unwrap(), Value::Float(3.0));
        assert_eq!(convert(3.0, ValueType::Int).unwrap(), Value::Int(3));
        assert_eq!(convert(42, ValueType::Str).unwrap(), Value::from("42"));
        assert_eq!(convert(" 7 ", ValueType::Int).unwrap(), Value::Int(7));
        assert_eq!(convert("true", ValueType::Bool).unwrap(), Value::Bool(true));
        assert_eq!(convert(true, ValueType::Int).unwrap(), Value::Int(1));
        assert_eq!(convert(0, ValueType::Bool).unwrap(), Value::Bool(false));
    }

    #[test]
    fn lossy_conversions_fail() {
        let err = convert(2.5, ValueType::Int).unwrap_err();
        assert_eq!(
            err,
            BindingError::Conversion {
                from: "float",
                to: "int"
            }
        );
        assert!(convert(1e300, ValueType::Int).is_err());
        assert!(convert("abc", ValueType::Float).is_err());
        assert!(convert(1, ValueType::Object).is_err());
    }

    #[test]
    fn closures_are_converters() {
        let upper = |value: Value, _to: ValueType| -> BindResult<Value> {
            Ok(Value::from(value.as_str().unwrap_or_default().to_uppercase()))
        };
        assert_eq!(upper.convert(Value::from("ab"), ValueType::Str).unwrap(), Value::from("AB"));
    }
}
