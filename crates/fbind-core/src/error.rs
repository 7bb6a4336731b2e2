#![forbid(unsafe_code)]

//! Error taxonomy for member resolution and binding updates.
//!
//! Errors are values, not control flow: observers capture them into
//! sentinel states, bindings turn them into listener notifications, and
//! only construction-time failures resurface to callers (through
//! `InvalidBinding`). For that reason [`BindingError`] is `Clone + PartialEq`:
//! a captured error can be handed out again and compared for equality.

use thiserror::Error;

/// Result type alias for binding operations.
pub type BindResult<T> = Result<T, BindingError>;

/// Errors raised while parsing paths, resolving members, or updating values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BindingError {
    /// A member path string is malformed.
    #[error("invalid member path '{path}': {reason}")]
    Format {
        /// The raw path that failed to parse.
        path: String,
        /// What was wrong with it.
        reason: &'static str,
    },

    /// No member with the requested name exists on the type.
    #[error("member '{member}' not found on type '{type_name}'")]
    MemberNotFound {
        /// The type the member was looked up on.
        type_name: String,
        /// The missing member name.
        member: String,
    },

    /// The member exists but cannot be read.
    #[error("member '{member}' is not readable")]
    NotReadable {
        /// Member name.
        member: String,
    },

    /// The member exists but cannot be written.
    #[error("member '{member}' is not writable")]
    NotWritable {
        /// Member name.
        member: String,
    },

    /// The member is not a method.
    #[error("member '{member}' cannot be invoked")]
    NotInvocable {
        /// Member name.
        member: String,
    },

    /// A value could not be converted to the requested type.
    #[error("cannot convert {from} to {to}")]
    Conversion {
        /// Source value type.
        from: &'static str,
        /// Requested value type.
        to: &'static str,
    },

    /// A member accessor failed while reading or writing.
    #[error("member '{member}' access failed: {message}")]
    Access {
        /// Member name.
        member: String,
        /// Accessor-provided failure description.
        message: String,
    },

    /// No registered parser understood the binding expression.
    #[error("unsupported binding expression: {0}")]
    UnsupportedExpression(String),

    /// The object was used after disposal.
    #[error("{0} is disposed")]
    Disposed(&'static str),

    /// Application-defined failure (converters, formatters, interceptors).
    #[error("{0}")]
    Custom(String),
}

impl BindingError {
    /// Create a format error.
    #[inline]
    pub fn format(path: impl Into<String>, reason: &'static str) -> Self {
        Self::Format {
            path: path.into(),
            reason,
        }
    }

    /// Create a member-not-found error.
    #[inline]
    pub fn member_not_found(type_name: impl Into<String>, member: impl Into<String>) -> Self {
        Self::MemberNotFound {
            type_name: type_name.into(),
            member: member.into(),
        }
    }

    /// Create an accessor failure.
    #[inline]
    pub fn access(member: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Access {
            member: member.into(),
            message: message.into(),
        }
    }

    /// Whether this error comes from path syntax rather than a live graph.
    #[must_use]
    pub fn is_format(&self) -> bool {
        matches!(self, Self::Format { .. })
    }
}
