#![forbid(unsafe_code)]

//! Binding expression parsers.
//!
//! The manager does not understand any syntax itself; it asks each
//! [`BindingExpressionParser`] component in priority order and takes the
//! first answer.

use std::any::Any;
use std::rc::Rc;

use fbind_core::{BindResult, BindingError, Component, Metadata, Registrar, Value};

use super::builder::BindingBuilder;
use super::BindingManager;
use crate::binding::BindingMode;
use crate::config::parse_execution_mode;

/// Manager component turning an expression into builders.
pub trait BindingExpressionParser {
    /// `None` when the expression is not understood by this parser.
    fn try_parse(
        &self,
        expression: &dyn Any,
        metadata: Option<&Metadata>,
    ) -> Option<BindResult<Vec<BindingBuilder>>>;
}

/// Accepts ready-made [`BindingBuilder`]s.
#[derive(Debug, Default)]
pub struct BuilderParser;

impl BindingExpressionParser for BuilderParser {
    fn try_parse(
        &self,
        expression: &dyn Any,
        _metadata: Option<&Metadata>,
    ) -> Option<BindResult<Vec<BindingBuilder>>> {
        if let Some(builder) = expression.downcast_ref::<BindingBuilder>() {
            return Some(Ok(vec![builder.clone()]));
        }
        expression
            .downcast_ref::<Vec<BindingBuilder>>()
            .map(|builders| Ok(builders.clone()))
    }
}

impl Component<BindingManager> for BuilderParser {
    fn priority(&self) -> i32 {
        10
    }

    fn register(self: Rc<Self>, registrar: &mut Registrar) {
        registrar.provide::<dyn BindingExpressionParser>(self);
    }
}

/// Parses the compact text form:
///
/// ```text
/// Text = Owner.Name, Mode=TwoWay; Title = 'fixed'
/// ```
///
/// Each `;`-separated binding is `target = source` followed by optional
/// `Key=Value` options: `Mode`, `Optional`, `Trigger`, `EqualityCheck`,
/// `Execution`. A quoted source is a string constant; an empty source is
/// the source object itself. Paths are not validated here.
#[derive(Debug, Default)]
pub struct TextExpressionParser;

/// Split on `sep` outside brackets and quotes.
fn split_top_level(input: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quoted = false;
    let mut start = 0;
    for (i, c) in input.char_indices() {
        match c {
            '\'' => quoted = !quoted,
            '[' | '(' if !quoted => depth += 1,
            ']' | ')' if !quoted => depth = depth.saturating_sub(1),
            c if c == sep && depth == 0 && !quoted => {
                parts.push(&input[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&input[start..]);
    parts
}

fn unsupported(text: &str) -> BindingError {
    BindingError::UnsupportedExpression(text.trim().to_owned())
}

fn parse_bool(value: &str, item: &str) -> BindResult<bool> {
    value.parse::<bool>().map_err(|_| unsupported(item))
}

fn parse_binding(item: &str) -> BindResult<BindingBuilder> {
    let mut parts = split_top_level(item, ',').into_iter();
    let head = parts.next().unwrap_or_default();
    let (target, source) = head.split_once('=').ok_or_else(|| unsupported(item))?;
    let target = target.trim();
    if target.is_empty() {
        return Err(unsupported(item));
    }
    let source = source.trim();
    let mut builder = BindingBuilder::new(target);
    builder = match source.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')) {
        Some(literal) => builder.constant(Value::from(literal)),
        None => builder.source_path(source),
    };

    for option in parts {
        let (key, value) = option.split_once('=').ok_or_else(|| unsupported(item))?;
        let value = value.trim();
        builder = match key.trim().to_ascii_lowercase().as_str() {
            "mode" => builder.mode(BindingMode::parse(value).ok_or_else(|| unsupported(item))?),
            "optional" => builder.optional(parse_bool(value, item)?),
            "equalitycheck" => builder.equality_check(parse_bool(value, item)?),
            "trigger" => builder.trigger(value),
            "execution" => {
                builder.execution_mode(parse_execution_mode(value).ok_or_else(|| unsupported(item))?)
            }
            _ => return Err(unsupported(item)),
        };
    }
    Ok(builder)
}

fn parse_text(text: &str) -> BindResult<Vec<BindingBuilder>> {
    split_top_level(text, ';')
        .into_iter()
        .filter(|item| !item.trim().is_empty())
        .map(parse_binding)
        .collect()
}

impl BindingExpressionParser for TextExpressionParser {
    fn try_parse(
        &self,
        expression: &dyn Any,
        _metadata: Option<&Metadata>,
    ) -> Option<BindResult<Vec<BindingBuilder>>> {
        let text = expression
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| expression.downcast_ref::<String>().map(String::as_str))?;
        Some(parse_text(text))
    }
}

impl Component<BindingManager> for TextExpressionParser {
    fn register(self: Rc<Self>, registrar: &mut Registrar) {
        registrar.provide::<dyn BindingExpressionParser>(self);
    }
}
