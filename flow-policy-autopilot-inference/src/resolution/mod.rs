//! Field value resolution
//!
//! Turns a node field's configured value into the concrete value the mapper builds a
//! resource identifier from. Two strategies sit behind [`ValueResolver`]:
//!
//! - [`ExpressionResolver`] (primary): evaluate the value as an expression over the
//!   function's environment, falling back to the raw text whenever evaluation fails or
//!   yields nothing.
//! - [`DiscriminatorResolver`]: honour an explicit `<field>Type` tag (`str`, `env`, ...)
//!   as written by older flow documents. A missing `env` variable is a hard failure.

use std::collections::BTreeMap;

use serde_json::Value;
use thiserror::Error;

use crate::errors::{InferenceError, NodeContext};
use crate::flow::FlowNode;

pub(crate) mod discriminator;
pub(crate) mod expression;

pub use discriminator::{DiscriminatorResolver, DiscriminatorTag};
pub use expression::ExpressionResolver;

/// Environment variables declared for the function being processed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvironmentScope {
    variables: BTreeMap<String, String>,
}

impl EnvironmentScope {
    pub fn new(variables: BTreeMap<String, String>) -> Self {
        Self { variables }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.variables.get(name).map(String::as_str)
    }

    /// The scope as the `env` object exposed to expressions
    pub(crate) fn to_json(&self) -> Value {
        Value::Object(
            self.variables
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect(),
        )
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for EnvironmentScope {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::new(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// The concrete value of a field after resolution
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedValue {
    /// Plain text: a literal, an environment value, or an expression result
    Text(String),
    /// A structured deployment-template reference (e.g. `{"Ref": "Topic"}`), passed through untouched
    Reference(Value),
}

impl ResolvedValue {
    /// True for empty text; references are never empty
    pub fn is_empty(&self) -> bool {
        matches!(self, ResolvedValue::Text(text) if text.is_empty())
    }
}

/// Failure to resolve a field, before the node context is attached
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("environment variable '{0}' is not defined")]
    MissingEnvironmentVariable(String),
    #[error("value source '{0}' is only known at invocation time")]
    UnsupportedValueSource(String),
}

impl ResolutionError {
    /// Attach the node and field the failure belongs to
    pub fn at(self, node: &NodeContext, field: &str) -> InferenceError {
        match self {
            ResolutionError::MissingEnvironmentVariable(variable) => {
                InferenceError::MissingEnvironmentVariable {
                    node: node.clone(),
                    field: field.to_string(),
                    variable,
                }
            }
            ResolutionError::UnsupportedValueSource(source_tag) => {
                InferenceError::UnsupportedValueSource {
                    node: node.clone(),
                    field: field.to_string(),
                    source_tag,
                }
            }
        }
    }
}

/// Strategy for turning a raw field value into a [`ResolvedValue`]
pub trait ValueResolver {
    /// Resolve a non-empty string value
    fn resolve_text(
        &self,
        raw: &str,
        scope: &EnvironmentScope,
    ) -> Result<ResolvedValue, ResolutionError>;

    /// Resolve any configured value.
    ///
    /// Empty and non-string values never reach the strategy: empty values are returned
    /// unchanged, scalars are literal text, and objects/arrays are template references.
    fn resolve(
        &self,
        raw: &Value,
        scope: &EnvironmentScope,
    ) -> Result<ResolvedValue, ResolutionError> {
        match raw {
            Value::Null => Ok(ResolvedValue::Text(String::new())),
            Value::String(text) if text.is_empty() => Ok(ResolvedValue::Text(String::new())),
            Value::String(text) => self.resolve_text(text, scope),
            Value::Bool(_) | Value::Number(_) => Ok(ResolvedValue::Text(raw.to_string())),
            Value::Array(_) | Value::Object(_) => Ok(ResolvedValue::Reference(raw.clone())),
        }
    }
}

/// Per-field strategy choice
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldResolver {
    Expression(ExpressionResolver),
    Discriminator(DiscriminatorResolver),
}

impl FieldResolver {
    /// Discriminator-based when the field carries a `<field>Type` tag, expression-first otherwise
    pub fn select(discriminator: Option<&str>) -> Self {
        match discriminator {
            Some(tag) => {
                FieldResolver::Discriminator(DiscriminatorResolver::new(DiscriminatorTag::parse(tag)))
            }
            None => FieldResolver::Expression(ExpressionResolver),
        }
    }
}

impl ValueResolver for FieldResolver {
    fn resolve_text(
        &self,
        raw: &str,
        scope: &EnvironmentScope,
    ) -> Result<ResolvedValue, ResolutionError> {
        match self {
            FieldResolver::Expression(resolver) => resolver.resolve_text(raw, scope),
            FieldResolver::Discriminator(resolver) => resolver.resolve_text(raw, scope),
        }
    }
}

/// Resolve `field` of `node`, choosing the strategy from the field's discriminator.
///
/// Returns `None` when the node does not configure the field at all.
pub fn resolve_field(
    node: &FlowNode,
    field: &str,
    scope: &EnvironmentScope,
    context: &NodeContext,
) -> crate::errors::Result<Option<ResolvedValue>> {
    let Some(raw) = node.field(field) else {
        return Ok(None);
    };

    let resolver = FieldResolver::select(node.discriminator(field));
    log::debug!("Resolving field '{}' of {} with {:?}", field, context, resolver);

    resolver
        .resolve(raw, scope)
        .map(Some)
        .map_err(|e| e.at(context, field))
}
