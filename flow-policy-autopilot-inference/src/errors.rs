//! Error types for flow-to-policy inference
//!
//! Every variant is terminal for the current inference pass. Node-level variants carry
//! the node's type and operation so the flow author can locate the offending entry.

use std::fmt;

use thiserror::Error;

/// Identifies the flow node an error was raised for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeContext {
    /// The node's declared `type` (e.g. "Dynamo DB")
    pub node_type: String,
    /// The node's declared `operation`, or an empty string when missing
    pub operation: String,
}

impl NodeContext {
    pub fn new(node_type: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            node_type: node_type.into(),
            operation: operation.into(),
        }
    }
}

impl fmt::Display for NodeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.operation.is_empty() {
            write!(f, "'{}' node", self.node_type)
        } else {
            write!(f, "'{}' node (operation {})", self.node_type, self.operation)
        }
    }
}

/// Errors surfaced by the inference engine
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InferenceError {
    /// The flow document is not parseable, not a sequence, or empty
    #[error("Malformed flow: {reason}")]
    MalformedFlow { reason: String },

    /// A field explicitly tagged as an environment reference names an undefined variable
    #[error("{node}: field '{field}' references environment variable '{variable}', which is not defined for this function")]
    MissingEnvironmentVariable {
        node: NodeContext,
        field: String,
        variable: String,
    },

    /// A field is tagged with a value source that is only known at invocation time
    #[error("{node}: field '{field}' uses value source '{source_tag}', which cannot be resolved before deployment")]
    UnsupportedValueSource {
        node: NodeContext,
        field: String,
        source_tag: String,
    },

    /// A resource ARN supplied by the flow author has the wrong shape
    #[error("{node}: '{value}' is not a valid ARN (expected 6 ':'-separated segments, found {segments})")]
    InvalidArnFormat {
        node: NodeContext,
        value: String,
        segments: usize,
    },

    /// A queue URL does not have the `https://sqs.<region>.amazonaws.com/<account>/<name>` shape
    #[error("{node}: '{value}' is not a recognized SQS queue URL")]
    UnrecognizedQueueUrl { node: NodeContext, value: String },

    /// The node type passed classification but has no permission mapping
    #[error("'{node_type}' nodes are not supported for permission inference (operation {operation})")]
    UnsupportedNodeType {
        node_type: String,
        operation: String,
    },

    /// A field required to build the node's resource identifier is absent or empty
    #[error("{node}: required field '{field}' is missing or empty")]
    MissingField { node: NodeContext, field: String },

    /// The partition/region/account context handed to the engine is invalid
    #[error("Invalid AWS context: {reason}")]
    InvalidContext { reason: String },

    /// The inferred policy could not be merged into the infrastructure template
    #[error("Failed to merge policy into template: {reason}")]
    TemplateMerge { reason: String },
}

impl InferenceError {
    pub fn malformed_flow(reason: impl Into<String>) -> Self {
        Self::MalformedFlow {
            reason: reason.into(),
        }
    }

    pub fn invalid_context(reason: impl Into<String>) -> Self {
        Self::InvalidContext {
            reason: reason.into(),
        }
    }

    pub fn template_merge(reason: impl Into<String>) -> Self {
        Self::TemplateMerge {
            reason: reason.into(),
        }
    }

    pub fn missing_field(node: &NodeContext, field: impl Into<String>) -> Self {
        Self::MissingField {
            node: node.clone(),
            field: field.into(),
        }
    }
}

/// Result type used throughout the inference crate
pub type Result<T> = std::result::Result<T, InferenceError>;
