//! This crate infers least-privilege IAM statements for a serverless function from its
//! integration flow:
//! - Flow loading and classification of service nodes
//! - Field value resolution (expressions over the function environment, or explicit tags)
//! - Per-service resource ARN construction and action mapping
//! - Deterministic aggregation into a policy document
//!
//! It also renders the function's thin entry point and merges inferred statements into
//! an infrastructure template's execution role.

pub mod config;
mod engine;
mod errors;
pub mod flow;
pub mod handler;
pub mod mapping;
pub mod policy;
pub mod resolution;
pub mod template;

// Re-exports for a small, focused public API
pub use config::{AwsContext, InferenceSettings, DEFAULT_PARTITION};
pub use engine::InferenceEngine;
pub use errors::{InferenceError, NodeContext, Result};
pub use flow::{classify, load_flow, FlowNode, NodeType};
pub use mapping::{map_node, ResourceAction, ResourceRef};
pub use policy::{IamPolicy, PolicyDocument, Statement};
pub use resolution::{EnvironmentScope, ResolvedValue};
pub use template::{merge_into_role, MergeOutcome, DEFAULT_ROLE_LOGICAL_ID};
