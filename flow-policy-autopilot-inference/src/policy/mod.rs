//! Policy document model
//!
//! A [`PolicyDocument`] is the ordered statement list inferred for one flow. It serializes
//! as a bare JSON array so it can be appended to an existing role policy; use
//! [`PolicyDocument::into_iam_policy`] for a standalone IAM policy.

use serde::Serialize;

use crate::mapping::ResourceRef;

pub(crate) mod aggregator;

pub use aggregator::{aggregate, PolicyAccumulator};

/// IAM policy language version
pub const POLICY_VERSION: &str = "2012-10-17";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Effect {
    Allow,
}

/// One (effect, resource, actions) entry
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Statement {
    pub effect: Effect,
    pub resource: ResourceRef,
    pub action: Vec<String>,
}

impl Statement {
    pub fn allow(resource: ResourceRef, action: Vec<String>) -> Self {
        Self {
            effect: Effect::Allow,
            resource,
            action,
        }
    }
}

/// Statements inferred for a single flow, in first-encounter order of their resources
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PolicyDocument {
    statements: Vec<Statement>,
}

impl PolicyDocument {
    pub fn new(statements: Vec<Statement>) -> Self {
        Self { statements }
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Wrap the statements in a standalone IAM policy
    pub fn into_iam_policy(self) -> IamPolicy {
        IamPolicy {
            version: POLICY_VERSION.to_string(),
            statement: self.statements,
        }
    }
}

/// A complete IAM policy document
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct IamPolicy {
    pub version: String,
    pub statement: Vec<Statement>,
}
