//! Merging inferred statements into an infrastructure template
//!
//! The execution role belongs to the surrounding template generator. Statements are
//! appended to the role's first inline policy; statements already present are skipped,
//! so merging an unchanged policy twice leaves the template untouched.

use serde_json::{json, Map, Value};

use crate::errors::{InferenceError, Result};
use crate::policy::{PolicyDocument, POLICY_VERSION};

/// Logical id of the execution role in generated serverless templates
pub const DEFAULT_ROLE_LOGICAL_ID: &str = "IamRoleLambdaExecution";

const ROLE_RESOURCE_TYPE: &str = "AWS::IAM::Role";

/// What a merge changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Statements appended to the role policy
    pub added: usize,
    /// Statements already present and left alone
    pub skipped: usize,
}

impl MergeOutcome {
    pub fn changed(&self) -> bool {
        self.added > 0
    }
}

/// Append `policy` to the inline policy of `role_logical_id` in `template`
pub fn merge_into_role(
    template: &mut Value,
    role_logical_id: &str,
    policy: &PolicyDocument,
) -> Result<MergeOutcome> {
    let role = template
        .get_mut("Resources")
        .and_then(Value::as_object_mut)
        .ok_or_else(|| InferenceError::template_merge("template has no Resources section"))?
        .get_mut(role_logical_id)
        .and_then(Value::as_object_mut)
        .ok_or_else(|| {
            InferenceError::template_merge(format!(
                "resource '{}' not found in template",
                role_logical_id
            ))
        })?;

    if let Some(resource_type) = role.get("Type").and_then(Value::as_str) {
        if resource_type != ROLE_RESOURCE_TYPE {
            return Err(InferenceError::template_merge(format!(
                "resource '{}' is a {}, not an {}",
                role_logical_id, resource_type, ROLE_RESOURCE_TYPE
            )));
        }
    }

    let statements = role_statements(role, role_logical_id)?;

    let mut outcome = MergeOutcome::default();
    for statement in policy.statements() {
        let statement = serde_json::to_value(statement).map_err(|e| {
            InferenceError::template_merge(format!("failed to serialize statement: {}", e))
        })?;
        if statements.contains(&statement) {
            outcome.skipped += 1;
        } else {
            statements.push(statement);
            outcome.added += 1;
        }
    }

    log::info!(
        "Merged policy into '{}': {} statements added, {} already present",
        role_logical_id,
        outcome.added,
        outcome.skipped
    );
    Ok(outcome)
}

/// The statement list of the role's first inline policy, created when the role has none
fn role_statements<'a>(
    role: &'a mut Map<String, Value>,
    role_logical_id: &str,
) -> Result<&'a mut Vec<Value>> {
    let malformed = |what: &str| {
        InferenceError::template_merge(format!("{} of '{}' is malformed", what, role_logical_id))
    };

    let properties = role
        .entry("Properties")
        .or_insert_with(|| json!({}))
        .as_object_mut()
        .ok_or_else(|| malformed("Properties"))?;

    let policies = properties
        .entry("Policies")
        .or_insert_with(|| json!([]))
        .as_array_mut()
        .ok_or_else(|| malformed("Policies"))?;

    if policies.is_empty() {
        policies.push(json!({
            "PolicyName": format!("{}-inferred", role_logical_id),
            "PolicyDocument": {"Version": POLICY_VERSION, "Statement": []}
        }));
    }

    policies[0]
        .as_object_mut()
        .ok_or_else(|| malformed("Policies[0]"))?
        .entry("PolicyDocument")
        .or_insert_with(|| json!({"Version": POLICY_VERSION, "Statement": []}))
        .as_object_mut()
        .ok_or_else(|| malformed("PolicyDocument"))?
        .entry("Statement")
        .or_insert_with(|| json!([]))
        .as_array_mut()
        .ok_or_else(|| malformed("Statement"))
}
