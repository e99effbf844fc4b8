//! Flow document loading
//!
//! A flow is a JSON array of node records. Each record is an open-ended mapping; only
//! `type`, `operation` and the service-specific fields read by the mapper matter here.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{InferenceError, Result};

pub(crate) mod classifier;

pub use classifier::{classify, ClassifiedNode, NodeType};

/// Suffix of the sibling key carrying a field's resolution discriminator
pub(crate) const DISCRIMINATOR_SUFFIX: &str = "Type";

/// One entry of a flow document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlowNode {
    fields: Map<String, Value>,
}

impl FlowNode {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// The node's `type`, when present and a string
    pub fn node_type(&self) -> Option<&str> {
        self.fields.get("type").and_then(Value::as_str)
    }

    /// The node's `operation`, when present and a string
    pub fn operation(&self) -> Option<&str> {
        self.fields.get("operation").and_then(Value::as_str)
    }

    /// Raw configured value of a field
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// The `<name>Type` discriminator paired with a field, if the flow declares one
    pub fn discriminator(&self, name: &str) -> Option<&str> {
        self.fields
            .get(&format!("{}{}", name, DISCRIMINATOR_SUFFIX))
            .and_then(Value::as_str)
            .filter(|tag| !tag.is_empty())
    }
}

/// Parse raw flow bytes into an ordered, non-empty node sequence
pub fn load_flow(bytes: &[u8]) -> Result<Vec<FlowNode>> {
    let document: Value = serde_json::from_slice(bytes)
        .map_err(|e| InferenceError::malformed_flow(format!("not valid JSON: {}", e)))?;

    let entries = match document {
        Value::Array(entries) => entries,
        other => {
            return Err(InferenceError::malformed_flow(format!(
                "expected a sequence of nodes, found {}",
                json_kind(&other)
            )))
        }
    };

    if entries.is_empty() {
        return Err(InferenceError::malformed_flow("flow contains no nodes"));
    }

    let nodes = entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| match entry {
            Value::Object(fields) => Ok(FlowNode::new(fields)),
            other => Err(InferenceError::malformed_flow(format!(
                "node {} is {}, expected a record",
                index,
                json_kind(&other)
            ))),
        })
        .collect::<Result<Vec<_>>>()?;

    log::debug!("Loaded flow with {} nodes", nodes.len());
    Ok(nodes)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a record",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(value: Value) -> FlowNode {
        match value {
            Value::Object(fields) => FlowNode::new(fields),
            _ => panic!("test node must be an object"),
        }
    }

    #[test]
    fn test_load_flow_preserves_order() {
        let raw = br#"[
            {"id": "a", "type": "S3", "operation": "GetObject", "Bucket": "assets"},
            {"id": "b", "type": "function"},
            {"id": "c", "type": "SQS", "operation": "SendMessage"}
        ]"#;

        let nodes = load_flow(raw).unwrap();
        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes[0].node_type(), Some("S3"));
        assert_eq!(nodes[1].node_type(), Some("function"));
        assert_eq!(nodes[2].operation(), Some("SendMessage"));
    }

    #[test]
    fn test_load_flow_rejects_invalid_json() {
        let err = load_flow(b"[{\"type\": ").unwrap_err();
        assert!(matches!(err, InferenceError::MalformedFlow { .. }));
    }

    #[test]
    fn test_load_flow_rejects_non_sequence() {
        let err = load_flow(br#"{"type": "S3"}"#).unwrap_err();
        match err {
            InferenceError::MalformedFlow { reason } => assert!(reason.contains("a record")),
            other => panic!("Expected MalformedFlow, got {other:?}"),
        }
    }

    #[test]
    fn test_load_flow_rejects_empty_sequence() {
        let err = load_flow(b"[]").unwrap_err();
        match err {
            InferenceError::MalformedFlow { reason } => assert!(reason.contains("no nodes")),
            other => panic!("Expected MalformedFlow, got {other:?}"),
        }
    }

    #[test]
    fn test_load_flow_rejects_scalar_entries() {
        let err = load_flow(br#"[{"type": "S3"}, 42]"#).unwrap_err();
        match err {
            InferenceError::MalformedFlow { reason } => assert!(reason.contains("node 1")),
            other => panic!("Expected MalformedFlow, got {other:?}"),
        }
    }

    #[test]
    fn test_discriminator_lookup() {
        let n = node(json!({
            "type": "S3",
            "Bucket": "BUCKET_NAME",
            "BucketType": "env",
            "Key": "a.txt",
            "KeyType": ""
        }));
        assert_eq!(n.discriminator("Bucket"), Some("env"));
        assert_eq!(n.discriminator("Key"), None);
        assert_eq!(n.discriminator("Missing"), None);
    }

    #[test]
    fn test_non_string_type_is_absent() {
        let n = node(json!({"type": 3, "operation": ["x"]}));
        assert_eq!(n.node_type(), None);
        assert_eq!(n.operation(), None);
    }
}
