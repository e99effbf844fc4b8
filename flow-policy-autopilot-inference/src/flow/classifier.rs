//! Node classification
//!
//! Filters a flow down to the nodes that talk to an AWS service. Logical nodes
//! (functions, routers, loggers, ...) are dropped without error.

use std::fmt;

use super::FlowNode;

/// Service node types that participate in permission inference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    Rekognition,
    S3,
    Sqs,
    Cloudwatch,
    DynamoDb,
    Sns,
    Ses,
    Ssm,
}

impl NodeType {
    /// All participating types, in declaration order
    pub const ALL: [NodeType; 8] = [
        NodeType::Rekognition,
        NodeType::S3,
        NodeType::Sqs,
        NodeType::Cloudwatch,
        NodeType::DynamoDb,
        NodeType::Sns,
        NodeType::Ses,
        NodeType::Ssm,
    ];

    /// Match a node's `type` string exactly against the whitelist
    pub fn from_type_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.type_name() == name)
    }

    /// The `type` string used in flow documents
    pub fn type_name(self) -> &'static str {
        match self {
            NodeType::Rekognition => "Rekognition",
            NodeType::S3 => "S3",
            NodeType::Sqs => "SQS",
            NodeType::Cloudwatch => "Cloudwatch",
            NodeType::DynamoDb => "Dynamo DB",
            NodeType::Sns => "SNS",
            NodeType::Ses => "SES",
            NodeType::Ssm => "SSM",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// A flow node whose type is on the whitelist
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifiedNode<'a> {
    pub node_type: NodeType,
    pub node: &'a FlowNode,
}

/// Stable filter of `nodes` down to the whitelisted service nodes
pub fn classify(nodes: &[FlowNode]) -> Vec<ClassifiedNode<'_>> {
    nodes
        .iter()
        .filter_map(|node| {
            let node_type = node.node_type().and_then(NodeType::from_type_name);
            if node_type.is_none() {
                log::trace!("Skipping node with type {:?}", node.node_type());
            }
            node_type.map(|node_type| ClassifiedNode { node_type, node })
        })
        .collect()
}
