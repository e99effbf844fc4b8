//! Resource mapping
//!
//! Decodes each classified node into a per-service payload and turns it into the
//! (action, resource) pairs its operation needs.

use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::config::AwsContext;
use crate::errors::{InferenceError, NodeContext, Result};
use crate::flow::{ClassifiedNode, FlowNode, NodeType};
use crate::resolution::{resolve_field, EnvironmentScope, ResolvedValue};

pub(crate) mod arn;

pub(crate) const TABLE_ARN_FIELD: &str = "tableArn";
pub(crate) const QUEUE_URL_FIELD: &str = "QueueUrl";
pub(crate) const TOPIC_ARN_FIELD: &str = "TopicArn";
pub(crate) const PARAMETER_NAME_FIELD: &str = "Name";
pub(crate) const BUCKET_FIELD: &str = "Bucket";
pub(crate) const EVENT_SOURCE_FIELD: &str = "EventSource";
pub(crate) const COLLECTION_ID_FIELD: &str = "CollectionId";
pub(crate) const IMAGE_BUCKET_FIELD: &str = "ImageBucket";

/// Rekognition operations that read their input image from S3
pub const IMAGE_OPERATIONS: [&str; 9] = [
    "DetectModerationLabels",
    "DetectText",
    "DetectLabels",
    "DetectFaces",
    "IndexFaces",
    "RecognizeCelebrities",
    "SearchFacesByImage",
    "StartStreamProcessor",
    "StopStreamProcessor",
];

/// Actions implicitly needed on the image bucket of an image-consuming Rekognition call
pub const IMAGE_BUCKET_ACTIONS: [&str; 2] = ["s3:Get*", "s3:List*"];

/// A resource identifier: a literal ARN/wildcard or a structured template reference
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResourceRef {
    Arn(String),
    Reference(Value),
}

impl ResourceRef {
    pub fn wildcard() -> Self {
        ResourceRef::Arn("*".to_string())
    }

    /// Canonical serialized form; equal keys mean the same resource.
    ///
    /// Each variant has its own key space, so ARN text that happens to spell out a
    /// reference never collides with the structured reference.
    pub fn canonical_key(&self) -> String {
        match self {
            ResourceRef::Arn(arn) => format!("arn:{}", arn),
            ResourceRef::Reference(reference) => format!("ref:{}", reference),
        }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceRef::Arn(arn) => f.write_str(arn),
            ResourceRef::Reference(reference) => write!(f, "{}", reference),
        }
    }
}

/// One permission a node needs: a fully qualified action on a resource
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceAction {
    /// `service:Operation`
    pub action: String,
    pub resource: ResourceRef,
}

impl ResourceAction {
    pub fn new(action: impl Into<String>, resource: ResourceRef) -> Self {
        Self {
            action: action.into(),
            resource,
        }
    }
}

/// A classified node decoded into the fields its service type uses
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceNode {
    DynamoDb {
        table_arn: ResolvedValue,
    },
    Sqs {
        queue: ResolvedValue,
    },
    Sns {
        topic: ResolvedValue,
    },
    Ses,
    Ssm {
        parameter: ResolvedValue,
    },
    S3 {
        bucket: ResolvedValue,
    },
    Cloudwatch {
        source: ResolvedValue,
    },
    Rekognition {
        collection: Option<ResolvedValue>,
        image_bucket: Option<ResolvedValue>,
    },
}

impl ServiceNode {
    /// Resolve the fields `node_type` needs from `node`, failing on required ones that are missing
    pub fn decode(
        node_type: NodeType,
        node: &FlowNode,
        scope: &EnvironmentScope,
        context: &NodeContext,
    ) -> Result<Self> {
        let optional = |field: &str| -> Result<Option<ResolvedValue>> {
            Ok(resolve_field(node, field, scope, context)?.filter(|value| !value.is_empty()))
        };
        let required = |field: &str| -> Result<ResolvedValue> {
            optional(field)?.ok_or_else(|| InferenceError::missing_field(context, field))
        };

        Ok(match node_type {
            NodeType::DynamoDb => ServiceNode::DynamoDb {
                table_arn: required(TABLE_ARN_FIELD)?,
            },
            NodeType::Sqs => ServiceNode::Sqs {
                queue: required(QUEUE_URL_FIELD)?,
            },
            NodeType::Sns => ServiceNode::Sns {
                topic: required(TOPIC_ARN_FIELD)?,
            },
            NodeType::Ses => ServiceNode::Ses,
            NodeType::Ssm => ServiceNode::Ssm {
                parameter: required(PARAMETER_NAME_FIELD)?,
            },
            NodeType::S3 => ServiceNode::S3 {
                bucket: required(BUCKET_FIELD)?,
            },
            NodeType::Cloudwatch => ServiceNode::Cloudwatch {
                source: required(EVENT_SOURCE_FIELD)?,
            },
            NodeType::Rekognition => {
                let image_bucket = if IMAGE_OPERATIONS.contains(&context.operation.as_str()) {
                    Some(required(IMAGE_BUCKET_FIELD)?)
                } else {
                    optional(IMAGE_BUCKET_FIELD)?
                };
                ServiceNode::Rekognition {
                    collection: optional(COLLECTION_ID_FIELD)?,
                    image_bucket,
                }
            }
        })
    }

    /// IAM service prefix for the node's own action
    pub fn service_prefix(&self) -> &'static str {
        match self {
            ServiceNode::DynamoDb { .. } => "dynamodb",
            ServiceNode::Sqs { .. } => "sqs",
            ServiceNode::Sns { .. } => "sns",
            ServiceNode::Ses => "ses",
            ServiceNode::Ssm { .. } => "ssm",
            ServiceNode::S3 { .. } => "s3",
            ServiceNode::Cloudwatch { .. } => "event",
            ServiceNode::Rekognition { .. } => "rekognition",
        }
    }

    /// The (action, resource) pairs `operation` needs against this node's resources
    pub fn resource_actions(
        &self,
        operation: &str,
        aws: &AwsContext,
        context: &NodeContext,
    ) -> Result<Vec<ResourceAction>> {
        let action = format!("{}:{}", self.service_prefix(), operation);

        let resource = match self {
            ServiceNode::DynamoDb { table_arn } => arn::dynamodb_table(table_arn, context)?,
            ServiceNode::Sqs { queue } => arn::sqs_queue(queue, aws, context)?,
            ServiceNode::Sns { topic } => direct(topic),
            ServiceNode::Ses => ResourceRef::wildcard(),
            ServiceNode::Ssm { parameter } => arn::ssm_parameter(parameter, aws),
            ServiceNode::S3 { bucket } => arn::s3_objects(bucket, aws),
            ServiceNode::Cloudwatch { source } => direct(source),
            ServiceNode::Rekognition { collection, .. } => collection
                .as_ref()
                .map_or_else(ResourceRef::wildcard, |id| {
                    arn::rekognition_collection(id, aws)
                }),
        };

        let mut pairs = vec![ResourceAction::new(action, resource)];

        if let ServiceNode::Rekognition {
            image_bucket: Some(bucket),
            ..
        } = self
        {
            if IMAGE_OPERATIONS.contains(&operation) {
                let objects = arn::s3_objects(bucket, aws);
                pairs.extend(
                    IMAGE_BUCKET_ACTIONS
                        .iter()
                        .map(|action| ResourceAction::new(*action, objects.clone())),
                );
            }
        }

        Ok(pairs)
    }
}

/// A resolved value used as the resource identifier as-is
fn direct(value: &ResolvedValue) -> ResourceRef {
    match value {
        ResolvedValue::Text(text) => ResourceRef::Arn(text.clone()),
        ResolvedValue::Reference(reference) => ResourceRef::Reference(reference.clone()),
    }
}

/// Map a classified node to the permissions it needs
pub fn map_classified(
    classified: ClassifiedNode<'_>,
    scope: &EnvironmentScope,
    aws: &AwsContext,
) -> Result<Vec<ResourceAction>> {
    let node_type = classified.node_type;
    let operation = classified.node.operation().unwrap_or_default();
    let context = NodeContext::new(node_type.type_name(), operation);
    if operation.is_empty() {
        return Err(InferenceError::missing_field(&context, "operation"));
    }

    let service = ServiceNode::decode(node_type, classified.node, scope, &context)?;
    let pairs = service.resource_actions(operation, aws, &context)?;
    log::debug!(
        "{} needs {}",
        context,
        pairs
            .iter()
            .map(|p| format!("{} on {}", p.action, p.resource))
            .collect::<Vec<_>>()
            .join(", ")
    );
    Ok(pairs)
}

/// Map an arbitrary flow node, failing when its type has no permission mapping
pub fn map_node(
    node: &FlowNode,
    scope: &EnvironmentScope,
    aws: &AwsContext,
) -> Result<Vec<ResourceAction>> {
    let type_name = node.node_type().unwrap_or_default();
    let node_type =
        NodeType::from_type_name(type_name).ok_or_else(|| InferenceError::UnsupportedNodeType {
            node_type: type_name.to_string(),
            operation: node.operation().unwrap_or_default().to_string(),
        })?;
    map_classified(ClassifiedNode { node_type, node }, scope, aws)
}
