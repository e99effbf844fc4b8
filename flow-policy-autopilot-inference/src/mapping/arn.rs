//! Resource identifier construction and validation per service

use serde_json::{json, Value};
use url::Url;

use super::ResourceRef;
use crate::config::AwsContext;
use crate::errors::{InferenceError, NodeContext, Result};
use crate::resolution::ResolvedValue;

/// Number of `:`-separated segments in a full ARN
const ARN_SEGMENTS: usize = 6;

/// A DynamoDB table ARN supplied verbatim by the flow author
pub(crate) fn dynamodb_table(value: &ResolvedValue, node: &NodeContext) -> Result<ResourceRef> {
    match value {
        ResolvedValue::Text(arn) => validate_arn(arn, node),
        ResolvedValue::Reference(reference) => Ok(ResourceRef::Reference(reference.clone())),
    }
}

/// A full ARN has exactly [`ARN_SEGMENTS`] `:`-separated segments
fn validate_arn(arn: &str, node: &NodeContext) -> Result<ResourceRef> {
    let segments = arn.split(':').count();
    if segments != ARN_SEGMENTS {
        return Err(InferenceError::InvalidArnFormat {
            node: node.clone(),
            value: arn.to_string(),
            segments,
        });
    }
    Ok(ResourceRef::Arn(arn.to_string()))
}

/// A queue ARN, either given directly or converted from the queue URL
pub(crate) fn sqs_queue(
    value: &ResolvedValue,
    aws: &AwsContext,
    node: &NodeContext,
) -> Result<ResourceRef> {
    let text = match value {
        ResolvedValue::Text(text) => text,
        ResolvedValue::Reference(reference) => {
            return Ok(ResourceRef::Reference(reference.clone()))
        }
    };

    if text.starts_with("arn:") {
        return validate_arn(text, node);
    }

    let unrecognized = || InferenceError::UnrecognizedQueueUrl {
        node: node.clone(),
        value: text.clone(),
    };

    let url = Url::parse(text).map_err(|_| unrecognized())?;
    if url.scheme() != "https" {
        return Err(unrecognized());
    }

    // sqs.<region>.amazonaws.com[.cn]
    let host = url.host_str().ok_or_else(unrecognized)?;
    let labels: Vec<&str> = host.split('.').collect();
    let region = match labels.as_slice() {
        ["sqs", region, "amazonaws", "com"] | ["sqs", region, "amazonaws", "com", "cn"] => *region,
        _ => return Err(unrecognized()),
    };

    let segments: Vec<&str> = url.path_segments().ok_or_else(unrecognized)?.collect();
    let (account, name) = match segments.as_slice() {
        [account, name] if !account.is_empty() && !name.is_empty() => (*account, *name),
        _ => return Err(unrecognized()),
    };

    let arn = format!(
        "arn:{}:sqs:{}:{}:{}",
        aws.partition(),
        region,
        account,
        name
    );
    log::debug!("Converted queue URL {} to {}", text, arn);
    Ok(ResourceRef::Arn(arn))
}

/// Every object in a bucket
pub(crate) fn s3_objects(bucket: &ResolvedValue, aws: &AwsContext) -> ResourceRef {
    templated(&format!("arn:{}:s3:::", aws.partition()), bucket, "/*")
}

/// A Systems Manager parameter in the deployment account and region
pub(crate) fn ssm_parameter(key: &ResolvedValue, aws: &AwsContext) -> ResourceRef {
    let prefix = format!(
        "arn:{}:ssm:{}:{}:parameter/",
        aws.partition(),
        aws.region(),
        aws.account()
    );
    match key {
        ResolvedValue::Text(key) => {
            let key = key.strip_prefix('/').unwrap_or(key);
            ResourceRef::Arn(format!("{}{}", prefix, key))
        }
        reference => templated(&prefix, reference, ""),
    }
}

/// A Rekognition face collection in the deployment account and region
pub(crate) fn rekognition_collection(id: &ResolvedValue, aws: &AwsContext) -> ResourceRef {
    let prefix = format!(
        "arn:{}:rekognition:{}:{}:collection/",
        aws.partition(),
        aws.region(),
        aws.account()
    );
    templated(&prefix, id, "")
}

/// `prefix + value + suffix`, as an `Fn::Join` when the value is a template reference
fn templated(prefix: &str, value: &ResolvedValue, suffix: &str) -> ResourceRef {
    match value {
        ResolvedValue::Text(text) => ResourceRef::Arn(format!("{}{}{}", prefix, text, suffix)),
        ResolvedValue::Reference(reference) => {
            let parts: Vec<Value> = [
                Value::String(prefix.to_string()),
                reference.clone(),
                Value::String(suffix.to_string()),
            ]
            .into_iter()
            .filter(|part| part.as_str() != Some(""))
            .collect();
            ResourceRef::Reference(json!({ "Fn::Join": ["", parts] }))
        }
    }
}
