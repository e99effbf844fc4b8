//! End-to-end inference over complete flow documents through the public API

use flow_policy_autopilot_inference::{
    classify, load_flow, AwsContext, EnvironmentScope, FlowNode, InferenceEngine, InferenceError,
    NodeType, ResourceRef,
};
use proptest::prelude::*;
use serde_json::{json, Value};

/// An order-processing flow mixing logical nodes with service integrations
const ORDER_FLOW: &str = r#"[
    {"id": "1", "type": "EventListener", "eventSource": "Amazon API Gateway"},
    {"id": "2", "type": "Dynamo DB", "operation": "Query",
     "tableArn": "arn:aws:dynamodb:us-east-1:111111111111:table/Orders"},
    {"id": "3", "type": "function", "func": "msg.payload = msg.payload.Items; return msg;"},
    {"id": "4", "type": "SQS", "operation": "SendMessage",
     "QueueUrl": "https://sqs.us-east-1.amazonaws.com/111111111111/my-queue"},
    {"id": "5", "type": "S3", "operation": "GetObject", "Bucket": "assets"},
    {"id": "6", "type": "S3", "operation": "PutObject", "Bucket": "assets"},
    {"id": "7", "type": "Rekognition", "operation": "DetectLabels",
     "ImageBucket": "env.PHOTO_BUCKET"},
    {"id": "8", "type": "SSM", "operation": "GetParameter",
     "Name": "DB_PASSWORD_PARAM", "NameType": "env"},
    {"id": "9", "type": "SES", "operation": "SendEmail"},
    {"id": "10", "type": "Dynamo DB", "operation": "PutItem",
     "tableArn": "arn:aws:dynamodb:us-east-1:111111111111:table/Orders"},
    {"id": "11", "type": "EventListenerEnd"}
]"#;

fn engine() -> InferenceEngine {
    InferenceEngine::new(AwsContext::new("aws", "us-east-1", "111111111111").unwrap())
}

fn scope() -> EnvironmentScope {
    [
        ("PHOTO_BUCKET", "photos"),
        ("DB_PASSWORD_PARAM", "/orders/db-password"),
    ]
    .into_iter()
    .collect()
}

#[test]
fn test_order_flow_policy() {
    let document = engine()
        .infer_from_bytes(ORDER_FLOW.as_bytes(), &scope())
        .unwrap();

    assert_eq!(
        serde_json::to_value(&document).unwrap(),
        json!([
            {
                "Effect": "Allow",
                "Resource": "arn:aws:dynamodb:us-east-1:111111111111:table/Orders",
                "Action": ["dynamodb:Query", "dynamodb:PutItem"]
            },
            {
                "Effect": "Allow",
                "Resource": "arn:aws:sqs:us-east-1:111111111111:my-queue",
                "Action": ["sqs:SendMessage"]
            },
            {
                "Effect": "Allow",
                "Resource": "arn:aws:s3:::assets/*",
                "Action": ["s3:GetObject", "s3:PutObject"]
            },
            {
                "Effect": "Allow",
                "Resource": "*",
                "Action": ["rekognition:DetectLabels", "ses:SendEmail"]
            },
            {
                "Effect": "Allow",
                "Resource": "arn:aws:s3:::photos/*",
                "Action": ["s3:Get*", "s3:List*"]
            },
            {
                "Effect": "Allow",
                "Resource": "arn:aws:ssm:us-east-1:111111111111:parameter/orders/db-password",
                "Action": ["ssm:GetParameter"]
            }
        ])
    );
}

#[test]
fn test_repeated_passes_are_byte_identical() {
    let engine = engine();
    let first = serde_json::to_string(
        &engine
            .infer_from_bytes(ORDER_FLOW.as_bytes(), &scope())
            .unwrap(),
    )
    .unwrap();
    let second = serde_json::to_string(
        &engine
            .infer_from_bytes(ORDER_FLOW.as_bytes(), &scope())
            .unwrap(),
    )
    .unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_missing_environment_variable_emits_no_policy() {
    let result = engine().infer_from_bytes(ORDER_FLOW.as_bytes(), &EnvironmentScope::default());
    match result {
        Err(InferenceError::MissingEnvironmentVariable {
            node,
            field,
            variable,
        }) => {
            assert_eq!(node.node_type, "SSM");
            assert_eq!(node.operation, "GetParameter");
            assert_eq!(field, "Name");
            assert_eq!(variable, "DB_PASSWORD_PARAM");
        }
        other => panic!("Expected MissingEnvironmentVariable, got {other:?}"),
    }
}

#[test]
fn test_queue_url_missing_path_segment() {
    let flow = br#"[{"type": "SQS", "operation": "SendMessage",
                     "QueueUrl": "https://sqs.us-east-1.amazonaws.com/my-queue"}]"#;
    let err = engine()
        .infer_from_bytes(flow, &EnvironmentScope::default())
        .unwrap_err();
    assert!(matches!(err, InferenceError::UnrecognizedQueueUrl { .. }));
    assert!(err.to_string().contains("https://sqs.us-east-1.amazonaws.com/my-queue"));
}

#[test]
fn test_invalid_table_arn() {
    let flow = br#"[{"type": "Dynamo DB", "operation": "GetItem", "tableArn": "Orders"}]"#;
    let err = engine()
        .infer_from_bytes(flow, &EnvironmentScope::default())
        .unwrap_err();
    assert!(matches!(
        err,
        InferenceError::InvalidArnFormat { segments: 1, .. }
    ));
}

#[test]
fn test_malformed_flows() {
    for raw in ["", "{}", "[]", "\"flow\"", "[1, 2]"] {
        let err = engine()
            .infer_from_bytes(raw.as_bytes(), &EnvironmentScope::default())
            .unwrap_err();
        assert!(
            matches!(err, InferenceError::MalformedFlow { .. }),
            "input {raw:?} gave {err:?}"
        );
    }
}

#[test]
fn test_cloudformation_references_pass_through() {
    let flow = br#"[
        {"type": "SNS", "operation": "Publish", "TopicArn": {"Ref": "AlertsTopic"}},
        {"type": "S3", "operation": "GetObject", "Bucket": {"Ref": "AssetsBucket"}},
        {"type": "SNS", "operation": "Subscribe", "TopicArn": {"Ref": "AlertsTopic"}}
    ]"#;
    let document = engine()
        .infer_from_bytes(flow, &EnvironmentScope::default())
        .unwrap();

    assert_eq!(document.len(), 2);
    assert_eq!(
        document.statements()[0].resource,
        ResourceRef::Reference(json!({"Ref": "AlertsTopic"}))
    );
    assert_eq!(
        document.statements()[0].action,
        vec!["sns:Publish", "sns:Subscribe"]
    );
    assert_eq!(
        document.statements()[1].resource,
        ResourceRef::Reference(json!({
            "Fn::Join": ["", ["arn:aws:s3:::", {"Ref": "AssetsBucket"}, "/*"]]
        }))
    );
}

#[test]
fn test_literal_reference_text_stays_a_separate_statement() {
    let flow = br#"[
        {"type": "SNS", "operation": "Publish", "TopicArn": {"Ref": "T"}},
        {"type": "SNS", "operation": "Subscribe",
         "TopicArn": "{\"Ref\":\"T\"}", "TopicArnType": "str"}
    ]"#;
    let document = engine()
        .infer_from_bytes(flow, &EnvironmentScope::default())
        .unwrap();

    assert_eq!(document.len(), 2);
    assert_eq!(
        document.statements()[0].resource,
        ResourceRef::Reference(json!({"Ref": "T"}))
    );
    assert_eq!(document.statements()[0].action, vec!["sns:Publish"]);
    assert_eq!(
        document.statements()[1].resource,
        ResourceRef::Arn(r#"{"Ref":"T"}"#.to_string())
    );
    assert_eq!(document.statements()[1].action, vec!["sns:Subscribe"]);
}

#[test]
fn test_malformed_queue_arn_is_rejected() {
    let flow = br#"[{"type": "SQS", "operation": "SendMessage", "QueueUrl": "arn:oops"}]"#;
    let err = engine()
        .infer_from_bytes(flow, &EnvironmentScope::default())
        .unwrap_err();
    assert!(matches!(
        err,
        InferenceError::InvalidArnFormat { ref value, segments: 2, .. } if value == "arn:oops"
    ));
}

fn node_strategy() -> impl Strategy<Value = Value> {
    let node_type = prop_oneof![
        Just(Some("S3")),
        Just(Some("SQS")),
        Just(Some("SNS")),
        Just(Some("SES")),
        Just(Some("function")),
        Just(Some("EventListener")),
        Just(Some("s3")),
        Just(None),
    ];
    (node_type, 0..3usize, 0..3usize).prop_map(|(node_type, resource, operation)| {
        let mut node = json!({
            "operation": format!("Operation{}", operation),
            "Bucket": format!("bucket-{}", resource),
            "TopicArn": format!("arn:aws:sns:us-east-1:111111111111:topic-{}", resource),
            "QueueUrl": format!("arn:aws:sqs:us-east-1:111111111111:queue-{}", resource),
        });
        if let Some(node_type) = node_type {
            node["type"] = json!(node_type);
        }
        node
    })
}

fn to_flow(nodes: &[Value]) -> Vec<FlowNode> {
    load_flow(serde_json::to_string(nodes).unwrap().as_bytes()).unwrap()
}

proptest! {
    #[test]
    fn prop_classifier_output_is_ordered_whitelisted_subsequence(
        nodes in prop::collection::vec(node_strategy(), 1..30)
    ) {
        let flow = to_flow(&nodes);
        let classified = classify(&flow);

        let mut cursor = 0;
        for entry in &classified {
            prop_assert!(NodeType::ALL.contains(&entry.node_type));
            prop_assert_eq!(entry.node.node_type(), Some(entry.node_type.type_name()));
            let position = flow[cursor..]
                .iter()
                .position(|candidate| std::ptr::eq(candidate, entry.node));
            prop_assert!(position.is_some());
            cursor += position.unwrap_or_default() + 1;
        }

        let expected = flow
            .iter()
            .filter(|n| n.node_type().and_then(NodeType::from_type_name).is_some())
            .count();
        prop_assert_eq!(classified.len(), expected);
    }

    #[test]
    fn prop_pipeline_is_deterministic(
        nodes in prop::collection::vec(node_strategy(), 1..30)
    ) {
        let flow = to_flow(&nodes);
        let engine = engine();
        let first = serde_json::to_string(&engine.infer(&flow, &scope()).unwrap()).unwrap();
        let second = serde_json::to_string(&engine.infer(&flow, &scope()).unwrap()).unwrap();
        prop_assert_eq!(first, second);
    }
}
