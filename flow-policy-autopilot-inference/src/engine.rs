//! Inference engine
//!
//! Runs one flow through the pipeline: load → classify → resolve/map each node →
//! aggregate. Processing is sequential and fails on the first error; no partial
//! policy is ever returned.

use log::{debug, info};

use crate::config::AwsContext;
use crate::errors::Result;
use crate::flow::{classify, load_flow, FlowNode};
use crate::mapping::{map_classified, ResourceAction};
use crate::policy::{aggregate, PolicyDocument};
use crate::resolution::EnvironmentScope;

/// Infers the execution-role statements a flow needs
#[derive(Debug, Clone)]
pub struct InferenceEngine {
    aws: AwsContext,
}

impl InferenceEngine {
    pub fn new(aws: AwsContext) -> Self {
        Self { aws }
    }

    /// Parse a raw flow document and infer its policy
    pub fn infer_from_bytes(
        &self,
        flow: &[u8],
        scope: &EnvironmentScope,
    ) -> Result<PolicyDocument> {
        let nodes = load_flow(flow)?;
        self.infer(&nodes, scope)
    }

    /// Infer the policy for an already loaded flow
    pub fn infer(&self, nodes: &[FlowNode], scope: &EnvironmentScope) -> Result<PolicyDocument> {
        let pairs = self.resource_actions(nodes, scope)?;
        let pair_count = pairs.len();
        let document = aggregate(pairs);

        info!(
            "Inferred {} statements from {} permission grants across {} nodes",
            document.len(),
            pair_count,
            nodes.len()
        );
        Ok(document)
    }

    /// Every (action, resource) pair the flow needs, in node order, before aggregation
    pub fn resource_actions(
        &self,
        nodes: &[FlowNode],
        scope: &EnvironmentScope,
    ) -> Result<Vec<ResourceAction>> {
        let classified = classify(nodes);
        debug!(
            "{} of {} nodes participate in permission inference",
            classified.len(),
            nodes.len()
        );

        let mut pairs = Vec::new();
        for node in classified {
            pairs.extend(map_classified(node, scope, &self.aws)?);
        }
        Ok(pairs)
    }
}
