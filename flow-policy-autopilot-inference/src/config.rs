//! Explicit configuration threaded into the engine
//!
//! The partition, region and account used to synthesize ARNs are always passed in by the
//! caller; the engine never reads them from ambient provider configuration.

use std::sync::OnceLock;

use regex::Regex;

use crate::errors::{InferenceError, Result};

/// Default partition for commercial AWS regions
pub const DEFAULT_PARTITION: &str = "aws";

fn region_pattern() -> Result<&'static Regex> {
    static PATTERN: OnceLock<std::result::Result<Regex, regex::Error>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[a-z]{2}(-[a-z]+)+-\d+$"))
        .as_ref()
        .map_err(|e| InferenceError::invalid_context(format!("region pattern: {}", e)))
}

/// Deployment target used when synthesizing ARNs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwsContext {
    partition: String,
    region: String,
    account: String,
}

impl AwsContext {
    /// Create a validated context.
    ///
    /// Wildcards are rejected: a `*` region or account would silently widen every
    /// synthesized ARN.
    pub fn new(
        partition: impl Into<String>,
        region: impl Into<String>,
        account: impl Into<String>,
    ) -> Result<Self> {
        let partition = partition.into();
        let region = region.into();
        let account = account.into();

        if partition.is_empty() || !partition.chars().all(|c| c.is_ascii_lowercase() || c == '-')
        {
            return Err(InferenceError::invalid_context(format!(
                "partition '{}' is not a valid AWS partition",
                partition
            )));
        }
        if !region_pattern()?.is_match(&region) {
            return Err(InferenceError::invalid_context(format!(
                "region '{}' is not a valid AWS region",
                region
            )));
        }
        if account.len() != 12 || !account.chars().all(|c| c.is_ascii_digit()) {
            return Err(InferenceError::invalid_context(format!(
                "account '{}' must be a 12-digit AWS account id",
                account
            )));
        }

        Ok(Self {
            partition,
            region,
            account,
        })
    }

    pub fn partition(&self) -> &str {
        &self.partition
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn account(&self) -> &str {
        &self.account
    }
}

/// Switches consumed by the caller before invoking the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InferenceSettings {
    /// When false the caller skips inference entirely. Enabled by default.
    pub infer_iam_policies: bool,
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            infer_iam_policies: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_valid_context() {
        let ctx = AwsContext::new("aws", "us-east-1", "111111111111").unwrap();
        assert_eq!(ctx.partition(), "aws");
        assert_eq!(ctx.region(), "us-east-1");
        assert_eq!(ctx.account(), "111111111111");

        assert!(AwsContext::new("aws-cn", "cn-northwest-1", "222222222222").is_ok());
        assert!(AwsContext::new("aws-us-gov", "us-gov-west-1", "333333333333").is_ok());
    }

    #[rstest]
    #[case("", "us-east-1", "111111111111")]
    #[case("*", "us-east-1", "111111111111")]
    #[case("aws", "*", "111111111111")]
    #[case("aws", "useast1", "111111111111")]
    #[case("aws", "us-east-1", "*")]
    #[case("aws", "us-east-1", "12345")]
    #[case("aws", "us-east-1", "12345678901a")]
    fn test_invalid_context(#[case] partition: &str, #[case] region: &str, #[case] account: &str) {
        let result = AwsContext::new(partition, region, account);
        assert!(
            matches!(result, Err(InferenceError::InvalidContext { .. })),
            "expected InvalidContext for ({partition}, {region}, {account}), got {result:?}"
        );
    }

    #[test]
    fn test_region_pattern() {
        let pattern = region_pattern().unwrap();
        assert!(pattern.is_match("eu-central-1"));
        assert!(pattern.is_match("us-gov-west-1"));
        assert!(!pattern.is_match("eu-central"));
        assert!(!pattern.is_match("EU-CENTRAL-1"));
    }

    #[test]
    fn test_inference_enabled_by_default() {
        assert!(InferenceSettings::default().infer_iam_policies);
    }
}
