//! Discriminator-based resolution for flows that tag each field with `<field>Type`

use super::{EnvironmentScope, ExpressionResolver, ResolutionError, ResolvedValue, ValueResolver};

/// The value source a `<field>Type` tag declares
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscriminatorTag {
    /// `str`: the value is the literal text
    Literal,
    /// `env`: the value names an environment variable
    Environment,
    /// `jsonata` / `expr`: the value is an expression
    Expression,
    /// Anything else (`msg`, `flow`, `global`, ...): only known at invocation
    Runtime(String),
}

impl DiscriminatorTag {
    pub fn parse(tag: &str) -> Self {
        match tag {
            "str" => DiscriminatorTag::Literal,
            "env" => DiscriminatorTag::Environment,
            "jsonata" | "expr" => DiscriminatorTag::Expression,
            other => DiscriminatorTag::Runtime(other.to_string()),
        }
    }
}

/// Resolves a field according to its explicit discriminator tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscriminatorResolver {
    tag: DiscriminatorTag,
}

impl DiscriminatorResolver {
    pub fn new(tag: DiscriminatorTag) -> Self {
        Self { tag }
    }
}

impl ValueResolver for DiscriminatorResolver {
    fn resolve_text(
        &self,
        raw: &str,
        scope: &EnvironmentScope,
    ) -> Result<ResolvedValue, ResolutionError> {
        match &self.tag {
            DiscriminatorTag::Literal => Ok(ResolvedValue::Text(raw.to_string())),
            DiscriminatorTag::Environment => {
                let name = raw.trim();
                scope
                    .get(name)
                    .map(|value| ResolvedValue::Text(value.to_string()))
                    .ok_or_else(|| ResolutionError::MissingEnvironmentVariable(name.to_string()))
            }
            DiscriminatorTag::Expression => ExpressionResolver.resolve_text(raw, scope),
            DiscriminatorTag::Runtime(tag) => {
                Err(ResolutionError::UnsupportedValueSource(tag.clone()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn scope() -> EnvironmentScope {
        [("QUEUE_URL", "https://sqs.us-east-1.amazonaws.com/111111111111/jobs")]
            .into_iter()
            .collect()
    }

    #[rstest]
    #[case("str", DiscriminatorTag::Literal)]
    #[case("env", DiscriminatorTag::Environment)]
    #[case("jsonata", DiscriminatorTag::Expression)]
    #[case("expr", DiscriminatorTag::Expression)]
    #[case("msg", DiscriminatorTag::Runtime("msg".to_string()))]
    fn test_parse_tag(#[case] raw: &str, #[case] expected: DiscriminatorTag) {
        assert_eq!(DiscriminatorTag::parse(raw), expected);
    }

    #[test]
    fn test_literal_is_untouched() {
        let resolver = DiscriminatorResolver::new(DiscriminatorTag::Literal);
        assert_eq!(
            resolver.resolve_text("env.QUEUE_URL", &scope()),
            Ok(ResolvedValue::Text("env.QUEUE_URL".to_string()))
        );
    }

    #[test]
    fn test_environment_lookup() {
        let resolver = DiscriminatorResolver::new(DiscriminatorTag::Environment);
        assert_eq!(
            resolver.resolve_text(" QUEUE_URL ", &scope()),
            Ok(ResolvedValue::Text(
                "https://sqs.us-east-1.amazonaws.com/111111111111/jobs".to_string()
            ))
        );
    }

    #[test]
    fn test_missing_environment_variable_is_an_error() {
        let resolver = DiscriminatorResolver::new(DiscriminatorTag::Environment);
        assert_eq!(
            resolver.resolve_text("DEAD_LETTER_URL", &scope()),
            Err(ResolutionError::MissingEnvironmentVariable(
                "DEAD_LETTER_URL".to_string()
            ))
        );
    }

    #[test]
    fn test_expression_tag_delegates() {
        let resolver = DiscriminatorResolver::new(DiscriminatorTag::Expression);
        assert_eq!(
            resolver.resolve_text("env.QUEUE_URL", &scope()),
            Ok(ResolvedValue::Text(
                "https://sqs.us-east-1.amazonaws.com/111111111111/jobs".to_string()
            ))
        );
    }

    #[test]
    fn test_runtime_sources_are_rejected() {
        let resolver = DiscriminatorResolver::new(DiscriminatorTag::Runtime("msg".to_string()));
        assert_eq!(
            resolver.resolve_text("payload.queue", &scope()),
            Err(ResolutionError::UnsupportedValueSource("msg".to_string()))
        );
    }
}
