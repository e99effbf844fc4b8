//! Expression-first resolution
//!
//! Supports the slice of the flow expression language that can be evaluated before the
//! function runs: string literals, paths into the `env` object, parentheses and `&`
//! concatenation. Everything else is a syntax error, and the caller treats the text as
//! a literal.

use std::iter::Peekable;
use std::str::CharIndices;

use serde_json::{Map, Value};
use thiserror::Error;

use super::{EnvironmentScope, ResolutionError, ResolvedValue, ValueResolver};

/// Name under which the environment is exposed to expressions
const ENV_ROOT: &str = "env";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub(crate) enum ExpressionError {
    #[error("unexpected character '{ch}' at offset {offset}")]
    UnexpectedCharacter { ch: char, offset: usize },
    #[error("unterminated quoted text starting at offset {0}")]
    Unterminated(usize),
    #[error("unexpected {0}")]
    UnexpectedToken(String),
    #[error("unexpected end of expression")]
    UnexpectedEnd,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Text(String),
    Name(String),
    Dot,
    OpenBracket,
    CloseBracket,
    OpenParen,
    CloseParen,
    Ampersand,
}

fn tokenize(source: &str) -> Result<Vec<Token>, ExpressionError> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();

    while let Some(&(offset, ch)) = chars.peek() {
        match ch {
            c if c.is_whitespace() => {
                chars.next();
            }
            '.' => push(&mut chars, &mut tokens, Token::Dot),
            '[' => push(&mut chars, &mut tokens, Token::OpenBracket),
            ']' => push(&mut chars, &mut tokens, Token::CloseBracket),
            '(' => push(&mut chars, &mut tokens, Token::OpenParen),
            ')' => push(&mut chars, &mut tokens, Token::CloseParen),
            '&' => push(&mut chars, &mut tokens, Token::Ampersand),
            '\'' | '"' => {
                chars.next();
                tokens.push(Token::Text(quoted(&mut chars, ch, offset)?));
            }
            '`' => {
                chars.next();
                tokens.push(Token::Name(quoted(&mut chars, '`', offset)?));
            }
            c if c.is_alphanumeric() || c == '_' => {
                let mut name = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if !(c.is_alphanumeric() || c == '_') {
                        break;
                    }
                    name.push(c);
                    chars.next();
                }
                tokens.push(Token::Name(name));
            }
            other => {
                return Err(ExpressionError::UnexpectedCharacter { ch: other, offset });
            }
        }
    }

    log::trace!("Tokenized '{}' into {:?}", source, tokens);
    Ok(tokens)
}

fn push(chars: &mut Peekable<CharIndices<'_>>, tokens: &mut Vec<Token>, token: Token) {
    chars.next();
    tokens.push(token);
}

/// Read up to the closing `delimiter`; a backslash escapes the next character
fn quoted(
    chars: &mut Peekable<CharIndices<'_>>,
    delimiter: char,
    start: usize,
) -> Result<String, ExpressionError> {
    let mut text = String::new();
    while let Some((_, c)) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some((_, escaped)) => text.push(escaped),
                None => break,
            },
            c if c == delimiter => return Ok(text),
            c => text.push(c),
        }
    }
    Err(ExpressionError::Unterminated(start))
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Expr {
    Literal(String),
    Path(Vec<String>),
    Concat(Vec<Expr>),
}

struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    fn parse(tokens: Vec<Token>) -> Result<Expr, ExpressionError> {
        let mut parser = Parser {
            tokens,
            position: 0,
        };
        let expr = parser.concatenation()?;
        match parser.peek() {
            None => Ok(expr),
            Some(token) => Err(ExpressionError::UnexpectedToken(format!("{:?}", token))),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        self.position += 1;
        token
    }

    fn concatenation(&mut self) -> Result<Expr, ExpressionError> {
        let mut parts = vec![self.term()?];
        while self.peek() == Some(&Token::Ampersand) {
            self.next();
            parts.push(self.term()?);
        }
        Ok(if parts.len() == 1 {
            parts.remove(0)
        } else {
            Expr::Concat(parts)
        })
    }

    fn term(&mut self) -> Result<Expr, ExpressionError> {
        match self.next() {
            Some(Token::Text(text)) => Ok(Expr::Literal(text)),
            Some(Token::Name(name)) => self.path(name),
            Some(Token::OpenParen) => {
                let inner = self.concatenation()?;
                match self.next() {
                    Some(Token::CloseParen) => Ok(inner),
                    Some(token) => Err(ExpressionError::UnexpectedToken(format!("{:?}", token))),
                    None => Err(ExpressionError::UnexpectedEnd),
                }
            }
            Some(token) => Err(ExpressionError::UnexpectedToken(format!("{:?}", token))),
            None => Err(ExpressionError::UnexpectedEnd),
        }
    }

    fn path(&mut self, first: String) -> Result<Expr, ExpressionError> {
        let mut segments = vec![first];
        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.next();
                    match self.next() {
                        Some(Token::Name(name)) => segments.push(name),
                        Some(token) => {
                            return Err(ExpressionError::UnexpectedToken(format!("{:?}", token)))
                        }
                        None => return Err(ExpressionError::UnexpectedEnd),
                    }
                }
                Some(Token::OpenBracket) => {
                    self.next();
                    let key = match self.next() {
                        Some(Token::Text(key)) => key,
                        Some(token) => {
                            return Err(ExpressionError::UnexpectedToken(format!("{:?}", token)))
                        }
                        None => return Err(ExpressionError::UnexpectedEnd),
                    };
                    match self.next() {
                        Some(Token::CloseBracket) => segments.push(key),
                        Some(token) => {
                            return Err(ExpressionError::UnexpectedToken(format!("{:?}", token)))
                        }
                        None => return Err(ExpressionError::UnexpectedEnd),
                    }
                }
                _ => return Ok(Expr::Path(segments)),
            }
        }
    }
}

/// Evaluate to `None` when the expression is undefined (e.g. an unknown path)
fn evaluate(expr: &Expr, root: &Value) -> Option<Value> {
    match expr {
        Expr::Literal(text) => Some(Value::String(text.clone())),
        Expr::Path(segments) => segments
            .iter()
            .try_fold(root, |current, segment| current.get(segment.as_str()))
            .cloned(),
        Expr::Concat(parts) => {
            let joined = parts
                .iter()
                .map(|part| match evaluate(part, root) {
                    None | Some(Value::Null) => String::new(),
                    Some(Value::String(text)) => text,
                    Some(other) => other.to_string(),
                })
                .collect::<String>();
            Some(Value::String(joined))
        }
    }
}

/// Parse and evaluate `source` against the environment scope
pub(crate) fn evaluate_expression(
    source: &str,
    scope: &EnvironmentScope,
) -> Result<Option<Value>, ExpressionError> {
    let expr = Parser::parse(tokenize(source)?)?;
    let mut root = Map::new();
    root.insert(ENV_ROOT.to_string(), scope.to_json());
    Ok(evaluate(&expr, &Value::Object(root)))
}

/// Scalar, truthy text for an evaluation result; `None` means "use the literal"
fn usable_text(value: Value) -> Option<String> {
    match value {
        Value::String(text) if !text.is_empty() => Some(text),
        Value::Bool(true) => Some("true".to_string()),
        Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        _ => None,
    }
}

/// Evaluates a field as an expression over `env`, degrading to the raw text
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExpressionResolver;

impl ValueResolver for ExpressionResolver {
    fn resolve_text(
        &self,
        raw: &str,
        scope: &EnvironmentScope,
    ) -> Result<ResolvedValue, ResolutionError> {
        let resolved = match evaluate_expression(raw, scope) {
            Ok(Some(value)) => usable_text(value),
            Ok(None) => None,
            Err(e) => {
                log::debug!("'{}' is not an expression ({}), using it as a literal", raw, e);
                None
            }
        };

        Ok(ResolvedValue::Text(resolved.unwrap_or_else(|| raw.to_string())))
    }
}
