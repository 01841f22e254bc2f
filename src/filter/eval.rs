//! Built-in comparison evaluator
//!
//! Handles the common rule predicates without pulling in the host's
//! expression engine:
//!
//! - `@field == literal` / `!=` / `<` / `<=` / `>` / `>=`
//! - bare `@field` (truthy test: present, non-null, non-zero, non-empty)
//!
//! Literals are bare numbers, single- or double-quoted strings, `true`,
//! `false`, or unquoted words (treated as strings). Comparison against a
//! field of a different type is an eval error, which the matcher treats
//! as non-match.

use std::sync::Arc;

use serde_json::Value;

use super::errors::{FilterError, FilterResult};
use super::{FieldAccessor, FilterEvaluator, FilterPredicate};

/// Comparison operator in a parsed predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    fn from_token(tok: &str) -> Option<Self> {
        match tok {
            "==" | "=" => Some(CmpOp::Eq),
            "!=" => Some(CmpOp::Ne),
            "<" => Some(CmpOp::Lt),
            "<=" => Some(CmpOp::Le),
            ">" => Some(CmpOp::Gt),
            ">=" => Some(CmpOp::Ge),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
enum Literal {
    Number(f64),
    Text(String),
    Bool(bool),
}

#[derive(Debug)]
struct ComparisonPredicate {
    source: String,
    field: String,
    /// `None` means bare `@field` truth test.
    cmp: Option<(CmpOp, Literal)>,
}

/// Zero-configuration evaluator for single-comparison predicates.
#[derive(Debug, Default)]
pub struct ComparisonEvaluator;

impl ComparisonEvaluator {
    pub fn new() -> Self {
        ComparisonEvaluator
    }
}

impl FilterEvaluator for ComparisonEvaluator {
    fn parse(&self, expr: &str) -> FilterResult<Arc<dyn FilterPredicate>> {
        let tokens = tokenize(expr)?;
        let field = match tokens.first() {
            Some(tok) if tok.starts_with('@') && tok.len() > 1 => tok[1..].to_string(),
            _ => {
                return Err(FilterError::Parse(format!(
                    "expected @field at start of `{}`",
                    expr
                )))
            }
        };

        let cmp = match tokens.len() {
            1 => None,
            3 => {
                let op = CmpOp::from_token(&tokens[1]).ok_or_else(|| {
                    FilterError::Parse(format!("unknown operator `{}`", tokens[1]))
                })?;
                Some((op, parse_literal(&tokens[2])))
            }
            _ => {
                return Err(FilterError::Parse(format!(
                    "expected `@field` or `@field OP literal`, got `{}`",
                    expr
                )))
            }
        };

        Ok(Arc::new(ComparisonPredicate {
            source: expr.to_string(),
            field,
            cmp,
        }))
    }
}

impl FilterPredicate for ComparisonPredicate {
    fn source(&self) -> &str {
        &self.source
    }

    fn evaluate(&self, fields: &mut dyn FieldAccessor) -> FilterResult<bool> {
        let value = fields.field(&self.field);
        match &self.cmp {
            None => Ok(value.map(truthy).unwrap_or(false)),
            Some((op, literal)) => {
                let value = match value {
                    Some(v) => v,
                    // Absent field never satisfies a comparison.
                    None => return Ok(false),
                };
                compare(&value, *op, literal)
            }
        }
    }
}

fn truthy(v: Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn compare(value: &Value, op: CmpOp, literal: &Literal) -> FilterResult<bool> {
    match (value, literal) {
        (Value::Number(n), Literal::Number(rhs)) => {
            let lhs = n
                .as_f64()
                .ok_or_else(|| FilterError::Eval("non-finite number".to_string()))?;
            Ok(apply(lhs.partial_cmp(rhs), op, lhs == *rhs))
        }
        (Value::String(s), Literal::Text(rhs)) => {
            Ok(apply(s.as_str().partial_cmp(rhs.as_str()), op, s == rhs))
        }
        (Value::Bool(b), Literal::Bool(rhs)) => match op {
            CmpOp::Eq => Ok(b == rhs),
            CmpOp::Ne => Ok(b != rhs),
            _ => Err(FilterError::Eval("ordering on boolean".to_string())),
        },
        // Hash-stored records deliver every field as a string.
        (Value::String(s), Literal::Number(rhs)) => match s.parse::<f64>() {
            Ok(lhs) => Ok(apply(lhs.partial_cmp(rhs), op, lhs == *rhs)),
            Err(_) => Err(FilterError::Eval(format!(
                "cannot compare string `{}` with number",
                s
            ))),
        },
        _ => Err(FilterError::Eval("type mismatch in comparison".to_string())),
    }
}

fn apply(ord: Option<std::cmp::Ordering>, op: CmpOp, eq: bool) -> bool {
    use std::cmp::Ordering::*;
    match op {
        CmpOp::Eq => eq,
        CmpOp::Ne => !eq,
        CmpOp::Lt => ord == Some(Less),
        CmpOp::Le => matches!(ord, Some(Less) | Some(Equal)),
        CmpOp::Gt => ord == Some(Greater),
        CmpOp::Ge => matches!(ord, Some(Greater) | Some(Equal)),
    }
}

fn parse_literal(tok: &str) -> Literal {
    if let Ok(n) = tok.parse::<f64>() {
        return Literal::Number(n);
    }
    match tok {
        "true" => Literal::Bool(true),
        "false" => Literal::Bool(false),
        _ => Literal::Text(tok.to_string()),
    }
}

/// Splits an expression into at most three tokens: field, operator,
/// literal. Quoted literals keep embedded whitespace.
fn tokenize(expr: &str) -> FilterResult<Vec<String>> {
    let mut tokens = Vec::new();
    let mut chars = expr.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        if c == '\'' || c == '"' {
            let quote = c;
            chars.next();
            let mut s = String::new();
            loop {
                match chars.next() {
                    Some(ch) if ch == quote => break,
                    Some(ch) => s.push(ch),
                    None => {
                        return Err(FilterError::Parse(format!(
                            "unterminated string in `{}`",
                            expr
                        )))
                    }
                }
            }
            tokens.push(s);
        } else if matches!(c, '=' | '!' | '<' | '>') {
            let mut op = String::new();
            while let Some(&ch) = chars.peek() {
                if matches!(ch, '=' | '!' | '<' | '>') {
                    op.push(ch);
                    chars.next();
                } else {
                    break;
                }
            }
            tokens.push(op);
        } else {
            let mut word = String::new();
            while let Some(&ch) = chars.peek() {
                if ch.is_whitespace() || matches!(ch, '=' | '!' | '<' | '>') {
                    break;
                }
                word.push(ch);
                chars.next();
            }
            tokens.push(word);
        }
    }

    if tokens.is_empty() {
        return Err(FilterError::Parse("empty filter expression".to_string()));
    }
    Ok(tokens)
}
