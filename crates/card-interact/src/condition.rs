//! Condition evaluation for interaction rules
//!
//! Comparisons are string-coerced for (in)equality and numeric-coerced for
//! ordering, matching how panel-authored conditions behave against mixed
//! telemetry payloads. A condition that cannot be evaluated is false — the
//! rule is inert, never an error.

use crate::expr;
use card_config::{ComparisonOperator, Condition};
use serde_json::Value;
use tracing::warn;

/// Evaluate an optional condition against the triggering value
///
/// `None` always passes.
#[must_use]
pub fn evaluate(condition: Option<&Condition>, value: &Value) -> bool {
    let Some(condition) = condition else {
        return true;
    };

    match condition {
        Condition::Comparison { operator, value: constant } => {
            compare(*operator, value, constant)
        }
        Condition::Range { range } => in_range(range, value),
        Condition::Expression { expression } => match expr::evaluate(expression, value) {
            Ok(result) => result,
            Err(err) => {
                warn!(expression = %expression, error = %err, "expression condition failed; treating as false");
                false
            }
        },
    }
}

fn compare(operator: ComparisonOperator, left: &Value, right: &Value) -> bool {
    match operator {
        ComparisonOperator::Equals => text(left) == text(right),
        ComparisonOperator::NotEquals => text(left) != text(right),
        ComparisonOperator::GreaterThan => match (number(left), number(right)) {
            (Some(l), Some(r)) => l > r,
            _ => false,
        },
        ComparisonOperator::LessThan => match (number(left), number(right)) {
            (Some(l), Some(r)) => l < r,
            _ => false,
        },
        ComparisonOperator::Contains => text(left).contains(&text(right)),
    }
}

fn in_range(range: &str, value: &Value) -> bool {
    let Some(candidate) = number(value) else {
        return false;
    };
    let Some((min, max)) = parse_range(range) else {
        warn!(range, "malformed range condition; treating as false");
        return false;
    };
    (min..=max).contains(&candidate)
}

/// Parse the `"min-max"` interval convention
fn parse_range(range: &str) -> Option<(f64, f64)> {
    let (min, max) = range.split_once('-')?;
    let min: f64 = min.trim().parse().ok()?;
    let max: f64 = max.trim().parse().ok()?;
    (min <= max).then_some((min, max))
}

/// String coercion: bare strings, everything else in compact JSON form
fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Numeric coercion: numbers, numeric strings, booleans as 0/1
fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}
