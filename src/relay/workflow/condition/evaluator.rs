// SPDX-License-Identifier: MIT

//! Condition evaluation against workflow state

use super::ast::{Cmp, Expr, Literal};
use crate::relay::workflow::state::WorkflowState;
use serde_json::Value;

/// Evaluate a condition expression against the current state.
///
/// Missing keys compare equal to `null` and fail every other comparison,
/// so a predicate on a key a node has not yet written is simply false.
pub fn evaluate(expr: &Expr, state: &WorkflowState) -> bool {
    match expr {
        Expr::Always => true,
        Expr::Never => false,
        Expr::Cmp { key, op, value } => compare(state.get_path(key), *op, value),
        Expr::And(left, right) => evaluate(left, state) && evaluate(right, state),
        Expr::Or(left, right) => evaluate(left, state) || evaluate(right, state),
        Expr::Not(inner) => !evaluate(inner, state),
    }
}

fn compare(actual: Option<&Value>, op: Cmp, expected: &Literal) -> bool {
    match op {
        Cmp::Eq => equals(actual, expected),
        Cmp::Ne => !equals(actual, expected),
        Cmp::Gt => numeric(actual, expected, |a, b| a > b),
        Cmp::Ge => numeric(actual, expected, |a, b| a >= b),
        Cmp::Lt => numeric(actual, expected, |a, b| a < b),
        Cmp::Le => numeric(actual, expected, |a, b| a <= b),
        Cmp::Contains => contains(actual, expected),
    }
}

fn equals(actual: Option<&Value>, expected: &Literal) -> bool {
    match (actual, expected) {
        (None, Literal::Null) | (Some(Value::Null), Literal::Null) => true,
        (Some(Value::String(s)), Literal::Str(e)) => s == e,
        (Some(Value::Number(n)), Literal::Num(e)) => {
            n.as_f64().map(|f| (f - e).abs() < f64::EPSILON).unwrap_or(false)
        }
        (Some(Value::Bool(b)), Literal::Bool(e)) => b == e,
        _ => false,
    }
}

fn numeric<F>(actual: Option<&Value>, expected: &Literal, cmp: F) -> bool
where
    F: Fn(f64, f64) -> bool,
{
    match (actual, expected) {
        (Some(Value::Number(n)), Literal::Num(e)) => {
            n.as_f64().map(|f| cmp(f, *e)).unwrap_or(false)
        }
        _ => false,
    }
}

fn contains(actual: Option<&Value>, expected: &Literal) -> bool {
    match (actual, expected) {
        (Some(Value::String(s)), Literal::Str(needle)) => s.contains(needle),
        (Some(Value::Array(arr)), Literal::Str(needle)) => {
            arr.iter().any(|v| v.as_str() == Some(needle.as_str()))
        }
        (Some(Value::Array(arr)), Literal::Num(needle)) => arr.iter().any(|v| {
            v.as_f64()
                .map(|f| (f - needle).abs() < f64::EPSILON)
                .unwrap_or(false)
        }),
        _ => false,
    }
}
