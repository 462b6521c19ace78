// SPDX-License-Identifier: MIT

//! Condition expression parser.
//!
//! Accepts expressions like:
//! - `score >= 70`
//! - `status == 'done'`
//! - `passed == true and attempts < 3`
//! - `not feedback contains 'rewrite'`
//!
//! `or` binds loosest, then `and`, then `not`; comparisons are atoms.

use super::ast::{Cmp, Expr, Literal};
use crate::adk::error::ConfigError;

/// Parse a condition expression string
pub fn parse(input: &str) -> Result<Expr, ConfigError> {
    let expr = input.trim();
    if expr.is_empty() {
        return Err(err(input, "empty expression"));
    }
    parse_or(input, expr)
}

fn err(expr: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::Condition {
        expr: expr.to_string(),
        message: message.into(),
    }
}

fn parse_or(full: &str, input: &str) -> Result<Expr, ConfigError> {
    if let Some(pos) = find_keyword(input, " or ") {
        let left = parse_or(full, &input[..pos])?;
        let right = parse_or(full, &input[pos + 4..])?;
        return Ok(Expr::Or(Box::new(left), Box::new(right)));
    }
    parse_and(full, input)
}

fn parse_and(full: &str, input: &str) -> Result<Expr, ConfigError> {
    if let Some(pos) = find_keyword(input, " and ") {
        let left = parse_and(full, &input[..pos])?;
        let right = parse_and(full, &input[pos + 5..])?;
        return Ok(Expr::And(Box::new(left), Box::new(right)));
    }
    parse_atom(full, input)
}

fn parse_atom(full: &str, input: &str) -> Result<Expr, ConfigError> {
    let input = input.trim();

    match input {
        "true" => return Ok(Expr::Always),
        "false" => return Ok(Expr::Never),
        _ => {}
    }

    if let Some(rest) = input.strip_prefix("not ") {
        return Ok(Expr::Not(Box::new(parse_atom(full, rest)?)));
    }

    parse_comparison(full, input)
}

fn parse_comparison(full: &str, input: &str) -> Result<Expr, ConfigError> {
    // Longest operators first so ">=" is not read as ">"
    const OPERATORS: [(&str, Cmp); 7] = [
        ("!=", Cmp::Ne),
        (">=", Cmp::Ge),
        ("<=", Cmp::Le),
        ("==", Cmp::Eq),
        (">", Cmp::Gt),
        ("<", Cmp::Lt),
        (" contains ", Cmp::Contains),
    ];

    for (symbol, op) in OPERATORS {
        if let Some(pos) = find_keyword(input, symbol) {
            let key = input[..pos].trim();
            if key.is_empty() {
                return Err(err(full, "comparison has no left-hand key"));
            }
            let value = parse_literal(full, input[pos + symbol.len()..].trim())?;
            return Ok(Expr::Cmp {
                key: key.to_string(),
                op,
                value,
            });
        }
    }

    Err(err(full, format!("could not parse '{}'", input.trim())))
}

/// Find `needle` outside of quoted strings
fn find_keyword(input: &str, needle: &str) -> Option<usize> {
    let mut in_string = false;

    for (i, c) in input.char_indices() {
        if c == '\'' || c == '"' {
            in_string = !in_string;
        } else if !in_string && input[i..].starts_with(needle) {
            return Some(i);
        }
    }
    None
}

fn parse_literal(full: &str, input: &str) -> Result<Literal, ConfigError> {
    match input {
        "" => return Err(err(full, "comparison has no right-hand value")),
        "null" => return Ok(Literal::Null),
        "true" => return Ok(Literal::Bool(true)),
        "false" => return Ok(Literal::Bool(false)),
        _ => {}
    }

    let quoted = (input.starts_with('\'') && input.ends_with('\'') && input.len() >= 2)
        || (input.starts_with('"') && input.ends_with('"') && input.len() >= 2);
    if quoted {
        return Ok(Literal::Str(input[1..input.len() - 1].to_string()));
    }

    input
        .parse::<f64>()
        .map(Literal::Num)
        .map_err(|_| err(full, format!("invalid literal '{input}'")))
}
