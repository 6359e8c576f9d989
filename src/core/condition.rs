//! Conditions - boolean predicates over resolved values

use crate::core::parameter::ParameterRegistry;
use crate::core::reference::{resolve_value, PipelineValue};
use crate::core::state::RunState;
use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};

/// Comparison operator of a condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionOp {
    LessThanOrEqualTo,
    LessThan,
    GreaterThanOrEqualTo,
    GreaterThan,
    EqualTo,
    NotEqualTo,
}

impl ConditionOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionOp::LessThanOrEqualTo => "LessThanOrEqualTo",
            ConditionOp::LessThan => "LessThan",
            ConditionOp::GreaterThanOrEqualTo => "GreaterThanOrEqualTo",
            ConditionOp::GreaterThan => "GreaterThan",
            ConditionOp::EqualTo => "EqualTo",
            ConditionOp::NotEqualTo => "NotEqualTo",
        }
    }
}

/// A single binary predicate over two operands
///
/// Operands may be literals, parameters, or deferred references; both sides
/// must be resolvable at evaluation time.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub op: ConditionOp,
    pub left: PipelineValue,
    pub right: PipelineValue,
}

impl Condition {
    pub fn new(
        op: ConditionOp,
        left: impl Into<PipelineValue>,
        right: impl Into<PipelineValue>,
    ) -> Self {
        Self {
            op,
            left: left.into(),
            right: right.into(),
        }
    }

    /// Shorthand for the common `left <= right` threshold check
    pub fn less_than_or_equal_to(
        left: impl Into<PipelineValue>,
        right: impl Into<PipelineValue>,
    ) -> Self {
        Self::new(ConditionOp::LessThanOrEqualTo, left, right)
    }

    /// Evaluate against run state; both operands must be resolvable
    pub fn evaluate(&self, params: &ParameterRegistry, run: &RunState) -> Result<bool> {
        let left = resolve_value(&self.left, params, run)?;
        let right = resolve_value(&self.right, params, run)?;
        compare(self.op, &left, &right)
    }
}

fn compare(op: ConditionOp, left: &serde_json::Value, right: &serde_json::Value) -> Result<bool> {
    // Equality works on any matching JSON shape
    match op {
        ConditionOp::EqualTo => return Ok(left == right),
        ConditionOp::NotEqualTo => return Ok(left != right),
        _ => {}
    }

    // Ordering requires both sides numeric or both sides strings
    if let (Some(l), Some(r)) = (left.as_f64(), right.as_f64()) {
        return Ok(apply(op, l.partial_cmp(&r)));
    }
    if let (Some(l), Some(r)) = (left.as_str(), right.as_str()) {
        return Ok(apply(op, Some(l.cmp(r))));
    }

    Err(PipelineError::TypeMismatch {
        context: "condition operands".to_string(),
        expected: "two numbers or two strings".to_string(),
        actual: format!("{} and {}", type_name(left), type_name(right)),
    })
}

fn apply(op: ConditionOp, ordering: Option<std::cmp::Ordering>) -> bool {
    use std::cmp::Ordering::*;
    match (op, ordering) {
        (ConditionOp::LessThanOrEqualTo, Some(Less | Equal)) => true,
        (ConditionOp::LessThan, Some(Less)) => true,
        (ConditionOp::GreaterThanOrEqualTo, Some(Greater | Equal)) => true,
        (ConditionOp::GreaterThan, Some(Greater)) => true,
        _ => false,
    }
}

fn type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
