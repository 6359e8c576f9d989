//! Property files - structured result documents produced by steps

use serde::{Deserialize, Serialize};

/// A named handle to a structured document a step is expected to produce
///
/// The document lands under one of the step's output slots and is queried by
/// dotted/indexed path only after the producing step completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyFile {
    /// Logical name used by references and conditions
    pub name: String,

    /// Output slot the document is written under
    pub output_name: String,

    /// File name within that output location
    pub path: String,
}

impl PropertyFile {
    pub fn new(
        name: impl Into<String>,
        output_name: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            output_name: output_name.into(),
            path: path.into(),
        }
    }
}

/// Navigate a parsed document by a dotted/indexed path expression
///
/// Supports object keys separated by `.` and array indices in brackets, e.g.
/// `regression_metrics.mse.value` or `outputs[0].uri`.
pub fn query_path<'a>(doc: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
    let mut current = doc;
    for segment in path.split('.') {
        let (key, indices) = split_indices(segment)?;
        if !key.is_empty() {
            current = current.as_object()?.get(key)?;
        }
        for idx in indices {
            current = current.as_array()?.get(idx)?;
        }
    }
    Some(current)
}

/// Split `outputs[0][1]` into `("outputs", [0, 1])`; rejects malformed brackets
fn split_indices(segment: &str) -> Option<(&str, Vec<usize>)> {
    let key_end = segment.find('[').unwrap_or(segment.len());
    let key = &segment[..key_end];
    let mut indices = Vec::new();
    let mut rest = &segment[key_end..];
    while !rest.is_empty() {
        let inner = rest.strip_prefix('[')?;
        let close = inner.find(']')?;
        indices.push(inner[..close].parse().ok()?);
        rest = &inner[close + 1..];
    }
    Some((key, indices))
}
