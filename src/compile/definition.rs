//! The compiled pipeline definition document
//!
//! A pure data snapshot of a graph plus its parameters: versioned,
//! immutable once emitted, and deterministic so that identical graphs
//! compile to byte-identical JSON.

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};

/// Schema version stamped on every emitted definition
pub const SCHEMA_VERSION: &str = "2020-12-01";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PipelineDefinition {
    pub version: String,
    pub pipeline_name: String,
    pub parameters: Vec<ParameterDefinition>,
    pub steps: Vec<StepDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ParameterDefinition {
    pub name: String,
    #[serde(rename = "Type")]
    pub kind: String,
    pub default_value: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StepDefinition {
    pub name: String,
    #[serde(rename = "Type")]
    pub step_type: String,

    /// Kind-specific payload; deferred inputs appear as `{"Get": …}`
    /// symbolic pointers, never concrete values
    pub arguments: serde_json::Value,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub property_files: Vec<PropertyFileDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PropertyFileDefinition {
    pub name: String,
    pub output_name: String,
    pub file_path: String,
}

impl PipelineDefinition {
    /// Serialize to the canonical JSON form
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| PipelineError::Definition(e.to_string()))
    }

    /// Parse a previously emitted definition
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| PipelineError::Definition(e.to_string()))
    }
}
