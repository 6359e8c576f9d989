//! Lazy references into the eventual outputs of steps
//!
//! A [`PropertyReference`] is a forward pointer: constructing one never
//! touches a live value, and the target only needs to be declared in the
//! same graph. The reference becomes resolvable once the producing step has
//! reached its `Succeeded` terminal state in a run.

use crate::core::state::{RunState, StepStatus};
use crate::error::{PipelineError, Result, ValidationError};
use serde::{Deserialize, Serialize};

/// What a reference points at within the producing step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceTarget {
    /// A named output slot; resolves to the produced URI
    Output(String),

    /// A path into a declared property file; resolves to the value at that path
    PropertyFile { file: String, path: String },
}

/// A lazy, symbolic pointer to the output of another step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyReference {
    pub step: String,
    pub target: ReferenceTarget,
}

impl PropertyReference {
    /// Reference a named output slot of `step`
    pub fn output(step: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            target: ReferenceTarget::Output(name.into()),
        }
    }

    /// Reference a path inside a property file declared by `step`
    pub fn property(
        step: impl Into<String>,
        file: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            step: step.into(),
            target: ReferenceTarget::PropertyFile {
                file: file.into(),
                path: path.into(),
            },
        }
    }

    /// Symbolic form used in compiled definitions
    pub fn symbol(&self) -> String {
        match &self.target {
            ReferenceTarget::Output(name) => {
                format!("Steps.{}.Outputs.{}", self.step, name)
            }
            ReferenceTarget::PropertyFile { file, path } => {
                format!("Steps.{}.PropertyFiles.{}.{}", self.step, file, path)
            }
        }
    }

    /// Resolve against recorded run state
    ///
    /// Fails with `UnresolvedReference` unless the producing step's terminal
    /// state is `Succeeded`, and with `UnknownTarget` if the step or output
    /// was never declared.
    pub fn resolve(&self, run: &RunState) -> Result<serde_json::Value> {
        let record = run.record(&self.step).ok_or_else(|| {
            PipelineError::from(ValidationError::UnknownTarget {
                target: self.step.clone(),
                referenced_by: self.symbol(),
            })
        })?;

        if record.status != StepStatus::Succeeded {
            return Err(PipelineError::UnresolvedReference {
                step: self.step.clone(),
                target: self.symbol(),
            });
        }

        match &self.target {
            ReferenceTarget::Output(name) => record
                .outputs
                .get(name)
                .map(|uri| serde_json::Value::from(uri.clone()))
                .ok_or_else(|| {
                    PipelineError::from(ValidationError::UnknownTarget {
                        target: format!("{}.{}", self.step, name),
                        referenced_by: self.symbol(),
                    })
                }),
            ReferenceTarget::PropertyFile { file, path } => {
                let missing = || PipelineError::PathNotFound {
                    step: self.step.clone(),
                    file: file.clone(),
                    path: path.clone(),
                };
                let doc = record.documents.get(file).ok_or_else(missing)?;
                crate::core::property::query_path(doc, path)
                    .cloned()
                    .ok_or_else(missing)
            }
        }
    }
}

/// A step input: either a literal, a declared parameter, or a deferred
/// pointer into another step's output
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineValue {
    Literal(serde_json::Value),
    Parameter(String),
    Deferred(PropertyReference),
}

impl PipelineValue {
    pub fn literal(value: impl Into<serde_json::Value>) -> Self {
        PipelineValue::Literal(value.into())
    }

    pub fn parameter(name: impl Into<String>) -> Self {
        PipelineValue::Parameter(name.into())
    }

    /// The producing step, when this value defers to one
    pub fn referenced_step(&self) -> Option<&str> {
        match self {
            PipelineValue::Deferred(r) => Some(r.step.as_str()),
            _ => None,
        }
    }
}

impl From<PropertyReference> for PipelineValue {
    fn from(r: PropertyReference) -> Self {
        PipelineValue::Deferred(r)
    }
}

/// Resolve a pipeline value to a concrete JSON value against run state
pub fn resolve_value(
    value: &PipelineValue,
    params: &crate::core::parameter::ParameterRegistry,
    run: &RunState,
) -> Result<serde_json::Value> {
    match value {
        PipelineValue::Literal(v) => Ok(v.clone()),
        PipelineValue::Parameter(name) => Ok(params.resolve(name)?.to_json()),
        PipelineValue::Deferred(r) => r.resolve(run),
    }
}
