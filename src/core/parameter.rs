//! Pipeline parameters - named, typed, default-valued run-time inputs

use crate::error::{PipelineError, Result, ValidationError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The type of a pipeline parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParameterKind {
    Integer,
    Float,
    String,
}

impl ParameterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterKind::Integer => "Integer",
            ParameterKind::Float => "Float",
            ParameterKind::String => "String",
        }
    }
}

/// A concrete parameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Integer(i64),
    Float(f64),
    String(String),
}

impl ParameterValue {
    pub fn kind(&self) -> ParameterKind {
        match self {
            ParameterValue::Integer(_) => ParameterKind::Integer,
            ParameterValue::Float(_) => ParameterKind::Float,
            ParameterValue::String(_) => ParameterKind::String,
        }
    }

    /// Render as a JSON value for requests and compiled definitions
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            ParameterValue::Integer(i) => serde_json::Value::from(*i),
            ParameterValue::Float(f) => serde_json::Value::from(*f),
            ParameterValue::String(s) => serde_json::Value::from(s.clone()),
        }
    }
}

impl From<i64> for ParameterValue {
    fn from(v: i64) -> Self {
        ParameterValue::Integer(v)
    }
}

impl From<f64> for ParameterValue {
    fn from(v: f64) -> Self {
        ParameterValue::Float(v)
    }
}

impl From<&str> for ParameterValue {
    fn from(v: &str) -> Self {
        ParameterValue::String(v.to_string())
    }
}

impl From<String> for ParameterValue {
    fn from(v: String) -> Self {
        ParameterValue::String(v)
    }
}

/// A declared parameter: name, kind, and the default used when unbound
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub kind: ParameterKind,
    pub default: ParameterValue,
}

/// Registry of pipeline parameters
///
/// Declarations are frozen with the graph; bindings are applied per run and
/// never mutate the declared defaults.
#[derive(Debug, Clone, Default)]
pub struct ParameterRegistry {
    declared: Vec<Parameter>,
    index: HashMap<String, usize>,
    bindings: HashMap<String, ParameterValue>,
}

impl ParameterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a parameter with its kind and default value
    pub fn declare(
        &mut self,
        name: impl Into<String>,
        kind: ParameterKind,
        default: impl Into<ParameterValue>,
    ) -> Result<()> {
        let name = name.into();
        let default = default.into();
        if self.index.contains_key(&name) {
            return Err(ValidationError::DuplicateParameter { name }.into());
        }
        if default.kind() != kind {
            return Err(PipelineError::TypeMismatch {
                context: format!("default of parameter '{}'", name),
                expected: kind.as_str().to_string(),
                actual: default.kind().as_str().to_string(),
            });
        }
        self.index.insert(name.clone(), self.declared.len());
        self.declared.push(Parameter {
            name,
            kind,
            default,
        });
        Ok(())
    }

    /// Bind a run-time value to a declared parameter
    pub fn bind(&mut self, name: &str, value: impl Into<ParameterValue>) -> Result<()> {
        let value = value.into();
        let param = self
            .index
            .get(name)
            .map(|i| &self.declared[*i])
            .ok_or_else(|| ValidationError::UnknownParameter {
                name: name.to_string(),
            })?;
        if value.kind() != param.kind {
            return Err(PipelineError::TypeMismatch {
                context: format!("parameter '{}'", name),
                expected: param.kind.as_str().to_string(),
                actual: value.kind().as_str().to_string(),
            });
        }
        self.bindings.insert(name.to_string(), value);
        Ok(())
    }

    /// Resolve a parameter to its bound value, or the default if unbound
    pub fn resolve(&self, name: &str) -> Result<&ParameterValue> {
        if let Some(bound) = self.bindings.get(name) {
            return Ok(bound);
        }
        self.index
            .get(name)
            .map(|i| &self.declared[*i].default)
            .ok_or_else(|| {
                ValidationError::UnknownParameter {
                    name: name.to_string(),
                }
                .into()
            })
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Declared parameters in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.declared.iter()
    }

    /// Clone the registry and apply a set of run-time bindings
    pub fn with_bindings<I, V>(&self, bindings: I) -> Result<ParameterRegistry>
    where
        I: IntoIterator<Item = (String, V)>,
        V: Into<ParameterValue>,
    {
        let mut bound = self.clone();
        for (name, value) in bindings {
            bound.bind(&name, value)?;
        }
        Ok(bound)
    }
}
