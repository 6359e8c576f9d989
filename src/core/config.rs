//! Session configuration for the execution driver
//!
//! Credentials and data transfer belong to external collaborators; the core
//! only carries an explicit configuration object with caller identity and
//! run-level settings, scoped to one driver instance.

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_max_concurrency() -> usize {
    4
}

/// Configuration passed into the execution driver at construction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Caller identity handed to the execution backend
    pub role: String,

    /// Root URI under which steps produce their artifacts
    pub artifact_root: String,

    /// Location of the default input dataset, used by callers as a
    /// parameter default
    #[serde(default)]
    pub input_data: Option<String>,

    /// Maximum number of steps dispatched concurrently
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

impl SessionConfig {
    pub fn new(role: impl Into<String>, artifact_root: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            artifact_root: artifact_root.into(),
            input_data: None,
            max_concurrency: default_max_concurrency(),
        }
    }

    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max.max(1);
        self
    }

    /// Parse a session configuration from YAML
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| PipelineError::Config(e.to_string()))
    }

    /// Load a session configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&contents)
    }
}
