//! Execution backend abstraction
//!
//! The backend owns everything about actually running a job: provisioning,
//! container runtime, data movement, timeouts. The core hands it a fully
//! materialized request and waits for a terminal outcome.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;

/// A fully materialized unit of work for one step
///
/// Every deferred reference and parameter has been resolved; the payload is
/// self-contained.
#[derive(Debug, Clone, Serialize)]
pub struct StepRequest {
    pub step: String,

    /// Step type name, e.g. `Processing` or `Training`
    pub kind: String,

    /// Caller identity from the session configuration
    pub role: String,

    /// Root URI under which this step should produce artifacts
    pub artifact_root: String,

    /// Kind-specific configuration with resolved input values
    pub configuration: serde_json::Value,
}

/// Terminal result reported by the backend for one step
#[derive(Debug, Clone)]
pub enum StepOutcome {
    Succeeded {
        /// Produced output locations, by logical output name
        outputs: BTreeMap<String, String>,

        /// Parsed property-file documents, by property file name
        documents: BTreeMap<String, serde_json::Value>,
    },
    Failed {
        reason: String,
    },
}

impl StepOutcome {
    pub fn succeeded(outputs: BTreeMap<String, String>) -> Self {
        StepOutcome::Succeeded {
            outputs,
            documents: BTreeMap::new(),
        }
    }

    /// Attach a parsed property-file document to a successful outcome
    pub fn with_document(mut self, name: impl Into<String>, doc: serde_json::Value) -> Self {
        if let StepOutcome::Succeeded { documents, .. } = &mut self {
            documents.insert(name.into(), doc);
        }
        self
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        StepOutcome::Failed {
            reason: reason.into(),
        }
    }
}

/// External execution collaborator
///
/// One opaque call per step; failures are reported in-band as a `Failed`
/// outcome rather than through the error channel.
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    async fn execute(&self, request: StepRequest) -> StepOutcome;
}
