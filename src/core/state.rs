//! Run state - the single source of truth for one pipeline execution

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::warn;
use uuid::Uuid;

/// Overall status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// Run has not started
    Pending,
    /// Run is in progress
    Running,
    /// Every dispatchable step reached `Succeeded` or `Skipped`
    Completed,
    /// At least one step failed
    Failed,
    /// Run was cancelled before all steps dispatched
    Cancelled,
}

/// Terminal and in-flight states of a single step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepStatus {
    /// Waiting on dependencies
    Pending,
    /// Dispatched to the execution backend
    Running,
    /// Backend reported success; outputs are recorded
    Succeeded,
    /// Backend reported failure
    Failed,
    /// Not selected by a conditional branch; produces no outputs
    Skipped,
    /// An upstream step failed, so this step can never dispatch
    Blocked,
    /// Run was cancelled before this step dispatched
    Cancelled,
}

impl StepStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StepStatus::Pending | StepStatus::Running)
    }
}

/// Recorded state of one step within a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub status: StepStatus,

    /// Produced output locations, by logical output name
    pub outputs: BTreeMap<String, String>,

    /// Parsed property-file documents, by property file name
    pub documents: BTreeMap<String, serde_json::Value>,

    /// Failure, skip, or block reason
    pub reason: Option<String>,

    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl StepRecord {
    fn pending() -> Self {
        Self {
            status: StepStatus::Pending,
            outputs: BTreeMap::new(),
            documents: BTreeMap::new(),
            reason: None,
            started_at: None,
            finished_at: None,
        }
    }
}

/// Mutable record of a single execution
///
/// One slot per step; each slot is written to a terminal state exactly once.
/// Consumers read a slot only after the dependency edge that orders them
/// behind the producer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunState {
    pub execution_id: Uuid,
    pub pipeline: String,
    pub status: RunStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    records: HashMap<String, StepRecord>,
    order: Vec<String>,
}

impl RunState {
    /// Create run state with a pending slot for every step, in declaration order
    pub fn new(pipeline: impl Into<String>, steps: impl IntoIterator<Item = String>) -> Self {
        let order: Vec<String> = steps.into_iter().collect();
        let records = order
            .iter()
            .map(|name| (name.clone(), StepRecord::pending()))
            .collect();
        Self {
            execution_id: Uuid::new_v4(),
            pipeline: pipeline.into(),
            status: RunStatus::Pending,
            started_at: None,
            finished_at: None,
            records,
            order,
        }
    }

    pub fn record(&self, step: &str) -> Option<&StepRecord> {
        self.records.get(step)
    }

    pub fn status_of(&self, step: &str) -> Option<StepStatus> {
        self.records.get(step).map(|r| r.status)
    }

    /// Step names in declaration order
    pub fn step_names(&self) -> &[String] {
        &self.order
    }

    pub fn start(&mut self) {
        self.status = RunStatus::Running;
        self.started_at = Some(Utc::now());
    }

    pub fn finish(&mut self, status: RunStatus) {
        self.status = status;
        self.finished_at = Some(Utc::now());
    }

    pub fn mark_running(&mut self, step: &str) {
        self.transition(step, StepStatus::Running, None);
        if let Some(record) = self.records.get_mut(step) {
            record.started_at = Some(Utc::now());
        }
    }

    pub fn mark_succeeded(
        &mut self,
        step: &str,
        outputs: BTreeMap<String, String>,
        documents: BTreeMap<String, serde_json::Value>,
    ) {
        if self.transition(step, StepStatus::Succeeded, None) {
            if let Some(record) = self.records.get_mut(step) {
                record.outputs = outputs;
                record.documents = documents;
                record.finished_at = Some(Utc::now());
            }
        }
    }

    pub fn mark_failed(&mut self, step: &str, reason: impl Into<String>) {
        if self.transition(step, StepStatus::Failed, Some(reason.into())) {
            if let Some(record) = self.records.get_mut(step) {
                record.finished_at = Some(Utc::now());
            }
        }
    }

    pub fn mark_skipped(&mut self, step: &str, reason: impl Into<String>) {
        self.transition(step, StepStatus::Skipped, Some(reason.into()));
    }

    pub fn mark_blocked(&mut self, step: &str, reason: impl Into<String>) {
        self.transition(step, StepStatus::Blocked, Some(reason.into()));
    }

    pub fn mark_cancelled(&mut self, step: &str) {
        self.transition(step, StepStatus::Cancelled, None);
    }

    /// Apply a transition; a slot already in a terminal state is never rewritten
    fn transition(&mut self, step: &str, status: StepStatus, reason: Option<String>) -> bool {
        match self.records.get_mut(step) {
            Some(record) if !record.status.is_terminal() => {
                record.status = status;
                record.reason = reason;
                true
            }
            Some(record) => {
                warn!(
                    step,
                    current = ?record.status,
                    attempted = ?status,
                    "ignoring transition on terminal step"
                );
                false
            }
            None => {
                warn!(step, "transition on unknown step");
                false
            }
        }
    }

    /// Name of the first failed step in declaration order, if any
    pub fn failure_origin(&self) -> Option<&str> {
        self.order
            .iter()
            .find(|name| self.status_of(name) == Some(StepStatus::Failed))
            .map(|s| s.as_str())
    }

    /// Snapshot the run into a structured report
    pub fn report(&self) -> RunReport {
        RunReport {
            execution_id: self.execution_id,
            pipeline: self.pipeline.clone(),
            status: self.status,
            failure_origin: self.failure_origin().map(String::from),
            started_at: self.started_at,
            finished_at: self.finished_at,
            steps: self
                .order
                .iter()
                .filter_map(|name| {
                    self.records.get(name).map(|r| StepReport {
                        name: name.clone(),
                        status: r.status,
                        reason: r.reason.clone(),
                        outputs: r.outputs.clone(),
                    })
                })
                .collect(),
        }
    }
}

/// Per-step entry in a [`RunReport`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepReport {
    pub name: String,
    pub status: StepStatus,
    pub reason: Option<String>,
    pub outputs: BTreeMap<String, String>,
}

/// Final, structured description of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub execution_id: Uuid,
    pub pipeline: String,
    pub status: RunStatus,
    pub steps: Vec<StepReport>,
    pub failure_origin: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunReport {
    /// A run succeeded iff every step whose dependencies were satisfied
    /// reached `Succeeded` or `Skipped`
    pub fn is_successful(&self) -> bool {
        self.status == RunStatus::Completed
    }

    pub fn step(&self, name: &str) -> Option<&StepReport> {
        self.steps.iter().find(|s| s.name == name)
    }

    pub fn steps_with_status(&self, status: StepStatus) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|s| s.status == status)
            .map(|s| s.name.as_str())
            .collect()
    }
}
