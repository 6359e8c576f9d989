//! Step domain model
//!
//! A step is a named unit of declared work. The step set is closed and
//! small, so kinds are a tagged enum dispatched by pattern matching rather
//! than a trait hierarchy.

use crate::core::condition::Condition;
use crate::core::property::PropertyFile;
use crate::core::reference::PipelineValue;
use std::collections::BTreeMap;
use std::collections::BTreeSet;

/// A named input channel of a step
#[derive(Debug, Clone, PartialEq)]
pub struct StepInput {
    pub name: String,
    pub value: PipelineValue,
}

impl StepInput {
    pub fn new(name: impl Into<String>, value: impl Into<PipelineValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A declared output slot
///
/// The slot exists from step creation; its produced URI is unknown until the
/// owning step has actually run.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSlot {
    /// Logical name referenced by downstream steps
    pub name: String,

    /// Container-local path the job writes to
    pub source: String,
}

impl OutputSlot {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }
}

/// Configuration of a data processing job
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingJob {
    pub image_uri: String,
    pub instance_type: String,
    pub instance_count: PipelineValue,
    pub code: String,
    pub inputs: Vec<StepInput>,
    pub outputs: Vec<OutputSlot>,
}

/// Configuration of a model training job
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingJob {
    pub image_uri: String,
    pub instance_type: String,
    pub instance_count: PipelineValue,
    pub output_path: String,
    pub hyperparameters: BTreeMap<String, String>,
    pub channels: Vec<StepInput>,
}

impl TrainingJob {
    /// Logical name of the produced model artifact
    pub const MODEL_OUTPUT: &'static str = "model";
}

/// A conditional step: one branch is scheduled per run, the other is skipped
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalBranch {
    pub condition: Condition,
    pub if_steps: Vec<String>,
    pub else_steps: Vec<String>,
}

/// Configuration of a model registration step
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRegistration {
    pub model_data: PipelineValue,
    pub approval_status: PipelineValue,
    pub package_group: String,
    pub metrics_source: Option<PipelineValue>,
    pub content_types: Vec<String>,
    pub response_types: Vec<String>,
    pub inference_instance_types: Vec<String>,
    pub transform_instance_types: Vec<String>,
}

/// Kind-specific payload of a step
#[derive(Debug, Clone, PartialEq)]
pub enum StepKind {
    Processing(ProcessingJob),
    Training(TrainingJob),
    Conditional(ConditionalBranch),
    Register(ModelRegistration),
}

impl StepKind {
    /// Type name used in compiled definitions and backend requests
    pub fn type_name(&self) -> &'static str {
        match self {
            StepKind::Processing(_) => "Processing",
            StepKind::Training(_) => "Training",
            StepKind::Conditional(_) => "Condition",
            StepKind::Register(_) => "RegisterModel",
        }
    }
}

/// A single step in a pipeline graph
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    /// Unique name; the step's identity within the graph
    pub name: String,

    pub kind: StepKind,

    /// Explicit ordering constraints, in addition to inferred edges
    pub depends_on: Vec<String>,

    /// Structured result documents this step is expected to produce
    pub property_files: Vec<PropertyFile>,
}

impl Step {
    pub fn processing(name: impl Into<String>, job: ProcessingJob) -> Self {
        Self::new(name, StepKind::Processing(job))
    }

    pub fn training(name: impl Into<String>, job: TrainingJob) -> Self {
        Self::new(name, StepKind::Training(job))
    }

    pub fn conditional(name: impl Into<String>, branch: ConditionalBranch) -> Self {
        Self::new(name, StepKind::Conditional(branch))
    }

    pub fn register(name: impl Into<String>, registration: ModelRegistration) -> Self {
        Self::new(name, StepKind::Register(registration))
    }

    fn new(name: impl Into<String>, kind: StepKind) -> Self {
        Self {
            name: name.into(),
            kind,
            depends_on: Vec::new(),
            property_files: Vec::new(),
        }
    }

    pub fn with_depends_on(mut self, steps: impl IntoIterator<Item = String>) -> Self {
        self.depends_on.extend(steps);
        self
    }

    pub fn with_property_file(mut self, file: PropertyFile) -> Self {
        self.property_files.push(file);
        self
    }

    /// All pipeline values consumed by this step, including job settings
    pub fn input_values(&self) -> Vec<&PipelineValue> {
        match &self.kind {
            StepKind::Processing(job) => {
                let mut values = vec![&job.instance_count];
                values.extend(job.inputs.iter().map(|i| &i.value));
                values
            }
            StepKind::Training(job) => {
                let mut values = vec![&job.instance_count];
                values.extend(job.channels.iter().map(|c| &c.value));
                values
            }
            StepKind::Conditional(branch) => {
                vec![&branch.condition.left, &branch.condition.right]
            }
            StepKind::Register(reg) => {
                let mut values = vec![&reg.model_data, &reg.approval_status];
                if let Some(metrics) = &reg.metrics_source {
                    values.push(metrics);
                }
                values
            }
        }
    }

    /// Steps this one depends on through deferred references
    pub fn referenced_steps(&self) -> BTreeSet<&str> {
        self.input_values()
            .into_iter()
            .filter_map(|v| v.referenced_step())
            .collect()
    }

    /// Declared output slot names
    pub fn output_names(&self) -> Vec<&str> {
        match &self.kind {
            StepKind::Processing(job) => job.outputs.iter().map(|o| o.name.as_str()).collect(),
            StepKind::Training(_) => vec![TrainingJob::MODEL_OUTPUT],
            StepKind::Conditional(_) | StepKind::Register(_) => Vec::new(),
        }
    }

    pub fn declares_output(&self, name: &str) -> bool {
        self.output_names().contains(&name)
    }

    pub fn property_file(&self, name: &str) -> Option<&PropertyFile> {
        self.property_files.iter().find(|f| f.name == name)
    }
}
