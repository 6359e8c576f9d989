//! mlpipeline - a pipeline definition and execution engine for ML workflows
//!
//! Build a graph of typed steps whose inputs may point at outputs that do
//! not exist yet, compile it into a portable declarative definition, and
//! execute it against a pluggable backend:
//!
//! build graph -> compile -> execute -> structured run report

pub mod compile;
pub mod core;
pub mod error;
pub mod execution;

// Re-export commonly used types
pub use compile::{compile, PipelineDefinition, SCHEMA_VERSION};
pub use core::{
    Condition, ConditionOp, ConditionalBranch, ModelRegistration, OutputSlot, Parameter,
    ParameterKind, ParameterRegistry, ParameterValue, Pipeline, PipelineValue, ProcessingJob,
    PropertyFile, PropertyReference, RunReport, RunState, RunStatus, SessionConfig, Step,
    StepGraph, StepInput, StepKind, StepStatus, TrainingJob,
};
pub use error::{PipelineError, Result, ValidationError};
pub use execution::{
    CancelFlag, ExecutionBackend, ExecutionDriver, RunEvent, StepOutcome, StepRequest,
};
