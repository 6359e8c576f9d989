//! Error taxonomy for graph construction, compilation, and execution

use thiserror::Error;

/// Structural errors raised while building or validating a pipeline graph.
///
/// These are always fatal to compilation and are never retried.
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("parameter '{name}' is already declared")]
    DuplicateParameter { name: String },

    #[error("parameter '{name}' is not declared")]
    UnknownParameter { name: String },

    #[error("step '{name}' is already defined in the graph")]
    DuplicateStepName { name: String },

    #[error("dependency cycle: {}", cycle.join(" -> "))]
    CyclicGraph { cycle: Vec<String> },

    #[error("step '{referenced_by}' references unknown target '{target}'")]
    UnknownTarget {
        target: String,
        referenced_by: String,
    },

    #[error("conditional step '{step}' has an empty if branch")]
    EmptyIfBranch { step: String },
}

/// Unified error type for the pipeline engine.
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A reference was resolved before its producing step succeeded.
    ///
    /// In a correctly ordered run this cannot happen: the dependency edge
    /// derived from the reference forces the producer to finish first.
    #[error("output '{target}' of step '{step}' is not resolvable yet")]
    UnresolvedReference { step: String, target: String },

    #[error("path '{path}' not found in property file '{file}' of step '{step}'")]
    PathNotFound {
        step: String,
        file: String,
        path: String,
    },

    #[error("type mismatch for {context}: expected {expected}, got {actual}")]
    TypeMismatch {
        context: String,
        expected: String,
        actual: String,
    },

    #[error("execution backend failed step '{step}': {reason}")]
    Backend { step: String, reason: String },

    #[error("definition serialization error: {0}")]
    Definition(String),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
