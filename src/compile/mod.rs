//! Compilation of a step graph into a declarative definition

pub mod compiler;
pub mod definition;

pub use compiler::compile;
pub use definition::{
    ParameterDefinition, PipelineDefinition, PropertyFileDefinition, StepDefinition,
    SCHEMA_VERSION,
};
