//! Pipeline domain model

use crate::compile::{self, PipelineDefinition};
use crate::core::graph::StepGraph;
use crate::core::parameter::ParameterRegistry;
use crate::error::Result;

/// A named pipeline: declared parameters plus the step graph
///
/// Frozen once constructed; compilation and execution never mutate it.
#[derive(Debug, Clone)]
pub struct Pipeline {
    pub name: String,
    pub parameters: ParameterRegistry,
    pub graph: StepGraph,
}

impl Pipeline {
    pub fn new(
        name: impl Into<String>,
        parameters: ParameterRegistry,
        graph: StepGraph,
    ) -> Self {
        Self {
            name: name.into(),
            parameters,
            graph,
        }
    }

    /// Compile into the portable declarative definition
    pub fn definition(&self) -> Result<PipelineDefinition> {
        compile::compile(self)
    }
}
