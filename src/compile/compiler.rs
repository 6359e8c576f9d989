//! Pipeline compiler - graph to declarative definition
//!
//! Walks the validated graph and materializes every step into a flat,
//! self-contained record. Deferred references stay symbolic so the emitted
//! document is valid before any step has executed.

use crate::compile::definition::{
    ParameterDefinition, PipelineDefinition, PropertyFileDefinition, StepDefinition,
    SCHEMA_VERSION,
};
use crate::core::pipeline::Pipeline;
use crate::core::reference::PipelineValue;
use crate::core::step::{Step, StepKind};
use crate::error::{Result, ValidationError};
use serde_json::json;
use tracing::debug;

/// Compile a pipeline into its declarative definition
///
/// Fails with a validation error if the graph is malformed or a step
/// consumes an undeclared parameter; never partially emits.
pub fn compile(pipeline: &Pipeline) -> Result<PipelineDefinition> {
    pipeline.graph.validate()?;
    check_parameters(pipeline)?;

    let parameters = pipeline
        .parameters
        .iter()
        .map(|p| ParameterDefinition {
            name: p.name.clone(),
            kind: p.kind.as_str().to_string(),
            default_value: p.default.to_json(),
        })
        .collect();

    let steps = pipeline
        .graph
        .steps()
        .iter()
        .map(|step| StepDefinition {
            name: step.name.clone(),
            step_type: step.kind.type_name().to_string(),
            arguments: render_arguments(step),
            depends_on: step.depends_on.clone(),
            property_files: step
                .property_files
                .iter()
                .map(|f| PropertyFileDefinition {
                    name: f.name.clone(),
                    output_name: f.output_name.clone(),
                    file_path: f.path.clone(),
                })
                .collect(),
        })
        .collect();

    debug!(pipeline = %pipeline.name, steps = pipeline.graph.len(), "compiled definition");

    Ok(PipelineDefinition {
        version: SCHEMA_VERSION.to_string(),
        pipeline_name: pipeline.name.clone(),
        parameters,
        steps,
    })
}

fn check_parameters(pipeline: &Pipeline) -> Result<()> {
    for step in pipeline.graph.steps() {
        for value in step.input_values() {
            if let PipelineValue::Parameter(name) = value {
                if !pipeline.parameters.is_declared(name) {
                    return Err(ValidationError::UnknownParameter { name: name.clone() }.into());
                }
            }
        }
    }
    Ok(())
}

/// Render a pipeline value for the definition: literals verbatim, parameters
/// and references as symbolic `{"Get": …}` pointers
fn render_value(value: &PipelineValue) -> serde_json::Value {
    match value {
        PipelineValue::Literal(v) => v.clone(),
        PipelineValue::Parameter(name) => json!({ "Get": format!("Parameters.{}", name) }),
        PipelineValue::Deferred(r) => json!({ "Get": r.symbol() }),
    }
}

fn render_arguments(step: &Step) -> serde_json::Value {
    match &step.kind {
        StepKind::Processing(job) => json!({
            "ImageUri": job.image_uri,
            "InstanceType": job.instance_type,
            "InstanceCount": render_value(&job.instance_count),
            "Code": job.code,
            "Inputs": job.inputs.iter().map(|i| json!({
                "Name": i.name,
                "Value": render_value(&i.value),
            })).collect::<Vec<_>>(),
            "Outputs": job.outputs.iter().map(|o| json!({
                "Name": o.name,
                "Source": o.source,
            })).collect::<Vec<_>>(),
        }),
        StepKind::Training(job) => json!({
            "ImageUri": job.image_uri,
            "InstanceType": job.instance_type,
            "InstanceCount": render_value(&job.instance_count),
            "OutputPath": job.output_path,
            "HyperParameters": job.hyperparameters,
            "Channels": job.channels.iter().map(|c| json!({
                "Name": c.name,
                "Value": render_value(&c.value),
            })).collect::<Vec<_>>(),
        }),
        StepKind::Conditional(branch) => json!({
            "Conditions": [{
                "Type": branch.condition.op.as_str(),
                "LeftValue": render_value(&branch.condition.left),
                "RightValue": render_value(&branch.condition.right),
            }],
            "IfSteps": branch.if_steps,
            "ElseSteps": branch.else_steps,
        }),
        StepKind::Register(reg) => {
            let mut arguments = json!({
                "ModelData": render_value(&reg.model_data),
                "ApprovalStatus": render_value(&reg.approval_status),
                "ModelPackageGroup": reg.package_group,
                "ContentTypes": reg.content_types,
                "ResponseTypes": reg.response_types,
                "InferenceInstanceTypes": reg.inference_instance_types,
                "TransformInstanceTypes": reg.transform_instance_types,
            });
            if let Some(metrics) = &reg.metrics_source {
                arguments["ModelMetrics"] = render_value(metrics);
            }
            arguments
        }
    }
}
