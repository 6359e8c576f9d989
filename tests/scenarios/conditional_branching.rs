//! Conditional steps select exactly one branch per run

use crate::helpers::*;
use mlpipeline::{
    Condition, ConditionalBranch, ExecutionDriver, ParameterRegistry, Pipeline, PipelineValue,
    PropertyFile, PropertyReference, Step, StepGraph, StepStatus,
};
use serde_json::json;

/// measure -> gate { if: promote, else: discard } with the gate comparing
/// the measured value against a literal threshold
fn gated_pipeline() -> Pipeline {
    let mut graph = StepGraph::new();
    graph
        .add_step(
            processing_step("measure", vec![], &["metrics"]).with_property_file(
                PropertyFile::new("Metrics", "metrics", "metrics.json"),
            ),
        )
        .unwrap();
    graph
        .add_step(processing_step("promote", vec![], &["out"]))
        .unwrap();
    graph
        .add_step(processing_step("discard", vec![], &["out"]))
        .unwrap();
    graph
        .add_step(Step::conditional(
            "gate",
            ConditionalBranch {
                condition: Condition::less_than_or_equal_to(
                    PropertyReference::property("measure", "Metrics", "score"),
                    PipelineValue::literal(6.0),
                ),
                if_steps: vec!["promote".to_string()],
                else_steps: vec!["discard".to_string()],
            },
        ))
        .unwrap();
    Pipeline::new("gated", ParameterRegistry::new(), graph)
}

fn gated_backend(score: f64) -> MockBackend {
    MockBackend::new()
        .with_outcome(
            "measure",
            produced("measure", &["metrics"]).with_document("Metrics", json!({ "score": score })),
        )
        .with_outcome("promote", produced("promote", &["out"]))
        .with_outcome("discard", produced("discard", &["out"]))
}

#[tokio::test]
async fn test_true_condition_schedules_if_branch() {
    let pipeline = gated_pipeline();
    let driver = ExecutionDriver::new(gated_backend(5.0), session());

    let report = driver.run(&pipeline, vec![]).await.unwrap();

    assert!(report.is_successful());
    assert_statuses(
        &report,
        &[
            ("gate", StepStatus::Succeeded),
            ("promote", StepStatus::Succeeded),
            ("discard", StepStatus::Skipped),
        ],
    );
}

#[tokio::test]
async fn test_false_condition_schedules_else_branch() {
    let pipeline = gated_pipeline();
    let driver = ExecutionDriver::new(gated_backend(7.0), session());

    let report = driver.run(&pipeline, vec![]).await.unwrap();

    assert!(report.is_successful());
    assert_statuses(
        &report,
        &[
            ("gate", StepStatus::Succeeded),
            ("promote", StepStatus::Skipped),
            ("discard", StepStatus::Succeeded),
        ],
    );
}

/// A skipped branch member drags its exclusive dependents with it
#[tokio::test]
async fn test_skip_cascades_to_dependents_of_skipped_steps() {
    use mlpipeline::StepInput;

    let mut graph = StepGraph::new();
    graph
        .add_step(
            processing_step("measure", vec![], &["metrics"]).with_property_file(
                PropertyFile::new("Metrics", "metrics", "metrics.json"),
            ),
        )
        .unwrap();
    graph
        .add_step(processing_step("promote", vec![], &["out"]))
        .unwrap();
    graph
        .add_step(processing_step(
            "announce",
            vec![StepInput::new(
                "in",
                PropertyReference::output("promote", "out"),
            )],
            &["out"],
        ))
        .unwrap();
    graph
        .add_step(Step::conditional(
            "gate",
            ConditionalBranch {
                condition: Condition::less_than_or_equal_to(
                    PropertyReference::property("measure", "Metrics", "score"),
                    PipelineValue::literal(6.0),
                ),
                if_steps: vec!["promote".to_string()],
                else_steps: vec![],
            },
        ))
        .unwrap();
    let pipeline = Pipeline::new("cascade", ParameterRegistry::new(), graph);

    let driver = ExecutionDriver::new(gated_backend(9.9), session());
    let report = driver.run(&pipeline, vec![]).await.unwrap();

    assert!(report.is_successful());
    assert_statuses(
        &report,
        &[
            ("gate", StepStatus::Succeeded),
            ("promote", StepStatus::Skipped),
            ("announce", StepStatus::Skipped),
        ],
    );
    let reason = report.step("announce").unwrap().reason.clone().unwrap();
    assert!(reason.contains("promote"));
}

/// An empty else branch means "do nothing further on this path"
#[tokio::test]
async fn test_false_condition_with_empty_else_ends_path() {
    let mut graph = StepGraph::new();
    graph
        .add_step(
            processing_step("measure", vec![], &["metrics"]).with_property_file(
                PropertyFile::new("Metrics", "metrics", "metrics.json"),
            ),
        )
        .unwrap();
    graph
        .add_step(processing_step("promote", vec![], &["out"]))
        .unwrap();
    graph
        .add_step(Step::conditional(
            "gate",
            ConditionalBranch {
                condition: Condition::less_than_or_equal_to(
                    PropertyReference::property("measure", "Metrics", "score"),
                    PipelineValue::literal(6.0),
                ),
                if_steps: vec!["promote".to_string()],
                else_steps: vec![],
            },
        ))
        .unwrap();
    let pipeline = Pipeline::new("gated", ParameterRegistry::new(), graph);

    let driver = ExecutionDriver::new(gated_backend(7.5), session());
    let report = driver.run(&pipeline, vec![]).await.unwrap();

    assert!(report.is_successful());
    assert_statuses(
        &report,
        &[
            ("gate", StepStatus::Succeeded),
            ("promote", StepStatus::Skipped),
        ],
    );
}
