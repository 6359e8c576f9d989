//! Failing steps block their dependents; independent steps continue

use crate::helpers::*;
use mlpipeline::{
    ExecutionDriver, ParameterRegistry, Pipeline, PropertyReference, StepGraph, StepInput,
    StepOutcome, StepStatus,
};

/// A failed root blocks the entire downstream chain, and the report names
/// the failure origin
#[tokio::test]
async fn test_failed_step_blocks_transitive_dependents() {
    init_tracing();
    let pipeline = regression_pipeline();
    let backend = MockBackend::new()
        .with_outcome("process", StepOutcome::failed("container exited with code 1"));
    let calls = backend.call_log();
    let driver = ExecutionDriver::new(backend, session());

    let report = driver.run(&pipeline, vec![]).await.unwrap();

    assert!(!report.is_successful());
    assert_eq!(report.failure_origin.as_deref(), Some("process"));
    assert_statuses(
        &report,
        &[
            ("process", StepStatus::Failed),
            ("train", StepStatus::Blocked),
            ("evaluate", StepStatus::Blocked),
            ("check_mse", StepStatus::Blocked),
            ("register", StepStatus::Blocked),
        ],
    );
    // Nothing downstream of the failure reached the backend
    assert_eq!(calls.entries(), vec!["process"]);

    // Blocked reasons name the originating failure, even transitively
    for step in ["train", "evaluate", "check_mse", "register"] {
        let reason = report.step(step).unwrap().reason.clone().unwrap();
        assert!(
            reason.contains("process"),
            "reason for '{}' does not name the origin: {}",
            step,
            reason
        );
    }

    // The failed step carries the backend-provided reason
    assert_eq!(
        report.step("process").unwrap().reason.as_deref(),
        Some("container exited with code 1")
    );
}

/// A failure on one branch leaves independent branches untouched
#[tokio::test]
async fn test_independent_steps_continue_after_failure() {
    let mut graph = StepGraph::new();
    graph
        .add_step(processing_step("flaky", vec![], &["out"]))
        .unwrap();
    graph
        .add_step(processing_step(
            "dependent",
            vec![StepInput::new(
                "in",
                PropertyReference::output("flaky", "out"),
            )],
            &["out"],
        ))
        .unwrap();
    graph
        .add_step(processing_step("audit", vec![], &["out"]))
        .unwrap();
    let pipeline = Pipeline::new("partial", ParameterRegistry::new(), graph);

    let backend = MockBackend::new()
        .with_outcome("flaky", StepOutcome::failed("spot instance reclaimed"))
        .with_outcome("audit", produced("audit", &["out"]));
    let driver = ExecutionDriver::new(backend, session());

    let report = driver.run(&pipeline, vec![]).await.unwrap();

    assert!(!report.is_successful());
    assert_statuses(
        &report,
        &[
            ("flaky", StepStatus::Failed),
            ("dependent", StepStatus::Blocked),
            ("audit", StepStatus::Succeeded),
        ],
    );
}

/// A mid-chain failure leaves completed upstream work recorded
#[tokio::test]
async fn test_mid_chain_failure_preserves_upstream_results() {
    let pipeline = regression_pipeline();
    let backend = MockBackend::new()
        .with_outcome("process", produced("process", &["train", "validation", "test"]))
        .with_outcome("train", StepOutcome::failed("loss diverged"));
    let driver = ExecutionDriver::new(backend, session());

    let report = driver.run(&pipeline, vec![]).await.unwrap();

    assert!(!report.is_successful());
    assert_eq!(report.failure_origin.as_deref(), Some("train"));
    assert_statuses(
        &report,
        &[
            ("process", StepStatus::Succeeded),
            ("train", StepStatus::Failed),
            ("evaluate", StepStatus::Blocked),
            ("check_mse", StepStatus::Blocked),
            ("register", StepStatus::Blocked),
        ],
    );
    assert_eq!(
        report.step("process").unwrap().outputs["test"],
        "s3://artifacts/process/test"
    );
}
