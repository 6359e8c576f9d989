//! Test utilities: a scripted mock backend and pipeline builders

use async_trait::async_trait;
use mlpipeline::{
    Condition, ConditionalBranch, ExecutionBackend, ModelRegistration, OutputSlot,
    ParameterKind, ParameterRegistry, Pipeline, PipelineValue, ProcessingJob, PropertyFile,
    PropertyReference, RunReport, SessionConfig, Step, StepGraph, StepInput, StepOutcome,
    StepRequest, StepStatus, TrainingJob,
};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Shared record of the order in which steps reached the backend
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn push(&self, step: &str) {
        self.0.lock().unwrap().push(step.to_string());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn position(&self, step: &str) -> Option<usize> {
        self.entries().iter().position(|s| s == step)
    }
}

/// Mock backend that returns scripted outcomes per step name
///
/// Steps without a scripted outcome fail, which keeps accidental dispatches
/// visible in test output.
pub struct MockBackend {
    outcomes: HashMap<String, StepOutcome>,
    calls: CallLog,
    delay: Option<Duration>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            outcomes: HashMap::new(),
            calls: CallLog::default(),
            delay: None,
        }
    }

    pub fn with_outcome(mut self, step: &str, outcome: StepOutcome) -> Self {
        self.outcomes.insert(step.to_string(), outcome);
        self
    }

    /// Simulate a slow backend call
    #[allow(dead_code)]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Handle onto the call log, valid after the backend moves into a driver
    pub fn call_log(&self) -> CallLog {
        self.calls.clone()
    }
}

#[async_trait]
impl ExecutionBackend for MockBackend {
    async fn execute(&self, request: StepRequest) -> StepOutcome {
        self.calls.push(&request.step);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.outcomes
            .get(&request.step)
            .cloned()
            .unwrap_or_else(|| {
                StepOutcome::failed(format!("no scripted outcome for '{}'", request.step))
            })
    }
}

/// Install a log subscriber once; set RUST_LOG to see driver output on failures
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}

pub fn session() -> SessionConfig {
    SessionConfig::new("arn:aws:iam::123456789012:role/pipeline", "s3://artifacts")
}

/// A minimal processing step for graph-shape tests
pub fn processing_step(name: &str, inputs: Vec<StepInput>, outputs: &[&str]) -> Step {
    Step::processing(
        name,
        ProcessingJob {
            image_uri: "registry/job:1".to_string(),
            instance_type: "ml.t3.medium".to_string(),
            instance_count: PipelineValue::literal(1),
            code: "job.py".to_string(),
            inputs,
            outputs: outputs
                .iter()
                .map(|o| OutputSlot::new(*o, format!("/opt/ml/processing/{}", o)))
                .collect(),
        },
    )
}

/// Successful outcome with one produced URI per named output
pub fn produced(step: &str, outputs: &[&str]) -> StepOutcome {
    StepOutcome::succeeded(
        outputs
            .iter()
            .map(|o| (o.to_string(), format!("s3://artifacts/{}/{}", step, o)))
            .collect(),
    )
}

/// The end-to-end regression pipeline:
/// process -> train -> evaluate -> check_mse { if: register }
pub fn regression_pipeline() -> Pipeline {
    let mut params = ParameterRegistry::new();
    params
        .declare("ProcessingInstanceCount", ParameterKind::Integer, 1i64)
        .unwrap();
    params
        .declare("InputData", ParameterKind::String, "s3://bucket/dataset.csv")
        .unwrap();
    params
        .declare(
            "ModelApprovalStatus",
            ParameterKind::String,
            "PendingManualApproval",
        )
        .unwrap();

    let mut graph = StepGraph::new();
    graph
        .add_step(Step::processing(
            "process",
            ProcessingJob {
                image_uri: "registry/sklearn:0.23-1".to_string(),
                instance_type: "ml.t3.medium".to_string(),
                instance_count: PipelineValue::parameter("ProcessingInstanceCount"),
                code: "preprocessing.py".to_string(),
                inputs: vec![StepInput::new(
                    "input",
                    PipelineValue::parameter("InputData"),
                )],
                outputs: vec![
                    OutputSlot::new("train", "/opt/ml/processing/train"),
                    OutputSlot::new("validation", "/opt/ml/processing/validation"),
                    OutputSlot::new("test", "/opt/ml/processing/test"),
                ],
            },
        ))
        .unwrap();
    graph
        .add_step(Step::training(
            "train",
            TrainingJob {
                image_uri: "registry/xgboost:1.0-1".to_string(),
                instance_type: "ml.m5.xlarge".to_string(),
                instance_count: PipelineValue::literal(1),
                output_path: "s3://artifacts/model".to_string(),
                hyperparameters: [
                    ("objective".to_string(), "reg:linear".to_string()),
                    ("num_round".to_string(), "50".to_string()),
                ]
                .into(),
                channels: vec![
                    StepInput::new("train", PropertyReference::output("process", "train")),
                    StepInput::new(
                        "validation",
                        PropertyReference::output("process", "validation"),
                    ),
                ],
            },
        ))
        .unwrap();
    graph
        .add_step(
            Step::processing(
                "evaluate",
                ProcessingJob {
                    image_uri: "registry/xgboost:1.0-1".to_string(),
                    instance_type: "ml.t3.medium".to_string(),
                    instance_count: PipelineValue::literal(1),
                    code: "evaluation.py".to_string(),
                    inputs: vec![
                        StepInput::new("model", PropertyReference::output("train", "model")),
                        StepInput::new("test", PropertyReference::output("process", "test")),
                    ],
                    outputs: vec![OutputSlot::new(
                        "evaluation",
                        "/opt/ml/processing/evaluation",
                    )],
                },
            )
            .with_property_file(PropertyFile::new(
                "EvaluationReport",
                "evaluation",
                "evaluation.json",
            )),
        )
        .unwrap();
    graph
        .add_step(Step::register(
            "register",
            ModelRegistration {
                model_data: PropertyReference::output("train", "model").into(),
                approval_status: PipelineValue::parameter("ModelApprovalStatus"),
                package_group: "RegressionModelPackageGroup".to_string(),
                metrics_source: Some(PropertyReference::output("evaluate", "evaluation").into()),
                content_types: vec!["text/csv".to_string()],
                response_types: vec!["text/csv".to_string()],
                inference_instance_types: vec![
                    "ml.t2.medium".to_string(),
                    "ml.m5.xlarge".to_string(),
                ],
                transform_instance_types: vec!["ml.m5.large".to_string()],
            },
        ))
        .unwrap();
    graph
        .add_step(Step::conditional(
            "check_mse",
            ConditionalBranch {
                condition: Condition::less_than_or_equal_to(
                    PropertyReference::property(
                        "evaluate",
                        "EvaluationReport",
                        "regression_metrics.mse.value",
                    ),
                    PipelineValue::literal(6.0),
                ),
                if_steps: vec!["register".to_string()],
                else_steps: vec![],
            },
        ))
        .unwrap();

    Pipeline::new("regression", params, graph)
}

/// Scripted outcomes for every backend-dispatched regression step, with the
/// evaluation report carrying the given mse
pub fn regression_backend(mse: f64) -> MockBackend {
    MockBackend::new()
        .with_outcome("process", produced("process", &["train", "validation", "test"]))
        .with_outcome("train", produced("train", &["model"]))
        .with_outcome(
            "evaluate",
            produced("evaluate", &["evaluation"]).with_document(
                "EvaluationReport",
                json!({
                    "regression_metrics": {
                        "mse": { "value": mse, "standard_deviation": 0.31 }
                    }
                }),
            ),
        )
        .with_outcome("register", StepOutcome::succeeded(Default::default()))
}

pub fn assert_statuses(report: &RunReport, expected: &[(&str, StepStatus)]) {
    for (name, status) in expected {
        let step = report
            .step(name)
            .unwrap_or_else(|| panic!("step '{}' missing from report", name));
        assert_eq!(
            step.status, *status,
            "step '{}' has status {:?}, expected {:?} (reason: {:?})",
            name, step.status, status, step.reason
        );
    }
}
