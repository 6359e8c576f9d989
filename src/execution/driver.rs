//! Execution driver - dispatches steps in dependency order
//!
//! The driver walks the topological order, delegates each dispatchable step
//! to the execution backend, and records terminal states in run state.
//! Independent branches run concurrently; the only suspension point is
//! waiting for a backend call to finish. Conditional steps are evaluated
//! in-driver and prune the branch that was not selected.

use crate::core::config::SessionConfig;
use crate::core::parameter::{ParameterRegistry, ParameterValue};
use crate::core::pipeline::Pipeline;
use crate::core::reference::resolve_value;
use crate::core::state::{RunReport, RunState, RunStatus, StepStatus};
use crate::core::step::{Step, StepKind};
use crate::error::{PipelineError, Result};
use crate::execution::backend::{ExecutionBackend, StepOutcome, StepRequest};
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Events that can occur during a run
#[derive(Debug, Clone)]
pub enum RunEvent {
    RunStarted {
        execution_id: Uuid,
        pipeline: String,
    },
    StepStarted {
        step: String,
    },
    StepFinished {
        step: String,
        status: StepStatus,
    },
    BranchPruned {
        conditional: String,
        selected_if: bool,
        skipped: Vec<String>,
    },
    RunFinished {
        execution_id: Uuid,
        status: RunStatus,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(&RunEvent) + Send + Sync>;

/// Cancellation flag shared with a running driver
///
/// Cancelling lets in-flight steps run to their natural terminal state;
/// steps not yet dispatched transition to `Cancelled`.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Dispatches a pipeline's steps to an execution backend
pub struct ExecutionDriver<B> {
    backend: Arc<B>,
    session: SessionConfig,
    handlers: Vec<EventHandler>,
}

impl<B: ExecutionBackend + 'static> ExecutionDriver<B> {
    pub fn new(backend: B, session: SessionConfig) -> Self {
        Self {
            backend: Arc::new(backend),
            session,
            handlers: Vec::new(),
        }
    }

    /// Register an event handler
    pub fn on_event<F>(&mut self, handler: F)
    where
        F: Fn(&RunEvent) + Send + Sync + 'static,
    {
        self.handlers.push(Arc::new(handler));
    }

    fn emit(&self, event: RunEvent) {
        for handler in &self.handlers {
            handler(&event);
        }
    }

    /// Execute a run with the given parameter bindings
    pub async fn run(
        &self,
        pipeline: &Pipeline,
        bindings: Vec<(String, ParameterValue)>,
    ) -> Result<RunReport> {
        self.run_cancellable(pipeline, bindings, &CancelFlag::new())
            .await
    }

    /// Execute a run that can be cancelled through `cancel`
    pub async fn run_cancellable(
        &self,
        pipeline: &Pipeline,
        bindings: Vec<(String, ParameterValue)>,
        cancel: &CancelFlag,
    ) -> Result<RunReport> {
        let params = pipeline.parameters.with_bindings(bindings)?;
        let deps = pipeline.graph.dependency_map();
        let order: Vec<String> = pipeline
            .graph
            .topological_order()?
            .iter()
            .map(|s| s.name.clone())
            .collect();

        let mut state = RunState::new(
            &pipeline.name,
            pipeline.graph.steps().iter().map(|s| s.name.clone()),
        );
        state.start();
        info!(
            pipeline = %pipeline.name,
            execution_id = %state.execution_id,
            steps = order.len(),
            "starting pipeline run"
        );
        self.emit(RunEvent::RunStarted {
            execution_id: state.execution_id,
            pipeline: pipeline.name.clone(),
        });

        let mut tasks: JoinSet<(String, StepOutcome)> = JoinSet::new();

        loop {
            let mut progressed = false;

            if cancel.is_cancelled() {
                for name in &order {
                    if state.status_of(name) == Some(StepStatus::Pending) {
                        state.mark_cancelled(name);
                        self.emit(RunEvent::StepFinished {
                            step: name.clone(),
                            status: StepStatus::Cancelled,
                        });
                        progressed = true;
                    }
                }
            }

            progressed |= self.propagate(&order, &deps, &mut state);
            progressed |= self.dispatch(pipeline, &params, &order, &deps, &mut state, &mut tasks)?;

            if progressed {
                continue;
            }

            // Nothing dispatchable: suspend until an in-flight step finishes
            match tasks.join_next().await {
                Some(Ok((name, outcome))) => self.record_outcome(&mut state, &name, outcome),
                Some(Err(join_err)) => {
                    error!(error = %join_err, "backend task aborted");
                    return Err(PipelineError::Backend {
                        step: "<driver>".to_string(),
                        reason: join_err.to_string(),
                    });
                }
                None => break,
            }
        }

        let status = self.final_status(&order, &state);
        state.finish(status);
        info!(
            execution_id = %state.execution_id,
            status = ?status,
            "pipeline run finished"
        );
        self.emit(RunEvent::RunFinished {
            execution_id: state.execution_id,
            status,
        });

        Ok(state.report())
    }

    /// Dispatch every step whose dependencies have all succeeded
    fn dispatch(
        &self,
        pipeline: &Pipeline,
        params: &ParameterRegistry,
        order: &[String],
        deps: &HashMap<String, BTreeSet<String>>,
        state: &mut RunState,
        tasks: &mut JoinSet<(String, StepOutcome)>,
    ) -> Result<bool> {
        let mut progressed = false;

        for name in order {
            if state.status_of(name) != Some(StepStatus::Pending) {
                continue;
            }
            let Some(dep_list) = deps.get(name) else {
                continue;
            };
            let ready = dep_list
                .iter()
                .all(|d| state.status_of(d) == Some(StepStatus::Succeeded));
            if !ready {
                continue;
            }
            let Some(step) = pipeline.graph.step(name) else {
                continue;
            };

            if let StepKind::Conditional(branch) = &step.kind {
                self.evaluate_conditional(step, branch, params, state)?;
                progressed = true;
                continue;
            }

            if tasks.len() >= self.session.max_concurrency {
                continue;
            }

            match self.materialize(step, params, state) {
                Ok(request) => {
                    state.mark_running(name);
                    info!(step = %name, kind = step.kind.type_name(), "dispatching step");
                    self.emit(RunEvent::StepStarted { step: name.clone() });
                    let backend = Arc::clone(&self.backend);
                    let step_name = name.clone();
                    tasks.spawn(async move {
                        let outcome = backend.execute(request).await;
                        (step_name, outcome)
                    });
                    progressed = true;
                }
                Err(
                    err @ (PipelineError::PathNotFound { .. } | PipelineError::TypeMismatch { .. }),
                ) => {
                    warn!(step = %name, error = %err, "step input materialization failed");
                    state.mark_failed(name, err.to_string());
                    self.emit(RunEvent::StepFinished {
                        step: name.clone(),
                        status: StepStatus::Failed,
                    });
                    progressed = true;
                }
                // Unresolved or unknown references past validation are
                // ordering bugs, fatal to the whole run
                Err(err) => return Err(err),
            }
        }

        Ok(progressed)
    }

    fn evaluate_conditional(
        &self,
        step: &Step,
        branch: &crate::core::step::ConditionalBranch,
        params: &ParameterRegistry,
        state: &mut RunState,
    ) -> Result<()> {
        match branch.condition.evaluate(params, state) {
            Ok(selected_if) => {
                state.mark_succeeded(&step.name, BTreeMap::new(), BTreeMap::new());
                self.emit(RunEvent::StepFinished {
                    step: step.name.clone(),
                    status: StepStatus::Succeeded,
                });

                let skipped_members = if selected_if {
                    &branch.else_steps
                } else {
                    &branch.if_steps
                };
                for member in skipped_members {
                    state.mark_skipped(
                        member,
                        format!("branch not selected by '{}'", step.name),
                    );
                    self.emit(RunEvent::StepFinished {
                        step: member.clone(),
                        status: StepStatus::Skipped,
                    });
                }
                info!(
                    step = %step.name,
                    selected_if,
                    skipped = skipped_members.len(),
                    "conditional evaluated"
                );
                self.emit(RunEvent::BranchPruned {
                    conditional: step.name.clone(),
                    selected_if,
                    skipped: skipped_members.clone(),
                });
                Ok(())
            }
            Err(
                err @ (PipelineError::PathNotFound { .. } | PipelineError::TypeMismatch { .. }),
            ) => {
                warn!(step = %step.name, error = %err, "condition evaluation failed");
                state.mark_failed(&step.name, err.to_string());
                self.emit(RunEvent::StepFinished {
                    step: step.name.clone(),
                    status: StepStatus::Failed,
                });
                Ok(())
            }
            // An unresolved operand here means the dependency edges lied;
            // that is a driver bug, not a step failure
            Err(err) => Err(err),
        }
    }

    /// Cascade terminal states to steps that can never dispatch
    fn propagate(
        &self,
        order: &[String],
        deps: &HashMap<String, BTreeSet<String>>,
        state: &mut RunState,
    ) -> bool {
        let mut progressed = false;
        loop {
            let mut changed = false;
            for name in order {
                if state.status_of(name) != Some(StepStatus::Pending) {
                    continue;
                }
                let Some(dep_list) = deps.get(name) else {
                    continue;
                };

                let failed_dep = dep_list.iter().find(|d| {
                    matches!(
                        state.status_of(d),
                        Some(StepStatus::Failed | StepStatus::Blocked)
                    )
                });
                if let Some(dep) = failed_dep {
                    let reason = match state.status_of(dep) {
                        Some(StepStatus::Blocked) => state
                            .record(dep)
                            .and_then(|r| r.reason.clone())
                            .unwrap_or_else(|| format!("upstream step '{}' failed", dep)),
                        _ => format!("upstream step '{}' failed", dep),
                    };
                    state.mark_blocked(name, reason);
                    self.emit(RunEvent::StepFinished {
                        step: name.clone(),
                        status: StepStatus::Blocked,
                    });
                    changed = true;
                    continue;
                }

                let skipped_dep = dep_list
                    .iter()
                    .find(|d| state.status_of(d) == Some(StepStatus::Skipped));
                if let Some(dep) = skipped_dep {
                    state.mark_skipped(name, format!("upstream step '{}' was skipped", dep));
                    self.emit(RunEvent::StepFinished {
                        step: name.clone(),
                        status: StepStatus::Skipped,
                    });
                    changed = true;
                }
            }
            progressed |= changed;
            if !changed {
                break;
            }
        }
        progressed
    }

    /// Build the backend request with every input resolved
    fn materialize(
        &self,
        step: &Step,
        params: &ParameterRegistry,
        state: &RunState,
    ) -> Result<StepRequest> {
        let resolve_named = |inputs: &[crate::core::step::StepInput]| -> Result<Vec<serde_json::Value>> {
            inputs
                .iter()
                .map(|i| {
                    Ok(json!({
                        "Name": i.name,
                        "Value": resolve_value(&i.value, params, state)?,
                    }))
                })
                .collect()
        };

        let configuration = match &step.kind {
            StepKind::Processing(job) => json!({
                "ImageUri": job.image_uri,
                "InstanceType": job.instance_type,
                "InstanceCount": resolve_value(&job.instance_count, params, state)?,
                "Code": job.code,
                "Inputs": resolve_named(&job.inputs)?,
                "Outputs": job.outputs.iter().map(|o| json!({
                    "Name": o.name,
                    "Source": o.source,
                })).collect::<Vec<_>>(),
            }),
            StepKind::Training(job) => json!({
                "ImageUri": job.image_uri,
                "InstanceType": job.instance_type,
                "InstanceCount": resolve_value(&job.instance_count, params, state)?,
                "OutputPath": job.output_path,
                "HyperParameters": job.hyperparameters,
                "Channels": resolve_named(&job.channels)?,
            }),
            StepKind::Register(reg) => {
                let mut configuration = json!({
                    "ModelData": resolve_value(&reg.model_data, params, state)?,
                    "ApprovalStatus": resolve_value(&reg.approval_status, params, state)?,
                    "ModelPackageGroup": reg.package_group,
                    "ContentTypes": reg.content_types,
                    "ResponseTypes": reg.response_types,
                    "InferenceInstanceTypes": reg.inference_instance_types,
                    "TransformInstanceTypes": reg.transform_instance_types,
                });
                if let Some(metrics) = &reg.metrics_source {
                    configuration["ModelMetrics"] = resolve_value(metrics, params, state)?;
                }
                configuration
            }
            StepKind::Conditional(_) => {
                return Err(PipelineError::Backend {
                    step: step.name.clone(),
                    reason: "conditional steps are evaluated in-driver".to_string(),
                });
            }
        };

        Ok(StepRequest {
            step: step.name.clone(),
            kind: step.kind.type_name().to_string(),
            role: self.session.role.clone(),
            artifact_root: format!("{}/{}", self.session.artifact_root, step.name),
            configuration,
        })
    }

    fn record_outcome(&self, state: &mut RunState, name: &str, outcome: StepOutcome) {
        match outcome {
            StepOutcome::Succeeded { outputs, documents } => {
                info!(step = %name, outputs = outputs.len(), "step succeeded");
                state.mark_succeeded(name, outputs, documents);
                self.emit(RunEvent::StepFinished {
                    step: name.to_string(),
                    status: StepStatus::Succeeded,
                });
            }
            StepOutcome::Failed { reason } => {
                warn!(step = %name, reason = %reason, "step failed");
                state.mark_failed(name, reason);
                self.emit(RunEvent::StepFinished {
                    step: name.to_string(),
                    status: StepStatus::Failed,
                });
            }
        }
    }

    fn final_status(&self, order: &[String], state: &RunState) -> RunStatus {
        let any = |status: StepStatus| {
            order
                .iter()
                .any(|name| state.status_of(name) == Some(status))
        };
        if any(StepStatus::Cancelled) {
            RunStatus::Cancelled
        } else if any(StepStatus::Failed) {
            RunStatus::Failed
        } else {
            RunStatus::Completed
        }
    }
}
