//! Workflow executor: runs a [`Plan`] level by level.
//!
//! Each level (ready set) holds the steps whose dependencies have all
//! completed. The levels are derived from the dependency graph before the
//! first step runs, so a cycle, an unknown dependency or an unknown tool
//! aborts the run with nothing executed. Within a level, steps are
//! dispatched through a bounded stream; a step's inputs are resolved
//! against completed outputs immediately before dispatch.
//!
//! A failing step aborts the run. Siblings already in flight finish, no
//! further step starts, and completed side effects are kept: execution is
//! forward-only across steps.

pub mod error;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::plan::{Plan, PlanStep, parser, referenced_steps, resolve_inputs};
use crate::tool::{ExecutionContext, Tool, ToolRegistry};

pub use error::ExecutionError;

/// Default number of steps of one level run concurrently.
pub const DEFAULT_MAX_PARALLEL_STEPS: usize = 4;

/// Executor tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Upper bound on concurrently running steps; `1` runs strictly in order.
    pub max_parallel_steps: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_parallel_steps: DEFAULT_MAX_PARALLEL_STEPS,
        }
    }
}

/// Result of a completed run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub run_id: Uuid,
    pub plan_name: String,
    /// Output of every step, keyed by step id.
    pub outputs: BTreeMap<String, Value>,
    /// Step ids of each ready set, in execution order.
    pub levels: Vec<Vec<String>>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Group step indices into ready sets, preserving plan order within a set.
///
/// Fails when some steps never become ready.
pub fn plan_levels(plan: &Plan) -> Result<Vec<Vec<usize>>, ExecutionError> {
    let mut completed: HashSet<&str> = HashSet::with_capacity(plan.steps.len());
    let mut levels = Vec::new();

    while completed.len() < plan.steps.len() {
        let ready: Vec<usize> = plan
            .steps
            .iter()
            .enumerate()
            .filter(|(_, step)| {
                !completed.contains(step.id.as_str())
                    && step
                        .dependencies
                        .iter()
                        .all(|dep| completed.contains(dep.as_str()))
            })
            .map(|(i, _)| i)
            .collect();

        if ready.is_empty() {
            let remaining = plan
                .steps
                .iter()
                .filter(|step| !completed.contains(step.id.as_str()))
                .map(|step| step.id.clone())
                .collect();
            return Err(ExecutionError::CircularOrUnsatisfiedDependency { remaining });
        }

        completed.extend(ready.iter().map(|&i| plan.steps[i].id.as_str()));
        levels.push(ready);
    }

    Ok(levels)
}

/// Drives plans against an injected [`ToolRegistry`].
#[derive(Debug, Clone)]
pub struct WorkflowExecutor {
    registry: Arc<ToolRegistry>,
    config: ExecutorConfig,
}

impl WorkflowExecutor {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self::with_config(registry, ExecutorConfig::default())
    }

    pub fn with_config(registry: Arc<ToolRegistry>, config: ExecutorConfig) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn config(&self) -> ExecutorConfig {
        self.config
    }

    /// Run every step of `plan` exactly once.
    pub async fn execute(
        &self,
        plan: &Plan,
        ctx: &ExecutionContext,
        cancel: &CancellationToken,
    ) -> Result<RunReport, ExecutionError> {
        let started_at = Utc::now();
        let run_id = ctx.run_id();

        parser::validate(plan)?;
        let levels = plan_levels(plan)?;
        self.check_tools(plan)?;

        tracing::info!(
            run_id = %run_id,
            plan = %plan.name,
            steps = plan.steps.len(),
            levels = levels.len(),
            "run started"
        );

        let mut outputs: HashMap<String, Value> = HashMap::with_capacity(plan.steps.len());
        let mut level_ids = Vec::with_capacity(levels.len());

        for (level, indices) in levels.iter().enumerate() {
            if cancel.is_cancelled() {
                tracing::warn!(
                    run_id = %run_id,
                    completed = outputs.len(),
                    remaining = plan.steps.len() - outputs.len(),
                    "run cancelled; no further steps scheduled"
                );
                return Err(ExecutionError::Cancelled);
            }

            let steps: Vec<&PlanStep> = indices.iter().map(|&i| &plan.steps[i]).collect();
            let ids: Vec<String> = steps.iter().map(|s| s.id.clone()).collect();
            tracing::info!(run_id = %run_id, level, steps = ?ids, "executing ready set");

            self.run_level(&steps, ctx, &mut outputs).await?;
            level_ids.push(ids);
        }

        let finished_at = Utc::now();
        tracing::info!(
            run_id = %run_id,
            plan = %plan.name,
            elapsed_ms = (finished_at - started_at).num_milliseconds(),
            "run finished"
        );

        Ok(RunReport {
            run_id,
            plan_name: plan.name.clone(),
            outputs: outputs.into_iter().collect(),
            levels: level_ids,
            started_at,
            finished_at,
        })
    }

    fn check_tools(&self, plan: &Plan) -> Result<(), ExecutionError> {
        match plan.steps.iter().find(|s| !self.registry.contains(&s.tool)) {
            Some(step) => Err(ExecutionError::UnknownTool {
                step_id: step.id.clone(),
                tool: step.tool.clone(),
            }),
            None => Ok(()),
        }
    }

    fn lookup(&self, step: &PlanStep) -> Result<&dyn Tool, ExecutionError> {
        self.registry
            .get(&step.tool)
            .ok_or_else(|| ExecutionError::UnknownTool {
                step_id: step.id.clone(),
                tool: step.tool.clone(),
            })
    }

    /// Run one ready set, recording outputs of every step that succeeds.
    async fn run_level(
        &self,
        steps: &[&PlanStep],
        ctx: &ExecutionContext,
        outputs: &mut HashMap<String, Value>,
    ) -> Result<(), ExecutionError> {
        let mut dispatch = Vec::with_capacity(steps.len());
        for &step in steps {
            let tool = self.lookup(step)?;
            for referenced in referenced_steps(&step.inputs) {
                if !outputs.contains_key(&referenced) {
                    tracing::warn!(
                        step_id = %step.id,
                        referenced = %referenced,
                        "reference to a step that has not completed is left verbatim"
                    );
                }
            }
            let input = resolve_inputs(&step.inputs, outputs);
            dispatch.push((step, tool, input));
        }

        let failed = AtomicBool::new(false);
        let failed = &failed;
        let mut results = futures::stream::iter(dispatch)
            .map(|(step, tool, input)| {
                // Steps pulled into the buffer after a failure never start.
                let skip = failed.load(Ordering::SeqCst);
                async move {
                    if skip {
                        return (step, None);
                    }
                    tracing::debug!(run_id = %ctx.run_id(), step_id = %step.id, tool = %step.tool, "dispatching step");
                    let result = tool.execute(ctx, input).await;
                    if result.is_err() {
                        failed.store(true, Ordering::SeqCst);
                    }
                    (step, Some(result))
                }
            })
            .buffered(self.config.max_parallel_steps.max(1));

        let mut first_error = None;
        while let Some((step, result)) = results.next().await {
            match result {
                Some(Ok(output)) => {
                    tracing::debug!(step_id = %step.id, tool = %step.tool, "step completed");
                    outputs.insert(step.id.clone(), output);
                }
                Some(Err(source)) => {
                    tracing::error!(
                        run_id = %ctx.run_id(),
                        step_id = %step.id,
                        tool = %step.tool,
                        error = %format!("{source:#}"),
                        "step failed"
                    );
                    if first_error.is_none() {
                        first_error = Some(ExecutionError::ToolExecution {
                            step_id: step.id.clone(),
                            tool: step.tool.clone(),
                            source,
                        });
                    }
                }
                None => {
                    tracing::warn!(step_id = %step.id, "step not dispatched after a sibling failed");
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests;
