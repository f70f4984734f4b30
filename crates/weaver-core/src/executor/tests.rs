use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;

use super::*;
use crate::plan::PlanStep;
use crate::tool::context::tests::offline_context;

/// Records every call and echoes `{ "step": <input.step>, "input": <input> }`.
#[derive(Default)]
struct Recorder {
    calls: Mutex<Vec<Value>>,
}

struct RecordingTool(Arc<Recorder>);

#[async_trait]
impl Tool for RecordingTool {
    fn name(&self) -> &str {
        "record"
    }

    fn description(&self) -> &str {
        "records its input"
    }

    async fn execute(&self, _ctx: &ExecutionContext, input: Value) -> Result<Value> {
        self.0.calls.lock().unwrap().push(input.clone());
        Ok(json!({ "echo": input, "n": 3, "path": "/src" }))
    }
}

struct FailingTool;

#[async_trait]
impl Tool for FailingTool {
    fn name(&self) -> &str {
        "fail"
    }

    fn description(&self) -> &str {
        "always fails"
    }

    async fn execute(&self, _ctx: &ExecutionContext, _input: Value) -> Result<Value> {
        Err(anyhow::anyhow!("disk on fire"))
    }
}

/// Sleeps and tracks the peak number of concurrent calls.
#[derive(Default)]
struct Gauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

struct SlowTool(Arc<Gauge>);

#[async_trait]
impl Tool for SlowTool {
    fn name(&self) -> &str {
        "slow"
    }

    fn description(&self) -> &str {
        "sleeps briefly"
    }

    async fn execute(&self, _ctx: &ExecutionContext, _input: Value) -> Result<Value> {
        let now = self.0.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.0.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.0.current.fetch_sub(1, Ordering::SeqCst);
        Ok(json!({}))
    }
}

/// Cancels the token it holds when run.
struct CancelTool(CancellationToken);

#[async_trait]
impl Tool for CancelTool {
    fn name(&self) -> &str {
        "cancel"
    }

    fn description(&self) -> &str {
        "cancels the run"
    }

    async fn execute(&self, _ctx: &ExecutionContext, _input: Value) -> Result<Value> {
        self.0.cancel();
        Ok(json!({ "cancelled": true }))
    }
}

fn executor_with(recorder: &Arc<Recorder>) -> WorkflowExecutor {
    let mut registry = ToolRegistry::new();
    registry.register(RecordingTool(Arc::clone(recorder)));
    registry.register(FailingTool);
    WorkflowExecutor::new(Arc::new(registry))
}

fn step(id: &str, deps: &[&str]) -> PlanStep {
    PlanStep::new(id, "record", json!({ "step": id })).depends_on(deps.iter().copied())
}

fn recorded_steps(recorder: &Recorder) -> Vec<String> {
    recorder
        .calls
        .lock()
        .unwrap()
        .iter()
        .map(|c| c["step"].as_str().unwrap_or_default().to_string())
        .collect()
}

#[test]
fn levels_follow_dependencies_not_plan_order() {
    let plan = Plan::new(
        "unordered",
        vec![step("d", &["b", "c"]), step("b", &["a"]), step("c", &["a"]), step("a", &[])],
    );
    assert_eq!(plan_levels(&plan).unwrap(), vec![vec![3], vec![1, 2], vec![0]]);
}

#[test]
fn cycle_is_reported_with_remaining_steps() {
    let plan = Plan::new(
        "cyclic",
        vec![step("a", &[]), step("b", &["c"]), step("c", &["b"])],
    );
    match plan_levels(&plan) {
        Err(ExecutionError::CircularOrUnsatisfiedDependency { remaining }) => {
            assert_eq!(remaining, vec!["b", "c"]);
        }
        other => panic!("expected stall, got {other:?}"),
    }
}

#[tokio::test]
async fn diamond_runs_each_step_once() {
    let recorder = Arc::new(Recorder::default());
    let executor = executor_with(&recorder);
    let plan = Plan::new(
        "diamond",
        vec![step("a", &[]), step("b", &["a"]), step("c", &["a"]), step("d", &["b", "c"])],
    );

    let report = executor
        .execute(&plan, &offline_context(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.levels, vec![vec!["a"], vec!["b", "c"], vec!["d"]]);
    assert_eq!(report.outputs.len(), 4);
    let mut steps = recorded_steps(&recorder);
    assert_eq!(steps.first().map(String::as_str), Some("a"));
    assert_eq!(steps.last().map(String::as_str), Some("d"));
    steps.sort();
    assert_eq!(steps, vec!["a", "b", "c", "d"]);
}

#[tokio::test]
async fn inputs_resolve_from_completed_outputs() {
    let recorder = Arc::new(Recorder::default());
    let executor = executor_with(&recorder);
    let plan = Plan::new(
        "refs",
        vec![
            step("a", &[]),
            PlanStep::new(
                "b",
                "record",
                json!({ "step": "b", "file": "{{ a.path }}/index.ts", "count": "{{ a.n }}", "missing": "{{ zz.id }}" }),
            )
            .depends_on(["a"]),
        ],
    );

    let report = executor
        .execute(&plan, &offline_context(), &CancellationToken::new())
        .await
        .unwrap();

    let b_input = &report.outputs["b"]["echo"];
    assert_eq!(b_input["file"], json!("/src/index.ts"));
    assert_eq!(b_input["count"], json!(3));
    assert_eq!(b_input["missing"], json!("{{ zz.id }}"));
}

#[tokio::test]
async fn stall_aborts_before_any_step_runs() {
    let recorder = Arc::new(Recorder::default());
    let executor = executor_with(&recorder);
    let plan = Plan::new("ghost", vec![step("a", &[]), step("b", &["ghost"])]);

    let err = executor
        .execute(&plan, &offline_context(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ExecutionError::CircularOrUnsatisfiedDependency { ref remaining } if remaining == &["b"]
    ));
    assert!(recorded_steps(&recorder).is_empty());
}

#[tokio::test]
async fn unknown_tool_aborts_before_any_step_runs() {
    let recorder = Arc::new(Recorder::default());
    let executor = executor_with(&recorder);
    let plan = Plan::new(
        "unknown",
        vec![step("a", &[]), PlanStep::new("b", "nope", json!({})).depends_on(["a"])],
    );

    let err = executor
        .execute(&plan, &offline_context(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.step_id(), Some("b"));
    assert_eq!(err.tool(), Some("nope"));
    assert!(recorded_steps(&recorder).is_empty());
}

#[tokio::test]
async fn duplicate_ids_are_an_invalid_plan() {
    let recorder = Arc::new(Recorder::default());
    let executor = executor_with(&recorder);
    let plan = Plan::new("dup", vec![step("a", &[]), step("a", &[])]);

    let err = executor
        .execute(&plan, &offline_context(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ExecutionError::InvalidPlan(_)));
}

#[tokio::test]
async fn failure_is_attributed_and_stops_later_levels() {
    let recorder = Arc::new(Recorder::default());
    let executor = executor_with(&recorder);
    let plan = Plan::new(
        "failing",
        vec![
            step("a", &[]),
            PlanStep::new("boom", "fail", json!({})).depends_on(["a"]),
            step("sibling", &["a"]),
            step("after", &["boom"]),
        ],
    );

    let err = executor
        .execute(&plan, &offline_context(), &CancellationToken::new())
        .await
        .unwrap_err();

    match &err {
        ExecutionError::ToolExecution { step_id, tool, source } => {
            assert_eq!(step_id, "boom");
            assert_eq!(tool, "fail");
            assert!(source.to_string().contains("disk on fire"));
        }
        other => panic!("expected tool failure, got {other:?}"),
    }
    assert!(err.to_string().contains("boom"));

    // The in-flight sibling finished; nothing after the failure ran.
    let steps = recorded_steps(&recorder);
    assert!(steps.contains(&"sibling".to_string()));
    assert!(!steps.contains(&"after".to_string()));
}

#[tokio::test]
async fn sequential_config_skips_steps_after_failure_in_same_level() {
    let recorder = Arc::new(Recorder::default());
    let mut registry = ToolRegistry::new();
    registry.register(RecordingTool(Arc::clone(&recorder)));
    registry.register(FailingTool);
    let executor = WorkflowExecutor::with_config(
        Arc::new(registry),
        ExecutorConfig {
            max_parallel_steps: 1,
        },
    );
    let plan = Plan::new(
        "sequential",
        vec![PlanStep::new("boom", "fail", json!({})), step("later", &[])],
    );

    let err = executor
        .execute(&plan, &offline_context(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.step_id(), Some("boom"));
    assert!(recorded_steps(&recorder).is_empty());
}

#[tokio::test]
async fn parallelism_is_bounded() {
    let gauge = Arc::new(Gauge::default());
    let mut registry = ToolRegistry::new();
    registry.register(SlowTool(Arc::clone(&gauge)));
    let executor = WorkflowExecutor::with_config(
        Arc::new(registry),
        ExecutorConfig {
            max_parallel_steps: 2,
        },
    );
    let steps = (0..6)
        .map(|i| PlanStep::new(format!("s{i}"), "slow", json!({})))
        .collect();

    let report = executor
        .execute(&Plan::new("wide", steps), &offline_context(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.levels.len(), 1);
    assert_eq!(report.outputs.len(), 6);
    assert_eq!(gauge.peak.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn cancellation_is_observed_between_levels() {
    let cancel = CancellationToken::new();
    let recorder = Arc::new(Recorder::default());
    let mut registry = ToolRegistry::new();
    registry.register(RecordingTool(Arc::clone(&recorder)));
    registry.register(CancelTool(cancel.clone()));
    let executor = WorkflowExecutor::new(Arc::new(registry));
    let plan = Plan::new(
        "cancelled",
        vec![
            PlanStep::new("stop", "cancel", json!({})),
            step("next", &["stop"]),
        ],
    );

    let err = executor
        .execute(&plan, &offline_context(), &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, ExecutionError::Cancelled));
    assert!(recorded_steps(&recorder).is_empty());
}

#[tokio::test]
async fn empty_plan_completes_immediately() {
    let recorder = Arc::new(Recorder::default());
    let executor = executor_with(&recorder);
    let ctx = offline_context();
    let report = executor
        .execute(&Plan::new("empty", vec![]), &ctx, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.run_id, ctx.run_id());
    assert!(report.outputs.is_empty());
    assert!(report.levels.is_empty());
    assert!(report.finished_at >= report.started_at);
}
