//! `weaver run`: execute a plan file against a project.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use weaver_core::executor::{ExecutionError, WorkflowExecutor};
use weaver_core::plan::parse_plan_json;
use weaver_core::tool::{ExecutionContext, ToolRegistry};
use weaver_core::vfs::VfsStore;

use crate::config::WeaverConfig;
use crate::resolve::resolve_project;

pub struct RunOptions<'a> {
    pub plan_file: &'a str,
    pub project: &'a str,
    pub user: Option<&'a str>,
}

pub async fn run_plan(pool: &PgPool, config: &WeaverConfig, opts: RunOptions<'_>) -> Result<()> {
    let content = std::fs::read_to_string(opts.plan_file)
        .with_context(|| format!("failed to read plan file: {}", opts.plan_file))?;
    let plan = parse_plan_json(&content)
        .with_context(|| format!("failed to parse plan file: {}", opts.plan_file))?;
    let project = resolve_project(pool, opts.project).await?;

    let registry = Arc::new(ToolRegistry::with_builtin_tools(config.sync));
    let executor = WorkflowExecutor::with_config(registry, config.executor);

    let mut ctx = ExecutionContext::new(VfsStore::new(pool.clone()), project.id);
    if let Some(user) = opts.user {
        ctx = ctx.with_user(user);
    }

    eprintln!(
        "Running plan {:?} ({} steps) on project {} [run {}]",
        plan.name,
        plan.steps.len(),
        project.name,
        ctx.run_id()
    );

    // First signal stops scheduling new steps; second force-exits.
    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    let got_first_signal = Arc::new(AtomicBool::new(false));
    tokio::spawn(async move {
        loop {
            tokio::signal::ctrl_c().await.ok();
            if got_first_signal.swap(true, Ordering::SeqCst) {
                eprintln!("\nForce exit.");
                std::process::exit(130);
            }
            eprintln!("\nFinishing in-flight steps (Ctrl+C again to force)...");
            cancel_clone.cancel();
        }
    });

    match executor.execute(&plan, &ctx, &cancel).await {
        Ok(report) => {
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Err(ExecutionError::Cancelled) => {
            eprintln!("Run cancelled. Completed steps keep their effects.");
            std::process::exit(130);
        }
        Err(e) => Err(e).context("plan execution failed"),
    }
}
