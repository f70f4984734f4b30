//! `weaver sync`: replace a project's tree with a blueprint file.

use anyhow::{Context, Result};
use sqlx::PgPool;

use weaver_core::sync::{ArchitectureSynchronizer, Blueprint, SyncConfig};
use weaver_core::vfs::VfsStore;

use crate::resolve::resolve_project;

pub async fn run_sync(
    pool: &PgPool,
    sync_config: SyncConfig,
    blueprint_file: &str,
    project: &str,
) -> Result<()> {
    let content = std::fs::read_to_string(blueprint_file)
        .with_context(|| format!("failed to read blueprint file: {blueprint_file}"))?;
    let blueprint = Blueprint::from_json(&content)
        .with_context(|| format!("failed to parse blueprint file: {blueprint_file}"))?;
    let project = resolve_project(pool, project).await?;

    let synchronizer = ArchitectureSynchronizer::new(VfsStore::new(pool.clone()), sync_config);
    let report = synchronizer
        .sync(project.id, &blueprint)
        .await
        .with_context(|| format!("sync of project {} failed; nothing was changed", project.name))?;

    println!("Synchronized project {}", project.name);
    println!("  removed:  {} nodes", report.nodes_deleted);
    println!("  folders:  {}", report.folders_created);
    println!("  files:    {}", report.files_created);
    println!("  bytes:    {}", report.bytes_written);
    println!("  version:  {}", report.version);
    Ok(())
}
