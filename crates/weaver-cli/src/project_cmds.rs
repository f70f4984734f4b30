//! `weaver project` subcommands.

use anyhow::{Context, Result};
use sqlx::PgPool;

use weaver_core::vfs::VfsStore;
use weaver_db::queries::projects;

use crate::ProjectCommands;

pub async fn run_project_command(command: ProjectCommands, pool: &PgPool) -> Result<()> {
    match command {
        ProjectCommands::Create { name, owner } => cmd_create(pool, &name, owner.as_deref()).await,
        ProjectCommands::List => cmd_list(pool).await,
    }
}

/// Insert the project and its root directory.
async fn cmd_create(pool: &PgPool, name: &str, owner: Option<&str>) -> Result<()> {
    let project = projects::insert_project(pool, name, owner)
        .await
        .with_context(|| format!("failed to create project {name:?}"))?;
    let root = VfsStore::new(pool.clone()).get_root(project.id).await?;

    tracing::info!(project_id = %project.id, root_id = %root.id, "project created");
    println!("Created project {} ({})", project.name, project.id);
    Ok(())
}

async fn cmd_list(pool: &PgPool) -> Result<()> {
    let all = projects::list_projects(pool).await?;
    if all.is_empty() {
        println!("No projects.");
        return Ok(());
    }

    println!("{:<36}  {:<24}  {:<12}  CREATED", "ID", "NAME", "OWNER");
    for project in &all {
        println!(
            "{:<36}  {:<24}  {:<12}  {}",
            project.id,
            project.name,
            project.owner.as_deref().unwrap_or("-"),
            project.created_at.format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}
