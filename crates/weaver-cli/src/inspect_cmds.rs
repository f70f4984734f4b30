//! Read-only inspection: `weaver tree`, `weaver cat`, `weaver version`.

use anyhow::{Context, Result};
use sqlx::PgPool;

use weaver_core::vfs::{VfsPath, VfsStore};

use crate::resolve::resolve_project;

pub async fn run_tree(pool: &PgPool, project: &str, path: &str) -> Result<()> {
    let project = resolve_project(pool, project).await?;
    let arena = VfsStore::new(pool.clone()).load_tree(project.id).await?;
    let parsed = VfsPath::parse(path)?;
    let node = arena
        .resolve(parsed.segments())
        .with_context(|| format!("{path:?} not found in project {}", project.name))?;
    print!("{}", arena.render(node.id));
    Ok(())
}

pub async fn run_cat(pool: &PgPool, project: &str, path: &str) -> Result<()> {
    let project = resolve_project(pool, project).await?;
    let file = VfsStore::new(pool.clone())
        .read_file(project.id, path)
        .await
        .with_context(|| format!("cannot read {path:?} in project {}", project.name))?;
    if let Some(content) = file.content {
        print!("{content}");
        if !content.ends_with('\n') {
            println!();
        }
    }
    Ok(())
}

pub async fn run_version(pool: &PgPool, project: &str) -> Result<()> {
    let project = resolve_project(pool, project).await?;
    let version = VfsStore::new(pool.clone())
        .compute_project_version(project.id)
        .await?;
    println!("{version}");
    Ok(())
}
