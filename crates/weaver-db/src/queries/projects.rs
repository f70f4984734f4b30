//! Database query functions for the `projects` table.

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::Project;

/// Insert a new project row. Returns the inserted project with
/// server-generated defaults (id, created_at).
pub async fn insert_project(pool: &PgPool, name: &str, owner: Option<&str>) -> Result<Project> {
    let project = sqlx::query_as::<_, Project>(
        "INSERT INTO projects (name, owner) \
         VALUES ($1, $2) \
         RETURNING *",
    )
    .bind(name)
    .bind(owner)
    .fetch_one(pool)
    .await
    .with_context(|| format!("failed to insert project {name:?}"))?;

    Ok(project)
}

/// Fetch a project by its ID.
pub async fn get_project(pool: &PgPool, id: Uuid) -> Result<Option<Project>> {
    let project = sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch project")?;

    Ok(project)
}

/// Fetch a project by its unique name.
pub async fn get_project_by_name(pool: &PgPool, name: &str) -> Result<Option<Project>> {
    let project = sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE name = $1")
        .bind(name)
        .fetch_optional(pool)
        .await
        .context("failed to fetch project by name")?;

    Ok(project)
}

/// List all projects, ordered by creation time (newest first).
pub async fn list_projects(pool: &PgPool) -> Result<Vec<Project>> {
    let projects =
        sqlx::query_as::<_, Project>("SELECT * FROM projects ORDER BY created_at DESC, name")
            .fetch_all(pool)
            .await
            .context("failed to list projects")?;

    Ok(projects)
}

/// Number of projects.
pub async fn count_projects(pool: &PgPool) -> Result<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM projects")
        .fetch_one(pool)
        .await
        .context("failed to count projects")
}

/// Delete a project. Its node tree goes with it via `ON DELETE CASCADE`.
pub async fn delete_project(pool: &PgPool, id: Uuid) -> Result<()> {
    let result = sqlx::query("DELETE FROM projects WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .context("failed to delete project")?;

    if result.rows_affected() == 0 {
        anyhow::bail!("project {id} not found");
    }

    Ok(())
}
