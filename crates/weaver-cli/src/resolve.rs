//! Project reference resolution: `--project` accepts a UUID or a name.

use anyhow::{Context, Result, bail};
use sqlx::PgPool;
use uuid::Uuid;

use weaver_db::models::Project;
use weaver_db::queries::projects;

/// How a `--project` argument should be looked up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectRef {
    Id(Uuid),
    Name(String),
}

impl ProjectRef {
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            bail!("project reference must not be empty");
        }
        Ok(match Uuid::parse_str(input) {
            Ok(id) => Self::Id(id),
            Err(_) => Self::Name(input.to_string()),
        })
    }
}

/// Load the project named by `input`.
pub async fn resolve_project(pool: &PgPool, input: &str) -> Result<Project> {
    let project = match ProjectRef::parse(input)? {
        ProjectRef::Id(id) => projects::get_project(pool, id).await?,
        ProjectRef::Name(name) => projects::get_project_by_name(pool, &name).await?,
    };
    project.with_context(|| {
        format!("project {input:?} not found (create it with `weaver project create`)")
    })
}
