//! Ambient services handed to every tool call.

use uuid::Uuid;

use crate::vfs::VfsStore;

/// Per-run context passed by reference to [`super::Tool::execute`].
///
/// Carries the run identity, the project/user scope the run acts on, and
/// the store the tools mutate.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    run_id: Uuid,
    project_id: Uuid,
    user_id: Option<String>,
    store: VfsStore,
}

impl ExecutionContext {
    /// Create a context for a fresh run.
    pub fn new(store: VfsStore, project_id: Uuid) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            project_id,
            user_id: None,
            store,
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_run_id(mut self, run_id: Uuid) -> Self {
        self.run_id = run_id;
        self
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn project_id(&self) -> Uuid {
        self.project_id
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn store(&self) -> &VfsStore {
        &self.store
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;

    /// A context whose pool never connects; for tools that do not touch the store.
    pub(crate) fn offline_context() -> ExecutionContext {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgresql://localhost/weaver_offline")
            .expect("lazy pool");
        ExecutionContext::new(VfsStore::new(pool), Uuid::new_v4())
    }

    #[tokio::test]
    async fn builders_set_scope() {
        let run_id = Uuid::new_v4();
        let ctx = offline_context().with_user("ada").with_run_id(run_id);
        assert_eq!(ctx.run_id(), run_id);
        assert_eq!(ctx.user_id(), Some("ada"));
    }

    #[tokio::test]
    async fn fresh_contexts_get_distinct_run_ids() {
        assert_ne!(offline_context().run_id(), offline_context().run_id());
    }
}
