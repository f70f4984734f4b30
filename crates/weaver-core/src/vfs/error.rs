//! Typed errors for the virtual file store.

use thiserror::Error;
use uuid::Uuid;

/// Errors raised by [`super::VfsStore`] operations.
#[derive(Debug, Error)]
pub enum VfsError {
    /// An unresolved path, node id, or project. Callers may recover, e.g.
    /// by falling back to creation.
    #[error("not found: {0}")]
    NotFound(String),

    /// A sibling with the same name already exists under the parent.
    #[error("a node named {name:?} already exists in directory {parent_id}")]
    DuplicateName { parent_id: Uuid, name: String },

    /// The operation is not valid for the node's type (content on a
    /// directory, a child beneath a file, ...).
    #[error("invalid node type: {0}")]
    InvalidNodeType(String),

    #[error("invalid node name {0:?}")]
    InvalidName(String),

    /// Content the database cannot store as text, e.g. a NUL byte.
    #[error("invalid content: {0}")]
    InvalidContent(String),

    /// Structurally forbidden operations: touching the root, moving a node
    /// beneath itself.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl VfsError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_duplicate_name(&self) -> bool {
        matches!(self, Self::DuplicateName { .. })
    }
}

/// PostgreSQL SQLSTATE codes the store translates into typed errors.
pub(crate) mod sqlstate {
    pub const UNIQUE_VIOLATION: &str = "23505";
    pub const FOREIGN_KEY_VIOLATION: &str = "23503";
    pub const CHECK_VIOLATION: &str = "23514";
    pub const CHARACTER_NOT_IN_REPERTOIRE: &str = "22021";
}

/// Return the SQLSTATE of a database error, if it carries one.
pub(crate) fn sqlstate(err: &sqlx::Error) -> Option<String> {
    err.as_database_error()
        .and_then(|db| db.code())
        .map(|code| code.into_owned())
}
