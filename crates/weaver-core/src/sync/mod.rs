//! Architecture synchronizer: materializes a [`Blueprint`] into a project's
//! virtual file store as one transaction.
//!
//! The sync is a full replace. Under an exclusive lock on the project it
//! deletes every non-root node, then walks the blueprint depth-first and
//! inserts one node per blueprint node. Any failure (an oversized file, a
//! duplicate sibling name, an invalid name) rolls the whole transaction
//! back, leaving the previous tree untouched.

pub mod blueprint;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use weaver_db::models::{NewNode, NodeType};
use weaver_db::queries::nodes::{self, ProjectLock};

use crate::vfs::path::{child_path, validate_name};
use crate::vfs::store::{ensure_root, map_write_error};
use crate::vfs::{NodeArena, VfsError, VfsStore, content_hash, project_version};

pub use blueprint::{Blueprint, BlueprintError, BlueprintNode};

/// Default per-file content limit: 1 MiB.
pub const DEFAULT_MAX_FILE_BYTES: usize = 1024 * 1024;

/// Synchronizer limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Largest file content, in bytes, a blueprint may carry.
    pub max_file_bytes: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
        }
    }
}

/// Errors that abort a synchronization.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("file {path} is {size} bytes, exceeding the {max}-byte limit")]
    ContentSizeExceeded { path: String, size: usize, max: usize },

    #[error(transparent)]
    Vfs(#[from] VfsError),
}

impl From<sqlx::Error> for SyncError {
    fn from(err: sqlx::Error) -> Self {
        Self::Vfs(VfsError::Database(err))
    }
}

/// Outcome of a successful synchronization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub root_id: Uuid,
    pub nodes_deleted: u64,
    pub files_created: usize,
    pub folders_created: usize,
    pub bytes_written: usize,
    /// Project version after the sync.
    pub version: String,
}

/// Replaces a project's tree with a blueprint.
#[derive(Debug, Clone)]
pub struct ArchitectureSynchronizer {
    store: VfsStore,
    config: SyncConfig,
}

impl ArchitectureSynchronizer {
    pub fn new(store: VfsStore, config: SyncConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> SyncConfig {
        self.config
    }

    /// Materialize `blueprint` as the project's entire tree.
    pub async fn sync(
        &self,
        project_id: Uuid,
        blueprint: &Blueprint,
    ) -> Result<SyncReport, SyncError> {
        let mut tx = self
            .store
            .begin_locked(project_id, ProjectLock::Exclusive)
            .await?;

        let root = ensure_root(&mut tx, project_id).await?;
        let nodes_deleted = nodes::delete_non_root_nodes(&mut *tx, project_id).await?;

        let mut files_created = 0;
        let mut folders_created = 0;
        let mut bytes_written = 0;

        // Pre-order walk; parents are inserted before their children.
        let mut stack: Vec<(Uuid, String, &BlueprintNode)> = blueprint
            .nodes
            .iter()
            .rev()
            .map(|node| (root.id, "/".to_string(), node))
            .collect();

        while let Some((parent_id, parent_path, node)) = stack.pop() {
            let name = node.name();
            validate_name(name)?;
            let path = child_path(&parent_path, name);

            match node {
                BlueprintNode::File { content, .. } => {
                    let size = content.as_ref().map_or(0, String::len);
                    if size > self.config.max_file_bytes {
                        return Err(SyncError::ContentSizeExceeded {
                            path,
                            size,
                            max: self.config.max_file_bytes,
                        });
                    }
                    let hash = content_hash(content.as_deref());
                    let new = NewNode {
                        project_id,
                        parent_id,
                        node_type: NodeType::File,
                        name,
                        content: content.as_deref(),
                        content_hash: Some(&hash),
                        metadata: serde_json::json!({}),
                    };
                    nodes::insert_node(&mut *tx, &new)
                        .await
                        .map_err(|e| map_write_error(e, parent_id, name))?;
                    files_created += 1;
                    bytes_written += size;
                }
                BlueprintNode::Folder { children, .. } => {
                    let new = NewNode {
                        project_id,
                        parent_id,
                        node_type: NodeType::Directory,
                        name,
                        content: None,
                        content_hash: None,
                        metadata: serde_json::json!({}),
                    };
                    let folder = nodes::insert_node(&mut *tx, &new)
                        .await
                        .map_err(|e| map_write_error(e, parent_id, name))?;
                    folders_created += 1;
                    for child in children.iter().rev() {
                        stack.push((folder.id, path.clone(), child));
                    }
                }
            }
        }

        let arena = NodeArena::new(nodes::list_project_nodes(&mut *tx, project_id).await?);
        let version = project_version(&arena);
        tx.commit().await?;

        tracing::info!(
            project_id = %project_id,
            nodes_deleted,
            files_created,
            folders_created,
            bytes_written,
            version = %version,
            "architecture synchronized"
        );

        Ok(SyncReport {
            root_id: root.id,
            nodes_deleted,
            files_created,
            folders_created,
            bytes_written,
            version,
        })
    }
}
