//! Path-addressed node store over the flat `vfs_nodes` table.
//!
//! Reads run directly against the pool. Every write runs in a transaction
//! that first locks the project row. Creates, updates, renames and deletes
//! take the shared lock and proceed concurrently. Moves and the architecture
//! synchronizer take the exclusive lock: a move's ancestry check is only
//! sound while no other move can rewire the parent chain.
//! Sibling-name uniqueness is enforced by a unique index; the store turns
//! the resulting violations into [`VfsError::DuplicateName`].

use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use uuid::Uuid;

use weaver_db::models::{NewNode, NodeType, VfsNode};
use weaver_db::queries::nodes::{self, ProjectLock};

use super::error::{VfsError, sqlstate};
use super::path::{VfsPath, child_path, validate_name};
use super::tree::{NodeArena, VfsEntry};
use super::version::{content_hash, project_version};

/// Handle to the virtual file store. Cheap to clone.
#[derive(Debug, Clone)]
pub struct VfsStore {
    pool: PgPool,
}

impl VfsStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // -------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------

    /// Return the project's root, creating it if it is missing.
    ///
    /// Fails with [`VfsError::NotFound`] when the project does not exist.
    pub async fn get_root(&self, project_id: Uuid) -> Result<VfsNode, VfsError> {
        if let Some(root) = nodes::get_root(&self.pool, project_id).await? {
            return Ok(root);
        }
        let mut conn = self.pool.acquire().await?;
        ensure_root(&mut conn, project_id).await
    }

    /// Fetch a node by ID.
    pub async fn get_node(&self, id: Uuid) -> Result<VfsNode, VfsError> {
        nodes::get_node(&self.pool, id)
            .await?
            .ok_or_else(|| VfsError::NotFound(format!("node {id}")))
    }

    /// Resolve a path to a node, or `None` if any segment is missing.
    ///
    /// `""` and `"/"` resolve to the root without traversal.
    pub async fn resolve_path(
        &self,
        project_id: Uuid,
        path: &str,
    ) -> Result<Option<VfsNode>, VfsError> {
        let path = VfsPath::parse(path)?;
        self.resolve_parsed(project_id, &path).await
    }

    /// Resolve a path, failing with [`VfsError::NotFound`] when it is missing.
    pub async fn require_path(&self, project_id: Uuid, path: &str) -> Result<VfsNode, VfsError> {
        self.resolve_path(project_id, path)
            .await?
            .ok_or_else(|| VfsError::NotFound(format!("path {path:?}")))
    }

    async fn resolve_parsed(
        &self,
        project_id: Uuid,
        path: &VfsPath,
    ) -> Result<Option<VfsNode>, VfsError> {
        let mut current = self.get_root(project_id).await?;
        for segment in path.segments() {
            match nodes::get_child(&self.pool, project_id, current.id, segment).await? {
                Some(child) => current = child,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    /// Read a file node by path.
    pub async fn read_file(&self, project_id: Uuid, path: &str) -> Result<VfsNode, VfsError> {
        let node = self.require_path(project_id, path).await?;
        if !node.is_file() {
            return Err(VfsError::InvalidNodeType(format!(
                "{path:?} is a directory, not a file"
            )));
        }
        Ok(node)
    }

    /// Direct children of the directory at `path`, with their paths.
    pub async fn list_children(
        &self,
        project_id: Uuid,
        path: &str,
    ) -> Result<Vec<VfsEntry>, VfsError> {
        let parsed = VfsPath::parse(path)?;
        let dir = self
            .resolve_parsed(project_id, &parsed)
            .await?
            .ok_or_else(|| VfsError::NotFound(format!("path {path:?}")))?;
        if dir.is_file() {
            return Err(VfsError::InvalidNodeType(format!(
                "{path:?} is a file and has no children"
            )));
        }

        let base = parsed.normalized();
        let children = nodes::list_children(&self.pool, dir.id).await?;
        Ok(children
            .into_iter()
            .map(|node| VfsEntry {
                path: child_path(&base, &node.name),
                node,
            })
            .collect())
    }

    /// Every transitive descendant of the node at `path`, in pre-order.
    pub async fn list_subtree(
        &self,
        project_id: Uuid,
        path: &str,
    ) -> Result<Vec<VfsEntry>, VfsError> {
        let parsed = VfsPath::parse(path)?;
        let arena = self.load_tree(project_id).await?;
        let node = arena
            .resolve(parsed.segments())
            .ok_or_else(|| VfsError::NotFound(format!("path {path:?}")))?;
        Ok(arena.descendants(node.id))
    }

    /// Load every node of the project into an in-memory arena.
    pub async fn load_tree(&self, project_id: Uuid) -> Result<NodeArena, VfsError> {
        self.get_root(project_id).await?;
        let all = nodes::list_project_nodes(&self.pool, project_id).await?;
        Ok(NodeArena::new(all))
    }

    /// Absolute path of a node.
    pub async fn node_path(&self, id: Uuid) -> Result<String, VfsError> {
        let node = self.get_node(id).await?;
        let arena = self.load_tree(node.project_id).await?;
        arena
            .path_of(id)
            .ok_or_else(|| VfsError::NotFound(format!("node {id}")))
    }

    /// Hash over every file's content hash; see [`super::version`].
    pub async fn compute_project_version(&self, project_id: Uuid) -> Result<String, VfsError> {
        let arena = self.load_tree(project_id).await?;
        Ok(project_version(&arena))
    }

    // -------------------------------------------------------------------
    // Writes
    // -------------------------------------------------------------------

    /// Resolve `path`, creating whatever is missing.
    ///
    /// Intermediate segments are created as directories. The final segment
    /// is a file unless the path ends with `/`. A name created concurrently
    /// by another writer resolves to that writer's node.
    pub async fn find_or_create(&self, project_id: Uuid, path: &str) -> Result<VfsNode, VfsError> {
        let parsed = VfsPath::parse(path)?;
        if let Some(existing) = self.resolve_parsed(project_id, &parsed).await? {
            check_directory_intent(&parsed, &existing)?;
            return Ok(existing);
        }

        let mut tx = self.begin_write(project_id).await?;
        let node = find_or_create_in(&mut tx, project_id, &parsed).await?;
        tx.commit().await?;

        tracing::debug!(project_id = %project_id, path = %parsed, node_id = %node.id, "find_or_create");
        Ok(node)
    }

    /// Create a node under an explicit parent.
    ///
    /// Unlike [`Self::find_or_create`], a sibling with the same name is an
    /// error ([`VfsError::DuplicateName`]).
    pub async fn create_node(
        &self,
        project_id: Uuid,
        parent_id: Uuid,
        name: &str,
        node_type: NodeType,
        content: Option<&str>,
    ) -> Result<VfsNode, VfsError> {
        validate_name(name)?;
        if node_type.is_directory() && content.is_some() {
            return Err(VfsError::InvalidNodeType(format!(
                "directory {name:?} cannot hold content"
            )));
        }

        let mut tx = self.begin_write(project_id).await?;
        let parent = nodes::get_node(&mut *tx, parent_id)
            .await?
            .filter(|p| p.project_id == project_id)
            .ok_or_else(|| VfsError::NotFound(format!("parent directory {parent_id}")))?;
        if parent.is_file() {
            return Err(VfsError::InvalidNodeType(format!(
                "cannot create {name:?} beneath file {:?}",
                parent.name
            )));
        }

        let hash = node_type.is_file().then(|| content_hash(content));
        let new = NewNode {
            project_id,
            parent_id,
            node_type,
            name,
            content,
            content_hash: hash.as_deref(),
            metadata: serde_json::json!({}),
        };
        let node = nodes::insert_node(&mut *tx, &new)
            .await
            .map_err(|e| map_write_error(e, parent_id, name))?;
        tx.commit().await?;

        Ok(node)
    }

    /// Replace a file's content. `None` clears it.
    pub async fn update_content(
        &self,
        node_id: Uuid,
        content: Option<&str>,
    ) -> Result<VfsNode, VfsError> {
        let (mut tx, node) = self.begin_node_write(node_id).await?;
        let updated = set_content_in(&mut tx, &node, content).await?;
        tx.commit().await?;
        Ok(updated)
    }

    /// Create or overwrite the file at `path`.
    ///
    /// Missing parents, the file and its content are written in one
    /// transaction; a failed write leaves nothing behind.
    pub async fn write_file(
        &self,
        project_id: Uuid,
        path: &str,
        content: Option<&str>,
    ) -> Result<VfsNode, VfsError> {
        let parsed = VfsPath::parse(path)?;
        if parsed.is_root() || parsed.wants_directory() {
            return Err(VfsError::InvalidNodeType(format!(
                "{path:?} names a directory, not a file"
            )));
        }

        let mut tx = self.begin_write(project_id).await?;
        let node = find_or_create_in(&mut tx, project_id, &parsed).await?;
        if node.is_directory() {
            return Err(VfsError::InvalidNodeType(format!(
                "{path:?} is a directory, not a file"
            )));
        }
        let written = set_content_in(&mut tx, &node, content).await?;
        tx.commit().await?;

        tracing::debug!(project_id = %project_id, path = %parsed, node_id = %written.id, "wrote file");
        Ok(written)
    }

    /// Merge keys into a node's opaque metadata.
    pub async fn merge_metadata(
        &self,
        node_id: Uuid,
        metadata: &serde_json::Value,
    ) -> Result<VfsNode, VfsError> {
        if !metadata.is_object() {
            return Err(VfsError::InvalidOperation(
                "metadata must be a JSON object".to_string(),
            ));
        }
        let (mut tx, _) = self.begin_node_write(node_id).await?;
        let updated = nodes::merge_metadata(&mut *tx, node_id, metadata)
            .await?
            .ok_or_else(|| VfsError::NotFound(format!("node {node_id}")))?;
        tx.commit().await?;
        Ok(updated)
    }

    /// Rename a node within its directory.
    pub async fn rename_node(&self, node_id: Uuid, new_name: &str) -> Result<VfsNode, VfsError> {
        validate_name(new_name)?;
        let (mut tx, node) = self.begin_node_write(node_id).await?;
        let Some(parent_id) = node.parent_id else {
            return Err(VfsError::InvalidOperation(
                "the root cannot be renamed".to_string(),
            ));
        };
        if node.name == new_name {
            return Ok(node);
        }

        let renamed = nodes::rename_node(&mut *tx, node_id, new_name)
            .await
            .map_err(|e| map_write_error(e, parent_id, new_name))?
            .ok_or_else(|| VfsError::NotFound(format!("node {node_id}")))?;
        tx.commit().await?;

        Ok(renamed)
    }

    /// Move a node (and its subtree) under a new parent directory.
    ///
    /// Moves hold the exclusive project lock, so two crossing moves cannot
    /// both pass the ancestry check.
    pub async fn move_node(&self, node_id: Uuid, new_parent_id: Uuid) -> Result<VfsNode, VfsError> {
        let (mut tx, node) = self
            .begin_node_write_locked(node_id, ProjectLock::Exclusive)
            .await?;
        let moved = reparent_in(&mut tx, &node, new_parent_id).await?;
        tx.commit().await?;
        Ok(moved)
    }

    /// Move a node beneath the directory at `destination`, creating the
    /// directory (and its parents) when missing.
    ///
    /// The destination is only kept if the move succeeds.
    pub async fn move_node_to(
        &self,
        node_id: Uuid,
        destination: &str,
    ) -> Result<VfsNode, VfsError> {
        let parsed = VfsPath::parse(destination)?;
        let (mut tx, node) = self
            .begin_node_write_locked(node_id, ProjectLock::Exclusive)
            .await?;
        let parent = find_or_create_dir_in(&mut tx, node.project_id, &parsed).await?;
        let moved = reparent_in(&mut tx, &node, parent.id).await?;
        tx.commit().await?;

        tracing::debug!(node_id = %node_id, destination = %parsed, "moved node");
        Ok(moved)
    }

    /// Delete a node and, for directories, its entire subtree.
    pub async fn delete_node(&self, node_id: Uuid) -> Result<(), VfsError> {
        let (mut tx, node) = self.begin_node_write(node_id).await?;
        if node.is_root() {
            return Err(VfsError::InvalidOperation(
                "the root cannot be deleted".to_string(),
            ));
        }
        let deleted = nodes::delete_node(&mut *tx, node_id).await?;
        if deleted == 0 {
            return Err(VfsError::NotFound(format!("node {node_id}")));
        }
        tx.commit().await?;

        tracing::debug!(node_id = %node_id, name = %node.name, "deleted node");
        Ok(())
    }

    // -------------------------------------------------------------------
    // Transactions
    // -------------------------------------------------------------------

    /// Begin a transaction holding the project lock at the given strength.
    pub(crate) async fn begin_locked(
        &self,
        project_id: Uuid,
        lock: ProjectLock,
    ) -> Result<Transaction<'static, Postgres>, VfsError> {
        let mut tx = self.pool.begin().await?;
        if !nodes::lock_project(&mut *tx, project_id, lock).await? {
            return Err(VfsError::NotFound(format!("project {project_id}")));
        }
        Ok(tx)
    }

    async fn begin_write(&self, project_id: Uuid) -> Result<Transaction<'static, Postgres>, VfsError> {
        self.begin_locked(project_id, ProjectLock::Shared).await
    }

    async fn begin_node_write(
        &self,
        node_id: Uuid,
    ) -> Result<(Transaction<'static, Postgres>, VfsNode), VfsError> {
        self.begin_node_write_locked(node_id, ProjectLock::Shared).await
    }

    /// Begin a write on an existing node; the node is re-read under the lock.
    async fn begin_node_write_locked(
        &self,
        node_id: Uuid,
        lock: ProjectLock,
    ) -> Result<(Transaction<'static, Postgres>, VfsNode), VfsError> {
        let node = self.get_node(node_id).await?;
        let mut tx = self.begin_locked(node.project_id, lock).await?;
        let node = nodes::get_node(&mut *tx, node_id)
            .await?
            .ok_or_else(|| VfsError::NotFound(format!("node {node_id}")))?;
        Ok((tx, node))
    }
}

/// Fetch the project's root on `conn`, inserting it when absent.
pub(crate) async fn ensure_root(conn: &mut PgConnection, project_id: Uuid) -> Result<VfsNode, VfsError> {
    if let Some(root) = nodes::get_root(&mut *conn, project_id).await? {
        return Ok(root);
    }

    match nodes::insert_root(&mut *conn, project_id).await {
        Ok(Some(root)) => {
            tracing::info!(project_id = %project_id, root_id = %root.id, "created missing project root");
            Ok(root)
        }
        Ok(None) => nodes::get_root(&mut *conn, project_id)
            .await?
            .ok_or_else(|| VfsError::NotFound(format!("root of project {project_id}"))),
        Err(e) if sqlstate(&e).as_deref() == Some(super::error::sqlstate::FOREIGN_KEY_VIOLATION) => {
            Err(VfsError::NotFound(format!("project {project_id}")))
        }
        Err(e) => Err(e.into()),
    }
}

/// Walk `path` from the root on `conn`, creating missing segments.
///
/// Intermediate segments become directories; the last one is a file unless
/// the path wants a directory.
async fn find_or_create_in(
    conn: &mut PgConnection,
    project_id: Uuid,
    path: &VfsPath,
) -> Result<VfsNode, VfsError> {
    let mut current = ensure_root(&mut *conn, project_id).await?;
    let count = path.segments().len();

    for (i, name) in path.segments().iter().enumerate() {
        if current.is_file() {
            return Err(VfsError::InvalidNodeType(format!(
                "cannot create {name:?} beneath file {:?}",
                current.name
            )));
        }
        let last = i + 1 == count;
        let node_type = if last && !path.wants_directory() {
            NodeType::File
        } else {
            NodeType::Directory
        };

        current = match nodes::get_child(&mut *conn, project_id, current.id, name).await? {
            Some(child) => child,
            None => insert_or_existing(&mut *conn, project_id, current.id, name, node_type).await?,
        };
    }

    check_directory_intent(path, &current)?;
    Ok(current)
}

/// Find or create the directory at `path`; the root when `path` is empty.
async fn find_or_create_dir_in(
    conn: &mut PgConnection,
    project_id: Uuid,
    path: &VfsPath,
) -> Result<VfsNode, VfsError> {
    let dir = if path.is_root() {
        ensure_root(&mut *conn, project_id).await?
    } else {
        let as_dir = VfsPath::parse(&format!("{}/", path.normalized()))?;
        find_or_create_in(&mut *conn, project_id, &as_dir).await?
    };
    if dir.is_file() {
        return Err(VfsError::InvalidNodeType(format!(
            "{path} is a file, not a directory"
        )));
    }
    Ok(dir)
}

/// Replace a file's content on `conn`. Clearing a directory is a no-op.
async fn set_content_in(
    conn: &mut PgConnection,
    node: &VfsNode,
    content: Option<&str>,
) -> Result<VfsNode, VfsError> {
    if node.is_directory() {
        if content.is_none() {
            return Ok(node.clone());
        }
        return Err(VfsError::InvalidNodeType(format!(
            "cannot write content to directory {:?}",
            node.name
        )));
    }

    let hash = content_hash(content);
    nodes::update_content(&mut *conn, node.id, content, Some(hash.as_str()))
        .await
        .map_err(|e| map_write_error(e, node.parent_id.unwrap_or(node.id), &node.name))?
        .ok_or_else(|| VfsError::NotFound(format!("node {}", node.id)))
}

/// Point `node` at `new_parent_id` on `conn`, refusing the root, file
/// parents and moves beneath the node itself.
async fn reparent_in(
    conn: &mut PgConnection,
    node: &VfsNode,
    new_parent_id: Uuid,
) -> Result<VfsNode, VfsError> {
    if node.is_root() {
        return Err(VfsError::InvalidOperation(
            "the root cannot be moved".to_string(),
        ));
    }
    if node.parent_id == Some(new_parent_id) {
        return Ok(node.clone());
    }

    let parent = nodes::get_node(&mut *conn, new_parent_id)
        .await?
        .filter(|p| p.project_id == node.project_id)
        .ok_or_else(|| VfsError::NotFound(format!("destination directory {new_parent_id}")))?;
    if parent.is_file() {
        return Err(VfsError::InvalidNodeType(format!(
            "cannot move {:?} beneath file {:?}",
            node.name, parent.name
        )));
    }
    if nodes::is_ancestor(&mut *conn, node.id, new_parent_id).await? {
        return Err(VfsError::InvalidOperation(format!(
            "cannot move {:?} beneath itself",
            node.name
        )));
    }

    nodes::reparent_node(&mut *conn, node.id, new_parent_id)
        .await
        .map_err(|e| map_write_error(e, new_parent_id, &node.name))?
        .ok_or_else(|| VfsError::NotFound(format!("node {}", node.id)))
}

/// Insert a child, or return the sibling that already holds the name.
async fn insert_or_existing(
    conn: &mut PgConnection,
    project_id: Uuid,
    parent_id: Uuid,
    name: &str,
    node_type: NodeType,
) -> Result<VfsNode, VfsError> {
    let hash = node_type.is_file().then(|| content_hash(None));
    let new = NewNode {
        project_id,
        parent_id,
        node_type,
        name,
        content: None,
        content_hash: hash.as_deref(),
        metadata: serde_json::json!({}),
    };

    match nodes::insert_node_if_absent(&mut *conn, &new)
        .await
        .map_err(|e| map_write_error(e, parent_id, name))?
    {
        Some(node) => Ok(node),
        None => nodes::get_child(&mut *conn, project_id, parent_id, name)
            .await?
            .ok_or_else(|| VfsError::NotFound(format!("{name:?} vanished during creation"))),
    }
}

/// A trailing `/` on an existing file is a type mismatch.
fn check_directory_intent(path: &VfsPath, node: &VfsNode) -> Result<(), VfsError> {
    if path.wants_directory() && node.is_file() {
        return Err(VfsError::InvalidNodeType(format!(
            "{path} names a directory but a file exists there"
        )));
    }
    Ok(())
}

/// Translate constraint violations from an insert/update into typed errors.
pub(crate) fn map_write_error(err: sqlx::Error, parent_id: Uuid, name: &str) -> VfsError {
    use super::error::sqlstate::{
        CHARACTER_NOT_IN_REPERTOIRE, CHECK_VIOLATION, FOREIGN_KEY_VIOLATION, UNIQUE_VIOLATION,
    };

    match sqlstate(&err).as_deref() {
        Some(UNIQUE_VIOLATION) => VfsError::DuplicateName {
            parent_id,
            name: name.to_string(),
        },
        Some(FOREIGN_KEY_VIOLATION) => {
            VfsError::NotFound(format!("parent directory {parent_id}"))
        }
        Some(CHECK_VIOLATION) => {
            VfsError::InvalidNodeType(format!("{name:?} violates a node type constraint"))
        }
        Some(CHARACTER_NOT_IN_REPERTOIRE) => VfsError::InvalidContent(format!(
            "{name:?} holds bytes that cannot be stored as UTF-8 text"
        )),
        _ => VfsError::Database(err),
    }
}
