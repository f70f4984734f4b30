//! Database query functions for the `vfs_nodes` table.
//!
//! Unlike the other query modules these return raw [`sqlx::Error`]s: the VFS
//! layer inspects constraint violations (unique, foreign key, check) to turn
//! them into typed errors. Every function is generic over [`PgExecutor`] so
//! it runs equally against the pool or inside a transaction.

use sqlx::PgExecutor;
use uuid::Uuid;

use crate::models::{NewNode, VfsNode};

/// Row-level lock strength taken on a project row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectLock {
    /// `FOR SHARE`: ordinary writers, which may run concurrently.
    Shared,
    /// `FOR UPDATE`: exclusive access to the project's node set.
    Exclusive,
}

/// Lock the project row for the rest of the surrounding transaction.
///
/// Returns `false` when the project does not exist.
pub async fn lock_project<'e, E>(executor: E, project_id: Uuid, lock: ProjectLock) -> sqlx::Result<bool>
where
    E: PgExecutor<'e>,
{
    let sql = match lock {
        ProjectLock::Shared => "SELECT id FROM projects WHERE id = $1 FOR SHARE",
        ProjectLock::Exclusive => "SELECT id FROM projects WHERE id = $1 FOR UPDATE",
    };
    let row: Option<(Uuid,)> = sqlx::query_as(sql)
        .bind(project_id)
        .fetch_optional(executor)
        .await?;

    Ok(row.is_some())
}

/// Fetch the project's root node, if one exists.
pub async fn get_root<'e, E>(executor: E, project_id: Uuid) -> sqlx::Result<Option<VfsNode>>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, VfsNode>(
        "SELECT * FROM vfs_nodes WHERE project_id = $1 AND parent_id IS NULL",
    )
    .bind(project_id)
    .fetch_optional(executor)
    .await
}

/// Insert the project's root directory.
///
/// Returns `None` when a root already exists (a concurrent caller won).
pub async fn insert_root<'e, E>(executor: E, project_id: Uuid) -> sqlx::Result<Option<VfsNode>>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, VfsNode>(
        "INSERT INTO vfs_nodes (project_id, parent_id, node_type, name) \
         VALUES ($1, NULL, 'directory', '') \
         ON CONFLICT (project_id) WHERE parent_id IS NULL DO NOTHING \
         RETURNING *",
    )
    .bind(project_id)
    .fetch_optional(executor)
    .await
}

/// Fetch a single node by ID.
pub async fn get_node<'e, E>(executor: E, id: Uuid) -> sqlx::Result<Option<VfsNode>>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, VfsNode>("SELECT * FROM vfs_nodes WHERE id = $1")
        .bind(id)
        .fetch_optional(executor)
        .await
}

/// Fetch the child of `parent_id` called `name`.
pub async fn get_child<'e, E>(
    executor: E,
    project_id: Uuid,
    parent_id: Uuid,
    name: &str,
) -> sqlx::Result<Option<VfsNode>>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, VfsNode>(
        "SELECT * FROM vfs_nodes \
         WHERE project_id = $1 AND parent_id = $2 AND name = $3",
    )
    .bind(project_id)
    .bind(parent_id)
    .bind(name)
    .fetch_optional(executor)
    .await
}

/// List the direct children of a node: directories first, then by name.
pub async fn list_children<'e, E>(executor: E, parent_id: Uuid) -> sqlx::Result<Vec<VfsNode>>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, VfsNode>(
        "SELECT * FROM vfs_nodes \
         WHERE parent_id = $1 \
         ORDER BY (node_type = 'file'), name",
    )
    .bind(parent_id)
    .fetch_all(executor)
    .await
}

/// Fetch every node of a project in one query.
pub async fn list_project_nodes<'e, E>(executor: E, project_id: Uuid) -> sqlx::Result<Vec<VfsNode>>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, VfsNode>("SELECT * FROM vfs_nodes WHERE project_id = $1")
        .bind(project_id)
        .fetch_all(executor)
        .await
}

/// Count the nodes of a project, root included.
pub async fn count_nodes<'e, E>(executor: E, project_id: Uuid) -> sqlx::Result<i64>
where
    E: PgExecutor<'e>,
{
    sqlx::query_scalar("SELECT COUNT(*) FROM vfs_nodes WHERE project_id = $1")
        .bind(project_id)
        .fetch_one(executor)
        .await
}

/// Count the nodes of every project.
pub async fn count_all_nodes<'e, E>(executor: E) -> sqlx::Result<i64>
where
    E: PgExecutor<'e>,
{
    sqlx::query_scalar("SELECT COUNT(*) FROM vfs_nodes")
        .fetch_one(executor)
        .await
}

/// Whether `ancestor` is `id` itself or lies on its parent chain.
///
/// `UNION` drops repeated rows, so a corrupt parent cycle still terminates.
pub async fn is_ancestor<'e, E>(executor: E, ancestor: Uuid, id: Uuid) -> sqlx::Result<bool>
where
    E: PgExecutor<'e>,
{
    sqlx::query_scalar(
        "WITH RECURSIVE chain AS ( \
             SELECT id, parent_id FROM vfs_nodes WHERE id = $2 \
             UNION \
             SELECT n.id, n.parent_id FROM vfs_nodes n JOIN chain c ON n.id = c.parent_id \
         ) \
         SELECT EXISTS(SELECT 1 FROM chain WHERE id = $1)",
    )
    .bind(ancestor)
    .bind(id)
    .fetch_one(executor)
    .await
}

/// Insert a non-root node.
///
/// A sibling with the same name is reported by the database as a unique
/// violation.
pub async fn insert_node<'e, E>(executor: E, node: &NewNode<'_>) -> sqlx::Result<VfsNode>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, VfsNode>(
        "INSERT INTO vfs_nodes \
         (project_id, parent_id, node_type, name, content, content_hash, metadata) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         RETURNING *",
    )
    .bind(node.project_id)
    .bind(node.parent_id)
    .bind(node.node_type)
    .bind(node.name)
    .bind(node.content)
    .bind(node.content_hash)
    .bind(&node.metadata)
    .fetch_one(executor)
    .await
}

/// Insert a non-root node unless a sibling with the same name exists.
///
/// Returns `None` on a name conflict; the caller re-reads the existing node.
/// A conflicting insert from an uncommitted transaction blocks until that
/// transaction finishes.
pub async fn insert_node_if_absent<'e, E>(
    executor: E,
    node: &NewNode<'_>,
) -> sqlx::Result<Option<VfsNode>>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, VfsNode>(
        "INSERT INTO vfs_nodes \
         (project_id, parent_id, node_type, name, content, content_hash, metadata) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         ON CONFLICT (project_id, parent_id, name) WHERE parent_id IS NOT NULL DO NOTHING \
         RETURNING *",
    )
    .bind(node.project_id)
    .bind(node.parent_id)
    .bind(node.node_type)
    .bind(node.name)
    .bind(node.content)
    .bind(node.content_hash)
    .bind(&node.metadata)
    .fetch_optional(executor)
    .await
}

/// Replace a node's content and content hash.
pub async fn update_content<'e, E>(
    executor: E,
    id: Uuid,
    content: Option<&str>,
    content_hash: Option<&str>,
) -> sqlx::Result<Option<VfsNode>>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, VfsNode>(
        "UPDATE vfs_nodes \
         SET content = $1, content_hash = $2, updated_at = now() \
         WHERE id = $3 \
         RETURNING *",
    )
    .bind(content)
    .bind(content_hash)
    .bind(id)
    .fetch_optional(executor)
    .await
}

/// Merge keys into a node's metadata object.
pub async fn merge_metadata<'e, E>(
    executor: E,
    id: Uuid,
    metadata: &serde_json::Value,
) -> sqlx::Result<Option<VfsNode>>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, VfsNode>(
        "UPDATE vfs_nodes \
         SET metadata = metadata || $1, updated_at = now() \
         WHERE id = $2 \
         RETURNING *",
    )
    .bind(metadata)
    .bind(id)
    .fetch_optional(executor)
    .await
}

/// Rename a node in place.
pub async fn rename_node<'e, E>(executor: E, id: Uuid, name: &str) -> sqlx::Result<Option<VfsNode>>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, VfsNode>(
        "UPDATE vfs_nodes SET name = $1, updated_at = now() WHERE id = $2 RETURNING *",
    )
    .bind(name)
    .bind(id)
    .fetch_optional(executor)
    .await
}

/// Point a node at a new parent.
pub async fn reparent_node<'e, E>(
    executor: E,
    id: Uuid,
    parent_id: Uuid,
) -> sqlx::Result<Option<VfsNode>>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, VfsNode>(
        "UPDATE vfs_nodes SET parent_id = $1, updated_at = now() WHERE id = $2 RETURNING *",
    )
    .bind(parent_id)
    .bind(id)
    .fetch_optional(executor)
    .await
}

/// Delete a node. Descendants are removed by `ON DELETE CASCADE`.
///
/// Returns the number of rows deleted directly (0 or 1).
pub async fn delete_node<'e, E>(executor: E, id: Uuid) -> sqlx::Result<u64>
where
    E: PgExecutor<'e>,
{
    let result = sqlx::query("DELETE FROM vfs_nodes WHERE id = $1")
        .bind(id)
        .execute(executor)
        .await?;

    Ok(result.rows_affected())
}

/// Delete every node of a project except its root.
///
/// Returns the number of rows deleted.
pub async fn delete_non_root_nodes<'e, E>(executor: E, project_id: Uuid) -> sqlx::Result<u64>
where
    E: PgExecutor<'e>,
{
    let result =
        sqlx::query("DELETE FROM vfs_nodes WHERE project_id = $1 AND parent_id IS NOT NULL")
            .bind(project_id)
            .execute(executor)
            .await?;

    Ok(result.rows_affected())
}
