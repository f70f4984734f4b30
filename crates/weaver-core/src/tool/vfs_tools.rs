//! Built-in tools over the virtual file store.
//!
//! Every tool acts on the project in its [`ExecutionContext`]. Inputs and
//! outputs use camelCase keys; every output that names a node carries its
//! `id`, `path` and `type` so later steps can reference them.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use weaver_db::models::VfsNode;

use super::context::ExecutionContext;
use super::registry::ToolRegistry;
use super::trait_def::Tool;
use crate::vfs::VfsPath;

pub(crate) fn register_all(registry: &mut ToolRegistry) {
    registry.register(CreateDirectoryTool);
    registry.register(CreateFileTool);
    registry.register(ReadFileTool);
    registry.register(UpdateFileTool);
    registry.register(DeleteNodeTool);
    registry.register(RenameNodeTool);
    registry.register(MoveNodeTool);
    registry.register(ListDirectoryTool);
    registry.register(ProjectVersionTool);
}

/// Decode a tool's input, naming the tool on failure.
pub(crate) fn parse_input<T: DeserializeOwned>(tool: &str, input: Value) -> Result<T> {
    serde_json::from_value(input).with_context(|| format!("invalid input for {tool}"))
}

fn node_summary(node: &VfsNode, path: &str) -> Value {
    json!({
        "id": node.id,
        "name": node.name,
        "path": path,
        "type": node.node_type,
    })
}

fn file_summary(node: &VfsNode, path: &str) -> Value {
    let mut out = node_summary(node, path);
    out["contentHash"] = json!(node.content_hash);
    out["size"] = json!(node.content.as_ref().map_or(0, String::len));
    out
}

fn path_schema(extra: Value) -> Value {
    let mut properties = json!({ "path": { "type": "string" } });
    if let (Some(base), Some(more)) = (properties.as_object_mut(), extra.as_object()) {
        base.extend(more.clone());
    }
    json!({
        "type": "object",
        "properties": properties,
        "required": ["path"],
    })
}

fn node_output_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "id": { "type": "string", "format": "uuid" },
            "name": { "type": "string" },
            "path": { "type": "string" },
            "type": { "enum": ["file", "directory"] },
        },
    })
}

#[derive(Debug, Deserialize)]
struct PathInput {
    path: String,
}

// ---------------------------------------------------------------------------
// create_vfs_directory
// ---------------------------------------------------------------------------

/// Creates a directory (and any missing ancestors), or returns the existing one.
pub struct CreateDirectoryTool;

#[async_trait]
impl Tool for CreateDirectoryTool {
    fn name(&self) -> &str {
        "create_vfs_directory"
    }

    fn description(&self) -> &str {
        "Create a directory and any missing parents; returns the existing directory if present"
    }

    fn input_schema(&self) -> Value {
        path_schema(json!({}))
    }

    fn output_schema(&self) -> Value {
        node_output_schema()
    }

    async fn execute(&self, ctx: &ExecutionContext, input: Value) -> Result<Value> {
        let input: PathInput = parse_input(self.name(), input)?;
        let path = VfsPath::parse(&input.path)?;
        let node = if path.is_root() {
            ctx.store().get_root(ctx.project_id()).await?
        } else {
            let dir_path = format!("{}/", path.normalized());
            ctx.store().find_or_create(ctx.project_id(), &dir_path).await?
        };
        Ok(node_summary(&node, &path.normalized()))
    }
}

// ---------------------------------------------------------------------------
// create_vfs_file
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct CreateFileInput {
    path: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default = "default_true")]
    overwrite: bool,
}

fn default_true() -> bool {
    true
}

/// Writes a file, creating missing parent directories.
pub struct CreateFileTool;

#[async_trait]
impl Tool for CreateFileTool {
    fn name(&self) -> &str {
        "create_vfs_file"
    }

    fn description(&self) -> &str {
        "Create a file (and missing parent directories) with the given content"
    }

    fn input_schema(&self) -> Value {
        path_schema(json!({
            "content": { "type": ["string", "null"] },
            "overwrite": { "type": "boolean", "default": true },
        }))
    }

    fn output_schema(&self) -> Value {
        node_output_schema()
    }

    async fn execute(&self, ctx: &ExecutionContext, input: Value) -> Result<Value> {
        let input: CreateFileInput = parse_input(self.name(), input)?;
        let path = VfsPath::parse(&input.path)?;
        let store = ctx.store();

        if !input.overwrite {
            if let Some(existing) = store.resolve_path(ctx.project_id(), &input.path).await? {
                anyhow::bail!(
                    "{} already exists as a {}",
                    path.normalized(),
                    existing.node_type
                );
            }
        }

        let node = store
            .write_file(ctx.project_id(), &input.path, input.content.as_deref())
            .await?;
        Ok(file_summary(&node, &path.normalized()))
    }
}

// ---------------------------------------------------------------------------
// read_vfs_file
// ---------------------------------------------------------------------------

/// Returns a file's content.
pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_vfs_file"
    }

    fn description(&self) -> &str {
        "Read the content of a file"
    }

    fn input_schema(&self) -> Value {
        path_schema(json!({}))
    }

    fn output_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "id": { "type": "string", "format": "uuid" },
                "path": { "type": "string" },
                "content": { "type": ["string", "null"] },
                "contentHash": { "type": "string" },
            },
        })
    }

    async fn execute(&self, ctx: &ExecutionContext, input: Value) -> Result<Value> {
        let input: PathInput = parse_input(self.name(), input)?;
        let path = VfsPath::parse(&input.path)?;
        let node = ctx.store().read_file(ctx.project_id(), &input.path).await?;
        Ok(json!({
            "id": node.id,
            "path": path.normalized(),
            "content": node.content,
            "contentHash": node.content_hash,
        }))
    }
}

// ---------------------------------------------------------------------------
// update_vfs_file
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct UpdateFileInput {
    path: String,
    content: Option<String>,
}

/// Replaces the content of an existing file.
pub struct UpdateFileTool;

#[async_trait]
impl Tool for UpdateFileTool {
    fn name(&self) -> &str {
        "update_vfs_file"
    }

    fn description(&self) -> &str {
        "Replace the content of an existing file"
    }

    fn input_schema(&self) -> Value {
        let mut schema = path_schema(json!({ "content": { "type": ["string", "null"] } }));
        schema["required"] = json!(["path", "content"]);
        schema
    }

    fn output_schema(&self) -> Value {
        node_output_schema()
    }

    async fn execute(&self, ctx: &ExecutionContext, input: Value) -> Result<Value> {
        let input: UpdateFileInput = parse_input(self.name(), input)?;
        let path = VfsPath::parse(&input.path)?;
        let store = ctx.store();
        let node = store.read_file(ctx.project_id(), &input.path).await?;
        let updated = store.update_content(node.id, input.content.as_deref()).await?;
        Ok(file_summary(&updated, &path.normalized()))
    }
}

// ---------------------------------------------------------------------------
// delete_vfs_node
// ---------------------------------------------------------------------------

/// Deletes a node and its subtree.
pub struct DeleteNodeTool;

#[async_trait]
impl Tool for DeleteNodeTool {
    fn name(&self) -> &str {
        "delete_vfs_node"
    }

    fn description(&self) -> &str {
        "Delete a file, or a directory together with everything beneath it"
    }

    fn input_schema(&self) -> Value {
        path_schema(json!({}))
    }

    fn output_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "id": { "type": "string", "format": "uuid" },
                "path": { "type": "string" },
                "deleted": { "type": "boolean" },
            },
        })
    }

    async fn execute(&self, ctx: &ExecutionContext, input: Value) -> Result<Value> {
        let input: PathInput = parse_input(self.name(), input)?;
        let path = VfsPath::parse(&input.path)?;
        let store = ctx.store();
        let node = store.require_path(ctx.project_id(), &input.path).await?;
        store.delete_node(node.id).await?;
        Ok(json!({
            "id": node.id,
            "path": path.normalized(),
            "type": node.node_type,
            "deleted": true,
        }))
    }
}

// ---------------------------------------------------------------------------
// rename_vfs_node
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RenameInput {
    path: String,
    new_name: String,
}

/// Renames a node in place.
pub struct RenameNodeTool;

#[async_trait]
impl Tool for RenameNodeTool {
    fn name(&self) -> &str {
        "rename_vfs_node"
    }

    fn description(&self) -> &str {
        "Rename a file or directory within its parent directory"
    }

    fn input_schema(&self) -> Value {
        let mut schema = path_schema(json!({ "newName": { "type": "string" } }));
        schema["required"] = json!(["path", "newName"]);
        schema
    }

    fn output_schema(&self) -> Value {
        node_output_schema()
    }

    async fn execute(&self, ctx: &ExecutionContext, input: Value) -> Result<Value> {
        let input: RenameInput = parse_input(self.name(), input)?;
        let path = VfsPath::parse(&input.path)?;
        let store = ctx.store();
        let node = store.require_path(ctx.project_id(), &input.path).await?;
        let renamed = store.rename_node(node.id, &input.new_name).await?;
        let new_path = path.parent().join(&renamed.name)?;
        let mut out = node_summary(&renamed, &new_path.normalized());
        out["oldPath"] = json!(path.normalized());
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// move_vfs_node
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct MoveInput {
    path: String,
    destination: String,
}

/// Moves a node beneath another directory, creating the destination if needed.
pub struct MoveNodeTool;

#[async_trait]
impl Tool for MoveNodeTool {
    fn name(&self) -> &str {
        "move_vfs_node"
    }

    fn description(&self) -> &str {
        "Move a file or directory beneath a destination directory"
    }

    fn input_schema(&self) -> Value {
        let mut schema = path_schema(json!({ "destination": { "type": "string" } }));
        schema["required"] = json!(["path", "destination"]);
        schema
    }

    fn output_schema(&self) -> Value {
        node_output_schema()
    }

    async fn execute(&self, ctx: &ExecutionContext, input: Value) -> Result<Value> {
        let input: MoveInput = parse_input(self.name(), input)?;
        let source = VfsPath::parse(&input.path)?;
        let destination = VfsPath::parse(&input.destination)?;
        let store = ctx.store();

        let node = store.require_path(ctx.project_id(), &input.path).await?;
        let moved = store.move_node_to(node.id, &input.destination).await?;

        let new_path = destination.join(&moved.name)?;
        let mut out = node_summary(&moved, &new_path.normalized());
        out["oldPath"] = json!(source.normalized());
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// list_vfs_directory
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ListInput {
    #[serde(default = "default_root")]
    path: String,
    #[serde(default)]
    recursive: bool,
}

fn default_root() -> String {
    "/".to_string()
}

/// Lists a directory's children, or its whole subtree.
pub struct ListDirectoryTool;

#[async_trait]
impl Tool for ListDirectoryTool {
    fn name(&self) -> &str {
        "list_vfs_directory"
    }

    fn description(&self) -> &str {
        "List the entries of a directory, optionally recursively"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "default": "/" },
                "recursive": { "type": "boolean", "default": false },
            },
        })
    }

    fn output_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string" },
                "entries": { "type": "array", "items": node_output_schema() },
            },
        })
    }

    async fn execute(&self, ctx: &ExecutionContext, input: Value) -> Result<Value> {
        let input: ListInput = parse_input(self.name(), input)?;
        let path = VfsPath::parse(&input.path)?;
        let store = ctx.store();
        let entries = if input.recursive {
            let dir = store.require_path(ctx.project_id(), &input.path).await?;
            if dir.is_file() {
                anyhow::bail!("{} is a file, not a directory", path.normalized());
            }
            store.list_subtree(ctx.project_id(), &input.path).await?
        } else {
            store.list_children(ctx.project_id(), &input.path).await?
        };
        let entries: Vec<Value> = entries
            .iter()
            .map(|e| node_summary(&e.node, &e.path))
            .collect();
        Ok(json!({ "path": path.normalized(), "entries": entries }))
    }
}

// ---------------------------------------------------------------------------
// get_project_version
// ---------------------------------------------------------------------------

/// Reports the project's current content version.
pub struct ProjectVersionTool;

#[async_trait]
impl Tool for ProjectVersionTool {
    fn name(&self) -> &str {
        "get_project_version"
    }

    fn description(&self) -> &str {
        "Return a hash identifying the current content of every file in the project"
    }

    fn output_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "version": { "type": "string" } },
        })
    }

    async fn execute(&self, ctx: &ExecutionContext, _input: Value) -> Result<Value> {
        let version = ctx
            .store()
            .compute_project_version(ctx.project_id())
            .await?;
        Ok(json!({ "version": version }))
    }
}
