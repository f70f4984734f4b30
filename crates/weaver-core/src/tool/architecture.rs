//! `sync_architecture`: replace the project tree with a blueprint.

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use super::context::ExecutionContext;
use super::trait_def::Tool;
use super::vfs_tools::parse_input;
use crate::sync::{ArchitectureSynchronizer, Blueprint, SyncConfig};

#[derive(Debug, Deserialize)]
struct SyncInput {
    blueprint: Value,
}

/// Wraps [`ArchitectureSynchronizer`] as a tool so plans can materialize
/// a generated blueprint atomically.
pub struct SyncArchitectureTool {
    config: SyncConfig,
}

impl SyncArchitectureTool {
    pub fn new(config: SyncConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Tool for SyncArchitectureTool {
    fn name(&self) -> &str {
        "sync_architecture"
    }

    fn description(&self) -> &str {
        "Replace the whole project tree with a blueprint of files and folders, atomically"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "blueprint": {
                    "description": "A node or array of nodes: {type: file|folder, name, content?, children?}",
                    "type": ["object", "array"],
                },
            },
            "required": ["blueprint"],
        })
    }

    fn output_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "rootId": { "type": "string", "format": "uuid" },
                "nodesDeleted": { "type": "integer" },
                "filesCreated": { "type": "integer" },
                "foldersCreated": { "type": "integer" },
                "bytesWritten": { "type": "integer" },
                "version": { "type": "string" },
            },
        })
    }

    async fn execute(&self, ctx: &ExecutionContext, input: Value) -> Result<Value> {
        let input: SyncInput = parse_input(self.name(), input)?;
        let blueprint = Blueprint::from_value(input.blueprint)?;
        let synchronizer = ArchitectureSynchronizer::new(ctx.store().clone(), self.config);
        let report = synchronizer.sync(ctx.project_id(), &blueprint).await?;
        Ok(serde_json::to_value(report)?)
    }
}
