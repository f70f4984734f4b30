//! The `Tool` trait -- the uniform contract every capability implements.
//!
//! The executor never special-cases behavior: it looks a tool up by name
//! and calls [`Tool::execute`] with the step's resolved inputs. The trait is
//! object-safe so tools live as `Box<dyn Tool>` in the
//! [`super::ToolRegistry`].

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Value, json};

use super::context::ExecutionContext;

/// A named, side-effecting capability.
///
/// Input and output schemas are advisory JSON Schema documents used for
/// discovery; each tool validates its own input inside `execute`.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Registry key, e.g. `"create_vfs_file"`.
    fn name(&self) -> &str;

    /// One-line description for planners.
    fn description(&self) -> &str;

    fn input_schema(&self) -> Value {
        json!({ "type": "object" })
    }

    fn output_schema(&self) -> Value {
        json!({ "type": "object" })
    }

    /// Run the tool. Any error aborts the run it belongs to.
    async fn execute(&self, ctx: &ExecutionContext, input: Value) -> Result<Value>;
}

// Compile-time assertion: Tool must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn Tool) {}
};

/// Name, description and schemas of a registered tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    pub output_schema: Value,
}

impl ToolDescriptor {
    pub fn of(tool: &dyn Tool) -> Self {
        Self {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            input_schema: tool.input_schema(),
            output_schema: tool.output_schema(),
        }
    }
}
