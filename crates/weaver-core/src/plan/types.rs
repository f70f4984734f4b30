//! Plan wire format, as emitted by an external planner.
//!
//! ```json
//! {
//!   "name": "scaffold",
//!   "description": "Create the source tree",
//!   "steps": [
//!     { "id": "a", "tool": "create_vfs_directory", "inputs": { "path": "/src/" } },
//!     { "id": "b", "tool": "create_vfs_file",
//!       "inputs": { "path": "{{ a.path }}/index.ts", "content": "x" },
//!       "dependencies": ["a"] }
//!   ]
//! }
//! ```

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// A named, declarative list of tool invocations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub steps: Vec<PlanStep>,
}

/// One tool invocation within a [`Plan`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    /// Unique within the plan.
    pub id: String,
    /// Registry key of the tool to run.
    pub tool: String,
    /// Literal values and `{{ step.path }}` references.
    #[serde(default = "empty_object", deserialize_with = "null_as_empty_object")]
    pub inputs: Value,
    /// Ids of steps that must complete first.
    #[serde(default, alias = "dependsOn")]
    pub dependencies: Vec<String>,
}

impl PlanStep {
    pub fn new(id: impl Into<String>, tool: impl Into<String>, inputs: Value) -> Self {
        Self {
            id: id.into(),
            tool: tool.into(),
            inputs,
            dependencies: Vec::new(),
        }
    }

    pub fn depends_on<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies.extend(deps.into_iter().map(Into::into));
        self
    }
}

impl Plan {
    pub fn new(name: impl Into<String>, steps: Vec<PlanStep>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            steps,
        }
    }

    pub fn step(&self, id: &str) -> Option<&PlanStep> {
        self.steps.iter().find(|s| s.id == id)
    }
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

fn null_as_empty_object<'de, D>(deserializer: D) -> Result<Value, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(if value.is_null() { empty_object() } else { value })
}
