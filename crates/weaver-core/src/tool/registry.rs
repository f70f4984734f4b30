//! Tool registry -- a named collection of available tools.
//!
//! Built once at process start and handed to the executor. Registering a
//! tool under a name that is already taken replaces the old tool, so a
//! caller can patch in a replacement without rebuilding the registry.

use std::collections::HashMap;

use crate::sync::SyncConfig;

use super::architecture::SyncArchitectureTool;
use super::trait_def::{Tool, ToolDescriptor};
use super::vfs_tools;

/// A collection of registered [`Tool`] implementations, keyed by name.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in VFS tool plus `sync_architecture`.
    pub fn with_builtin_tools(sync_config: SyncConfig) -> Self {
        let mut registry = Self::new();
        vfs_tools::register_all(&mut registry);
        registry.register(SyncArchitectureTool::new(sync_config));
        registry
    }

    /// Register a tool under [`Tool::name`].
    ///
    /// An existing tool with the same name is replaced and returned.
    pub fn register(&mut self, tool: impl Tool + 'static) -> Option<Box<dyn Tool>> {
        let name = tool.name().to_string();
        let old = self.tools.insert(name.clone(), Box::new(tool));
        if old.is_some() {
            tracing::warn!(tool = %name, "tool re-registered; previous implementation replaced");
        }
        old
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|b| b.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Names of all registered tools, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Descriptors of all registered tools, sorted by name.
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.list()
            .into_iter()
            .filter_map(|name| self.get(name))
            .map(ToolDescriptor::of)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.list())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::ExecutionContext;
    use anyhow::Result;
    use async_trait::async_trait;
    use serde_json::{Value, json};

    struct FakeTool {
        tool_name: String,
        reply: Value,
    }

    impl FakeTool {
        fn new(name: &str, reply: Value) -> Self {
            Self {
                tool_name: name.to_string(),
                reply,
            }
        }
    }

    #[async_trait]
    impl Tool for FakeTool {
        fn name(&self) -> &str {
            &self.tool_name
        }

        fn description(&self) -> &str {
            "fake"
        }

        async fn execute(&self, _ctx: &ExecutionContext, _input: Value) -> Result<Value> {
            Ok(self.reply.clone())
        }
    }

    #[test]
    fn registry_starts_empty() {
        let registry = ToolRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
        assert!(registry.list().is_empty());
    }

    #[test]
    fn register_and_get() {
        let mut registry = ToolRegistry::new();
        assert!(registry.register(FakeTool::new("alpha", json!(1))).is_none());
        assert_eq!(registry.get("alpha").map(|t| t.name()), Some("alpha"));
        assert!(registry.contains("alpha"));
        assert!(registry.get("missing").is_none());
    }

    #[tokio::test]
    async fn register_overwrites_existing() {
        let mut registry = ToolRegistry::new();
        registry.register(FakeTool::new("alpha", json!("old")));
        let old = registry.register(FakeTool::new("alpha", json!("new")));
        assert!(old.is_some());
        assert_eq!(registry.len(), 1);

        let ctx = crate::tool::context::tests::offline_context();
        let out = registry
            .get("alpha")
            .unwrap()
            .execute(&ctx, json!({}))
            .await
            .unwrap();
        assert_eq!(out, json!("new"));
    }

    #[test]
    fn list_and_descriptors_are_sorted() {
        let mut registry = ToolRegistry::new();
        for name in ["gamma", "alpha", "beta"] {
            registry.register(FakeTool::new(name, Value::Null));
        }
        assert_eq!(registry.list(), vec!["alpha", "beta", "gamma"]);
        let names: Vec<String> = registry.descriptors().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["alpha", "beta", "gamma"]);
    }

    #[test]
    fn builtin_tools_are_registered() {
        let registry = ToolRegistry::with_builtin_tools(SyncConfig::default());
        assert_eq!(
            registry.list(),
            vec![
                "create_vfs_directory",
                "create_vfs_file",
                "delete_vfs_node",
                "get_project_version",
                "list_vfs_directory",
                "move_vfs_node",
                "read_vfs_file",
                "rename_vfs_node",
                "sync_architecture",
                "update_vfs_file",
            ]
        );
        for d in registry.descriptors() {
            assert!(!d.description.is_empty(), "{} lacks a description", d.name);
            assert_eq!(d.input_schema["type"], "object", "{}", d.name);
        }
    }

    #[test]
    fn registry_debug_shows_names() {
        let mut registry = ToolRegistry::new();
        registry.register(FakeTool::new("test-tool", Value::Null));
        assert!(format!("{registry:?}").contains("test-tool"));
    }
}
