//! Tool contract, registry and the built-in tools.

pub mod architecture;
pub mod context;
pub mod registry;
pub mod trait_def;
pub mod vfs_tools;

pub use architecture::SyncArchitectureTool;
pub use context::ExecutionContext;
pub use registry::ToolRegistry;
pub use trait_def::{Tool, ToolDescriptor};
