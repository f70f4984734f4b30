//! Core engine: a path-addressed virtual file store over a flat node table,
//! a registry of side-effecting tools, and a scheduler that drives a
//! dependency-ordered plan of tool calls to completion.

pub mod executor;
pub mod plan;
pub mod sync;
pub mod tool;
pub mod vfs;
