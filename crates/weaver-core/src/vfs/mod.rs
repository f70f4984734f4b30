//! Virtual file store: a path-addressed tree over a flat parent-pointer
//! table.
//!
//! Invariants maintained here and by the schema:
//! - every project has exactly one root, a nameless directory, recreated
//!   on demand by [`VfsStore::get_root`];
//! - sibling names are unique;
//! - directories never hold content;
//! - deleting a directory removes its whole subtree.

pub mod error;
pub mod path;
pub mod store;
pub mod tree;
pub mod version;

pub use error::VfsError;
pub use path::VfsPath;
pub use store::VfsStore;
pub use tree::{NodeArena, VfsEntry};
pub use version::{content_hash, project_version};
