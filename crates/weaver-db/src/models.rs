use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Kind of a virtual file system node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    File,
    Directory,
}

impl NodeType {
    pub fn is_file(self) -> bool {
        matches!(self, Self::File)
    }

    pub fn is_directory(self) -> bool {
        matches!(self, Self::Directory)
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::File => "file",
            Self::Directory => "directory",
        };
        f.write_str(s)
    }
}

impl FromStr for NodeType {
    type Err = NodeTypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file" => Ok(Self::File),
            "directory" => Ok(Self::Directory),
            other => Err(NodeTypeParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`NodeType`] string.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid node type: {0:?}")]
pub struct NodeTypeParseError(pub String);

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row in the `projects` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub owner: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A row in the `vfs_nodes` table.
///
/// `parent_id` is `None` only for the project's root, which is always a
/// nameless directory. `content` is only ever set on files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct VfsNode {
    pub id: Uuid,
    pub project_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub node_type: NodeType,
    pub name: String,
    pub content: Option<String>,
    pub content_hash: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VfsNode {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn is_file(&self) -> bool {
        self.node_type.is_file()
    }

    pub fn is_directory(&self) -> bool {
        self.node_type.is_directory()
    }
}

/// Fields for inserting a non-root node.
#[derive(Debug, Clone)]
pub struct NewNode<'a> {
    pub project_id: Uuid,
    pub parent_id: Uuid,
    pub node_type: NodeType,
    pub name: &'a str,
    pub content: Option<&'a str>,
    pub content_hash: Option<&'a str>,
    pub metadata: serde_json::Value,
}
