//! Blueprint wire format: a recursive description of files and folders.
//!
//! ```json
//! { "type": "folder", "name": "src", "children": [
//!     { "type": "file", "name": "index.ts", "content": "export {}" }
//! ] }
//! ```
//!
//! A blueprint document is either a single node or an array of nodes.

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Errors produced while decoding a blueprint.
#[derive(Debug, Error)]
pub enum BlueprintError {
    #[error("invalid blueprint JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// One node of a blueprint tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BlueprintNode {
    File {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
    },
    Folder {
        name: String,
        #[serde(default, deserialize_with = "null_as_empty")]
        children: Vec<BlueprintNode>,
    },
}

impl BlueprintNode {
    pub fn file(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self::File {
            name: name.into(),
            content: Some(content.into()),
        }
    }

    pub fn folder(name: impl Into<String>, children: Vec<BlueprintNode>) -> Self {
        Self::Folder {
            name: name.into(),
            children,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::File { name, .. } | Self::Folder { name, .. } => name,
        }
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<BlueprintNode>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<BlueprintNode>>::deserialize(deserializer)?.unwrap_or_default())
}

/// The top-level nodes to materialize beneath the project root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Blueprint {
    pub nodes: Vec<BlueprintNode>,
}

impl Blueprint {
    pub fn new(nodes: Vec<BlueprintNode>) -> Self {
        Self { nodes }
    }

    /// Decode a blueprint from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, BlueprintError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    /// Decode a blueprint from a single node or an array of nodes.
    pub fn from_value(value: serde_json::Value) -> Result<Self, BlueprintError> {
        let nodes = if value.is_array() {
            serde_json::from_value(value)?
        } else {
            vec![serde_json::from_value(value)?]
        };
        Ok(Self { nodes })
    }
}
