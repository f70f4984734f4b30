//! In-memory arena over a project's nodes.
//!
//! Built from a single `list_project_nodes` fetch so deep traversals
//! (subtree listing, path computation, version hashing, rendering) never
//! issue one query per level.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use weaver_db::models::VfsNode;

use super::path::child_path;

/// A node together with its absolute path.
#[derive(Debug, Clone, PartialEq)]
pub struct VfsEntry {
    pub path: String,
    pub node: VfsNode,
}

/// id -> node and parent -> children indexes over one project's nodes.
#[derive(Debug, Default)]
pub struct NodeArena {
    nodes: HashMap<Uuid, VfsNode>,
    children: HashMap<Uuid, Vec<Uuid>>,
    root: Option<Uuid>,
}

impl NodeArena {
    pub fn new(nodes: Vec<VfsNode>) -> Self {
        let mut arena = Self::default();
        for node in nodes {
            match node.parent_id {
                Some(parent) => arena.children.entry(parent).or_default().push(node.id),
                None => arena.root = Some(node.id),
            }
            arena.nodes.insert(node.id, node);
        }

        // Directories first, then by name, so listings are stable.
        let nodes = &arena.nodes;
        for ids in arena.children.values_mut() {
            ids.sort_by(|a, b| {
                let (a, b) = (&nodes[a], &nodes[b]);
                a.is_file()
                    .cmp(&b.is_file())
                    .then_with(|| a.name.cmp(&b.name))
            });
        }
        arena
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn root(&self) -> Option<&VfsNode> {
        self.root.and_then(|id| self.nodes.get(&id))
    }

    pub fn get(&self, id: Uuid) -> Option<&VfsNode> {
        self.nodes.get(&id)
    }

    /// Direct children of `id`, directories first.
    pub fn children(&self, id: Uuid) -> Vec<&VfsNode> {
        self.children
            .get(&id)
            .map(|ids| ids.iter().filter_map(|c| self.nodes.get(c)).collect())
            .unwrap_or_default()
    }

    /// Absolute path of a node (`/` for the root).
    ///
    /// `None` when the node is unknown or its parent chain never reaches
    /// the root.
    pub fn path_of(&self, id: Uuid) -> Option<String> {
        let mut names = Vec::new();
        let mut seen = HashSet::new();
        let mut current = self.nodes.get(&id)?;
        while let Some(parent) = current.parent_id {
            if !seen.insert(current.id) {
                return None;
            }
            names.push(current.name.as_str());
            current = self.nodes.get(&parent)?;
        }
        if names.is_empty() {
            return Some("/".to_string());
        }
        names.reverse();
        Some(format!("/{}", names.join("/")))
    }

    /// Walk `segments` down from the root.
    pub fn resolve(&self, segments: &[String]) -> Option<&VfsNode> {
        let mut current = self.root()?;
        for segment in segments {
            current = self
                .children(current.id)
                .into_iter()
                .find(|child| &child.name == segment)?;
        }
        Some(current)
    }

    /// Every transitive descendant of `id` in pre-order, with paths.
    /// `id` itself is not included.
    pub fn descendants(&self, id: Uuid) -> Vec<VfsEntry> {
        let Some(base) = self.path_of(id) else {
            return Vec::new();
        };

        let mut out = Vec::new();
        let mut stack: Vec<(Uuid, String)> = self
            .children(id)
            .into_iter()
            .rev()
            .map(|c| (c.id, child_path(&base, &c.name)))
            .collect();

        while let Some((node_id, path)) = stack.pop() {
            let Some(node) = self.nodes.get(&node_id) else {
                continue;
            };
            for child in self.children(node_id).into_iter().rev() {
                stack.push((child.id, child_path(&path, &child.name)));
            }
            out.push(VfsEntry {
                path,
                node: node.clone(),
            });
        }
        out
    }

    /// Every file in the project with its path, in pre-order.
    pub fn files(&self) -> Vec<VfsEntry> {
        match self.root {
            Some(root) => self
                .descendants(root)
                .into_iter()
                .filter(|e| e.node.is_file())
                .collect(),
            None => Vec::new(),
        }
    }

    /// Render the subtree under `id` as an indented ASCII tree.
    pub fn render(&self, id: Uuid) -> String {
        let mut out = String::new();
        let Some(node) = self.nodes.get(&id) else {
            return out;
        };
        if self.path_of(id).is_none() {
            return out;
        }
        let label = if node.is_root() {
            "/".to_string()
        } else {
            display_name(node)
        };
        out.push_str(&label);
        out.push('\n');
        self.render_children(id, "", &mut out);
        out
    }

    fn render_children(&self, id: Uuid, prefix: &str, out: &mut String) {
        let children = self.children(id);
        let count = children.len();
        for (i, child) in children.into_iter().enumerate() {
            let last = i + 1 == count;
            out.push_str(prefix);
            out.push_str(if last { "`-- " } else { "|-- " });
            out.push_str(&display_name(child));
            out.push('\n');
            if child.is_directory() {
                let next = format!("{prefix}{}", if last { "    " } else { "|   " });
                self.render_children(child.id, &next, out);
            }
        }
    }
}

fn display_name(node: &VfsNode) -> String {
    if node.is_directory() {
        format!("{}/", node.name)
    } else {
        node.name.clone()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Utc;
    use weaver_db::models::NodeType;

    pub(crate) fn node(id: u128, parent: Option<u128>, name: &str, ty: NodeType) -> VfsNode {
        VfsNode {
            id: Uuid::from_u128(id),
            project_id: Uuid::nil(),
            parent_id: parent.map(Uuid::from_u128),
            node_type: ty,
            name: name.to_string(),
            content: None,
            content_hash: None,
            metadata: serde_json::json!({}),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn sample() -> NodeArena {
        NodeArena::new(vec![
            node(1, None, "", NodeType::Directory),
            node(2, Some(1), "src", NodeType::Directory),
            node(3, Some(2), "main.rs", NodeType::File),
            node(4, Some(2), "util", NodeType::Directory),
            node(5, Some(4), "fmt.rs", NodeType::File),
            node(6, Some(1), "README.md", NodeType::File),
            node(7, Some(1), "assets", NodeType::Directory),
        ])
    }

    #[test]
    fn paths_are_absolute() {
        let arena = sample();
        assert_eq!(arena.path_of(Uuid::from_u128(1)).as_deref(), Some("/"));
        assert_eq!(
            arena.path_of(Uuid::from_u128(5)).as_deref(),
            Some("/src/util/fmt.rs")
        );
        assert_eq!(arena.path_of(Uuid::from_u128(99)), None);
    }

    #[test]
    fn children_directories_first() {
        let arena = sample();
        let names: Vec<_> = arena
            .children(Uuid::from_u128(1))
            .iter()
            .map(|n| n.name.as_str())
            .collect();
        assert_eq!(names, vec!["assets", "src", "README.md"]);
    }

    #[test]
    fn descendants_include_indirect_nodes() {
        let arena = sample();
        let paths: Vec<_> = arena
            .descendants(Uuid::from_u128(2))
            .into_iter()
            .map(|e| e.path)
            .collect();
        assert_eq!(paths, vec!["/src/util", "/src/util/fmt.rs", "/src/main.rs"]);
    }

    #[test]
    fn resolve_walks_segments() {
        let arena = sample();
        let segments = vec!["src".to_string(), "util".to_string(), "fmt.rs".to_string()];
        assert_eq!(arena.resolve(&segments).map(|n| n.id), Some(Uuid::from_u128(5)));
        assert!(arena.resolve(&["nope".to_string()]).is_none());
        assert_eq!(arena.resolve(&[]).map(|n| n.id), Some(Uuid::from_u128(1)));
    }

    #[test]
    fn detached_cycle_has_no_path() {
        let arena = NodeArena::new(vec![
            node(1, None, "", NodeType::Directory),
            node(2, Some(3), "a", NodeType::Directory),
            node(3, Some(2), "b", NodeType::Directory),
        ]);
        assert_eq!(arena.path_of(Uuid::from_u128(2)), None);
        assert!(arena.descendants(Uuid::from_u128(3)).is_empty());
        assert_eq!(arena.render(Uuid::from_u128(2)), "");
        assert!(arena.files().is_empty());
    }

    #[test]
    fn files_lists_only_files() {
        let arena = sample();
        let paths: Vec<_> = arena.files().into_iter().map(|e| e.path).collect();
        assert_eq!(paths, vec!["/src/util/fmt.rs", "/src/main.rs", "/README.md"]);
    }

    #[test]
    fn render_draws_tree() {
        let arena = sample();
        let rendered = arena.render(Uuid::from_u128(1));
        let expected = "\
/
|-- assets/
|-- src/
|   |-- util/
|   |   `-- fmt.rs
|   `-- main.rs
`-- README.md
";
        assert_eq!(rendered, expected);
    }
}
