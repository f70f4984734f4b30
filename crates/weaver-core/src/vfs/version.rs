//! Content hashing and project versions.
//!
//! Each file stores the SHA-256 of its own content. A project's version is
//! the SHA-256 over the sorted `<path>\0<content hash>` lines of all its
//! files, so it is independent of fetch order and changes whenever any
//! file's content, name, or location changes, or a file is added or
//! removed.

use sha2::{Digest, Sha256};

use super::tree::NodeArena;

/// Hex SHA-256 of a file's content. Null content hashes like `""`.
pub fn content_hash(content: Option<&str>) -> String {
    hex::encode(Sha256::digest(content.unwrap_or("").as_bytes()))
}

/// Digest-of-digests over every file in the arena.
pub fn project_version(arena: &NodeArena) -> String {
    let mut lines: Vec<String> = arena
        .files()
        .into_iter()
        .map(|entry| {
            let hash = entry
                .node
                .content_hash
                .clone()
                .unwrap_or_else(|| content_hash(entry.node.content.as_deref()));
            format!("{}\0{}", entry.path, hash)
        })
        .collect();
    lines.sort();

    let mut hasher = Sha256::new();
    for line in &lines {
        hasher.update(line.as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}
