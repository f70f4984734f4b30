//! POSIX-style path parsing for the virtual file store.
//!
//! Paths are `/`-separated. Empty and `.` segments are ignored, so `""`,
//! `"/"`, and `"./"` all name the root. A trailing `/` marks directory
//! intent for [`super::VfsStore::find_or_create`]. `..` would escape the
//! project scope and is rejected.

use std::fmt;

use super::error::VfsError;

/// A parsed, normalized VFS path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VfsPath {
    segments: Vec<String>,
    trailing_slash: bool,
}

impl VfsPath {
    /// Parse a raw path string.
    pub fn parse(raw: &str) -> Result<Self, VfsError> {
        let mut segments = Vec::new();
        for segment in raw.split('/') {
            match segment {
                "" | "." => continue,
                ".." => {
                    return Err(VfsError::NotFound(format!(
                        "path {raw:?} leaves the project scope"
                    )));
                }
                name => {
                    validate_name(name)?;
                    segments.push(name.to_string());
                }
            }
        }

        let trailing_slash = raw.ends_with('/') && !segments.is_empty();
        Ok(Self {
            segments,
            trailing_slash,
        })
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Whether the raw path ended with a separator.
    pub fn wants_directory(&self) -> bool {
        self.trailing_slash
    }

    /// The path of the parent directory. The root is its own parent.
    pub fn parent(&self) -> Self {
        let mut segments = self.segments.clone();
        segments.pop();
        Self {
            segments,
            trailing_slash: false,
        }
    }

    /// The path without any trailing separator (`/` for the root).
    pub fn normalized(&self) -> String {
        if self.segments.is_empty() {
            "/".to_string()
        } else {
            format!("/{}", self.segments.join("/"))
        }
    }

    /// Append a child segment.
    pub fn join(&self, name: &str) -> Result<Self, VfsError> {
        validate_name(name)?;
        let mut segments = self.segments.clone();
        segments.push(name.to_string());
        Ok(Self {
            segments,
            trailing_slash: false,
        })
    }
}

impl fmt::Display for VfsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.segments {
            write!(f, "/{segment}")?;
        }
        if self.trailing_slash {
            f.write_str("/")?;
        }
        Ok(())
    }
}

/// Check that `name` is usable as a single node name.
pub fn validate_name(name: &str) -> Result<(), VfsError> {
    if name.is_empty() || name == "." || name == ".." || name.contains('/') || name.contains('\0')
    {
        return Err(VfsError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Join a parent path string and a child name into a display path.
pub(crate) fn child_path(parent: &str, name: &str) -> String {
    if parent == "/" {
        format!("/{name}")
    } else {
        format!("{parent}/{name}")
    }
}
