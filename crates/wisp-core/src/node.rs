//! Node model for the emulated tree.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Node kinds as stored in the `type` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Regular file
    File,
    /// Folder
    Folder,
}

impl NodeKind {
    /// Returns the column representation.
    pub const fn as_str(&self) -> &'static str {
        match self {
            NodeKind::File => "file",
            NodeKind::Folder => "folder",
        }
    }

    /// Parses a column value.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "file" => Some(NodeKind::File),
            "folder" => Some(NodeKind::Folder),
            _ => None,
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A filesystem entry as stored in a view table.
///
/// Timestamps are engine-defaulted columns and are not carried here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique identifier across the tree
    pub id: String,
    /// Parent identifier; empty for the root
    pub parent_id: String,
    /// Entry name, unique among siblings
    pub name: String,
    /// Full path from the root
    pub path: String,
    /// File or folder
    #[serde(rename = "type")]
    pub kind: NodeKind,
    /// Byte count for files; zero for folders
    pub size: i64,
    /// Depth from the root; the root is level 0
    pub level: i64,
    /// Set once the node has been listed
    pub checked: bool,
}

impl Node {
    /// Returns true if this node is a folder.
    pub fn is_folder(&self) -> bool {
        self.kind == NodeKind::Folder
    }

    /// Returns true if this node is a file.
    pub fn is_file(&self) -> bool {
        self.kind == NodeKind::File
    }
}

/// Joins a parent path and a child name.
///
/// The root's `/` contributes no separator of its own.
pub fn join_path(parent: &str, name: &str) -> String {
    if parent == "/" {
        format!("/{}", name)
    } else {
        format!("{}/{}", parent, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("/", "folder_0"), "/folder_0");
        assert_eq!(join_path("/folder_0", "file_1.txt"), "/folder_0/file_1.txt");
        assert_eq!(join_path("/a/b", "c"), "/a/b/c");
    }

    #[test]
    fn test_node_kind_roundtrip() {
        assert_eq!(NodeKind::parse("file"), Some(NodeKind::File));
        assert_eq!(NodeKind::parse("folder"), Some(NodeKind::Folder));
        assert_eq!(NodeKind::parse("symlink"), None);
        assert_eq!(NodeKind::File.as_str(), "file");
    }
}
