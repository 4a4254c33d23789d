//! Project file tree for the file panel.

use std::fs;
use std::path::Path;
use serde::Serialize;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileNode {
    pub name: String,
    pub path: String,
    pub is_dir: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<FileNode>,
}

/// A visible row of the flattened tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeRow<'a> {
    pub depth: usize,
    pub node: &'a FileNode,
}

/// Recursively lists `root`, directories first, then by case-insensitive
/// name. Hidden entries are skipped; unreadable directories are left empty.
pub fn build_tree(root: &Path) -> Vec<FileNode> {
    let reader = match fs::read_dir(root) {
        Ok(reader) => reader,
        Err(e) => {
            warn!(path = %root.display(), error = %e, "cannot read directory");
            return Vec::new();
        }
    };

    let mut nodes: Vec<FileNode> = reader
        .filter_map(|entry| entry.ok())
        .filter(|entry| !entry.file_name().to_string_lossy().starts_with('.'))
        .map(|entry| {
            let path = entry.path();
            let is_dir = path.is_dir();
            FileNode {
                name: entry.file_name().to_string_lossy().into_owned(),
                children: if is_dir { build_tree(&path) } else { Vec::new() },
                path: path.to_string_lossy().into_owned(),
                is_dir,
            }
        })
        .collect();

    nodes.sort_by_key(|n| (!n.is_dir, n.name.to_lowercase()));
    nodes
}

/// Depth-first rows for every node whose ancestors are all expanded.
pub fn flatten<'a>(nodes: &'a [FileNode], is_expanded: &dyn Fn(&str) -> bool) -> Vec<TreeRow<'a>> {
    let mut rows = Vec::new();
    push_rows(nodes, 0, is_expanded, &mut rows);
    rows
}

fn push_rows<'a>(
    nodes: &'a [FileNode],
    depth: usize,
    is_expanded: &dyn Fn(&str) -> bool,
    rows: &mut Vec<TreeRow<'a>>,
) {
    for node in nodes {
        rows.push(TreeRow { depth, node });
        if node.is_dir && is_expanded(&node.path) {
            push_rows(&node.children, depth + 1, is_expanded, rows);
        }
    }
}

/// First file named `name`, searching depth-first.
pub fn find_file<'a>(nodes: &'a [FileNode], name: &str) -> Option<&'a FileNode> {
    for node in nodes {
        if !node.is_dir && node.name == name {
            return Some(node);
        }
        if let Some(found) = find_file(&node.children, name) {
            return Some(found);
        }
    }
    None
}
