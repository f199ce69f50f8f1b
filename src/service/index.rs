use std::collections::HashMap;

use crate::models::{MarkTree, NodeId};

/// Lookups derived from the tree: leaves grouped by file path, and the flat
/// leaf list used for search.
#[derive(Debug, Default)]
pub(crate) struct MarkIndex {
    by_file: HashMap<String, Vec<NodeId>>,
    leaves: Vec<NodeId>,
    leaves_stale: bool,
}

impl MarkIndex {
    pub(crate) fn build(tree: &MarkTree) -> Self {
        let mut index = Self {
            leaves_stale: true,
            ..Self::default()
        };
        index.insert_subtree(tree, tree.root());
        index
    }

    /// Register every leaf in the subtree rooted at `id`.
    pub(crate) fn insert_subtree(&mut self, tree: &MarkTree, id: NodeId) {
        tree.traverse(id, |node, mark| {
            if mark.is_leaf() {
                self.by_file
                    .entry(mark.file_path().to_string())
                    .or_default()
                    .push(node);
            }
        });
        self.leaves_stale = true;
    }

    /// Forget every leaf in the subtree rooted at `id`.
    pub(crate) fn remove_subtree(&mut self, tree: &MarkTree, id: NodeId) {
        tree.traverse(id, |node, mark| {
            if !mark.is_leaf() {
                return;
            }
            if let Some(nodes) = self.by_file.get_mut(mark.file_path()) {
                nodes.retain(|&n| n != node);
                if nodes.is_empty() {
                    self.by_file.remove(mark.file_path());
                }
            }
        });
        self.leaves_stale = true;
    }

    /// The tree's order changed without adding or removing leaves.
    pub(crate) fn invalidate_order(&mut self) {
        self.leaves_stale = true;
    }

    pub(crate) fn file(&self, file_path: &str) -> &[NodeId] {
        self.by_file
            .get(file_path)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub(crate) fn leaves(&mut self, tree: &MarkTree) -> &[NodeId] {
        if self.leaves_stale {
            self.leaves = tree.leaves();
            self.leaves_stale = false;
        }
        &self.leaves
    }
}
