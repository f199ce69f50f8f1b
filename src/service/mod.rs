//! The mark session: one tree, its save file and every operator that
//! changes it.
//!
//! Each operator validates first and only then mutates, so a rejected call
//! leaves the tree exactly as it was. After a successful mutation the
//! service notifies subscribers and, when `AutoSave` is on, writes the tree.
//! Save failures are reported through the notifier; they never undo the
//! in-memory change.

mod drag;
mod index;
mod reconcile;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

pub use reconcile::{Conflict, ReconcileOutcome, ReconcileTrigger};

use crate::config::MarkConfig;
use crate::error::{Error, Result};
use crate::models::{parse_line, Expansion, Mark, MarkTree, NodeId, ROOT_ID};
use crate::notify::{MarkEvent, Notifier};
use crate::search::{SearchEntry, SearchIndex};
use crate::storage::{self, MarkStore};
use crate::workspace::{Editor, Workspace};
use index::MarkIndex;

pub struct MarkService {
    tree: MarkTree,
    store: Option<MarkStore>,
    config: MarkConfig,
    workspace: Workspace,
    notifier: Notifier,
    index: MarkIndex,
    drag_source: Option<NodeId>,
}

impl MarkService {
    /// A session with an empty tree and no save file.
    pub fn new(config: MarkConfig, workspace: Workspace) -> Self {
        Self::with_tree(MarkTree::with_root(), None, config, workspace)
    }

    pub fn with_tree(
        tree: MarkTree,
        store: Option<MarkStore>,
        config: MarkConfig,
        workspace: Workspace,
    ) -> Self {
        let index = MarkIndex::build(&tree);
        Self {
            tree,
            store,
            config,
            workspace,
            notifier: Notifier::new(),
            index,
            drag_source: None,
        }
    }

    /// Resolve the save file for `workspace` and load whatever it holds.
    pub fn open(config: MarkConfig, workspace: Workspace) -> Result<Self> {
        let store = MarkStore::open(&config, &workspace)?;
        let tree = store.load()?.unwrap_or_else(MarkTree::with_root);
        Ok(Self::with_tree(tree, Some(store), config, workspace))
    }

    // ============================================================
    // Accessors
    // ============================================================

    pub fn tree(&self) -> &MarkTree {
        &self.tree
    }

    pub fn root(&self) -> NodeId {
        self.tree.root()
    }

    pub fn mark(&self, node: NodeId) -> Option<&Mark> {
        self.tree.mark(node)
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.tree.children(node)
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.tree.parent(node)
    }

    pub fn config(&self) -> &MarkConfig {
        &self.config
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn store(&self) -> Option<&MarkStore> {
        self.store.as_ref()
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<MarkEvent> {
        self.notifier.subscribe()
    }

    pub fn find(&self, mark_id: &str) -> Option<NodeId> {
        self.tree.find_by_mark_id(mark_id)
    }

    /// Sibling-index chain from the root, stable across reloads as long as
    /// the structure is unchanged.
    pub fn chain(&self, node: NodeId) -> Option<Vec<usize>> {
        self.tree.chain(node)
    }

    pub fn locate(&self, chain: &[usize]) -> Option<NodeId> {
        self.tree.resolve(chain)
    }

    /// Resolve a user-supplied reference: a dotted sibling-index chain such
    /// as `0.2.1`, or a mark id.
    pub fn resolve_ref(&self, reference: &str) -> Option<NodeId> {
        if reference == "." {
            return Some(self.root());
        }
        let chain: Option<Vec<usize>> = reference.split('.').map(|p| p.parse().ok()).collect();
        match chain {
            Some(chain) => self.locate(&chain),
            None => self.find(reference),
        }
    }

    // ============================================================
    // Lookups for views
    // ============================================================

    /// Leaves that point into `file_path`, in insertion order.
    pub fn marks_in_file(&self, file_path: &str) -> Vec<NodeId> {
        self.index.file(file_path).to_vec()
    }

    /// Every reachable leaf in display order.
    pub fn leaves(&mut self) -> Vec<NodeId> {
        self.index.leaves(&self.tree).to_vec()
    }

    /// Lines of `file_path` that carry a mark. Empty when `RenderLine` is off.
    pub fn gutter_lines(&self, file_path: &str) -> Vec<u32> {
        if !self.config.render_line {
            return Vec::new();
        }
        self.index
            .file(file_path)
            .iter()
            .filter_map(|&n| self.tree.mark(n))
            .map(Mark::line)
            .collect()
    }

    /// Name of the first mark on `line` of `file_path`, for hover text.
    pub fn hover_text(&self, file_path: &str, line: u32) -> Option<String> {
        if !self.config.hover {
            return None;
        }
        self.index
            .file(file_path)
            .iter()
            .filter_map(|&n| self.tree.mark(n))
            .find(|m| m.line() == line)
            .map(|m| m.name().to_string())
    }

    /// Build a search index over every leaf. The marks of `active_file`
    /// become the candidates shown for an empty query.
    pub fn search_index(&mut self, active_file: Option<&str>) -> SearchIndex {
        let entries = self
            .leaves()
            .into_iter()
            .filter_map(|n| self.search_entry(n))
            .collect();
        let initial = active_file
            .map(|f| self.index.file(f).to_vec())
            .unwrap_or_default()
            .into_iter()
            .filter_map(|n| self.search_entry(n))
            .collect();
        SearchIndex::new(entries, initial)
    }

    fn search_entry(&self, node: NodeId) -> Option<SearchEntry> {
        let mark = self.tree.mark(node)?;
        Some(SearchEntry {
            node,
            mark_id: mark.id().to_string(),
            name: mark.name().to_string(),
            file_path: mark.file_path().to_string(),
            line: mark.line(),
        })
    }

    /// Show a leaf's location in the editor. Groups are ignored.
    pub fn reveal(&self, node: NodeId, editor: &dyn Editor) -> Result<bool> {
        let mark = self.tree.mark(node).ok_or(Error::UnknownNode)?;
        if !mark.is_leaf() {
            return Ok(false);
        }
        editor.reveal(&self.workspace.absolute(mark.file_path()), mark.line());
        Ok(true)
    }

    // ============================================================
    // Create, delete, edit
    // ============================================================

    /// Append a mark under the group selected by `anchor`.
    pub fn add_leaf(&mut self, mark: Mark, anchor: Option<NodeId>) -> Result<NodeId> {
        let target = self.tree.target_group(anchor)?;
        let node = self.tree.create(mark);
        self.tree.add_child(target, node);
        self.index.insert_subtree(&self.tree, node);
        tracing::debug!("Added mark {:?}", self.tree.mark(node).map(Mark::name));
        self.notifier.added(node, target);
        self.after_mutation();
        Ok(node)
    }

    pub fn delete_node(&mut self, node: NodeId) -> Result<()> {
        let (parent, _) = self.position(node)?;

        self.index.remove_subtree(&self.tree, node);
        self.tree.detach(node);
        if self
            .drag_source
            .is_some_and(|d| self.tree.is_ancestor(node, d))
        {
            self.drag_source = None;
        }
        tracing::debug!("Removed node {:?}", node);
        self.notifier.removed(node, parent);
        self.after_mutation();
        Ok(())
    }

    pub fn rename(&mut self, node: NodeId, name: &str) -> Result<()> {
        self.edit(node, |mark| mark.set_name(name))
    }

    pub fn edit_comment(&mut self, node: NodeId, comment: &str) -> Result<()> {
        self.edit(node, |mark| mark.set_comment(comment))
    }

    /// Set a line number from user text. Non-numeric text is rejected and the
    /// mark keeps its line.
    pub fn edit_line(&mut self, node: NodeId, raw: &str) -> Result<()> {
        let line = parse_line(raw)?;
        self.set_line(node, line)
    }

    pub fn set_line(&mut self, node: NodeId, line: u32) -> Result<()> {
        self.edit(node, |mark| mark.set_line(line))
    }

    pub fn set_expansion(&mut self, node: NodeId, expansion: Expansion) -> Result<()> {
        self.edit(node, |mark| mark.set_expansion(expansion))
    }

    fn edit(&mut self, node: NodeId, apply: impl FnOnce(&mut Mark)) -> Result<()> {
        let mark = self.tree.get_mut(node).ok_or(Error::UnknownNode)?;
        apply(mark);
        self.notify_edited(node);
        self.after_mutation();
        Ok(())
    }

    /// Create a group under the group selected by `anchor`. Names must be
    /// unique among the target's direct child groups (case-sensitive).
    pub fn create_group(&mut self, anchor: Option<NodeId>, name: &str) -> Result<NodeId> {
        let target = self.tree.target_group(anchor)?;
        let taken = self
            .tree
            .children(target)
            .iter()
            .filter_map(|&c| self.tree.mark(c))
            .any(|m| m.is_group() && m.name() == name);
        if taken {
            return Err(Error::DuplicateName(name.to_string()));
        }

        let node = self.tree.create(Mark::group(name));
        self.tree.add_child(target, node);
        self.index.invalidate_order();
        tracing::debug!("Created group {:?}", name);
        self.notifier.added(node, target);
        self.after_mutation();
        Ok(node)
    }

    // ============================================================
    // Reorder and reparent
    // ============================================================

    /// Parent and sibling index of a node reachable from the root.
    fn position(&self, node: NodeId) -> Result<(NodeId, usize)> {
        self.tree.mark(node).ok_or(Error::UnknownNode)?;
        if !self.tree.is_attached(node) {
            return Err(Error::Detached);
        }
        let parent = self.tree.parent(node).ok_or(Error::Detached)?;
        let index = self.tree.index_of(node).ok_or(Error::Detached)?;
        Ok((parent, index))
    }

    /// Swap with the previous sibling. Returns `false` at the top.
    pub fn move_up(&mut self, node: NodeId) -> Result<bool> {
        let (parent, index) = self.position(node)?;
        if index == 0 {
            return Ok(false);
        }
        self.swap(parent, index - 1, index);
        Ok(true)
    }

    /// Swap with the next sibling. Returns `false` at the bottom.
    pub fn move_down(&mut self, node: NodeId) -> Result<bool> {
        let (parent, index) = self.position(node)?;
        if index + 1 >= self.tree.children(parent).len() {
            return Ok(false);
        }
        self.swap(parent, index, index + 1);
        Ok(true)
    }

    fn swap(&mut self, parent: NodeId, i: usize, j: usize) {
        let children = self.tree.children(parent);
        let (a, b) = (children[i], children[j]);
        self.tree.set_child(parent, b, i);
        self.tree.set_child(parent, a, j);
        self.index.invalidate_order();
        self.notify_edited(parent);
        self.after_mutation();
    }

    /// Outdent: move the node out of its group, into the grandparent just
    /// before the group it left. Returns `false` for top-level nodes.
    pub fn promote(&mut self, node: NodeId) -> Result<bool> {
        let (parent, _) = self.position(node)?;
        let Some(grandparent) = self.tree.parent(parent) else {
            return Ok(false);
        };
        let slot = self.tree.index_of(parent).ok_or(Error::Detached)?;

        self.tree.detach(node);
        self.tree.insert_child(grandparent, node, slot);
        self.index.invalidate_order();
        self.notifier.refresh();
        self.after_mutation();
        Ok(true)
    }

    /// Indent: move the node into the nearest sibling group, as its last
    /// child. Distance is measured in sibling positions; on a tie the group
    /// met first in a left-to-right scan wins, so the left neighbour is
    /// preferred. Returns `false` when there is no sibling group.
    pub fn demote(&mut self, node: NodeId) -> Result<bool> {
        let (parent, index) = self.position(node)?;
        let mut nearest: Option<(usize, NodeId)> = None;
        for (i, &sibling) in self.tree.children(parent).iter().enumerate() {
            if sibling == node || !self.tree.is_group(sibling) {
                continue;
            }
            let distance = i.abs_diff(index);
            if nearest.map_or(true, |(best, _)| distance < best) {
                nearest = Some((distance, sibling));
            }
        }
        let Some((_, group)) = nearest else {
            return Ok(false);
        };

        self.tree.detach(node);
        self.tree.add_child(group, node);
        self.index.invalidate_order();
        self.notifier.refresh();
        self.after_mutation();
        Ok(true)
    }

    // ============================================================
    // Navigation
    // ============================================================

    /// Next leaf among the node's siblings, wrapping around. Groups are
    /// skipped; the node itself is returned when no other leaf exists.
    pub fn next(&self, node: NodeId) -> Result<NodeId> {
        self.cycle(node, true)
    }

    pub fn previous(&self, node: NodeId) -> Result<NodeId> {
        self.cycle(node, false)
    }

    fn cycle(&self, node: NodeId, forward: bool) -> Result<NodeId> {
        let (parent, start) = self.position(node)?;
        let siblings = self.tree.children(parent);
        let len = siblings.len();
        let mut i = start;
        loop {
            i = if forward { (i + 1) % len } else { (i + len - 1) % len };
            if i == start {
                return Ok(node);
            }
            if self.tree.is_leaf(siblings[i]) {
                return Ok(siblings[i]);
            }
        }
    }

    // ============================================================
    // Export and import
    // ============================================================

    /// Write the subtree rooted at `node` to `dest`, independent of the save
    /// file.
    pub fn export(&self, node: NodeId, dest: &Path) -> Result<()> {
        self.tree.mark(node).ok_or(Error::UnknownNode)?;
        storage::write_subtree(dest, &self.tree, node)?;
        tracing::info!("Exported marks to {}", dest.display());
        Ok(())
    }

    /// Load each file as a subtree and attach it under the group selected by
    /// `anchor`. Every file is read before the tree is touched. An exported
    /// root contributes its children rather than a nested root. Ids already
    /// used in this tree are replaced with fresh ones.
    pub fn import(&mut self, files: &[PathBuf], anchor: Option<NodeId>) -> Result<Vec<NodeId>> {
        let target = self.tree.target_group(anchor)?;
        let mut loaded = Vec::with_capacity(files.len());
        for file in files {
            if let Some(tree) = storage::read_subtree(file)? {
                loaded.push(tree);
            }
        }

        let mut taken: HashSet<String> = HashSet::new();
        self.tree
            .traverse(self.tree.root(), |_, m| {
                taken.insert(m.id().to_string());
            });

        let mut grafted = Vec::new();
        for mut subtree in loaded {
            let subtree_root = subtree.root();
            let is_exported_root = subtree.mark(subtree_root).is_some_and(|m| m.id() == ROOT_ID);
            let tops: Vec<NodeId> = if is_exported_root {
                subtree.children(subtree_root).to_vec()
            } else {
                vec![subtree_root]
            };
            for top in tops {
                for node in subtree.descendants(top) {
                    if let Some(mark) = subtree.get_mut(node) {
                        if !taken.insert(mark.id().to_string()) {
                            mark.reassign_id();
                            taken.insert(mark.id().to_string());
                        }
                    }
                }
                let piece = if is_exported_root {
                    subtree.extract(top)
                } else {
                    Some(std::mem::replace(&mut subtree, MarkTree::with_root()))
                };
                let Some(piece) = piece else { continue };
                if let Some(node) = self.tree.graft(target, piece) {
                    self.index.insert_subtree(&self.tree, node);
                    grafted.push(node);
                }
            }
        }

        tracing::info!("Imported {} subtrees from {} files", grafted.len(), files.len());
        self.notify_edited(target);
        self.after_mutation();
        Ok(grafted)
    }

    // ============================================================
    // Persistence
    // ============================================================

    /// Write the tree now, regardless of `AutoSave`.
    pub fn save(&self) -> Result<()> {
        let store = self
            .store
            .as_ref()
            .ok_or(Error::ProjectPathUnavailable {
                roots: self.workspace.roots().len(),
            })?;
        store.save(&self.tree)?;
        tracing::info!("Saved marks to {}", store.path().display());
        Ok(())
    }

    /// Swap in a whole new tree. Node handles from the old tree become
    /// meaningless.
    pub fn replace_tree(&mut self, tree: MarkTree) {
        self.tree = tree;
        self.index = MarkIndex::build(&self.tree);
        self.drag_source = None;
        self.notifier.refresh();
    }

    fn notify_edited(&self, node: NodeId) {
        if node == self.tree.root() {
            self.notifier.refresh();
        } else {
            self.notifier.edited(node);
        }
    }

    fn after_mutation(&self) {
        if self.config.auto_save {
            self.persist();
        }
    }

    fn persist(&self) {
        let Some(store) = &self.store else {
            tracing::warn!("No save file resolved; changes are kept in memory only");
            return;
        };
        let notifier = self.notifier.clone();
        let path = store.path().to_path_buf();
        let failed_path = path.clone();
        let result = store.save_detached(&self.tree, move |e| {
            tracing::warn!("Failed to save marks to {}: {}", failed_path.display(), e);
            notifier.save_failed(failed_path, e.to_string());
        });
        if let Err(e) = result {
            tracing::warn!("Failed to save marks to {}: {}", path.display(), e);
            self.notifier.save_failed(path, e.to_string());
        }
    }
}

/// Name used for a new mark when the user does not supply one.
pub fn default_mark_name(file_path: &str, line: u32) -> String {
    let file = file_path.rsplit('/').next().unwrap_or(file_path);
    format!("{}:{}", file, line + 1)
}
