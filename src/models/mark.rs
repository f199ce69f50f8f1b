use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::tree::{NodeId, Tree};
use crate::error::{Error, Result};

/// Id carried by the synthetic root group of every mark tree.
pub const ROOT_ID: &str = "root";

/// A line bookmark or a group of bookmarks.
///
/// Groups and leaves share every field and differ only in a handful of rules
/// (expansion state, valid drop targets, searchability), so the variant is a
/// tag rather than a separate type.
#[derive(Debug, Clone, PartialEq)]
pub struct Mark {
    id: String,
    kind: MarkKind,
    name: String,
    comment: String,
    file_path: String,
    line: u32,
    expansion: Expansion,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkKind {
    Group,
    Leaf,
}

impl MarkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Group => "group",
            Self::Leaf => "leaf",
        }
    }
}

/// Tree-widget expansion state. Leaves are always `None`; groups are never
/// `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expansion {
    None,
    Collapsed,
    Expanded,
}

pub fn new_mark_id() -> String {
    Uuid::new_v4().to_string()
}

/// Parse a zero-based line number typed by a user.
pub fn parse_line(raw: &str) -> Result<u32> {
    raw.trim()
        .parse::<u32>()
        .map_err(|_| Error::InvalidLine(raw.to_string()))
}

impl Mark {
    /// The root group of a fresh tree. Its fields are fixed so two fresh
    /// roots compare equal.
    pub fn root() -> Self {
        Self {
            id: ROOT_ID.to_string(),
            kind: MarkKind::Group,
            name: String::new(),
            comment: String::new(),
            file_path: String::new(),
            line: 0,
            expansion: Expansion::Expanded,
            created_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    pub fn leaf(
        name: impl Into<String>,
        comment: impl Into<String>,
        file_path: impl Into<String>,
        line: u32,
    ) -> Self {
        Self {
            id: new_mark_id(),
            kind: MarkKind::Leaf,
            name: name.into(),
            comment: comment.into(),
            file_path: file_path.into(),
            line,
            expansion: Expansion::None,
            created_at: Utc::now(),
        }
    }

    pub fn group(name: impl Into<String>) -> Self {
        Self {
            id: new_mark_id(),
            kind: MarkKind::Group,
            name: name.into(),
            comment: String::new(),
            file_path: String::new(),
            line: 0,
            expansion: Expansion::Expanded,
            created_at: Utc::now(),
        }
    }

    /// Rebuild a mark from stored fields. The caller is responsible for
    /// having normalised `kind` and `expansion`.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn restore(
        id: String,
        kind: MarkKind,
        name: String,
        comment: String,
        file_path: String,
        line: u32,
        expansion: Expansion,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            kind,
            name,
            comment,
            file_path,
            line,
            expansion,
            created_at,
        }
    }

    pub(crate) fn reassign_id(&mut self) {
        self.id = new_mark_id();
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> MarkKind {
        self.kind
    }

    pub fn is_group(&self) -> bool {
        self.kind == MarkKind::Group
    }

    pub fn is_leaf(&self) -> bool {
        self.kind == MarkKind::Leaf
    }

    /// Switching kind keeps the expansion invariant: leaves become `None`,
    /// new groups start expanded.
    pub fn set_kind(&mut self, kind: MarkKind) {
        self.kind = kind;
        self.expansion = match kind {
            MarkKind::Leaf => Expansion::None,
            MarkKind::Group if self.expansion == Expansion::None => Expansion::Expanded,
            MarkKind::Group => self.expansion,
        };
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn set_comment(&mut self, comment: impl Into<String>) {
        self.comment = comment.into();
    }

    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    pub fn set_file_path(&mut self, file_path: impl Into<String>) {
        self.file_path = file_path.into();
    }

    /// Zero-based line number.
    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn set_line(&mut self, line: u32) {
        self.line = line;
    }

    /// Parse and assign a line number typed by the user. Non-numeric input
    /// leaves the current value in place.
    pub fn set_line_str(&mut self, raw: &str) -> Result<()> {
        self.line = parse_line(raw)?;
        Ok(())
    }

    pub fn expansion(&self) -> Expansion {
        self.expansion
    }

    /// Ignored for leaves. Groups refuse `Expansion::None`.
    pub fn set_expansion(&mut self, expansion: Expansion) {
        match self.kind {
            MarkKind::Leaf => {}
            MarkKind::Group if expansion == Expansion::None => {}
            MarkKind::Group => self.expansion = expansion,
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

pub type MarkTree = Tree<Mark>;

impl MarkTree {
    pub fn with_root() -> Self {
        Tree::new(Mark::root())
    }

    pub fn mark(&self, id: NodeId) -> Option<&Mark> {
        self.get(id)
    }

    /// Look up a reachable node by its mark id.
    pub fn find_by_mark_id(&self, mark_id: &str) -> Option<NodeId> {
        let mut found = None;
        self.traverse(self.root(), |id, mark| {
            if found.is_none() && mark.id() == mark_id {
                found = Some(id);
            }
        });
        found
    }

    /// Identity check: same mark id under the same parent.
    pub fn is_same_mark(&self, a: NodeId, b: NodeId) -> bool {
        match (self.mark(a), self.mark(b)) {
            (Some(x), Some(y)) => x.id() == y.id() && self.parent(a) == self.parent(b),
            _ => false,
        }
    }

    pub fn is_group(&self, id: NodeId) -> bool {
        self.mark(id).is_some_and(Mark::is_group)
    }

    pub fn is_leaf(&self, id: NodeId) -> bool {
        self.mark(id).is_some_and(Mark::is_leaf)
    }

    /// Reachable leaves in display order.
    pub fn leaves(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.traverse(self.root(), |id, mark| {
            if mark.is_leaf() {
                out.push(id);
            }
        });
        out
    }

    /// Group that receives new children for a given selection: the root when
    /// nothing is selected, the selection itself when it is a group, and the
    /// selection's parent otherwise. A selection that is no longer reachable
    /// from the root is rejected.
    pub fn target_group(&self, anchor: Option<NodeId>) -> Result<NodeId> {
        let Some(anchor) = anchor else {
            return Ok(self.root());
        };
        let mark = self.mark(anchor).ok_or(Error::UnknownNode)?;
        if !self.is_attached(anchor) {
            return Err(Error::Detached);
        }
        if mark.is_group() {
            Ok(anchor)
        } else {
            self.parent(anchor).ok_or(Error::Detached)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names_are_lowercase() {
        assert_eq!(Mark::group("g").kind().as_str(), "group");
        assert_eq!(Mark::leaf("a", "", "a.rs", 0).kind().as_str(), "leaf");
    }

    #[test]
    fn target_group_rejects_a_deleted_anchor() {
        let mut tree = MarkTree::with_root();
        let root = tree.root();
        let g = tree.create(Mark::group("g"));
        tree.add_child(root, g);
        let a = tree.create(Mark::leaf("a", "", "a.rs", 0));
        tree.add_child(g, a);
        tree.detach(g);

        assert!(matches!(tree.target_group(Some(g)), Err(Error::Detached)));
        assert!(matches!(tree.target_group(Some(a)), Err(Error::Detached)));
        assert_eq!(tree.target_group(None).ok(), Some(root));
    }

    #[test]
    fn leaf_ignores_expansion_changes() {
        let mut leaf = Mark::leaf("a", "", "a.rs", 3);
        leaf.set_expansion(Expansion::Expanded);
        assert_eq!(leaf.expansion(), Expansion::None);
    }

    #[test]
    fn group_refuses_none_expansion() {
        let mut group = Mark::group("g");
        group.set_expansion(Expansion::Collapsed);
        group.set_expansion(Expansion::None);
        assert_eq!(group.expansion(), Expansion::Collapsed);
    }

    #[test]
    fn non_numeric_line_keeps_old_value() {
        let mut leaf = Mark::leaf("a", "", "a.rs", 3);
        assert!(matches!(leaf.set_line_str("ten"), Err(Error::InvalidLine(_))));
        assert!(leaf.set_line_str("-1").is_err());
        assert_eq!(leaf.line(), 3);
        leaf.set_line_str(" 12 ").unwrap();
        assert_eq!(leaf.line(), 12);
    }

    #[test]
    fn fresh_roots_are_equal() {
        assert_eq!(Mark::root(), Mark::root());
    }

    #[test]
    fn target_group_resolves_leaf_to_parent() {
        let mut tree = MarkTree::with_root();
        let root = tree.root();
        let group = tree.create(Mark::group("g"));
        let leaf = tree.create(Mark::leaf("a", "", "a.rs", 0));
        tree.add_child(root, group);
        tree.add_child(group, leaf);

        assert_eq!(tree.target_group(None).unwrap(), root);
        assert_eq!(tree.target_group(Some(group)).unwrap(), group);
        assert_eq!(tree.target_group(Some(leaf)).unwrap(), group);
    }

    #[test]
    fn kind_change_keeps_expansion_valid() {
        let mut mark = Mark::leaf("a", "", "a.rs", 0);
        mark.set_kind(MarkKind::Group);
        assert_eq!(mark.expansion(), Expansion::Expanded);
        mark.set_kind(MarkKind::Leaf);
        assert_eq!(mark.expansion(), Expansion::None);
    }

    #[test]
    fn same_mark_needs_same_parent() {
        let mut tree = MarkTree::with_root();
        let root = tree.root();
        let group = tree.create(Mark::group("g"));
        let leaf = Mark::leaf("a", "", "a.rs", 0);
        let first = tree.create(leaf.clone());
        let twin = tree.create(leaf);
        tree.add_child(root, group);
        tree.add_child(root, first);
        tree.add_child(group, twin);

        assert!(tree.is_same_mark(first, first));
        assert!(!tree.is_same_mark(first, twin));
        tree.detach(twin);
        tree.add_child(root, twin);
        assert!(tree.is_same_mark(first, twin));
    }
}
