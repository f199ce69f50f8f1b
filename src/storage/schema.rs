//! On-disk form of a mark tree.
//!
//! The tree is projected into explicit plain records before serialization.
//! Parent links are never written; they are rebuilt from nesting on load.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{new_mark_id, Expansion, Mark, MarkKind, MarkTree, NodeId, Tree};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkRecord {
    #[serde(default = "new_mark_id")]
    pub id: String,
    #[serde(default)]
    pub kind: KindRecord,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub file_path: String,
    /// Zero-based.
    #[serde(default)]
    pub line: u32,
    #[serde(default)]
    pub expansion_state: ExpansionRecord,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub children: Vec<MarkRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KindRecord {
    Group,
    #[default]
    #[serde(alias = "file")]
    Leaf,
    /// Any other tag. Loaded as a group.
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpansionRecord {
    #[default]
    None,
    Collapsed,
    Expanded,
    #[serde(other)]
    Unknown,
}

impl From<MarkKind> for KindRecord {
    fn from(kind: MarkKind) -> Self {
        match kind {
            MarkKind::Group => Self::Group,
            MarkKind::Leaf => Self::Leaf,
        }
    }
}

impl From<Expansion> for ExpansionRecord {
    fn from(expansion: Expansion) -> Self {
        match expansion {
            Expansion::None => Self::None,
            Expansion::Collapsed => Self::Collapsed,
            Expansion::Expanded => Self::Expanded,
        }
    }
}

impl MarkRecord {
    /// Project the subtree rooted at `id`.
    pub fn from_tree(tree: &MarkTree, id: NodeId) -> Option<Self> {
        let mark = tree.mark(id)?;
        let children = tree
            .children(id)
            .iter()
            .filter_map(|&child| Self::from_tree(tree, child))
            .collect();
        Some(Self {
            id: mark.id().to_string(),
            kind: mark.kind().into(),
            name: mark.name().to_string(),
            comment: mark.comment().to_string(),
            file_path: mark.file_path().to_string(),
            line: mark.line(),
            expansion_state: mark.expansion().into(),
            created_at: mark.created_at(),
            children,
        })
    }

    /// Rebuild a tree from this record, children first. A record holding
    /// children is always a group, and a group stored as "none" comes back
    /// expanded.
    pub fn into_tree(self) -> MarkTree {
        self.assemble(true)
    }

    /// Like [`into_tree`](Self::into_tree) but an exported leaf stays a leaf.
    pub fn into_subtree(self) -> MarkTree {
        self.assemble(false)
    }

    fn assemble(self, force_group: bool) -> MarkTree {
        let (root_mark, children) = self.into_parts(force_group);
        let mut tree = Tree::new(root_mark);
        let root = tree.root();
        for child in children {
            let id = child.build(&mut tree);
            tree.add_child(root, id);
        }
        tree
    }

    fn build(self, tree: &mut MarkTree) -> NodeId {
        let (mark, children) = self.into_parts(false);
        let built: Vec<NodeId> = children.into_iter().map(|c| c.build(tree)).collect();
        let id = tree.create(mark);
        for child in built {
            tree.add_child(id, child);
        }
        id
    }

    fn into_parts(self, force_group: bool) -> (Mark, Vec<MarkRecord>) {
        let kind = if force_group || !self.children.is_empty() {
            MarkKind::Group
        } else {
            match self.kind {
                KindRecord::Leaf => MarkKind::Leaf,
                KindRecord::Group | KindRecord::Unknown => MarkKind::Group,
            }
        };
        let expansion = match (kind, self.expansion_state) {
            (MarkKind::Leaf, _) => Expansion::None,
            (MarkKind::Group, ExpansionRecord::Collapsed) => Expansion::Collapsed,
            (MarkKind::Group, _) => Expansion::Expanded,
        };
        let mark = Mark::restore(
            self.id,
            kind,
            self.name,
            self.comment,
            self.file_path,
            self.line,
            expansion,
            self.created_at,
        );
        (mark, self.children)
    }
}

/// Pretty-print with four-space indentation.
pub fn to_pretty_json(record: &MarkRecord) -> serde_json::Result<String> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    record.serialize(&mut ser)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Parse save-file text. Blank text (a fresh placeholder) yields `None`.
pub fn parse_tree(text: &str) -> serde_json::Result<Option<MarkTree>> {
    if text.trim().is_empty() {
        return Ok(None);
    }
    let record: MarkRecord = serde_json::from_str(text)?;
    Ok(Some(record.into_tree()))
}

/// Parse an exported subtree. Blank text yields `None`.
pub fn parse_subtree(text: &str) -> serde_json::Result<Option<MarkTree>> {
    if text.trim().is_empty() {
        return Ok(None);
    }
    let record: MarkRecord = serde_json::from_str(text)?;
    Ok(Some(record.into_subtree()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaf_with_children_is_coerced_to_expanded_group() {
        let text = r#"{
            "id": "root", "kind": "group", "expansionState": "expanded",
            "children": [
                { "id": "x", "kind": "leaf", "name": "odd", "expansionState": "none",
                  "children": [ { "id": "y", "kind": "leaf", "name": "inner", "line": 4 } ] }
            ]
        }"#;
        let tree = parse_tree(text).unwrap().unwrap();
        let x = tree.find_by_mark_id("x").unwrap();
        let mark = tree.mark(x).unwrap();
        assert!(mark.is_group());
        assert_eq!(mark.expansion(), Expansion::Expanded);
        let y = tree.find_by_mark_id("y").unwrap();
        assert_eq!(tree.parent(y), Some(x));
        assert_eq!(tree.mark(y).unwrap().line(), 4);
    }

    #[test]
    fn legacy_file_tag_loads_as_leaf() {
        let text = r#"{ "id": "root", "kind": "group", "children": [ { "id": "a", "kind": "file" } ] }"#;
        let tree = parse_tree(text).unwrap().unwrap();
        let a = tree.find_by_mark_id("a").unwrap();
        assert!(tree.is_leaf(a));
    }

    #[test]
    fn unknown_kind_loads_as_group() {
        let text = r#"{ "id": "root", "kind": "group", "children": [ { "id": "a", "kind": "folder" } ] }"#;
        let tree = parse_tree(text).unwrap().unwrap();
        let a = tree.find_by_mark_id("a").unwrap();
        assert!(tree.is_group(a));
    }

    #[test]
    fn blank_text_is_an_empty_save() {
        assert!(parse_tree("  \n").unwrap().is_none());
    }

    #[test]
    fn output_uses_four_space_indent_and_no_parent_field() {
        let tree = MarkTree::with_root();
        let record = MarkRecord::from_tree(&tree, tree.root()).unwrap();
        let text = to_pretty_json(&record).unwrap();
        assert!(text.contains("\n    \"id\": \"root\""));
        assert!(text.contains("\"expansionState\": \"expanded\""));
        assert!(!text.contains("parent"));
    }
}
