//! ASCII tree rendering for mark trees.

use crate::models::{Expansion, Mark, MarkTree, NodeId};

const GROUP_OPEN: char = '▾';
const GROUP_CLOSED: char = '▸';
const LEAF: char = '•';

fn symbol(mark: &Mark) -> char {
    match mark.expansion() {
        Expansion::Expanded => GROUP_OPEN,
        Expansion::Collapsed => GROUP_CLOSED,
        Expansion::None => LEAF,
    }
}

/// One line of text for a mark: groups show their name, leaves add their
/// location (one-based line) and comment.
pub fn label(mark: &Mark) -> String {
    if mark.is_group() {
        return mark.name().to_string();
    }
    let mut out = format!("{}  {}:{}", mark.name(), mark.file_path(), mark.line() + 1);
    if !mark.comment().is_empty() {
        out.push_str("  # ");
        out.push_str(mark.comment());
    }
    out
}

/// Render the subtree under `from` as ASCII art. The first line is `title`.
/// Children of collapsed groups are hidden unless `show_collapsed` is set.
///
/// Example output:
/// ```text
/// marks
/// ├── ▾ parser
/// │   ├── • entry  src/parse.rs:12
/// │   └── • error path  src/parse.rs:88  # check recovery
/// └── ▸ docs
/// ```
pub fn render_tree(tree: &MarkTree, from: NodeId, title: &str, show_collapsed: bool) -> String {
    let mut output = String::new();
    output.push_str(title);
    output.push('\n');
    render_children(&mut output, tree, from, "", show_collapsed);
    output
}

fn render_children(
    output: &mut String,
    tree: &MarkTree,
    parent: NodeId,
    prefix: &str,
    show_collapsed: bool,
) {
    let children = tree.children(parent);
    for (i, &child) in children.iter().enumerate() {
        let Some(mark) = tree.mark(child) else {
            continue;
        };
        let is_last = i == children.len() - 1;
        let branch = if is_last { "└── " } else { "├── " };
        output.push_str(prefix);
        output.push_str(branch);
        output.push(symbol(mark));
        output.push(' ');
        output.push_str(&label(mark));
        output.push('\n');

        if mark.expansion() == Expansion::Collapsed && !show_collapsed {
            continue;
        }
        let continuation = if is_last { "    " } else { "│   " };
        let child_prefix = format!("{}{}", prefix, continuation);
        render_children(output, tree, child, &child_prefix, show_collapsed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (MarkTree, NodeId) {
        let mut tree = MarkTree::with_root();
        let root = tree.root();
        let parser = tree.create(Mark::group("parser"));
        let entry = tree.create(Mark::leaf("entry", "", "src/parse.rs", 11));
        let error = tree.create(Mark::leaf("error path", "check recovery", "src/parse.rs", 87));
        let mut docs = Mark::group("docs");
        docs.set_expansion(Expansion::Collapsed);
        let docs = tree.create(docs);
        let readme = tree.create(Mark::leaf("readme", "", "README.md", 0));
        tree.add_child(root, parser);
        tree.add_child(parser, entry);
        tree.add_child(parser, error);
        tree.add_child(root, docs);
        tree.add_child(docs, readme);
        (tree, docs)
    }

    #[test]
    fn test_empty_tree() {
        let tree = MarkTree::with_root();
        assert_eq!(render_tree(&tree, tree.root(), "marks", false), "marks\n");
    }

    #[test]
    fn test_nested_children() {
        let (tree, _) = sample();
        let output = render_tree(&tree, tree.root(), "marks", false);
        let expected = "marks\n├── ▾ parser\n│   ├── • entry  src/parse.rs:12\n│   └── • error path  src/parse.rs:88  # check recovery\n└── ▸ docs\n";
        assert_eq!(output, expected);
    }

    #[test]
    fn test_show_collapsed() {
        let (tree, docs) = sample();
        let output = render_tree(&tree, docs, "docs", true);
        assert_eq!(output, "docs\n└── • readme  README.md:1\n");
        assert!(render_tree(&tree, tree.root(), "marks", true).contains("readme"));
    }
}
