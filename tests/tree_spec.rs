use linemark::models::*;
use speculate2::speculate;

fn leaf(tree: &mut MarkTree, parent: NodeId, name: &str) -> NodeId {
    let node = tree.create(Mark::leaf(name, "", "src/lib.rs", 0));
    assert!(tree.add_child(parent, node));
    node
}

fn names(tree: &MarkTree, parent: NodeId) -> Vec<String> {
    tree.children(parent)
        .iter()
        .map(|&c| tree.mark(c).expect("live node").name().to_string())
        .collect()
}

speculate! {
    before {
        let mut tree = MarkTree::with_root();
        let root = tree.root();
        let a = leaf(&mut tree, root, "a");
        let b = leaf(&mut tree, root, "b");
        let c = leaf(&mut tree, root, "c");
    }

    describe "insert_child" {
        it "places the node at the index and shifts later siblings right" {
            let x = tree.create(Mark::leaf("x", "", "x.rs", 0));
            assert!(tree.insert_child(root, x, 1));

            assert_eq!(names(&tree, root), vec!["a", "x", "b", "c"]);
            assert_eq!(tree.index_of(x), Some(1));
            assert_eq!(tree.index_of(b), Some(2));
            assert_eq!(tree.parent(x), Some(root));
        }

        it "accepts the end position" {
            let x = tree.create(Mark::leaf("x", "", "x.rs", 0));
            assert!(tree.insert_child(root, x, 3));
            assert_eq!(tree.index_of(x), Some(3));
        }

        it "ignores an out of range index" {
            let x = tree.create(Mark::leaf("x", "", "x.rs", 0));
            assert!(!tree.insert_child(root, x, 4));
            assert_eq!(names(&tree, root), vec!["a", "b", "c"]);
            assert!(tree.parent(x).is_none());
        }

        it "refuses a node that already has a parent" {
            let g = tree.create(Mark::group("g"));
            tree.add_child(root, g);
            assert!(!tree.insert_child(g, a, 0));
            assert_eq!(tree.parent(a), Some(root));
            assert!(tree.children(g).is_empty());
        }

        it "refuses to put a group under its own descendant" {
            let outer = tree.create(Mark::group("outer"));
            let inner = tree.create(Mark::group("inner"));
            tree.add_child(root, outer);
            tree.add_child(outer, inner);
            tree.detach(outer);
            assert!(!tree.add_child(inner, outer));
        }
    }

    describe "delete_child" {
        it "clears the parent link and index" {
            assert!(tree.delete_child(root, b));
            assert!(tree.parent(b).is_none());
            assert_eq!(tree.index_of(b), None);
            assert!(tree.is_root(b));
            assert_eq!(names(&tree, root), vec!["a", "c"]);
        }

        it "removes by position" {
            assert_eq!(tree.delete_child_by_index(root, 0), Some(a));
            assert_eq!(tree.delete_child_by_index(root, 5), None);
            assert_eq!(names(&tree, root), vec!["b", "c"]);
        }
    }

    describe "set_child" {
        it "swaps siblings with two overwrites" {
            tree.set_child(root, c, 0);
            tree.set_child(root, a, 2);
            assert_eq!(names(&tree, root), vec!["c", "b", "a"]);
            assert_eq!(tree.index_of(a), Some(2));
        }

        it "refuses a node owned by another parent" {
            let g = tree.create(Mark::group("g"));
            tree.add_child(root, g);
            let g1 = leaf(&mut tree, g, "g1");

            assert!(!tree.set_child(g, a, 0));
            assert_eq!(names(&tree, root), vec!["a", "b", "c", "g"]);
            assert_eq!(names(&tree, g), vec!["g1"]);
            assert_eq!(tree.parent(a), Some(root));
            assert_eq!(tree.parent(g1), Some(g));
        }

        it "refuses to place a node inside its own subtree" {
            let g = tree.create(Mark::group("g"));
            tree.add_child(root, g);
            let g1 = leaf(&mut tree, g, "g1");
            tree.detach(g);

            assert!(!tree.set_child(g1, g, 0));
            assert!(!tree.set_child(g, g, 0));
            assert_eq!(tree.parent(g1), Some(g));
        }

        it "unlinks an occupant that no longer appears in the list" {
            let x = tree.create(Mark::leaf("x", "", "x.rs", 0));
            assert!(tree.set_child(root, x, 1));

            assert_eq!(names(&tree, root), vec!["a", "x", "c"]);
            assert_eq!(tree.parent(x), Some(root));
            assert_eq!(tree.parent(b), None);
            assert!(!tree.is_attached(b));
        }
    }

    describe "traverse" {
        it "visits a node before its children" {
            let g = tree.create(Mark::group("g"));
            tree.insert_child(root, g, 1);
            leaf(&mut tree, g, "g1");
            leaf(&mut tree, g, "g2");

            let mut seen = Vec::new();
            tree.traverse(root, |_, mark| seen.push(mark.name().to_string()));
            assert_eq!(seen, vec!["", "a", "g", "g1", "g2", "b", "c"]);
        }
    }

    describe "sibling index chain" {
        it "locates a node again after a reload" {
            let g = tree.create(Mark::group("g"));
            tree.add_child(root, g);
            let deep = leaf(&mut tree, g, "deep");

            let chain = tree.chain(deep).expect("reachable");
            assert_eq!(chain, vec![3, 0]);
            assert_eq!(tree.resolve(&chain), Some(deep));
            assert_eq!(tree.chain(root), Some(vec![]));
            assert_eq!(tree.resolve(&[9]), None);
        }

        it "has no chain for an unlinked node" {
            tree.detach(c);
            assert_eq!(tree.chain(c), None);
        }
    }

    describe "subtree_eq" {
        it "compares structure and fields, not arena positions" {
            let copy = tree.extract(root).expect("root exists");
            assert!(tree.subtree_eq(root, &copy, copy.root()));

            tree.get_mut(b).expect("live").set_name("changed");
            assert!(!tree.subtree_eq(root, &copy, copy.root()));
        }

        it "differs when child counts differ" {
            let copy = tree.extract(root).expect("root exists");
            tree.detach(c);
            assert!(!tree.subtree_eq(root, &copy, copy.root()));
        }
    }

    describe "graft" {
        it "moves a foreign tree under a parent" {
            let mut other = MarkTree::new(Mark::group("imported"));
            let other_root = other.root();
            leaf(&mut other, other_root, "x");

            let g = tree.graft(root, other).expect("grafted");
            assert_eq!(tree.parent(g), Some(root));
            assert_eq!(names(&tree, g), vec!["x"]);
            assert_eq!(tree.index_of(g), Some(3));
        }
    }
}
