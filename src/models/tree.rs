//! Generic ordered tree with single ownership.
//!
//! Nodes live in an arena owned by [`Tree`] and are addressed by [`NodeId`].
//! Each node appears in at most one parent's `children` list; the `parent`
//! field is a back-reference used for lookup only. Unlinking a node makes it
//! unreachable from the root, but its slot stays in the arena until the whole
//! tree is replaced.

/// Handle to a node inside one particular [`Tree`].
///
/// Handles are only meaningful for the tree that issued them. After a tree is
/// reloaded, re-address nodes by mark id or by sibling-index chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
struct Slot<T> {
    data: T,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct Tree<T> {
    slots: Vec<Slot<T>>,
    root: NodeId,
}

impl<T> Tree<T> {
    pub fn new(root: T) -> Self {
        Self {
            slots: vec![Slot {
                data: root,
                parent: None,
                children: Vec::new(),
            }],
            root: NodeId(0),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Allocate a detached node. Attach it with [`Tree::add_child`] or
    /// [`Tree::insert_child`].
    pub fn create(&mut self, data: T) -> NodeId {
        let id = NodeId(self.slots.len());
        self.slots.push(Slot {
            data,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    pub fn contains(&self, id: NodeId) -> bool {
        id.0 < self.slots.len()
    }

    pub fn get(&self, id: NodeId) -> Option<&T> {
        self.slots.get(id.0).map(|s| &s.data)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut T> {
        self.slots.get_mut(id.0).map(|s| &mut s.data)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.slots.get(id.0).and_then(|s| s.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.slots
            .get(id.0)
            .map(|s| s.children.as_slice())
            .unwrap_or(&[])
    }

    /// True when the node has no parent. Holds for the tree root and for
    /// nodes that have been unlinked.
    pub fn is_root(&self, id: NodeId) -> bool {
        self.contains(id) && self.parent(id).is_none()
    }

    /// True when the node can be reached from the root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut current = id;
        loop {
            if current == self.root {
                return true;
            }
            match self.parent(current) {
                Some(p) => current = p,
                None => return false,
            }
        }
    }

    /// True when `ancestor` is `id` itself or lies on its parent chain.
    pub fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == ancestor {
                return true;
            }
            current = self.parent(node);
        }
        false
    }

    fn can_attach(&self, parent: NodeId, child: NodeId) -> bool {
        self.contains(parent)
            && self.contains(child)
            && child != self.root
            && self.parent(child).is_none()
            && !self.is_ancestor(child, parent)
    }

    /// Append `child` as the last child of `parent`.
    ///
    /// Refused (returns `false`) when `child` still has a parent, is the tree
    /// root, or is an ancestor of `parent`.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        if !self.can_attach(parent, child) {
            return false;
        }
        self.slots[parent.0].children.push(child);
        self.slots[child.0].parent = Some(parent);
        true
    }

    /// Insert `child` at `index`, shifting later siblings right.
    ///
    /// `index` must satisfy `0 <= index <= children.len()`; anything else is
    /// a silent no-op.
    pub fn insert_child(&mut self, parent: NodeId, child: NodeId, index: usize) -> bool {
        if !self.can_attach(parent, child) || index > self.children(parent).len() {
            return false;
        }
        self.slots[parent.0].children.insert(index, child);
        self.slots[child.0].parent = Some(parent);
        true
    }

    pub fn delete_child_by_index(&mut self, parent: NodeId, index: usize) -> Option<NodeId> {
        let slot = self.slots.get_mut(parent.0)?;
        if index >= slot.children.len() {
            return None;
        }
        let child = slot.children.remove(index);
        self.slots[child.0].parent = None;
        Some(child)
    }

    /// Remove the first occurrence of `child` from `parent`.
    pub fn delete_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        let Some(index) = self
            .children(parent)
            .iter()
            .position(|&c| c == child)
        else {
            return false;
        };
        self.delete_child_by_index(parent, index).is_some()
    }

    /// Unlink a node from its parent, returning the former parent.
    pub fn detach(&mut self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        self.delete_child(parent, id).then_some(parent)
    }

    /// Overwrite slot `index` of `parent` with `child`, leaving every other
    /// slot as it is. Two calls swap a pair of siblings in place.
    ///
    /// `child` must already belong to `parent` or be free to attach there.
    /// A displaced occupant that no longer appears in the list loses its
    /// parent link.
    pub fn set_child(&mut self, parent: NodeId, child: NodeId, index: usize) -> bool {
        if self.parent(child) != Some(parent) && !self.can_attach(parent, child) {
            return false;
        }
        let Some(&displaced) = self.children(parent).get(index) else {
            return false;
        };
        let children = &mut self.slots[parent.0].children;
        children[index] = child;
        let still_listed = children.contains(&displaced);
        self.slots[child.0].parent = Some(parent);
        if !still_listed {
            self.slots[displaced.0].parent = None;
        }
        true
    }

    /// Position of a node among its parent's children.
    pub fn index_of(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|&c| c == id)
    }

    /// Pre-order depth-first walk starting at `from`.
    pub fn traverse(&self, from: NodeId, mut visit: impl FnMut(NodeId, &T)) {
        if !self.contains(from) {
            return;
        }
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            let slot = &self.slots[id.0];
            visit(id, &slot.data);
            stack.extend(slot.children.iter().rev());
        }
    }

    /// Every node of the subtree rooted at `from`, in pre-order.
    pub fn descendants(&self, from: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.traverse(from, |id, _| out.push(id));
        out
    }

    /// Sibling indices from the root down to `id`. Empty for the root itself,
    /// `None` when the node is not reachable from the root.
    pub fn chain(&self, id: NodeId) -> Option<Vec<usize>> {
        let mut chain = Vec::new();
        let mut current = id;
        while current != self.root {
            chain.push(self.index_of(current)?);
            current = self.parent(current)?;
        }
        chain.reverse();
        Some(chain)
    }

    pub fn resolve(&self, chain: &[usize]) -> Option<NodeId> {
        chain
            .iter()
            .try_fold(self.root, |node, &i| self.children(node).get(i).copied())
    }

    /// Move every node reachable from `other`'s root into this tree, appended
    /// under `parent`. Returns the new id of `other`'s root.
    pub fn graft(&mut self, parent: NodeId, other: Tree<T>) -> Option<NodeId> {
        if !self.contains(parent) {
            return None;
        }
        let root = other.root;
        let mut pending: Vec<Option<Slot<T>>> = other.slots.into_iter().map(Some).collect();
        let new_root = self.adopt(&mut pending, root)?;
        self.add_child(parent, new_root).then_some(new_root)
    }

    fn adopt(&mut self, pending: &mut [Option<Slot<T>>], id: NodeId) -> Option<NodeId> {
        let slot = pending.get_mut(id.0)?.take()?;
        let new_id = self.create(slot.data);
        for child in slot.children {
            if let Some(adopted) = self.adopt(pending, child) {
                self.add_child(new_id, adopted);
            }
        }
        Some(new_id)
    }

    /// Structural equality of two subtrees: same data and same children,
    /// pairwise by position. Parent links are not compared.
    pub fn subtree_eq(&self, a: NodeId, other: &Tree<T>, b: NodeId) -> bool
    where
        T: PartialEq,
    {
        if std::ptr::eq(self, other) && a == b {
            return true;
        }
        let (Some(left), Some(right)) = (self.slots.get(a.0), other.slots.get(b.0)) else {
            return false;
        };
        if left.children.len() != right.children.len() {
            return false;
        }
        left.data == right.data
            && left
                .children
                .iter()
                .zip(&right.children)
                .all(|(&x, &y)| self.subtree_eq(x, other, y))
    }
}

impl<T: Clone> Tree<T> {
    /// Copy the subtree rooted at `id` into a standalone tree.
    pub fn extract(&self, id: NodeId) -> Option<Tree<T>> {
        let data = self.get(id)?.clone();
        let mut out = Tree::new(data);
        let root = out.root();
        self.copy_children(id, &mut out, root);
        Some(out)
    }

    fn copy_children(&self, from: NodeId, out: &mut Tree<T>, into: NodeId) {
        for &child in self.children(from) {
            let copy = out.create(self.slots[child.0].data.clone());
            out.add_child(into, copy);
            self.copy_children(child, out, copy);
        }
    }
}
