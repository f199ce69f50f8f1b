//! Drag-and-drop reparenting.
//!
//! A single drag source is held between `begin_drag` and `drop_on`. In every
//! successful drop the node is unlinked from its old parent before it is
//! attached to the new one.

use super::MarkService;
use crate::error::{DropNoOp, Error, Result};
use crate::models::NodeId;

impl MarkService {
    pub fn begin_drag(&mut self, node: NodeId) -> Result<()> {
        self.tree.mark(node).ok_or(Error::UnknownNode)?;
        if self.tree.is_root(node) || !self.tree.is_attached(node) {
            return Err(Error::Detached);
        }
        self.drag_source = Some(node);
        Ok(())
    }

    pub fn cancel_drag(&mut self) {
        self.drag_source = None;
    }

    pub fn drag_source(&self) -> Option<NodeId> {
        self.drag_source
    }

    /// Drop the pending drag source.
    ///
    /// - onto a group: appended as the group's last child;
    /// - onto a leaf: takes the leaf's slot in the leaf's parent;
    /// - onto empty space (`None`): appended to the root.
    ///
    /// The drag source is consumed even when the drop is refused.
    pub fn drop_on(&mut self, target: Option<NodeId>) -> Result<()> {
        let source = self
            .drag_source
            .take()
            .ok_or(Error::DragDropNoOp(DropNoOp::NoDragSource))?;
        let old_parent = self.tree.parent(source).ok_or(Error::Detached)?;
        if !self.tree.is_attached(source) {
            return Err(Error::Detached);
        }

        match target {
            None => {
                let root = self.tree.root();
                if old_parent == root {
                    return Err(Error::DragDropNoOp(DropNoOp::AlreadyAtRoot));
                }
                self.tree.detach(source);
                self.tree.add_child(root, source);
            }
            Some(target) if target == source => {
                return Err(Error::DragDropNoOp(DropNoOp::OntoSelf));
            }
            Some(target) => {
                let mark = self.tree.mark(target).ok_or(Error::UnknownNode)?;
                if !self.tree.is_attached(target) {
                    return Err(Error::Detached);
                }
                if self.tree.is_ancestor(source, target) {
                    return Err(Error::DragDropNoOp(DropNoOp::IntoDescendant));
                }
                if mark.is_group() {
                    self.tree.detach(source);
                    self.tree.add_child(target, source);
                } else {
                    let parent = self.tree.parent(target).ok_or(Error::Detached)?;
                    let slot = self.tree.index_of(target).ok_or(Error::Detached)?;
                    self.tree.detach(source);
                    self.tree.insert_child(parent, source, slot);
                }
            }
        }

        tracing::debug!("Dropped {:?} onto {:?}", source, target);
        self.index.invalidate_order();
        self.notifier.refresh();
        self.after_mutation();
        Ok(())
    }
}
