//! Detecting and resolving out-of-band edits to the save file.
//!
//! The save file's modification time is compared with the last one this
//! process wrote or read. A newer file is loaded and compared structurally
//! with the in-memory tree; if they differ the loaded tree either replaces
//! the current one outright (`AutoReadChange`) or is handed back to the host
//! as a [`Conflict`] to confirm. Trees are swapped wholesale, never merged.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use super::MarkService;
use crate::config::MarkConfig;
use crate::error::Result;
use crate::models::MarkTree;
use crate::storage::MarkStore;
use crate::workspace::Workspace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileTrigger {
    FocusRegained,
    WorkspaceChanged,
    ConfigChanged,
}

/// A save file that differs from the in-memory tree.
#[derive(Debug)]
pub struct Conflict {
    tree: MarkTree,
    modified: Option<SystemTime>,
    path: PathBuf,
}

impl Conflict {
    /// The tree as found on disk.
    pub fn tree(&self) -> &MarkTree {
        &self.tree
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[derive(Debug)]
pub enum ReconcileOutcome {
    /// No save file is resolved for this session.
    Unavailable,
    /// The file is not newer than what we last saw.
    Unchanged,
    /// The file is newer but holds the same tree.
    Identical,
    /// The file differed and replaced the in-memory tree.
    Replaced,
    /// The file differs; the host must [`MarkService::accept`] or
    /// [`MarkService::decline`].
    Pending(Conflict),
}

impl MarkService {
    pub fn reconcile(&mut self, trigger: ReconcileTrigger) -> Result<ReconcileOutcome> {
        let Some(store) = &self.store else {
            return Ok(ReconcileOutcome::Unavailable);
        };
        if !store.changed_on_disk()? {
            return Ok(ReconcileOutcome::Unchanged);
        }

        tracing::info!(?trigger, "Save file changed on disk: {}", store.path().display());
        let (loaded, modified) = store.read()?;
        let loaded = loaded.unwrap_or_else(MarkTree::with_root);
        if loaded.subtree_eq(loaded.root(), &self.tree, self.tree.root()) {
            store.acknowledge(modified);
            return Ok(ReconcileOutcome::Identical);
        }

        let conflict = Conflict {
            tree: loaded,
            modified,
            path: store.path().to_path_buf(),
        };
        if self.config.auto_read_change {
            self.accept(conflict);
            return Ok(ReconcileOutcome::Replaced);
        }
        Ok(ReconcileOutcome::Pending(conflict))
    }

    /// Replace the in-memory tree with the one from disk.
    pub fn accept(&mut self, conflict: Conflict) {
        tracing::info!("Reloading marks from {}", conflict.path.display());
        self.adopt_timestamp(conflict.modified);
        self.replace_tree(conflict.tree);
    }

    /// Keep the in-memory tree. The disk timestamp is adopted so the same
    /// change is not offered again; the next save overwrites it.
    pub fn decline(&mut self, conflict: Conflict) {
        tracing::info!("Keeping in-memory marks over {}", conflict.path.display());
        self.adopt_timestamp(conflict.modified);
    }

    /// Never move the known timestamp backwards past a save of ours that
    /// landed while the conflict was pending.
    fn adopt_timestamp(&self, modified: Option<SystemTime>) {
        if let Some(store) = &self.store {
            store.acknowledge(modified.max(store.last_known()));
        }
    }

    pub fn on_focus_regained(&mut self) -> Result<ReconcileOutcome> {
        self.reconcile(ReconcileTrigger::FocusRegained)
    }

    pub fn on_workspace_changed(&mut self, workspace: Workspace) -> Result<ReconcileOutcome> {
        self.workspace = workspace;
        self.rebind_store()?;
        self.reconcile(ReconcileTrigger::WorkspaceChanged)
    }

    pub fn on_config_changed(&mut self, config: MarkConfig) -> Result<ReconcileOutcome> {
        self.config = config;
        self.rebind_store()?;
        self.reconcile(ReconcileTrigger::ConfigChanged)
    }

    /// Re-resolve the save path. A store for an unchanged path is kept so its
    /// known timestamp survives.
    fn rebind_store(&mut self) -> Result<()> {
        match MarkStore::open(&self.config, &self.workspace) {
            Ok(store) => {
                let same = self
                    .store
                    .as_ref()
                    .is_some_and(|current| current.path() == store.path());
                if !same {
                    tracing::info!("Save file is now {}", store.path().display());
                    self.store = Some(store);
                }
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Cannot resolve save file: {}", e);
                self.store = None;
                Err(e)
            }
        }
    }
}
