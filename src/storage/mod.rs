mod schema;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::SystemTime;

pub use schema::*;

use crate::config::MarkConfig;
use crate::error::{Error, Result};
use crate::models::{MarkTree, NodeId};
use crate::workspace::Workspace;

/// File name used inside a directory save location.
pub const DEFAULT_FILE_NAME: &str = "markData.json";
/// Tool metadata directory under the workspace root.
pub const METADATA_DIR: &str = ".vscode";

/// Where the save file lives and how the location was chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavePath {
    pub path: PathBuf,
    /// Derived from the workspace rather than configured explicitly.
    pub derived: bool,
}

/// Resolve the save file location.
///
/// An explicitly configured path wins; a directory gets
/// [`DEFAULT_FILE_NAME`] appended, and a path that is neither file nor
/// directory is rejected. Otherwise the path is derived from the single
/// workspace root.
pub fn resolve_save_path(config: &MarkConfig, workspace: &Workspace) -> Result<SavePath> {
    if let Some(configured) = config.save_path() {
        let path = PathBuf::from(configured);
        if path.is_dir() {
            return Ok(SavePath {
                path: path.join(DEFAULT_FILE_NAME),
                derived: false,
            });
        }
        if path.is_file() {
            return Ok(SavePath {
                path,
                derived: false,
            });
        }
        return Err(Error::PathInvalid(path));
    }

    let root = workspace
        .single_root()
        .ok_or(Error::ProjectPathUnavailable {
            roots: workspace.roots().len(),
        })?;
    Ok(SavePath {
        path: root.join(METADATA_DIR).join(DEFAULT_FILE_NAME),
        derived: true,
    })
}

#[derive(Debug, Default)]
struct SyncState {
    /// Sequence number of the newest snapshot written so far.
    written_seq: u64,
    /// Modification time of the save file as last written or read by us.
    last_known: Option<SystemTime>,
}

/// Reads and writes one save file and remembers its last known
/// modification time.
#[derive(Debug, Clone)]
pub struct MarkStore {
    path: PathBuf,
    state: Arc<Mutex<SyncState>>,
    next_seq: Arc<AtomicU64>,
}

impl MarkStore {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: Arc::new(Mutex::new(SyncState::default())),
            next_seq: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Resolve the save path for this workspace. For a derived path the
    /// metadata directory and an empty placeholder file are created if
    /// missing.
    pub fn open(config: &MarkConfig, workspace: &Workspace) -> Result<Self> {
        let resolved = resolve_save_path(config, workspace)?;
        if resolved.derived {
            ensure_placeholder(&resolved.path)?;
        }
        tracing::debug!("Using save file {}", resolved.path.display());
        Ok(Self::at(resolved.path))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, SyncState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Load the tree and adopt the file's timestamp as known. An empty file
    /// loads as `None`.
    pub fn load(&self) -> Result<Option<MarkTree>> {
        let (tree, modified) = self.read()?;
        self.acknowledge(modified);
        tracing::info!("Loaded marks from {}", self.path.display());
        Ok(tree)
    }

    /// Read the save file without touching the known timestamp.
    pub fn read(&self) -> Result<(Option<MarkTree>, Option<SystemTime>)> {
        let tree = read_tree(&self.path)?;
        Ok((tree, modified_time(&self.path)?))
    }

    /// Serialize and write the whole tree now.
    pub fn save(&self, tree: &MarkTree) -> Result<()> {
        let text = snapshot(tree, tree.root())?;
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        write_snapshot(&self.path, &self.state, seq, &text)
    }

    /// Snapshot the tree now and write it without waiting.
    ///
    /// With a tokio runtime available the write runs on the blocking pool;
    /// otherwise it happens inline. A snapshot older than one already on disk
    /// is discarded, so the file always ends at the newest state. Write
    /// failures are passed to `on_error`.
    pub fn save_detached<F>(&self, tree: &MarkTree, on_error: F) -> Result<()>
    where
        F: FnOnce(Error) + Send + 'static,
    {
        let text = snapshot(tree, tree.root())?;
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        let path = self.path.clone();
        let state = Arc::clone(&self.state);

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(move || {
                    if let Err(e) = write_snapshot(&path, &state, seq, &text) {
                        on_error(e);
                    }
                });
            }
            Err(_) => {
                if let Err(e) = write_snapshot(&path, &state, seq, &text) {
                    on_error(e);
                }
            }
        }
        Ok(())
    }

    pub fn last_known(&self) -> Option<SystemTime> {
        self.lock().last_known
    }

    pub fn acknowledge(&self, modified: Option<SystemTime>) {
        self.lock().last_known = modified;
    }

    /// Current modification time of the save file, `None` if it is missing.
    pub fn disk_modified(&self) -> Result<Option<SystemTime>> {
        modified_time(&self.path)
    }

    /// True when the file on disk is newer than anything this process wrote
    /// or read.
    pub fn changed_on_disk(&self) -> Result<bool> {
        let Some(disk) = self.disk_modified()? else {
            return Ok(false);
        };
        Ok(match self.last_known() {
            Some(known) => disk > known,
            None => true,
        })
    }
}

fn snapshot(tree: &MarkTree, id: NodeId) -> Result<String> {
    let record = MarkRecord::from_tree(tree, id).ok_or(Error::UnknownNode)?;
    Ok(to_pretty_json(&record)?)
}

fn write_snapshot(path: &Path, state: &Mutex<SyncState>, seq: u64, text: &str) -> Result<()> {
    let mut state = state.lock().unwrap_or_else(|e| e.into_inner());
    if seq < state.written_seq {
        tracing::debug!("Skipping stale snapshot {} for {}", seq, path.display());
        return Ok(());
    }
    fs::write(path, text)?;
    state.written_seq = seq;
    state.last_known = modified_time(path)?;
    tracing::debug!("Saved marks to {}", path.display());
    Ok(())
}

fn modified_time(path: &Path) -> Result<Option<SystemTime>> {
    match fs::metadata(path) {
        Ok(meta) => Ok(Some(meta.modified()?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Create the parent directory and an empty file if they do not exist yet.
pub fn ensure_placeholder(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    if !path.exists() {
        fs::write(path, "")?;
        tracing::info!("Created save file {}", path.display());
    }
    Ok(())
}

/// Read a whole mark tree from a file in save-file format.
pub fn read_tree(path: &Path) -> Result<Option<MarkTree>> {
    Ok(parse_tree(&read_text(path)?)?)
}

/// Read an exported subtree, keeping the kind of its top node.
pub fn read_subtree(path: &Path) -> Result<Option<MarkTree>> {
    Ok(parse_subtree(&read_text(path)?)?)
}

fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::PathNotFound(path.to_path_buf()),
        _ => e.into(),
    })
}

/// Write the subtree rooted at `id` to `path`. Used for exports; does not
/// touch any store's known timestamp.
pub fn write_subtree(path: &Path, tree: &MarkTree, id: NodeId) -> Result<()> {
    let text = snapshot(tree, id)?;
    fs::write(path, text)?;
    Ok(())
}
