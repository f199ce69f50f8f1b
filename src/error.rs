//! Error types shared by every layer of the crate.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Why a drop was ignored. The tree is left untouched in every case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropNoOp {
    /// The dragged node was dropped onto itself.
    OntoSelf,
    /// The node already sits directly under the root and was dropped on empty space.
    AlreadyAtRoot,
    /// A group was dropped onto one of its own descendants.
    IntoDescendant,
    /// A drop arrived without a preceding drag.
    NoDragSource,
}

impl std::fmt::Display for DropNoOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            Self::OntoSelf => "node dropped onto itself",
            Self::AlreadyAtRoot => "node is already at the top level",
            Self::IntoDescendant => "a group cannot be moved into its own descendant",
            Self::NoDragSource => "no drag in progress",
        };
        f.write_str(msg)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    // Validation
    #[error("line number must be a non-negative integer, got {0:?}")]
    InvalidLine(String),

    #[error("a group named {0:?} already exists here")]
    DuplicateName(String),

    #[error("node does not exist in this tree")]
    UnknownNode,

    #[error("node is not attached to a parent")]
    Detached,

    // Path resolution
    #[error("cannot derive a save path: expected exactly one workspace folder, found {roots}")]
    ProjectPathUnavailable { roots: usize },

    #[error("configured save path is neither a file nor a directory: {}", .0.display())]
    PathInvalid(PathBuf),

    #[error("file not found: {}", .0.display())]
    PathNotFound(PathBuf),

    // Drag and drop
    #[error("drop ignored: {0}")]
    DragDropNoOp(DropNoOp),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("malformed mark data: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Validation failures are rejected before any mutation happens.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidLine(_) | Self::DuplicateName(_) | Self::UnknownNode | Self::Detached
        )
    }

    pub fn is_path_error(&self) -> bool {
        matches!(
            self,
            Self::ProjectPathUnavailable { .. } | Self::PathInvalid(_) | Self::PathNotFound(_)
        )
    }
}
