//! Host-side collaborators: workspace folders and the editor surface.

use std::path::{Component, Path, PathBuf};

/// The folders currently open in the host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Workspace {
    roots: Vec<PathBuf>,
}

impl Workspace {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }

    pub fn single(root: impl Into<PathBuf>) -> Self {
        Self::new(vec![root.into()])
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// The workspace root when exactly one folder is open.
    pub fn single_root(&self) -> Option<&Path> {
        match self.roots.as_slice() {
            [root] => Some(root),
            _ => None,
        }
    }

    /// Workspace-relative form of `path` with `/` separators. Paths outside
    /// every root are returned unchanged.
    pub fn relative(&self, path: &Path) -> String {
        for root in &self.roots {
            if let Ok(rest) = path.strip_prefix(root) {
                return rest
                    .components()
                    .filter_map(|c| match c {
                        Component::Normal(part) => Some(part.to_string_lossy()),
                        _ => None,
                    })
                    .collect::<Vec<_>>()
                    .join("/");
            }
        }
        path.to_string_lossy().into_owned()
    }

    /// Resolve a stored mark path against the first root.
    pub fn absolute(&self, relative: &str) -> PathBuf {
        let path = Path::new(relative);
        if path.is_absolute() {
            return path.to_path_buf();
        }
        match self.roots.first() {
            Some(root) => root.join(path),
            None => path.to_path_buf(),
        }
    }
}

/// Editor surface that can show a location. Calls are fire-and-forget: the
/// tree never waits on them.
pub trait Editor {
    fn reveal(&self, path: &Path, line: u32);

    fn active_file(&self) -> Option<PathBuf>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_strips_root_and_uses_forward_slashes() {
        let ws = Workspace::single("/work/project");
        let rel = ws.relative(Path::new("/work/project/src/lib.rs"));
        assert_eq!(rel, "src/lib.rs");
    }

    #[test]
    fn paths_outside_workspace_are_kept() {
        let ws = Workspace::single("/work/project");
        assert_eq!(ws.relative(Path::new("/etc/hosts")), "/etc/hosts");
    }

    #[test]
    fn single_root_requires_exactly_one_folder() {
        assert!(Workspace::default().single_root().is_none());
        let two = Workspace::new(vec!["/a".into(), "/b".into()]);
        assert!(two.single_root().is_none());
        assert_eq!(
            Workspace::single("/a").single_root(),
            Some(Path::new("/a"))
        );
    }
}
