//! Path confinement for every filesystem-touching tool.
//!
//! Relative paths resolve against the workspace root. A path is accepted
//! only when it contains no parent-directory component and lands inside the
//! workspace root or one of a small fixed allow-list (home, process cwd,
//! standard temp directories). Resolution is lexical: write targets may not
//! exist yet, so `canonicalize` is not an option.

use std::env;
use std::path::{Component, Path, PathBuf};

/// Shared confinement policy, cloned into each tool.
#[derive(Debug, Clone)]
pub struct PathGuard {
    workspace_root: PathBuf,
    allowed_roots: Vec<PathBuf>,
}

impl PathGuard {
    pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
        let workspace_root = normalize(&workspace_root.into());
        let mut allowed_roots = vec![
            PathBuf::from("/tmp"),
            PathBuf::from("/var/tmp"),
            normalize(&env::temp_dir()),
        ];
        if let Some(home) = dirs::home_dir() {
            allowed_roots.push(normalize(&home));
        }
        if let Ok(cwd) = env::current_dir() {
            allowed_roots.push(normalize(&cwd));
        }
        Self {
            workspace_root,
            allowed_roots,
        }
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    /// Resolve `raw` and check it against the policy. The returned path is
    /// absolute and safe to hand to the filesystem.
    pub fn resolve(&self, raw: &str) -> Result<PathBuf, String> {
        let candidate = Path::new(raw);
        if candidate
            .components()
            .any(|c| matches!(c, Component::ParentDir))
        {
            return Err(format!(
                "access denied: path '{raw}' contains a parent-directory reference"
            ));
        }

        let absolute = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.workspace_root.join(candidate)
        };
        let absolute = normalize(&absolute);

        if absolute.starts_with(&self.workspace_root)
            || self
                .allowed_roots
                .iter()
                .any(|root| absolute.starts_with(root))
        {
            Ok(absolute)
        } else {
            Err(format!(
                "access denied: path '{raw}' is outside the allowed directories"
            ))
        }
    }
}

/// Drop `.` components. `..` never reaches here for guarded input; for
/// configured roots it is resolved textually against what precedes it.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn rejects_parent_references() {
        let dir = TempDir::new().unwrap();
        let guard = PathGuard::new(dir.path());
        let err = guard.resolve("../secrets.txt").unwrap_err();
        assert!(err.contains("access denied"));
    }

    #[test]
    fn accepts_workspace_relative() {
        let dir = TempDir::new().unwrap();
        let guard = PathGuard::new(dir.path());
        let resolved = guard.resolve("src/lib.rs").unwrap();
        assert!(resolved.starts_with(dir.path()));
    }

    #[test]
    fn accepts_temp_directories() {
        let dir = TempDir::new().unwrap();
        let guard = PathGuard::new(dir.path());
        assert!(guard.resolve("/tmp/scratch.txt").is_ok());
    }

    #[test]
    fn rejects_foreign_absolute_paths() {
        let dir = TempDir::new().unwrap();
        let guard = PathGuard::new(dir.path());
        let err = guard.resolve("/etc/shadow").unwrap_err();
        assert!(err.contains("access denied"));
    }

    #[test]
    fn normalizes_current_dir_components() {
        let dir = TempDir::new().unwrap();
        let guard = PathGuard::new(dir.path());
        let resolved = guard.resolve("./a/./b.txt").unwrap();
        assert_eq!(resolved, dir.path().join("a/b.txt"));
    }
}
