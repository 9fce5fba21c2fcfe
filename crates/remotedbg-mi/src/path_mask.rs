//! Workspace path masking
//!
//! Clients never see where the sandbox mounts a session's sources: the
//! workspace directory is presented as the virtual root `/`. Masking is
//! segment-aware, so a workspace of `/box/u1` leaves `/box/u10/main.c`
//! untouched.

use std::path::{Path, PathBuf};

/// Maps between real sandbox paths and client-visible ones
#[derive(Debug, Clone)]
pub struct PathMasker {
    work_path: PathBuf,
}

impl PathMasker {
    pub fn new(work_path: impl Into<PathBuf>) -> Self {
        Self {
            work_path: work_path.into(),
        }
    }

    pub fn work_path(&self) -> &Path {
        &self.work_path
    }

    /// True if `path` lies inside the workspace
    pub fn is_inside(&self, path: impl AsRef<Path>) -> bool {
        path.as_ref().starts_with(&self.work_path)
    }

    /// Real path to client path. Paths outside the workspace come back
    /// unchanged; callers decide whether those may be surfaced.
    pub fn mask(&self, path: impl AsRef<Path>) -> String {
        let path = path.as_ref();
        match path.strip_prefix(&self.work_path) {
            Ok(rel) => format!("/{}", rel.display()),
            Err(_) => path.display().to_string(),
        }
    }

    /// Client path back to the real path
    pub fn unmask(&self, masked: &str) -> PathBuf {
        self.work_path.join(masked.trim_start_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_workspace_prefix() {
        let masker = PathMasker::new("/box/u1");
        assert_eq!(masker.mask("/box/u1/main.c"), "/main.c");
        assert_eq!(masker.mask("/box/u1/src/util.c"), "/src/util.c");
    }

    #[test]
    fn unmask_inverts_mask() {
        let masker = PathMasker::new("/box/u1");
        assert_eq!(masker.unmask("/main.c"), PathBuf::from("/box/u1/main.c"));
        assert_eq!(
            masker.unmask(&masker.mask("/box/u1/src/util.c")),
            PathBuf::from("/box/u1/src/util.c")
        );
    }

    #[test]
    fn sibling_directory_with_common_prefix_untouched() {
        let masker = PathMasker::new("/box/u1");
        assert_eq!(masker.mask("/box/u10/main.c"), "/box/u10/main.c");
        assert!(!masker.is_inside("/box/u10/main.c"));
    }

    #[test]
    fn system_paths_untouched() {
        let masker = PathMasker::new("/box/u1");
        assert_eq!(masker.mask("/usr/include/stdio.h"), "/usr/include/stdio.h");
        assert!(masker.is_inside("/box/u1/main.c"));
    }
}
