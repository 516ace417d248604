//! Scoped scratch directories for external tool output.
//!
//! Every tool invocation gets its own uniquely named directory
//! (`hwp-parser-XXXXXX`) so concurrent conversions never see each other's
//! files. The directory lives exactly as long as the [`Scratch`] guard: the
//! success path calls [`Scratch::release`], which reports a failed removal
//! in the log, and every early return relies on `Drop`.

use crate::error::HwpError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

/// Prefix of every scratch directory.
pub const SCRATCH_PREFIX: &str = "hwp-parser-";

/// A scratch directory removed when dropped.
#[derive(Debug)]
pub struct Scratch {
    dir: TempDir,
}

impl Scratch {
    /// Create a fresh directory under `root`, or the system temp dir.
    pub fn acquire(root: Option<&Path>) -> Result<Self, HwpError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(SCRATCH_PREFIX);
        let dir = match root {
            Some(r) => builder.tempdir_in(r).map_err(|e| HwpError::io(r, e))?,
            None => builder
                .tempdir()
                .map_err(|e| HwpError::io(std::env::temp_dir(), e))?,
        };
        debug!("Scratch directory: {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path for a tool output named `name` inside the scratch directory.
    pub fn join(&self, name: impl AsRef<Path>) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Remove the directory now, logging instead of failing on error.
    pub fn release(self) {
        let path = self.dir.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            warn!("Failed to remove scratch directory {}: {}", path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leftovers(root: &Path) -> usize {
        std::fs::read_dir(root)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(SCRATCH_PREFIX))
            .count()
    }

    #[test]
    fn release_removes_directory() {
        let root = tempfile::tempdir().unwrap();
        let scratch = Scratch::acquire(Some(root.path())).unwrap();
        std::fs::write(scratch.join("out.odt"), b"x").unwrap();
        assert_eq!(leftovers(root.path()), 1);

        scratch.release();
        assert_eq!(leftovers(root.path()), 0);
    }

    #[test]
    fn drop_removes_directory() {
        let root = tempfile::tempdir().unwrap();
        {
            let scratch = Scratch::acquire(Some(root.path())).unwrap();
            std::fs::create_dir_all(scratch.join("doc/bindata")).unwrap();
        }
        assert_eq!(leftovers(root.path()), 0);
    }

    #[test]
    fn directories_are_unique() {
        let root = tempfile::tempdir().unwrap();
        let a = Scratch::acquire(Some(root.path())).unwrap();
        let b = Scratch::acquire(Some(root.path())).unwrap();
        assert_ne!(a.path(), b.path());
    }

    #[test]
    fn missing_root_is_io_error() {
        let root = tempfile::tempdir().unwrap();
        let err = Scratch::acquire(Some(&root.path().join("gone"))).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Io);
    }
}
