//! Input validation: turn a caller-supplied path into an absolute path to a
//! readable regular file.
//!
//! Runs before anything else touches the filesystem, so a bad path never costs
//! a scratch directory or a subprocess. The check order is fixed: existence
//! first, then file type, then readability.

use crate::error::HwpError;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Validate `path` and return its absolute form.
///
/// # Errors
/// - [`HwpError::NotFound`] if nothing exists at `path`
/// - [`HwpError::InvalidInput`] for directories and other non-regular files
/// - [`HwpError::PermissionDenied`] if the file cannot be opened for reading
pub fn validate_source(path: &Path) -> Result<PathBuf, HwpError> {
    let meta = match std::fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(HwpError::NotFound {
                path: path.to_path_buf(),
            });
        }
        Err(e) if e.kind() == ErrorKind::PermissionDenied => {
            return Err(HwpError::PermissionDenied {
                path: path.to_path_buf(),
            });
        }
        Err(e) => return Err(HwpError::io(path, e)),
    };

    if meta.is_dir() {
        return Err(HwpError::InvalidInput {
            path: path.to_path_buf(),
            reason: "path is a directory, expected an HWP file".into(),
        });
    }
    if !meta.is_file() {
        return Err(HwpError::InvalidInput {
            path: path.to_path_buf(),
            reason: "not a regular file".into(),
        });
    }

    if let Err(e) = std::fs::File::open(path) {
        if e.kind() == ErrorKind::PermissionDenied {
            return Err(HwpError::PermissionDenied {
                path: path.to_path_buf(),
            });
        }
        return Err(HwpError::io(path, e));
    }

    let absolute = std::path::absolute(path).map_err(|e| HwpError::io(path, e))?;
    debug!("Resolved HWP source: {}", absolute.display());
    Ok(absolute)
}

/// Base file name used in results and error messages.
pub fn source_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// File stem used to name the tool's output inside the scratch directory.
pub fn source_stem(path: &Path) -> String {
    path.file_stem()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "document".to_string())
}
