//! Error types for the hwp-parser library.
//!
//! Every failure is reported through a single enum, [`HwpError`]. Callers that
//! need to branch on the *category* of a failure (the HTTP facade mapping to
//! status codes, the worker protocol reconstructing errors on the far side of
//! a pipe) use [`HwpError::kind`] rather than matching every variant.
//!
//! All errors are terminal: a conversion either produces a complete result or
//! one of these. There are no partial results and no retries.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the hwp-parser library.
#[derive(Debug, Error)]
pub enum HwpError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("HWP file not found: '{path}'\nCheck the path exists and is readable.")]
    NotFound { path: PathBuf },

    /// The path exists but is a directory or some other non-regular file.
    #[error("Invalid input '{path}': {reason}")]
    InvalidInput { path: PathBuf, reason: String },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The requested output format token is not one of the supported set.
    #[error("Unsupported output format '{format}'. Supported: txt, html, markdown, odt")]
    UnsupportedFormat { format: String },

    // ── External tool errors ──────────────────────────────────────────────
    /// The pyhwp tool could not be started, exited non-zero or produced
    /// unusable output.
    #[error("{tool} failed for '{source_name}': {detail}")]
    ExternalToolFailure {
        tool: String,
        source_name: String,
        detail: String,
    },

    /// `hwp5odt` rejected its own output during RelaxNG validation.
    #[error(
        "ODT conversion failed for '{source_name}': the document did not pass \
ODT schema validation.\nConvert to HTML or Markdown instead.\n{detail}"
    )]
    OdtValidationFailed { source_name: String, detail: String },

    // ── Mode errors ───────────────────────────────────────────────────────
    /// The format is valid but cannot be produced through this entry point.
    #[error("Output format '{format}' is not available in {mode}")]
    OperationUnsupportedInMode { format: String, mode: String },

    // ── Worker errors ─────────────────────────────────────────────────────
    /// A pooled worker process crashed, hung up or replied with garbage.
    #[error("Worker process failed: {detail}")]
    WorkerFailed { detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Scratch directory or other filesystem work failed.
    #[error("I/O error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse failure category, stable across process boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    InvalidInput,
    UnsupportedFormat,
    ExternalToolFailure,
    OperationUnsupportedInMode,
    Io,
    Internal,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::UnsupportedFormat => "unsupported_format",
            ErrorKind::ExternalToolFailure => "external_tool_failure",
            ErrorKind::OperationUnsupportedInMode => "operation_unsupported_in_mode",
            ErrorKind::Io => "io",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl HwpError {
    /// Category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            HwpError::NotFound { .. } => ErrorKind::NotFound,
            HwpError::InvalidInput { .. } | HwpError::PermissionDenied { .. } => {
                ErrorKind::InvalidInput
            }
            HwpError::UnsupportedFormat { .. } => ErrorKind::UnsupportedFormat,
            HwpError::ExternalToolFailure { .. } | HwpError::OdtValidationFailed { .. } => {
                ErrorKind::ExternalToolFailure
            }
            HwpError::OperationUnsupportedInMode { .. } => ErrorKind::OperationUnsupportedInMode,
            HwpError::OutputWriteFailed { .. } | HwpError::Io { .. } => ErrorKind::Io,
            HwpError::WorkerFailed { .. }
            | HwpError::InvalidConfig(_)
            | HwpError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        HwpError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn tool(
        tool: impl Into<String>,
        source_name: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        HwpError::ExternalToolFailure {
            tool: tool.into(),
            source_name: source_name.into(),
            detail: detail.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn odt_validation_is_an_external_tool_failure() {
        let e = HwpError::OdtValidationFailed {
            source_name: "report.hwp".into(),
            detail: "RelaxNG validation failed".into(),
        };
        assert_eq!(e.kind(), ErrorKind::ExternalToolFailure);
        let msg = e.to_string();
        assert!(msg.contains("HTML or Markdown"), "got: {msg}");
        assert!(msg.contains("report.hwp"), "got: {msg}");
    }

    #[test]
    fn permission_denied_counts_as_invalid_input() {
        let e = HwpError::PermissionDenied {
            path: "/secret.hwp".into(),
        };
        assert_eq!(e.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn worker_failure_is_internal() {
        let e = HwpError::WorkerFailed {
            detail: "broken pipe".into(),
        };
        assert_eq!(e.kind(), ErrorKind::Internal);
        assert!(e.to_string().contains("broken pipe"));
    }

    #[test]
    fn unsupported_format_lists_choices() {
        let e = HwpError::UnsupportedFormat {
            format: "pdf".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("'pdf'"));
        assert!(msg.contains("markdown"));
    }

    #[test]
    fn kind_tokens_are_snake_case() {
        assert_eq!(ErrorKind::OperationUnsupportedInMode.as_str(), "operation_unsupported_in_mode");
        assert_eq!(ErrorKind::ExternalToolFailure.to_string(), "external_tool_failure");
    }
}
