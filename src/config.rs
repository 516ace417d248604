//! Configuration types for HWP conversion.
//!
//! All orchestrator behaviour is controlled through [`ConverterOptions`], built
//! via its [`ConverterOptionsBuilder`]. The options are immutable once built
//! and are handed to [`crate::Converter`] by value; nothing reads process-wide
//! state behind the caller's back except the tool lookup in `hwp5-locate`.
//!
//! The output format is a closed enum, [`OutputFormat`], parsed once at the
//! boundary (CLI flag, HTTP query, worker message) so every layer below works
//! with a validated value.

use crate::error::HwpError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Options for a [`crate::Converter`].
///
/// # Example
/// ```rust
/// use hwp_parser::ConverterOptions;
///
/// let options = ConverterOptions::builder()
///     .verbose(true)
///     .workers(4)
///     .build()
///     .unwrap();
/// assert_eq!(options.workers, Some(4));
/// ```
#[derive(Clone, Default)]
pub struct ConverterOptions {
    /// Log per-conversion timing and sizes at `info` instead of `debug`. Default: false.
    pub verbose: bool,

    /// Number of long-lived worker processes. `None` converts in-process
    /// (direct mode). Default: None.
    ///
    /// Pooled mode cannot produce ODT; see
    /// [`HwpError::OperationUnsupportedInMode`].
    pub workers: Option<usize>,

    /// Explicit path to `hwp5html`. If None, resolved through `hwp5-locate`.
    pub hwp5html_program: Option<PathBuf>,

    /// Explicit path to `hwp5odt`. If None, resolved through `hwp5-locate`.
    pub hwp5odt_program: Option<PathBuf>,

    /// Executable that speaks the worker protocol (`<program> worker`).
    /// If None: `HWP_PARSER_WORKER`, then a `hwp-parser` next to the running
    /// executable, then `hwp-parser` on `PATH`.
    pub worker_program: Option<PathBuf>,

    /// Directory under which scratch directories are created.
    /// If None, uses the system temp directory.
    pub temp_root: Option<PathBuf>,

    /// Receives batch events from [`crate::convert::convert_batch`].
    pub progress_callback: Option<ProgressCallback>,
}

impl fmt::Debug for ConverterOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterOptions")
            .field("verbose", &self.verbose)
            .field("workers", &self.workers)
            .field("hwp5html_program", &self.hwp5html_program)
            .field("hwp5odt_program", &self.hwp5odt_program)
            .field("worker_program", &self.worker_program)
            .field("temp_root", &self.temp_root)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConverterOptions {
    /// Create a new builder for `ConverterOptions`.
    pub fn builder() -> ConverterOptionsBuilder {
        ConverterOptionsBuilder {
            options: Self::default(),
        }
    }

    /// True when conversions are dispatched to worker processes.
    pub fn is_pooled(&self) -> bool {
        self.workers.is_some()
    }
}

/// Builder for [`ConverterOptions`].
#[derive(Debug)]
pub struct ConverterOptionsBuilder {
    options: ConverterOptions,
}

impl ConverterOptionsBuilder {
    pub fn verbose(mut self, v: bool) -> Self {
        self.options.verbose = v;
        self
    }

    pub fn workers(mut self, n: usize) -> Self {
        self.options.workers = Some(n);
        self
    }

    pub fn hwp5html_program(mut self, path: impl Into<PathBuf>) -> Self {
        self.options.hwp5html_program = Some(path.into());
        self
    }

    pub fn hwp5odt_program(mut self, path: impl Into<PathBuf>) -> Self {
        self.options.hwp5odt_program = Some(path.into());
        self
    }

    pub fn worker_program(mut self, path: impl Into<PathBuf>) -> Self {
        self.options.worker_program = Some(path.into());
        self
    }

    pub fn temp_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.options.temp_root = Some(dir.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.options.progress_callback = Some(cb);
        self
    }

    /// Build the options, validating constraints.
    pub fn build(self) -> Result<ConverterOptions, HwpError> {
        if self.options.workers == Some(0) {
            return Err(HwpError::InvalidConfig(
                "Worker count must be ≥ 1".into(),
            ));
        }
        Ok(self.options)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Output formats the orchestrator can produce.
///
/// | Format | Token | Pipeline | Binary |
/// |--------|-------|----------|--------|
/// | Text | `txt` | `hwp→xhtml→txt` | no |
/// | Html | `html` | `hwp→xhtml` | no |
/// | Markdown | `markdown` | `hwp→xhtml→markdown` | no |
/// | Odt | `odt` | `hwp→odt` | yes |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[serde(rename = "txt", alias = "text")]
    Text,
    Html,
    /// Default.
    #[default]
    #[serde(alias = "md")]
    Markdown,
    Odt,
}

impl OutputFormat {
    /// Every supported format, in canonical order.
    pub const ALL: [OutputFormat; 4] = [
        OutputFormat::Text,
        OutputFormat::Html,
        OutputFormat::Markdown,
        OutputFormat::Odt,
    ];

    /// Canonical token.
    pub fn as_str(self) -> &'static str {
        match self {
            OutputFormat::Text => "txt",
            OutputFormat::Html => "html",
            OutputFormat::Markdown => "markdown",
            OutputFormat::Odt => "odt",
        }
    }

    pub fn is_binary(self) -> bool {
        matches!(self, OutputFormat::Odt)
    }

    /// Extension used when a result is saved to disk.
    pub fn file_extension(self) -> &'static str {
        match self {
            OutputFormat::Text => "txt",
            OutputFormat::Html => "html",
            OutputFormat::Markdown => "md",
            OutputFormat::Odt => "odt",
        }
    }

    /// Conversion chain label recorded on every result.
    pub fn pipeline(self) -> &'static str {
        match self {
            OutputFormat::Text => "hwp→xhtml→txt",
            OutputFormat::Html => "hwp→xhtml",
            OutputFormat::Markdown => "hwp→xhtml→markdown",
            OutputFormat::Odt => "hwp→odt",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = HwpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "txt" | "text" | "plain" => Ok(OutputFormat::Text),
            "html" | "xhtml" | "htm" => Ok(OutputFormat::Html),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            "odt" | "binary-doc" | "opendocument" => Ok(OutputFormat::Odt),
            _ => Err(HwpError::UnsupportedFormat {
                format: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_are_direct_mode() {
        let o = ConverterOptions::default();
        assert!(!o.is_pooled());
        assert!(!o.verbose);
        assert!(o.temp_root.is_none());
    }

    #[test]
    fn zero_workers_is_rejected() {
        let err = ConverterOptions::builder().workers(0).build().unwrap_err();
        assert!(matches!(err, HwpError::InvalidConfig(_)));
    }

    #[test]
    fn builder_sets_programs() {
        let o = ConverterOptions::builder()
            .hwp5html_program("/opt/pyhwp/bin/hwp5html")
            .temp_root("/var/tmp")
            .build()
            .unwrap();
        assert_eq!(o.hwp5html_program.as_deref(), Some(std::path::Path::new("/opt/pyhwp/bin/hwp5html")));
        assert_eq!(o.temp_root.as_deref(), Some(std::path::Path::new("/var/tmp")));
    }

    #[test]
    fn format_parsing_is_case_insensitive_and_trimmed() {
        assert_eq!(" Markdown ".parse::<OutputFormat>().unwrap(), OutputFormat::Markdown);
        assert_eq!("TXT".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert_eq!("md".parse::<OutputFormat>().unwrap(), OutputFormat::Markdown);
        assert_eq!("xhtml".parse::<OutputFormat>().unwrap(), OutputFormat::Html);
        assert_eq!("opendocument".parse::<OutputFormat>().unwrap(), OutputFormat::Odt);
    }

    #[test]
    fn unknown_format_is_unsupported() {
        let err = "pdf".parse::<OutputFormat>().unwrap_err();
        assert!(matches!(err, HwpError::UnsupportedFormat { ref format } if format == "pdf"));
        assert!("".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn only_odt_is_binary() {
        for f in OutputFormat::ALL {
            assert_eq!(f.is_binary(), f == OutputFormat::Odt);
        }
    }

    #[test]
    fn markdown_is_default_and_saves_as_md() {
        assert_eq!(OutputFormat::default(), OutputFormat::Markdown);
        assert_eq!(OutputFormat::Markdown.file_extension(), "md");
    }

    #[test]
    fn serde_uses_canonical_tokens() {
        assert_eq!(serde_json::to_string(&OutputFormat::Text).unwrap(), "\"txt\"");
        assert_eq!(serde_json::to_string(&OutputFormat::Markdown).unwrap(), "\"markdown\"");
        let f: OutputFormat = serde_json::from_str("\"text\"").unwrap();
        assert_eq!(f, OutputFormat::Text);
    }
}
