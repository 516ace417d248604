//! Conversion result types.
//!
//! Results are plain data: immutable after construction, `Serialize` so they
//! can cross the worker pipe and the HTTP boundary, and owned by exactly one
//! caller. Binary payloads (ODT bytes, `bindata/` images) serialise as base64.

use crate::config::OutputFormat;
use crate::error::HwpError;
use crate::pipeline::encode;
use crate::pipeline::input::source_name;
use chrono::{DateTime, SecondsFormat, Utc};
use once_cell::sync::Lazy;
use regex::{NoExpand, Regex};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

// ── Content ──────────────────────────────────────────────────────────────

/// Converted payload: text for txt/html/markdown, bytes for odt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "lowercase")]
pub enum Content {
    Text(String),
    Binary(#[serde(with = "encode::serde_base64")] Vec<u8>),
}

impl Content {
    /// Characters for text, bytes for binary.
    pub fn len(&self) -> usize {
        match self {
            Content::Text(s) => s.chars().count(),
            Content::Binary(b) => b.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, Content::Binary(_))
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Content::Text(s) => Some(s),
            Content::Binary(_) => None,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Content::Text(s) => s.as_bytes(),
            Content::Binary(b) => b,
        }
    }
}

// ── ConversionResult ─────────────────────────────────────────────────────

/// The product of converting one HWP file to one format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionResult {
    pub content: Content,
    /// Absolute path of the source file.
    pub source_path: PathBuf,
    pub output_format: OutputFormat,
    /// Conversion chain, e.g. `hwp→xhtml→markdown`.
    pub pipeline: String,
    pub converted_at: DateTime<Utc>,
}

/// Flat, serialisable description of a [`ConversionResult`] without its payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultSummary {
    pub source_name: String,
    pub source_path: String,
    pub output_format: OutputFormat,
    pub pipeline: String,
    /// RFC 3339.
    pub converted_at: String,
    pub content_length: usize,
    pub is_binary: bool,
}

impl ConversionResult {
    /// Stamp a result with the canonical pipeline of `output_format` and the
    /// current time.
    pub fn new(content: Content, source_path: impl Into<PathBuf>, output_format: OutputFormat) -> Self {
        Self {
            content,
            source_path: source_path.into(),
            output_format,
            pipeline: output_format.pipeline().to_string(),
            converted_at: Utc::now(),
        }
    }

    /// Base file name of the source.
    pub fn source_name(&self) -> String {
        source_name(&self.source_path)
    }

    pub fn is_binary(&self) -> bool {
        self.content.is_binary()
    }

    pub fn summary(&self) -> ResultSummary {
        ResultSummary {
            source_name: self.source_name(),
            source_path: self.source_path.display().to_string(),
            output_format: self.output_format,
            pipeline: self.pipeline.clone(),
            converted_at: self.converted_at.to_rfc3339_opts(SecondsFormat::Micros, true),
            content_length: self.content.len(),
            is_binary: self.is_binary(),
        }
    }

    /// Write the content to `path`.
    ///
    /// Uses atomic write (temp file + rename) so a crash never leaves a
    /// half-written output behind.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), HwpError> {
        write_atomic(path.as_ref(), self.content.as_bytes()).await
    }
}

// ── HtmlDirResult ────────────────────────────────────────────────────────

static RE_STYLESHEET_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<link\b[^>]*\bhref\s*=\s*["']styles\.css["'][^>]*>"#).unwrap()
});

static RE_HEAD_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)</head\s*>").unwrap());

/// Everything `hwp5html` produced for one document: the XHTML page, its
/// stylesheet and the embedded binary assets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HtmlDirResult {
    pub xhtml_content: String,
    /// `None` when the tool produced no stylesheet or an empty one.
    pub css_content: Option<String>,
    /// `bindata/` file name → bytes.
    #[serde(with = "encode::serde_base64_map")]
    pub assets: BTreeMap<String, Vec<u8>>,
    pub source_path: PathBuf,
    pub pipeline: String,
    pub converted_at: DateTime<Utc>,
}

impl HtmlDirResult {
    pub fn new(
        xhtml_content: String,
        css_content: Option<String>,
        assets: BTreeMap<String, Vec<u8>>,
        source_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            xhtml_content,
            css_content,
            assets,
            source_path: source_path.into(),
            pipeline: OutputFormat::Html.pipeline().to_string(),
            converted_at: Utc::now(),
        }
    }

    pub fn source_name(&self) -> String {
        source_name(&self.source_path)
    }

    /// ZIP archive laid out like the tool's output directory:
    /// `index.xhtml`, `styles.css`, then `bindata/<name>` per asset.
    pub fn to_zip_bytes(&self) -> Result<Vec<u8>, HwpError> {
        let zip_err = |e: zip::result::ZipError| HwpError::Internal(format!("zip: {e}"));
        let io_err = |e: std::io::Error| HwpError::Internal(format!("zip: {e}"));

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();

        zip.start_file("index.xhtml", options).map_err(zip_err)?;
        zip.write_all(self.xhtml_content.as_bytes()).map_err(io_err)?;

        if let Some(css) = &self.css_content {
            zip.start_file("styles.css", options).map_err(zip_err)?;
            zip.write_all(css.as_bytes()).map_err(io_err)?;
        }

        for (name, bytes) in &self.assets {
            zip.start_file(format!("bindata/{name}"), options)
                .map_err(zip_err)?;
            zip.write_all(bytes).map_err(io_err)?;
        }

        Ok(zip.finish().map_err(zip_err)?.into_inner())
    }

    /// A single self-contained HTML document: the stylesheet is inlined and
    /// every `bindata/<name>` reference becomes a `data:` URI.
    pub fn preview_html(&self) -> String {
        let mut html = self.xhtml_content.clone();

        if let Some(css) = &self.css_content {
            let style = format!("<style type=\"text/css\">\n{css}\n</style>");
            if RE_STYLESHEET_LINK.is_match(&html) {
                html = RE_STYLESHEET_LINK
                    .replace(&html, NoExpand(&style))
                    .into_owned();
            } else if let Some(m) = RE_HEAD_CLOSE.find(&html) {
                html.insert_str(m.start(), &style);
            } else {
                html.insert_str(0, &style);
            }
        }

        for (name, bytes) in &self.assets {
            html = html.replace(&format!("bindata/{name}"), &encode::data_uri(name, bytes));
        }

        html
    }

    /// Recreate the tool's output layout under `dir`.
    pub async fn write_to_dir(&self, dir: impl AsRef<Path>) -> Result<(), HwpError> {
        let dir = dir.as_ref();
        create_dir(dir).await?;
        write_atomic(&dir.join("index.xhtml"), self.xhtml_content.as_bytes()).await?;

        if let Some(css) = &self.css_content {
            write_atomic(&dir.join("styles.css"), css.as_bytes()).await?;
        }

        if !self.assets.is_empty() {
            let bindata = dir.join("bindata");
            create_dir(&bindata).await?;
            for (name, bytes) in &self.assets {
                write_atomic(&bindata.join(name), bytes).await?;
            }
        }
        Ok(())
    }

    /// Flatten to a text [`ConversionResult`] holding the XHTML.
    pub fn to_conversion_result(&self) -> ConversionResult {
        ConversionResult {
            content: Content::Text(self.xhtml_content.clone()),
            source_path: self.source_path.clone(),
            output_format: OutputFormat::Html,
            pipeline: self.pipeline.clone(),
            converted_at: self.converted_at,
        }
    }
}

// ── ConversionOutput ─────────────────────────────────────────────────────

/// What [`crate::Converter::convert`] returns: `HtmlDir` exactly when the
/// requested format is HTML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConversionOutput {
    Document(ConversionResult),
    HtmlDir(HtmlDirResult),
}

impl ConversionOutput {
    pub fn output_format(&self) -> OutputFormat {
        match self {
            ConversionOutput::Document(r) => r.output_format,
            ConversionOutput::HtmlDir(_) => OutputFormat::Html,
        }
    }

    pub fn pipeline(&self) -> &str {
        match self {
            ConversionOutput::Document(r) => &r.pipeline,
            ConversionOutput::HtmlDir(h) => &h.pipeline,
        }
    }

    pub fn source_path(&self) -> &Path {
        match self {
            ConversionOutput::Document(r) => &r.source_path,
            ConversionOutput::HtmlDir(h) => &h.source_path,
        }
    }

    /// Content length as reported in summaries (XHTML characters for HTML).
    pub fn content_len(&self) -> usize {
        match self {
            ConversionOutput::Document(r) => r.content.len(),
            ConversionOutput::HtmlDir(h) => h.xhtml_content.chars().count(),
        }
    }

    pub fn into_conversion_result(self) -> ConversionResult {
        match self {
            ConversionOutput::Document(r) => r,
            ConversionOutput::HtmlDir(h) => h.to_conversion_result(),
        }
    }

    /// Save under `path`: a file for documents, a directory for HTML.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), HwpError> {
        match self {
            ConversionOutput::Document(r) => r.save(path).await,
            ConversionOutput::HtmlDir(h) => h.write_to_dir(path).await,
        }
    }
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn create_dir(dir: &Path) -> Result<(), HwpError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| HwpError::OutputWriteFailed {
            path: dir.to_path_buf(),
            source: e,
        })
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), HwpError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        create_dir(parent).await?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    tokio::fs::write(&tmp_path, bytes)
        .await
        .map_err(|e| HwpError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| HwpError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })
}
