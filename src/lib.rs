//! # hwp-parser
//!
//! Convert HWP (Hangul Word Processor 5.x) documents to plain text, XHTML,
//! Markdown and ODT.
//!
//! ## Why this crate?
//!
//! HWP is a closed binary format, and the only mature open parser is
//! [pyhwp](https://github.com/mete0r/pyhwp), a Python package shipping the
//! `hwp5html` and `hwp5odt` command-line tools. This crate does not parse HWP
//! itself. It drives those tools as subprocesses, cleans up what they produce,
//! and exposes the result through an async library API, a batch CLI, an HTTP
//! service and a document loader for retrieval pipelines.
//!
//! ## Pipeline Overview
//!
//! ```text
//! HWP
//!  │
//!  ├─ 1. Input     validate path: exists, regular file, readable
//!  ├─ 2. Scratch   unique temp dir, removed on every exit path
//!  ├─ 3. Tool      hwp5html → index.xhtml + styles.css + bindata/
//!  │               hwp5odt  → <stem>.odt
//!  ├─ 4. Polish    html2text / html2md + deterministic cleanup
//!  └─ 5. Output    immutable ConversionResult / HtmlDirResult
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hwp_parser::{Converter, OutputFormat};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let converter = Converter::new();
//!     let result = converter.convert("report.hwp", OutputFormat::Markdown).await?;
//!     let doc = result.into_conversion_result();
//!     println!("{}", doc.content.as_text().unwrap_or_default());
//!     eprintln!("pipeline: {}", doc.pipeline);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `cli`    | on      | Enables the `hwp-parser` binary (clap + anyhow + tracing-subscriber) |
//! | `server` | on      | Enables [`service`] (axum + tower-http + dotenvy) |
//!
//! Disable both when using only the library:
//! ```toml
//! hwp-parser = { version = "0.2", default-features = false }
//! ```
//!
//! ## Output Formats
//!
//! | Format | Pipeline | Result |
//! |--------|----------|--------|
//! | `txt`  | `hwp→xhtml→txt` | text |
//! | `html` | `hwp→xhtml` | [`HtmlDirResult`] with stylesheet and images |
//! | `markdown` | `hwp→xhtml→markdown` | text (default) |
//! | `odt`  | `hwp→odt` | bytes; not available in pooled mode |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod reader;
#[cfg(feature = "server")]
pub mod service;
pub mod worker;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConverterOptions, ConverterOptionsBuilder, OutputFormat};
pub use convert::{convert_batch, convert_sync, output_target, BatchReport, Converter, FileOutcome};
pub use error::{ErrorKind, HwpError};
pub use output::{Content, ConversionOutput, ConversionResult, HtmlDirResult, ResultSummary};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use reader::{Document, HwpReader};
