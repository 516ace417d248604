//! Conversion entry points.
//!
//! [`Converter`] is the orchestrator: it validates the input, runs the right
//! pyhwp tool inside a scratch directory, post-processes the XHTML and hands
//! back an immutable result. In pooled mode the same steps run inside
//! long-lived worker processes (see [`crate::worker`]); callers see the same
//! results and the same error kinds either way.
//!
//! ## Validation order
//!
//! 1. format token (only [`Converter::convert_str`] parses one)
//! 2. path exists → else [`HwpError::NotFound`]
//! 3. path is a regular file → else [`HwpError::InvalidInput`]
//! 4. pooled mode cannot produce ODT → [`HwpError::OperationUnsupportedInMode`]
//!
//! Nothing touches the scratch area or spawns a process before all four pass.

use crate::config::{ConverterOptions, OutputFormat};
use crate::error::HwpError;
use crate::output::{Content, ConversionOutput, ConversionResult, HtmlDirResult};
use crate::pipeline::{input, postprocess, scratch::Scratch, tool};
use crate::worker::pool::{self, WorkerPool};
use futures::stream::{self, StreamExt};
use hwp5_locate::Tool;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Mode label used in [`HwpError::OperationUnsupportedInMode`] for pooled conversions.
pub const POOLED_MODE: &str = "pooled-worker mode";

/// Logs at `info` when verbose, `debug` otherwise.
macro_rules! verbose_log {
    ($verbose:expr, $($arg:tt)+) => {
        if $verbose {
            info!($($arg)+);
        } else {
            debug!($($arg)+);
        }
    };
}

/// HWP conversion orchestrator.
///
/// # Example
/// ```rust,no_run
/// use hwp_parser::{Converter, OutputFormat};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let converter = Converter::new();
/// let md = converter.to_markdown("report.hwp").await?;
/// println!("{}", md.content.as_text().unwrap_or_default());
///
/// let html = converter.to_html("report.hwp").await?;
/// std::fs::write("report.zip", html.to_zip_bytes()?)?;
/// # Ok(())
/// # }
/// ```
pub struct Converter {
    options: ConverterOptions,
    pool: RwLock<Option<Arc<WorkerPool>>>,
}

impl Default for Converter {
    fn default() -> Self {
        Self::new()
    }
}

impl Converter {
    /// Direct-mode converter with default options.
    pub fn new() -> Self {
        Self::with_options(ConverterOptions::default())
    }

    pub fn with_options(options: ConverterOptions) -> Self {
        Self {
            options,
            pool: RwLock::new(None),
        }
    }

    pub fn options(&self) -> &ConverterOptions {
        &self.options
    }

    /// Convert `path` to `format`.
    ///
    /// Returns [`ConversionOutput::HtmlDir`] exactly when `format` is HTML.
    pub async fn convert(
        &self,
        path: impl AsRef<Path>,
        format: OutputFormat,
    ) -> Result<ConversionOutput, HwpError> {
        let source = input::validate_source(path.as_ref())?;

        if self.options.is_pooled() {
            if format == OutputFormat::Odt {
                return Err(HwpError::OperationUnsupportedInMode {
                    format: format.to_string(),
                    mode: POOLED_MODE.to_string(),
                });
            }
            let pool = self.pool().await?;
            return pool.submit(source, format).await;
        }

        self.convert_direct(&source, format).await
    }

    /// Parse `format` first, then [`Converter::convert`].
    ///
    /// An unknown token is reported even when the path is also bad.
    pub async fn convert_str(
        &self,
        path: impl AsRef<Path>,
        format: &str,
    ) -> Result<ConversionOutput, HwpError> {
        let format: OutputFormat = format.parse()?;
        self.convert(path, format).await
    }

    pub async fn to_text(&self, path: impl AsRef<Path>) -> Result<ConversionResult, HwpError> {
        Ok(self.convert(path, OutputFormat::Text).await?.into_conversion_result())
    }

    pub async fn to_markdown(&self, path: impl AsRef<Path>) -> Result<ConversionResult, HwpError> {
        Ok(self
            .convert(path, OutputFormat::Markdown)
            .await?
            .into_conversion_result())
    }

    pub async fn to_odt(&self, path: impl AsRef<Path>) -> Result<ConversionResult, HwpError> {
        Ok(self.convert(path, OutputFormat::Odt).await?.into_conversion_result())
    }

    pub async fn to_html(&self, path: impl AsRef<Path>) -> Result<HtmlDirResult, HwpError> {
        match self.convert(path, OutputFormat::Html).await? {
            ConversionOutput::HtmlDir(h) => Ok(h),
            ConversionOutput::Document(_) => Err(HwpError::Internal(
                "html conversion returned a flat document".into(),
            )),
        }
    }

    /// Stop pooled workers. No-op in direct mode or if the pool never started.
    pub async fn shutdown(&self) {
        let pool = self.pool.write().await.take();
        if let Some(pool) = pool {
            pool.shutdown().await;
        }
    }

    // ── Internal helpers ─────────────────────────────────────────────────

    /// Start the pool on first use; later calls return the running one.
    async fn pool(&self) -> Result<Arc<WorkerPool>, HwpError> {
        if let Some(pool) = self.pool.read().await.as_ref() {
            return Ok(Arc::clone(pool));
        }

        let mut slot = self.pool.write().await;
        if let Some(pool) = slot.as_ref() {
            return Ok(Arc::clone(pool));
        }

        let size = self.options.workers.unwrap_or(1);
        let program = pool::resolve_worker_program(self.options.worker_program.as_deref());
        let args = pool::worker_args(&self.options);
        let pool = Arc::new(WorkerPool::start(size, program, args).await?);
        *slot = Some(Arc::clone(&pool));
        Ok(pool)
    }

    async fn convert_direct(
        &self,
        source: &Path,
        format: OutputFormat,
    ) -> Result<ConversionOutput, HwpError> {
        let verbose = self.options.verbose;
        let name = input::source_name(source);
        let stem = input::source_stem(source);
        let input_size = std::fs::metadata(source).map(|m| m.len()).unwrap_or(0);
        let start = Instant::now();

        verbose_log!(
            verbose,
            "Converting {} ({} bytes) to {} via {}",
            name,
            input_size,
            format,
            format.pipeline()
        );

        let scratch = Scratch::acquire(self.options.temp_root.as_deref())?;

        let output = match format {
            OutputFormat::Odt => {
                let program = tool::resolve_program(self.options.hwp5odt_program.as_deref(), Tool::Hwp5Odt);
                let bytes = tool::run_hwp5odt(&program, source, &stem, &name, &scratch).await?;
                ConversionOutput::Document(ConversionResult::new(
                    Content::Binary(bytes),
                    source,
                    format,
                ))
            }
            OutputFormat::Html | OutputFormat::Text | OutputFormat::Markdown => {
                let program =
                    tool::resolve_program(self.options.hwp5html_program.as_deref(), Tool::Hwp5Html);
                let dir = tool::run_hwp5html(&program, source, &stem, &name, &scratch).await?;
                let bundle = tool::read_xhtml_bundle(&dir, &name).await?;

                if format == OutputFormat::Html {
                    ConversionOutput::HtmlDir(HtmlDirResult::new(
                        bundle.xhtml,
                        bundle.css,
                        bundle.assets,
                        source,
                    ))
                } else {
                    let text = postprocess::render(bundle.xhtml, format, &name).await?;
                    ConversionOutput::Document(ConversionResult::new(Content::Text(text), source, format))
                }
            }
        };

        scratch.release();

        verbose_log!(
            verbose,
            "Converted {}: in {} bytes, out {} {}, pipeline {}, {:.2}s",
            name,
            input_size,
            output.content_len(),
            if format.is_binary() { "bytes" } else { "chars" },
            output.pipeline(),
            start.elapsed().as_secs_f64()
        );

        Ok(output)
    }
}

/// Synchronous wrapper around [`Converter::convert`].
///
/// Creates a temporary tokio runtime internally; pooled workers started by
/// the call are shut down before it returns.
pub fn convert_sync(
    path: impl AsRef<Path>,
    format: OutputFormat,
    options: ConverterOptions,
) -> Result<ConversionOutput, HwpError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| HwpError::Internal(format!("Failed to create tokio runtime: {}", e)))?;

    runtime.block_on(async {
        let converter = Converter::with_options(options);
        let result = converter.convert(path, format).await;
        converter.shutdown().await;
        result
    })
}

// ── Batch conversion ─────────────────────────────────────────────────────

/// Outcome of one file in a batch.
#[derive(Debug)]
pub struct FileOutcome {
    pub source: PathBuf,
    /// Where the output was written.
    pub result: Result<PathBuf, HwpError>,
}

/// Outcome of a whole batch, in input order.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<FileOutcome>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }
}

/// Where a converted `source` is saved: `<dir>/<stem>.<ext>`, or the
/// `<dir>/<stem>/` directory for HTML. `dir` defaults to the source's own
/// directory.
pub fn output_target(source: &Path, format: OutputFormat, output_dir: Option<&Path>) -> PathBuf {
    let dir = output_dir
        .map(Path::to_path_buf)
        .or_else(|| source.parent().map(Path::to_path_buf))
        .unwrap_or_default();
    let stem = input::source_stem(source);
    match format {
        OutputFormat::Html => dir.join(stem),
        _ => dir.join(format!("{}.{}", stem, format.file_extension())),
    }
}

/// Convert and save every file in `sources`, at most `concurrency` at a time.
///
/// Failures are recorded per file and never abort the batch. Progress events
/// go to the converter's configured callback.
pub async fn convert_batch(
    converter: &Converter,
    sources: &[PathBuf],
    format: OutputFormat,
    output_dir: Option<&Path>,
    concurrency: usize,
) -> BatchReport {
    let callback = converter.options().progress_callback.clone();
    if let Some(ref cb) = callback {
        cb.on_batch_start(sources.len());
    }

    let mut outcomes: Vec<(usize, FileOutcome)> = stream::iter(sources.iter().enumerate().map(
        |(idx, source)| {
            let callback = callback.clone();
            async move {
                let name = input::source_name(source);
                if let Some(ref cb) = callback {
                    cb.on_file_start(&name);
                }

                let result = convert_and_save(converter, source, format, output_dir).await;

                if let Some(ref cb) = callback {
                    match &result {
                        Ok((target, len)) => cb.on_file_complete(&name, target, *len),
                        Err(e) => cb.on_file_error(&name, &e.to_string()),
                    }
                }

                (
                    idx,
                    FileOutcome {
                        source: source.clone(),
                        result: result.map(|(target, _)| target),
                    },
                )
            }
        },
    ))
    .buffer_unordered(concurrency.max(1))
    .collect()
    .await;

    outcomes.sort_by_key(|(idx, _)| *idx);
    let report = BatchReport {
        outcomes: outcomes.into_iter().map(|(_, o)| o).collect(),
    };

    info!(
        "Batch complete: {} succeeded, {} failed",
        report.succeeded(),
        report.failed()
    );
    if let Some(ref cb) = callback {
        cb.on_batch_complete(sources.len(), report.succeeded());
    }
    report
}

async fn convert_and_save(
    converter: &Converter,
    source: &Path,
    format: OutputFormat,
    output_dir: Option<&Path>,
) -> Result<(PathBuf, usize), HwpError> {
    let output = converter.convert(source, format).await?;
    let target = output_target(source, format, output_dir);
    output.save(&target).await?;
    Ok((target, output.content_len()))
}
