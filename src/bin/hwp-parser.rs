//! CLI binary for hwp-parser.
//!
//! A thin shim over the library crate: `convert` maps flags to a
//! [`Converter`] and a batch run, `serve` starts the HTTP service and the
//! hidden `worker` subcommand speaks the pooled-worker protocol on
//! stdin/stdout.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use hwp_parser::{
    convert_batch, worker, ConversionProgressCallback, Converter, ConverterOptions, OutputFormat,
    ProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Per-file report lines plus a progress bar anchored at the bottom of the
/// terminal. Files complete out of order, so every line names its file.
///
/// When the bar is hidden (`--no-progress`, or stderr is not a terminal) the
/// report lines go to stdout as plain text.
struct CliProgressCallback {
    bar: ProgressBar,
    verbose: bool,
}

impl CliProgressCallback {
    fn new(show_progress: bool, verbose: bool) -> Arc<Self> {
        let bar = if show_progress {
            ProgressBar::new(0)
        } else {
            ProgressBar::hidden()
        };

        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} files  \
             ⏱ {elapsed_precise}  {wide_msg:.dim}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Converting");

        Arc::new(Self {
            bar,
            verbose,
        })
    }

    fn report(&self, marker: String, line: String) {
        if self.bar.is_hidden() {
            println!("{line}");
        } else {
            self.bar.println(format!("{marker} {line}"));
        }
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.enable_steady_tick(Duration::from_millis(80));
    }

    fn on_file_start(&self, name: &str) {
        self.bar.set_message(name.to_string());
    }

    fn on_file_complete(&self, name: &str, output: &Path, content_len: usize) {
        if self.verbose {
            let target = output
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| output.display().to_string());
            let suffix = if output.is_dir() { "/" } else { "" };
            self.report(
                green("✓"),
                format!(
                    "[Success] {name} -> {target}{suffix}  {}",
                    dim(&format!("{content_len} chars/bytes"))
                ),
            );
        }
        self.bar.inc(1);
    }

    fn on_file_error(&self, name: &str, error: &str) {
        self.report(red("✗"), format!("[Fail] {name}: {error}"));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, _total: usize, _success: usize) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert one document to Markdown next to the source
  hwp-parser convert report.hwp

  # Every .hwp under a directory, as plain text, into out/
  hwp-parser convert docs/ -f txt -o out/

  # Quoted glob patterns are expanded by hwp-parser itself
  hwp-parser convert "data/**/*.hwp" -f html -w 8 -v

  # HTTP service on port 8080
  hwp-parser serve --port 8080

OUTPUT:
  txt / markdown / odt  <output-dir or source dir>/<stem>.<ext>
  html                  <output-dir or source dir>/<stem>/index.xhtml
                        plus styles.css and bindata/ when present

ENVIRONMENT VARIABLES:
  HWP5HTML_PATH                Path to the hwp5html executable (default: PATH lookup)
  HWP5ODT_PATH                 Path to the hwp5odt executable (default: PATH lookup)
  HWP_PARSER_WORKER            Worker executable for pooled conversions
  HWP_SERVICE_NAME             Service name reported by /health (hwp-parser)
  HWP_SERVICE_HOST             Bind host (0.0.0.0)
  HWP_SERVICE_PORT             Bind port (3000)
  HWP_SERVICE_TIMEOUT          Per-request conversion timeout in seconds (300)
  HWP_SERVICE_WORKERS          Server runtime worker threads (1)
  HWP_SERVICE_MAX_CONCURRENCY  Conversions in flight (50)
  HWP_SERVICE_CORS_ENABLED     Enable CORS (false)
  HWP_SERVICE_CORS_ORIGINS     Comma-separated allowed origins (*)
  RUST_LOG                     Log filter, overrides -v

SETUP:
  pip install pyhwp             # provides hwp5html and hwp5odt
"#;

/// Convert HWP documents to text, XHTML, Markdown and ODT.
#[derive(Parser, Debug)]
#[command(
    name = "hwp-parser",
    version,
    about = "Convert HWP documents to text, XHTML, Markdown and ODT",
    long_about = "Convert HWP (Hangul Word Processor 5.x) documents to plain text, XHTML, \
Markdown or ODT by driving pyhwp's hwp5html and hwp5odt tools. Runs as a batch CLI or as an \
HTTP service.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert files, directories or glob patterns.
    Convert(ConvertArgs),

    /// Run the HTTP conversion service.
    Serve(ServeArgs),

    /// Serve pooled conversions over stdin/stdout.
    #[command(hide = true)]
    Worker(WorkerArgs),
}

#[derive(Args, Debug)]
struct ConvertArgs {
    /// HWP files, directories (searched for **/*.hwp) or glob patterns.
    sources: Vec<String>,

    /// Output format: markdown, html, txt, odt.
    #[arg(short, long, env = "HWP_PARSER_FORMAT", default_value = "markdown")]
    format: OutputFormat,

    /// Directory for results (default: next to each source).
    #[arg(short, long, env = "HWP_PARSER_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Conversions in flight (default: number of CPUs).
    #[arg(short, long, env = "HWP_PARSER_WORKERS")]
    workers: Option<usize>,

    /// Print every success and enable DEBUG-level logs.
    #[arg(short, long, env = "HWP_PARSER_VERBOSE")]
    verbose: bool,

    /// Disable progress bar.
    #[arg(long, env = "HWP_PARSER_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Bind host (overrides HWP_SERVICE_HOST).
    #[arg(long)]
    host: Option<String>,

    /// Bind port (overrides HWP_SERVICE_PORT).
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Args, Debug)]
struct WorkerArgs {
    #[arg(long)]
    hwp5html: Option<PathBuf>,

    #[arg(long)]
    hwp5odt: Option<PathBuf>,

    #[arg(long)]
    temp_root: Option<PathBuf>,

    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Convert(args) => run_convert(args),
        Command::Serve(args) => run_serve(args),
        Command::Worker(args) => run_worker(args),
    }
}

// ── Logging setup ────────────────────────────────────────────────────────────

/// `RUST_LOG` wins; otherwise `fallback`. Always on stderr.
fn init_logging(fallback: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .with_writer(io::stderr)
        .init();
}

// ── convert ──────────────────────────────────────────────────────────────────

fn run_convert(args: ConvertArgs) -> Result<()> {
    // The bar carries the feedback; library INFO lines would tear it.
    let show_progress = !args.no_progress;
    let filter = if args.verbose {
        "debug"
    } else if show_progress {
        "warn"
    } else {
        "info"
    };
    init_logging(filter);

    let targets = collect_targets(&args.sources);
    if targets.is_empty() {
        println!("No files to convert.");
        return Ok(());
    }

    let workers = args
        .workers
        .unwrap_or_else(|| std::thread::available_parallelism().map_or(1, |n| n.get()))
        .max(1);

    if let Some(dir) = &args.output_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
    }

    println!(
        "{} Converting {} file(s) (Format: {}, Workers: {})...",
        cyan("◆"),
        bold(&targets.len().to_string()),
        args.format,
        workers
    );

    let callback: ProgressCallback = CliProgressCallback::new(show_progress, args.verbose);
    let options = ConverterOptions::builder()
        .verbose(args.verbose)
        .progress_callback(callback)
        .build()
        .context("Invalid converter options")?;
    let converter = Converter::with_options(options);

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;

    let report = rt.block_on(async {
        let report = convert_batch(
            &converter,
            &targets,
            args.format,
            args.output_dir.as_deref(),
            workers,
        )
        .await;
        converter.shutdown().await;
        report
    });

    let failed = report.failed();
    let status = if failed == 0 {
        green("✔")
    } else if failed == report.outcomes.len() {
        red("✘")
    } else {
        cyan("⚠")
    };
    println!(
        "{} All conversions completed: {} succeeded, {} failed",
        status,
        report.succeeded(),
        failed
    );

    Ok(())
}

/// Expand CLI sources into a sorted, de-duplicated list of files.
///
/// Anything containing `*`, `?` or `[` is a glob pattern; a directory means
/// every `.hwp` below it. Misses are warned about on stderr and skipped.
fn collect_targets(sources: &[String]) -> Vec<PathBuf> {
    let mut targets = BTreeSet::new();

    for source in sources {
        if source.contains(['*', '?', '[']) {
            let found = expand_glob(source);
            if found.is_empty() {
                eprintln!("Warning: no files match pattern '{source}'");
            }
            targets.extend(found);
            continue;
        }

        let path = Path::new(source);
        if path.is_file() {
            targets.insert(path.to_path_buf());
        } else if path.is_dir() {
            let pattern = path.join("**").join("*.hwp");
            targets.extend(expand_glob(&pattern.to_string_lossy()));
        } else {
            eprintln!("Warning: file not found: '{source}'");
        }
    }

    targets.into_iter().collect()
}

fn expand_glob(pattern: &str) -> Vec<PathBuf> {
    match glob::glob(pattern) {
        Ok(paths) => paths
            .filter_map(|entry| match entry {
                Ok(p) => Some(p),
                Err(e) => {
                    tracing::warn!("Skipping unreadable path: {}", e);
                    None
                }
            })
            .filter(|p| p.is_file())
            .collect(),
        Err(e) => {
            eprintln!("Warning: invalid pattern '{pattern}': {e}");
            Vec::new()
        }
    }
}

// ── serve ────────────────────────────────────────────────────────────────────

#[cfg(feature = "server")]
fn run_serve(args: ServeArgs) -> Result<()> {
    use hwp_parser::service::{start_server, AppState, ServiceConfig};

    init_logging(if args.verbose { "debug" } else { "info" });

    let mut config = ServiceConfig::from_env();
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    let addr = config.bind_addr();

    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.workers.max(1))
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;

    let state = AppState::new(Converter::new(), config);
    rt.block_on(start_server(&addr, state))
        .with_context(|| format!("Server on {addr} failed"))
}

#[cfg(not(feature = "server"))]
fn run_serve(_args: ServeArgs) -> Result<()> {
    anyhow::bail!("hwp-parser was built without the `server` feature")
}

// ── worker ───────────────────────────────────────────────────────────────────

fn run_worker(args: WorkerArgs) -> Result<()> {
    // stdout carries protocol replies only.
    init_logging(if args.verbose { "debug" } else { "warn" });

    let mut builder = ConverterOptions::builder().verbose(args.verbose);
    if let Some(p) = args.hwp5html {
        builder = builder.hwp5html_program(p);
    }
    if let Some(p) = args.hwp5odt {
        builder = builder.hwp5odt_program(p);
    }
    if let Some(p) = args.temp_root {
        builder = builder.temp_root(p);
    }
    let converter = Converter::with_options(builder.build().context("Invalid worker options")?);

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;

    rt.block_on(worker::serve_stdio(&converter))
        .context("Worker protocol failed")
}
