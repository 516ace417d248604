//! External tool invocation: `hwp5html` and `hwp5odt` as subprocesses.
//!
//! The tools are spawned with stdin closed and both output streams captured.
//! Their only product is what they write under `--output=`, which always
//! points into a [`Scratch`] directory; this module then reads that product
//! back into memory so the scratch directory can be removed.
//!
//! ## Failure reporting
//!
//! A tool that cannot be spawned (not installed, not executable) and a tool
//! that exits non-zero are both [`HwpError::ExternalToolFailure`]. The detail
//! carries stderr when there is any, stdout otherwise, and the exit status as
//! a last resort. `hwp5odt` validates its own output against the ODF RelaxNG
//! schema and fails on many real documents; that case is reported as
//! [`HwpError::OdtValidationFailed`].

use crate::error::HwpError;
use crate::pipeline::scratch::Scratch;
use hwp5_locate::Tool;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use tokio::process::Command;
use tracing::{debug, warn};

/// Files `hwp5html` leaves in its output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XhtmlBundle {
    pub xhtml: String,
    pub css: Option<String>,
    pub assets: BTreeMap<String, Vec<u8>>,
}

/// Program to spawn for `tool`: the explicit path if given, then
/// `hwp5-locate`, then the bare name so the spawn error is the diagnostic.
pub fn resolve_program(explicit: Option<&Path>, tool: Tool) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }
    match hwp5_locate::locate(tool) {
        Ok(p) => p,
        Err(e) => {
            debug!("{}", e);
            PathBuf::from(tool.program_name())
        }
    }
}

/// Run `hwp5html --output=<scratch>/<stem> <source>` and return the output
/// directory.
pub async fn run_hwp5html(
    program: &Path,
    source: &Path,
    stem: &str,
    source_name: &str,
    scratch: &Scratch,
) -> Result<PathBuf, HwpError> {
    let out_dir = scratch.join(stem);
    let output = spawn(program, &out_dir, source, Tool::Hwp5Html, source_name).await?;
    if !output.status.success() {
        return Err(HwpError::tool(
            Tool::Hwp5Html.program_name(),
            source_name,
            failure_detail(&output),
        ));
    }
    if !out_dir.is_dir() {
        return Err(HwpError::tool(
            Tool::Hwp5Html.program_name(),
            source_name,
            format!("expected output directory '{}' was not produced", out_dir.display()),
        ));
    }
    Ok(out_dir)
}

/// Run `hwp5odt --output=<scratch>/<stem>.odt <source>` and return the ODT
/// bytes.
pub async fn run_hwp5odt(
    program: &Path,
    source: &Path,
    stem: &str,
    source_name: &str,
    scratch: &Scratch,
) -> Result<Vec<u8>, HwpError> {
    let out_file = scratch.join(format!("{stem}.odt"));
    let output = spawn(program, &out_file, source, Tool::Hwp5Odt, source_name).await?;
    if !output.status.success() {
        let detail = failure_detail(&output);
        if is_odt_validation_failure(&detail) {
            warn!("hwp5odt schema validation failed for {}", source_name);
            return Err(HwpError::OdtValidationFailed {
                source_name: source_name.to_string(),
                detail,
            });
        }
        return Err(HwpError::tool(Tool::Hwp5Odt.program_name(), source_name, detail));
    }
    tokio::fs::read(&out_file).await.map_err(|e| {
        HwpError::tool(
            Tool::Hwp5Odt.program_name(),
            source_name,
            format!("expected output '{}' could not be read: {}", out_file.display(), e),
        )
    })
}

/// Read `index.xhtml` (required), `styles.css` (optional) and the regular
/// files directly under `bindata/` (optional).
pub async fn read_xhtml_bundle(dir: &Path, source_name: &str) -> Result<XhtmlBundle, HwpError> {
    let tool = Tool::Hwp5Html.program_name();

    let index = dir.join("index.xhtml");
    let raw = tokio::fs::read(&index).await.map_err(|e| {
        HwpError::tool(tool, source_name, format!("index.xhtml was not produced: {e}"))
    })?;
    let xhtml = String::from_utf8(raw)
        .map_err(|_| HwpError::tool(tool, source_name, "index.xhtml is not valid UTF-8"))?;

    let css = match tokio::fs::read(dir.join("styles.css")).await {
        Ok(bytes) => {
            let text = String::from_utf8_lossy(&bytes).into_owned();
            (!text.trim().is_empty()).then_some(text)
        }
        Err(_) => None,
    };

    let mut assets = BTreeMap::new();
    let bindata = dir.join("bindata");
    if bindata.is_dir() {
        let mut entries = tokio::fs::read_dir(&bindata)
            .await
            .map_err(|e| HwpError::io(&bindata, e))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| HwpError::io(&bindata, e))?
        {
            let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
            if !is_file {
                continue;
            }
            let bytes = tokio::fs::read(entry.path())
                .await
                .map_err(|e| HwpError::io(entry.path(), e))?;
            assets.insert(entry.file_name().to_string_lossy().into_owned(), bytes);
        }
    }

    debug!(
        "Read hwp5html bundle: {} chars xhtml, css={}, {} assets",
        xhtml.chars().count(),
        css.is_some(),
        assets.len()
    );

    Ok(XhtmlBundle { xhtml, css, assets })
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn spawn(
    program: &Path,
    output_target: &Path,
    source: &Path,
    tool: Tool,
    source_name: &str,
) -> Result<Output, HwpError> {
    let mut output_arg = OsString::from("--output=");
    output_arg.push(output_target.as_os_str());

    debug!(
        "Running {} {} {}",
        program.display(),
        output_arg.to_string_lossy(),
        source.display()
    );

    Command::new(program)
        .arg(&output_arg)
        .arg(source)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| {
            HwpError::tool(
                tool.program_name(),
                source_name,
                format!(
                    "could not start '{}': {}. Install pyhwp (`pip install pyhwp`) or set {}.",
                    program.display(),
                    e,
                    tool.env_var()
                ),
            )
        })
}

fn failure_detail(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    if !stderr.is_empty() {
        return stderr.to_string();
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stdout = stdout.trim();
    if !stdout.is_empty() {
        return stdout.to_string();
    }
    format!("exited with {}", output.status)
}

fn is_odt_validation_failure(detail: &str) -> bool {
    detail.contains("RelaxNG") || detail.contains("ValidationFailed")
}
