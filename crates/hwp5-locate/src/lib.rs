//! # hwp5-locate
//!
//! Resolve the on-disk location of the [pyhwp](https://github.com/mete0r/pyhwp)
//! command-line tools so callers can spawn them by absolute path instead of
//! trusting whatever `PATH` happens to hold when the subprocess starts.
//!
//! ## Resolution order
//!
//! For every [`Tool`] (and for arbitrary programs via [`locate_program`]):
//!
//! 1. The tool's environment override (`HWP5HTML_PATH`, `HWP5ODT_PATH`) when it
//!    names an existing file.
//! 2. A `PATH` lookup through [`which`].
//!
//! A successful [`locate`] is cached for the rest of the process.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use hwp5_locate::{locate, Tool};
//!
//! let hwp5html = locate(Tool::Hwp5Html).expect("pyhwp is not installed");
//! println!("using {}", hwp5html.display());
//! ```

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use thiserror::Error;

// ── Error type ───────────────────────────────────────────────────────────────

/// Errors returned by hwp5-locate operations.
#[derive(Error, Debug)]
pub enum LocateError {
    /// The program is neither overridden nor on `PATH`.
    #[error(
        "'{program}' was not found on PATH.\n\
Install pyhwp (`pip install pyhwp`) or set {env_var}=/path/to/{program}."
    )]
    NotFound { program: String, env_var: String },

    /// The override variable is set but points at nothing.
    #[error("{env_var} is set to '{path}', but that file does not exist")]
    OverrideMissing { env_var: String, path: PathBuf },
}

// ── Tools ────────────────────────────────────────────────────────────────────

/// The pyhwp executables this workspace drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    /// `hwp5html`: HWP → XHTML directory (`index.xhtml`, `styles.css`, `bindata/`).
    Hwp5Html,
    /// `hwp5odt`: HWP → OpenDocument Text.
    Hwp5Odt,
}

impl Tool {
    /// Executable name as installed by pyhwp.
    pub fn program_name(self) -> &'static str {
        match self {
            Tool::Hwp5Html => "hwp5html",
            Tool::Hwp5Odt => "hwp5odt",
        }
    }

    /// Environment variable that overrides the `PATH` lookup.
    pub fn env_var(self) -> &'static str {
        match self {
            Tool::Hwp5Html => "HWP5HTML_PATH",
            Tool::Hwp5Odt => "HWP5ODT_PATH",
        }
    }

    fn cache(self) -> &'static OnceLock<PathBuf> {
        match self {
            Tool::Hwp5Html => &HWP5HTML_PATH,
            Tool::Hwp5Odt => &HWP5ODT_PATH,
        }
    }
}

impl std::fmt::Display for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.program_name())
    }
}

// ── Thread-safe singleton path cache ─────────────────────────────────────────

static HWP5HTML_PATH: OnceLock<PathBuf> = OnceLock::new();
static HWP5ODT_PATH: OnceLock<PathBuf> = OnceLock::new();

// ── Public API ───────────────────────────────────────────────────────────────

/// Returns the absolute path of `tool`, resolving it on first use.
///
/// Safe to call from multiple threads; the lookup result is shared.
pub fn locate(tool: Tool) -> Result<PathBuf, LocateError> {
    if let Some(path) = tool.cache().get() {
        return Ok(path.clone());
    }

    let path = locate_program(tool.program_name(), tool.env_var())?;

    // Racing resolvers agree on the answer, so losing the set is harmless.
    let _ = tool.cache().set(path.clone());

    Ok(path)
}

/// Returns `true` if every pyhwp tool can be resolved.
pub fn is_installed() -> bool {
    locate(Tool::Hwp5Html).is_ok() && locate(Tool::Hwp5Odt).is_ok()
}

/// Resolves an arbitrary `program`, honouring `env_var` as an override.
///
/// Not cached: callers looking up their own companion executables usually do
/// so once.
pub fn locate_program(program: &str, env_var: &str) -> Result<PathBuf, LocateError> {
    let override_value = std::env::var_os(env_var).map(PathBuf::from);
    resolve(program, env_var, override_value.as_deref())
}

// ── Internal helpers ─────────────────────────────────────────────────────────

fn resolve(
    program: &str,
    env_var: &str,
    override_path: Option<&Path>,
) -> Result<PathBuf, LocateError> {
    // 1. Environment variable override.
    if let Some(p) = override_path.filter(|p| !p.as_os_str().is_empty()) {
        if p.is_file() {
            return Ok(p.to_path_buf());
        }
        return Err(LocateError::OverrideMissing {
            env_var: env_var.to_string(),
            path: p.to_path_buf(),
        });
    }

    // 2. PATH lookup.
    which::which(program).map_err(|_| LocateError::NotFound {
        program: program.to_string(),
        env_var: env_var.to_string(),
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
