//! Shared fixtures for the integration tests: fake `hwp5html` / `hwp5odt`
//! shell scripts and a per-test sandbox.
//!
//! The scripts are written once per test binary so no test can exec a file
//! that another thread still has open for writing. Each script appends one
//! line to `<temp_root>/calls.log`, where `<temp_root>` is the directory the
//! converter creates its `hwp-parser-*` scratch directories in. A per-test
//! temp root therefore gives a per-test call count.

#![allow(dead_code)]

use hwp_parser::pipeline::scratch::SCRATCH_PREFIX;
use hwp_parser::{ConverterOptions, ConverterOptionsBuilder};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

/// `--output=<target>` is the first argument; the call is logged next to the
/// scratch directory that holds `<target>`.
const PRELUDE: &str = r#"#!/bin/sh
out=""
for a in "$@"; do
  case "$a" in
    --output=*) out="${a#--output=}" ;;
  esac
done
echo "$(basename "$0") $*" >> "$(dirname "$out")/../calls.log"
"#;

const HWP5HTML_OK: &str = r#"mkdir -p "$out/bindata"
cat > "$out/index.xhtml" <<'XHTML'
<?xml version="1.0" encoding="utf-8"?>
<html xmlns="http://www.w3.org/1999/xhtml">
<head>
<meta http-equiv="content-type" content="text/html; charset=utf-8"/>
<link rel="stylesheet" type="text/css" href="styles.css"/>
<title>Sample</title>
</head>
<body>
<h1>Title</h1>
<p>Hello &amp; world (1.5)</p>
<p><img src="bindata/BIN0001.png"/></p>
</body>
</html>
XHTML
printf 'p { margin: 0; }\n' > "$out/styles.css"
printf '\211PNG\r\n\032\n' > "$out/bindata/BIN0001.png"
"#;

const HWP5ODT_OK: &str = r#"printf 'PK\003\004mimetypeapplication/vnd.oasis.opendocument.text' > "$out"
"#;

const FAIL: &str = r#"echo "corrupt stream in BodyText/Section0" >&2
exit 1
"#;

const ODT_INVALID: &str = r#"echo "RelaxNG validation failed: element text:p not allowed here" >&2
exit 1
"#;

/// Fake tools shared by every test in the binary.
pub struct Scripts {
    _dir: TempDir,
    pub hwp5html: PathBuf,
    pub hwp5odt: PathBuf,
    /// Exits 1 with a message on stderr; usable for either tool.
    pub failing: PathBuf,
    /// `hwp5odt` that fails its schema validation.
    pub odt_invalid: PathBuf,
}

pub fn scripts() -> &'static Scripts {
    static SCRIPTS: OnceLock<Scripts> = OnceLock::new();
    SCRIPTS.get_or_init(|| {
        let dir = tempfile::tempdir().expect("scripts dir");
        let write = |name: &str, body: &str| {
            let path = dir.path().join(name);
            std::fs::write(&path, format!("{PRELUDE}{body}")).expect("write script");
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
                .expect("chmod script");
            path
        };
        Scripts {
            hwp5html: write("hwp5html", HWP5HTML_OK),
            hwp5odt: write("hwp5odt", HWP5ODT_OK),
            failing: write("failing", FAIL),
            odt_invalid: write("odt-invalid", ODT_INVALID),
            _dir: dir,
        }
    })
}

/// Per-test directories: `input/` for documents, `scratch/` as temp root,
/// `out/` for saved results.
pub struct Sandbox {
    root: TempDir,
}

impl Sandbox {
    pub fn new() -> Self {
        init_tracing();
        let root = tempfile::tempdir().expect("sandbox");
        for sub in ["input", "scratch", "out"] {
            std::fs::create_dir_all(root.path().join(sub)).expect("sandbox subdir");
        }
        Self { root }
    }

    pub fn path(&self) -> &Path {
        self.root.path()
    }

    pub fn input_dir(&self) -> PathBuf {
        self.root.path().join("input")
    }

    pub fn scratch_root(&self) -> PathBuf {
        self.root.path().join("scratch")
    }

    pub fn out_dir(&self) -> PathBuf {
        self.root.path().join("out")
    }

    /// A placeholder HWP file; the fake tools never read it.
    pub fn document(&self, name: &str) -> PathBuf {
        let path = self.input_dir().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("document parent");
        }
        std::fs::write(&path, b"\xd0\xcf\x11\xe0HWP Document File").expect("write document");
        path
    }

    /// Builder wired to the working fake tools and this sandbox's temp root.
    pub fn options(&self) -> ConverterOptionsBuilder {
        let s = scripts();
        ConverterOptions::builder()
            .hwp5html_program(&s.hwp5html)
            .hwp5odt_program(&s.hwp5odt)
            .temp_root(self.scratch_root())
    }

    /// Number of fake tool invocations so far.
    pub fn tool_calls(&self) -> usize {
        std::fs::read_to_string(self.scratch_root().join("calls.log"))
            .map(|s| s.lines().count())
            .unwrap_or(0)
    }

    /// `hwp-parser-*` directories still present under the temp root.
    pub fn leftover_scratch(&self) -> Vec<PathBuf> {
        std::fs::read_dir(self.scratch_root())
            .expect("read scratch root")
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().starts_with(SCRATCH_PREFIX))
            .map(|e| e.path())
            .collect()
    }
}

/// Library logs in test output; `RUST_LOG=debug` shows every tool call.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_test_writer()
        .try_init();
}
