//! Post-processing: XHTML produced by `hwp5html` → plain text or Markdown.
//!
//! The secondary converters do the structural work (`html2text` for text,
//! `html2md` for Markdown). What they leave behind still needs deterministic
//! cleanup before the result is useful to a search index or an LLM prompt:
//!
//! - HTML entities that survive conversion (`&amp;`, `&nbsp;`, numeric refs)
//! - Markdown escape sequences (`\(`, `\.`, `\_`) in what should be plain text
//! - Setext headings (`Title` + `=====`), which many chunkers do not recognise
//! - Windows line endings, trailing spaces, long runs of blank lines
//! - Invisible Unicode (zero-width spaces, BOM, soft hyphens)
//!
//! Each rule is a pure `&str → String` function, applied in a fixed order.
//!
//! The converters are CPU-bound on large documents, so the orchestrator calls
//! them through [`render`], which runs on tokio's blocking pool.

use crate::config::OutputFormat;
use crate::error::HwpError;
use once_cell::sync::Lazy;
use regex::Regex;

/// Line width handed to `html2text`; wide enough that it never wraps a
/// paragraph.
const TEXT_WIDTH: usize = 4096;

/// XHTML → plain text.
///
/// Rules (applied in order):
/// 1. `html2text` rendering without wrapping
/// 2. Decode leftover HTML entities
/// 3. Strip Markdown escapes `\( \) \[ \] \. \* \_ \#`
/// 4. Normalise line endings, trim trailing whitespace, collapse blank lines
/// 5. Remove invisible Unicode
/// 6. Ensure a single final newline
///
/// An `html2text` error becomes [`HwpError::ExternalToolFailure`] naming
/// `source_name`.
pub fn html_to_text(xhtml: &str, source_name: &str) -> Result<String, HwpError> {
    let s = html2text::from_read(xhtml.as_bytes(), TEXT_WIDTH)
        .map_err(|e| converter_failure("html2text", source_name, e))?;
    let s = unescape_entities(&s);
    let s = strip_markdown_escapes(&s);
    let s = normalise_line_endings(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    let s = remove_invisible_chars(&s);
    Ok(ensure_final_newline(&s))
}

/// XHTML → Markdown.
///
/// Rules (applied in order):
/// 1. `html2md` conversion
/// 2. Decode leftover HTML entities
/// 3. Normalise line endings
/// 4. Setext headings → ATX (`# Title`)
/// 5. Trim trailing whitespace, collapse blank lines
/// 6. Blank line before every heading
/// 7. Remove invisible Unicode
/// 8. Ensure a single final newline
pub fn html_to_markdown(xhtml: &str) -> String {
    let s = html2md::parse_html(xhtml);
    let s = unescape_entities(&s);
    let s = normalise_line_endings(&s);
    let s = setext_to_atx(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    let s = normalise_heading_spacing(&s);
    let s = remove_invisible_chars(&s);
    ensure_final_newline(&s)
}

/// Run the secondary converter for `format` on the blocking pool.
///
/// Only [`OutputFormat::Text`] and [`OutputFormat::Markdown`] are
/// post-processed; any other format is an internal error.
pub async fn render(xhtml: String, format: OutputFormat, source_name: &str) -> Result<String, HwpError> {
    let name = source_name.to_string();
    tokio::task::spawn_blocking(move || match format {
        OutputFormat::Text => html_to_text(&xhtml, &name),
        OutputFormat::Markdown => Ok(html_to_markdown(&xhtml)),
        other => Err(HwpError::Internal(format!(
            "no post-processing step for '{}'",
            other
        ))),
    })
    .await
    .map_err(|e| {
        HwpError::Internal(format!(
            "Post-processing task for '{}' panicked: {}",
            source_name, e
        ))
    })?
}

fn converter_failure(tool: &str, source_name: &str, detail: impl std::fmt::Display) -> HwpError {
    HwpError::ExternalToolFailure {
        tool: tool.to_string(),
        source_name: source_name.to_string(),
        detail: detail.to_string(),
    }
}

// ── Rule: Decode leftover HTML entities ──────────────────────────────────────

fn unescape_entities(input: &str) -> String {
    html_escape::decode_html_entities(input).into_owned()
}

// ── Rule: Strip Markdown escapes from plain text ─────────────────────────────

static RE_MD_ESCAPE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\([()\[\].*_#])").unwrap());

fn strip_markdown_escapes(input: &str) -> String {
    RE_MD_ESCAPE.replace_all(input, "$1").to_string()
}

// ── Rule: Normalise line endings ─────────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule: Setext → ATX headings ──────────────────────────────────────────────

static RE_SETEXT_H1: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s{0,3}=+\s*$").unwrap());
static RE_SETEXT_H2: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s{0,3}-{2,}\s*$").unwrap());

fn setext_to_atx(input: &str) -> String {
    let lines: Vec<&str> = input.lines().collect();
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        let next = lines.get(i + 1).copied();
        let is_text = !line.trim().is_empty() && !line.trim_start().starts_with('#');

        if let (true, Some(underline)) = (is_text, next) {
            if RE_SETEXT_H1.is_match(underline) {
                out.push(format!("# {}", line.trim()));
                i += 2;
                continue;
            }
            if RE_SETEXT_H2.is_match(underline) && !line.trim_start().starts_with('|') {
                out.push(format!("## {}", line.trim()));
                i += 2;
                continue;
            }
        }

        out.push(line.to_string());
        i += 1;
    }

    out.join("\n")
}

// ── Rule: Trim trailing whitespace per line ──────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule: Collapse excessive blank lines ─────────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{4,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n\n").to_string()
}

// ── Rule: Normalise heading spacing ──────────────────────────────────────────

static RE_ATX_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#{1,6} ").unwrap());

fn normalise_heading_spacing(input: &str) -> String {
    let mut result = String::with_capacity(input.len() + 64);
    for (i, line) in input.lines().enumerate() {
        if RE_ATX_HEADING.is_match(line) && i > 0 {
            let trimmed = result.trim_end_matches('\n');
            result.truncate(trimmed.len());
            if !result.is_empty() {
                result.push_str("\n\n");
            }
        }
        result.push_str(line);
        result.push('\n');
    }
    result
}

// ── Rule: Remove invisible Unicode characters ────────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule: Ensure file ends with single newline ───────────────────────────────

fn ensure_final_newline(input: &str) -> String {
    let trimmed = input.trim_end();
    if trimmed.is_empty() {
        String::from("\n")
    } else {
        format!("{}\n", trimmed)
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
