//! Pipeline stages for HWP conversion.
//!
//! Each submodule implements exactly one step. The binary-format parsing is
//! done entirely by pyhwp; everything here is plumbing around it.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ scratch ──▶ tool ──────────▶ postprocess ──▶ result
//! (path)    (tempdir)   (hwp5html/odt)   (text / md)
//! ```
//!
//! 1. [`input`]  : validate the path: exists, regular file, readable
//! 2. [`scratch`]: uniquely named temp dir, removed on every exit path
//! 3. [`tool`]   : spawn the pyhwp CLI and read back what it wrote
//! 4. [`postprocess`]: `html2text` / `html2md` plus deterministic cleanup
//! 5. [`encode`] : base64 and `data:` URIs for binary payloads

pub mod encode;
pub mod input;
pub mod postprocess;
pub mod scratch;
pub mod tool;
