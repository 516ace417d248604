//! Document loader for retrieval pipelines.
//!
//! [`HwpReader`] wraps a textual conversion into the `Document { text,
//! metadata }` shape that indexing frameworks consume. One file yields exactly
//! one document; splitting into chunks is the indexer's job.

use crate::config::OutputFormat;
use crate::convert::Converter;
use crate::error::HwpError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

/// Value of the `source` metadata key on every document.
pub const SOURCE_TAG: &str = "hwp-parser";

/// A loaded document: text plus flat metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub text: String,
    pub metadata: Map<String, Value>,
}

/// Loads HWP files as [`Document`]s.
pub struct HwpReader {
    converter: Converter,
}

impl Default for HwpReader {
    fn default() -> Self {
        Self::new(Converter::new())
    }
}

impl HwpReader {
    pub fn new(converter: Converter) -> Self {
        Self { converter }
    }

    /// Convert `path` and wrap the result.
    ///
    /// Metadata keys: `file_name`, `file_path` (absolute), `output_format`,
    /// `source`, `pipeline`, `converted_at`, then every `extra_info` entry
    /// (which may override the built-in keys). HTML yields the XHTML text.
    ///
    /// # Errors
    /// ODT is binary and has no text form, so it is rejected with
    /// [`HwpError::OperationUnsupportedInMode`] before any conversion runs.
    pub async fn load_data(
        &self,
        path: impl AsRef<Path>,
        format: OutputFormat,
        extra_info: Option<Map<String, Value>>,
    ) -> Result<Vec<Document>, HwpError> {
        if format.is_binary() {
            return Err(HwpError::OperationUnsupportedInMode {
                format: format.to_string(),
                mode: "document loader".into(),
            });
        }

        let result = self
            .converter
            .convert(path, format)
            .await?
            .into_conversion_result();

        let text = result
            .content
            .as_text()
            .ok_or_else(|| HwpError::Internal(format!("{format} conversion returned binary content")))?
            .to_string();

        let summary = result.summary();
        let mut metadata = Map::new();
        metadata.insert("file_name".into(), Value::String(summary.source_name));
        metadata.insert("file_path".into(), Value::String(summary.source_path));
        metadata.insert("output_format".into(), Value::String(format.to_string()));
        metadata.insert("source".into(), Value::String(SOURCE_TAG.into()));
        metadata.insert("pipeline".into(), Value::String(summary.pipeline));
        metadata.insert("converted_at".into(), Value::String(summary.converted_at));
        if let Some(extra) = extra_info {
            metadata.extend(extra);
        }

        Ok(vec![Document { text, metadata }])
    }
}
