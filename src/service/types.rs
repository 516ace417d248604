//! Request/response bodies of the HTTP service.

use crate::config::OutputFormat;
use crate::output::{Content, ConversionResult};
use crate::pipeline::encode;
use serde::{Deserialize, Serialize};

/// Successful conversion. Binary content is base64.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionResponse {
    pub content: String,
    pub source_name: String,
    pub output_format: OutputFormat,
    pub pipeline: String,
    pub is_binary: bool,
    /// Characters for text, bytes for binary (before base64).
    pub content_length: usize,
}

impl From<ConversionResult> for ConversionResponse {
    fn from(result: ConversionResult) -> Self {
        let source_name = result.source_name();
        let content_length = result.content.len();
        let is_binary = result.is_binary();
        let content = match result.content {
            Content::Text(s) => s,
            Content::Binary(b) => encode::to_base64(&b),
        };
        Self {
            content,
            source_name,
            output_format: result.output_format,
            pipeline: result.pipeline,
            is_binary,
            content_length,
        }
    }
}

/// Error body for every non-2xx response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatsResponse {
    pub supported_formats: Vec<OutputFormat>,
    pub default: OutputFormat,
}

impl Default for FormatsResponse {
    fn default() -> Self {
        Self {
            supported_formats: OutputFormat::ALL.to_vec(),
            default: OutputFormat::default(),
        }
    }
}

/// Query string of `POST /convert`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConvertQuery {
    pub output_format: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_response_is_base64() {
        let r = ConversionResult::new(Content::Binary(vec![0, 1, 2]), "/d/a.hwp", OutputFormat::Odt);
        let resp = ConversionResponse::from(r);
        assert_eq!(resp.content, "AAEC");
        assert_eq!(resp.content_length, 3);
        assert!(resp.is_binary);
        assert_eq!(resp.source_name, "a.hwp");
    }

    #[test]
    fn formats_body() {
        let json = serde_json::to_value(FormatsResponse::default()).unwrap();
        assert_eq!(
            json["supported_formats"],
            serde_json::json!(["txt", "html", "markdown", "odt"])
        );
        assert_eq!(json["default"], "markdown");
    }
}
