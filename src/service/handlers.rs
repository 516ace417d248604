//! HTTP request handlers.
//!
//! Every conversion route takes a multipart upload with the document in the
//! `file` field. The upload is written under its own (sanitised) name into a
//! temp directory that lives for the duration of the request, converted, and
//! returned as a [`ConversionResponse`].

use super::types::{ConversionResponse, ConvertQuery, ErrorResponse, FormatsResponse, HealthResponse};
use super::AppState;
use crate::config::OutputFormat;
use crate::error::{ErrorKind, HwpError};
use axum::{
    extract::{Multipart, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tracing::{info, warn};

// ── Errors ───────────────────────────────────────────────────────────────

/// Handler failure, rendered as `{error, detail}` with a matching status.
#[derive(Debug)]
pub enum ApiError {
    /// Malformed multipart or missing `file` field.
    BadRequest(String),
    /// The conversion itself failed.
    Conversion(HwpError),
    /// The conversion exceeded the configured timeout (seconds).
    Timeout(f64),
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Conversion(e) => match e.kind() {
                ErrorKind::NotFound
                | ErrorKind::InvalidInput
                | ErrorKind::UnsupportedFormat
                | ErrorKind::OperationUnsupportedInMode => StatusCode::BAD_REQUEST,
                ErrorKind::ExternalToolFailure => StatusCode::UNPROCESSABLE_ENTITY,
                ErrorKind::Io | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn body(&self) -> ErrorResponse {
        match self {
            ApiError::BadRequest(msg) => ErrorResponse {
                error: "bad_request".into(),
                detail: Some(msg.clone()),
            },
            ApiError::Conversion(e) => ErrorResponse {
                error: e.kind().to_string(),
                detail: Some(e.to_string()),
            },
            ApiError::Timeout(secs) => ErrorResponse {
                error: "timeout".into(),
                detail: Some(format!("conversion did not finish within {secs}s")),
            },
            ApiError::Internal(msg) => ErrorResponse {
                error: "internal".into(),
                detail: Some(msg.clone()),
            },
        }
    }
}

impl From<HwpError> for ApiError {
    fn from(e: HwpError) -> Self {
        ApiError::Conversion(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!("Request failed ({}): {:?}", status, self);
        }
        (status, Json(self.body())).into_response()
    }
}

// ── Service endpoints ────────────────────────────────────────────────────

/// Health check endpoint
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: state.config.name.clone(),
    })
}

/// Supported output formats
pub async fn formats() -> impl IntoResponse {
    Json(FormatsResponse::default())
}

// ── Conversion endpoints ─────────────────────────────────────────────────

pub async fn convert_text(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ConversionResponse>, ApiError> {
    convert_upload(&state, multipart, Some(OutputFormat::Text), None).await
}

pub async fn convert_html(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ConversionResponse>, ApiError> {
    convert_upload(&state, multipart, Some(OutputFormat::Html), None).await
}

pub async fn convert_markdown(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ConversionResponse>, ApiError> {
    convert_upload(&state, multipart, Some(OutputFormat::Markdown), None).await
}

pub async fn convert_odt(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ConversionResponse>, ApiError> {
    convert_upload(&state, multipart, Some(OutputFormat::Odt), None).await
}

/// `POST /convert`: format from the `output_format` field or query.
pub async fn convert_any(
    State(state): State<AppState>,
    Query(query): Query<ConvertQuery>,
    multipart: Multipart,
) -> Result<Json<ConversionResponse>, ApiError> {
    convert_upload(&state, multipart, None, query.output_format).await
}

// ── Internal helpers ─────────────────────────────────────────────────────

struct Upload {
    _dir: TempDir,
    path: PathBuf,
}

struct Form {
    upload: Option<Upload>,
    output_format: Option<String>,
}

async fn convert_upload(
    state: &AppState,
    multipart: Multipart,
    fixed_format: Option<OutputFormat>,
    query_format: Option<String>,
) -> Result<Json<ConversionResponse>, ApiError> {
    let form = read_form(multipart, state.converter.options().temp_root.as_deref()).await?;

    let format = match fixed_format {
        Some(f) => f,
        None => match form.output_format.or(query_format) {
            Some(token) => token.parse::<OutputFormat>()?,
            None => OutputFormat::default(),
        },
    };

    let upload = form
        .upload
        .ok_or_else(|| ApiError::BadRequest("missing multipart field 'file'".into()))?;

    let _permit = state
        .permits
        .acquire()
        .await
        .map_err(|_| ApiError::Internal("service is shutting down".into()))?;

    info!("Converting upload {} to {}", upload.path.display(), format);
    let secs = state.config.timeout;
    let limit = Duration::try_from_secs_f64(secs).unwrap_or(Duration::from_secs(300));
    let output = tokio::time::timeout(
        limit,
        state.converter.convert(&upload.path, format),
    )
    .await
    .map_err(|_| ApiError::Timeout(secs))??;

    Ok(Json(ConversionResponse::from(output.into_conversion_result())))
}

async fn read_form(mut multipart: Multipart, temp_root: Option<&Path>) -> Result<Form, ApiError> {
    let bad = |e: axum::extract::multipart::MultipartError| ApiError::BadRequest(e.to_string());
    let mut form = Form {
        upload: None,
        output_format: None,
    };

    while let Some(field) = multipart.next_field().await.map_err(bad)? {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "file" => {
                let filename = sanitize_file_name(field.file_name().unwrap_or_default());
                let data = field.bytes().await.map_err(bad)?;
                form.upload = Some(store_upload(&filename, &data, temp_root).await?);
            }
            "output_format" => {
                let token = field.text().await.map_err(bad)?;
                if !token.trim().is_empty() {
                    form.output_format = Some(token);
                }
            }
            _ => continue,
        }
    }

    Ok(form)
}

async fn store_upload(filename: &str, data: &[u8], temp_root: Option<&Path>) -> Result<Upload, ApiError> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("hwp-upload-");
    let dir = match temp_root {
        Some(root) => builder.tempdir_in(root),
        None => builder.tempdir(),
    }
    .map_err(|e| ApiError::Internal(format!("upload directory: {e}")))?;

    let path = dir.path().join(filename);
    tokio::fs::write(&path, data)
        .await
        .map_err(|e| ApiError::Internal(format!("upload write: {e}")))?;

    Ok(Upload { _dir: dir, path })
}

/// Final path component of a client-supplied name, or `upload.hwp`.
fn sanitize_file_name(raw: &str) -> String {
    let last = raw.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    if last.is_empty() || last == "." || last == ".." {
        "upload.hwp".to_string()
    } else {
        last.to_string()
    }
}
