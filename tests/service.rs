//! HTTP service tests, driven in-process through `tower::ServiceExt::oneshot`.
//!
//! Run with:
//!   cargo test --test service

#![cfg(all(unix, feature = "server"))]

mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use common::{scripts, Sandbox};
use hwp_parser::pipeline::encode;
use hwp_parser::service::{build_router, AppState, ServiceConfig};
use hwp_parser::Converter;
use pretty_assertions::assert_eq;
use serde_json::Value;
use tower::ServiceExt;

const BOUNDARY: &str = "----hwp-parser-test-boundary";

fn router(sb: &Sandbox) -> Router {
    router_with(ServiceConfig::default(), Converter::with_options(sb.options().build().unwrap()))
}

fn router_with(config: ServiceConfig, converter: Converter) -> Router {
    build_router(AppState::new(converter, config))
}

/// `multipart/form-data` with an optional `file` part and extra text parts.
fn multipart(file: Option<(&str, &[u8])>, fields: &[(&str, &str)]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((filename, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn upload(uri: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

const HWP: &[u8] = b"\xd0\xcf\x11\xe0HWP Document File";

// ── Service endpoints ────────────────────────────────────────────────────────

#[tokio::test]
async fn health_reports_service_name() {
    let config = ServiceConfig {
        name: "test-service".into(),
        ..ServiceConfig::default()
    };
    let app = router_with(config, Converter::new());

    for method in ["POST", "GET"] {
        let req = Request::builder()
            .method(method)
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let (status, json) = send(app.clone(), req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, serde_json::json!({"status": "healthy", "service": "test-service"}));
    }
}

#[tokio::test]
async fn formats_lists_all_with_markdown_default() {
    let sb = Sandbox::new();
    let req = Request::builder()
        .method("POST")
        .uri("/formats")
        .body(Body::empty())
        .unwrap();
    let (status, json) = send(router(&sb), req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["supported_formats"], serde_json::json!(["txt", "html", "markdown", "odt"]));
    assert_eq!(json["default"], "markdown");
}

// ── Conversion endpoints ─────────────────────────────────────────────────────

#[tokio::test]
async fn markdown_upload_converts() {
    let sb = Sandbox::new();
    let body = multipart(Some(("보고서.hwp", HWP)), &[]);
    let (status, json) = send(router(&sb), upload("/convert/markdown", body)).await;

    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["source_name"], "보고서.hwp");
    assert_eq!(json["output_format"], "markdown");
    assert_eq!(json["pipeline"], "hwp→xhtml→markdown");
    assert_eq!(json["is_binary"], false);
    assert!(json["content"].as_str().unwrap().contains("# Title"));
    assert!(sb.leftover_scratch().is_empty());
}

#[tokio::test]
async fn odt_upload_is_base64() {
    let sb = Sandbox::new();
    let body = multipart(Some(("a.hwp", HWP)), &[]);
    let (status, json) = send(router(&sb), upload("/convert/odt", body)).await;

    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["is_binary"], true);
    let bytes = encode::from_base64(json["content"].as_str().unwrap()).unwrap();
    assert!(bytes.starts_with(b"PK\x03\x04"));
    assert_eq!(json["content_length"], bytes.len());
}

#[tokio::test]
async fn generic_route_reads_format_field_then_query() {
    let sb = Sandbox::new();

    let body = multipart(Some(("a.hwp", HWP)), &[("output_format", "txt")]);
    let (status, json) = send(router(&sb), upload("/convert?output_format=html", body)).await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["output_format"], "txt");

    let body = multipart(Some(("a.hwp", HWP)), &[]);
    let (status, json) = send(router(&sb), upload("/convert?output_format=html", body)).await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["output_format"], "html");
    assert!(json["content"].as_str().unwrap().contains("<h1>Title</h1>"));

    let body = multipart(Some(("a.hwp", HWP)), &[]);
    let (_, json) = send(router(&sb), upload("/convert", body)).await;
    assert_eq!(json["output_format"], "markdown");
}

#[tokio::test]
async fn unknown_format_is_400() {
    let sb = Sandbox::new();
    let body = multipart(Some(("a.hwp", HWP)), &[("output_format", "pdf")]);
    let (status, json) = send(router(&sb), upload("/convert", body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "unsupported_format");
    assert_eq!(sb.tool_calls(), 0);
}

#[tokio::test]
async fn missing_file_field_is_400() {
    let sb = Sandbox::new();
    let body = multipart(None, &[("output_format", "txt")]);
    let (status, json) = send(router(&sb), upload("/convert/text", body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["detail"].as_str().unwrap().contains("file"));
}

#[tokio::test]
async fn tool_failure_is_422() {
    let sb = Sandbox::new();
    let converter = Converter::with_options(
        sb.options().hwp5html_program(&scripts().failing).build().unwrap(),
    );
    let app = router_with(ServiceConfig::default(), converter);

    let body = multipart(Some(("broken.hwp", HWP)), &[]);
    let (status, json) = send(app, upload("/convert/text", body)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["error"], "external_tool_failure");
    assert!(json["detail"].as_str().unwrap().contains("broken.hwp"));
}

#[tokio::test]
async fn pooled_odt_is_400() {
    let sb = Sandbox::new();
    let converter = Converter::with_options(
        sb.options()
            .workers(1)
            .worker_program(sb.path().join("no-such-worker"))
            .build()
            .unwrap(),
    );
    let app = router_with(ServiceConfig::default(), converter);

    let body = multipart(Some(("a.hwp", HWP)), &[]);
    let (status, json) = send(app, upload("/convert/odt", body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "operation_unsupported_in_mode");
}

#[tokio::test]
async fn cors_headers_only_when_enabled() {
    let sb = Sandbox::new();
    let preflight = || {
        Request::builder()
            .method("OPTIONS")
            .uri("/health")
            .header(header::ORIGIN, "http://localhost:5173")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(Body::empty())
            .unwrap()
    };

    let resp = router(&sb).oneshot(preflight()).await.unwrap();
    assert!(resp.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());

    let config = ServiceConfig {
        cors_enabled: true,
        ..ServiceConfig::default()
    };
    let app = router_with(config, Converter::new());
    let resp = app.oneshot(preflight()).await.unwrap();
    assert_eq!(
        resp.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "*"
    );
}
