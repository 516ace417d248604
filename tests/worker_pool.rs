//! Pooled conversions through real `hwp-parser worker` child processes.
//!
//! Run with:
//!   cargo test --test worker_pool

#![cfg(all(unix, feature = "cli"))]

mod common;

use common::{scripts, Sandbox};
use futures::future::join_all;
use hwp_parser::{ConversionOutput, Converter, ErrorKind, OutputFormat};
use pretty_assertions::assert_eq;

const WORKER: &str = env!("CARGO_BIN_EXE_hwp-parser");

fn pooled(sb: &Sandbox, workers: usize) -> Converter {
    Converter::with_options(
        sb.options()
            .workers(workers)
            .worker_program(WORKER)
            .build()
            .unwrap(),
    )
}

#[tokio::test]
async fn pooled_matches_direct() {
    let sb = Sandbox::new();
    let doc = sb.document("report.hwp");
    let direct = Converter::with_options(sb.options().build().unwrap());
    let pool = pooled(&sb, 2);

    for format in [OutputFormat::Text, OutputFormat::Markdown, OutputFormat::Html] {
        let a = direct.convert(&doc, format).await.unwrap();
        let b = pool.convert(&doc, format).await.unwrap();
        assert_eq!(b.output_format(), format);
        assert_eq!(b.pipeline(), a.pipeline());
        assert_eq!(
            b.into_conversion_result().content,
            a.into_conversion_result().content
        );
    }
    pool.shutdown().await;
}

#[tokio::test]
async fn pooled_html_carries_assets_over_the_pipe() {
    let sb = Sandbox::new();
    let doc = sb.document("report.hwp");
    let pool = pooled(&sb, 1);

    match pool.convert(&doc, OutputFormat::Html).await.unwrap() {
        ConversionOutput::HtmlDir(html) => {
            assert_eq!(html.assets.len(), 1);
            assert!(html.assets["BIN0001.png"].starts_with(b"\x89PNG"));
            assert!(html.css_content.is_some());
        }
        other => panic!("expected HtmlDir, got {other:?}"),
    }
    pool.shutdown().await;
}

#[tokio::test]
async fn concurrent_submissions_all_complete() {
    let sb = Sandbox::new();
    let docs: Vec<_> = (0..6).map(|i| sb.document(&format!("doc{i}.hwp"))).collect();
    let pool = pooled(&sb, 2);

    let results = join_all(docs.iter().map(|d| pool.convert(d, OutputFormat::Text))).await;
    for (doc, result) in docs.iter().zip(results) {
        let out = result.unwrap();
        assert_eq!(out.source_path(), doc.as_path());
    }
    assert_eq!(sb.tool_calls(), 6);

    pool.shutdown().await;
    assert!(sb.leftover_scratch().is_empty(), "{:?}", sb.leftover_scratch());
}

#[tokio::test]
async fn worker_errors_keep_their_kind() {
    let sb = Sandbox::new();
    let doc = sb.document("broken.hwp");
    let pool = Converter::with_options(
        sb.options()
            .hwp5html_program(&scripts().failing)
            .workers(1)
            .worker_program(WORKER)
            .build()
            .unwrap(),
    );

    let err = pool.convert(&doc, OutputFormat::Markdown).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ExternalToolFailure);
    assert!(err.to_string().contains("corrupt stream"), "{err}");

    // The worker survives a failed task.
    let err = pool.convert(&doc, OutputFormat::Text).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ExternalToolFailure);
    pool.shutdown().await;
}

#[tokio::test]
async fn pool_restarts_after_shutdown() {
    let sb = Sandbox::new();
    let doc = sb.document("report.hwp");
    let pool = pooled(&sb, 1);

    pool.convert(&doc, OutputFormat::Text).await.unwrap();
    pool.shutdown().await;
    pool.convert(&doc, OutputFormat::Text).await.unwrap();
    pool.shutdown().await;
    pool.shutdown().await;
}
