//! Worker protocol: conversions run in long-lived child processes.
//!
//! A worker is `hwp-parser worker` (or any program that speaks the same
//! protocol). It reads one JSON task per line on stdin and writes exactly one
//! JSON reply line per task on stdout. Logs go to stderr so stdout carries
//! nothing but replies.
//!
//! ```text
//! → {"task_id":7,"path":"/abs/report.hwp","format":"markdown"}
//! ← {"status":"converted","task_id":7,"output":{"type":"document",...}}
//! ← {"status":"failed","task_id":7,"error":{"kind":"not_found","path":"..."}}
//! ```
//!
//! Errors are carried as [`WorkerFailure`], which maps one-to-one onto the
//! [`HwpError`] variants so the caller sees the same error kind it would have
//! seen converting in-process.

pub mod pool;

use crate::config::OutputFormat;
use crate::convert::Converter;
use crate::error::HwpError;
use crate::output::ConversionOutput;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

/// One unit of work sent to a worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerTask {
    pub task_id: u64,
    /// Absolute, already validated by the dispatcher.
    pub path: PathBuf,
    pub format: OutputFormat,
}

/// A worker's answer to one [`WorkerTask`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WorkerReply {
    Converted { task_id: u64, output: ConversionOutput },
    Failed { task_id: u64, error: WorkerFailure },
}

impl WorkerReply {
    pub fn task_id(&self) -> u64 {
        match self {
            WorkerReply::Converted { task_id, .. } | WorkerReply::Failed { task_id, .. } => *task_id,
        }
    }

    pub fn into_result(self) -> Result<ConversionOutput, HwpError> {
        match self {
            WorkerReply::Converted { output, .. } => Ok(output),
            WorkerReply::Failed { error, .. } => Err(error.into()),
        }
    }
}

/// Wire form of [`HwpError`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkerFailure {
    NotFound { path: PathBuf },
    InvalidInput { path: PathBuf, reason: String },
    PermissionDenied { path: PathBuf },
    UnsupportedFormat { format: String },
    ExternalToolFailure { tool: String, source_name: String, detail: String },
    OdtValidationFailed { source_name: String, detail: String },
    OperationUnsupportedInMode { format: String, mode: String },
    Io { path: PathBuf, message: String },
    Internal { message: String },
}

impl From<&HwpError> for WorkerFailure {
    fn from(e: &HwpError) -> Self {
        match e {
            HwpError::NotFound { path } => WorkerFailure::NotFound { path: path.clone() },
            HwpError::InvalidInput { path, reason } => WorkerFailure::InvalidInput {
                path: path.clone(),
                reason: reason.clone(),
            },
            HwpError::PermissionDenied { path } => {
                WorkerFailure::PermissionDenied { path: path.clone() }
            }
            HwpError::UnsupportedFormat { format } => WorkerFailure::UnsupportedFormat {
                format: format.clone(),
            },
            HwpError::ExternalToolFailure {
                tool,
                source_name,
                detail,
            } => WorkerFailure::ExternalToolFailure {
                tool: tool.clone(),
                source_name: source_name.clone(),
                detail: detail.clone(),
            },
            HwpError::OdtValidationFailed {
                source_name,
                detail,
            } => WorkerFailure::OdtValidationFailed {
                source_name: source_name.clone(),
                detail: detail.clone(),
            },
            HwpError::OperationUnsupportedInMode { format, mode } => {
                WorkerFailure::OperationUnsupportedInMode {
                    format: format.clone(),
                    mode: mode.clone(),
                }
            }
            HwpError::OutputWriteFailed { path, source } | HwpError::Io { path, source } => {
                WorkerFailure::Io {
                    path: path.clone(),
                    message: source.to_string(),
                }
            }
            HwpError::WorkerFailed { .. } | HwpError::InvalidConfig(_) | HwpError::Internal(_) => {
                WorkerFailure::Internal {
                    message: e.to_string(),
                }
            }
        }
    }
}

impl From<WorkerFailure> for HwpError {
    fn from(f: WorkerFailure) -> Self {
        match f {
            WorkerFailure::NotFound { path } => HwpError::NotFound { path },
            WorkerFailure::InvalidInput { path, reason } => HwpError::InvalidInput { path, reason },
            WorkerFailure::PermissionDenied { path } => HwpError::PermissionDenied { path },
            WorkerFailure::UnsupportedFormat { format } => HwpError::UnsupportedFormat { format },
            WorkerFailure::ExternalToolFailure {
                tool,
                source_name,
                detail,
            } => HwpError::ExternalToolFailure {
                tool,
                source_name,
                detail,
            },
            WorkerFailure::OdtValidationFailed {
                source_name,
                detail,
            } => HwpError::OdtValidationFailed {
                source_name,
                detail,
            },
            WorkerFailure::OperationUnsupportedInMode { format, mode } => {
                HwpError::OperationUnsupportedInMode { format, mode }
            }
            WorkerFailure::Io { path, message } => HwpError::Io {
                path,
                source: std::io::Error::other(message),
            },
            WorkerFailure::Internal { message } => HwpError::Internal(message),
        }
    }
}

/// Worker-side loop: answer tasks from `reader` on `writer` until EOF.
///
/// A line that is not a valid task gets a `failed` reply with task id 0; the
/// loop keeps going. Only pipe errors end it early.
pub async fn serve<R, W>(reader: R, mut writer: W, converter: &Converter) -> Result<(), HwpError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let pipe_err = |e: std::io::Error| HwpError::io("<worker pipe>", e);
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await.map_err(pipe_err)? {
        if line.trim().is_empty() {
            continue;
        }

        let reply = match serde_json::from_str::<WorkerTask>(&line) {
            Ok(task) => {
                debug!("Worker task {}: {} → {}", task.task_id, task.path.display(), task.format);
                match converter.convert(&task.path, task.format).await {
                    Ok(output) => WorkerReply::Converted {
                        task_id: task.task_id,
                        output,
                    },
                    Err(e) => WorkerReply::Failed {
                        task_id: task.task_id,
                        error: WorkerFailure::from(&e),
                    },
                }
            }
            Err(e) => {
                warn!("Malformed worker task: {}", e);
                WorkerReply::Failed {
                    task_id: 0,
                    error: WorkerFailure::Internal {
                        message: format!("malformed task: {e}"),
                    },
                }
            }
        };

        let mut json = serde_json::to_string(&reply)
            .map_err(|e| HwpError::Internal(format!("reply serialisation: {e}")))?;
        json.push('\n');
        writer.write_all(json.as_bytes()).await.map_err(pipe_err)?;
        writer.flush().await.map_err(pipe_err)?;
    }

    debug!("Worker input closed; exiting");
    Ok(())
}

/// [`serve`] over the process's stdin and stdout.
pub async fn serve_stdio(converter: &Converter) -> Result<(), HwpError> {
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    serve(stdin, tokio::io::stdout(), converter).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    async fn run_lines(input: &str) -> Vec<WorkerReply> {
        let mut out = Vec::new();
        serve(input.as_bytes(), &mut out, &Converter::new())
            .await
            .unwrap();
        String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn task_wire_format() {
        let task = WorkerTask {
            task_id: 7,
            path: "/abs/report.hwp".into(),
            format: OutputFormat::Text,
        };
        let json = serde_json::to_string(&task).unwrap();
        assert_eq!(json, r#"{"task_id":7,"path":"/abs/report.hwp","format":"txt"}"#);
    }

    #[test]
    fn failure_round_trip_keeps_kind() {
        let errors = [
            HwpError::NotFound { path: "/x.hwp".into() },
            HwpError::OdtValidationFailed {
                source_name: "x.hwp".into(),
                detail: "RelaxNG".into(),
            },
            HwpError::io("/tmp", std::io::Error::other("disk full")),
            HwpError::WorkerFailed { detail: "eof".into() },
        ];
        for e in errors {
            let wire = serde_json::to_string(&WorkerFailure::from(&e)).unwrap();
            let back: HwpError = serde_json::from_str::<WorkerFailure>(&wire).unwrap().into();
            assert_eq!(back.kind(), e.kind(), "{wire}");
        }
    }

    #[tokio::test]
    async fn missing_file_gets_failed_reply() {
        let replies = run_lines(
            "{\"task_id\":3,\"path\":\"/definitely/not/here.hwp\",\"format\":\"markdown\"}\n",
        )
        .await;
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].task_id(), 3);
        let err = replies[0].clone().into_result().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn malformed_line_gets_task_id_zero_and_loop_continues() {
        let replies = run_lines(
            "not json\n\n{\"task_id\":9,\"path\":\"/nope.hwp\",\"format\":\"txt\"}\n",
        )
        .await;
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0].task_id(), 0);
        assert_eq!(replies[1].task_id(), 9);
    }

    #[tokio::test]
    async fn eof_ends_the_loop() {
        assert!(run_lines("").await.is_empty());
    }
}
