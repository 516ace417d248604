//! Fixed-size pool of worker processes fed from one task queue.
//!
//! ```text
//! submit() ──▶ mpsc queue ──▶ driver 0 ──▶ child 0 (stdin/stdout JSON lines)
//!                         ├─▶ driver 1 ──▶ child 1
//!                         └─▶ driver N ──▶ child N
//!          ◀── oneshot reply ───┘
//! ```
//!
//! Each driver task owns one child process and handles one job at a time:
//! write the task line, read the reply line, answer the submitter through a
//! oneshot channel. A child whose pipe breaks fails its in-flight job with
//! [`HwpError::WorkerFailed`] and is respawned before the driver takes the
//! next job. Dropping the pool closes the queue; drivers then close their
//! children's stdin and the children exit at EOF.

use super::{WorkerReply, WorkerTask};
use crate::config::{ConverterOptions, OutputFormat};
use crate::error::HwpError;
use crate::output::ConversionOutput;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Environment variable naming the worker executable.
pub const WORKER_ENV: &str = "HWP_PARSER_WORKER";

/// Name of the executable that serves the worker protocol.
pub const WORKER_BIN: &str = "hwp-parser";

/// How long a child gets to exit after its stdin closes.
const EXIT_GRACE: Duration = Duration::from_secs(5);

type Reply = Result<ConversionOutput, HwpError>;

struct Job {
    task: WorkerTask,
    reply: oneshot::Sender<Reply>,
}

/// A running pool. Cheap to share behind an `Arc`.
pub struct WorkerPool {
    size: usize,
    queue: std::sync::Mutex<Option<mpsc::Sender<Job>>>,
    drivers: Mutex<Vec<JoinHandle<()>>>,
    next_task_id: AtomicU64,
}

impl WorkerPool {
    /// Spawn `size` workers running `program args...`.
    ///
    /// Fails if any worker cannot be started; workers already started are
    /// killed on drop.
    pub async fn start(size: usize, program: PathBuf, args: Vec<OsString>) -> Result<Self, HwpError> {
        let size = size.max(1);
        let spawner = Arc::new(Spawner { program, args });

        let mut children = Vec::with_capacity(size);
        for id in 0..size {
            children.push(spawner.spawn(id)?);
        }

        let (tx, rx) = mpsc::channel::<Job>(size * 4);
        let rx = Arc::new(Mutex::new(rx));
        let drivers = children
            .into_iter()
            .enumerate()
            .map(|(id, child)| {
                tokio::spawn(drive(id, Arc::clone(&rx), Arc::clone(&spawner), child))
            })
            .collect();

        info!(
            "Started {} worker(s): {}",
            size,
            spawner.program.display()
        );

        Ok(Self {
            size,
            queue: std::sync::Mutex::new(Some(tx)),
            drivers: Mutex::new(drivers),
            next_task_id: AtomicU64::new(1),
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Queue a conversion and wait for its reply.
    pub async fn submit(&self, path: PathBuf, format: OutputFormat) -> Result<ConversionOutput, HwpError> {
        let sender = self
            .queue
            .lock()
            .map_err(|_| HwpError::Internal("worker queue lock poisoned".into()))?
            .clone()
            .ok_or_else(|| HwpError::WorkerFailed {
                detail: "worker pool is shut down".into(),
            })?;

        let task = WorkerTask {
            task_id: self.next_task_id.fetch_add(1, Ordering::Relaxed),
            path,
            format,
        };
        let (reply_tx, reply_rx) = oneshot::channel();
        sender
            .send(Job { task, reply: reply_tx })
            .await
            .map_err(|_| HwpError::WorkerFailed {
                detail: "worker pool is shut down".into(),
            })?;

        reply_rx.await.map_err(|_| HwpError::WorkerFailed {
            detail: "worker dropped the task".into(),
        })?
    }

    /// Close the queue and wait for every driver to stop its child.
    ///
    /// Jobs already queued are still answered.
    pub async fn shutdown(&self) {
        if let Ok(mut queue) = self.queue.lock() {
            queue.take();
        }
        let drivers = std::mem::take(&mut *self.drivers.lock().await);
        for handle in drivers {
            if let Err(e) = handle.await {
                warn!("Worker driver ended abnormally: {}", e);
            }
        }
        debug!("Worker pool stopped");
    }
}

/// Arguments that make `hwp-parser worker` mirror `options`.
pub fn worker_args(options: &ConverterOptions) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["worker".into()];
    if let Some(p) = &options.hwp5html_program {
        args.push("--hwp5html".into());
        args.push(p.clone().into_os_string());
    }
    if let Some(p) = &options.hwp5odt_program {
        args.push("--hwp5odt".into());
        args.push(p.clone().into_os_string());
    }
    if let Some(p) = &options.temp_root {
        args.push("--temp-root".into());
        args.push(p.clone().into_os_string());
    }
    if options.verbose {
        args.push("--verbose".into());
    }
    args
}

/// Worker executable: explicit path, then `HWP_PARSER_WORKER`, then a
/// `hwp-parser` next to the running executable, then `PATH`.
pub fn resolve_worker_program(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }
    if std::env::var_os(WORKER_ENV).is_some() {
        match hwp5_locate::locate_program(WORKER_BIN, WORKER_ENV) {
            Ok(p) => return p,
            Err(e) => warn!("{}", e),
        }
    }
    if let Ok(exe) = std::env::current_exe() {
        let sibling = exe.with_file_name(format!("{}{}", WORKER_BIN, std::env::consts::EXE_SUFFIX));
        if sibling.is_file() {
            return sibling;
        }
    }
    which_or_bare(WORKER_BIN)
}

// ── Internal helpers ─────────────────────────────────────────────────────

fn which_or_bare(program: &str) -> PathBuf {
    hwp5_locate::locate_program(program, WORKER_ENV).unwrap_or_else(|_| PathBuf::from(program))
}

struct Spawner {
    program: PathBuf,
    args: Vec<OsString>,
}

impl Spawner {
    fn spawn(&self, id: usize) -> Result<WorkerProcess, HwpError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| HwpError::WorkerFailed {
                detail: format!("could not start worker '{}': {}", self.program.display(), e),
            })?;

        let stdin = child.stdin.take().ok_or_else(|| HwpError::WorkerFailed {
            detail: "worker stdin unavailable".into(),
        })?;
        let stdout = child.stdout.take().ok_or_else(|| HwpError::WorkerFailed {
            detail: "worker stdout unavailable".into(),
        })?;

        debug!("Worker {} spawned (pid {:?})", id, child.id());
        Ok(WorkerProcess {
            id,
            child,
            stdin,
            stdout: BufReader::new(stdout),
        })
    }
}

struct WorkerProcess {
    id: usize,
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl WorkerProcess {
    /// Send one task and read its reply. `Err` means the pipe is unusable.
    async fn round_trip(&mut self, task: &WorkerTask) -> Result<WorkerReply, String> {
        let mut line = serde_json::to_string(task).map_err(|e| format!("task serialisation: {e}"))?;
        line.push('\n');
        self.stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| format!("write to worker {}: {e}", self.id))?;
        self.stdin
            .flush()
            .await
            .map_err(|e| format!("write to worker {}: {e}", self.id))?;

        let mut reply = String::new();
        let n = self
            .stdout
            .read_line(&mut reply)
            .await
            .map_err(|e| format!("read from worker {}: {e}", self.id))?;
        if n == 0 {
            return Err(format!("worker {} exited", self.id));
        }

        let reply: WorkerReply =
            serde_json::from_str(&reply).map_err(|e| format!("bad reply from worker {}: {e}", self.id))?;
        if reply.task_id() != task.task_id {
            return Err(format!(
                "worker {} answered task {} while {} was in flight",
                self.id,
                reply.task_id(),
                task.task_id
            ));
        }
        Ok(reply)
    }

    /// Close stdin and wait for the child to exit, killing it after a grace period.
    async fn stop(self) {
        let WorkerProcess {
            id,
            mut child,
            stdin,
            stdout,
        } = self;
        drop(stdin);
        drop(stdout);
        match tokio::time::timeout(EXIT_GRACE, child.wait()).await {
            Ok(Ok(status)) => debug!("Worker {} exited: {}", id, status),
            Ok(Err(e)) => warn!("Worker {} wait failed: {}", id, e),
            Err(_) => {
                warn!("Worker {} did not exit in time; killing", id);
                if let Err(e) = child.kill().await {
                    warn!("Worker {} kill failed: {}", id, e);
                }
            }
        }
    }
}

async fn drive(
    id: usize,
    queue: Arc<Mutex<mpsc::Receiver<Job>>>,
    spawner: Arc<Spawner>,
    process: WorkerProcess,
) {
    let mut process = Some(process);

    loop {
        let job = { queue.lock().await.recv().await };
        let Some(job) = job else { break };

        if process.is_none() {
            match spawner.spawn(id) {
                Ok(p) => process = Some(p),
                Err(e) => {
                    let _ = job.reply.send(Err(e));
                    continue;
                }
            }
        }
        let Some(worker) = process.as_mut() else {
            continue;
        };

        let reply = match worker.round_trip(&job.task).await {
            Ok(reply) => reply.into_result(),
            Err(detail) => {
                warn!("Worker {} failed on task {}: {}", id, job.task.task_id, detail);
                // Dropping the process kills it; the next job respawns.
                process = None;
                Err(HwpError::WorkerFailed { detail })
            }
        };
        let _ = job.reply.send(reply);
    }

    if let Some(worker) = process {
        worker.stop().await;
    }
}
