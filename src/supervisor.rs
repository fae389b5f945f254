use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::time::timeout;

use crate::aggregate::{Verdict, aggregate};
use crate::checker::{ProblemError, is_valid_problem_id};
use crate::config::{GraderConfig, PROBLEM_PLACEHOLDER, SOURCE_PLACEHOLDER, WorkerSettings};
use crate::record::{TestCaseRecord, WorkerOutput};
use crate::staging::StagedArtifact;
use crate::worker::SYSTEM_ERROR_EXIT;

pub const MALFORMED_OUTPUT_MESSAGE: &str = "Could not evaluate your code, check your syntax.";
pub const SYSTEM_ERROR_MESSAGE: &str = "A system error occurred.";

/// Upper bound on what is read from each worker stream
const MAX_STREAM_BYTES: usize = 16 * 1024 * 1024;

/// What the transport hands to the grader
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GradeRequest {
    pub problem_id: String,
    pub source: String,
    #[serde(default = "default_reveal")]
    pub reveal: bool,
    /// Only used for logging
    #[serde(default = "default_requester")]
    pub requester_id: String,
}

fn default_reveal() -> bool {
    true
}

fn default_requester() -> String {
    "unknown".to_string()
}

/// How a grading attempt ended
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Completed(Vec<TestCaseRecord>),
    TimedOut,
    Crashed(String),
    MalformedOutput,
    SystemError,
}

impl Outcome {
    /// Every non-completed outcome becomes exactly one failure record
    pub fn into_records(self, limit: Duration) -> Vec<TestCaseRecord> {
        match self {
            Self::Completed(records) => records,
            Self::TimedOut => vec![TestCaseRecord::failure(timeout_message(limit))],
            Self::Crashed(error) => vec![TestCaseRecord::failure(error)],
            Self::MalformedOutput => vec![TestCaseRecord::failure(MALFORMED_OUTPUT_MESSAGE)],
            Self::SystemError => vec![TestCaseRecord::failure(SYSTEM_ERROR_MESSAGE)],
        }
    }
}

pub fn timeout_message(limit: Duration) -> String {
    format!(
        "Grading timed out after {} seconds. Check your code for infinite loops.",
        limit.as_secs()
    )
}

/// Runs one worker process per submission and turns whatever happens to it
/// into records
///
/// Each request stages its own artifact and owns its own worker, so
/// concurrent requests share nothing but the staging directory.
#[derive(Debug, Clone)]
pub struct Supervisor {
    timeout: Duration,
    staging_dir: PathBuf,
    worker_command: Vec<String>,
    worker_settings: WorkerSettings,
    max_stream_bytes: usize,
}

impl Supervisor {
    pub fn new(config: &GraderConfig) -> std::io::Result<Self> {
        Ok(Self {
            timeout: config.timeout(),
            staging_dir: config.staging_dir(),
            worker_command: config.worker_command()?,
            worker_settings: WorkerSettings::from(config),
            max_stream_bytes: MAX_STREAM_BYTES,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Grades a submission end to end; never fails
    pub async fn grade(&self, request: GradeRequest) -> Verdict {
        let start = Instant::now();
        log::info!(
            "User {} submitted code for problem {}",
            request.requester_id,
            request.problem_id
        );

        let supervisor = self.clone();
        let problem_id = request.problem_id.clone();
        let source = request.source;
        let task = tokio::spawn(async move { supervisor.supervise(&problem_id, &source).await });
        let outcome = match task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                log::error!("Grading task for problem {} failed: {e}", request.problem_id);
                Outcome::SystemError
            }
        };

        let verdict = aggregate(outcome.into_records(self.timeout), request.reveal);
        log::info!(
            "Code from user {} for problem {} graded in {:.3} sec (score {:.2})",
            request.requester_id,
            request.problem_id,
            start.elapsed().as_secs_f64(),
            verdict.score
        );
        verdict
    }

    /// Stages the source, runs the worker and always removes the artifact
    pub async fn supervise(&self, problem_id: &str, source: &str) -> Outcome {
        // The id ends up in a file name and in the worker command line
        if !is_valid_problem_id(problem_id) {
            let not_found = ProblemError::NotFound(problem_id.to_string());
            log::warn!("{not_found}");
            return Outcome::Completed(vec![TestCaseRecord::failure(not_found.to_string())]);
        }

        let artifact = match StagedArtifact::stage(&self.staging_dir, problem_id, source) {
            Ok(artifact) => artifact,
            Err(e) => {
                log::error!(
                    "Failed to stage submission in {}: {e}",
                    self.staging_dir.display()
                );
                return Outcome::SystemError;
            }
        };

        let outcome = match self.run_worker(problem_id, artifact.path()).await {
            Ok(outcome) => outcome,
            Err(e) => {
                log::error!("Grading problem {problem_id} failed: {e:#}");
                Outcome::SystemError
            }
        };

        if let Err(e) = artifact.cleanup() {
            log::warn!("Failed to remove staged submission: {e}");
        }
        outcome
    }

    async fn run_worker(&self, problem_id: &str, source_path: &Path) -> Result<Outcome> {
        let command = self.generate_worker_command(problem_id, source_path);
        let Some((program, args)) = command.split_first() else {
            bail!("Empty worker command");
        };

        let mut cmd = Command::new(program);
        cmd.args(args)
            .envs(self.worker_settings.to_env())
            .env_remove("RUST_LOG")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn()?;
        let pid = child.id();
        log::debug!("Worker {pid:?} started for problem {problem_id}");

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let limit = self.max_stream_bytes;

        let finished = timeout(self.timeout, async {
            let (stdout, stderr) =
                tokio::try_join!(read_stream(stdout, limit), read_stream(stderr, limit))?;

            // Interpreters the worker left behind are killed while the
            // unreaped worker still holds the group id
            if let Some(pid) = pid {
                wait_for_exit(pid).await;
                kill_process_group(pid);
            }

            let status = child.wait().await?;
            Ok::<_, std::io::Error>((status, stdout, stderr))
        })
        .await;

        match finished {
            Ok(result) => {
                let (status, stdout, stderr) = result?;
                Ok(classify(status, &stdout, &stderr, limit))
            }
            Err(_) => {
                log::warn!(
                    "Worker {pid:?} for problem {problem_id} exceeded {:?}, killing it",
                    self.timeout
                );
                terminate(&mut child, pid).await;
                Ok(Outcome::TimedOut)
            }
        }
    }

    /// Applies the `%PROBLEM%` and `%SOURCE%` substitutions
    fn generate_worker_command(&self, problem_id: &str, source_path: &Path) -> Vec<String> {
        let source = source_path.to_string_lossy();
        // The path goes in last so nothing inside it is substituted again
        let mapping = [(PROBLEM_PLACEHOLDER, problem_id), (SOURCE_PLACEHOLDER, source.as_ref())];

        self.worker_command
            .iter()
            .map(|s| {
                let mut t = s.clone();
                for (k, v) in mapping {
                    t = t.replace(k, v);
                }
                t
            })
            .collect()
    }
}

/// Decides what a finished worker produced
///
/// A worker-reported system error wins, then anything on stderr, then the
/// stdout payload, which must fit the limit and parse as one record or a list
/// of records.
fn classify(status: ExitStatus, stdout: &Captured, stderr: &Captured, limit: usize) -> Outcome {
    let error = String::from_utf8_lossy(&stderr.bytes).trim_end().to_string();

    if status.code() == Some(i32::from(SYSTEM_ERROR_EXIT)) {
        log::error!("Worker reported a system error: {error}");
        return Outcome::SystemError;
    }

    if !error.is_empty() {
        log::info!("Worker crashed: {error}");
        return Outcome::Crashed(error);
    }

    if stdout.overflowed {
        log::warn!("Worker output exceeded {limit} bytes");
        return Outcome::MalformedOutput;
    }

    match serde_json::from_slice::<WorkerOutput>(&stdout.bytes) {
        Ok(output) => Outcome::Completed(output.into_records()),
        Err(e) => {
            log::warn!(
                "Unreadable worker output ({e}): {}",
                String::from_utf8_lossy(&stdout.bytes)
            );
            Outcome::MalformedOutput
        }
    }
}

/// What a worker wrote to one stream, cut at the limit
#[derive(Debug, Default)]
struct Captured {
    bytes: Vec<u8>,
    overflowed: bool,
}

/// Reads a stream to its end, keeping at most `limit` bytes
///
/// Output past the limit is drained and discarded, so the worker never blocks
/// on a full pipe or sees a broken one.
async fn read_stream<R>(stream: Option<R>, limit: usize) -> std::io::Result<Captured>
where
    R: AsyncRead + Unpin,
{
    let mut captured = Captured::default();
    let Some(mut stream) = stream else {
        return Ok(captured);
    };

    let mut chunk = vec![0u8; 64 * 1024];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(captured);
        }
        let room = limit.saturating_sub(captured.bytes.len());
        captured.overflowed |= n > room;
        captured.bytes.extend_from_slice(&chunk[..n.min(room)]);
    }
}

/// Blocks until the worker has exited without reaping it
#[cfg(unix)]
async fn wait_for_exit(pid: u32) {
    let waited = tokio::task::spawn_blocking(move || {
        loop {
            // SAFETY: siginfo_t is plain data for waitid to fill in
            let mut info: libc::siginfo_t = unsafe { std::mem::zeroed() };
            // SAFETY: WNOWAIT leaves the worker a zombie, so its pid stays reserved
            let rc = unsafe {
                libc::waitid(
                    libc::P_PID,
                    pid as libc::id_t,
                    &mut info,
                    libc::WEXITED | libc::WNOWAIT,
                )
            };
            if rc == 0 {
                return Ok(());
            }
            let err = std::io::Error::last_os_error();
            if err.kind() != std::io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
    })
    .await;

    match waited {
        Ok(Ok(())) => {}
        Ok(Err(e)) => log::debug!("Unable to wait for worker {pid}: {e}"),
        Err(e) => log::debug!("Waiting for worker {pid} failed: {e}"),
    }
}

#[cfg(not(unix))]
async fn wait_for_exit(_pid: u32) {}

/// Kills the worker together with every interpreter it started
async fn terminate(child: &mut Child, pid: Option<u32>) {
    if let Some(pid) = pid {
        kill_process_group(pid);
    }
    if let Err(e) = child.kill().await {
        log::debug!("Worker already exited: {e}");
    }
}

#[cfg(unix)]
fn kill_process_group(pgid: u32) {
    // SAFETY: kill(2) only signals; a negative pid addresses the worker's own group
    let rc = unsafe { libc::kill(-(pgid as libc::pid_t), libc::SIGKILL) };
    if rc != 0 {
        log::debug!(
            "No process group {pgid} left to kill: {}",
            std::io::Error::last_os_error()
        );
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pgid: u32) {}
