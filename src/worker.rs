use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::checker::{Checker, ProblemError, ProblemRegistry};
use crate::config::WorkerSettings;
use crate::host::{HostError, SubmissionHost};
use crate::record::{TestCaseRecord, WorkerOutput};
use crate::runner::{ConfigError, RunnerError};

/// Read by the worker binary instead of `RUST_LOG`; its stderr is the crash channel
pub const WORKER_LOG_ENV: &str = "GRADER_WORKER_LOG";

/// Exit code for a submission the learner has to fix
pub const SUBMISSION_ERROR_EXIT: u8 = 1;
/// Exit code for failures the learner can't fix
pub const SYSTEM_ERROR_EXIT: u8 = 2;

pub const SESSION_LOST_MESSAGE: &str = "Your code ended the grading session unexpectedly.";

#[derive(Debug, Error)]
pub enum WorkerError {
    /// Raised while loading the submission, already scrubbed
    #[error("{0}")]
    Submission(String),
    #[error("{SESSION_LOST_MESSAGE}")]
    SessionLost,
    #[error(transparent)]
    Problem(#[from] ProblemError),
    #[error("problem is misconfigured: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to read submission {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to run the interpreter: {0}")]
    Io(std::io::Error),
}

impl WorkerError {
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Submission(_) | Self::SessionLost => SUBMISSION_ERROR_EXIT,
            _ => SYSTEM_ERROR_EXIT,
        }
    }
}

impl From<HostError> for WorkerError {
    fn from(e: HostError) -> Self {
        match e {
            HostError::Load(message) => Self::Submission(message),
            HostError::Protocol(detail) => {
                log::debug!("Interpreter session lost: {detail}");
                Self::SessionLost
            }
            HostError::Io(e) => Self::Io(e),
        }
    }
}

impl From<RunnerError> for WorkerError {
    fn from(e: RunnerError) -> Self {
        match e {
            RunnerError::Config(e) => Self::Config(e),
            RunnerError::Host(e) => e.into(),
        }
    }
}

/// Grades the submission staged at `source_path` against `problem_id`
///
/// An unknown problem is a graded failure, not an error, so it reaches the
/// learner as a regular record.
pub fn run_worker(
    problem_id: &str,
    source_path: &Path,
    settings: &WorkerSettings,
) -> Result<WorkerOutput, WorkerError> {
    let registry = ProblemRegistry::new(settings.problems_dir.clone());
    let checker = match registry.resolve(problem_id) {
        Ok(checker) => checker,
        Err(e @ ProblemError::NotFound(_)) => {
            log::warn!("{e}");
            return Ok(TestCaseRecord::failure(e.to_string()).into());
        }
        Err(e) => return Err(e.into()),
    };

    let host = SubmissionHost::new(settings.interpreter.clone(), settings.max_error_len);
    let records = match checker {
        Checker::Callable(check) => {
            let namespace = host.load(source_path)?;
            log::debug!(
                "Submission defines: {}",
                namespace.names().collect::<Vec<_>>().join(", ")
            );
            check.check_callable(&namespace)?
        }
        Checker::ProgramText(check) => {
            let source =
                std::fs::read_to_string(source_path).map_err(|source| WorkerError::Read {
                    path: source_path.to_path_buf(),
                    source,
                })?;
            check.check_program_text(&host, &source)?
        }
    };

    log::info!("Problem {problem_id} produced {} test cases", records.len());
    Ok(records.into())
}
