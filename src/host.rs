mod namespace;
mod program;

pub use namespace::{Binding, Callable, Namespace, SubmissionFunction, Symbols};
pub use program::{ProgramOutcome, ProgramRunner};

use std::process::{Command, Stdio};

use thiserror::Error;

/// Python helper that executes submissions on behalf of the host
///
/// `session <path>` loads a submission as a module and then answers call
/// requests over stdin/stdout, one JSON document per line. `run <stimulus>`
/// executes the program text read from stdin once, with `input()` answering
/// `stimulus` and stdout captured into a per-call buffer.
const DRIVER: &str = include_str!("host/driver.py");

/// Placeholder that replaces every file path in submission error text
pub const USERCODE_PLACEHOLDER: &str = "Usercode";

#[derive(Debug, Error)]
pub enum HostError {
    /// The submission failed while being loaded (syntax error, top-level exception)
    #[error("{0}")]
    Load(String),
    #[error("failed to communicate with the interpreter: {0}")]
    Io(#[from] std::io::Error),
    #[error("interpreter session protocol error: {0}")]
    Protocol(String),
}

/// Materializes untrusted submissions as something a checker can invoke
///
/// Every submission runs in a separate interpreter process. There is no
/// confinement beyond the process boundary; the grading deadline enforced by
/// the supervisor is the only limit.
#[derive(Debug, Clone)]
pub struct SubmissionHost {
    interpreter: Vec<String>,
    max_error_len: usize,
}

impl SubmissionHost {
    pub fn new(interpreter: Vec<String>, max_error_len: usize) -> Self {
        Self {
            interpreter,
            max_error_len,
        }
    }

    /// Builds `<interpreter...> -c <driver> <args...>` with all streams piped
    fn driver_command(&self, args: &[&str]) -> Result<Command, HostError> {
        let (program, prefix) = self
            .interpreter
            .split_first()
            .ok_or_else(|| HostError::Protocol("empty interpreter command".to_string()))?;

        let mut cmd = Command::new(program);
        cmd.args(prefix)
            .arg("-c")
            .arg(DRIVER)
            .args(args)
            .env("PYTHONIOENCODING", "utf-8")
            .env("PYTHONDONTWRITEBYTECODE", "1")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        Ok(cmd)
    }

    /// Makes submission error text safe to show to a learner
    pub fn clean_error(&self, message: &str) -> String {
        truncate_message(&scrub_paths(message.trim_end()), self.max_error_len)
    }
}

/// Replaces the path in every `File "..."` traceback fragment with a placeholder
pub fn scrub_paths(message: &str) -> String {
    const MARKER: &str = "File \"";

    let mut out = String::with_capacity(message.len());
    let mut rest = message;
    while let Some(start) = rest.find(MARKER) {
        let after_marker = start + MARKER.len();
        out.push_str(&rest[..after_marker]);
        match rest[after_marker..].find('"') {
            Some(end) => {
                out.push_str(USERCODE_PLACEHOLDER);
                rest = &rest[after_marker + end..];
            }
            None => {
                rest = &rest[after_marker..];
                break;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Cuts a message down to `max_len` characters, marking the cut
pub fn truncate_message(message: &str, max_len: usize) -> String {
    match message.char_indices().nth(max_len) {
        Some((idx, _)) => format!("{}...", &message[..idx]),
        None => message.to_string(),
    }
}
