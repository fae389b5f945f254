use std::io::Write;

use serde::Deserialize;

use super::{HostError, SubmissionHost};

/// Result of one execution of a program-text submission
#[derive(Debug, Clone, PartialEq)]
pub enum ProgramOutcome {
    /// Everything the program printed, with trailing newlines and NULs removed
    Output(String),
    /// The program raised; the text is already scrubbed and truncated
    Error(String),
}

/// Executes program-text submissions, one fresh run per stimulus
pub trait ProgramRunner {
    fn run_program(&self, source: &str, stimulus: &str) -> Result<ProgramOutcome, HostError>;
}

#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
enum RunReply {
    Output(String),
    Error(String),
}

impl ProgramRunner for SubmissionHost {
    /// Runs `source` once as a program, answering every `input()` with `stimulus`
    ///
    /// Each call starts a fresh interpreter so no state survives between cases.
    fn run_program(&self, source: &str, stimulus: &str) -> Result<ProgramOutcome, HostError> {
        let mut child = self.driver_command(&["run", stimulus])?.spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(source.as_bytes())?;
            // Dropping stdin closes it so the driver sees the end of the source
        }

        let output = child.wait_with_output()?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let reply = stdout.lines().last().unwrap_or_default();

        match serde_json::from_str::<RunReply>(reply) {
            Ok(RunReply::Output(text)) => Ok(ProgramOutcome::Output(
                text.trim_end_matches(['\n', '\0']).to_string(),
            )),
            Ok(RunReply::Error(message)) => Ok(ProgramOutcome::Error(self.clean_error(&message))),
            Err(e) => Err(HostError::Protocol(format!(
                "program run produced no result ({e}); status {}, stderr: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn python_host() -> Option<SubmissionHost> {
        let available = std::process::Command::new("python3")
            .arg("--version")
            .output()
            .is_ok_and(|output| output.status.success());
        available.then(|| SubmissionHost::new(vec!["python3".to_string()], 2000))
    }

    #[test]
    fn test_printed_output_loses_trailing_newlines() {
        let Some(host) = python_host() else {
            eprintln!("python3 not found, skipping");
            return;
        };

        let outcome = host.run_program("print(input())", "5").unwrap();
        assert_eq!(outcome, ProgramOutcome::Output("5".to_string()));

        let outcome = host
            .run_program("x = input()\nprint(x)\nprint(x)\n", "ab")
            .unwrap();
        assert_eq!(outcome, ProgramOutcome::Output("ab\nab".to_string()));
    }
}
