mod builtin;
mod declarative;

pub use declarative::{FunctionCase, ProblemDefinition, ProgramCase};

use std::path::PathBuf;

use thiserror::Error;

use crate::host::{ProgramRunner, Symbols};
use crate::record::TestCaseRecord;
use crate::runner::RunnerError;

/// Per-problem grading logic
///
/// A problem either inspects a loaded submission (functions and variables it
/// defines) or treats the submission as a program fed through `input()`.
pub enum Checker {
    Callable(Box<dyn CallableCheck>),
    ProgramText(Box<dyn ProgramTextCheck>),
}

pub trait CallableCheck: Send + Sync {
    fn check_callable(&self, symbols: &dyn Symbols) -> Result<Vec<TestCaseRecord>, RunnerError>;
}

pub trait ProgramTextCheck: Send + Sync {
    fn check_program_text(
        &self,
        runner: &dyn ProgramRunner,
        source: &str,
    ) -> Result<Vec<TestCaseRecord>, RunnerError>;
}

#[derive(Debug, Error)]
pub enum ProblemError {
    #[error("no checker available for problem {0}")]
    NotFound(String),
    #[error("failed to read problem definition {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid problem definition {}: {source}", path.display())]
    Invalid {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Resolves problem ids to checkers
///
/// Definition files under `problems_dir` take precedence over the built-in
/// problems and are read again on every lookup, so edits apply to the next
/// submission without a restart.
#[derive(Debug, Clone, Default)]
pub struct ProblemRegistry {
    problems_dir: Option<PathBuf>,
}

impl ProblemRegistry {
    pub fn new(problems_dir: Option<PathBuf>) -> Self {
        Self { problems_dir }
    }

    pub fn resolve(&self, problem_id: &str) -> Result<Checker, ProblemError> {
        if !is_valid_problem_id(problem_id) {
            return Err(ProblemError::NotFound(problem_id.to_string()));
        }

        if let Some(dir) = &self.problems_dir {
            let path = dir.join(format!("{problem_id}.json"));
            if path.is_file() {
                log::debug!("Loading problem {problem_id} from {}", path.display());
                return Ok(ProblemDefinition::load(&path)?.into_checker());
            }
        }

        builtin::checker(problem_id).ok_or_else(|| ProblemError::NotFound(problem_id.to_string()))
    }
}

/// Problem ids double as file names, so only a safe alphabet is accepted
pub fn is_valid_problem_id(problem_id: &str) -> bool {
    !problem_id.is_empty()
        && problem_id.len() <= 64
        && problem_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

pub fn missing_function(name: &str) -> TestCaseRecord {
    TestCaseRecord::failure(format!("function ({name}) is not defined."))
}

pub fn missing_variable(name: &str) -> TestCaseRecord {
    TestCaseRecord::failure(format!("variable ({name}) is not defined."))
}

/// Extends the documented edge cases with random values up to `count`
///
/// Generated values already present are rejected. Generation gives up after a
/// bounded number of attempts so a narrow value space cannot loop forever.
pub fn fill_distinct<T, G>(mut values: Vec<T>, count: usize, mut generate: G) -> Vec<T>
where
    T: PartialEq,
    G: FnMut() -> T,
{
    let mut attempts = count.saturating_mul(100);
    while values.len() < count && attempts > 0 {
        attempts -= 1;
        let candidate = generate();
        if !values.contains(&candidate) {
            values.push(candidate);
        }
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_problem_id_alphabet() {
        assert!(is_valid_problem_id("TEST_001"));
        assert!(is_valid_problem_id("week-3"));
        assert!(!is_valid_problem_id(""));
        assert!(!is_valid_problem_id("../etc/passwd"));
        assert!(!is_valid_problem_id("a b"));
    }

    #[test]
    fn test_fill_distinct_keeps_edge_cases_first() {
        let mut rng = fastrand::Rng::with_seed(7);
        let values = fill_distinct(vec![0, 1], 10, || rng.i32(-50..=50));
        assert_eq!(values.len(), 10);
        assert_eq!(&values[..2], &[0, 1]);
        for (i, v) in values.iter().enumerate() {
            assert!(!values[i + 1..].contains(v), "duplicate value {v}");
        }
    }

    #[test]
    fn test_fill_distinct_gives_up_on_tiny_space() {
        let values = fill_distinct(vec![true], 5, || false);
        assert_eq!(values, vec![true, false]);
    }

    #[test]
    fn test_unknown_problem() {
        let registry = ProblemRegistry::default();
        assert!(matches!(
            registry.resolve("NO_SUCH_PROBLEM"),
            Err(ProblemError::NotFound(id)) if id == "NO_SUCH_PROBLEM"
        ));
        assert!(matches!(
            registry.resolve("../TEST_001"),
            Err(ProblemError::NotFound(_))
        ));
    }

    #[test]
    fn test_builtin_problems_resolve() {
        let registry = ProblemRegistry::default();
        assert!(matches!(registry.resolve("TEST_000"), Ok(Checker::ProgramText(_))));
        assert!(matches!(registry.resolve("TEST_001"), Ok(Checker::Callable(_))));
        assert!(matches!(registry.resolve("TEST_002"), Ok(Checker::Callable(_))));
    }
}
