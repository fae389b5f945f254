use serde_json::Value;
use thiserror::Error;

use crate::host::{Callable, HostError, ProgramOutcome, ProgramRunner};
use crate::record::TestCaseRecord;
use crate::value::{display_argument, display_value, values_equal};

/// Checker misuse: the test helpers were called with an impossible setup
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("either 'solution' or 'expected' must be provided")]
    MissingReference,
    #[error("both 'solution' and 'expected' were provided")]
    BothReferences,
    #[error("'expected' has {expected} entries but {values} test values were given")]
    ExpectedTooShort { expected: usize, values: usize },
}

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Host(#[from] HostError),
}

/// Where the correct answer of each case comes from
pub enum Reference<S> {
    /// A reference implementation evaluated on every input
    Solution(S),
    /// Precomputed answers, one per input, in input order
    Expected(Vec<Value>),
}

impl<S> Reference<S> {
    /// Accepts exactly one of `solution` and `expected`
    #[cfg(test)]
    fn from_parts(solution: Option<S>, expected: Option<Vec<Value>>) -> Result<Self, ConfigError> {
        match (solution, expected) {
            (Some(solution), None) => Ok(Self::Solution(solution)),
            (None, Some(expected)) => Ok(Self::Expected(expected)),
            (Some(_), Some(_)) => Err(ConfigError::BothReferences),
            (None, None) => Err(ConfigError::MissingReference),
        }
    }

    fn ensure_covers(&self, values: usize) -> Result<(), ConfigError> {
        match self {
            Self::Expected(expected) if expected.len() < values => {
                Err(ConfigError::ExpectedTooShort {
                    expected: expected.len(),
                    values,
                })
            }
            _ => Ok(()),
        }
    }
}

/// Compares a submission function against a reference on every argument tuple
///
/// An exception raised by the submission never aborts the batch: it becomes
/// the case's actual output (`"<ErrorKind>: <message>"`) and fails the case.
pub fn test_function<C, S>(
    function: &C,
    values: &[Vec<Value>],
    reference: Reference<S>,
) -> Result<Vec<TestCaseRecord>, RunnerError>
where
    C: Callable + ?Sized,
    S: Fn(&[Value]) -> Value,
{
    reference.ensure_covers(values.len())?;

    let mut records = Vec::with_capacity(values.len());
    for (i, args) in values.iter().enumerate() {
        let description = format!(
            "{}({})",
            function.name(),
            args.iter()
                .map(display_argument)
                .collect::<Vec<_>>()
                .join(", ")
        );

        let expected = match &reference {
            Reference::Solution(solution) => solution(args.as_slice()),
            Reference::Expected(expected) => expected[i].clone(),
        };

        let record = match function.call(args.as_slice())? {
            Ok(actual) => {
                let passed = values_equal(&actual, &expected);
                TestCaseRecord::comparison(description, actual, Some(expected), passed)
            }
            Err(raised) => {
                TestCaseRecord::comparison(description, Value::String(raised), Some(expected), false)
            }
        };
        records.push(record);
    }

    Ok(records)
}

/// Runs a program-text submission once per stimulus and compares what it prints
///
/// `input()` answers the stimulus rendered as a string. A run that raises
/// produces a failure record instead of a comparison.
pub fn test_input_print<R, S>(
    runner: &R,
    source: &str,
    values: &[Value],
    reference: Reference<S>,
) -> Result<Vec<TestCaseRecord>, RunnerError>
where
    R: ProgramRunner + ?Sized,
    S: Fn(&str) -> String,
{
    reference.ensure_covers(values.len())?;

    let mut records = Vec::with_capacity(values.len());
    for (i, value) in values.iter().enumerate() {
        let stimulus = display_value(value);
        let description = format!("Testing with input: {stimulus}");

        let expected = match &reference {
            Reference::Solution(solution) => solution(&stimulus),
            Reference::Expected(expected) => display_value(&expected[i]),
        };

        let record = match runner.run_program(source, &stimulus)? {
            ProgramOutcome::Output(actual) => {
                let passed = actual == expected;
                TestCaseRecord::comparison(
                    description,
                    Value::String(actual),
                    Some(Value::String(expected)),
                    passed,
                )
            }
            ProgramOutcome::Error(message) => TestCaseRecord::failure_for(description, message),
        };
        records.push(record);
    }

    Ok(records)
}

/// Compares a variable defined by the submission against the expected sequence
///
/// Each expected element is its own case, indexed into the answer the way
/// Python would: lists by element, strings by character. A dict fails every
/// case with the missing key; any other value yields a single failure record.
pub fn test_variable(answer: &Value, expected: &[Value]) -> Vec<TestCaseRecord> {
    let (items, out_of_range) = match answer {
        Value::Array(items) => (items.clone(), "IndexError: list index out of range"),
        Value::String(text) => (
            text.chars().map(|c| Value::String(c.to_string())).collect(),
            "IndexError: string index out of range",
        ),
        Value::Object(_) => (Vec::new(), ""),
        _ => {
            return vec![TestCaseRecord::failure(format!(
                "TypeError: '{}' object is not subscriptable",
                python_type_name(answer)
            ))];
        }
    };

    expected
        .iter()
        .enumerate()
        .map(|(i, want)| {
            let description = format!("This value should equal {}", display_value(want));
            match items.get(i) {
                Some(actual) => TestCaseRecord::comparison(
                    description,
                    actual.clone(),
                    Some(want.clone()),
                    values_equal(actual, want),
                ),
                None if answer.is_object() => {
                    TestCaseRecord::failure_for(description, format!("KeyError: {i}"))
                }
                None => TestCaseRecord::failure_for(description, out_of_range),
            }
        })
        .collect()
}

fn python_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "NoneType",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}
