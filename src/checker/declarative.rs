use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use super::{CallableCheck, Checker, ProblemError, ProgramTextCheck, missing_function, missing_variable};
use crate::host::{ProgramRunner, Symbols};
use crate::record::TestCaseRecord;
use crate::runner::{Reference, RunnerError, test_function, test_input_print, test_variable};

/// A problem described entirely by data, stored as `<problem_id>.json`
///
/// ```json
/// {"mode": "function", "symbol": "double", "cases": [{"args": [2], "expected": 4}]}
/// {"mode": "variable", "symbol": "answer", "expected": [1, 2, 3]}
/// {"mode": "program", "cases": [{"input": "5", "expected": "10"}]}
/// ```
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ProblemDefinition {
    Function {
        symbol: String,
        cases: Vec<FunctionCase>,
    },
    Variable {
        symbol: String,
        expected: Vec<Value>,
    },
    Program {
        cases: Vec<ProgramCase>,
    },
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct FunctionCase {
    pub args: Vec<Value>,
    pub expected: Value,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct ProgramCase {
    pub input: Value,
    pub expected: Value,
}

impl ProblemDefinition {
    pub fn load(path: &Path) -> Result<Self, ProblemError> {
        let file = std::fs::File::open(path).map_err(|source| ProblemError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let reader = std::io::BufReader::new(file);
        serde_json::from_reader(reader).map_err(|source| ProblemError::Invalid {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn into_checker(self) -> Checker {
        match self {
            Self::Function { symbol, cases } => {
                Checker::Callable(Box::new(DeclaredFunction { symbol, cases }))
            }
            Self::Variable { symbol, expected } => {
                Checker::Callable(Box::new(DeclaredVariable { symbol, expected }))
            }
            Self::Program { cases } => Checker::ProgramText(Box::new(DeclaredProgram { cases })),
        }
    }
}

struct DeclaredFunction {
    symbol: String,
    cases: Vec<FunctionCase>,
}

impl CallableCheck for DeclaredFunction {
    fn check_callable(&self, symbols: &dyn Symbols) -> Result<Vec<TestCaseRecord>, RunnerError> {
        let Some(function) = symbols.function(&self.symbol) else {
            return Ok(vec![missing_function(&self.symbol)]);
        };

        let (values, expected): (Vec<_>, Vec<_>) = self
            .cases
            .iter()
            .map(|case| (case.args.clone(), case.expected.clone()))
            .unzip();

        test_function(
            function.as_ref(),
            &values,
            Reference::<fn(&[Value]) -> Value>::Expected(expected),
        )
    }
}

struct DeclaredVariable {
    symbol: String,
    expected: Vec<Value>,
}

impl CallableCheck for DeclaredVariable {
    fn check_callable(&self, symbols: &dyn Symbols) -> Result<Vec<TestCaseRecord>, RunnerError> {
        match symbols.value(&self.symbol) {
            Some(answer) => Ok(test_variable(&answer, &self.expected)),
            None => Ok(vec![missing_variable(&self.symbol)]),
        }
    }
}

struct DeclaredProgram {
    cases: Vec<ProgramCase>,
}

impl ProgramTextCheck for DeclaredProgram {
    fn check_program_text(
        &self,
        runner: &dyn ProgramRunner,
        source: &str,
    ) -> Result<Vec<TestCaseRecord>, RunnerError> {
        let (values, expected): (Vec<_>, Vec<_>) = self
            .cases
            .iter()
            .map(|case| (case.input.clone(), case.expected.clone()))
            .unzip();

        test_input_print(
            runner,
            source,
            &values,
            Reference::<fn(&str) -> String>::Expected(expected),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HostError, ProgramOutcome};
    use serde_json::json;

    struct Echo;

    impl ProgramRunner for Echo {
        fn run_program(&self, _source: &str, stimulus: &str) -> Result<ProgramOutcome, HostError> {
            Ok(ProgramOutcome::Output(stimulus.to_string()))
        }
    }

    #[test]
    fn test_parse_definitions() {
        let function: ProblemDefinition = serde_json::from_value(json!({
            "mode": "function",
            "symbol": "double",
            "cases": [{"args": [2], "expected": 4}]
        }))
        .unwrap();
        assert_eq!(
            function,
            ProblemDefinition::Function {
                symbol: "double".to_string(),
                cases: vec![FunctionCase {
                    args: vec![json!(2)],
                    expected: json!(4),
                }],
            }
        );

        let bad = serde_json::from_value::<ProblemDefinition>(json!({"mode": "essay"}));
        assert!(bad.is_err());
    }

    #[test]
    fn test_program_definition_compares_printed_text() {
        let definition: ProblemDefinition = serde_json::from_value(json!({
            "mode": "program",
            "cases": [
                {"input": "5", "expected": "5"},
                {"input": 7, "expected": 7},
                {"input": "a", "expected": "b"}
            ]
        }))
        .unwrap();

        let Checker::ProgramText(check) = definition.into_checker() else {
            panic!("expected a program checker");
        };
        let records = check.check_program_text(&Echo, "print(input())").unwrap();
        let passed: Vec<bool> = records.iter().map(TestCaseRecord::passed).collect();
        assert_eq!(passed, vec![true, true, false]);
    }

    #[test]
    fn test_load_reports_invalid_file() {
        let path = std::env::temp_dir().join(format!("grader-invalid-{}.json", std::process::id()));
        std::fs::write(&path, "{not json").unwrap();
        let result = ProblemDefinition::load(&path);
        let _ = std::fs::remove_file(&path);
        assert!(matches!(result, Err(ProblemError::Invalid { .. })));
    }
}
