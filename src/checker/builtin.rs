use serde_json::{Value, json};

use super::{
    CallableCheck, Checker, ProgramTextCheck, fill_distinct, missing_function, missing_variable,
};
use crate::host::{ProgramRunner, Symbols};
use crate::record::TestCaseRecord;
use crate::runner::{Reference, RunnerError, test_function, test_input_print, test_variable};

const CASE_COUNT: usize = 10;

pub(super) fn checker(problem_id: &str) -> Option<Checker> {
    match problem_id {
        "TEST_000" => Some(Checker::ProgramText(Box::new(SecondsToClock))),
        "TEST_001" => Some(Checker::Callable(Box::new(SumFunction))),
        "TEST_002" => Some(Checker::Callable(Box::new(AnswerVariable))),
        _ => None,
    }
}

/// Reads a number of seconds and prints it as `h:m:s`
struct SecondsToClock;

impl SecondsToClock {
    fn solution(stimulus: &str) -> String {
        let total: i64 = stimulus.trim().parse().unwrap_or_default();
        format!("{}:{}:{}", total / 3600, (total / 60) % 60, total % 60)
    }
}

impl ProgramTextCheck for SecondsToClock {
    fn check_program_text(
        &self,
        runner: &dyn ProgramRunner,
        source: &str,
    ) -> Result<Vec<TestCaseRecord>, RunnerError> {
        let mut rng = fastrand::Rng::new();
        let values = fill_distinct(vec![json!("0"), json!("1")], CASE_COUNT, || {
            json!(rng.u32(0..=86000).to_string())
        });

        test_input_print(runner, source, &values, Reference::Solution(Self::solution))
    }
}

/// Defines `sum(x, y)` returning `x + y`
struct SumFunction;

impl SumFunction {
    fn solution(args: &[Value]) -> Value {
        let x = args.first().and_then(Value::as_i64).unwrap_or_default();
        let y = args.get(1).and_then(Value::as_i64).unwrap_or_default();
        json!(x + y)
    }
}

impl CallableCheck for SumFunction {
    fn check_callable(&self, symbols: &dyn Symbols) -> Result<Vec<TestCaseRecord>, RunnerError> {
        let Some(function) = symbols.function("sum") else {
            return Ok(vec![missing_function("sum")]);
        };

        let edge_cases: Vec<Vec<Value>> = [(0, 0), (0, 1), (1, 0), (-1, 0), (0, -2)]
            .iter()
            .map(|&(x, y)| vec![json!(x), json!(y)])
            .collect();
        let mut rng = fastrand::Rng::new();
        let values = fill_distinct(edge_cases, CASE_COUNT, || {
            vec![json!(rng.i64(-1000..=1001)), json!(rng.i64(-1000..=1001))]
        });

        test_function(function.as_ref(), &values, Reference::Solution(Self::solution))
    }
}

/// Stores `[1, 2, 3, 4, 5]` in a variable named `answer`
struct AnswerVariable;

impl CallableCheck for AnswerVariable {
    fn check_callable(&self, symbols: &dyn Symbols) -> Result<Vec<TestCaseRecord>, RunnerError> {
        let Some(answer) = symbols.value("answer") else {
            return Ok(vec![missing_variable("answer")]);
        };

        let expected: Vec<Value> = (1..=5).map(|n| json!(n)).collect();
        Ok(test_variable(&answer, &expected))
    }
}
