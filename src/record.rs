use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome of a single test case
///
/// A record is either a *comparison* (the case ran and its output was compared
/// against the expected value) or a *failure* (the case could not be evaluated
/// at all). Failures always have `passed == false`.
///
/// The serialized form matches the JSON the worker prints on its stdout:
/// `{"correct", "function", "result", "expected"}` for comparisons and
/// `{"correct": false, "error"}` for failures.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(try_from = "RawRecord")]
pub struct TestCaseRecord {
    #[serde(rename = "correct")]
    passed: bool,
    #[serde(rename = "function", skip_serializing_if = "String::is_empty")]
    description: String,
    #[serde(rename = "result", skip_serializing_if = "Option::is_none")]
    actual_output: Option<Value>,
    #[serde(rename = "expected", skip_serializing_if = "Option::is_none")]
    expected_output: Option<Value>,
    #[serde(rename = "error", skip_serializing_if = "Option::is_none")]
    error_message: Option<String>,
}

impl TestCaseRecord {
    pub fn comparison(
        description: impl Into<String>,
        actual_output: Value,
        expected_output: Option<Value>,
        passed: bool,
    ) -> Self {
        Self {
            passed,
            description: description.into(),
            actual_output: Some(actual_output),
            expected_output,
            error_message: None,
        }
    }

    pub fn failure(error_message: impl Into<String>) -> Self {
        Self {
            passed: false,
            description: String::new(),
            actual_output: None,
            expected_output: None,
            error_message: Some(error_message.into()),
        }
    }

    /// Failure that still remembers which case it belongs to
    pub fn failure_for(description: impl Into<String>, error_message: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Self::failure(error_message)
        }
    }

    pub fn passed(&self) -> bool {
        self.passed
    }

    pub fn is_failure(&self) -> bool {
        self.error_message.is_some()
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn actual_output(&self) -> Option<&Value> {
        self.actual_output.as_ref()
    }

    pub fn expected_output(&self) -> Option<&Value> {
        self.expected_output.as_ref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }
}

#[derive(Deserialize)]
struct RawRecord {
    correct: bool,
    #[serde(default)]
    function: String,
    result: Option<Value>,
    expected: Option<Value>,
    error: Option<String>,
}

impl TryFrom<RawRecord> for TestCaseRecord {
    type Error = String;

    fn try_from(raw: RawRecord) -> Result<Self, Self::Error> {
        match raw.error {
            Some(_) if raw.correct => Err("a failed case cannot be marked correct".to_string()),
            Some(error) => Ok(Self::failure_for(raw.function, error)),
            None => Ok(Self {
                passed: raw.correct,
                description: raw.function,
                actual_output: Some(raw.result.unwrap_or(Value::Null)),
                expected_output: raw.expected,
                error_message: None,
            }),
        }
    }
}

/// What the worker writes to its stdout: one record or a list of them
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum WorkerOutput {
    Many(Vec<TestCaseRecord>),
    One(TestCaseRecord),
}

impl WorkerOutput {
    pub fn into_records(self) -> Vec<TestCaseRecord> {
        match self {
            Self::Many(records) => records,
            Self::One(record) => vec![record],
        }
    }
}

impl From<Vec<TestCaseRecord>> for WorkerOutput {
    fn from(records: Vec<TestCaseRecord>) -> Self {
        Self::Many(records)
    }
}

impl From<TestCaseRecord> for WorkerOutput {
    fn from(record: TestCaseRecord) -> Self {
        Self::One(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_comparison_wire_format() {
        let record = TestCaseRecord::comparison("sum(1, 2)", json!(-1), Some(json!(3)), false);
        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({"correct": false, "function": "sum(1, 2)", "result": -1, "expected": 3})
        );
    }

    #[test]
    fn test_failure_wire_format() {
        let record = TestCaseRecord::failure("function (sum) is not defined.");
        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({"correct": false, "error": "function (sum) is not defined."})
        );
    }

    #[test]
    fn test_bare_record_is_normalized_to_list() {
        let output: WorkerOutput =
            serde_json::from_str(r#"{"correct": false, "error": "boom"}"#).unwrap();
        let records = output.into_records();
        assert_eq!(records.len(), 1);
        assert!(records[0].is_failure());
        assert!(!records[0].passed());
    }

    #[test]
    fn test_correct_failure_is_rejected() {
        let parsed = serde_json::from_str::<WorkerOutput>(r#"{"correct": true, "error": "x"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_list_keeps_order() {
        let output: WorkerOutput = serde_json::from_value(json!([
            {"correct": true, "function": "a", "result": 1, "expected": 1},
            {"correct": false, "error": "b"},
            {"correct": false, "function": "c", "result": 2, "expected": 3},
        ]))
        .unwrap();
        let descriptions: Vec<_> = output
            .into_records()
            .iter()
            .map(|r| r.description().to_string())
            .collect();
        assert_eq!(descriptions, vec!["a", "", "c"]);
    }
}
