use serde::Serialize;
use serde_json::Value;

use crate::record::TestCaseRecord;

/// Shown when a checker produced no cases at all
pub const EMPTY_RESULT_MESSAGE: &str = "It looks like an error occurred while checking your code.\n\n\
     Please make sure it runs on your own computer.";

/// Final outcome of grading one submission
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Verdict {
    pub overall_correct: bool,
    /// Fraction of passed cases, in `[0, 1]`
    pub score: f64,
    pub report: Report,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Report {
    pub status: ReportStatus,
    pub entries: Vec<ReportEntry>,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportStatus {
    Correct,
    Incorrect,
    Error,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReportEntry {
    Error { message: String },
    Correct(CaseSummary),
    Incorrect(CaseSummary),
}

/// One compared case; details are `None` when answers are hidden
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct CaseSummary {
    pub header: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_output: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_output: Option<Value>,
}

/// Reduces the checker's records to a verdict
///
/// The report keeps the records' order. With `reveal == false` compared cases
/// only show their header and pass/fail state; error messages are always shown.
pub fn aggregate(records: Vec<TestCaseRecord>, reveal: bool) -> Verdict {
    let records = if records.is_empty() {
        log::warn!("Grading produced no test cases");
        vec![TestCaseRecord::failure(EMPTY_RESULT_MESSAGE)]
    } else {
        records
    };

    let total = records.len();
    let passed = records.iter().filter(|r| r.passed()).count();

    let status = if records.iter().any(TestCaseRecord::is_failure) {
        ReportStatus::Error
    } else if passed == total {
        ReportStatus::Correct
    } else {
        ReportStatus::Incorrect
    };

    let entries = records
        .iter()
        .enumerate()
        .map(|(i, record)| summarize(i, record, reveal))
        .collect();

    Verdict {
        overall_correct: passed == total,
        score: passed as f64 / total as f64,
        report: Report { status, entries },
    }
}

fn summarize(index: usize, record: &TestCaseRecord, reveal: bool) -> ReportEntry {
    if let Some(message) = record.error_message() {
        return ReportEntry::Error {
            message: message.to_string(),
        };
    }

    let header = format!("Test Case {}", index + 1);
    let summary = if reveal {
        CaseSummary {
            header,
            description: Some(record.description().to_string()),
            actual_output: record.actual_output().cloned(),
            expected_output: record.expected_output().cloned(),
        }
    } else {
        CaseSummary {
            header,
            description: None,
            actual_output: None,
            expected_output: None,
        }
    };

    if record.passed() {
        ReportEntry::Correct(summary)
    } else {
        ReportEntry::Incorrect(summary)
    }
}
