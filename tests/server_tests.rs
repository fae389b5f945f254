use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};

use actix_web::{App, test, web};
use assert_json_diff::assert_json_include;
use serde_json::{Value, json};

use grader::config::{GraderConfig, PROBLEM_PLACEHOLDER, SOURCE_PLACEHOLDER};
use grader::routes::XQueueResponse;
use grader::supervisor::Supervisor;
use grader::web_server::routes;

static TEST_DIR_COUNTER: AtomicU32 = AtomicU32::new(0);

// Staging directory guard, removed once the test is done
struct StagingDir(PathBuf);

impl StagingDir {
    fn new() -> Self {
        let id = TEST_DIR_COUNTER.fetch_add(1, Ordering::SeqCst);
        Self(std::env::temp_dir().join(format!("grader-server-tests-{}-{id}", std::process::id())))
    }
}

impl Drop for StagingDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

/// A worker that echoes the submission back, so tests choose the records by
/// choosing the source
fn echo_supervisor(staging: &StagingDir) -> Supervisor {
    let config = GraderConfig {
        timeout_secs: 10,
        staging_dir: Some(staging.0.clone()),
        worker_command: Some(vec![
            "sh".to_string(),
            "-c".to_string(),
            r#"cat "$0""#.to_string(),
            SOURCE_PLACEHOLDER.to_string(),
            PROBLEM_PLACEHOLDER.to_string(),
        ]),
        ..GraderConfig::default()
    };
    Supervisor::new(&config).unwrap()
}

fn records() -> Value {
    json!([
        {"correct": true, "function": "sum(0, 0)", "result": 0, "expected": 0},
        {"correct": false, "function": "sum(1, 2)", "result": -1, "expected": 3},
    ])
}

fn xqueue_body(source: &str, hide_answer: &str) -> Value {
    let inner = json!({
        "student_response": source,
        "grader_payload": json!({"problem_name": "TEST_001", "hide_answer": hide_answer}).to_string(),
        "student_info": json!({"anonymous_student_id": "student-1"}).to_string(),
    });
    json!({"xqueue_body": inner.to_string()})
}

#[actix_web::test]
async fn test_grade_endpoint_returns_verdict() {
    let staging = StagingDir::new();
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(echo_supervisor(&staging)))
            .configure(routes),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/grade")
        .set_json(json!({"problem_id": "TEST_001", "source": records().to_string()}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let body: Value = test::read_body_json(resp).await;
    assert_json_include!(
        actual: body.clone(),
        expected: json!({
            "overall_correct": false,
            "score": 0.5,
            "report": {
                "status": "INCORRECT",
                "entries": [
                    {"kind": "correct", "header": "Test Case 1", "description": "sum(0, 0)"},
                    {"kind": "incorrect", "header": "Test Case 2", "description": "sum(1, 2)",
                     "actual_output": -1, "expected_output": 3},
                ]
            }
        })
    );
    assert!(body["msg"].as_str().unwrap().contains("Correct output:"));
    assert_eq!(std::fs::read_dir(&staging.0).unwrap().count(), 0);
}

#[actix_web::test]
async fn test_grade_endpoint_hides_answers() {
    let staging = StagingDir::new();
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(echo_supervisor(&staging)))
            .configure(routes),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/grade")
        .set_json(json!({
            "problem_id": "TEST_001",
            "source": records().to_string(),
            "reveal": false,
            "requester_id": "student-2",
        }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(
        body["report"]["entries"],
        json!([
            {"kind": "correct", "header": "Test Case 1"},
            {"kind": "incorrect", "header": "Test Case 2"},
        ])
    );
    assert!(!body["msg"].as_str().unwrap().contains("sum(1, 2)"));
}

#[actix_web::test]
async fn test_xqueue_endpoints() {
    let staging = StagingDir::new();
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(echo_supervisor(&staging)))
            .configure(routes),
    )
    .await;

    for uri in ["/", "/xqueue"] {
        let req = test::TestRequest::post()
            .uri(uri)
            .set_json(xqueue_body(&records().to_string(), "False"))
            .to_request();
        let body: XQueueResponse = test::call_and_read_body_json(&app, req).await;

        assert!(!body.correct);
        assert_eq!(body.score, 0.5);
        assert!(body.msg.contains("<div class=\"shortform\">INCORRECT"));
        assert!(body.msg.contains("sum(1, 2)"));
    }

    let req = test::TestRequest::post()
        .uri("/xqueue")
        .set_json(xqueue_body(&records().to_string(), "True"))
        .to_request();
    let body: XQueueResponse = test::call_and_read_body_json(&app, req).await;
    assert!(!body.msg.contains("sum(1, 2)"));
}

#[actix_web::test]
async fn test_xqueue_without_content_type() {
    let staging = StagingDir::new();
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(echo_supervisor(&staging)))
            .configure(routes),
    )
    .await;

    let source = json!({"correct": true, "function": "sum(0, 0)", "result": 0, "expected": 0});
    let req = test::TestRequest::post()
        .uri("/")
        .set_payload(xqueue_body(&source.to_string(), "False").to_string())
        .to_request();
    let body: XQueueResponse = test::call_and_read_body_json(&app, req).await;
    assert!(body.correct);
    assert_eq!(body.score, 1.0);
}

#[actix_web::test]
async fn test_malformed_worker_output_is_graded() {
    let staging = StagingDir::new();
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(echo_supervisor(&staging)))
            .configure(routes),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/grade")
        .set_json(json!({"problem_id": "TEST_001", "source": "def sum(x, y): return x + y"}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["overall_correct"], json!(false));
    assert_eq!(body["score"], json!(0.0));
    assert_eq!(
        body["report"]["entries"],
        json!([{"kind": "error", "message": "Could not evaluate your code, check your syntax."}])
    );
}

#[actix_web::test]
async fn test_invalid_requests() {
    let staging = StagingDir::new();
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(echo_supervisor(&staging)))
            .configure(routes),
    )
    .await;

    let cases = [
        ("/grade", json!({"source": "x"}).to_string()),
        ("/grade", json!({"problem_id": "", "source": "x"}).to_string()),
        ("/grade", "{not json".to_string()),
        ("/xqueue", json!({"xqueue_body": "not json"}).to_string()),
        ("/", json!({"something": "else"}).to_string()),
    ];

    for (uri, payload) in cases {
        let req = test::TestRequest::post()
            .uri(uri)
            .insert_header(("content-type", "application/json"))
            .set_payload(payload)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status().as_u16(), 400, "{uri}");

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body, json!({"reason": "ERR_INVALID_ARGUMENT", "code": 1}));
    }
}
