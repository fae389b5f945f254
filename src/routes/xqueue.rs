use actix_web::{HttpResponse, Responder, web};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::invalid_argument;
use crate::render::render_html;
use crate::supervisor::{GradeRequest, Supervisor};

/// Submission as delivered by an XQueue pull client
///
/// Every nested object arrives as a JSON document embedded in a string.
#[derive(Serialize, Deserialize, Debug)]
pub struct XQueueSubmission {
    pub xqueue_body: String,
}

#[derive(Deserialize)]
struct XQueueBody {
    student_response: String,
    grader_payload: String,
    #[serde(default)]
    student_info: Option<String>,
}

#[derive(Deserialize)]
struct GraderPayload {
    problem_name: String,
    #[serde(default)]
    hide_answer: Option<Value>,
}

#[derive(Deserialize)]
struct StudentInfo {
    #[serde(default = "unknown_student")]
    anonymous_student_id: String,
}

fn unknown_student() -> String {
    "unknown".to_string()
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct XQueueResponse {
    pub correct: bool,
    pub score: f64,
    pub msg: String,
}

impl XQueueSubmission {
    pub fn into_request(self) -> serde_json::Result<GradeRequest> {
        let body: XQueueBody = serde_json::from_str(&self.xqueue_body)?;
        let payload: GraderPayload = serde_json::from_str(&body.grader_payload)?;
        let requester_id = match body.student_info.as_deref() {
            Some(info) => serde_json::from_str::<StudentInfo>(info)?.anonymous_student_id,
            None => unknown_student(),
        };

        Ok(GradeRequest {
            problem_id: payload.problem_name,
            source: body.student_response,
            reveal: !is_hidden(payload.hide_answer.as_ref()),
            requester_id,
        })
    }
}

/// Course authors write `"True"` in grader payloads; booleans are accepted too
fn is_hidden(hide_answer: Option<&Value>) -> bool {
    match hide_answer {
        Some(Value::Bool(hidden)) => *hidden,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

pub async fn xqueue_handler(
    supervisor: web::Data<Supervisor>,
    body: web::Json<XQueueSubmission>,
) -> impl Responder {
    let request = match body.into_inner().into_request() {
        Ok(request) => request,
        Err(e) => {
            log::warn!("Malformed XQueue submission: {e}");
            return invalid_argument();
        }
    };

    let verdict = supervisor.grade(request).await;
    HttpResponse::Ok().json(XQueueResponse {
        correct: verdict.overall_correct,
        score: verdict.score,
        msg: render_html(&verdict.report),
    })
}
