mod grade;
mod xqueue;

pub use grade::{GradeResponse, grade_handler};
pub use xqueue::{XQueueResponse, XQueueSubmission, xqueue_handler};

use actix_web::error::{InternalError, JsonPayloadError};
use actix_web::{HttpRequest, HttpResponse};
use serde::Serialize;

#[derive(Serialize)]
struct ErrorResponse {
    reason: &'static str,
    code: u32,
}

fn invalid_argument() -> HttpResponse {
    HttpResponse::BadRequest().json(ErrorResponse {
        reason: "ERR_INVALID_ARGUMENT",
        code: 1,
    })
}

pub fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    log::warn!("Rejected request body: {err}");
    InternalError::from_response(err, invalid_argument()).into()
}
