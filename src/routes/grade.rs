use actix_web::{HttpResponse, Responder, post, web};
use serde::Serialize;

use super::invalid_argument;
use crate::aggregate::Verdict;
use crate::render::render_html;
use crate::supervisor::{GradeRequest, Supervisor};

#[derive(Serialize, Debug)]
pub struct GradeResponse {
    #[serde(flatten)]
    pub verdict: Verdict,
    /// The report rendered as HTML
    pub msg: String,
}

#[post("/grade")]
pub async fn grade_handler(
    supervisor: web::Data<Supervisor>,
    body: web::Json<GradeRequest>,
) -> impl Responder {
    if body.problem_id.is_empty() {
        return invalid_argument();
    }

    let verdict = supervisor.grade(body.into_inner()).await;
    let msg = render_html(&verdict.report);
    HttpResponse::Ok().json(GradeResponse { verdict, msg })
}
