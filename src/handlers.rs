use actix_web::{error, get, post, web, HttpRequest, HttpResponse, Responder};

use crate::error::ServiceError;
use crate::models::{ApiResponse, SubmitScoreRequest};
use crate::pipeline::ScoreService;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error_handler))
        // Health
        .service(health_check)
        // Scores
        .service(submit_score_request)
        .service(poll_score_status)
        .service(get_score_results)
        .service(get_score_by_token);
}

/// Bodies that fail to deserialize get the same envelope as validation errors.
fn json_error_handler(err: error::JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    let response =
        HttpResponse::BadRequest().json(ApiResponse::<()>::error(format!("Invalid request body: {err}")));
    error::InternalError::from_response(err, response).into()
}

fn error_response(err: ServiceError, action: &str) -> HttpResponse {
    match err {
        ServiceError::NotFound(message) => {
            HttpResponse::NotFound().json(ApiResponse::<()>::error(message))
        }
        ServiceError::Validation(errors) => HttpResponse::BadRequest()
            .json(ApiResponse::<()>::error(format!("Validation failed: {}", errors))),
        ServiceError::StillProcessing(status) => HttpResponse::Conflict()
            .json(ApiResponse::error_with(status, "Score still processing".into())),
        other => {
            log::error!("Failed to {action}: {other:?}");
            HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error(format!("Failed to {action}")))
        }
    }
}

// ============================================================================
// HEALTH CHECK
// ============================================================================

#[get("/health")]
pub async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "service": "visibility-score-service",
        "timestamp": chrono::Utc::now()
    }))
}

// ============================================================================
// SCORES
// ============================================================================

/// Inbound lead form. Responds as soon as the reports exist; scoring runs
/// in the background.
#[post("/scores")]
pub async fn submit_score_request(
    scores: web::Data<ScoreService>,
    payload: web::Json<SubmitScoreRequest>,
) -> impl Responder {
    match scores.submit(payload.into_inner()).await {
        Ok(submission) => HttpResponse::Created().json(ApiResponse::success(submission.response)),
        Err(err) => error_response(err, "submit score request"),
    }
}

#[get("/scores/{token}")]
pub async fn get_score_by_token(
    scores: web::Data<ScoreService>,
    token: web::Path<String>,
) -> impl Responder {
    match scores.get_by_token(&token).await {
        Ok(lookup) => HttpResponse::Ok().json(ApiResponse::success(lookup)),
        Err(err) => error_response(err, "fetch score"),
    }
}

#[get("/scores/{token}/status")]
pub async fn poll_score_status(
    scores: web::Data<ScoreService>,
    token: web::Path<String>,
) -> impl Responder {
    match scores.poll_status(&token).await {
        Ok(status) => HttpResponse::Ok().json(ApiResponse::success(status)),
        Err(err) => error_response(err, "poll score status"),
    }
}

#[get("/scores/{token}/results")]
pub async fn get_score_results(
    scores: web::Data<ScoreService>,
    token: web::Path<String>,
) -> impl Responder {
    match scores.results(&token).await {
        Ok(results) => HttpResponse::Ok().json(ApiResponse::success(results)),
        Err(err) => error_response(err, "load score results"),
    }
}
