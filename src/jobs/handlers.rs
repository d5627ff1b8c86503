use actix_web::{web, HttpRequest, HttpResponse};
use tracing::{info, warn};

use crate::error::{AppError, AuthError};
use crate::jobs::{run_job, JobKind};
use crate::AppState;

/// Checks the bearer token when a trigger token is configured.
fn authorize(req: &HttpRequest, expected: Option<&str>) -> Result<(), AppError> {
    let Some(expected) = expected else {
        return Ok(());
    };

    let token = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or(AuthError::MissingToken)?;

    if token != expected {
        return Err(AuthError::InvalidToken.into());
    }
    Ok(())
}

pub async fn list_jobs(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.jobs.snapshot().await)
}

pub async fn trigger_job(
    req: HttpRequest,
    name: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    if let Err(e) = authorize(&req, state.config.jobs.trigger_token.as_deref()) {
        warn!("Rejected manual trigger of {}: {}", name, e);
        return Err(e);
    }

    let kind: JobKind = name.parse()?;
    info!("Manual trigger of {}", kind);

    let report = run_job(&state, kind).await?;
    Ok(HttpResponse::Ok().json(report))
}
