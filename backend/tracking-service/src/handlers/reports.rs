//! Reporting endpoints for the dashboard collaborator
//!
//! GET /tracking/by_email — engagement history for one recipient
//! GET /tracking/latest — most-recent-N events (default 200)
//! GET /tracking/export — the whole log as newline-delimited JSON

use crate::models::{ByEmailQuery, LatestEvents, LatestQuery};
use crate::{AppError, AppState, Result};
use actix_web::{web, HttpResponse};

pub async fn by_email(
    state: web::Data<AppState>,
    query: web::Query<ByEmailQuery>,
) -> Result<HttpResponse> {
    let activity = state.tracker.activity_for(&query.email).await?;
    Ok(HttpResponse::Ok().json(activity))
}

pub async fn latest(
    state: web::Data<AppState>,
    query: web::Query<LatestQuery>,
) -> Result<HttpResponse> {
    let events = state.tracker.latest(query.n).await?;
    Ok(HttpResponse::Ok().json(LatestEvents { events }))
}

pub async fn export(state: web::Data<AppState>) -> Result<HttpResponse> {
    let events = state.tracker.export().await?;

    let mut body = String::new();
    for event in &events {
        let line = serde_json::to_string(event)
            .map_err(|e| AppError::InternalError(format!("Failed to serialize event: {}", e)))?;
        body.push_str(&line);
        body.push('\n');
    }

    Ok(HttpResponse::Ok()
        .content_type("application/x-ndjson")
        .body(body))
}
