//! Click endpoint
//!
//! GET /api/click?email=&redirect=&message_id=
//!
//! Appends a click event (no deduplication) and 302-redirects to the target.
//! The redirect happens regardless of logging outcome.

use crate::handlers::pixel::request_attributes;
use crate::models::ClickQuery;
use crate::AppState;
use actix_web::http::header;
use actix_web::{web, HttpRequest, HttpResponse};
use tracing::{debug, error, warn};

pub async fn track_click(
    state: web::Data<AppState>,
    query: web::Query<ClickQuery>,
    req: HttpRequest,
) -> HttpResponse {
    let (user_agent, remote_addr) = request_attributes(&req);
    let attributes = serde_json::json!({
        "redirect": query.redirect.clone(),
        "user_agent": user_agent,
        "remote_addr": remote_addr,
    });

    match state
        .tracker
        .record_click(&query.email, query.message_id.as_deref(), attributes)
        .await
    {
        Ok(event) => debug!(email = %query.email, event_id = %event.id, "click recorded"),
        Err(err) if err.is_transient() => {
            warn!(email = %query.email, error = %err, "click not recorded (transient)")
        }
        Err(err) => error!(email = %query.email, error = %err, "click not recorded"),
    }

    HttpResponse::Found()
        .insert_header((header::LOCATION, query.redirect.clone()))
        .finish()
}
