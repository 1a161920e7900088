//! Delivery outcome endpoint
//!
//! POST /api/delivery
//!
//! The composing collaborator reports whether an outbound message was handed
//! to the provider or bounced. Unlike the pixel and click endpoints there is
//! no content to deliver here, so errors surface to the caller.

use crate::models::DeliveryReport;
use crate::{AppState, Result};
use actix_web::{web, HttpResponse};

pub async fn report_delivery(
    state: web::Data<AppState>,
    payload: web::Json<DeliveryReport>,
) -> Result<HttpResponse> {
    let report = payload.into_inner();
    let attributes = serde_json::json!({"detail": report.detail});

    let event = state
        .tracker
        .record_delivery(
            &report.email,
            report.message_id.as_deref(),
            report.status,
            attributes,
        )
        .await?;

    Ok(HttpResponse::Ok().json(event))
}
