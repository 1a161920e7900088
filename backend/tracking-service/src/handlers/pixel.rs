//! Pixel/image endpoint
//!
//! GET /api/img?email=&image=&message_id=
//!
//! Records an open (deduplicated against the trailing window) and serves the
//! requested image, a proxied remote image, or the 1x1 pixel. Logging is
//! strictly best-effort here: tracking must never block content delivery, so
//! a storage failure is reported to the operator via logs while the recipient
//! still gets bytes.

use crate::models::PixelQuery;
use crate::services::image_store::TRACKING_PIXEL_GIF;
use crate::services::ServedImage;
use crate::AppState;
use actix_web::http::header;
use actix_web::{web, HttpRequest, HttpResponse};
use tracing::{debug, error, warn};

pub(crate) fn request_attributes(req: &HttpRequest) -> (Option<String>, Option<String>) {
    let user_agent = req
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    let remote_addr = req
        .connection_info()
        .realip_remote_addr()
        .map(String::from);
    (user_agent, remote_addr)
}

fn tracked_response(content_type: &str, bytes: Vec<u8>) -> HttpResponse {
    HttpResponse::Ok()
        .content_type(content_type)
        .insert_header((header::CACHE_CONTROL, "no-cache, no-store, must-revalidate"))
        .insert_header((header::PRAGMA, "no-cache"))
        .insert_header((header::EXPIRES, "0"))
        .insert_header((header::CONTENT_DISPOSITION, "inline"))
        .body(bytes)
}

pub async fn track_pixel(
    state: web::Data<AppState>,
    query: web::Query<PixelQuery>,
    req: HttpRequest,
) -> HttpResponse {
    let (user_agent, remote_addr) = request_attributes(&req);
    let attributes = serde_json::json!({
        "image_param": query.image.clone(),
        "user_agent": user_agent,
        "remote_addr": remote_addr,
    });

    match state
        .tracker
        .record_open(&query.email, query.message_id.as_deref(), attributes)
        .await
    {
        Ok(decision) => debug!(
            email = %query.email,
            message_id = ?query.message_id,
            recorded = decision.is_recorded(),
            "pixel fetch processed"
        ),
        Err(err) if err.is_transient() => {
            warn!(email = %query.email, error = %err, "open not recorded (transient)")
        }
        Err(err) => error!(email = %query.email, error = %err, "open not recorded"),
    }

    match state.images.resolve(query.image.as_deref()).await {
        ServedImage::Local {
            bytes,
            content_type,
            filename,
        } => {
            let attrs = serde_json::json!({"served": "local", "filename": filename});
            if let Err(err) = state
                .tracker
                .record_image_serve(&query.email, query.message_id.as_deref(), attrs)
                .await
            {
                error!(email = %query.email, error = %err, "image serve not recorded");
            }
            tracked_response(&content_type, bytes)
        }
        ServedImage::Remote {
            bytes,
            content_type,
            url,
        } => {
            let attrs = serde_json::json!({"served": "remote", "url": url});
            if let Err(err) = state
                .tracker
                .record_image_serve(&query.email, query.message_id.as_deref(), attrs)
                .await
            {
                error!(email = %query.email, error = %err, "image serve not recorded");
            }
            tracked_response(&content_type, bytes)
        }
        ServedImage::Pixel => tracked_response("image/gif", TRACKING_PIXEL_GIF.to_vec()),
    }
}
