//! HTTP-level tests for the tracking endpoints
//!
//! These tests verify:
//! 1. The pixel endpoint serves bytes even when logging cannot happen
//! 2. Opens are deduplicated across fetches; clicks never are
//! 3. Image serving logs an image_serve event alongside the open
//! 4. Reporting endpoints group and cap results as the dashboard expects
//!
//! Everything runs against the in-process event log; no external services.

use actix_web::http::header;
use actix_web::{test, web, App};
use event_log::{EventFilter, EventKind, EventLog, MemoryEventLog};
use std::sync::Arc;
use std::time::Duration;
use tracking_service::{handlers, AppState, ImageStore, TrackingService};

fn state_with(
    log: Arc<MemoryEventLog>,
    upload_dir: &std::path::Path,
) -> web::Data<AppState> {
    web::Data::new(AppState {
        tracker: TrackingService::new(log, Duration::from_secs(600)),
        images: ImageStore::new(upload_dir),
    })
}

macro_rules! test_app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data($state.clone())
                .configure(handlers::register_routes),
        )
        .await
    };
}

#[actix_web::test]
async fn test_pixel_serves_gif_and_records_one_open() {
    let log = Arc::new(MemoryEventLog::new());
    let dir = tempfile::tempdir().unwrap();
    let app = test_app!(state_with(log.clone(), dir.path()));

    for _ in 0..2 {
        let req = test::TestRequest::get()
            .uri("/api/img?email=a%40x.com&message_id=m1")
            .insert_header((header::USER_AGENT, "test-agent"))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert!(resp.status().is_success());
        assert_eq!(
            resp.headers().get(header::CACHE_CONTROL).unwrap(),
            "no-cache, no-store, must-revalidate"
        );
        let body = test::read_body(resp).await;
        assert_eq!(&body[..6], b"GIF89a");
    }

    // Two fetches, one logical open
    let opens = log
        .query(&EventFilter::new().kind(EventKind::Open))
        .await
        .unwrap();
    assert_eq!(opens.len(), 1);
    assert_eq!(opens[0].identity, "a@x.com");
    assert_eq!(opens[0].correlation_id.as_deref(), Some("m1"));
    assert_eq!(opens[0].attributes["user_agent"], "test-agent");
}

#[actix_web::test]
async fn test_pixel_serves_local_image_and_records_serve() {
    let log = Arc::new(MemoryEventLog::new());
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("sig.jpeg"), b"jpeg-bytes").unwrap();
    let app = test_app!(state_with(log.clone(), dir.path()));

    let req = test::TestRequest::get()
        .uri("/api/img?email=a%40x.com&message_id=m1&image=sig.jpeg")
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert!(resp.status().is_success());
    assert_eq!(
        resp.headers().get(header::CONTENT_TYPE).unwrap(),
        "image/jpeg"
    );
    assert_eq!(test::read_body(resp).await.as_ref(), b"jpeg-bytes");

    let serves = log
        .query(&EventFilter::new().kind(EventKind::ImageServe))
        .await
        .unwrap();
    assert_eq!(serves.len(), 1);
    assert_eq!(serves[0].attributes["served"], "local");
    assert_eq!(serves[0].attributes["filename"], "sig.jpeg");
}

#[actix_web::test]
async fn test_pixel_with_empty_email_still_serves() {
    let log = Arc::new(MemoryEventLog::new());
    let dir = tempfile::tempdir().unwrap();
    let app = test_app!(state_with(log.clone(), dir.path()));

    let req = test::TestRequest::get()
        .uri("/api/img?email=")
        .to_request();
    let resp = test::call_service(&app, req).await;

    // Tracking failed (invalid identity) but the recipient still gets bytes
    assert!(resp.status().is_success());
    let body = test::read_body(resp).await;
    assert_eq!(&body[..6], b"GIF89a");
    assert!(log.is_empty());
}

#[actix_web::test]
async fn test_click_redirects_and_always_appends() {
    let log = Arc::new(MemoryEventLog::new());
    let dir = tempfile::tempdir().unwrap();
    let app = test_app!(state_with(log.clone(), dir.path()));

    for _ in 0..2 {
        let req = test::TestRequest::get()
            .uri("/api/click?email=a%40x.com&redirect=https%3A%2F%2Fexample.com&message_id=m1")
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status().as_u16(), 302);
        assert_eq!(
            resp.headers().get(header::LOCATION).unwrap(),
            "https://example.com"
        );
    }

    // Clicks bypass deduplication
    let clicks = log
        .query(&EventFilter::new().kind(EventKind::Click))
        .await
        .unwrap();
    assert_eq!(clicks.len(), 2);
    assert_eq!(clicks[0].attributes["redirect"], "https://example.com");
}

#[actix_web::test]
async fn test_delivery_report_round_trip() {
    let log = Arc::new(MemoryEventLog::new());
    let dir = tempfile::tempdir().unwrap();
    let app = test_app!(state_with(log.clone(), dir.path()));

    let req = test::TestRequest::post()
        .uri("/api/delivery")
        .set_json(serde_json::json!({
            "email": "a@x.com",
            "message_id": "m1",
            "status": "not_delivered",
            "detail": "mailbox full"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let events = log
        .query(&EventFilter::new().kind(EventKind::NotDelivered))
        .await
        .unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].attributes["detail"], "mailbox full");
}

#[actix_web::test]
async fn test_delivery_report_rejects_empty_email() {
    let log = Arc::new(MemoryEventLog::new());
    let dir = tempfile::tempdir().unwrap();
    let app = test_app!(state_with(log, dir.path()));

    let req = test::TestRequest::post()
        .uri("/api/delivery")
        .set_json(serde_json::json!({"email": "", "status": "sent"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 400);
}

#[actix_web::test]
async fn test_by_email_groups_activity() {
    let log = Arc::new(MemoryEventLog::new());
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("logo.png"), b"png-bytes").unwrap();
    let app = test_app!(state_with(log, dir.path()));

    let pixel = test::TestRequest::get()
        .uri("/api/img?email=a%40x.com&image=logo.png")
        .to_request();
    test::call_service(&app, pixel).await;

    let click = test::TestRequest::get()
        .uri("/api/click?email=a%40x.com&redirect=https%3A%2F%2Fexample.com")
        .to_request();
    test::call_service(&app, click).await;

    let req = test::TestRequest::get()
        .uri("/tracking/by_email?email=a%40x.com")
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["opens"].as_array().unwrap().len(), 1);
    assert_eq!(body["clicks"].as_array().unwrap().len(), 1);
    assert_eq!(body["img_reads"].as_array().unwrap().len(), 1);

    // Another identity sees nothing
    let req = test::TestRequest::get()
        .uri("/tracking/by_email?email=b%40x.com")
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["opens"].as_array().unwrap().len(), 0);
}

#[actix_web::test]
async fn test_latest_caps_results_most_recent_first() {
    let log = Arc::new(MemoryEventLog::new());
    let dir = tempfile::tempdir().unwrap();
    let app = test_app!(state_with(log, dir.path()));

    for i in 0..5 {
        let req = test::TestRequest::get()
            .uri(&format!(
                "/api/click?email=u{}%40x.com&redirect=https%3A%2F%2Fexample.com",
                i
            ))
            .to_request();
        test::call_service(&app, req).await;
    }

    let req = test::TestRequest::get()
        .uri("/tracking/latest?n=3")
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

    let events = body["events"].as_array().unwrap();
    assert_eq!(events.len(), 3);
    assert_eq!(events[0]["identity"], "u4@x.com");
}

#[actix_web::test]
async fn test_export_is_newline_delimited_json() {
    let log = Arc::new(MemoryEventLog::new());
    let dir = tempfile::tempdir().unwrap();
    let app = test_app!(state_with(log, dir.path()));

    for i in 0..3 {
        let req = test::TestRequest::get()
            .uri(&format!("/api/img?email=u{}%40x.com", i))
            .to_request();
        test::call_service(&app, req).await;
    }

    let req = test::TestRequest::get().uri("/tracking/export").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(
        resp.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/x-ndjson"
    );

    let body = test::read_body(resp).await;
    let lines: Vec<_> = std::str::from_utf8(&body)
        .unwrap()
        .lines()
        .filter(|l| !l.is_empty())
        .collect();
    assert_eq!(lines.len(), 3);
    for line in lines {
        let event: serde_json::Value = serde_json::from_str(line).unwrap();
        assert_eq!(event["kind"], "open");
    }
}
