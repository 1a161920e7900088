//! Engagement recording and reporting over the event log
//!
//! Thin domain layer between the HTTP handlers and the [`EventLog`]: opens go
//! through the deduplicator, everything else appends directly.

use crate::models::{DeliveryStatus, EmailActivity};
use event_log::{Event, EventDraft, EventFilter, EventKind, EventLog, EventLogResult};
use open_dedup::{Decision, OpenDeduplicator};
use std::sync::Arc;
use std::time::Duration;

/// Default cap for the latest-events report
pub const DEFAULT_LATEST_LIMIT: usize = 200;

pub struct TrackingService {
    log: Arc<dyn EventLog>,
    dedup: OpenDeduplicator,
}

impl TrackingService {
    pub fn new(log: Arc<dyn EventLog>, dedup_window: Duration) -> Self {
        Self {
            dedup: OpenDeduplicator::new(log.clone(), dedup_window),
            log,
        }
    }

    /// Record a pixel fetch, deduplicated against the trailing window
    pub async fn record_open(
        &self,
        email: &str,
        message_id: Option<&str>,
        attributes: serde_json::Value,
    ) -> EventLogResult<Decision> {
        self.dedup.record_open(email, message_id, attributes).await
    }

    /// Record a link click. Clicks bypass deduplication and always append.
    pub async fn record_click(
        &self,
        email: &str,
        message_id: Option<&str>,
        attributes: serde_json::Value,
    ) -> EventLogResult<Event> {
        self.log
            .append(
                EventDraft::new(EventKind::Click, email)
                    .with_correlation_id_opt(message_id.map(String::from))
                    .with_attributes(attributes),
            )
            .await
    }

    /// Record that an inline image was actually served
    pub async fn record_image_serve(
        &self,
        email: &str,
        message_id: Option<&str>,
        attributes: serde_json::Value,
    ) -> EventLogResult<Event> {
        self.log
            .append(
                EventDraft::new(EventKind::ImageServe, email)
                    .with_correlation_id_opt(message_id.map(String::from))
                    .with_attributes(attributes),
            )
            .await
    }

    /// Record a send outcome reported by the composing collaborator
    pub async fn record_delivery(
        &self,
        email: &str,
        message_id: Option<&str>,
        status: DeliveryStatus,
        attributes: serde_json::Value,
    ) -> EventLogResult<Event> {
        self.log
            .append(
                EventDraft::new(status.into(), email)
                    .with_correlation_id_opt(message_id.map(String::from))
                    .with_attributes(attributes),
            )
            .await
    }

    /// Full engagement history for one recipient, grouped by kind
    pub async fn activity_for(&self, email: &str) -> EventLogResult<EmailActivity> {
        let opens = self
            .log
            .query(&EventFilter::new().kind(EventKind::Open).identity(email))
            .await?;
        let clicks = self
            .log
            .query(&EventFilter::new().kind(EventKind::Click).identity(email))
            .await?;
        let img_reads = self
            .log
            .query(
                &EventFilter::new()
                    .kind(EventKind::ImageServe)
                    .identity(email),
            )
            .await?;

        Ok(EmailActivity {
            opens,
            clicks,
            img_reads,
        })
    }

    /// Most-recent-N events across all recipients
    pub async fn latest(&self, limit: Option<usize>) -> EventLogResult<Vec<Event>> {
        self.log
            .query(&EventFilter::new().limit(limit.unwrap_or(DEFAULT_LATEST_LIMIT)))
            .await
    }

    /// The whole log, most-recent-first (bulk export)
    pub async fn export(&self) -> EventLogResult<Vec<Event>> {
        self.log.query(&EventFilter::new()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use event_log::MemoryEventLog;

    fn service() -> (Arc<MemoryEventLog>, TrackingService) {
        let log = Arc::new(MemoryEventLog::new());
        let tracker = TrackingService::new(log.clone(), Duration::from_secs(600));
        (log, tracker)
    }

    #[tokio::test]
    async fn test_opens_are_deduplicated_clicks_are_not() {
        let (log, tracker) = service();

        assert!(tracker
            .record_open("a@x.com", Some("m1"), serde_json::json!({}))
            .await
            .unwrap()
            .is_recorded());
        assert!(tracker
            .record_open("a@x.com", Some("m1"), serde_json::json!({}))
            .await
            .unwrap()
            .is_suppressed());

        tracker
            .record_click("a@x.com", Some("m1"), serde_json::json!({}))
            .await
            .unwrap();
        tracker
            .record_click("a@x.com", Some("m1"), serde_json::json!({}))
            .await
            .unwrap();

        assert_eq!(log.len(), 3);
    }

    #[tokio::test]
    async fn test_activity_groups_by_kind() {
        let (_log, tracker) = service();

        tracker
            .record_open("a@x.com", None, serde_json::json!({}))
            .await
            .unwrap();
        tracker
            .record_click("a@x.com", None, serde_json::json!({"redirect": "https://x.com"}))
            .await
            .unwrap();
        tracker
            .record_image_serve("a@x.com", None, serde_json::json!({"served": "local"}))
            .await
            .unwrap();
        tracker
            .record_click("b@x.com", None, serde_json::json!({}))
            .await
            .unwrap();

        let activity = tracker.activity_for("a@x.com").await.unwrap();
        assert_eq!(activity.opens.len(), 1);
        assert_eq!(activity.clicks.len(), 1);
        assert_eq!(activity.img_reads.len(), 1);
    }

    #[tokio::test]
    async fn test_latest_defaults_to_200() {
        let (_log, tracker) = service();

        for i in 0..210 {
            tracker
                .record_click(&format!("u{}@x.com", i), None, serde_json::json!({}))
                .await
                .unwrap();
        }

        assert_eq!(tracker.latest(None).await.unwrap().len(), 200);
        assert_eq!(tracker.latest(Some(5)).await.unwrap().len(), 5);
        assert_eq!(tracker.export().await.unwrap().len(), 210);
    }

    #[tokio::test]
    async fn test_delivery_outcomes_append() {
        let (log, tracker) = service();

        tracker
            .record_delivery("a@x.com", Some("m1"), DeliveryStatus::Sent, serde_json::json!({}))
            .await
            .unwrap();
        tracker
            .record_delivery(
                "a@x.com",
                Some("m1"),
                DeliveryStatus::NotDelivered,
                serde_json::json!({"detail": "mailbox full"}),
            )
            .await
            .unwrap();

        assert_eq!(log.len(), 2);
        let sent = log
            .query(&EventFilter::new().kind(EventKind::Sent))
            .await
            .unwrap();
        assert_eq!(sent.len(), 1);
    }
}
