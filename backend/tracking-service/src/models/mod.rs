use event_log::{Event, EventKind};
use serde::{Deserialize, Serialize};

/// Query parameters for the pixel/image endpoint
#[derive(Debug, Deserialize)]
pub struct PixelQuery {
    pub email: String,
    /// Local filename or remote http(s) URL of the image to serve
    pub image: Option<String>,
    pub message_id: Option<String>,
}

/// Query parameters for the click endpoint
#[derive(Debug, Deserialize)]
pub struct ClickQuery {
    pub email: String,
    pub redirect: String,
    pub message_id: Option<String>,
}

/// Send outcome reported by the composing collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryReport {
    pub email: String,
    pub message_id: Option<String>,
    pub status: DeliveryStatus,
    /// Provider-specific detail (bounce reason, provider message id, …)
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Sent,
    NotDelivered,
}

impl From<DeliveryStatus> for EventKind {
    fn from(status: DeliveryStatus) -> Self {
        match status {
            DeliveryStatus::Sent => EventKind::Sent,
            DeliveryStatus::NotDelivered => EventKind::NotDelivered,
        }
    }
}

/// Query parameters for the by-email report
#[derive(Debug, Deserialize)]
pub struct ByEmailQuery {
    pub email: String,
}

/// Query parameters for the latest-events report
#[derive(Debug, Deserialize)]
pub struct LatestQuery {
    pub n: Option<usize>,
}

/// Engagement history for one recipient, most-recent-first
#[derive(Debug, Serialize)]
pub struct EmailActivity {
    pub opens: Vec<Event>,
    pub clicks: Vec<Event>,
    pub img_reads: Vec<Event>,
}

/// Most-recent-N events across all recipients
#[derive(Debug, Serialize)]
pub struct LatestEvents {
    pub events: Vec<Event>,
}
