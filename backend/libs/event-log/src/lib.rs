//! # Append-Only Engagement Event Log
//!
//! Ordered, append-only storage for email engagement events (opens, clicks,
//! image fetches, send outcomes) with point queries by identity and recency.
//!
//! The log owns every event it stores: timestamps are assigned at append time
//! from the server clock, and once appended an event is immutable — no update,
//! no delete, no reordering. Two interchangeable backends implement the same
//! [`EventLog`] contract:
//!
//! - [`MemoryEventLog`] — in-process ordered store for tests and single-node use
//! - [`PostgresEventLog`] — durable store backed by a `tracking_events` table
//!
//! ## Usage
//!
//! ```ignore
//! use event_log::{EventDraft, EventFilter, EventKind, EventLog, MemoryEventLog};
//!
//! # async fn example() -> Result<(), event_log::EventLogError> {
//! let log = MemoryEventLog::new();
//!
//! let event = log
//!     .append(
//!         EventDraft::new(EventKind::Click, "a@example.com")
//!             .with_correlation_id("mid-001")
//!             .with_attributes(serde_json::json!({"redirect": "https://example.com"})),
//!     )
//!     .await?;
//!
//! let recent = log
//!     .query(&EventFilter::new().kind(EventKind::Click).limit(200))
//!     .await?;
//! assert_eq!(recent[0].id, event.id);
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

mod error;
mod memory;
mod postgres;

pub use error::{EventLogError, EventLogResult};
pub use memory::MemoryEventLog;
pub use postgres::PostgresEventLog;

/// Maximum length accepted for identity and correlation id values.
/// Matches the VARCHAR(255) columns of the Postgres backend.
const MAX_FIELD_LEN: usize = 255;

/// Kind of engagement event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Tracking pixel fetched — proxy for "recipient viewed the message"
    Open,
    /// Tracked link followed
    Click,
    /// An inline image was actually served (local file or remote proxy)
    ImageServe,
    /// Outbound message handed to the mail provider
    Sent,
    /// Outbound message bounced or was rejected
    NotDelivered,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Click => write!(f, "click"),
            Self::ImageServe => write!(f, "image_serve"),
            Self::Sent => write!(f, "sent"),
            Self::NotDelivered => write!(f, "not_delivered"),
        }
    }
}

impl std::str::FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(Self::Open),
            "click" => Ok(Self::Click),
            "image_serve" => Ok(Self::ImageServe),
            "sent" => Ok(Self::Sent),
            "not_delivered" => Ok(Self::NotDelivered),
            _ => Err(format!("Invalid event kind: {}", s)),
        }
    }
}

/// A stored engagement event. Immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Unique identifier for this record
    pub id: Uuid,

    /// What happened
    pub kind: EventKind,

    /// Recipient identifier (e.g. an email address); opaque, compared by value
    pub identity: String,

    /// Groups events belonging to one outbound message. `None` is a distinct
    /// bucket, never a wildcard.
    pub correlation_id: Option<String>,

    /// Kind-specific payload (user agent, remote addr, redirect target, …).
    /// Opaque pass-through; the log never interprets it.
    pub attributes: serde_json::Value,

    /// Append time, assigned by the log from the server clock
    pub occurred_at: DateTime<Utc>,
}

/// An event as handed to [`EventLog::append`]: everything but the identifier
/// and timestamp, which the log assigns.
#[derive(Debug, Clone)]
pub struct EventDraft {
    pub kind: EventKind,
    pub identity: String,
    pub correlation_id: Option<String>,
    pub attributes: serde_json::Value,
}

impl EventDraft {
    /// Create a draft with empty attributes and no correlation id
    pub fn new(kind: EventKind, identity: impl Into<String>) -> Self {
        Self {
            kind,
            identity: identity.into(),
            correlation_id: None,
            attributes: serde_json::Value::Object(serde_json::Map::new()),
        }
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// Attach an optional correlation id without unwrapping at the call site
    pub fn with_correlation_id_opt(mut self, correlation_id: Option<String>) -> Self {
        self.correlation_id = correlation_id;
        self
    }

    pub fn with_attributes(mut self, attributes: serde_json::Value) -> Self {
        self.attributes = attributes;
        self
    }

    /// Validate the draft. Runs before any store access.
    pub fn validate(&self) -> EventLogResult<()> {
        validate_identity(&self.identity)?;
        if let Some(cid) = &self.correlation_id {
            if cid.len() > MAX_FIELD_LEN {
                return Err(EventLogError::InvalidInput(format!(
                    "Correlation id too long: {} characters (max {})",
                    cid.len(),
                    MAX_FIELD_LEN
                )));
            }
        }
        Ok(())
    }
}

/// Validate an identity value (shared with the deduplicator's fast-fail path)
pub fn validate_identity(identity: &str) -> EventLogResult<()> {
    if identity.is_empty() {
        return Err(EventLogError::InvalidInput(
            "Identity cannot be empty".to_string(),
        ));
    }
    if identity.len() > MAX_FIELD_LEN {
        return Err(EventLogError::InvalidInput(format!(
            "Identity too long: {} characters (max {})",
            identity.len(),
            MAX_FIELD_LEN
        )));
    }
    Ok(())
}

/// Filter for [`EventLog::query`]. Every field is optional; an empty filter
/// matches the whole log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    pub kind: Option<EventKind>,
    pub identity: Option<String>,
    pub limit: Option<usize>,
}

impl EventFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kind(mut self, kind: EventKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub(crate) fn matches(&self, event: &Event) -> bool {
        if let Some(kind) = self.kind {
            if event.kind != kind {
                return false;
            }
        }
        if let Some(identity) = &self.identity {
            if &event.identity != identity {
                return false;
            }
        }
        true
    }
}

/// Append-only, time-ordered store of engagement events.
///
/// `append` is the only mutator; queries are pure reads and reflect every
/// append that completed before the call started (read-your-writes within a
/// single process; cross-process consistency is the backing store's concern).
#[async_trait]
pub trait EventLog: Send + Sync {
    /// Assign the append timestamp, store the event atomically, and return the
    /// stored record. A persistence failure surfaces as
    /// [`EventLogError::Storage`], never as a silent no-op.
    async fn append(&self, draft: EventDraft) -> EventLogResult<Event>;

    /// The most recently appended `Open` event matching both `identity` and
    /// the exact correlation bucket (`None` matches only absent correlation
    /// ids). Returns the match with the greatest `occurred_at`, not the
    /// latest by submission order.
    async fn most_recent_open(
        &self,
        identity: &str,
        correlation_id: Option<&str>,
    ) -> EventLogResult<Option<Event>>;

    /// All events matching `filter`, most-recent-first. Re-evaluates against
    /// current log state on every call.
    async fn query(&self, filter: &EventFilter) -> EventLogResult<Vec<Event>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_round_trip() {
        for kind in [
            EventKind::Open,
            EventKind::Click,
            EventKind::ImageServe,
            EventKind::Sent,
            EventKind::NotDelivered,
        ] {
            let parsed: EventKind = kind.to_string().parse().unwrap();
            assert_eq!(parsed, kind);
        }

        assert!("pixel_open".parse::<EventKind>().is_err());
        assert!("".parse::<EventKind>().is_err());
    }

    #[test]
    fn test_draft_validation() {
        assert!(EventDraft::new(EventKind::Open, "a@example.com")
            .validate()
            .is_ok());

        let err = EventDraft::new(EventKind::Open, "").validate().unwrap_err();
        assert!(matches!(err, EventLogError::InvalidInput(_)));

        let err = EventDraft::new(EventKind::Open, "x".repeat(256))
            .validate()
            .unwrap_err();
        assert!(matches!(err, EventLogError::InvalidInput(_)));

        let err = EventDraft::new(EventKind::Open, "a@example.com")
            .with_correlation_id("x".repeat(256))
            .validate()
            .unwrap_err();
        assert!(matches!(err, EventLogError::InvalidInput(_)));
    }

    #[test]
    fn test_filter_matches() {
        let event = Event {
            id: Uuid::new_v4(),
            kind: EventKind::Click,
            identity: "a@example.com".to_string(),
            correlation_id: None,
            attributes: serde_json::json!({}),
            occurred_at: Utc::now(),
        };

        assert!(EventFilter::new().matches(&event));
        assert!(EventFilter::new().kind(EventKind::Click).matches(&event));
        assert!(!EventFilter::new().kind(EventKind::Open).matches(&event));
        assert!(EventFilter::new().identity("a@example.com").matches(&event));
        assert!(!EventFilter::new().identity("b@example.com").matches(&event));
    }
}
