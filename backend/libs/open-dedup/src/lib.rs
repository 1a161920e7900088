//! # Windowed Open Deduplication
//!
//! Decides, for each observed pixel fetch, whether to record a new `open`
//! event or treat it as a repeat of a recent one.
//!
//! ## Problem
//!
//! Email clients fetch a tracking pixel far more often than a human opens a
//! message: pre-fetch proxies, repeated renders, and multiple inline images
//! all hit the endpoint. Logging every fetch as an open would overcount
//! engagement by an order of magnitude.
//!
//! ## Solution
//!
//! A trailing dedup window measured from "now": a fetch is a new open only if
//! the most recent prior open for the same `(identity, correlation_id)` pair
//! is older than the window (default 10 minutes). Each recorded open resets
//! the window for the next check, so re-engagement after a gap is still
//! captured:
//!
//! ```text
//! 10:00 fetch → Recorded      (no prior open)
//! 10:05 fetch → Suppressed    (within 10 min of 10:00)
//! 10:11 fetch → Recorded      (11 min since 10:00)
//! 10:15 fetch → Suppressed    (within 10 min of 10:11)
//! ```
//!
//! ## Concurrency
//!
//! Two concurrent fetches for the same pair could both observe "no prior open
//! within window" before either appends. The check-then-append is therefore
//! serialized per `(identity, correlation_id)` pair through a keyed async
//! mutex: N concurrent calls yield exactly one `Recorded`. The serialization
//! scope is this process; multi-writer deployments need the equivalent
//! guarantee from the backing store.
//!
//! ## Usage
//!
//! ```ignore
//! use open_dedup::{Decision, OpenDeduplicator};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example(log: Arc<dyn event_log::EventLog>) -> Result<(), event_log::EventLogError> {
//! let dedup = OpenDeduplicator::new(log, Duration::from_secs(600));
//!
//! match dedup
//!     .record_open("a@example.com", Some("mid-1"), serde_json::json!({"ua": "…"}))
//!     .await?
//! {
//!     Decision::Recorded(event) => println!("new open at {}", event.occurred_at),
//!     Decision::Suppressed => println!("repeat fetch, not logged"),
//! }
//! # Ok(())
//! # }
//! ```

use chrono::Utc;
use dashmap::DashMap;
use event_log::{validate_identity, Event, EventDraft, EventKind, EventLog, EventLogResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

/// Default trailing dedup window
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(10 * 60);

/// Outcome of an open check
#[derive(Debug, Clone)]
pub enum Decision {
    /// A new open event was appended to the log
    Recorded(Event),

    /// A prior open exists within the window; nothing was appended
    Suppressed,
}

impl Decision {
    pub fn is_recorded(&self) -> bool {
        matches!(self, Decision::Recorded(_))
    }

    pub fn is_suppressed(&self) -> bool {
        matches!(self, Decision::Suppressed)
    }
}

type DedupKey = (String, Option<String>);

/// Windowed open deduplicator over one [`EventLog`] instance.
///
/// Holds no state beyond the configured window and its serialization locks.
/// Thread-safe; share across tasks with `Arc<OpenDeduplicator>`.
pub struct OpenDeduplicator {
    log: Arc<dyn EventLog>,
    window: Duration,
    locks: DashMap<DedupKey, Arc<Mutex<()>>>,
}

impl OpenDeduplicator {
    pub fn new(log: Arc<dyn EventLog>, window: Duration) -> Self {
        Self {
            log,
            window,
            locks: DashMap::new(),
        }
    }

    /// Construct with the default 10-minute window
    pub fn with_default_window(log: Arc<dyn EventLog>) -> Self {
        Self::new(log, DEFAULT_WINDOW)
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Record an observed pixel fetch.
    ///
    /// Returns [`Decision::Recorded`] with the stored event if no prior open
    /// exists within the window for this `(identity, correlation_id)` pair,
    /// [`Decision::Suppressed`] otherwise.
    ///
    /// A prior open with a timestamp in the future (clock irregularity)
    /// counts as within-window: ambiguity fails toward suppression, favoring
    /// undercounting duplicates over overcounting opens.
    ///
    /// Storage failures propagate — "store unavailable" is never conflated
    /// with "no duplicate found", which would over-record during outages.
    pub async fn record_open(
        &self,
        identity: &str,
        correlation_id: Option<&str>,
        attributes: serde_json::Value,
    ) -> EventLogResult<Decision> {
        validate_identity(identity)?;

        let key = (identity.to_string(), correlation_id.map(String::from));
        let lock = self
            .locks
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        // Anything the window cannot represent is effectively unbounded
        let window = chrono::Duration::from_std(self.window)
            .unwrap_or_else(|_| chrono::Duration::MAX);
        let cutoff = Utc::now() - window;

        if let Some(prior) = self.log.most_recent_open(identity, correlation_id).await? {
            if prior.occurred_at >= cutoff {
                debug!(
                    identity = %identity,
                    correlation_id = ?correlation_id,
                    prior_open = %prior.occurred_at,
                    "open suppressed (within window)"
                );
                return Ok(Decision::Suppressed);
            }
        }

        let event = self
            .log
            .append(
                EventDraft::new(EventKind::Open, identity)
                    .with_correlation_id_opt(correlation_id.map(String::from))
                    .with_attributes(attributes),
            )
            .await?;

        debug!(
            identity = %identity,
            correlation_id = ?correlation_id,
            event_id = %event.id,
            "open recorded"
        );
        Ok(Decision::Recorded(event))
    }
}
