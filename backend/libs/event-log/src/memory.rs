//! In-process event log backend
//!
//! Ordered `Vec` behind an `RwLock`. Used by the test suite and viable for
//! single-node deployments where durability across restarts is not required.

use crate::{Event, EventDraft, EventFilter, EventKind, EventLog, EventLogResult};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::RwLock;
use uuid::Uuid;

/// In-memory [`EventLog`] implementation
#[derive(Default)]
pub struct MemoryEventLog {
    events: RwLock<Vec<Event>>,
}

impl MemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of events currently stored
    pub fn len(&self) -> usize {
        self.events.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl EventLog for MemoryEventLog {
    async fn append(&self, draft: EventDraft) -> EventLogResult<Event> {
        draft.validate()?;

        let mut events = self.events.write().unwrap();

        // Insertion order must equal timestamp order: clamp to the last
        // assigned timestamp if the clock stepped backwards.
        let mut occurred_at = Utc::now();
        if let Some(last) = events.last() {
            if last.occurred_at > occurred_at {
                occurred_at = last.occurred_at;
            }
        }

        let event = Event {
            id: Uuid::new_v4(),
            kind: draft.kind,
            identity: draft.identity,
            correlation_id: draft.correlation_id,
            attributes: draft.attributes,
            occurred_at,
        };
        events.push(event.clone());

        Ok(event)
    }

    async fn most_recent_open(
        &self,
        identity: &str,
        correlation_id: Option<&str>,
    ) -> EventLogResult<Option<Event>> {
        let events = self.events.read().unwrap();

        // Timestamps are non-decreasing in insertion order, so the first
        // match scanning backwards carries the greatest occurred_at.
        Ok(events
            .iter()
            .rev()
            .find(|e| {
                e.kind == EventKind::Open
                    && e.identity == identity
                    && e.correlation_id.as_deref() == correlation_id
            })
            .cloned())
    }

    async fn query(&self, filter: &EventFilter) -> EventLogResult<Vec<Event>> {
        let events = self.events.read().unwrap();

        let matches = events.iter().rev().filter(|e| filter.matches(e)).cloned();
        Ok(match filter.limit {
            Some(limit) => matches.take(limit).collect(),
            None => matches.collect(),
        })
    }
}
