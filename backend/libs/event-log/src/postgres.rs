//! PostgreSQL event log backend
//!
//! Durable store over a `tracking_events` table. The open lookup is served by
//! a partial index keyed `(identity, correlation_id, occurred_at)` rather than
//! a scan of the whole history.
//!
//! Rows are decoded one at a time: a record that fails to decode (e.g. an
//! unknown kind written by an older deployment) is skipped with a warning and
//! the scan continues. One corrupt row never aborts a query.

use crate::error::MalformedRecord;
use crate::{Event, EventDraft, EventFilter, EventKind, EventLog, EventLogResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use sqlx::PgPool;
use uuid::Uuid;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// PostgreSQL-backed [`EventLog`] implementation
#[derive(Clone)]
pub struct PostgresEventLog {
    pool: PgPool,
}

impl PostgresEventLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the crate's migrations (creates `tracking_events` and its indexes)
    pub async fn migrate(&self) -> EventLogResult<()> {
        MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|e| sqlx::Error::Migrate(Box::new(e)).into())
    }
}

#[async_trait]
impl EventLog for PostgresEventLog {
    async fn append(&self, draft: EventDraft) -> EventLogResult<Event> {
        draft.validate()?;

        let id = Uuid::new_v4();

        // occurred_at is assigned by the database clock so that the stored
        // timestamp reflects actual append time, not request submission time.
        let occurred_at: DateTime<Utc> = sqlx::query_scalar(
            r#"
            INSERT INTO tracking_events (id, kind, identity, correlation_id, attributes)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING occurred_at
            "#,
        )
        .bind(id)
        .bind(draft.kind.to_string())
        .bind(&draft.identity)
        .bind(&draft.correlation_id)
        .bind(&draft.attributes)
        .fetch_one(&self.pool)
        .await?;

        Ok(Event {
            id,
            kind: draft.kind,
            identity: draft.identity,
            correlation_id: draft.correlation_id,
            attributes: draft.attributes,
            occurred_at,
        })
    }

    async fn most_recent_open(
        &self,
        identity: &str,
        correlation_id: Option<&str>,
    ) -> EventLogResult<Option<Event>> {
        crate::validate_identity(identity)?;

        // IS NOT DISTINCT FROM makes the absent correlation bucket an exact
        // match instead of a wildcard.
        let mut rows = sqlx::query_as::<_, EventRow>(
            r#"
            SELECT id, kind, identity, correlation_id, attributes, occurred_at
            FROM tracking_events
            WHERE kind = 'open'
              AND identity = $1
              AND correlation_id IS NOT DISTINCT FROM $2
            ORDER BY occurred_at DESC, id DESC
            "#,
        )
        .bind(identity)
        .bind(correlation_id)
        .fetch(&self.pool);

        while let Some(row) = rows.try_next().await? {
            match Event::try_from(row) {
                Ok(event) => return Ok(Some(event)),
                Err(err) => {
                    tracing::warn!(error = %err, "skipping malformed record");
                }
            }
        }
        Ok(None)
    }

    async fn query(&self, filter: &EventFilter) -> EventLogResult<Vec<Event>> {
        let mut conditions = Vec::new();
        let mut params = Vec::new();

        if let Some(kind) = filter.kind {
            params.push(kind.to_string());
            conditions.push(format!("kind = ${}", params.len()));
        }
        if let Some(identity) = &filter.identity {
            params.push(identity.clone());
            conditions.push(format!("identity = ${}", params.len()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };
        let sql = format!(
            "SELECT id, kind, identity, correlation_id, attributes, occurred_at \
             FROM tracking_events {} ORDER BY occurred_at DESC, id DESC",
            where_clause
        );

        let mut query = sqlx::query_as::<_, EventRow>(&sql);
        for param in &params {
            query = query.bind(param);
        }

        // The limit counts well-formed events, so it is applied after
        // decoding: a malformed row must not consume a result slot.
        let mut events = Vec::new();
        let mut rows = query.fetch(&self.pool);
        while let Some(row) = rows.try_next().await? {
            match Event::try_from(row) {
                Ok(event) => {
                    events.push(event);
                    if filter.limit.is_some_and(|limit| events.len() >= limit) {
                        break;
                    }
                }
                Err(err) => {
                    tracing::warn!(error = %err, "skipping malformed record");
                }
            }
        }
        Ok(events)
    }
}

// Database row representation. Decoding into a domain Event is fallible per
// record; see module docs for the skip policy.
#[derive(sqlx::FromRow)]
struct EventRow {
    id: Uuid,
    kind: String,
    identity: String,
    correlation_id: Option<String>,
    attributes: serde_json::Value,
    occurred_at: DateTime<Utc>,
}

impl TryFrom<EventRow> for Event {
    type Error = MalformedRecord;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        let kind: EventKind = row.kind.parse().map_err(|reason| MalformedRecord {
            id: row.id,
            reason,
        })?;

        Ok(Event {
            id: row.id,
            kind,
            identity: row.identity,
            correlation_id: row.correlation_id,
            attributes: row.attributes,
            occurred_at: row.occurred_at,
        })
    }
}
