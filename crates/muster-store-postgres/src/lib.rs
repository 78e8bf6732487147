//! PostgreSQL implementation of the muster event store.
//!
//! One event = one row; no full-collection rewrites, ever. Conflict
//! detection rides on a `version` column: every successful update bumps it,
//! and an `UPDATE … WHERE version = $expected` that matches zero rows is a
//! stale write.
//!
//! # Database Schema
//!
//! ```sql
//! CREATE TABLE events (
//!     id UUID PRIMARY KEY,
//!     name TEXT NOT NULL,
//!     description TEXT NOT NULL,
//!     location TEXT NOT NULL,
//!     starts_at TIMESTAMPTZ NOT NULL,
//!     ends_at TIMESTAMPTZ NOT NULL,
//!     timezone TEXT NOT NULL,
//!     proposer_id TEXT NOT NULL,
//!     proposer_name TEXT NOT NULL,
//!     origin_channel TEXT NOT NULL,
//!
//!     -- Lifecycle
//!     status TEXT NOT NULL DEFAULT 'pending',
//!     resolved_by TEXT,
//!
//!     -- Populated together at approval, or not at all
//!     thread_id TEXT,
//!     thread_url TEXT,
//!     calendar_entity_id TEXT,
//!
//!     -- Dispatch flags (trigger kinds already fired)
//!     fired TEXT[] NOT NULL DEFAULT '{}',
//!
//!     proposed_at TIMESTAMPTZ NOT NULL,
//!     version BIGINT NOT NULL DEFAULT 1
//! );
//!
//! CREATE INDEX idx_events_status ON events (status);
//! CREATE INDEX idx_events_origin ON events (origin_channel);
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use muster_store_postgres::PgEventStore;
//! use sqlx::PgPool;
//!
//! let pool = PgPool::connect("postgres://localhost/muster").await?;
//! let store = PgEventStore::new(pool);
//! ```

use std::collections::BTreeSet;

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use muster_core::{Event, EventStatus, EventStore, PublishedRefs, StoreError, TriggerKind};

const EVENT_COLUMNS: &str = "id, name, description, location, starts_at, ends_at, timezone, \
     proposer_id, proposer_name, origin_channel, status, resolved_by, \
     thread_id, thread_url, calendar_entity_id, fired, proposed_at, version";

/// PostgreSQL event store.
#[derive(Clone)]
pub struct PgEventStore {
    pool: PgPool,
}

impl PgEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Create the events table and its indexes. Idempotent.
pub async fn migrate(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS events (
            id UUID PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT NOT NULL,
            location TEXT NOT NULL,
            starts_at TIMESTAMPTZ NOT NULL,
            ends_at TIMESTAMPTZ NOT NULL,
            timezone TEXT NOT NULL,
            proposer_id TEXT NOT NULL,
            proposer_name TEXT NOT NULL,
            origin_channel TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            resolved_by TEXT,
            thread_id TEXT,
            thread_url TEXT,
            calendar_entity_id TEXT,
            fired TEXT[] NOT NULL DEFAULT '{}',
            proposed_at TIMESTAMPTZ NOT NULL,
            version BIGINT NOT NULL DEFAULT 1
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(unavailable)?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_events_status ON events (status)")
        .execute(pool)
        .await
        .map_err(unavailable)?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_events_origin ON events (origin_channel)")
        .execute(pool)
        .await
        .map_err(unavailable)?;

    Ok(())
}

#[async_trait]
impl EventStore for PgEventStore {
    async fn create(&self, event: &Event) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO events (id, name, description, location, starts_at, ends_at, timezone,
                                proposer_id, proposer_name, origin_channel, status, resolved_by,
                                thread_id, thread_url, calendar_entity_id, fired, proposed_at, version)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            "#,
        )
        .bind(event.id)
        .bind(&event.name)
        .bind(&event.description)
        .bind(&event.location)
        .bind(event.starts_at)
        .bind(event.ends_at)
        .bind(&event.timezone)
        .bind(&event.proposer_id)
        .bind(&event.proposer_name)
        .bind(&event.origin_channel)
        .bind(event.status.as_str())
        .bind(&event.resolved_by)
        .bind(event.published.as_ref().map(|p| p.thread_id.as_str()))
        .bind(event.published.as_ref().map(|p| p.thread_url.as_str()))
        .bind(event.published.as_ref().map(|p| p.calendar_entity_id.as_str()))
        .bind(fired_to_column(&event.fired))
        .bind(event.proposed_at)
        .bind(event.version)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(StoreError::DuplicateId(event.id)),
            Err(e) => Err(unavailable(e)),
        }
    }

    async fn get(&self, id: Uuid) -> Result<Event, StoreError> {
        let row = sqlx::query(&format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable)?;

        match row {
            Some(row) => event_from_row(&row),
            None => Err(StoreError::NotFound(id)),
        }
    }

    async fn find_by_origin_channel(&self, channel: &str) -> Result<Vec<Event>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE origin_channel = $1"
        ))
        .bind(channel)
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;

        rows.iter().map(event_from_row).collect()
    }

    async fn list_by_status(&self, status: EventStatus) -> Result<Vec<Event>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE status = $1"
        ))
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;

        rows.iter().map(event_from_row).collect()
    }

    async fn update(&self, event: &Event) -> Result<Event, StoreError> {
        // CAS on version: zero rows touched means either a stale caller or
        // an unknown id; tell those apart with a follow-up existence check.
        let row = sqlx::query(&format!(
            r#"
            UPDATE events
            SET name = $2, description = $3, location = $4,
                starts_at = $5, ends_at = $6, timezone = $7,
                proposer_id = $8, proposer_name = $9, origin_channel = $10,
                status = $11, resolved_by = $12,
                thread_id = $13, thread_url = $14, calendar_entity_id = $15,
                fired = $16, proposed_at = $17,
                version = version + 1
            WHERE id = $1 AND version = $18
            RETURNING {EVENT_COLUMNS}
            "#
        ))
        .bind(event.id)
        .bind(&event.name)
        .bind(&event.description)
        .bind(&event.location)
        .bind(event.starts_at)
        .bind(event.ends_at)
        .bind(&event.timezone)
        .bind(&event.proposer_id)
        .bind(&event.proposer_name)
        .bind(&event.origin_channel)
        .bind(event.status.as_str())
        .bind(&event.resolved_by)
        .bind(event.published.as_ref().map(|p| p.thread_id.as_str()))
        .bind(event.published.as_ref().map(|p| p.thread_url.as_str()))
        .bind(event.published.as_ref().map(|p| p.calendar_entity_id.as_str()))
        .bind(fired_to_column(&event.fired))
        .bind(event.proposed_at)
        .bind(event.version)
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;

        if let Some(row) = row {
            return event_from_row(&row);
        }

        let exists = sqlx::query("SELECT 1 FROM events WHERE id = $1")
            .bind(event.id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable)?;

        if exists.is_some() {
            Err(StoreError::Conflict(event.id))
        } else {
            Err(StoreError::NotFound(event.id))
        }
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

fn event_from_row(row: &PgRow) -> Result<Event, StoreError> {
    let status_raw: String = row.try_get("status").map_err(unavailable)?;
    let status = parse_status(&status_raw)?;

    let thread_id: Option<String> = row.try_get("thread_id").map_err(unavailable)?;
    let thread_url: Option<String> = row.try_get("thread_url").map_err(unavailable)?;
    let calendar_entity_id: Option<String> =
        row.try_get("calendar_entity_id").map_err(unavailable)?;
    let published = match (thread_id, thread_url, calendar_entity_id) {
        (Some(thread_id), Some(thread_url), Some(calendar_entity_id)) => Some(PublishedRefs {
            thread_id,
            thread_url,
            calendar_entity_id,
        }),
        (None, None, None) => None,
        _ => {
            // A partial set should be unreachable given the gate's write
            // discipline; refuse to surface it as either whole state.
            return Err(StoreError::Unavailable(anyhow::anyhow!(
                "event row carries a partial published-refs set"
            )));
        }
    };

    let fired_raw: Vec<String> = row.try_get("fired").map_err(unavailable)?;
    let mut fired = BTreeSet::new();
    for flag in fired_raw {
        match TriggerKind::parse(&flag) {
            Some(kind) => {
                fired.insert(kind);
            }
            None => {
                return Err(StoreError::Unavailable(anyhow::anyhow!(
                    "unknown trigger kind in fired column: {flag}"
                )))
            }
        }
    }

    Ok(Event {
        id: row.try_get("id").map_err(unavailable)?,
        name: row.try_get("name").map_err(unavailable)?,
        description: row.try_get("description").map_err(unavailable)?,
        location: row.try_get("location").map_err(unavailable)?,
        starts_at: row.try_get("starts_at").map_err(unavailable)?,
        ends_at: row.try_get("ends_at").map_err(unavailable)?,
        timezone: row.try_get("timezone").map_err(unavailable)?,
        proposer_id: row.try_get("proposer_id").map_err(unavailable)?,
        proposer_name: row.try_get("proposer_name").map_err(unavailable)?,
        origin_channel: row.try_get("origin_channel").map_err(unavailable)?,
        status,
        resolved_by: row.try_get("resolved_by").map_err(unavailable)?,
        published,
        fired,
        proposed_at: row.try_get("proposed_at").map_err(unavailable)?,
        version: row.try_get("version").map_err(unavailable)?,
    })
}

fn parse_status(raw: &str) -> Result<EventStatus, StoreError> {
    match raw {
        "pending" => Ok(EventStatus::Pending),
        "approved" => Ok(EventStatus::Approved),
        "rejected" => Ok(EventStatus::Rejected),
        other => Err(StoreError::Unavailable(anyhow::anyhow!(
            "unknown event status in row: {other}"
        ))),
    }
}

fn fired_to_column(fired: &BTreeSet<TriggerKind>) -> Vec<String> {
    fired.iter().map(|k| k.as_str().to_string()).collect()
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| code == "23505")
}

fn unavailable(e: impl Into<anyhow::Error>) -> StoreError {
    StoreError::Unavailable(e.into())
}
