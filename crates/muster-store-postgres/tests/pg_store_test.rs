//! Integration tests for PgEventStore.
//! Requires a Postgres instance. Set DATABASE_TEST_URL or these tests are skipped.

use chrono::{Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use muster_core::{Event, EventDraft, EventStatus, EventStore, PublishedRefs, StoreError, TriggerKind};
use muster_store_postgres::{migrate, PgEventStore};

/// Get a test database pool, or skip if no test DB is available.
async fn test_pool() -> Option<PgPool> {
    let url = std::env::var("DATABASE_TEST_URL").ok()?;
    let pool = PgPool::connect(&url).await.ok()?;

    migrate(&pool).await.ok()?;

    // Clean slate for each test
    sqlx::query("TRUNCATE events")
        .execute(&pool)
        .await
        .ok()?;

    Some(pool)
}

fn pending_event(origin_channel: &str) -> Event {
    let start = Utc::now() + Duration::days(2);
    EventDraft {
        name: "Board Game Night".to_string(),
        description: "Bring your favorites".to_string(),
        location: "Room 4".to_string(),
        starts_at: start,
        ends_at: start + Duration::hours(3),
        timezone: "America/Chicago".to_string(),
        proposer_id: "u-100".to_string(),
        proposer_name: "Sam".to_string(),
        origin_channel: origin_channel.to_string(),
    }
    .into_event(Utc::now())
    .unwrap()
}

// =========================================================================
// Round trips
// =========================================================================

#[tokio::test]
async fn create_then_get_round_trips_all_fields() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let store = PgEventStore::new(pool);

    let event = pending_event("c-1");
    store.create(&event).await.unwrap();

    let fetched = store.get(event.id).await.unwrap();
    assert_eq!(fetched.id, event.id);
    assert_eq!(fetched.name, event.name);
    assert_eq!(fetched.location, event.location);
    assert_eq!(fetched.timezone, event.timezone);
    assert_eq!(fetched.status, EventStatus::Pending);
    assert_eq!(fetched.published, None);
    assert!(fetched.fired.is_empty());
    assert_eq!(fetched.version, 1);
    // Timestamps survive the TIMESTAMPTZ round trip to the microsecond.
    assert_eq!(
        fetched.starts_at.timestamp_micros(),
        event.starts_at.timestamp_micros()
    );
}

#[tokio::test]
async fn update_persists_approval_fields_and_bumps_version() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let store = PgEventStore::new(pool);

    let mut event = pending_event("c-1");
    store.create(&event).await.unwrap();

    event.status = EventStatus::Approved;
    event.resolved_by = Some("mod-1".to_string());
    event.published = Some(PublishedRefs {
        thread_id: "t-1".to_string(),
        thread_url: "https://chat.example/t-1".to_string(),
        calendar_entity_id: "cal-1".to_string(),
    });

    let updated = store.update(&event).await.unwrap();
    assert_eq!(updated.version, 2);

    let fetched = store.get(event.id).await.unwrap();
    assert_eq!(fetched.status, EventStatus::Approved);
    assert_eq!(fetched.resolved_by.as_deref(), Some("mod-1"));
    assert_eq!(fetched.published, event.published);
}

#[tokio::test]
async fn fired_flags_round_trip_through_text_array() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let store = PgEventStore::new(pool);

    let mut event = pending_event("c-1");
    store.create(&event).await.unwrap();

    event.mark_fired(TriggerKind::HypeReminder);
    event.mark_fired(TriggerKind::StartingNow);
    store.update(&event).await.unwrap();

    let fetched = store.get(event.id).await.unwrap();
    assert!(fetched.has_fired(TriggerKind::HypeReminder));
    assert!(fetched.has_fired(TriggerKind::StartingNow));
}

// =========================================================================
// Error surfaces
// =========================================================================

#[tokio::test]
async fn duplicate_id_is_reported_as_such() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let store = PgEventStore::new(pool);

    let event = pending_event("c-1");
    store.create(&event).await.unwrap();

    let err = store.create(&event).await.unwrap_err();
    assert!(matches!(err, StoreError::DuplicateId(id) if id == event.id));
}

#[tokio::test]
async fn get_unknown_id_is_not_found() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let store = PgEventStore::new(pool);

    let err = store.get(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}

#[tokio::test]
async fn update_unknown_id_is_not_found() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let store = PgEventStore::new(pool);

    let event = pending_event("c-1");
    let err = store.update(&event).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}

#[tokio::test]
async fn stale_version_update_is_a_conflict() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let store = PgEventStore::new(pool);

    let mut event = pending_event("c-1");
    store.create(&event).await.unwrap();

    // Writer A wins.
    event.description = "moved to the annex".to_string();
    store.update(&event).await.unwrap();

    // Writer B, still holding version 1, must not clobber.
    event.description = "moved to the roof".to_string();
    let err = store.update(&event).await.unwrap_err();
    assert!(matches!(err, StoreError::Conflict(id) if id == event.id));

    let fetched = store.get(event.id).await.unwrap();
    assert_eq!(fetched.description, "moved to the annex");
}

// =========================================================================
// Queries
// =========================================================================

#[tokio::test]
async fn list_by_status_partitions_events() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let store = PgEventStore::new(pool);

    let pending = pending_event("c-1");
    store.create(&pending).await.unwrap();

    let mut approved = pending_event("c-2");
    store.create(&approved).await.unwrap();
    approved.status = EventStatus::Approved;
    approved.published = Some(PublishedRefs {
        thread_id: "t-2".to_string(),
        thread_url: "https://chat.example/t-2".to_string(),
        calendar_entity_id: "cal-2".to_string(),
    });
    store.update(&approved).await.unwrap();

    let pendings = store.list_by_status(EventStatus::Pending).await.unwrap();
    assert_eq!(pendings.len(), 1);
    assert_eq!(pendings[0].id, pending.id);

    let approveds = store.list_by_status(EventStatus::Approved).await.unwrap();
    assert_eq!(approveds.len(), 1);
    assert_eq!(approveds[0].id, approved.id);

    assert!(store
        .list_by_status(EventStatus::Rejected)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn find_by_origin_channel_returns_all_matches() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let store = PgEventStore::new(pool);

    store.create(&pending_event("c-shared")).await.unwrap();
    store.create(&pending_event("c-shared")).await.unwrap();
    store.create(&pending_event("c-other")).await.unwrap();

    let matches = store.find_by_origin_channel("c-shared").await.unwrap();
    assert_eq!(matches.len(), 2);

    let none = store.find_by_origin_channel("c-empty").await.unwrap();
    assert!(none.is_empty());
}
