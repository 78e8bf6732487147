//! Durable keyed storage contract for events.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StoreError;
use crate::event::{Event, EventStatus};

/// Durable keyed storage for [`Event`] records, surviving process restart.
///
/// The store exclusively owns the canonical copy of every event. All
/// mutation goes through [`update`](EventStore::update), which compares the
/// caller's `version` against the stored one: a mismatch fails with
/// [`StoreError::Conflict`] and the caller re-fetches rather than
/// overwriting blindly. This is what keeps the scheduler's flag writes and
/// the gate's status writes from clobbering each other.
///
/// Operations are expected to complete quickly (sub-second); none of them
/// may suspend a caller for unbounded time.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Insert a new pending event. Fails with [`StoreError::DuplicateId`]
    /// if the identifier already exists.
    async fn create(&self, event: &Event) -> Result<(), StoreError>;

    /// Point lookup by identifier.
    async fn get(&self, id: Uuid) -> Result<Event, StoreError>;

    /// All events tied to the given origin channel.
    ///
    /// Returns every match: the caller must treat more than one as a
    /// data-integrity problem (see [`crate::proposal::find_by_origin`]),
    /// never a silent pick.
    async fn find_by_origin_channel(&self, channel: &str) -> Result<Vec<Event>, StoreError>;

    /// All events with the given status. Order is not significant.
    async fn list_by_status(&self, status: EventStatus) -> Result<Vec<Event>, StoreError>;

    /// Replace a previously created event, CAS-guarded on `event.version`.
    ///
    /// On success the stored version is bumped and the updated record (with
    /// its new version) is returned. Fails with [`StoreError::NotFound`] for
    /// an unknown id and [`StoreError::Conflict`] on a version mismatch.
    async fn update(&self, event: &Event) -> Result<Event, StoreError>;
}
