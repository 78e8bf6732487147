//! Test doubles for the muster engine.
//!
//! An in-memory store honoring the version CAS, a recording sink, and a
//! scripted chat platform that counts its invocations. Everything here is
//! deterministic and clock-free; tests pass their own instants.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use muster_core::{
    ChatPlatform, CollaboratorError, DeliveryError, Destination, Event, EventDraft, EventStatus,
    EventStore, NotificationSink, StoreError, ThreadRef,
};

/// In-memory [`EventStore`] with the same CAS semantics as the Postgres
/// implementation: `update` matches on `version` and bumps it.
#[derive(Default)]
pub struct MemoryEventStore {
    events: DashMap<Uuid, Event>,
    unavailable: AtomicBool,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with `StoreError::Unavailable`,
    /// simulating backing-medium trouble.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(anyhow::anyhow!(
                "memory store marked unavailable"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn create(&self, event: &Event) -> Result<(), StoreError> {
        self.check_available()?;
        match self.events.entry(event.id) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(StoreError::DuplicateId(event.id)),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(event.clone());
                Ok(())
            }
        }
    }

    async fn get(&self, id: Uuid) -> Result<Event, StoreError> {
        self.check_available()?;
        self.events
            .get(&id)
            .map(|e| e.clone())
            .ok_or(StoreError::NotFound(id))
    }

    async fn find_by_origin_channel(&self, channel: &str) -> Result<Vec<Event>, StoreError> {
        self.check_available()?;
        Ok(self
            .events
            .iter()
            .filter(|e| e.origin_channel == channel)
            .map(|e| e.clone())
            .collect())
    }

    async fn list_by_status(&self, status: EventStatus) -> Result<Vec<Event>, StoreError> {
        self.check_available()?;
        Ok(self
            .events
            .iter()
            .filter(|e| e.status == status)
            .map(|e| e.clone())
            .collect())
    }

    async fn update(&self, event: &Event) -> Result<Event, StoreError> {
        self.check_available()?;
        let mut stored = self
            .events
            .get_mut(&event.id)
            .ok_or(StoreError::NotFound(event.id))?;

        if stored.version != event.version {
            return Err(StoreError::Conflict(event.id));
        }

        let mut updated = event.clone();
        updated.version += 1;
        *stored = updated.clone();
        Ok(updated)
    }
}

/// Sink that records every delivery, with scriptable failure and latency.
#[derive(Default)]
pub struct RecordingSink {
    delivered: Mutex<Vec<(Destination, String)>>,
    fail_all: AtomicBool,
    fail_next: AtomicBool,
    stall: Mutex<Option<Duration>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delivered(&self) -> Vec<(Destination, String)> {
        self.delivered.lock().unwrap().clone()
    }

    /// Deliveries to a specific destination.
    pub fn delivered_to(&self, destination: &Destination) -> Vec<String> {
        self.delivered
            .lock()
            .unwrap()
            .iter()
            .filter(|(d, _)| d == destination)
            .map(|(_, m)| m.clone())
            .collect()
    }

    pub fn fail_all(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::SeqCst);
    }

    /// Fail exactly the next delivery, then recover.
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Make every delivery sleep this long before answering.
    pub fn stall_for(&self, duration: Duration) {
        *self.stall.lock().unwrap() = Some(duration);
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn deliver(
        &self,
        destination: &Destination,
        message: &str,
    ) -> Result<(), DeliveryError> {
        let stall = *self.stall.lock().unwrap();
        if let Some(duration) = stall {
            tokio::time::sleep(duration).await;
        }
        if self.fail_next.swap(false, Ordering::SeqCst) || self.fail_all.load(Ordering::SeqCst) {
            return Err(DeliveryError(anyhow::anyhow!("scripted delivery failure")));
        }
        self.delivered
            .lock()
            .unwrap()
            .push((destination.clone(), message.to_string()));
        Ok(())
    }
}

/// Chat platform double that counts invocations and can be scripted to
/// fail or stall either call.
#[derive(Default)]
pub struct ScriptedPlatform {
    thread_calls: AtomicUsize,
    calendar_calls: AtomicUsize,
    fail_threads: AtomicBool,
    fail_calendar: AtomicBool,
    stall: Mutex<Option<Duration>>,
}

impl ScriptedPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn thread_calls(&self) -> usize {
        self.thread_calls.load(Ordering::SeqCst)
    }

    pub fn calendar_calls(&self) -> usize {
        self.calendar_calls.load(Ordering::SeqCst)
    }

    pub fn fail_threads(&self, fail: bool) {
        self.fail_threads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_calendar(&self, fail: bool) {
        self.fail_calendar.store(fail, Ordering::SeqCst);
    }

    /// Make every call sleep this long before answering, for timeout tests.
    pub fn stall_for(&self, duration: Duration) {
        *self.stall.lock().unwrap() = Some(duration);
    }

    async fn maybe_stall(&self) {
        let stall = *self.stall.lock().unwrap();
        if let Some(duration) = stall {
            tokio::time::sleep(duration).await;
        }
    }
}

#[async_trait]
impl ChatPlatform for ScriptedPlatform {
    async fn create_discussion_thread(
        &self,
        _title: &str,
        _body: &str,
    ) -> Result<ThreadRef, CollaboratorError> {
        self.maybe_stall().await;
        if self.fail_threads.load(Ordering::SeqCst) {
            return Err(CollaboratorError::Failed(anyhow::anyhow!(
                "scripted thread failure"
            )));
        }
        let n = self.thread_calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(ThreadRef {
            thread_id: format!("t-{n}"),
            url: format!("https://chat.example/t-{n}"),
        })
    }

    async fn create_calendar_entity(&self, _event: &Event) -> Result<String, CollaboratorError> {
        self.maybe_stall().await;
        if self.fail_calendar.load(Ordering::SeqCst) {
            return Err(CollaboratorError::Failed(anyhow::anyhow!(
                "scripted calendar failure"
            )));
        }
        let n = self.calendar_calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("cal-{n}"))
    }
}

/// A well-formed draft starting the given number of minutes from now
/// (negative for already started).
pub fn draft_starting_in(minutes: i64) -> EventDraft {
    let start = Utc::now() + chrono::Duration::minutes(minutes);
    EventDraft {
        name: "Board Game Night".to_string(),
        description: "Bring your favorites".to_string(),
        location: "Room 4".to_string(),
        starts_at: start,
        ends_at: start + chrono::Duration::hours(3),
        timezone: "America/Chicago".to_string(),
        proposer_id: "u-100".to_string(),
        proposer_name: "Sam".to_string(),
        origin_channel: "c-events".to_string(),
    }
}
