//! The Event entity and its proposal draft.
//!
//! The store owns the canonical copy of every event; everything else works
//! on a fetched value and writes back through [`crate::EventStore`].

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// Approval status. Starts at `Pending` and transitions exactly once to one
/// of the terminal states; never reverts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Pending,
    Approved,
    Rejected,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Pending => "pending",
            EventStatus::Approved => "approved",
            EventStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, EventStatus::Pending)
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named time-trigger condition. Once fired for an event it must never
/// fire again, even if the scan runs twice before the flag persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    /// Pre-event hype reminder, fired inside the configured window before
    /// the start time.
    HypeReminder,
    /// "Starting now" notice, fired once the start time arrives.
    StartingNow,
}

impl TriggerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerKind::HypeReminder => "hype_reminder",
            TriggerKind::StartingNow => "starting_now",
        }
    }

    pub fn parse(s: &str) -> Option<TriggerKind> {
        match s {
            "hype_reminder" => Some(TriggerKind::HypeReminder),
            "starting_now" => Some(TriggerKind::StartingNow),
            _ => None,
        }
    }
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// External identifiers minted at approval time, as one unit. An approved
/// event always carries all three; a pending or rejected event carries none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedRefs {
    /// Forum thread where the event is announced.
    pub thread_id: String,
    /// Shareable URL to that thread.
    pub thread_url: String,
    /// Scheduled calendar entity on the chat platform.
    pub calendar_entity_id: String,
}

/// A community event moving through propose → approve/reject → dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,

    pub name: String,
    pub description: String,
    pub location: String,

    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    /// IANA timezone name the times were proposed in, kept for display.
    pub timezone: String,

    pub proposer_id: String,
    pub proposer_name: String,
    /// Conversation the proposal came from; rejection notices route here,
    /// and later channel actions resolve back to the event through it.
    pub origin_channel: String,

    pub status: EventStatus,
    /// Who approved or rejected, once terminal. Kept for audit.
    pub resolved_by: Option<String>,
    pub published: Option<PublishedRefs>,

    /// Trigger kinds already fired. Guarantees at-most-once notification
    /// per kind across repeated scans.
    pub fired: BTreeSet<TriggerKind>,

    pub proposed_at: DateTime<Utc>,
    /// CAS token for `EventStore::update`. Bumped by the store on every
    /// successful write.
    pub version: i64,
}

impl Event {
    pub fn has_fired(&self, kind: TriggerKind) -> bool {
        self.fired.contains(&kind)
    }

    /// Record a trigger as fired. Returns false if it already was.
    pub fn mark_fired(&mut self, kind: TriggerKind) -> bool {
        self.fired.insert(kind)
    }

    pub fn is_pending(&self) -> bool {
        self.status == EventStatus::Pending
    }
}

/// Proposal input before validation. Built at the transport edge; becomes an
/// [`Event`] only if every field checks out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventDraft {
    pub name: String,
    pub description: String,
    pub location: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub timezone: String,
    pub proposer_id: String,
    pub proposer_name: String,
    pub origin_channel: String,
}

impl EventDraft {
    /// Validate and promote to a pending [`Event`].
    ///
    /// Collects every problem before failing so the proposer sees the full
    /// list at once.
    pub fn into_event(self, now: DateTime<Utc>) -> Result<Event, ValidationError> {
        let mut problems = Vec::new();

        if self.name.trim().is_empty() {
            problems.push("name must not be empty".to_string());
        }
        if self.description.trim().is_empty() {
            problems.push("description must not be empty".to_string());
        }
        if self.location.trim().is_empty() {
            problems.push("location must not be empty".to_string());
        }
        if self.ends_at <= self.starts_at {
            problems.push("end time must be after start time".to_string());
        }

        if !problems.is_empty() {
            return Err(ValidationError { problems });
        }

        Ok(Event {
            id: Uuid::new_v4(),
            name: self.name,
            description: self.description,
            location: self.location,
            starts_at: self.starts_at,
            ends_at: self.ends_at,
            timezone: self.timezone,
            proposer_id: self.proposer_id,
            proposer_name: self.proposer_name,
            origin_channel: self.origin_channel,
            status: EventStatus::Pending,
            resolved_by: None,
            published: None,
            fired: BTreeSet::new(),
            proposed_at: now,
            version: 1,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn draft() -> EventDraft {
        let start = Utc::now() + Duration::days(3);
        EventDraft {
            name: "Board Game Night".to_string(),
            description: "Bring your favorites".to_string(),
            location: "Room 4".to_string(),
            starts_at: start,
            ends_at: start + Duration::hours(3),
            timezone: "America/Chicago".to_string(),
            proposer_id: "u-100".to_string(),
            proposer_name: "Sam".to_string(),
            origin_channel: "c-events".to_string(),
        }
    }

    #[test]
    fn valid_draft_becomes_pending_event() {
        let event = draft().into_event(Utc::now()).unwrap();
        assert_eq!(event.status, EventStatus::Pending);
        assert!(event.published.is_none());
        assert!(event.fired.is_empty());
        assert_eq!(event.version, 1);
    }

    #[test]
    fn validation_reports_every_problem_at_once() {
        let mut d = draft();
        d.name = "  ".to_string();
        d.location = String::new();
        d.ends_at = d.starts_at - Duration::minutes(1);

        let err = d.into_event(Utc::now()).unwrap_err();
        assert_eq!(err.problems.len(), 3);
        assert!(err.problems.iter().any(|p| p.contains("name")));
        assert!(err.problems.iter().any(|p| p.contains("location")));
        assert!(err.problems.iter().any(|p| p.contains("end time")));
    }

    #[test]
    fn missing_location_reports_exactly_that_field() {
        let mut d = draft();
        d.location = String::new();

        let err = d.into_event(Utc::now()).unwrap_err();
        assert_eq!(err.problems.len(), 1);
        assert!(err.problems[0].contains("location"));
    }

    #[test]
    fn mark_fired_is_idempotent() {
        let mut event = draft().into_event(Utc::now()).unwrap();
        assert!(event.mark_fired(TriggerKind::HypeReminder));
        assert!(!event.mark_fired(TriggerKind::HypeReminder));
        assert!(event.has_fired(TriggerKind::HypeReminder));
        assert!(!event.has_fired(TriggerKind::StartingNow));
    }

    #[test]
    fn trigger_kind_round_trips_through_str() {
        for kind in [TriggerKind::HypeReminder, TriggerKind::StartingNow] {
            assert_eq!(TriggerKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(TriggerKind::parse("unknown"), None);
    }
}
