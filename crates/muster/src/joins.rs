//! Member-join notices.
//!
//! The platform's roster watcher calls in whenever someone joins a calendar
//! entity; the decision here is synchronous and the optional outbound
//! notice is plain data, so any transport concurrency model can call it.

use crate::event::{Event, EventStatus};
use crate::render;
use crate::sink::Destination;

/// React to a user joining an event's calendar entity.
///
/// Returns the welcome notice for the event's thread, or `None` when the
/// event is not (or no longer) in a state worth announcing.
pub fn member_joined(event: &Event, display_name: &str) -> Option<(Destination, String)> {
    if event.status != EventStatus::Approved {
        return None;
    }
    let refs = event.published.as_ref()?;

    Some((
        Destination::Thread(refs.thread_id.clone()),
        render::member_joined(event, display_name),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    use crate::event::{EventDraft, PublishedRefs};

    fn event() -> Event {
        let start = Utc::now() + Duration::days(1);
        EventDraft {
            name: "Potluck".to_string(),
            description: "Everyone brings a dish".to_string(),
            location: "Hall B".to_string(),
            starts_at: start,
            ends_at: start + Duration::hours(2),
            timezone: "UTC".to_string(),
            proposer_id: "u-1".to_string(),
            proposer_name: "Ada".to_string(),
            origin_channel: "c-1".to_string(),
        }
        .into_event(Utc::now())
        .unwrap()
    }

    #[test]
    fn approved_event_produces_thread_notice() {
        let mut e = event();
        e.status = EventStatus::Approved;
        e.published = Some(PublishedRefs {
            thread_id: "t-9".to_string(),
            thread_url: "https://chat.example/t-9".to_string(),
            calendar_entity_id: "cal-9".to_string(),
        });

        let (destination, text) = member_joined(&e, "Grace").unwrap();
        assert_eq!(destination, Destination::Thread("t-9".to_string()));
        assert!(text.contains("Grace"));
        assert!(text.contains("Potluck"));
    }

    #[test]
    fn pending_event_produces_nothing() {
        assert!(member_joined(&event(), "Grace").is_none());
    }
}
