//! Message templates.
//!
//! Plain text with the chat platform's lightweight markup; rendering is
//! kept apart from dispatch so both the gate and the scheduler share one
//! voice.

use crate::event::Event;

pub fn thread_title(event: &Event) -> String {
    event.name.clone()
}

/// Body of the announcement thread opened at approval time.
pub fn thread_body(event: &Event) -> String {
    format!(
        "**{}**\n{}\n\nWhen: {} – {} ({})\nWhere: {}\nCreated by: <@{}>",
        event.name,
        event.description,
        event.starts_at.format("%Y-%m-%d %H:%M"),
        event.ends_at.format("%H:%M"),
        event.timezone,
        event.location,
        event.proposer_id,
    )
}

/// Pre-event hype reminder for the announce channel.
pub fn hype_reminder(event: &Event) -> String {
    format!(
        "**{}** is coming up on {} ({}) at {}. See {}",
        event.name,
        event.starts_at.format("%Y-%m-%d %H:%M"),
        event.timezone,
        event.location,
        event
            .published
            .as_ref()
            .map(|p| p.thread_url.as_str())
            .unwrap_or("the event thread"),
    )
}

/// "Starting now" notice for the event thread.
pub fn starting_now(event: &Event) -> String {
    format!(
        "**{}**\n{}\nCreated by: <@{}>\n\nStarting now at {}!",
        event.name, event.description, event.proposer_id, event.location,
    )
}

/// One-shot rejection notice routed back to the origin channel.
pub fn rejection_notice(event: &Event) -> String {
    format!(
        "Your event proposal **{}** was not approved. Feel free to rework it and propose again.",
        event.name,
    )
}

/// Welcome notice when someone joins the calendar entity.
pub fn member_joined(event: &Event, display_name: &str) -> String {
    format!("{} is in for **{}**!", display_name, event.name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    use crate::event::EventDraft;

    fn event() -> Event {
        let start = Utc.with_ymd_and_hms(2025, 3, 1, 18, 0, 0).unwrap();
        EventDraft {
            name: "Board Game Night".to_string(),
            description: "Bring your favorites".to_string(),
            location: "Room 4".to_string(),
            starts_at: start,
            ends_at: start + Duration::hours(3),
            timezone: "UTC".to_string(),
            proposer_id: "u-42".to_string(),
            proposer_name: "Sam".to_string(),
            origin_channel: "c-events".to_string(),
        }
        .into_event(Utc::now())
        .unwrap()
    }

    #[test]
    fn starting_now_carries_name_description_and_mention() {
        let text = starting_now(&event());
        assert!(text.starts_with("**Board Game Night**\n"));
        assert!(text.contains("Bring your favorites"));
        assert!(text.contains("Created by: <@u-42>"));
    }

    #[test]
    fn thread_body_includes_when_and_where() {
        let text = thread_body(&event());
        assert!(text.contains("2025-03-01 18:00"));
        assert!(text.contains("Room 4"));
    }
}
