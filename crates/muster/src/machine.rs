//! The approval state machine.
//!
//! Pure value-in, value-out transitions: no I/O, no clock, no store. The
//! gate supplies the published refs *before* calling [`approve`], so the
//! store never observes an approved event missing its derived identifiers.
//!
//! Defined transitions:
//!
//! ```text
//! Pending ──approve──► Approved   (terminal)
//! Pending ──reject───► Rejected   (terminal)
//! ```
//!
//! Anything else is [`InvalidTransition`].

use crate::error::InvalidTransition;
use crate::event::{Event, EventStatus, PublishedRefs};

/// Stamp a pending event as approved, recording who approved it and the
/// externally minted thread/calendar identifiers.
pub fn approve(
    mut event: Event,
    approver: &str,
    refs: PublishedRefs,
) -> Result<Event, InvalidTransition> {
    if event.status != EventStatus::Pending {
        return Err(InvalidTransition(event.status));
    }

    event.status = EventStatus::Approved;
    event.resolved_by = Some(approver.to_string());
    event.published = Some(refs);
    Ok(event)
}

/// Stamp a pending event as rejected. No derived fields are set.
pub fn reject(mut event: Event, rejecter: &str) -> Result<Event, InvalidTransition> {
    if event.status != EventStatus::Pending {
        return Err(InvalidTransition(event.status));
    }

    event.status = EventStatus::Rejected;
    event.resolved_by = Some(rejecter.to_string());
    Ok(event)
}
