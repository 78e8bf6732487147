//! The proposal boundary and channel → event lookups.
//!
//! Validation happens here, before anything touches the state machine or
//! the store; a malformed draft never creates an event.

use tracing::{error, info};

use crate::error::{LookupError, ProposalError};
use crate::event::{Event, EventDraft};
use crate::store::EventStore;

/// Validate a draft and persist it as a pending event.
pub async fn propose<S: EventStore + ?Sized>(
    store: &S,
    draft: EventDraft,
) -> Result<Event, ProposalError> {
    let event = draft.into_event(chrono::Utc::now())?;
    store.create(&event).await?;

    info!(
        event_id = %event.id,
        name = event.name.as_str(),
        proposer = event.proposer_name.as_str(),
        "Event proposed"
    );
    Ok(event)
}

/// Resolve an origin channel back to its single event.
///
/// More than one match is a data-integrity problem: it is logged and
/// surfaced as [`LookupError::DataIntegrity`], never resolved by silently
/// picking one. Zero matches is a plain `NotFound`.
pub async fn find_by_origin<S: EventStore + ?Sized>(
    store: &S,
    channel: &str,
) -> Result<Event, LookupError> {
    let mut matches = store.find_by_origin_channel(channel).await?;

    match matches.len() {
        0 => Err(LookupError::NotFound(channel.to_string())),
        1 => Ok(matches.remove(0)),
        count => {
            error!(
                channel,
                count, "Multiple events share one origin channel; refusing to pick"
            );
            Err(LookupError::DataIntegrity {
                channel: channel.to_string(),
                count,
            })
        }
    }
}
