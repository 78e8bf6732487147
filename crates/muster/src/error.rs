//! Error taxonomy for the event lifecycle engine.
//!
//! Recoverable outcomes (`NotFound`, `InvalidTransition`, `AlreadyResolved`
//! as a [`crate::Resolution`] variant) are reported to the caller and
//! never alert an operator. `Unavailable` and collaborator failures indicate
//! infrastructure trouble and are additionally routed to the operator
//! channel by the components that hit them.

use thiserror::Error;
use uuid::Uuid;

use crate::event::EventStatus;

/// Failures surfaced by an [`crate::EventStore`] implementation.
///
/// Backing-medium trouble must come out as `Unavailable`, never as an empty
/// result: an empty result is indistinguishable from "no pending events" and
/// would make the scheduler silently skip real work.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("event {0} not found")]
    NotFound(Uuid),

    #[error("event {0} already exists")]
    DuplicateId(Uuid),

    /// The stored version no longer matches the caller's copy. Re-fetch,
    /// re-check the precondition, and re-apply; never overwrite blindly.
    #[error("stale write for event {0}: version mismatch")]
    Conflict(Uuid),

    #[error("store unavailable: {0}")]
    Unavailable(#[from] anyhow::Error),
}

/// A status transition that the state machine does not define.
#[derive(Debug, Error)]
#[error("no transition defined out of the {0} state")]
pub struct InvalidTransition(pub EventStatus);

/// Malformed proposal input. Carries *every* problem found, not just the
/// first, so the proposer can fix the whole draft in one pass.
#[derive(Debug, Error)]
#[error("invalid proposal: {}", problems.join("; "))]
pub struct ValidationError {
    pub problems: Vec<String>,
}

/// Failure of a chat-platform collaborator call (thread creation, calendar
/// entity creation). Timeouts count as failures, not crashes.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("collaborator call failed: {0}")]
    Failed(#[from] anyhow::Error),

    #[error("collaborator call timed out after {0}s")]
    Timeout(u64),
}

/// Failed delivery through a [`crate::NotificationSink`].
///
/// Whether this is retryable depends on the caller: the scheduler retries on
/// its next tick, the gate's one-shot notices do not retry (a human is
/// already in the loop).
#[derive(Debug, Error)]
#[error("delivery failed: {0}")]
pub struct DeliveryError(#[from] pub anyhow::Error);

/// Failures of an approval gate resolution that are not a normal outcome.
#[derive(Debug, Error)]
pub enum GateError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The collaborator failed mid-approval. The event was left untouched at
    /// `Pending`, so a reviewer can simply retry.
    #[error("approval failed, event left pending: {0}")]
    ApprovalFailed(#[source] CollaboratorError),
}

/// Failures when resolving an origin channel back to its event.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("no event for origin channel {0}")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// More than one event claims the same origin channel. Never silently
    /// pick one; the caller logs and alerts an operator.
    #[error("data integrity: {count} events share origin channel {channel}")]
    DataIntegrity { channel: String, count: usize },
}

/// Failures at the proposal boundary.
#[derive(Debug, Error)]
pub enum ProposalError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
