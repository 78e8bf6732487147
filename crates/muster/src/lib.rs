//! # Muster
//!
//! The event lifecycle engine behind a community calendar: members propose
//! events, reviewers approve or reject them exactly once, and approved
//! events fire time-triggered notifications as their start time approaches.
//!
//! ## Core Concepts
//!
//! Muster separates **deciding** from **doing**:
//! - The state machine ([`approve`]/[`reject`]) = pure transition rules
//!   (no I/O)
//! - [`ApprovalGate`] = at-most-once arbitration of a pending event's fate
//! - [`DispatchScheduler`] = periodic scan firing each trigger kind at most
//!   once per event
//! - [`EventStore`] = the single durable, canonical copy of every event
//!
//! ## Architecture
//!
//! ```text
//! proposal ──propose()──► EventStore (Pending)
//!                              │
//!            reviewer ──► ApprovalGate.resolve()
//!                              │  per-id lock: fetch → check →
//!                              │  collaborator → transition → persist
//!                              ▼
//!                         Approved / Rejected
//!                              │
//!        DispatchScheduler ◄───┘ (periodic scan of Approved)
//!              │
//!              ├─► due trigger? render ─► NotificationSink.deliver()
//!              └─► persist fired flag (notify-then-persist)
//! ```
//!
//! ## Key Invariants
//!
//! 1. **Status transitions once** - `Pending` to one terminal state, never
//!    back
//! 2. **Approved means published** - thread id, thread URL, and calendar
//!    entity id arrive together or not at all
//! 3. **Collaborator runs at most once** - racing resolutions produce one
//!    winner; losers observe `AlreadyResolved`
//! 4. **Triggers are at-least-once, flagged to at-most-once** - deliver
//!    first, persist the flag second; a lost flag write re-fires, a lost
//!    delivery retries
//! 5. **The store never lies with emptiness** - backing trouble surfaces as
//!    an error, not an empty scan
//!
//! ## What This Is Not
//!
//! Muster does not render UI, authenticate users, or speak to the chat
//! platform. Thread creation, calendar entities, and message delivery are
//! capabilities it consumes through the [`ChatPlatform`] and
//! [`NotificationSink`] seams.

mod collaborator;
mod config;
mod error;
mod event;
mod gate;
mod joins;
mod machine;
mod render;
mod scheduler;
mod sink;
mod store;

pub mod proposal;

// Re-export domain types
pub use event::{Event, EventDraft, EventStatus, PublishedRefs, TriggerKind};

// Re-export error types
pub use error::{
    CollaboratorError, DeliveryError, GateError, InvalidTransition, LookupError, ProposalError,
    StoreError, ValidationError,
};

// Re-export the pure state machine
pub use machine::{approve, reject};

// Re-export the store contract
pub use store::EventStore;

// Re-export external seams
pub use collaborator::{ChatPlatform, ThreadRef};
pub use sink::{Destination, NoopSink, NotificationSink};

// Re-export the gate
pub use gate::{ApprovalGate, Decision, Resolution};

// Re-export the scheduler
pub use scheduler::{due_triggers, DispatchScheduler, ScanStats, SchedulerHandle};

// Re-export member-join handling
pub use joins::member_joined;

// Re-export configuration
pub use config::CoreConfig;

// Re-export commonly used external types
pub use async_trait::async_trait;
