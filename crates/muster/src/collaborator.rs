//! Chat-platform collaborator seam.
//!
//! The engine decides *what* should happen; these calls are how approved
//! events become visible on the platform. They are the only operations that
//! may block for platform round-trip time, so the gate time-boxes them.

use async_trait::async_trait;

use crate::error::CollaboratorError;
use crate::event::Event;

/// A freshly created discussion thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadRef {
    pub thread_id: String,
    pub url: String,
}

/// External chat-platform capabilities consumed (never implemented) by the
/// core. Implementations live in the transport layer.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Create a forum thread announcing the event.
    async fn create_discussion_thread(
        &self,
        title: &str,
        body: &str,
    ) -> Result<ThreadRef, CollaboratorError>;

    /// Create a scheduled calendar entity for the event.
    async fn create_calendar_entity(&self, event: &Event) -> Result<String, CollaboratorError>;
}
