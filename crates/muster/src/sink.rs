//! Notification delivery seam.

use std::fmt;

use async_trait::async_trait;
use tracing::debug;

use crate::error::DeliveryError;

/// Where a rendered message goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Channel(String),
    Thread(String),
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Channel(id) => write!(f, "channel:{id}"),
            Destination::Thread(id) => write!(f, "thread:{id}"),
        }
    }
}

/// "Deliver this message to this destination", implemented by the chat
/// transport. Failures are retryable or not at the caller's discretion:
/// the scheduler retries on its next tick, one-shot notices do not.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, destination: &Destination, message: &str)
        -> Result<(), DeliveryError>;
}

/// Sink that drops everything. Stands in when no transport is wired up.
pub struct NoopSink;

#[async_trait]
impl NotificationSink for NoopSink {
    async fn deliver(
        &self,
        destination: &Destination,
        _message: &str,
    ) -> Result<(), DeliveryError> {
        debug!(%destination, "NoopSink dropped a notification");
        Ok(())
    }
}
