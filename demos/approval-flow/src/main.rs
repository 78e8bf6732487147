//! # Approval Flow Demo
//!
//! Walks an event through the whole lifecycle against in-memory doubles:
//! propose → approve → scheduler scan → "starting now" notification.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use muster_core::{
    proposal, ApprovalGate, CoreConfig, Decision, DeliveryError, Destination, DispatchScheduler,
    EventDraft, NotificationSink, Resolution,
};
use muster_testing::{MemoryEventStore, ScriptedPlatform};

/// Sink that prints deliveries instead of talking to a chat platform.
struct StdoutSink;

#[async_trait]
impl NotificationSink for StdoutSink {
    async fn deliver(
        &self,
        destination: &Destination,
        message: &str,
    ) -> Result<(), DeliveryError> {
        println!("--> [{destination}]\n{message}\n");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("muster_core=info".parse()?))
        .init();

    let config = CoreConfig {
        scan_interval: Duration::from_millis(500),
        announce_channel: "general".to_string(),
        operator_channel: Some("ops".to_string()),
        ..CoreConfig::default()
    };

    let store = Arc::new(MemoryEventStore::new());
    let platform = Arc::new(ScriptedPlatform::new());
    let sink: Arc<dyn NotificationSink> = Arc::new(StdoutSink);

    let gate = ApprovalGate::new(store.clone(), platform, sink.clone(), config.clone());

    // A member proposes an event that is (conveniently) starting right now.
    let now = Utc::now();
    let event = proposal::propose(
        store.as_ref(),
        EventDraft {
            name: "Board Game Night".to_string(),
            description: "Bring your favorites".to_string(),
            location: "Room 4".to_string(),
            starts_at: now,
            ends_at: now + chrono::Duration::hours(3),
            timezone: "America/Chicago".to_string(),
            proposer_id: "u-100".to_string(),
            proposer_name: "Sam".to_string(),
            origin_channel: "events".to_string(),
        },
    )
    .await?;
    info!(event_id = %event.id, "Proposed");

    // A reviewer approves; thread and calendar entity are minted.
    let resolution = gate.resolve(event.id, Decision::Approve, "mod-1").await?;
    let Resolution::Resolved(approved) = resolution else {
        anyhow::bail!("unexpected resolution: {resolution:?}");
    };
    info!(
        thread = approved.published.as_ref().unwrap().thread_url.as_str(),
        "Approved and published"
    );

    // A second decision bounces off the gate.
    let second = gate.resolve(event.id, Decision::Reject, "mod-2").await?;
    info!(?second, "Second decision");

    // The background scheduler picks up the "starting now" trigger.
    let scheduler = Arc::new(DispatchScheduler::new(store, sink, config));
    let handle = scheduler.spawn();
    tokio::time::sleep(Duration::from_secs(1)).await;
    handle.shutdown().await;

    Ok(())
}
