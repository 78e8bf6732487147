//! The dispatch scheduler: a periodic scan that fires time-triggered
//! notifications for approved events.
//!
//! Discipline per trigger: render → deliver → persist the fired flag, in
//! that order. If the flag write fails after a successful delivery the
//! trigger may fire again on the next scan (at-least-once, never
//! at-most-zero); a failed delivery with no flag write is the safe retry
//! path. One event's trouble never aborts the scan of the rest.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use futures::future;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::CoreConfig;
use crate::error::StoreError;
use crate::event::{Event, EventStatus, TriggerKind};
use crate::render;
use crate::sink::{Destination, NotificationSink};
use crate::store::EventStore;

/// Counters for one scan pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanStats {
    /// Approved events visited.
    pub scanned: usize,
    /// Triggers delivered and flagged.
    pub dispatched: usize,
    /// Triggers that failed delivery or persistence and will be retried.
    pub failed: usize,
}

/// Trigger kinds due for an event at `now`, unfired flags only.
///
/// Pure so tests can sweep the clock without a store or a sink.
pub fn due_triggers(event: &Event, now: DateTime<Utc>, hype_window_hours: i64) -> Vec<TriggerKind> {
    let mut due = Vec::new();

    let until_start = event.starts_at - now;
    if until_start > Duration::zero()
        && until_start <= Duration::hours(hype_window_hours)
        && !event.has_fired(TriggerKind::HypeReminder)
    {
        due.push(TriggerKind::HypeReminder);
    }

    if now >= event.starts_at && !event.has_fired(TriggerKind::StartingNow) {
        due.push(TriggerKind::StartingNow);
    }

    due
}

/// Periodic scanner over approved events.
pub struct DispatchScheduler<S> {
    store: Arc<S>,
    sink: Arc<dyn NotificationSink>,
    config: CoreConfig,
}

impl<S: EventStore + 'static> DispatchScheduler<S> {
    pub fn new(store: Arc<S>, sink: Arc<dyn NotificationSink>, config: CoreConfig) -> Self {
        Self {
            store,
            sink,
            config,
        }
    }

    /// One full scan pass at the given instant.
    ///
    /// Each event's trigger work runs as its own future: a slow or hung
    /// delivery or store round-trip for one event never stalls the others,
    /// and no event is visited twice within a pass.
    pub async fn scan_at(&self, now: DateTime<Utc>) -> ScanStats {
        let mut stats = ScanStats::default();

        let approved = match self.store.list_by_status(EventStatus::Approved).await {
            Ok(events) => events,
            Err(e) => {
                // Surfaced, never swallowed into an empty list: an empty
                // list would look like "no work" and skip real dispatches.
                warn!(error = %e, "Scan aborted: store unavailable");
                self.alert_operator(&format!("dispatch scan aborted: {e}"))
                    .await;
                return stats;
            }
        };

        let outcomes =
            future::join_all(approved.into_iter().map(|event| self.scan_event(event, now))).await;
        for (dispatched, failed) in outcomes {
            stats.scanned += 1;
            stats.dispatched += dispatched;
            stats.failed += failed;
        }

        debug!(
            scanned = stats.scanned,
            dispatched = stats.dispatched,
            failed = stats.failed,
            "Scan pass complete"
        );
        stats
    }

    /// Trigger work for one event: `(dispatched, failed)` counts. Triggers
    /// for the same event stay sequential so the second flag write builds
    /// on the first.
    async fn scan_event(&self, event: Event, now: DateTime<Utc>) -> (usize, usize) {
        let (mut dispatched, mut failed) = (0, 0);
        let mut current = event;

        for kind in due_triggers(&current, now, self.config.hype_window_hours) {
            match self.dispatch_trigger(current.clone(), kind).await {
                Ok(updated) => {
                    dispatched += 1;
                    current = updated;
                }
                Err(e) => {
                    failed += 1;
                    warn!(
                        event_id = %current.id,
                        trigger = %kind,
                        error = %e,
                        "Trigger dispatch failed; will retry next scan"
                    );
                }
            }
        }

        (dispatched, failed)
    }

    /// Deliver one trigger, then persist its fired flag. Returns the
    /// updated event so later triggers in the same pass build on it.
    async fn dispatch_trigger(
        &self,
        mut event: Event,
        kind: TriggerKind,
    ) -> Result<Event, anyhow::Error> {
        let (destination, message) = self.render_trigger(&event, kind);

        self.sink.deliver(&destination, &message).await?;
        info!(event_id = %event.id, trigger = %kind, %destination, "Notification delivered");

        event.mark_fired(kind);
        match self.store.update(&event).await {
            Ok(updated) => Ok(updated),
            Err(StoreError::Conflict(id)) => {
                // Concurrent write bumped the version (a gate resolution or
                // an overlapping flag write). Re-fetch, re-check, re-apply
                // once; if the flag is already there the earlier writer won
                // and this dispatch is accounted for.
                let mut fresh = self.store.get(id).await?;
                if fresh.has_fired(kind) {
                    return Ok(fresh);
                }
                fresh.mark_fired(kind);
                Ok(self.store.update(&fresh).await?)
            }
            Err(e) => {
                self.alert_operator(&format!(
                    "flag write failed after delivering {kind} for {}: {e}",
                    event.id
                ))
                .await;
                Err(e.into())
            }
        }
    }

    fn render_trigger(&self, event: &Event, kind: TriggerKind) -> (Destination, String) {
        match kind {
            TriggerKind::HypeReminder => (
                Destination::Channel(self.config.announce_channel.clone()),
                render::hype_reminder(event),
            ),
            TriggerKind::StartingNow => {
                let destination = match &event.published {
                    Some(refs) => Destination::Thread(refs.thread_id.clone()),
                    // Approved events always carry refs; fall back rather
                    // than drop the notice if a legacy row does not.
                    None => Destination::Channel(self.config.announce_channel.clone()),
                };
                (destination, render::starting_now(event))
            }
        }
    }

    async fn alert_operator(&self, text: &str) {
        let Some(channel) = &self.config.operator_channel else {
            return;
        };
        let destination = Destination::Channel(channel.clone());
        if let Err(e) = self.sink.deliver(&destination, text).await {
            warn!(error = %e, "Operator alert delivery failed");
        }
    }

    /// Run the scan loop until shutdown. The handle's shutdown lets the
    /// in-flight scan finish before the loop stops scheduling more.
    pub fn spawn(self: Arc<Self>) -> SchedulerHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let scan_interval = self.config.scan_interval;

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(scan_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        // Shutdown is only observed between passes, so an
                        // in-flight scan always completes.
                        self.scan_at(Utc::now()).await;
                    }
                    _ = shutdown_rx.changed() => {
                        info!("Dispatch scheduler stopping");
                        break;
                    }
                }
            }
        });

        SchedulerHandle { shutdown_tx, task }
    }
}

/// Handle on a running scheduler task.
pub struct SchedulerHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Signal shutdown and wait for the loop to wind down.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.task.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    use crate::event::EventDraft;

    fn approved_at(starts_in: Duration) -> Event {
        let now = Utc::now();
        let mut event = EventDraft {
            name: "Picnic".to_string(),
            description: "Bring snacks".to_string(),
            location: "The park".to_string(),
            starts_at: now + starts_in,
            ends_at: now + starts_in + Duration::hours(2),
            timezone: "UTC".to_string(),
            proposer_id: "u-1".to_string(),
            proposer_name: "Ada".to_string(),
            origin_channel: "c-1".to_string(),
        }
        .into_event(now)
        .unwrap();
        event.status = EventStatus::Approved;
        event
    }

    #[test]
    fn hype_due_inside_window_only() {
        let now = Utc::now();

        let soon = approved_at(Duration::hours(10));
        assert_eq!(due_triggers(&soon, now, 72), vec![TriggerKind::HypeReminder]);

        let far = approved_at(Duration::hours(100));
        assert!(due_triggers(&far, now, 72).is_empty());
    }

    #[test]
    fn starting_now_due_once_start_arrives() {
        let now = Utc::now();
        let started = approved_at(Duration::minutes(-1));
        assert_eq!(
            due_triggers(&started, now, 72),
            vec![TriggerKind::StartingNow]
        );
    }

    #[test]
    fn fired_flags_suppress_repeat_triggers() {
        let now = Utc::now();
        let mut started = approved_at(Duration::minutes(-1));
        started.mark_fired(TriggerKind::StartingNow);
        assert!(due_triggers(&started, now, 72).is_empty());
    }

    #[test]
    fn hype_not_due_after_start() {
        // Once the event has started the hype window is behind us; only
        // the starting-now trigger should remain.
        let now = Utc::now();
        let started = approved_at(Duration::minutes(-5));
        assert_eq!(
            due_triggers(&started, now, 72),
            vec![TriggerKind::StartingNow]
        );
    }
}
