//! The approval gate: exactly one of approve/reject ever wins.
//!
//! A per-event-id async lock makes `resolve` linearizable for that id, so a
//! double-click or two racing reviewers produce one real transition and one
//! `AlreadyResolved`, and the collaborator's thread/calendar creation runs
//! at most once.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::collaborator::ChatPlatform;
use crate::config::CoreConfig;
use crate::error::{CollaboratorError, GateError, InvalidTransition, StoreError};
use crate::event::{Event, EventStatus, PublishedRefs};
use crate::machine;
use crate::render;
use crate::sink::{Destination, NotificationSink};
use crate::store::EventStore;

/// A reviewer's verdict on a pending event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
}

/// Outcome of a resolve call. All three are normal, non-alerting results.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// This call performed the transition.
    Resolved(Event),
    /// A concurrent (or earlier) call already decided; no side effects were
    /// repeated.
    AlreadyResolved(EventStatus),
    /// The approval request's time box elapsed before this decision. The
    /// event itself stays pending; someone must still act on it.
    Expired,
}

/// Arbitrates a pending event's fate between approve and reject.
pub struct ApprovalGate<S, P> {
    store: Arc<S>,
    platform: Arc<P>,
    sink: Arc<dyn NotificationSink>,
    config: CoreConfig,
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl<S, P> ApprovalGate<S, P>
where
    S: EventStore,
    P: ChatPlatform,
{
    pub fn new(
        store: Arc<S>,
        platform: Arc<P>,
        sink: Arc<dyn NotificationSink>,
        config: CoreConfig,
    ) -> Self {
        Self {
            store,
            platform,
            sink,
            config,
            locks: DashMap::new(),
        }
    }

    /// Resolve a pending event, at most once.
    ///
    /// Holds the event's lock across fetch → precondition check →
    /// collaborator calls → transition → persist. A collaborator failure
    /// mid-approval leaves the event untouched at `Pending` and returns
    /// [`GateError::ApprovalFailed`] so the reviewer can retry.
    pub async fn resolve(
        &self,
        event_id: Uuid,
        decision: Decision,
        actor: &str,
    ) -> Result<Resolution, GateError> {
        let lock = self
            .locks
            .entry(event_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        let result = self.resolve_locked(event_id, decision, actor).await;

        if let Err(e) = &result {
            // Infrastructure trouble gets an operator alert on top of the
            // error return; recoverable outcomes never do.
            match e {
                GateError::Store(StoreError::Unavailable(_)) | GateError::ApprovalFailed(_) => {
                    self.alert_operator(&format!("resolve {event_id} failed: {e}"))
                        .await;
                }
                _ => {}
            }
        }

        // A terminal outcome means no later resolve can transition this id,
        // so its lock entry has no further use. Pending outcomes (expiry,
        // failures) keep theirs for the retry.
        if matches!(
            &result,
            Ok(Resolution::Resolved(_)) | Ok(Resolution::AlreadyResolved(_))
        ) {
            self.locks.remove(&event_id);
        }

        result
    }

    /// Per-event lock entries currently retained. Terminal resolutions
    /// evict theirs, so this counts in-flight and still-pending ids.
    pub fn open_locks(&self) -> usize {
        self.locks.len()
    }

    async fn resolve_locked(
        &self,
        event_id: Uuid,
        decision: Decision,
        actor: &str,
    ) -> Result<Resolution, GateError> {
        let event = self.store.get(event_id).await?;

        if event.status.is_terminal() {
            return Ok(Resolution::AlreadyResolved(event.status));
        }

        let age = chrono::Utc::now() - event.proposed_at;
        if age.to_std().unwrap_or(Duration::ZERO) > self.config.approval_expiry {
            info!(%event_id, "Approval request expired; event stays pending");
            return Ok(Resolution::Expired);
        }

        let resolution = match decision {
            Decision::Approve => {
                // Mint the derived refs *before* the transition, so the
                // store never sees an approved event missing them. Nothing
                // is persisted until both collaborator calls succeed.
                let refs = self.mint_published_refs(&event).await?;
                let resolution = self
                    .transition_and_persist(event, |e| machine::approve(e, actor, refs.clone()))
                    .await?;
                if matches!(resolution, Resolution::Resolved(_)) {
                    info!(%event_id, actor, "Event approved");
                }
                resolution
            }
            Decision::Reject => {
                let resolution = self
                    .transition_and_persist(event, |e| machine::reject(e, actor))
                    .await?;
                if let Resolution::Resolved(rejected) = &resolution {
                    info!(%event_id, actor, "Event rejected");
                    self.send_rejection_notice(rejected).await;
                }
                resolution
            }
        };

        Ok(resolution)
    }

    /// Apply the transition and persist, retrying once on a version
    /// conflict (re-fetch, re-check, re-apply). The retry reuses the
    /// already-minted refs; the collaborator is never re-invoked.
    ///
    /// A conflict whose re-fetch comes back terminal means another writer
    /// resolved the event first (another process; the per-id lock rules
    /// this out in-process) and this call lost: that is `AlreadyResolved`,
    /// never a `Resolved` claiming a transition it did not perform.
    async fn transition_and_persist(
        &self,
        event: Event,
        transition: impl Fn(Event) -> Result<Event, InvalidTransition>,
    ) -> Result<Resolution, GateError> {
        let mut current = event;
        for attempt in 0..2 {
            let Ok(stamped) = transition(current.clone()) else {
                return Ok(Resolution::AlreadyResolved(current.status));
            };

            match self.store.update(&stamped).await {
                Ok(stored) => return Ok(Resolution::Resolved(stored)),
                Err(StoreError::Conflict(id)) if attempt == 0 => {
                    warn!(event_id = %id, "Version conflict persisting resolution; retrying once");
                    current = self.store.get(id).await?;
                    if current.status.is_terminal() {
                        return Ok(Resolution::AlreadyResolved(current.status));
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(StoreError::Conflict(current.id).into())
    }

    /// Create the discussion thread and calendar entity, each time-boxed.
    async fn mint_published_refs(&self, event: &Event) -> Result<PublishedRefs, GateError> {
        let thread = self
            .bounded(self.platform.create_discussion_thread(
                &render::thread_title(event),
                &render::thread_body(event),
            ))
            .await
            .map_err(GateError::ApprovalFailed)?;

        let calendar_entity_id = self
            .bounded(self.platform.create_calendar_entity(event))
            .await
            .map_err(GateError::ApprovalFailed)?;

        Ok(PublishedRefs {
            thread_id: thread.thread_id,
            thread_url: thread.url,
            calendar_entity_id,
        })
    }

    async fn bounded<T>(
        &self,
        call: impl std::future::Future<Output = Result<T, CollaboratorError>>,
    ) -> Result<T, CollaboratorError> {
        let timeout = self.config.collaborator_timeout;
        match tokio::time::timeout(timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(CollaboratorError::Timeout(timeout.as_secs())),
        }
    }

    /// One-shot rejection notice back to the origin channel. Failure is
    /// reported but never retried; a human is already in the loop.
    async fn send_rejection_notice(&self, event: &Event) {
        let destination = Destination::Channel(event.origin_channel.clone());
        if let Err(e) = self
            .sink
            .deliver(&destination, &render::rejection_notice(event))
            .await
        {
            warn!(event_id = %event.id, error = %e, "Rejection notice delivery failed");
            self.alert_operator(&format!(
                "rejection notice for {} undeliverable: {e}",
                event.id
            ))
            .await;
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
}
