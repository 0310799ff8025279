//! Replays queued mutations against the remote API.
//!
//! Mutations are attempted immediately on user action; anything that fails is
//! drained later by a periodic sweep. Replay runs in two ordered phases: all
//! `AddReview` actions first (their server-assigned ids feed the placeholder
//! remap), then everything else. Within a phase actions run concurrently; the
//! phase boundary is a hard barrier.

use futures::future::join_all;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::api::remote::RemoteApi;
use crate::api::types::{is_placeholder_id, Review, ReviewDraft};
use crate::cache::EntityCache;
use crate::error::{Error, Result};
use crate::notify::Notifier;
use crate::queue::{Action, ActionQueue, PendingAction};

/// Result of one remote attempt.
#[derive(Debug)]
pub enum RemoteOutcome {
  /// The server applied the mutation. Carries the confirmed review for
  /// `AddReview`, which feeds the placeholder-id remap.
  Applied(Option<Review>),
  /// The server answered 4xx: the referenced resource is gone. Treated as
  /// success-with-no-effect so the sweep drops the action instead of
  /// retrying forever.
  AcceptedStale,
}

/// Outcome summary of one sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FlushReport {
  pub attempted: usize,
  pub succeeded: usize,
  pub failed: usize,
}

pub struct ReplayEngine {
  api: Arc<dyn RemoteApi>,
  queue: Arc<ActionQueue>,
  cache: Arc<EntityCache>,
  notifier: Arc<dyn Notifier>,
  /// Placeholder review id → server-confirmed id. Process-lifetime only;
  /// an unflushed AddReview regenerates its entry once it finally replays.
  id_map: Mutex<HashMap<i64, i64>>,
  /// Bumped every time an action is recorded for replay. A sweep snapshots
  /// this before listing the queue, so an action recorded while the sweep is
  /// in flight keeps the generations apart and the next tick still flushes.
  queue_generation: AtomicU64,
  /// Generation last observed fully drained; equal to `queue_generation` only
  /// when nothing is pending, which makes idle sweep ticks a cheap no-op.
  synced_generation: AtomicU64,
}

impl ReplayEngine {
  pub fn new(
    api: Arc<dyn RemoteApi>,
    queue: Arc<ActionQueue>,
    cache: Arc<EntityCache>,
    notifier: Arc<dyn Notifier>,
  ) -> Self {
    Self {
      api,
      queue,
      cache,
      notifier,
      id_map: Mutex::new(HashMap::new()),
      // Generations start apart: a restart with persisted actions must flush.
      queue_generation: AtomicU64::new(1),
      synced_generation: AtomicU64::new(0),
    }
  }

  fn resolve_review_id(&self, review_id: i64) -> i64 {
    if !is_placeholder_id(review_id) {
      return review_id;
    }
    let map = self.id_map.lock().unwrap_or_else(|e| e.into_inner());
    map.get(&review_id).copied().unwrap_or(review_id)
  }

  fn record_id_mapping(&self, placeholder_id: i64, server_id: i64) {
    let mut map = self.id_map.lock().unwrap_or_else(|e| e.into_inner());
    map.insert(placeholder_id, server_id);
    debug!(placeholder_id, server_id, "recorded review id mapping");
  }

  /// Issue the REST call for one action, substituting any placeholder review
  /// id with its server-confirmed mapping first.
  ///
  /// With `allow_client_errors`, a 4xx response resolves as
  /// [`RemoteOutcome::AcceptedStale`] instead of failing; network-level
  /// failures and 5xx always reject.
  pub async fn attempt_remote(
    &self,
    action: &Action,
    allow_client_errors: bool,
  ) -> Result<RemoteOutcome> {
    let result = match action {
      Action::SetFavorite {
        restaurant_id,
        favorite,
      } => self
        .api
        .set_favorite(*restaurant_id, *favorite)
        .await
        .map(|_| RemoteOutcome::Applied(None)),
      Action::AddReview {
        restaurant_id,
        name,
        rating,
        comments,
        ..
      } => {
        let draft = ReviewDraft {
          restaurant_id: *restaurant_id,
          name: name.clone(),
          rating: *rating,
          comments: comments.clone(),
        };
        self
          .api
          .create_review(&draft)
          .await
          .map(|review| RemoteOutcome::Applied(Some(review)))
      }
      Action::EditReview {
        restaurant_id,
        review_id,
        name,
        rating,
        comments,
      } => {
        let draft = ReviewDraft {
          restaurant_id: *restaurant_id,
          name: name.clone(),
          rating: *rating,
          comments: comments.clone(),
        };
        self
          .api
          .update_review(self.resolve_review_id(*review_id), &draft)
          .await
          .map(|review| RemoteOutcome::Applied(Some(review)))
      }
      Action::DeleteReview { review_id, .. } => self
        .api
        .delete_review(self.resolve_review_id(*review_id))
        .await
        .map(|_| RemoteOutcome::Applied(None)),
    };

    match result {
      Err(Error::StaleReference { status }) if allow_client_errors => {
        info!(kind = action.kind(), status, "dropping action for a stale reference");
        Ok(RemoteOutcome::AcceptedStale)
      }
      other => other,
    }
  }

  /// Record the side effects of a confirmed action: the placeholder→real id
  /// mapping and the converged review record.
  fn handle_success(&self, action: &Action, outcome: &RemoteOutcome) {
    let RemoteOutcome::Applied(Some(confirmed)) = outcome else {
      return;
    };

    if let Action::AddReview {
      review_id: Some(placeholder_id),
      ..
    } = action
    {
      self.record_id_mapping(*placeholder_id, confirmed.id);
      if let Err(e) = self.cache.confirm_review(*placeholder_id, confirmed) {
        warn!(error = %e, "failed to persist confirmed review");
      }
    }
  }

  /// Apply the optimistic local mutation, then attempt the remote call.
  ///
  /// The optimistic state is never rolled back: a remote failure persists the
  /// action for later replay and surfaces only as a notification. Validation
  /// failures reject before anything is touched.
  pub async fn perform_action(&self, action: Action) -> Result<()> {
    action.validate()?;

    let action = self.queue.enqueue(action)?;

    match self.attempt_remote(&action, false).await {
      Ok(outcome) => {
        self.handle_success(&action, &outcome);
        debug!(kind = action.kind(), "action confirmed by server");
        Ok(())
      }
      Err(e) => {
        warn!(kind = action.kind(), error = %e, "remote call failed, queueing for replay");
        self.queue.record(&action)?;
        self.queue_generation.fetch_add(1, Ordering::Relaxed);
        self
          .notifier
          .notify("Can't reach the server. Your change was saved and will sync later.");
        Ok(())
      }
    }
  }

  async fn replay_one(&self, pending: &PendingAction) -> bool {
    match self.attempt_remote(&pending.action, true).await {
      Ok(outcome) => {
        self.handle_success(&pending.action, &outcome);
        if let Err(e) = self.queue.remove(pending.since) {
          warn!(since = pending.since, error = %e, "failed to dequeue replayed action");
        }
        true
      }
      Err(e) => {
        debug!(kind = pending.action.kind(), error = %e, "replay attempt failed, keeping queued");
        false
      }
    }
  }

  /// Drain the pending queue once.
  ///
  /// Phase 1 replays every `AddReview` so their server ids become available
  /// for remapping; phase 2 replays the rest. Phase 2 never starts before
  /// every phase-1 action has resolved.
  pub async fn flush_once(&self) -> Result<FlushReport> {
    // Snapshot before listing: an action recorded during the sweep bumps the
    // generation past this snapshot, so the sweep cannot mark it drained.
    let generation = self.queue_generation.load(Ordering::Relaxed);
    let pending = self.queue.list_all()?;
    if pending.is_empty() {
      self.synced_generation.store(generation, Ordering::Relaxed);
      return Ok(FlushReport::default());
    }

    let attempted = pending.len();
    let (adds, rest): (Vec<_>, Vec<_>) = pending
      .into_iter()
      .partition(|p| matches!(p.action, Action::AddReview { .. }));

    // Phase boundary: every AddReview resolves before anything that might
    // reference one of their placeholder ids goes out.
    let phase1 = join_all(adds.iter().map(|p| self.replay_one(p))).await;
    let phase2 = join_all(rest.iter().map(|p| self.replay_one(p))).await;
    let succeeded = phase1.into_iter().chain(phase2).filter(|ok| *ok).count();

    let report = FlushReport {
      attempted,
      succeeded,
      failed: attempted - succeeded,
    };

    if report.failed == 0 {
      self.synced_generation.store(generation, Ordering::Relaxed);
      info!(synced = report.succeeded, "pending actions synced");
      self.notifier.notify("All your offline changes are now synced.");
    } else {
      // synced_generation stays behind queue_generation; the sweep retries.
      info!(failed = report.failed, "some pending actions still unsynced");
      self
        .notifier
        .notify("Some changes couldn't reach the server yet. Will retry.");
    }

    Ok(report)
  }

  /// Repeating sweep task. A tick with nothing pending returns immediately;
  /// sweeps never overlap because each tick awaits the previous sweep. Retries
  /// at a fixed interval indefinitely: all queued state is idempotently
  /// re-derivable, so no backoff ceiling is needed.
  pub async fn run(self: Arc<Self>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick of a tokio interval fires immediately; consume it so the
    // first sweep happens one full interval after startup.
    ticker.tick().await;

    loop {
      ticker.tick().await;
      if self.queue_drained() {
        continue;
      }
      if let Err(e) = self.flush_once().await {
        warn!(error = %e, "pending-action sweep failed");
      }
    }
  }

  fn queue_drained(&self) -> bool {
    self.synced_generation.load(Ordering::Relaxed)
      == self.queue_generation.load(Ordering::Relaxed)
  }

  #[cfg(test)]
  pub(crate) fn is_all_synced(&self) -> bool {
    self.queue_drained()
  }
}
