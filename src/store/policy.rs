//! Newer-wins reconciliation between fetched payloads and the local store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::api::types::{Restaurant, Review};
use crate::error::Result;
use crate::store::storage::LocalStore;

/// Single authority for "is stored data current" decisions.
///
/// Reconciliations for the same restaurant id serialize on a per-id async
/// mutex so two interleaved fetches cannot race the read-then-write and lose
/// an update. A write never downgrades stored data.
pub struct SyncPolicy {
  store: Arc<LocalStore>,
  locks: Mutex<HashMap<i64, Arc<tokio::sync::Mutex<()>>>>,
}

impl SyncPolicy {
  pub fn new(store: Arc<LocalStore>) -> Self {
    Self {
      store,
      locks: Mutex::new(HashMap::new()),
    }
  }

  fn lock_for(&self, id: i64) -> Arc<tokio::sync::Mutex<()>> {
    let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
    locks.entry(id).or_default().clone()
  }

  /// Decide whether `incoming` should overwrite the stored record.
  ///
  /// Evaluated in order, first match wins:
  /// 1. no stored record → write
  /// 2. `incoming.updated_at` absent → write (locally-originated data the
  ///    server has not timestamped yet)
  /// 3. incoming timestamp not newer and the review sets match → keep stored
  /// 4. otherwise → write (strictly newer, or the review set diverged:
  ///    review sub-lists can change without touching the parent timestamp)
  ///
  /// Returns whether a write occurred.
  pub async fn reconcile(&self, incoming: &Restaurant) -> Result<bool> {
    let lock = self.lock_for(incoming.id);
    let _guard = lock.lock().await;

    let current = match self.store.get_restaurant(incoming.id)? {
      Some(current) => current,
      None => {
        self.store.put_restaurant(incoming)?;
        debug!(id = incoming.id, "stored new restaurant");
        return Ok(true);
      }
    };

    let is_current = match (&incoming.updated_at, &current.updated_at) {
      (Some(incoming_ts), Some(current_ts)) => {
        incoming_ts <= current_ts && !reviews_diverge(&current.reviews, &incoming.reviews)
      }
      // Untimestamped incoming data is an optimistic local write: always take it.
      // An untimestamped stored record can never win against a timestamped one.
      _ => false,
    };

    if is_current {
      debug!(id = incoming.id, "stored restaurant already current");
      return Ok(false);
    }

    self.store.put_restaurant(incoming)?;
    debug!(id = incoming.id, "updated stored restaurant");
    Ok(true)
  }

  /// Reconcile a whole fetched collection. Returns how many records were
  /// written.
  pub async fn reconcile_all(&self, incoming: &[Restaurant]) -> Result<usize> {
    let mut updated = 0;
    for restaurant in incoming {
      if self.reconcile(restaurant).await? {
        updated += 1;
      }
    }
    Ok(updated)
  }
}

/// A review set diverges when the lengths differ, a stored counterpart is
/// missing, or any incoming review is strictly newer than its counterpart.
/// The comparison applies to the review objects themselves, never the parent.
fn reviews_diverge(current: &[Review], incoming: &[Review]) -> bool {
  if current.len() != incoming.len() {
    return true;
  }

  incoming.iter().any(|review| {
    match current.iter().find(|c| c.id == review.id) {
      None => true,
      Some(counterpart) => match (&review.updated_at, &counterpart.updated_at) {
        (Some(new_ts), Some(old_ts)) => new_ts > old_ts,
        (Some(_), None) => true,
        _ => false,
      },
    }
  })
}
