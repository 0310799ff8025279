//! Durable log of user mutation intents awaiting server confirmation.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::cache::EntityCache;
use crate::error::{Error, Result};
use crate::store::storage::LocalStore;
use crate::util::monotonic_micros;

/// A user mutation intent. One payload shape per variant; every payload
/// carries the affected restaurant id. Serialized as `{type, payload}` in the
/// pending-action store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Action {
  #[serde(rename = "SET_FAVORITE")]
  SetFavorite { restaurant_id: i64, favorite: bool },
  /// `review_id` is `None` until [`ActionQueue::enqueue`] assigns a
  /// placeholder; once queued it is always present.
  #[serde(rename = "ADD_REVIEW")]
  AddReview {
    restaurant_id: i64,
    review_id: Option<i64>,
    name: String,
    rating: u8,
    comments: String,
  },
  /// `review_id` may be a placeholder pending remapping at replay time.
  #[serde(rename = "EDIT_REVIEW")]
  EditReview {
    restaurant_id: i64,
    review_id: i64,
    name: String,
    rating: u8,
    comments: String,
  },
  #[serde(rename = "DELETE_REVIEW")]
  DeleteReview { restaurant_id: i64, review_id: i64 },
}

impl Action {
  pub fn kind(&self) -> &'static str {
    match self {
      Action::SetFavorite { .. } => "SET_FAVORITE",
      Action::AddReview { .. } => "ADD_REVIEW",
      Action::EditReview { .. } => "EDIT_REVIEW",
      Action::DeleteReview { .. } => "DELETE_REVIEW",
    }
  }

  pub fn restaurant_id(&self) -> i64 {
    match self {
      Action::SetFavorite { restaurant_id, .. }
      | Action::AddReview { restaurant_id, .. }
      | Action::EditReview { restaurant_id, .. }
      | Action::DeleteReview { restaurant_id, .. } => *restaurant_id,
    }
  }

  /// Reject malformed payloads before any network or store I/O.
  pub fn validate(&self) -> Result<()> {
    if self.restaurant_id() <= 0 {
      return Err(Error::Validation("missing restaurant_id".to_string()));
    }

    match self {
      Action::SetFavorite { .. } => Ok(()),
      Action::AddReview { name, rating, .. } => validate_draft(name, *rating),
      Action::EditReview {
        review_id,
        name,
        rating,
        ..
      } => {
        validate_review_id(*review_id)?;
        validate_draft(name, *rating)
      }
      Action::DeleteReview { review_id, .. } => validate_review_id(*review_id),
    }
  }
}

fn validate_draft(name: &str, rating: u8) -> Result<()> {
  if name.trim().is_empty() {
    return Err(Error::Validation("reviewer name must not be empty".to_string()));
  }
  if !(1..=5).contains(&rating) {
    return Err(Error::Validation(format!("rating {rating} out of range 1..=5")));
  }
  Ok(())
}

fn validate_review_id(review_id: i64) -> Result<()> {
  if review_id <= 0 {
    return Err(Error::Validation("missing review_id".to_string()));
  }
  Ok(())
}

/// A durably recorded action. `since` is the strictly-increasing insertion
/// key; replay preserves this order across process restarts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingAction {
  pub since: i64,
  pub action: Action,
}

/// Records mutation intent and applies it optimistically before any network
/// round-trip completes.
pub struct ActionQueue {
  store: Arc<LocalStore>,
  cache: Arc<EntityCache>,
}

impl ActionQueue {
  pub fn new(store: Arc<LocalStore>, cache: Arc<EntityCache>) -> Self {
    Self { store, cache }
  }

  /// Apply the optimistic local mutation: the in-memory entity first (so the
  /// UI reflects the change immediately), then the matching local store
  /// record. Assigns a placeholder id to a new review that lacks one and
  /// returns the (possibly rewritten) action.
  pub fn enqueue(&self, action: Action) -> Result<Action> {
    action.validate()?;

    let action = match action {
      Action::AddReview {
        restaurant_id,
        review_id: None,
        name,
        rating,
        comments,
      } => Action::AddReview {
        restaurant_id,
        review_id: Some(monotonic_micros()),
        name,
        rating,
        comments,
      },
      other => other,
    };

    self.cache.apply_action(&action)?;
    debug!(kind = action.kind(), restaurant_id = action.restaurant_id(), "applied optimistic mutation");
    Ok(action)
  }

  /// Persist the action for later replay.
  pub fn record(&self, action: &Action) -> Result<PendingAction> {
    let pending = PendingAction {
      since: monotonic_micros(),
      action: action.clone(),
    };
    self.store.put_action(&pending)?;
    Ok(pending)
  }

  /// Delete one pending action by key.
  pub fn remove(&self, since: i64) -> Result<()> {
    self.store.remove_action(since)
  }

  /// Every pending action, `since` ascending.
  pub fn list_all(&self) -> Result<Vec<PendingAction>> {
    self.store.list_actions()
  }
}
