//! In-memory authoritative view of currently-loaded entities.
//!
//! Reads prefer memory, then the network, then the local store. The memory
//! collection is a session-scoped cache with no TTL: once populated it serves
//! reads until the process ends. All successful remote reads schedule a
//! write-through reconciliation that callers never block on.

use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::api::remote::RemoteApi;
use crate::api::types::{Restaurant, Review};
use crate::error::{Error, Result};
use crate::queue::Action;
use crate::store::policy::SyncPolicy;
use crate::store::storage::LocalStore;
use crate::util::now_iso;

pub struct EntityCache {
  api: Arc<dyn RemoteApi>,
  store: Arc<LocalStore>,
  policy: Arc<SyncPolicy>,
  /// Session memory. Guarded by a plain mutex; mutations complete their
  /// synchronous portion without yielding, so cooperative tasks never observe
  /// a half-updated collection.
  memory: Mutex<Option<Vec<Restaurant>>>,
}

impl EntityCache {
  pub fn new(api: Arc<dyn RemoteApi>, store: Arc<LocalStore>, policy: Arc<SyncPolicy>) -> Self {
    Self {
      api,
      store,
      policy,
      memory: Mutex::new(None),
    }
  }

  fn memory(&self) -> MutexGuard<'_, Option<Vec<Restaurant>>> {
    self.memory.lock().unwrap_or_else(|e| e.into_inner())
  }

  /// Clone of the in-memory collection, if this session has one.
  pub fn memory_snapshot(&self) -> Option<Vec<Restaurant>> {
    self.memory().clone()
  }

  #[cfg(test)]
  pub(crate) fn prime_memory(&self, list: Vec<Restaurant>) {
    *self.memory() = Some(list);
  }

  /// Fetch every restaurant: memory → network (with write-through) → local
  /// store. Fails with [`Error::DataUnavailable`] only when all three miss.
  pub async fn fetch_all(&self) -> Result<Vec<Restaurant>> {
    if let Some(list) = self.memory_snapshot() {
      if !list.is_empty() {
        return Ok(list);
      }
    }

    match self.api.fetch_restaurants().await {
      Ok(list) => {
        *self.memory() = Some(list.clone());
        self.spawn_write_through(list.clone());
        Ok(list)
      }
      Err(e) => {
        debug!(error = %e, "restaurant list fetch failed, falling back to local store");
        let stored = self.store.get_all_restaurants()?;
        if stored.is_empty() {
          return Err(Error::DataUnavailable {
            entity: "restaurant",
            id: None,
          });
        }
        *self.memory() = Some(stored.clone());
        Ok(stored)
      }
    }
  }

  /// Fetch one restaurant by id. A remote fetch joins the restaurant resource
  /// with its reviews into a single entity before returning.
  pub async fn fetch_by_id(&self, id: i64) -> Result<Restaurant> {
    if let Some(list) = self.memory().as_ref() {
      if let Some(found) = list.iter().find(|r| r.id == id) {
        return Ok(found.clone());
      }
    }

    match self.fetch_joint(id).await {
      Ok(restaurant) => {
        self
          .memory()
          .get_or_insert_with(Vec::new)
          .push(restaurant.clone());
        self.spawn_write_through(vec![restaurant.clone()]);
        Ok(restaurant)
      }
      Err(e) => {
        debug!(id, error = %e, "restaurant fetch failed, falling back to local store");
        self
          .store
          .get_restaurant(id)?
          .ok_or(Error::DataUnavailable {
            entity: "restaurant",
            id: Some(id),
          })
      }
    }
  }

  async fn fetch_joint(&self, id: i64) -> Result<Restaurant> {
    let (mut restaurant, reviews) =
      futures::try_join!(self.api.fetch_restaurant(id), self.api.fetch_reviews(id))?;
    restaurant.reviews = reviews;
    Ok(restaurant)
  }

  /// Reconcile fetched entities into the local store without blocking the
  /// caller.
  fn spawn_write_through(&self, list: Vec<Restaurant>) {
    let policy = Arc::clone(&self.policy);
    tokio::spawn(async move {
      if let Err(e) = policy.reconcile_all(&list).await {
        warn!(error = %e, "write-through reconciliation failed");
      }
    });
  }

  /// Apply a mutation intent to the affected restaurant, in memory and in the
  /// local store. Synchronous by design: the UI sees the change before any
  /// network round-trip starts.
  pub fn apply_action(&self, action: &Action) -> Result<()> {
    let id = action.restaurant_id();

    {
      let mut memory = self.memory();
      if let Some(found) = memory
        .as_mut()
        .and_then(|list| list.iter_mut().find(|r| r.id == id))
      {
        mutate(found, action);
      }
    }

    // Mirror into the durable shadow. Prefer the freshly-mutated in-memory
    // record so memory and store cannot drift apart.
    let mirrored = self
      .memory()
      .as_ref()
      .and_then(|list| list.iter().find(|r| r.id == id).cloned());

    match mirrored {
      Some(restaurant) => self.store.put_restaurant(&restaurant),
      None => match self.store.get_restaurant(id)? {
        Some(mut stored) => {
          mutate(&mut stored, action);
          self.store.put_restaurant(&stored)
        }
        None => {
          // Nothing loaded and nothing stored; the queued action alone
          // carries the intent until the entity is fetched.
          debug!(id, "optimistic mutation targets an unloaded restaurant");
          Ok(())
        }
      },
    }
  }

  /// Replace a placeholder review with its server-confirmed counterpart once
  /// an AddReview replay succeeds, so the shadow converges without waiting
  /// for the next full fetch.
  pub fn confirm_review(&self, placeholder_id: i64, confirmed: &Review) -> Result<()> {
    let id = confirmed.restaurant_id;

    {
      let mut memory = self.memory();
      if let Some(found) = memory
        .as_mut()
        .and_then(|list| list.iter_mut().find(|r| r.id == id))
      {
        replace_review(found, placeholder_id, confirmed);
      }
    }

    if let Some(mut stored) = self.store.get_restaurant(id)? {
      replace_review(&mut stored, placeholder_id, confirmed);
      self.store.put_restaurant(&stored)?;
    }

    Ok(())
  }
}

fn mutate(restaurant: &mut Restaurant, action: &Action) {
  match action {
    Action::SetFavorite { favorite, .. } => {
      restaurant.is_favorite = *favorite;
    }
    Action::AddReview {
      restaurant_id,
      review_id,
      name,
      rating,
      comments,
    } => {
      let now = now_iso();
      restaurant.reviews.push(Review {
        // enqueue assigns the placeholder before the action reaches here
        id: review_id.unwrap_or_default(),
        restaurant_id: *restaurant_id,
        name: name.clone(),
        rating: *rating,
        comments: comments.clone(),
        created_at: Some(now.clone()),
        updated_at: Some(now),
      });
    }
    Action::EditReview {
      review_id,
      name,
      rating,
      comments,
      ..
    } => {
      if let Some(pos) = restaurant.review_position(*review_id) {
        let review = &mut restaurant.reviews[pos];
        review.name = name.clone();
        review.rating = *rating;
        review.comments = comments.clone();
        review.updated_at = Some(now_iso());
      }
    }
    Action::DeleteReview { review_id, .. } => {
      if let Some(pos) = restaurant.review_position(*review_id) {
        restaurant.reviews.remove(pos);
      }
    }
  }
}

fn replace_review(restaurant: &mut Restaurant, placeholder_id: i64, confirmed: &Review) {
  match restaurant.review_position(placeholder_id) {
    Some(pos) => restaurant.reviews[pos] = confirmed.clone(),
    None if restaurant.review_position(confirmed.id).is_none() => {
      restaurant.reviews.push(confirmed.clone());
    }
    None => {}
  }
}
