//! In-process fakes shared by the unit tests.

use futures::future::BoxFuture;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use crate::api::remote::RemoteApi;
use crate::api::types::{Restaurant, Review, ReviewDraft};
use crate::error::{Error, Result};
use crate::notify::Notifier;
use crate::util::now_iso;

#[derive(Default)]
struct FakeState {
  restaurants: Vec<Restaurant>,
  reviews: Vec<Review>,
  next_review_id: i64,
  last_created_review_id: Option<i64>,
}

/// Deterministic in-memory stand-in for the remote API. Supports going
/// offline wholesale or failing specific endpoints, and records every call.
pub struct FakeRemote {
  state: Mutex<FakeState>,
  offline: AtomicBool,
  failing: Mutex<HashSet<&'static str>>,
  holds: Mutex<HashMap<&'static str, Arc<Notify>>>,
  calls: Mutex<Vec<String>>,
}

impl FakeRemote {
  pub fn new(restaurants: Vec<Restaurant>) -> Arc<Self> {
    Arc::new(Self {
      state: Mutex::new(FakeState {
        restaurants,
        reviews: Vec::new(),
        next_review_id: 100,
        last_created_review_id: None,
      }),
      offline: AtomicBool::new(false),
      failing: Mutex::new(HashSet::new()),
      holds: Mutex::new(HashMap::new()),
      calls: Mutex::new(Vec::new()),
    })
  }

  pub fn set_offline(&self, offline: bool) {
    self.offline.store(offline, Ordering::Relaxed);
  }

  /// Fail every call to the named endpoint with a network error.
  pub fn fail_network_on(&self, name: &'static str) {
    self.failing.lock().unwrap().insert(name);
  }

  pub fn clear_failures(&self) {
    self.failing.lock().unwrap().clear();
  }

  /// Suspend the next call to the named endpoint until the returned handle is
  /// notified. One-shot: later calls proceed normally.
  pub fn hold_on(&self, name: &'static str) -> Arc<Notify> {
    let notify = Arc::new(Notify::new());
    self.holds.lock().unwrap().insert(name, notify.clone());
    notify
  }

  async fn wait_if_held(&self, name: &'static str) {
    let held = self.holds.lock().unwrap().remove(name);
    if let Some(notify) = held {
      notify.notified().await;
    }
  }

  pub fn push_review(&self, review: Review) {
    self.state.lock().unwrap().reviews.push(review);
  }

  pub fn restaurant(&self, id: i64) -> Option<Restaurant> {
    self
      .state
      .lock()
      .unwrap()
      .restaurants
      .iter()
      .find(|r| r.id == id)
      .cloned()
  }

  pub fn last_created_review_id(&self) -> Option<i64> {
    self.state.lock().unwrap().last_created_review_id
  }

  pub fn call_count(&self, name: &str) -> usize {
    self
      .calls
      .lock()
      .unwrap()
      .iter()
      .filter(|c| c.split(':').next() == Some(name))
      .count()
  }

  pub fn calls_named(&self, name: &str) -> Vec<String> {
    self
      .calls
      .lock()
      .unwrap()
      .iter()
      .filter(|c| c.split(':').next() == Some(name))
      .cloned()
      .collect()
  }

  /// Record the call, then surface any injected failure.
  fn gate(&self, call: String, name: &'static str) -> Result<()> {
    self.calls.lock().unwrap().push(call);
    if self.offline.load(Ordering::Relaxed) {
      return Err(Error::Network("offline".to_string()));
    }
    if self.failing.lock().unwrap().contains(name) {
      return Err(Error::Network(format!("injected failure for {name}")));
    }
    Ok(())
  }
}

impl RemoteApi for FakeRemote {
  fn fetch_restaurants(&self) -> BoxFuture<'_, Result<Vec<Restaurant>>> {
    Box::pin(async move {
      self.gate("fetch_restaurants".to_string(), "fetch_restaurants")?;
      Ok(self.state.lock().unwrap().restaurants.clone())
    })
  }

  fn fetch_restaurant(&self, id: i64) -> BoxFuture<'_, Result<Restaurant>> {
    Box::pin(async move {
      self.gate(format!("fetch_restaurant:{id}"), "fetch_restaurant")?;
      self
        .restaurant(id)
        .ok_or(Error::StaleReference { status: 404 })
    })
  }

  fn fetch_reviews(&self, restaurant_id: i64) -> BoxFuture<'_, Result<Vec<Review>>> {
    Box::pin(async move {
      self.gate(format!("fetch_reviews:{restaurant_id}"), "fetch_reviews")?;
      Ok(
        self
          .state
          .lock()
          .unwrap()
          .reviews
          .iter()
          .filter(|r| r.restaurant_id == restaurant_id)
          .cloned()
          .collect(),
      )
    })
  }

  fn set_favorite(
    &self,
    restaurant_id: i64,
    favorite: bool,
  ) -> BoxFuture<'_, Result<Restaurant>> {
    Box::pin(async move {
      self.wait_if_held("set_favorite").await;
      self.gate(format!("set_favorite:{restaurant_id}"), "set_favorite")?;
      let mut state = self.state.lock().unwrap();
      let restaurant = state
        .restaurants
        .iter_mut()
        .find(|r| r.id == restaurant_id)
        .ok_or(Error::StaleReference { status: 404 })?;
      restaurant.is_favorite = favorite;
      restaurant.updated_at = Some(now_iso());
      Ok(restaurant.clone())
    })
  }

  fn create_review(&self, draft: &ReviewDraft) -> BoxFuture<'_, Result<Review>> {
    let draft = draft.clone();
    Box::pin(async move {
      self.wait_if_held("create_review").await;
      self.gate(
        format!("create_review:{}", draft.restaurant_id),
        "create_review",
      )?;
      let mut state = self.state.lock().unwrap();
      if !state.restaurants.iter().any(|r| r.id == draft.restaurant_id) {
        return Err(Error::StaleReference { status: 404 });
      }
      let id = state.next_review_id;
      state.next_review_id += 1;
      state.last_created_review_id = Some(id);
      let now = now_iso();
      let review = Review {
        id,
        restaurant_id: draft.restaurant_id,
        name: draft.name,
        rating: draft.rating,
        comments: draft.comments,
        created_at: Some(now.clone()),
        updated_at: Some(now),
      };
      state.reviews.push(review.clone());
      Ok(review)
    })
  }

  fn update_review(&self, review_id: i64, draft: &ReviewDraft) -> BoxFuture<'_, Result<Review>> {
    let draft = draft.clone();
    Box::pin(async move {
      self.gate(format!("update_review:{review_id}"), "update_review")?;
      let mut state = self.state.lock().unwrap();
      let review = state
        .reviews
        .iter_mut()
        .find(|r| r.id == review_id)
        .ok_or(Error::StaleReference { status: 404 })?;
      review.name = draft.name;
      review.rating = draft.rating;
      review.comments = draft.comments;
      review.updated_at = Some(now_iso());
      Ok(review.clone())
    })
  }

  fn delete_review(&self, review_id: i64) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
      self.gate(format!("delete_review:{review_id}"), "delete_review")?;
      let mut state = self.state.lock().unwrap();
      let position = state
        .reviews
        .iter()
        .position(|r| r.id == review_id)
        .ok_or(Error::StaleReference { status: 404 })?;
      state.reviews.remove(position);
      Ok(())
    })
  }
}

/// Notifier that collects messages for assertions.
#[derive(Default)]
pub struct RecordingNotifier {
  messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
  pub fn messages(&self) -> Vec<String> {
    self.messages.lock().unwrap().clone()
  }
}

impl Notifier for RecordingNotifier {
  fn notify(&self, message: &str) {
    self.messages.lock().unwrap().push(message.to_string());
  }
}

/// Shared test fixtures and wiring helpers.
pub mod fixtures {
  use super::*;
  use crate::cache::EntityCache;
  use crate::store::policy::SyncPolicy;
  use crate::store::storage::LocalStore;

  pub fn restaurant(id: i64) -> Restaurant {
    Restaurant {
      id,
      name: format!("Restaurant {id}"),
      neighborhood: "Downtown".to_string(),
      cuisine_type: "Italian".to_string(),
      address: String::new(),
      latlng: None,
      photograph: None,
      is_favorite: false,
      created_at: Some("2024-01-01T00:00:00.000Z".to_string()),
      updated_at: Some("2024-01-01T00:00:00.000Z".to_string()),
      reviews: Vec::new(),
    }
  }

  pub fn review(id: i64, restaurant_id: i64, updated_at: &str) -> Review {
    Review {
      id,
      restaurant_id,
      name: "Reviewer".to_string(),
      rating: 4,
      comments: String::new(),
      created_at: Some(updated_at.to_string()),
      updated_at: Some(updated_at.to_string()),
    }
  }

  /// Cache with an empty store and session memory; the fake remote is seeded
  /// with `restaurants`.
  pub fn cache_with_remote(
    restaurants: Vec<Restaurant>,
  ) -> (Arc<EntityCache>, Arc<LocalStore>, Arc<FakeRemote>) {
    let remote = FakeRemote::new(restaurants);
    let store = Arc::new(LocalStore::open_in_memory().unwrap());
    let policy = Arc::new(SyncPolicy::new(store.clone()));
    let cache = Arc::new(EntityCache::new(remote.clone(), store.clone(), policy));
    (cache, store, remote)
  }

  /// Cache with `restaurants` already loaded in session memory, mirrored in
  /// the store, and known to the fake remote.
  pub fn cache_with_store(
    restaurants: Vec<Restaurant>,
  ) -> (Arc<EntityCache>, Arc<LocalStore>, Arc<FakeRemote>) {
    let (cache, store, remote) = cache_with_remote(restaurants.clone());
    for restaurant in &restaurants {
      store.put_restaurant(restaurant).unwrap();
    }
    cache.prime_memory(restaurants);
    (cache, store, remote)
  }
}
