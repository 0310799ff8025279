//! Composition root: wires the client, store, cache, queue and replay engine
//! into the surface the UI layer consumes.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::api::client::ApiClient;
use crate::api::remote::RemoteApi;
use crate::api::types::Restaurant;
use crate::cache::EntityCache;
use crate::config::Config;
use crate::error::Result;
use crate::notify::{LogNotifier, Notifier};
use crate::queue::{Action, ActionQueue};
use crate::replay::{FlushReport, ReplayEngine};
use crate::store::policy::SyncPolicy;
use crate::store::storage::LocalStore;

/// The offline-first synchronization engine. Constructed once per process and
/// passed by reference to whatever drives the UI; all cache and id-remap state
/// lives in the instance, never in ambient statics.
pub struct SyncEngine {
  cache: Arc<EntityCache>,
  replay: Arc<ReplayEngine>,
  flush_interval: Duration,
}

impl SyncEngine {
  /// Build the engine from configuration: reqwest client against the
  /// configured API, SQLite store at the configured path, log-backed
  /// notifications.
  pub fn new(config: &Config) -> Result<Self> {
    let api = Arc::new(ApiClient::new(config)?);
    let store = Arc::new(LocalStore::open(&config.database_path()?)?);
    Ok(Self::from_parts(
      api,
      store,
      Arc::new(LogNotifier),
      config.flush_interval(),
    ))
  }

  /// Assemble from explicit collaborators. Tests use this with an in-memory
  /// store and a fake remote.
  pub fn from_parts(
    api: Arc<dyn RemoteApi>,
    store: Arc<LocalStore>,
    notifier: Arc<dyn Notifier>,
    flush_interval: Duration,
  ) -> Self {
    let policy = Arc::new(SyncPolicy::new(store.clone()));
    let cache = Arc::new(EntityCache::new(api.clone(), store.clone(), policy));
    let queue = Arc::new(ActionQueue::new(store, cache.clone()));
    let replay = Arc::new(ReplayEngine::new(api, queue, cache.clone(), notifier));

    Self {
      cache,
      replay,
      flush_interval,
    }
  }

  /// All restaurants: memory first, then network, then the local store.
  pub async fn fetch_restaurants(&self) -> Result<Vec<Restaurant>> {
    self.cache.fetch_all().await
  }

  /// One restaurant with its reviews embedded.
  pub async fn fetch_restaurant_by_id(&self, id: i64) -> Result<Restaurant> {
    self.cache.fetch_by_id(id).await
  }

  /// Restaurants matching the given filters; `None` matches everything.
  pub async fn fetch_by_cuisine_and_neighborhood(
    &self,
    cuisine: Option<&str>,
    neighborhood: Option<&str>,
  ) -> Result<Vec<Restaurant>> {
    let restaurants = self.fetch_restaurants().await?;
    Ok(
      restaurants
        .into_iter()
        .filter(|r| cuisine.map_or(true, |c| r.cuisine_type == c))
        .filter(|r| neighborhood.map_or(true, |n| r.neighborhood == n))
        .collect(),
    )
  }

  /// Distinct neighborhoods across all known restaurants, sorted.
  pub async fn neighborhoods(&self) -> Result<Vec<String>> {
    let restaurants = self.fetch_restaurants().await?;
    let set: BTreeSet<String> = restaurants.into_iter().map(|r| r.neighborhood).collect();
    Ok(set.into_iter().collect())
  }

  /// Distinct cuisine types across all known restaurants, sorted.
  pub async fn cuisines(&self) -> Result<Vec<String>> {
    let restaurants = self.fetch_restaurants().await?;
    let set: BTreeSet<String> = restaurants.into_iter().map(|r| r.cuisine_type).collect();
    Ok(set.into_iter().collect())
  }

  /// Apply a user mutation optimistically and push it to the server, queueing
  /// it for replay when the server is unreachable.
  pub async fn perform_action(&self, action: Action) -> Result<()> {
    self.replay.perform_action(action).await
  }

  /// Drain the pending queue once. The periodic sweep calls this; embedders
  /// may also call it directly, e.g. on a connectivity-restored signal.
  pub async fn flush_once(&self) -> Result<FlushReport> {
    self.replay.flush_once().await
  }

  /// Spawn the periodic replay sweep on the current runtime.
  pub fn spawn_flush_loop(&self) -> JoinHandle<()> {
    let replay = Arc::clone(&self.replay);
    let interval = self.flush_interval;
    tokio::spawn(replay.run(interval))
  }
}
