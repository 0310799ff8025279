//! Trait seam in front of the remote REST API.

use futures::future::BoxFuture;

use crate::api::types::{Restaurant, Review, ReviewDraft};
use crate::error::Result;

/// Remote API collaborator.
///
/// Boxed futures keep the trait object-safe so the engine can hold an
/// `Arc<dyn RemoteApi>` and tests can substitute an in-process fake.
///
/// Error contract: transport failures and 5xx responses surface as
/// [`crate::Error::Network`]; 4xx responses surface as
/// [`crate::Error::StaleReference`]. The replay engine branches on that
/// distinction.
pub trait RemoteApi: Send + Sync {
  /// `GET /restaurants`
  fn fetch_restaurants(&self) -> BoxFuture<'_, Result<Vec<Restaurant>>>;

  /// `GET /restaurants/{id}`
  fn fetch_restaurant(&self, id: i64) -> BoxFuture<'_, Result<Restaurant>>;

  /// `GET /reviews?restaurant_id={id}`
  fn fetch_reviews(&self, restaurant_id: i64) -> BoxFuture<'_, Result<Vec<Review>>>;

  /// `PATCH /restaurants/{id}?is_favorite={favorite}`
  fn set_favorite(&self, restaurant_id: i64, favorite: bool)
    -> BoxFuture<'_, Result<Restaurant>>;

  /// `POST /reviews`; the response carries the server-assigned review id
  fn create_review(&self, draft: &ReviewDraft) -> BoxFuture<'_, Result<Review>>;

  /// `PATCH /reviews/{id}`
  fn update_review(&self, review_id: i64, draft: &ReviewDraft) -> BoxFuture<'_, Result<Review>>;

  /// `DELETE /reviews/{id}`
  fn delete_review(&self, review_id: i64) -> BoxFuture<'_, Result<()>>;
}
