//! reqwest-based implementation of [`RemoteApi`].

use futures::future::BoxFuture;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use crate::api::remote::RemoteApi;
use crate::api::types::{Restaurant, Review, ReviewDraft};
use crate::config::Config;
use crate::error::{Error, Result};

/// REST client for the restaurant reviews API.
#[derive(Clone)]
pub struct ApiClient {
  http: reqwest::Client,
  base: Url,
}

impl ApiClient {
  pub fn new(config: &Config) -> Result<Self> {
    let base = Url::parse(&config.api.url)
      .map_err(|e| Error::Validation(format!("invalid API url {}: {}", config.api.url, e)))?;

    let http = reqwest::Client::builder()
      .build()
      .map_err(|e| Error::Network(format!("failed to create HTTP client: {e}")))?;

    Ok(Self { http, base })
  }

  fn endpoint(&self, path: &str) -> Result<Url> {
    self
      .base
      .join(path)
      .map_err(|e| Error::Validation(format!("invalid endpoint {path}: {e}")))
  }

  /// Map a response per the error contract: 2xx parses JSON, 4xx is a stale
  /// reference, everything else is a network-class failure.
  async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if status.is_success() {
      return Ok(response.json::<T>().await?);
    }
    Err(status_error(status))
  }

  async fn read_unit(response: Response) -> Result<()> {
    let status = response.status();
    if status.is_success() {
      return Ok(());
    }
    Err(status_error(status))
  }
}

fn status_error(status: StatusCode) -> Error {
  if status.is_client_error() {
    Error::StaleReference {
      status: status.as_u16(),
    }
  } else {
    Error::Network(format!("server responded with status {status}"))
  }
}

impl RemoteApi for ApiClient {
  fn fetch_restaurants(&self) -> BoxFuture<'_, Result<Vec<Restaurant>>> {
    Box::pin(async move {
      let url = self.endpoint("restaurants")?;
      let response = self.http.get(url).send().await?;
      Self::read_json(response).await
    })
  }

  fn fetch_restaurant(&self, id: i64) -> BoxFuture<'_, Result<Restaurant>> {
    Box::pin(async move {
      let url = self.endpoint(&format!("restaurants/{id}"))?;
      let response = self.http.get(url).send().await?;
      Self::read_json(response).await
    })
  }

  fn fetch_reviews(&self, restaurant_id: i64) -> BoxFuture<'_, Result<Vec<Review>>> {
    Box::pin(async move {
      let mut url = self.endpoint("reviews")?;
      url
        .query_pairs_mut()
        .append_pair("restaurant_id", &restaurant_id.to_string());
      let response = self.http.get(url).send().await?;
      Self::read_json(response).await
    })
  }

  fn set_favorite(
    &self,
    restaurant_id: i64,
    favorite: bool,
  ) -> BoxFuture<'_, Result<Restaurant>> {
    Box::pin(async move {
      let mut url = self.endpoint(&format!("restaurants/{restaurant_id}"))?;
      url
        .query_pairs_mut()
        .append_pair("is_favorite", if favorite { "true" } else { "false" });
      let response = self.http.patch(url).send().await?;
      Self::read_json(response).await
    })
  }

  fn create_review(&self, draft: &ReviewDraft) -> BoxFuture<'_, Result<Review>> {
    let draft = draft.clone();
    Box::pin(async move {
      let url = self.endpoint("reviews")?;
      let response = self.http.post(url).json(&draft).send().await?;
      Self::read_json(response).await
    })
  }

  fn update_review(&self, review_id: i64, draft: &ReviewDraft) -> BoxFuture<'_, Result<Review>> {
    let draft = draft.clone();
    Box::pin(async move {
      let url = self.endpoint(&format!("reviews/{review_id}"))?;
      let response = self.http.patch(url).json(&draft).send().await?;
      Self::read_json(response).await
    })
  }

  fn delete_review(&self, review_id: i64) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
      let url = self.endpoint(&format!("reviews/{review_id}"))?;
      let response = self.http.delete(url).send().await?;
      Self::read_unit(response).await
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_status_mapping() {
    assert!(status_error(StatusCode::NOT_FOUND).is_stale_reference());
    assert!(status_error(StatusCode::GONE).is_stale_reference());
    assert!(status_error(StatusCode::INTERNAL_SERVER_ERROR).is_network());
    assert!(status_error(StatusCode::BAD_GATEWAY).is_network());
  }

  #[test]
  fn test_endpoint_join() {
    let config = Config::default();
    let client = ApiClient::new(&config).unwrap();
    let url = client.endpoint("restaurants/3").unwrap();
    assert_eq!(url.as_str(), "http://localhost:1337/restaurants/3");
  }
}
