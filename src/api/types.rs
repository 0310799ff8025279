//! Domain entities synchronized between client and server.

use serde::{Deserialize, Deserializer, Serialize};

/// Ids at or above this value are client-assigned placeholders (microsecond
/// epoch values from [`crate::util::monotonic_micros`]). Server ids are small
/// sequential integers, so the two ranges never overlap.
pub const PLACEHOLDER_ID_MIN: i64 = 1_000_000_000_000;

/// True when `id` was generated locally and has not been acknowledged by the
/// server yet.
pub fn is_placeholder_id(id: i64) -> bool {
  id >= PLACEHOLDER_ID_MIN
}

/// A restaurant record with its embedded, ordered review list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Restaurant {
  pub id: i64,
  pub name: String,
  #[serde(default)]
  pub neighborhood: String,
  #[serde(default)]
  pub cuisine_type: String,
  #[serde(default)]
  pub address: String,
  #[serde(default)]
  pub latlng: Option<LatLng>,
  /// Image reference; the server emits this as either a string or a number
  #[serde(default, deserialize_with = "de_photograph")]
  pub photograph: Option<String>,
  /// The server stores this as text after a PATCH, so accept "true"/"false" too
  #[serde(default, deserialize_with = "de_favorite")]
  pub is_favorite: bool,
  #[serde(rename = "createdAt", default)]
  pub created_at: Option<String>,
  /// ISO-8601 staleness marker; absent on locally-originated writes that the
  /// server has not timestamped yet
  #[serde(rename = "updatedAt", default)]
  pub updated_at: Option<String>,
  #[serde(default)]
  pub reviews: Vec<Review>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
  pub lat: f64,
  pub lng: f64,
}

/// A single review, owned by its restaurant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
  pub id: i64,
  pub restaurant_id: i64,
  pub name: String,
  pub rating: u8,
  #[serde(default)]
  pub comments: String,
  #[serde(rename = "createdAt", default)]
  pub created_at: Option<String>,
  #[serde(rename = "updatedAt", default)]
  pub updated_at: Option<String>,
}

impl Review {
  pub fn is_placeholder(&self) -> bool {
    is_placeholder_id(self.id)
  }
}

/// Body shape for `POST /reviews` and `PATCH /reviews/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewDraft {
  pub restaurant_id: i64,
  pub name: String,
  pub rating: u8,
  pub comments: String,
}

impl Restaurant {
  /// Position of a review in the embedded list, by id.
  pub fn review_position(&self, review_id: i64) -> Option<usize> {
    self.reviews.iter().position(|r| r.id == review_id)
  }
}

fn de_favorite<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
  D: Deserializer<'de>,
{
  #[derive(Deserialize)]
  #[serde(untagged)]
  enum BoolOrString {
    Bool(bool),
    Str(String),
  }

  match Option::<BoolOrString>::deserialize(deserializer)? {
    Some(BoolOrString::Bool(b)) => Ok(b),
    Some(BoolOrString::Str(s)) => Ok(s.eq_ignore_ascii_case("true")),
    None => Ok(false),
  }
}

fn de_photograph<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
  D: Deserializer<'de>,
{
  #[derive(Deserialize)]
  #[serde(untagged)]
  enum StringOrNumber {
    Str(String),
    Num(i64),
  }

  Ok(
    Option::<StringOrNumber>::deserialize(deserializer)?.map(|v| match v {
      StringOrNumber::Str(s) => s,
      StringOrNumber::Num(n) => n.to_string(),
    }),
  )
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_favorite_accepts_bool_and_string() {
    let r: Restaurant =
      serde_json::from_str(r#"{"id":1,"name":"A","is_favorite":true}"#).unwrap();
    assert!(r.is_favorite);

    let r: Restaurant =
      serde_json::from_str(r#"{"id":1,"name":"A","is_favorite":"true"}"#).unwrap();
    assert!(r.is_favorite);

    let r: Restaurant =
      serde_json::from_str(r#"{"id":1,"name":"A","is_favorite":"false"}"#).unwrap();
    assert!(!r.is_favorite);

    let r: Restaurant = serde_json::from_str(r#"{"id":1,"name":"A"}"#).unwrap();
    assert!(!r.is_favorite);
  }

  #[test]
  fn test_photograph_accepts_string_and_number() {
    let r: Restaurant =
      serde_json::from_str(r#"{"id":1,"name":"A","photograph":"10"}"#).unwrap();
    assert_eq!(r.photograph.as_deref(), Some("10"));

    let r: Restaurant = serde_json::from_str(r#"{"id":1,"name":"A","photograph":3}"#).unwrap();
    assert_eq!(r.photograph.as_deref(), Some("3"));
  }

  #[test]
  fn test_placeholder_id_range() {
    assert!(!is_placeholder_id(42));
    assert!(is_placeholder_id(crate::util::monotonic_micros()));
  }

  #[test]
  fn test_timestamps_roundtrip_camel_case() {
    let r: Restaurant = serde_json::from_str(
      r#"{"id":1,"name":"A","updatedAt":"2024-03-01T00:00:00.000Z"}"#,
    )
    .unwrap();
    assert_eq!(r.updated_at.as_deref(), Some("2024-03-01T00:00:00.000Z"));
    let json = serde_json::to_value(&r).unwrap();
    assert!(json.get("updatedAt").is_some());
  }
}
