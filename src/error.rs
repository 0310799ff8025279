use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy for the synchronization core.
///
/// Read paths fall back on [`Error::Network`] and only surface
/// [`Error::DataUnavailable`] once every source is exhausted. Write paths
/// never surface errors past the optimistic local mutation; a failed remote
/// call is queued for replay instead.
#[derive(Debug, Error)]
pub enum Error {
  /// Transport-level failure or a server error response (5xx).
  /// Reads fall back to the local store; writes are queued for retry.
  #[error("network error: {0}")]
  Network(String),

  /// Neither memory, network, nor the local store holds the requested entity.
  #[error("no {entity} data available for id {id:?}")]
  DataUnavailable {
    entity: &'static str,
    id: Option<i64>,
  },

  /// The server rejected the request as a client error (4xx). During queue
  /// replay this marks the referenced resource as gone for good.
  #[error("server rejected request with status {status}")]
  StaleReference { status: u16 },

  /// Malformed payload, rejected before any network or store I/O.
  #[error("invalid payload: {0}")]
  Validation(String),

  /// Local persistence failure.
  #[error("store error: {0}")]
  Store(String),
}

impl Error {
  pub fn is_network(&self) -> bool {
    matches!(self, Error::Network(_))
  }

  pub fn is_stale_reference(&self) -> bool {
    matches!(self, Error::StaleReference { .. })
  }
}

impl From<rusqlite::Error> for Error {
  fn from(e: rusqlite::Error) -> Self {
    Error::Store(e.to_string())
  }
}

impl From<serde_json::Error> for Error {
  fn from(e: serde_json::Error) -> Self {
    Error::Store(format!("serialization failed: {e}"))
  }
}

impl From<reqwest::Error> for Error {
  fn from(e: reqwest::Error) -> Self {
    Error::Network(e.to_string())
  }
}
