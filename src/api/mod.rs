//! Remote API surface: domain entities, the client trait seam, and the
//! reqwest implementation.

pub mod client;
pub mod remote;
pub mod types;

pub use client::ApiClient;
pub use remote::RemoteApi;
