//! Offline-first data synchronization core for a restaurant reviews client.
//!
//! The crate keeps a local SQLite shadow of a remote REST API, serves reads
//! memory-first with network and local fallbacks, records user mutations in a
//! durable queue when the server is unreachable, and replays them later,
//! remapping client-assigned placeholder ids to server-assigned ones.
//!
//! The entry point is [`SyncEngine`], constructed once per process and handed
//! by reference to whatever drives the UI.

pub mod api;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod notify;
pub mod queue;
pub mod replay;
pub mod store;
pub mod util;

#[cfg(test)]
pub(crate) mod testutil;

pub use api::types::{Restaurant, Review, ReviewDraft};
pub use config::Config;
pub use engine::SyncEngine;
pub use error::{Error, Result};
pub use notify::Notifier;
pub use queue::Action;
