//! Durable local shadow of the remote data, plus the reconciliation policy
//! that decides when incoming payloads may overwrite it.

pub mod policy;
pub mod storage;

pub use policy::SyncPolicy;
pub use storage::LocalStore;
