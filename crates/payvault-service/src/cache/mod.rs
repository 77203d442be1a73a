//! Caching infrastructure for the service layer.
//!
//! An in-memory TTL map for payment records and history pages, optionally
//! mirrored to a [`PersistentStore`](payvault_core::PersistentStore) so data
//! survives across sessions.

pub mod cache_keys;
mod file_store;
mod local_cache;

pub use file_store::FileCacheStore;
pub use local_cache::{CacheStats, LocalCache, DEFAULT_TTL};
