//! Persistence layer modules.

pub mod cache_repo;
pub mod db;
pub mod eviction;
pub mod schema;

pub use cache_repo::{CacheEntry, CacheStore};
pub use eviction::{spawn_eviction_task, EvictionPolicy, PruneStats};
