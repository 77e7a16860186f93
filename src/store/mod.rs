//! Due-queue store and monitor snapshot cache
//!
//! The due queue is a sorted set: the score is the next-due Unix timestamp,
//! the member is the monitor identifier. Each monitor has at most one entry,
//! re-adding a member overwrites its score.
//!
//! ## Backends
//!
//! - **Redis** (default): sorted set plus expiring snapshot keys
//! - **In-Memory**: same ordering semantics, for tests and single-node runs

pub mod backend;
pub mod error;
pub mod memory;
pub mod redis;
pub mod retry;

pub use backend::{DueEntry, DueQueue, SNAPSHOT_TTL, SnapshotCache};
pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use self::redis::RedisStore;
