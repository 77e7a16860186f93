//! Relational persistence for monitors and incidents
//!
//! This is the system of record behind the pipeline. The pipeline talks to it
//! through two narrow traits:
//!
//! - [`MonitorRepository`]: monitor definitions and last check outcome
//! - [`IncidentStore`]: failure streaks, at most one open per monitor
//!
//! ## Backends
//!
//! - **SQLite** (default): embedded database with migrations
//! - **In-Memory** (fallback): no persistence, for testing
//!
//! ## Usage
//!
//! ```no_run
//! use heartbeat::storage::sqlite::SqliteBackend;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let backend = SqliteBackend::new("./monitors.db").await?;
//!     // Hand the backend to the pipeline as repository and incident store
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod error;
pub mod memory;
pub mod schema;
#[cfg(feature = "storage-sqlite")]
pub mod sqlite;

pub use backend::{IncidentStore, MonitorRepository};
pub use error::{StorageError, StorageResult};
pub use memory::MemoryBackend;
pub use schema::{Incident, IncidentUpdate};
