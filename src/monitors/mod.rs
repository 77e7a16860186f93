//! Monitor definitions and the HTTP check performed against them

pub mod check;
pub mod model;

pub use check::{CheckOutcome, HttpChecker};
pub use model::{CheckRecord, Monitor, MonitorStatus};
