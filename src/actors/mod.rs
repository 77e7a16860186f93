//! Actor-based check pipeline
//!
//! Each stage runs as a set of independent async tasks communicating via
//! bounded Tokio channels.
//!
//! ## Architecture Overview
//!
//! ```text
//!   ┌──────────────┐  pop / reinsert / back off
//!   │  Due queue   │◀──────────────────────────────┐
//!   └──────────────┘                               │
//!          ▲                              ┌────────┴───────┐
//!          │ re-arm                       │   Scheduler    │ (1 task)
//!          │                              └────────┬───────┘
//!          │                                       │ JobPayload
//!          │                              ┌────────▼───────┐
//!          │                              │    Executor    │ (N workers, limiter)
//!          │                              └────────┬───────┘
//!          │                                       │ HttpResult
//!          │                              ┌────────▼───────┐
//!          └──────────────────────────────┤ResultProcessor │ (router, M + K lane workers)
//!                                         └────────┬───────┘
//!                                                  │ AlertEvent
//!                                         ┌────────▼───────┐
//!                                         │  AlertService  │ (P workers)
//!                                         └────────────────┘
//! ```
//!
//! ## Shutdown
//!
//! Only the scheduler listens to the lifetime token. Every later stage stops
//! when its input channel is closed and drained, which happens once the
//! stage before it has exited and dropped its senders:
//!
//! 1. cancel token, scheduler exits and drops the job sender
//! 2. [`executor::ExecutorHandle::stop`]
//! 3. [`result::ResultProcessor::workers_closing_wait`]
//! 4. [`alert::AlertService::worker_closing_wait`]

pub mod alert;
pub mod executor;
pub mod messages;
pub mod result;
pub mod scheduler;
