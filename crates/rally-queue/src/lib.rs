//! In-process job tracking and work distribution.
//!
//! This crate provides:
//! - A job store enforcing the `pending -> processing -> success|error`
//!   lifecycle
//! - A bounded work queue that rejects submissions when full

pub mod error;
pub mod queue;
pub mod store;

pub use error::{QueueError, QueueResult};
pub use queue::{WorkQueue, WorkReceiver};
pub use store::JobStore;
