//! Retry and backoff policy.
//!
//! Holds the shared [`RetryPolicy`], its per-call overrides ([`RunOptions`]),
//! the backoff schedules, and the predicates the connection-retry layer uses
//! to decide whether a response or transport failure deserves another attempt.

mod classify;
mod policy;

pub use classify::{should_retry_error, should_retry_response};
pub use policy::{Backoff, Deadline, RetryPolicy, RunOptions};
