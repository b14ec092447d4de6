//! Async client for the WaveSpeed inference platform.
//!
//! Submits predictions against named models, waits for them by polling (or
//! in a single blocking request with sync mode), and uploads input media.
//! Failures are retried at two levels:
//!
//! - **connection**: a single HTTP call is repeated on transport errors, 429,
//!   and (for reads only) 5xx, with backoff;
//! - **task**: the whole submit-and-wait sequence is started over, creating a
//!   new remote job, when it ends in a retryable failure.
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use serde_json::json;
//! use wavespeed::{Client, RunOptions};
//!
//! # async fn example() -> wavespeed::Result<()> {
//! let client = Client::new("your-api-key")?;
//!
//! let prediction = client
//!     .run_with_options(
//!         "wavespeed-ai/flux-dev",
//!         &json!({"prompt": "a cat in a spacesuit"}),
//!         &RunOptions::new().timeout(Duration::from_secs(300)).max_retries(1),
//!     )
//!     .await?;
//! println!("{:?}", prediction.outputs);
//!
//! let url = client.upload("input.png").await?;
//! println!("uploaded to {url}");
//! # Ok(())
//! # }
//! ```
//!
//! The library emits `tracing` events; install a subscriber to see them.

pub mod api;
pub mod config;
pub mod error;
pub mod retry;
pub mod runner;

pub use api::{Client, Prediction, PredictionService, PredictionStatus, Submission, UploadedFile};
pub use config::WavespeedConfig;
pub use error::{Error, ErrorKind, Result};
pub use retry::{Backoff, Deadline, RetryPolicy, RunOptions};
