pub mod client;
pub(crate) mod transport;
pub mod types;

pub use client::Client;
pub use types::{Envelope, Prediction, PredictionStatus, Submission, UploadedFile};

use serde_json::{Map, Value};

use crate::error::Result;
use crate::retry::{Deadline, RetryPolicy};

/// The two remote operations the orchestration layer is built on.
///
/// [`Client`] talks HTTP; tests substitute an in-memory implementation.
/// A `budget`, when given, bounds the call and all of its connection retries;
/// running out of it yields [`Error::WaitTimeout`](crate::Error::WaitTimeout).
#[allow(async_fn_in_trait)]
pub trait PredictionService {
    /// Create a prediction. In sync mode the service blocks until it finishes.
    async fn create_prediction(
        &self,
        model: &str,
        input: &Map<String, Value>,
        sync: bool,
        policy: &RetryPolicy,
        budget: Option<Deadline>,
    ) -> Result<Submission>;

    /// Fetch the current state of a prediction once.
    async fn fetch_prediction(
        &self,
        id: &str,
        policy: &RetryPolicy,
        budget: Option<Deadline>,
    ) -> Result<Prediction>;
}
