//! Submit-and-wait orchestration: the polling loop and the task-level retry
//! loop around it.

use std::time::Duration;

use serde_json::{Map, Value};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::api::{Prediction, PredictionService, PredictionStatus, Submission};
use crate::error::{Error, Result};
use crate::retry::{Deadline, RetryPolicy};

/// Poll `id` until it reaches a terminal status or the overall timeout elapses.
///
/// The deadline is checked before every fetch, and each fetch (connection
/// retries included) only gets what is left of it. A transient fetch failure
/// (connection trouble, timeout, 429/5xx surviving the connection retries)
/// is logged and the same prediction is polled again on the next tick; the
/// job is never resubmitted from here.
pub async fn wait_for_completion(
    service: &impl PredictionService,
    id: &str,
    policy: &RetryPolicy,
) -> Result<Prediction> {
    let deadline = policy.wait_deadline();

    loop {
        if let Some(deadline) = deadline.filter(Deadline::is_expired) {
            return Err(deadline.timeout_error());
        }

        match service.fetch_prediction(id, policy, deadline).await {
            Ok(prediction) => {
                debug!(id, status = %prediction.status, "polled prediction");
                match prediction.status {
                    PredictionStatus::Completed => {
                        info!(id, outputs = prediction.outputs.len(), "prediction completed");
                        return Ok(prediction);
                    }
                    PredictionStatus::Failed => {
                        return Err(Error::PredictionFailed {
                            id: id.to_string(),
                            message: prediction.failure_message(),
                        });
                    }
                    _ => {}
                }
            }
            Err(err @ Error::WaitTimeout { .. }) => return Err(err),
            Err(err) if err.is_transient() => {
                warn!(id, "status fetch failed, polling again: {err}");
            }
            Err(err) => return Err(err),
        }

        sleep(next_pause(policy.poll_interval, deadline)).await;
    }
}

// Never sleep past the overall deadline.
fn next_pause(poll_interval: Duration, deadline: Option<Deadline>) -> Duration {
    match deadline {
        Some(deadline) => deadline.clamp(poll_interval),
        None => poll_interval,
    }
}

/// One submit followed by either the inline sync result or the polling loop.
///
/// A sync submit blocks for the whole prediction, so it runs against the
/// overall timeout; an async one is bounded by `request_timeout` alone and
/// the wait budget starts once the job is accepted.
pub async fn run_once(
    service: &impl PredictionService,
    model: &str,
    input: &Map<String, Value>,
    sync: bool,
    policy: &RetryPolicy,
) -> Result<Prediction> {
    let budget = if sync { policy.wait_deadline() } else { None };
    match service
        .create_prediction(model, input, sync, policy, budget)
        .await?
    {
        Submission::Pending(id) => wait_for_completion(service, &id, policy).await,
        Submission::Finished(prediction) => match prediction.status {
            PredictionStatus::Completed => Ok(prediction),
            PredictionStatus::Failed => Err(Error::PredictionFailed {
                message: prediction.failure_message(),
                id: prediction.id,
            }),
            status => Err(Error::UnexpectedResponse(format!(
                "sync mode returned non-terminal status {status} for prediction {}",
                prediction.id
            ))),
        },
    }
}

/// [`run_once`], started over up to `policy.max_retries` times while the
/// failure is retryable.
pub async fn run_task(
    service: &impl PredictionService,
    model: &str,
    input: &Map<String, Value>,
    sync: bool,
    policy: &RetryPolicy,
) -> Result<Prediction> {
    let mut attempt = 0u32;
    loop {
        match run_once(service, model, input, sync, policy).await {
            Ok(prediction) => return Ok(prediction),
            Err(err) if err.is_retryable() && attempt < policy.max_retries => {
                let delay = policy.task_delay(attempt);
                attempt += 1;
                warn!(
                    model,
                    attempt,
                    max_retries = policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    "task failed, resubmitting: {err}"
                );
                sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}
