//! One bounded HTTP call, and the connection-retry loop around it.
//!
//! HTTP error statuses are NOT failures here: [`send_once`] hands back any
//! response it received. Only transport problems (connect, DNS, reset,
//! deadline) come back as `Err`.

use std::time::Duration;

use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::retry::{Backoff, Deadline, RetryPolicy, should_retry_error, should_retry_response};

/// Status and body of a received HTTP response.
#[derive(Debug, Clone)]
pub(crate) struct HttpResponse {
    pub status: StatusCode,
    pub body: String,
}

impl HttpResponse {
    /// Turn a non-2xx response into [`Error::Http`].
    pub fn into_success(self) -> Result<Self> {
        if self.status.is_success() {
            Ok(self)
        } else {
            Err(Error::Http {
                status: self.status.as_u16(),
                body: self.body,
            })
        }
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// How a call site wants its request retried.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CallSpec {
    /// Safe to repeat after a 5xx (GET).
    pub idempotent: bool,
    pub backoff: Backoff,
    pub deadline: Duration,
    /// Overall wait budget this call counts against, if any.
    pub budget: Option<Deadline>,
}

/// Issue one HTTP call bounded by `deadline`.
pub(crate) async fn send_once(request: RequestBuilder, deadline: Duration) -> Result<HttpResponse> {
    let call = async {
        let response = request
            .send()
            .await
            .map_err(|e| transport_error(e, deadline))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| transport_error(e, deadline))?;
        Ok(HttpResponse { status, body })
    };

    match tokio::time::timeout(deadline, call).await {
        Ok(result) => result,
        Err(_) => Err(Error::RequestTimeout(deadline)),
    }
}

fn transport_error(err: reqwest::Error, deadline: Duration) -> Error {
    if err.is_timeout() {
        Error::RequestTimeout(deadline)
    } else if err.is_builder() {
        Error::Config(err.to_string())
    } else {
        Error::Connection(err.to_string())
    }
}

/// Run `build` through [`send_once`] up to `max_connection_retries + 1` times.
///
/// A request is built fresh for every attempt. If the final attempt still hit
/// a transport failure the result is [`Error::ConnectionExhausted`]; if it got
/// a retry-eligible response (429, or 5xx on an idempotent call) that
/// response is returned for the caller to judge.
///
/// With a `budget`, every attempt's deadline is clamped to what is left of
/// it, and once it is spent (or the next backoff would outlast it) the call
/// ends with [`Error::WaitTimeout`] instead of retrying.
pub(crate) async fn send_with_retry<F>(
    policy: &RetryPolicy,
    spec: CallSpec,
    mut build: F,
) -> Result<HttpResponse>
where
    F: FnMut() -> RequestBuilder,
{
    let max_attempts = policy.max_connection_retries.saturating_add(1);
    let mut attempt = 1u32;

    loop {
        let deadline = match spec.budget {
            Some(budget) if budget.is_expired() => return Err(budget.timeout_error()),
            Some(budget) => budget.clamp(spec.deadline),
            None => spec.deadline,
        };

        debug!(attempt, max_attempts, "sending request");
        let outcome = send_once(build(), deadline).await;

        if let (Err(Error::RequestTimeout(_)), Some(budget)) = (&outcome, spec.budget) {
            if budget.is_expired() {
                return Err(budget.timeout_error());
            }
        }

        let retry = match &outcome {
            Ok(response) => should_retry_response(response.status, spec.idempotent),
            Err(err) => should_retry_error(err),
        };
        if !retry {
            return outcome;
        }

        if attempt >= max_attempts {
            return match outcome {
                Ok(response) => Ok(response),
                Err(last) => Err(Error::ConnectionExhausted {
                    attempts: attempt,
                    last: Box::new(last),
                }),
            };
        }

        let delay = spec.backoff.delay(policy.retry_interval, attempt);
        if let Some(budget) = spec.budget {
            if delay >= budget.remaining() {
                debug!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "next retry would outlast the wait budget"
                );
                return Err(budget.timeout_error());
            }
        }

        let reason = match &outcome {
            Ok(response) => format!("HTTP {}", response.status.as_u16()),
            Err(err) => err.to_string(),
        };
        warn!(
            attempt,
            max_attempts,
            delay_ms = delay.as_millis() as u64,
            "retrying request: {reason}"
        );
        sleep(delay).await;
        attempt += 1;
    }
}
