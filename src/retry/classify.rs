//! Classify responses and transport failures for the connection-retry layer.

use reqwest::StatusCode;

use crate::error::{Error, ErrorKind};

/// Whether a completed HTTP response should be retried.
///
/// 429 is always retried. 5xx is retried only for idempotent reads; a 5xx on
/// a create may already have started a job server-side.
pub fn should_retry_response(status: StatusCode, idempotent: bool) -> bool {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return true;
    }
    status.is_server_error() && idempotent
}

/// Whether a transport-level failure should be retried.
pub fn should_retry_error(err: &Error) -> bool {
    matches!(err.kind(), ErrorKind::Connection | ErrorKind::Timeout)
}
