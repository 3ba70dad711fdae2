//! Bounded transport round-trips
//!
//! Every request phone-core sends to the transport is bounded. Critical-path
//! requests go through [`with_timeout`] and turn an expired deadline into
//! [`PhoneError::OperationTimeout`]. Teardown and auxiliary requests go
//! through [`best_effort`], which logs failures and expired deadlines and
//! always lets the caller carry on.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, error, warn};

use crate::error::{PhoneError, PhoneResult};
use crate::transport::{TransportError, TransportResult};

/// Run `future`, failing with `OperationTimeout` if it outlives `timeout`
pub async fn with_timeout<T, F>(operation_name: &str, timeout: Duration, future: F) -> PhoneResult<T>
where
    F: Future<Output = PhoneResult<T>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => {
            error!(
                operation = operation_name,
                timeout_ms = timeout.as_millis() as u64,
                "Operation timed out"
            );
            Err(PhoneError::OperationTimeout {
                operation: operation_name.to_string(),
                duration_ms: timeout.as_millis() as u64,
            })
        }
    }
}

/// Run a transport request whose failure must not block progress
///
/// Returns the transport error (for callers that want to log it
/// differently) but never a timeout or a [`PhoneError`].
pub async fn best_effort<F>(operation_name: &str, timeout: Duration, future: F) -> Option<TransportError>
where
    F: Future<Output = TransportResult<()>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(Ok(())) => {
            debug!(operation = operation_name, "Best-effort request completed");
            None
        }
        Ok(Err(TransportError::NoAudioPath)) => {
            debug!(operation = operation_name, "No controllable audio path");
            Some(TransportError::NoAudioPath)
        }
        Ok(Err(e)) => {
            warn!(operation = operation_name, error = %e, "Best-effort request failed, continuing");
            Some(e)
        }
        Err(_) => {
            warn!(
                operation = operation_name,
                timeout_ms = timeout.as_millis() as u64,
                "Best-effort request timed out, continuing"
            );
            Some(TransportError::failed("timed out"))
        }
    }
}
