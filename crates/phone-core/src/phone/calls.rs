//! Call operations: call, answer and hangup
//!
//! Every operation follows the same shape:
//!
//! 1. Under the state lock, check legality against the current session and
//!    apply the local transition (a new session enters the slot, an inbound
//!    session starts establishing, a session is terminated).
//! 2. Release the lock and send the transport request.
//! 3. Re-take the lock and apply the response only if the same session is
//!    still in the slot. A session that was hung up in the meantime absorbs
//!    the response.

use tracing::{debug, info, warn};

use super::recovery::with_timeout;
use super::Phone;
use crate::call::SessionId;
use crate::error::{PhoneError, PhoneResult};
use crate::transport::TerminationReason;

impl Phone {
    /// Place an outbound call to `destination`
    ///
    /// The phone shows `Calling` as soon as the session is admitted and
    /// `InCall` when the transport reports the call answered.
    ///
    /// # Errors
    ///
    /// * `PhoneError::InvalidInput` - empty destination or one containing
    ///   whitespace/control characters
    /// * `PhoneError::NotRegistered` - the phone is not Registered
    /// * `PhoneError::SessionBusy` - another call occupies the slot
    /// * `PhoneError::TransportError` / `PhoneError::OperationTimeout` - the
    ///   call could not be placed; the session is terminated
    /// * `PhoneError::Superseded` - the call was hung up before the transport
    ///   answered the request
    pub async fn call(&self, destination: &str) -> PhoneResult<SessionId> {
        let destination = validate_destination(destination)?;

        let (session_id, handle) = {
            let mut guard = self.core.lock().await;
            if !guard.registration.is_registered() {
                return Err(PhoneError::NotRegistered);
            }
            let session = guard.sessions.open_outbound(destination)?;
            let ids = (session.id(), session.handle().clone());
            self.publish(&mut guard);
            ids
        };

        info!(session_id = %session_id, destination, "Placing call");

        let result = with_timeout("place_call", self.config.request_timeout(), async {
            self.transport
                .place_call(&handle, destination)
                .await
                .map_err(|e| PhoneError::transport("place_call", e.to_string()))
        })
        .await;

        self.settle_setup("call", session_id, result).await?;
        Ok(session_id)
    }

    /// Accept the ringing inbound call
    ///
    /// The phone keeps showing `Ringing` until the transport reports media
    /// established, then shows `InCall`. The transport bounds that handshake
    /// and reports an expired one as a `Timeout` termination.
    ///
    /// # Errors
    ///
    /// * `PhoneError::InvalidState` - no inbound call is waiting to be answered
    /// * `PhoneError::TransportError` / `PhoneError::OperationTimeout` - the
    ///   accept failed; the session is terminated
    /// * `PhoneError::Superseded` - the call ended before the accept resolved
    pub async fn answer(&self) -> PhoneResult<()> {
        let (session_id, handle) = {
            let mut guard = self.core.lock().await;
            let Some(session) = guard.sessions.active_mut() else {
                return Err(PhoneError::invalid_state("answer", "no active call"));
            };
            session.begin_establishing()?;
            let ids = (session.id(), session.handle().clone());
            self.publish(&mut guard);
            ids
        };

        info!(session_id = %session_id, "Answering call");

        let result = with_timeout("accept_incoming", self.config.request_timeout(), async {
            self.transport
                .accept_incoming(&handle)
                .await
                .map_err(|e| PhoneError::transport("accept_incoming", e.to_string()))
        })
        .await;

        self.settle_setup("answer", session_id, result).await
    }

    /// End the active call, whatever stage it is in
    ///
    /// An Idle inbound call is declined, an outbound call that has not been
    /// answered is cancelled, anything else goes through the graceful
    /// termination exchange. The session is Terminated before the request is
    /// sent and the request's outcome is only logged. Hanging up with no
    /// active call, or a second time, does nothing.
    pub async fn hangup(&self) {
        let teardown = {
            let mut guard = self.core.lock().await;
            let core = &mut *guard;

            let Some(ended) = core.end_call(TerminationReason::LocalHangup) else {
                debug!("Hangup with no active call, nothing to do");
                return;
            };
            info!(session_id = %ended.session.id(), action = ?ended.action, "Hanging up");
            self.publish(core);
            ended.teardown()
        };

        if let Some(teardown) = teardown {
            self.run_teardown(teardown).await;
        }
    }

    /// Apply the response of a place/accept request to its session
    async fn settle_setup(
        &self,
        operation: &str,
        session_id: SessionId,
        result: PhoneResult<()>,
    ) -> PhoneResult<()> {
        let (teardown, error) = {
            let mut guard = self.core.lock().await;
            let core = &mut *guard;

            let Some(session) = core.sessions.active().filter(|s| s.id() == session_id) else {
                debug!(session_id = %session_id, operation, "Response absorbed, call already ended");
                return Err(PhoneError::Superseded { operation: operation.to_string() });
            };

            let error = match result {
                Ok(()) => return Ok(()),
                Err(error) if session.is_established() => {
                    warn!(session_id = %session_id, error = %error, "Request failed but call is established");
                    return Ok(());
                }
                Err(error) => error,
            };

            let ended = core.end_call(TerminationReason::SetupFailed { reason: error.to_string() });
            self.publish(core);
            self.report_error(error.clone());

            // A timed out request may still be alive on the wire
            let teardown = match error {
                PhoneError::OperationTimeout { .. } => ended.and_then(|ended| ended.teardown()),
                _ => None,
            };
            (teardown, error)
        };

        if let Some(teardown) = teardown {
            self.run_teardown(teardown).await;
        }
        Err(error)
    }
}

/// Trim and check a dial string
fn validate_destination(destination: &str) -> PhoneResult<&str> {
    let destination = destination.trim();
    if destination.is_empty() {
        return Err(PhoneError::invalid_input("destination", "must not be empty"));
    }
    if destination.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(PhoneError::invalid_input(
            "destination",
            "must not contain whitespace or control characters",
        ));
    }
    Ok(destination)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_destination_is_trimmed() {
        assert_eq!(validate_destination("  1001 ").unwrap(), "1001");
        assert_eq!(validate_destination("sip:bob@example.com").unwrap(), "sip:bob@example.com");
    }

    #[test]
    fn test_malformed_destinations_are_rejected() {
        for bad in ["", "   ", "10 01", "1001\n2"] {
            assert!(
                matches!(validate_destination(bad), Err(PhoneError::InvalidInput { .. })),
                "{:?} should be rejected",
                bad
            );
        }
    }
}
