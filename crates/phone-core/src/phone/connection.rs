//! Registration operations: connect and disconnect

use tracing::{debug, info, warn};

use super::recovery::{best_effort, with_timeout};
use super::Phone;
use crate::error::{PhoneError, PhoneResult};
use crate::registration::{Credentials, RegistrationState};
use crate::transport::{TerminationReason, TransportError};

impl Phone {
    /// Register with the signaling server
    ///
    /// The phone shows `Connecting` immediately and `Registered` once the
    /// transport reports success. On rejection, transport failure or timeout
    /// the error is returned, reported to the observer, and the phone falls
    /// back to `Disconnected`.
    ///
    /// # Errors
    ///
    /// * `PhoneError::InvalidInput` - a credential field is empty
    /// * `PhoneError::AlreadyConnected` - already Registering or Registered
    /// * `PhoneError::RegistrationFailed` - the server refused the registration
    /// * `PhoneError::TransportError` / `PhoneError::OperationTimeout` - the
    ///   request failed or did not resolve in time
    /// * `PhoneError::Superseded` - `disconnect` was called before the
    ///   outcome arrived
    pub async fn connect(&self, credentials: Credentials) -> PhoneResult<()> {
        credentials.validate()?;

        let attempt = {
            let mut guard = self.core.lock().await;
            let attempt = guard.registration.begin(&credentials)?;
            self.publish(&mut guard);
            attempt
        };

        info!(
            server = %credentials.server_address,
            identity = %credentials.identity,
            attempt,
            "Registering"
        );

        let outcome = with_timeout("begin_registration", self.config.registration_timeout(), async {
            self.transport
                .begin_registration(&credentials)
                .await
                .map_err(|e| match e {
                    TransportError::Rejected { reason } => PhoneError::RegistrationFailed { reason },
                    other => PhoneError::transport("begin_registration", other.to_string()),
                })
        })
        .await;

        let unregister_late_success = {
            let mut guard = self.core.lock().await;
            if guard.registration.complete(attempt, outcome.is_ok()) {
                self.publish(&mut guard);
                return match outcome {
                    Ok(()) => {
                        info!(identity = %credentials.identity, "Registered");
                        Ok(())
                    }
                    Err(error) => {
                        self.report_error(error.clone());
                        Err(error)
                    }
                };
            }
            outcome.is_ok() && guard.registration.state() == RegistrationState::Unregistered
        };

        debug!(attempt, "Registration outcome arrived after it was superseded");
        if unregister_late_success {
            best_effort("end_registration", self.config.teardown_timeout(), self.transport.end_registration()).await;
        }
        Err(PhoneError::Superseded { operation: "connect".to_string() })
    }

    /// Hang up any active call and unregister
    ///
    /// Always ends `Disconnected`. The active call reaches Terminated before
    /// the unregistration is sent; failures of either request are logged and
    /// swallowed. Calling it while already disconnected does nothing.
    pub async fn disconnect(&self) {
        let (teardown, previous) = {
            let mut guard = self.core.lock().await;
            let core = &mut *guard;

            let teardown = core
                .end_call(TerminationReason::LocalHangup)
                .and_then(|ended| ended.teardown());
            self.publish(core);

            let previous = core.registration.reset();
            self.publish(core);
            (teardown, previous)
        };

        if let Some(teardown) = teardown {
            self.run_teardown(teardown).await;
        }

        if previous == RegistrationState::Unregistered {
            debug!("Disconnect requested while already unregistered");
            return;
        }

        if let Some(error) = best_effort(
            "end_registration",
            self.config.teardown_timeout(),
            self.transport.end_registration(),
        )
        .await
        {
            warn!(error = %error, "Unregistration failed, treating phone as disconnected anyway");
        }
        info!("Disconnected");
    }
}
