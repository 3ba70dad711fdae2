//! Registration state and credentials
//!
//! The [`RegistrationController`] owns the phone's [`RegistrationState`].
//! It does not talk to the server itself: the phone asks it whether a
//! registration may start, performs the round-trip through the transport,
//! and hands the outcome back. Each attempt is numbered so that an outcome
//! arriving after a `disconnect` (or after a newer attempt) is recognised as
//! stale and dropped.
//!
//! # State Transitions
//!
//! ```text
//! Unregistered --connect--> Registering --accepted--> Registered
//!      ^                         |                        |
//!      +------rejected/error-----+                        |
//!      +------------disconnect / registration lost--------+
//! ```
//!
//! # Credentials
//!
//! ```rust
//! use rvoip_phone_core::Credentials;
//!
//! let credentials = Credentials::new(
//!     "sip.example.com",
//!     "alice",
//!     "secret",
//!     "wss://sip.example.com:8089/ws",
//! );
//! assert!(credentials.validate().is_ok());
//!
//! // The secret never shows up in logs
//! assert!(!format!("{:?}", credentials).contains("secret"));
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{PhoneError, PhoneResult};

/// Connectivity to the signaling server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegistrationState {
    Unregistered,
    Registering,
    Registered,
}

impl fmt::Display for RegistrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistrationState::Unregistered => write!(f, "Unregistered"),
            RegistrationState::Registering => write!(f, "Registering"),
            RegistrationState::Registered => write!(f, "Registered"),
        }
    }
}

/// Account details used to register
///
/// Loaded and persisted by the embedding application; phone-core only
/// checks that each field is present.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Signaling server / registrar address (e.g. "sip.example.com")
    pub server_address: String,
    /// User identity or username (e.g. "alice")
    pub identity: String,
    /// Password for digest authentication
    pub secret: String,
    /// Transport endpoint (e.g. "wss://sip.example.com:8089/ws")
    pub transport_endpoint: String,
}

impl Credentials {
    pub fn new(
        server_address: impl Into<String>,
        identity: impl Into<String>,
        secret: impl Into<String>,
        transport_endpoint: impl Into<String>,
    ) -> Self {
        Self {
            server_address: server_address.into(),
            identity: identity.into(),
            secret: secret.into(),
            transport_endpoint: transport_endpoint.into(),
        }
    }

    /// Check that no field is empty
    pub fn validate(&self) -> PhoneResult<()> {
        let fields = [
            ("server_address", &self.server_address),
            ("identity", &self.identity),
            ("secret", &self.secret),
            ("transport_endpoint", &self.transport_endpoint),
        ];

        for (field, value) in fields {
            if value.trim().is_empty() {
                return Err(PhoneError::invalid_input(field, "must not be empty"));
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("server_address", &self.server_address)
            .field("identity", &self.identity)
            .field("secret", &"<redacted>")
            .field("transport_endpoint", &self.transport_endpoint)
            .finish()
    }
}

/// Tracks the registration lifecycle
#[derive(Debug)]
pub struct RegistrationController {
    state: RegistrationState,
    attempt: u64,
    identity: Option<String>,
    registered_at: Option<DateTime<Utc>>,
}

impl RegistrationController {
    pub fn new() -> Self {
        Self {
            state: RegistrationState::Unregistered,
            attempt: 0,
            identity: None,
            registered_at: None,
        }
    }

    pub fn state(&self) -> RegistrationState {
        self.state
    }

    pub fn is_registered(&self) -> bool {
        self.state == RegistrationState::Registered
    }

    /// Identity of the current or in-flight registration
    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    pub fn registered_at(&self) -> Option<DateTime<Utc>> {
        self.registered_at
    }

    /// Start a registration attempt, returning its number
    ///
    /// Fails with `AlreadyConnected` while Registering or Registered.
    pub fn begin(&mut self, credentials: &Credentials) -> PhoneResult<u64> {
        if self.state != RegistrationState::Unregistered {
            return Err(PhoneError::AlreadyConnected { state: self.state });
        }

        self.attempt += 1;
        self.state = RegistrationState::Registering;
        self.identity = Some(credentials.identity.clone());
        tracing::debug!(attempt = self.attempt, identity = %credentials.identity, "Registration started");
        Ok(self.attempt)
    }

    /// Whether `attempt` is still the registration being waited on
    pub fn is_pending(&self, attempt: u64) -> bool {
        self.attempt == attempt && self.state == RegistrationState::Registering
    }

    /// Apply the outcome of attempt `attempt`
    ///
    /// Returns `false` when the outcome is stale and was ignored.
    pub fn complete(&mut self, attempt: u64, accepted: bool) -> bool {
        if !self.is_pending(attempt) {
            tracing::debug!(attempt, current = self.attempt, "Ignoring stale registration outcome");
            return false;
        }

        if accepted {
            self.state = RegistrationState::Registered;
            self.registered_at = Some(Utc::now());
        } else {
            self.state = RegistrationState::Unregistered;
            self.identity = None;
        }
        true
    }

    /// Drop to Unregistered and invalidate any in-flight attempt
    ///
    /// Returns the state that was left.
    pub fn reset(&mut self) -> RegistrationState {
        let previous = self.state;
        self.attempt += 1;
        self.state = RegistrationState::Unregistered;
        self.identity = None;
        self.registered_at = None;
        previous
    }
}

impl Default for RegistrationController {
    fn default() -> Self {
        Self::new()
    }
}
