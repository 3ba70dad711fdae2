//! Phone configuration
//!
//! [`PhoneConfig`] holds the tuning knobs of the control layer: how long each
//! transport round-trip may take, the DTMF pulse length, and buffer sizes.
//! Account credentials are not part of it; they are passed to
//! [`crate::Phone::connect`] by whoever owns them.
//!
//! ```rust
//! use rvoip_phone_core::PhoneConfig;
//! use std::time::Duration;
//!
//! let config = PhoneConfig::new()
//!     .with_registration_timeout(Duration::from_secs(10))
//!     .with_dtmf_duration(Duration::from_millis(160));
//!
//! assert_eq!(config.registration_timeout(), Duration::from_secs(10));
//! assert_eq!(config.dtmf_duration_ms, 160);
//! assert!(config.validate().is_ok());
//! ```
//!
//! Configurations deserialize with defaults for missing fields:
//!
//! ```rust
//! use rvoip_phone_core::PhoneConfig;
//!
//! let config: PhoneConfig = serde_json::from_str(r#"{ "history_limit": 5 }"#).unwrap();
//! assert_eq!(config.history_limit, 5);
//! assert_eq!(config.dtmf_duration_ms, 100);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PhoneError, PhoneResult};

/// Default bound for a REGISTER round-trip
pub const DEFAULT_REGISTRATION_TIMEOUT_MS: u64 = 30_000;
/// Default bound for place/accept, 64*T1 like an INVITE transaction
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 32_000;
pub const DEFAULT_TEARDOWN_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_DTMF_DURATION_MS: u64 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhoneConfig {
    /// Bound for `connect` waiting on the registrar
    pub registration_timeout_ms: u64,

    /// Bound for `call` and `answer` waiting on the transport
    pub request_timeout_ms: u64,

    /// Bound for hangup, unregister, mute and DTMF requests
    pub teardown_timeout_ms: u64,

    /// Pulse duration of every DTMF tone
    pub dtmf_duration_ms: u64,

    /// Number of finished calls kept in the call history
    pub history_limit: usize,

    /// Capacity of the broadcast channel behind `Phone::subscribe`
    pub event_buffer: usize,
}

impl Default for PhoneConfig {
    fn default() -> Self {
        Self {
            registration_timeout_ms: DEFAULT_REGISTRATION_TIMEOUT_MS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            teardown_timeout_ms: DEFAULT_TEARDOWN_TIMEOUT_MS,
            dtmf_duration_ms: DEFAULT_DTMF_DURATION_MS,
            history_limit: 20,
            event_buffer: 64,
        }
    }
}

impl PhoneConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registration_timeout(mut self, timeout: Duration) -> Self {
        self.registration_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_teardown_timeout(mut self, timeout: Duration) -> Self {
        self.teardown_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_dtmf_duration(mut self, duration: Duration) -> Self {
        self.dtmf_duration_ms = duration.as_millis() as u64;
        self
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    pub fn with_event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = capacity;
        self
    }

    pub fn registration_timeout(&self) -> Duration {
        Duration::from_millis(self.registration_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn teardown_timeout(&self) -> Duration {
        Duration::from_millis(self.teardown_timeout_ms)
    }

    /// Reject values that would make the phone unusable
    pub fn validate(&self) -> PhoneResult<()> {
        let positive = [
            ("registration_timeout_ms", self.registration_timeout_ms),
            ("request_timeout_ms", self.request_timeout_ms),
            ("teardown_timeout_ms", self.teardown_timeout_ms),
            ("dtmf_duration_ms", self.dtmf_duration_ms),
            ("event_buffer", self.event_buffer as u64),
        ];

        for (field, value) in positive {
            if value == 0 {
                return Err(PhoneError::invalid_configuration(field, "must be greater than zero"));
            }
        }
        Ok(())
    }
}
