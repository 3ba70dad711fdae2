//! Error types for the phone-core library
//!
//! Errors fall into a few groups that decide how they travel:
//!
//! - **Input errors** - malformed destination or credentials. Returned to the
//!   caller immediately, no state change.
//! - **Precondition errors** - the command is not legal right now
//!   (`AlreadyConnected`, `SessionBusy`, `NotRegistered`, `InvalidState`).
//!   Returned to the caller immediately, no state change.
//! - **Transport errors** - the signaling collaborator failed during
//!   `connect`, `call` or `answer`. Reported to the observer error channel,
//!   returned to the caller, and the affected state falls back to its nearest
//!   stable value (Unregistered, or a terminated call).
//!
//! Failures during teardown, unregistration, mute directives and DTMF are
//! never represented here: they are logged and swallowed so the phone always
//! reaches its terminal state.
//!
//! ```rust
//! use rvoip_phone_core::PhoneError;
//!
//! let err = PhoneError::SessionBusy;
//! assert!(err.is_precondition());
//! assert_eq!(err.category(), "precondition");
//! ```

use thiserror::Error;

use crate::registration::RegistrationState;

/// Result type for phone-core operations
pub type PhoneResult<T> = Result<T, PhoneError>;

/// Errors surfaced by the phone control layer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PhoneError {
    /// A destination or credential field is malformed
    #[error("Invalid input: {field} - {reason}")]
    InvalidInput { field: String, reason: String },

    /// A configuration value is out of range
    #[error("Invalid configuration: {field} - {reason}")]
    InvalidConfiguration { field: String, reason: String },

    /// `connect` was called while a registration is in progress or active
    #[error("Already connected (registration state is {state})")]
    AlreadyConnected { state: RegistrationState },

    /// A call was requested without an active registration
    #[error("Not registered with server")]
    NotRegistered,

    /// A call session already occupies the single call slot
    #[error("Another call is already in progress")]
    SessionBusy,

    /// The operation is not legal in the current call sub-state
    #[error("Invalid state for {operation}: {state}")]
    InvalidState { operation: String, state: String },

    /// The signaling server refused the registration
    #[error("Registration failed: {reason}")]
    RegistrationFailed { reason: String },

    /// The transport failed while carrying out a critical-path request
    #[error("Transport error during {operation}: {reason}")]
    TransportError { operation: String, reason: String },

    /// The remote side or the network ended a call before it was established
    #[error("Call failed: {reason}")]
    CallFailed { reason: String },

    /// A transport round-trip did not resolve in time
    #[error("Operation {operation} timed out after {duration_ms}ms")]
    OperationTimeout { operation: String, duration_ms: u64 },

    /// The operation was overtaken by a later command before it resolved
    #[error("Operation {operation} was superseded")]
    Superseded { operation: String },
}

impl PhoneError {
    pub fn invalid_input(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput { field: field.into(), reason: reason.into() }
    }

    pub fn invalid_configuration(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration { field: field.into(), reason: reason.into() }
    }

    pub fn invalid_state(operation: impl Into<String>, state: impl Into<String>) -> Self {
        Self::InvalidState { operation: operation.into(), state: state.into() }
    }

    pub fn transport(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::TransportError { operation: operation.into(), reason: reason.into() }
    }

    /// Precondition violations fail fast and never change state
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            PhoneError::AlreadyConnected { .. }
                | PhoneError::NotRegistered
                | PhoneError::SessionBusy
                | PhoneError::InvalidState { .. }
        )
    }

    /// Errors that originated in the signaling collaborator
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            PhoneError::RegistrationFailed { .. }
                | PhoneError::TransportError { .. }
                | PhoneError::CallFailed { .. }
                | PhoneError::OperationTimeout { .. }
        )
    }

    /// Short category label, handy for structured log fields
    pub fn category(&self) -> &'static str {
        match self {
            PhoneError::InvalidInput { .. } => "input",
            PhoneError::InvalidConfiguration { .. } => "configuration",

            PhoneError::AlreadyConnected { .. }
            | PhoneError::NotRegistered
            | PhoneError::SessionBusy
            | PhoneError::InvalidState { .. } => "precondition",

            PhoneError::RegistrationFailed { .. } => "registration",
            PhoneError::CallFailed { .. } => "call",
            PhoneError::TransportError { .. } => "transport",

            PhoneError::OperationTimeout { .. } | PhoneError::Superseded { .. } => "system",
        }
    }
}
