//! Signaling/media transport seam
//!
//! phone-core never speaks a signaling protocol itself. Everything on the
//! wire (REGISTER exchanges, INVITE/CANCEL/BYE, SDP negotiation, digest
//! challenges, audio capture) belongs to a [`PhoneTransport`] implementation
//! supplied by the embedding application.
//!
//! The seam has two directions:
//!
//! - **Requests**: phone-core calls the async methods of [`PhoneTransport`].
//!   Each resolves to success or a [`TransportError`].
//! - **Events**: the transport pushes [`TransportEvent`]s into the sender
//!   half of [`event_channel`]. phone-core drains the receiver one event at a
//!   time, so the order in which the transport reports things is the order
//!   in which the phone state changes.
//!
//! Outbound call handles are allocated by phone-core before `place_call` is
//! issued, so events for a new call can always be matched to its session.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::registration::Credentials;

/// Result type for transport requests
pub type TransportResult<T> = Result<T, TransportError>;

/// Failures reported by the transport collaborator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The far end (registrar or peer) refused the request
    #[error("request rejected: {reason}")]
    Rejected { reason: String },

    /// The transport itself failed (socket closed, DNS, TLS, ...)
    #[error("transport failure: {reason}")]
    Failed { reason: String },

    /// The call has no outbound audio path that can be controlled
    #[error("no controllable audio path")]
    NoAudioPath,
}

impl TransportError {
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected { reason: reason.into() }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed { reason: reason.into() }
    }
}

/// Opaque identifier the transport uses for one call
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallHandle(pub String);

impl CallHandle {
    /// Allocate a fresh handle for an outbound call
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for CallHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CallHandle {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Why a call ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminationReason {
    /// The local user hung up, declined or cancelled
    LocalHangup,
    /// The remote party hung up
    RemoteHangup,
    /// The remote party or a proxy refused the call
    Rejected { reason: String },
    /// No answer or no response in time
    Timeout,
    /// Media could not be established or was lost
    MediaFailure { reason: String },
    /// The registration went away underneath the call
    RegistrationLost,
    /// A critical-path request (place/accept) failed locally
    SetupFailed { reason: String },
}

impl TerminationReason {
    /// Whether this reason should be reported to the user as a failure
    pub fn is_failure(&self) -> bool {
        !matches!(self, TerminationReason::LocalHangup | TerminationReason::RemoteHangup)
    }
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationReason::LocalHangup => write!(f, "local hangup"),
            TerminationReason::RemoteHangup => write!(f, "remote hangup"),
            TerminationReason::Rejected { reason } => write!(f, "rejected: {}", reason),
            TerminationReason::Timeout => write!(f, "timeout"),
            TerminationReason::MediaFailure { reason } => write!(f, "media failure: {}", reason),
            TerminationReason::RegistrationLost => write!(f, "registration lost"),
            TerminationReason::SetupFailed { reason } => write!(f, "setup failed: {}", reason),
        }
    }
}

/// Progress of one call as seen by the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallEvent {
    /// Provisional response received (trying/ringing at the far end)
    Progressing,
    /// The call was answered and the media handshake completed
    Answered,
    /// The call ended; terminal for the handle
    Terminated { reason: TerminationReason },
}

/// Everything the transport can tell phone-core on its own initiative
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A new inbound call request
    IncomingCall { handle: CallHandle, peer_identity: String },
    /// Progress of an existing call
    Call { handle: CallHandle, event: CallEvent },
    /// The server dropped the registration (unregistered, refresh failed)
    RegistrationLost { reason: String },
}

impl TransportEvent {
    pub fn incoming(handle: impl Into<CallHandle>, peer_identity: impl Into<String>) -> Self {
        Self::IncomingCall { handle: handle.into(), peer_identity: peer_identity.into() }
    }

    pub fn progressing(handle: impl Into<CallHandle>) -> Self {
        Self::Call { handle: handle.into(), event: CallEvent::Progressing }
    }

    pub fn answered(handle: impl Into<CallHandle>) -> Self {
        Self::Call { handle: handle.into(), event: CallEvent::Answered }
    }

    pub fn terminated(handle: impl Into<CallHandle>, reason: TerminationReason) -> Self {
        Self::Call { handle: handle.into(), event: CallEvent::Terminated { reason } }
    }
}

impl From<String> for CallHandle {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&CallHandle> for CallHandle {
    fn from(value: &CallHandle) -> Self {
        value.clone()
    }
}

/// Sender half handed to the transport implementation
pub type TransportEventSender = mpsc::UnboundedSender<TransportEvent>;

/// Receiver half handed to [`crate::PhoneBuilder::transport_events`]
pub type TransportEventReceiver = mpsc::UnboundedReceiver<TransportEvent>;

/// Create the collaborator-to-core event stream
pub fn event_channel() -> (TransportEventSender, TransportEventReceiver) {
    mpsc::unbounded_channel()
}

/// Capability interface of the signaling/media engine
///
/// Implementations must be cheap to call concurrently: phone-core never holds
/// its own state lock across these calls, so a `hangup` may reach the
/// transport while a `place_call` for the same handle is still in flight.
#[async_trait]
pub trait PhoneTransport: Send + Sync {
    /// Register with the server; resolves once the registrar answered
    async fn begin_registration(&self, credentials: &Credentials) -> TransportResult<()>;

    /// Remove the registration (best-effort from the core's point of view)
    async fn end_registration(&self) -> TransportResult<()>;

    /// Send the initial request for an outbound call
    async fn place_call(&self, handle: &CallHandle, destination: &str) -> TransportResult<()>;

    /// Accept an inbound call
    async fn accept_incoming(&self, handle: &CallHandle) -> TransportResult<()>;

    /// Refuse an inbound call that has not been accepted
    async fn decline_incoming(&self, handle: &CallHandle) -> TransportResult<()>;

    /// Cancel an outbound call that has not been answered
    async fn cancel_outgoing(&self, handle: &CallHandle) -> TransportResult<()>;

    /// Run the graceful termination exchange for an accepted or answered call
    async fn terminate_call(&self, handle: &CallHandle) -> TransportResult<()>;

    /// Enable or disable the outbound audio path (mute directive)
    async fn set_outbound_audio_enabled(&self, handle: &CallHandle, enabled: bool) -> TransportResult<()>;

    /// Send one out-of-band tone (DTMF) of the given duration
    async fn send_out_of_band_signal(
        &self,
        handle: &CallHandle,
        symbol: char,
        duration_ms: u64,
    ) -> TransportResult<()>;
}
