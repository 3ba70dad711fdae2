//! # Phone Core - Single-Call Softphone Control Layer
//!
//! This crate is the control layer of a browser-style softphone. It keeps
//! track of the registration with a signaling server and of at most one call
//! at a time, and projects both onto one small state that a UI can render:
//!
//! `Disconnected → Connecting → Registered → Ringing | Calling → InCall`
//!
//! Everything on the wire is delegated to a [`PhoneTransport`]
//! implementation. The phone issues requests to it and consumes the
//! [`TransportEvent`]s it produces; the UI issues commands to the
//! [`Phone`] and listens for [`PhoneEvent`]s.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use rvoip_phone_core::{event_channel, Credentials, PhoneBuilder, PhoneTransport};
//!
//! # async fn example(transport: Arc<dyn PhoneTransport>) -> Result<(), Box<dyn std::error::Error>> {
//! let (events_tx, events_rx) = event_channel();
//! # drop(events_tx);
//! let phone = PhoneBuilder::new()
//!     .transport(transport)
//!     .transport_events(events_rx)
//!     .build()
//!     .await?;
//!
//! phone
//!     .connect(Credentials::new("sip.example.com", "alice", "secret", "wss://sip.example.com/ws"))
//!     .await?;
//!
//! phone.call("1001").await?;
//! phone.send_digit('5').await;
//! phone.hangup().await;
//! phone.disconnect().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`registration`] - registration lifecycle and credentials
//! - [`call`] / [`session_manager`] - call sessions and the single call slot
//! - [`projector`] - derivation of [`PhoneState`] and change detection
//! - [`events`] - observer notifications
//! - [`transport`] - the collaborator seam
//! - [`phone`] - the actor that serializes commands and transport events

pub mod call;
pub mod error;
pub mod events;
pub mod phone;
pub mod projector;
pub mod registration;
pub mod session_manager;
pub mod transport;

// Re-export main types
pub use call::{CallDirection, CallRecord, CallSession, CallSubState, HangupAction, SessionId};
pub use error::{PhoneError, PhoneResult};
pub use events::{EventEmitter, PhoneEvent, PhoneEventHandler};
pub use phone::{DtmfTone, Phone, PhoneBuilder, PhoneConfig};
pub use projector::{project, PhoneSnapshot, PhoneState, StateProjector};
pub use registration::{Credentials, RegistrationController, RegistrationState};
pub use session_manager::SessionManager;
pub use transport::{
    event_channel, CallEvent, CallHandle, PhoneTransport, TerminationReason, TransportError,
    TransportEvent, TransportEventReceiver, TransportEventSender, TransportResult,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
