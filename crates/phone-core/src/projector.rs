//! Phone state projection
//!
//! [`PhoneState`] is never stored on its own. It is recomputed by [`project`]
//! from the registration state and the active call after every transition,
//! and [`StateProjector`] turns the difference between two projections into
//! observer notifications.
//!
//! | Registration | Active call                    | PhoneState   |
//! |--------------|--------------------------------|--------------|
//! | Unregistered | -                              | Disconnected |
//! | Registering  | -                              | Connecting   |
//! | Registered   | none                           | Registered   |
//! | Registered   | Inbound, Idle/Establishing     | Ringing      |
//! | Registered   | Outbound, Establishing         | Calling      |
//! | Registered   | any, Established               | InCall       |
//!
//! ```rust
//! use rvoip_phone_core::{project, CallDirection, CallSubState, PhoneState, RegistrationState};
//!
//! let state = project(
//!     RegistrationState::Registered,
//!     Some((CallDirection::Inbound, CallSubState::Idle)),
//! );
//! assert_eq!(state, PhoneState::Ringing);
//! ```

use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::call::{CallDirection, CallSession, CallSubState};
use crate::events::PhoneEvent;
use crate::registration::RegistrationState;

/// The single externally visible summary state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PhoneState {
    Disconnected,
    Connecting,
    Registered,
    Ringing,
    Calling,
    InCall,
}

impl fmt::Display for PhoneState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhoneState::Disconnected => write!(f, "Disconnected"),
            PhoneState::Connecting => write!(f, "Connecting"),
            PhoneState::Registered => write!(f, "Registered"),
            PhoneState::Ringing => write!(f, "Ringing"),
            PhoneState::Calling => write!(f, "Calling"),
            PhoneState::InCall => write!(f, "InCall"),
        }
    }
}

/// Derive the phone state from registration and active call
///
/// A Terminated call counts as no call.
pub fn project(
    registration: RegistrationState,
    call: Option<(CallDirection, CallSubState)>,
) -> PhoneState {
    match registration {
        RegistrationState::Unregistered => PhoneState::Disconnected,
        RegistrationState::Registering => PhoneState::Connecting,
        RegistrationState::Registered => match call {
            None | Some((_, CallSubState::Terminated)) => PhoneState::Registered,
            Some((_, CallSubState::Established)) => PhoneState::InCall,
            Some((CallDirection::Inbound, _)) => PhoneState::Ringing,
            Some((CallDirection::Outbound, _)) => PhoneState::Calling,
        },
    }
}

/// What observers currently see
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhoneSnapshot {
    pub state: PhoneState,
    /// Peer of the active call, empty when there is none
    pub caller_identity: String,
}

impl Default for PhoneSnapshot {
    fn default() -> Self {
        Self {
            state: PhoneState::Disconnected,
            caller_identity: String::new(),
        }
    }
}

/// Remembers the last published snapshot and diffs against it
#[derive(Debug, Default)]
pub struct StateProjector {
    current: PhoneSnapshot,
}

impl StateProjector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> &PhoneSnapshot {
        &self.current
    }

    pub fn state(&self) -> PhoneState {
        self.current.state
    }

    /// Recompute and return one notification per field that changed
    ///
    /// A state change always precedes the caller identity change.
    pub fn recompute(
        &mut self,
        registration: RegistrationState,
        call: Option<&CallSession>,
    ) -> Vec<PhoneEvent> {
        let live_call = call.filter(|session| !session.is_terminated());
        let next = PhoneSnapshot {
            state: project(registration, live_call.map(|s| (s.direction(), s.sub_state()))),
            caller_identity: live_call
                .map(|s| s.peer_identity().to_string())
                .unwrap_or_default(),
        };

        let mut events = Vec::with_capacity(2);
        if next.state != self.current.state {
            tracing::info!(from = %self.current.state, to = %next.state, "Phone state changed");
            events.push(PhoneEvent::StateChanged {
                state: next.state,
                previous: self.current.state,
                timestamp: Utc::now(),
            });
        }
        if next.caller_identity != self.current.caller_identity {
            events.push(PhoneEvent::CallerIdentityChanged {
                identity: next.caller_identity.clone(),
                timestamp: Utc::now(),
            });
        }

        self.current = next;
        events
    }
}
