//! Call session types
//!
//! A [`CallSession`] is one call attempt, inbound or outbound. It carries its
//! own sub-state machine:
//!
//! ```text
//! Idle (inbound only) --> Establishing --> Established --> Terminated
//!   |                          |                               ^
//!   +--------------------------+-------------------------------+
//! ```
//!
//! Which operations are legal is decided from `direction` and `sub_state`
//! together. Once a session is Terminated it is frozen: every mutator
//! refuses to touch it and the session manager discards it.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{PhoneError, PhoneResult};
use crate::transport::{CallHandle, TerminationReason};

/// Identifier phone-core assigns to every call session
pub type SessionId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallDirection {
    Inbound,
    Outbound,
}

/// Sub-state of a single call session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallSubState {
    /// Inbound call offered, not yet accepted or declined
    Idle,
    /// Outbound request sent, or inbound accept dispatched
    Establishing,
    /// Media is flowing
    Established,
    /// Final
    Terminated,
}

impl fmt::Display for CallSubState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallSubState::Idle => write!(f, "Idle"),
            CallSubState::Establishing => write!(f, "Establishing"),
            CallSubState::Established => write!(f, "Established"),
            CallSubState::Terminated => write!(f, "Terminated"),
        }
    }
}

/// The transport request a hangup translates to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HangupAction {
    /// Inbound call still Idle
    Decline,
    /// Outbound call not yet Established
    Cancel,
    /// Accepted or Established call
    Terminate,
}

/// One call attempt or active call
#[derive(Debug, Clone, PartialEq)]
pub struct CallSession {
    id: SessionId,
    handle: CallHandle,
    direction: CallDirection,
    peer_identity: String,
    sub_state: CallSubState,
    muted: bool,
    created_at: DateTime<Utc>,
    established_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    termination_reason: Option<TerminationReason>,
}

impl CallSession {
    fn new(
        handle: CallHandle,
        direction: CallDirection,
        peer_identity: String,
        sub_state: CallSubState,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            handle,
            direction,
            peer_identity,
            sub_state,
            muted: false,
            created_at: Utc::now(),
            established_at: None,
            ended_at: None,
            termination_reason: None,
        }
    }

    /// A freshly offered inbound call, waiting for answer or decline
    pub fn inbound(handle: CallHandle, peer_identity: impl Into<String>) -> Self {
        Self::new(handle, CallDirection::Inbound, peer_identity.into(), CallSubState::Idle)
    }

    /// An outbound call whose initial request is about to be sent
    pub fn outbound(handle: CallHandle, destination: impl Into<String>) -> Self {
        Self::new(handle, CallDirection::Outbound, destination.into(), CallSubState::Establishing)
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn handle(&self) -> &CallHandle {
        &self.handle
    }

    pub fn direction(&self) -> CallDirection {
        self.direction
    }

    /// Caller id for inbound calls, dialed destination for outbound calls
    pub fn peer_identity(&self) -> &str {
        &self.peer_identity
    }

    pub fn sub_state(&self) -> CallSubState {
        self.sub_state
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn established_at(&self) -> Option<DateTime<Utc>> {
        self.established_at
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    pub fn termination_reason(&self) -> Option<&TerminationReason> {
        self.termination_reason.as_ref()
    }

    pub fn is_terminated(&self) -> bool {
        self.sub_state == CallSubState::Terminated
    }

    pub fn is_established(&self) -> bool {
        self.sub_state == CallSubState::Established
    }

    /// `answer` is legal only for an inbound call still Idle
    pub fn can_answer(&self) -> bool {
        self.direction == CallDirection::Inbound && self.sub_state == CallSubState::Idle
    }

    /// What a local hangup means right now; `None` once Terminated
    pub fn hangup_action(&self) -> Option<HangupAction> {
        match (self.direction, self.sub_state) {
            (_, CallSubState::Terminated) => None,
            (CallDirection::Inbound, CallSubState::Idle) => Some(HangupAction::Decline),
            (CallDirection::Outbound, CallSubState::Idle | CallSubState::Establishing) => {
                Some(HangupAction::Cancel)
            }
            (_, CallSubState::Establishing | CallSubState::Established) => Some(HangupAction::Terminate),
        }
    }

    /// Idle -> Establishing, when an inbound accept is dispatched
    pub(crate) fn begin_establishing(&mut self) -> PhoneResult<()> {
        if !self.can_answer() {
            return Err(PhoneError::invalid_state("answer", self.describe()));
        }
        self.sub_state = CallSubState::Establishing;
        Ok(())
    }

    /// Establishing -> Established, when media is up
    pub(crate) fn establish(&mut self) -> PhoneResult<()> {
        if self.sub_state != CallSubState::Establishing {
            return Err(PhoneError::invalid_state("establish", self.describe()));
        }
        self.sub_state = CallSubState::Established;
        self.established_at = Some(Utc::now());
        Ok(())
    }

    /// Any -> Terminated
    ///
    /// Returns the sub-state that was left, or `None` if the session was
    /// already Terminated (in which case nothing changes).
    pub(crate) fn terminate(&mut self, reason: TerminationReason) -> Option<CallSubState> {
        if self.is_terminated() {
            return None;
        }
        let previous = self.sub_state;
        self.sub_state = CallSubState::Terminated;
        self.muted = false;
        self.ended_at = Some(Utc::now());
        self.termination_reason = Some(reason);
        Some(previous)
    }

    /// Flip the logical mute flag; only while Established
    pub(crate) fn toggle_muted(&mut self) -> PhoneResult<bool> {
        if !self.is_established() {
            return Err(PhoneError::invalid_state("toggle_mute", self.describe()));
        }
        self.muted = !self.muted;
        Ok(self.muted)
    }

    fn describe(&self) -> String {
        format!("{:?} call is {}", self.direction, self.sub_state)
    }
}

/// What is kept of a session after it has been discarded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRecord {
    pub session_id: SessionId,
    pub direction: CallDirection,
    pub peer_identity: String,
    pub created_at: DateTime<Utc>,
    pub established_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub reason: Option<TerminationReason>,
}

impl CallRecord {
    /// Whether media was ever established for this call
    pub fn was_connected(&self) -> bool {
        self.established_at.is_some()
    }
}

impl From<&CallSession> for CallRecord {
    fn from(session: &CallSession) -> Self {
        Self {
            session_id: session.id,
            direction: session.direction,
            peer_identity: session.peer_identity.clone(),
            created_at: session.created_at,
            established_at: session.established_at,
            ended_at: session.ended_at,
            reason: session.termination_reason.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inbound_starts_idle_and_unmuted() {
        let session = CallSession::inbound(CallHandle::from("h1"), "4155551212");
        assert_eq!(session.sub_state(), CallSubState::Idle);
        assert_eq!(session.direction(), CallDirection::Inbound);
        assert_eq!(session.peer_identity(), "4155551212");
        assert!(!session.is_muted());
        assert!(session.can_answer());
    }

    #[test]
    fn test_outbound_cannot_be_answered() {
        let mut session = CallSession::outbound(CallHandle::generate(), "1001");
        assert_eq!(session.sub_state(), CallSubState::Establishing);
        assert!(!session.can_answer());
        assert!(matches!(session.begin_establishing(), Err(PhoneError::InvalidState { .. })));
    }

    #[test]
    fn test_hangup_action_depends_on_direction_and_sub_state() {
        let mut inbound = CallSession::inbound(CallHandle::from("in"), "bob");
        assert_eq!(inbound.hangup_action(), Some(HangupAction::Decline));
        inbound.begin_establishing().unwrap();
        assert_eq!(inbound.hangup_action(), Some(HangupAction::Terminate));

        let mut outbound = CallSession::outbound(CallHandle::from("out"), "1001");
        assert_eq!(outbound.hangup_action(), Some(HangupAction::Cancel));
        outbound.establish().unwrap();
        assert_eq!(outbound.hangup_action(), Some(HangupAction::Terminate));

        outbound.terminate(TerminationReason::LocalHangup);
        assert_eq!(outbound.hangup_action(), None);
    }

    #[test]
    fn test_terminated_session_is_frozen() {
        let mut session = CallSession::outbound(CallHandle::from("h"), "1001");
        session.establish().unwrap();
        session.toggle_muted().unwrap();

        assert_eq!(session.terminate(TerminationReason::RemoteHangup), Some(CallSubState::Established));
        assert!(!session.is_muted());

        // Second termination keeps the first reason
        assert_eq!(session.terminate(TerminationReason::LocalHangup), None);
        assert_eq!(session.termination_reason(), Some(&TerminationReason::RemoteHangup));

        assert!(session.establish().is_err());
        assert!(session.toggle_muted().is_err());
        assert!(session.begin_establishing().is_err());
    }

    #[test]
    fn test_mute_requires_established() {
        let mut session = CallSession::inbound(CallHandle::from("h"), "bob");
        assert!(session.toggle_muted().is_err());

        session.begin_establishing().unwrap();
        session.establish().unwrap();
        assert_eq!(session.toggle_muted().unwrap(), true);
        assert_eq!(session.toggle_muted().unwrap(), false);
    }

    #[test]
    fn test_record_keeps_history_fields() {
        let mut session = CallSession::outbound(CallHandle::from("h"), "1001");
        session.establish().unwrap();
        session.terminate(TerminationReason::LocalHangup);

        let record = CallRecord::from(&session);
        assert_eq!(record.session_id, session.id());
        assert_eq!(record.peer_identity, "1001");
        assert!(record.was_connected());
        assert_eq!(record.reason, Some(TerminationReason::LocalHangup));
    }
}
