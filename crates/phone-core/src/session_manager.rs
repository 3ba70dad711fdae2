//! Single-slot call session manager
//!
//! The phone handles at most one call at a time. [`SessionManager`] owns the
//! only slot a [`CallSession`] can live in: new sessions are admitted only
//! while the slot is empty, and a session leaves the slot the moment it is
//! Terminated. Discarded sessions are archived as [`CallRecord`]s.

use std::collections::VecDeque;

use crate::call::{CallRecord, CallSession};
use crate::error::{PhoneError, PhoneResult};
use crate::transport::{CallHandle, TerminationReason};

#[derive(Debug)]
pub struct SessionManager {
    active: Option<CallSession>,
    history: VecDeque<CallRecord>,
    history_limit: usize,
}

impl SessionManager {
    pub fn new(history_limit: usize) -> Self {
        Self {
            active: None,
            history: VecDeque::with_capacity(history_limit),
            history_limit,
        }
    }

    pub fn active(&self) -> Option<&CallSession> {
        self.active.as_ref()
    }

    pub fn active_mut(&mut self) -> Option<&mut CallSession> {
        self.active.as_mut()
    }

    pub fn has_active(&self) -> bool {
        self.active.is_some()
    }

    /// The active session, if it belongs to `handle`
    pub fn active_for(&mut self, handle: &CallHandle) -> Option<&mut CallSession> {
        self.active.as_mut().filter(|session| session.handle() == handle)
    }

    /// Admit a new outbound session, or fail with `SessionBusy`
    pub fn open_outbound(&mut self, destination: &str) -> PhoneResult<&CallSession> {
        self.admit(CallSession::outbound(CallHandle::generate(), destination))
    }

    /// Admit a new inbound session, or fail with `SessionBusy`
    pub fn open_inbound(&mut self, handle: CallHandle, peer_identity: &str) -> PhoneResult<&CallSession> {
        self.admit(CallSession::inbound(handle, peer_identity))
    }

    fn admit(&mut self, session: CallSession) -> PhoneResult<&CallSession> {
        if self.active.is_some() {
            return Err(PhoneError::SessionBusy);
        }
        tracing::debug!(
            session_id = %session.id(),
            direction = ?session.direction(),
            handle = %session.handle(),
            "Call session created"
        );
        let session = self.active.insert(session);
        Ok(&*session)
    }

    /// Terminate the active session and release the slot
    ///
    /// Returns the discarded session, or `None` if the slot was empty.
    pub fn terminate_active(&mut self, reason: TerminationReason) -> Option<CallSession> {
        let mut session = self.active.take()?;
        session.terminate(reason);
        self.archive(&session);
        tracing::debug!(
            session_id = %session.id(),
            reason = ?session.termination_reason(),
            "Call session released"
        );
        Some(session)
    }

    fn archive(&mut self, session: &CallSession) {
        if self.history_limit == 0 {
            return;
        }
        while self.history.len() >= self.history_limit {
            self.history.pop_front();
        }
        self.history.push_back(CallRecord::from(session));
    }

    /// Finished calls, oldest first
    pub fn history(&self) -> Vec<CallRecord> {
        self.history.iter().cloned().collect()
    }
}
