//! The phone: one owned actor tying everything together
//!
//! A [`Phone`] owns the registration controller, the single-slot session
//! manager, the media binding and the state projector. All of them sit
//! behind one `tokio::sync::Mutex`, so every command and every transport
//! event applies its state change in one critical section and publishes the
//! resulting notifications before the lock is released. Transport round-trips
//! run outside the lock; when their response arrives the phone re-checks that
//! the session (or registration attempt) it was issued for is still current
//! and drops the response otherwise.
//!
//! ```text
//!   UI commands ──┐                      ┌── PhoneEventHandler / subscribe()
//!                 ▼                      │
//!            ┌─────────────────────────────────┐
//!            │ Phone                           │
//!            │  RegistrationController         │
//!            │  SessionManager  (one slot)     │──► PhoneTransport requests
//!            │  MediaControl    (binding)      │
//!            │  StateProjector                 │
//!            └─────────────────────────────────┘
//!                 ▲
//!   TransportEvent stream (one at a time)
//! ```
//!
//! Operations are split across files the same way the state is:
//! `connection` (connect/disconnect), `calls` (call/answer/hangup) and
//! `media` (mute/DTMF).

pub mod builder;
pub mod calls;
pub mod config;
pub mod connection;
pub mod media;
pub mod recovery;

use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::call::{CallRecord, CallSession, HangupAction};
use crate::error::PhoneError;
use crate::events::{EventEmitter, PhoneEvent};
use crate::projector::{PhoneSnapshot, PhoneState, StateProjector};
use crate::registration::{RegistrationController, RegistrationState};
use crate::session_manager::SessionManager;
use crate::transport::{
    CallEvent, CallHandle, PhoneTransport, TerminationReason, TransportEvent, TransportEventReceiver,
};

pub use builder::PhoneBuilder;
pub use config::PhoneConfig;
pub use media::DtmfTone;

use media::MediaControl;
use recovery::best_effort;

/// Mutable state shared by commands and transport events
#[derive(Debug)]
pub(crate) struct CoreState {
    pub(crate) registration: RegistrationController,
    pub(crate) sessions: SessionManager,
    pub(crate) media: MediaControl,
    pub(crate) projector: StateProjector,
}

/// A session that just left the slot, with the request that ends it remotely
pub(crate) struct EndedCall {
    pub(crate) session: CallSession,
    pub(crate) action: Option<HangupAction>,
}

impl EndedCall {
    pub(crate) fn teardown(&self) -> Option<Teardown> {
        self.action.map(|action| Teardown {
            handle: self.session.handle().clone(),
            action,
        })
    }
}

/// A best-effort transport request that finishes a call
#[derive(Debug, Clone)]
pub(crate) struct Teardown {
    pub(crate) handle: CallHandle,
    pub(crate) action: HangupAction,
}

impl CoreState {
    fn new(config: &PhoneConfig) -> Self {
        Self {
            registration: RegistrationController::new(),
            sessions: SessionManager::new(config.history_limit),
            media: MediaControl::default(),
            projector: StateProjector::new(),
        }
    }

    /// Terminate the active call, detach media and free the slot
    pub(crate) fn end_call(&mut self, reason: TerminationReason) -> Option<EndedCall> {
        let action = self.sessions.active()?.hangup_action();
        let session = self.sessions.terminate_active(reason)?;
        self.media.detach(session.id());
        Some(EndedCall { session, action })
    }
}

/// Browser-style phone control layer over an abstract transport
///
/// Build one with [`PhoneBuilder`]. The phone is shared as `Arc<Phone>`;
/// every method takes `&self` and may be called from any task.
pub struct Phone {
    config: PhoneConfig,
    transport: Arc<dyn PhoneTransport>,
    core: Mutex<CoreState>,
    events: EventEmitter,
    event_loop: StdMutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for Phone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Phone")
            .field("config", &self.config)
            .field("transport", &"<transport>")
            .field("events", &self.events)
            .finish()
    }
}

impl Phone {
    pub(crate) fn new(config: PhoneConfig, transport: Arc<dyn PhoneTransport>, events: EventEmitter) -> Self {
        let core = CoreState::new(&config);
        Self {
            config,
            transport,
            core: Mutex::new(core),
            events,
            event_loop: StdMutex::new(None),
        }
    }

    /// Drain `events` into [`Phone::handle_transport_event`], one at a time
    pub(crate) fn spawn_event_loop(self: &Arc<Self>, mut events: TransportEventReceiver) {
        let phone = Arc::downgrade(self);
        let task = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let Some(phone) = phone.upgrade() else { break };
                phone.handle_transport_event(event).await;
            }
            debug!("Transport event loop stopped");
        });

        if let Ok(mut slot) = self.event_loop.lock() {
            if let Some(previous) = slot.replace(task) {
                previous.abort();
            }
        }
    }

    pub fn config(&self) -> &PhoneConfig {
        &self.config
    }

    /// Receive every notification the phone publishes from now on
    pub fn subscribe(&self) -> broadcast::Receiver<PhoneEvent> {
        self.events.subscribe()
    }

    pub async fn phone_state(&self) -> PhoneState {
        self.core.lock().await.projector.state()
    }

    /// State and caller identity as last published
    pub async fn snapshot(&self) -> PhoneSnapshot {
        self.core.lock().await.projector.snapshot().clone()
    }

    pub async fn registration_state(&self) -> RegistrationState {
        self.core.lock().await.registration.state()
    }

    /// Copy of the call currently occupying the slot
    pub async fn active_call(&self) -> Option<CallSession> {
        self.core.lock().await.sessions.active().cloned()
    }

    pub async fn is_muted(&self) -> bool {
        self.core
            .lock()
            .await
            .sessions
            .active()
            .map(|session| session.is_muted())
            .unwrap_or(false)
    }

    /// Finished calls, oldest first
    pub async fn call_history(&self) -> Vec<CallRecord> {
        self.core.lock().await.sessions.history()
    }

    /// Recompute the projection and publish what changed
    ///
    /// Called with the state lock held, after every transition.
    pub(crate) fn publish(&self, core: &mut CoreState) {
        let events = core.projector.recompute(core.registration.state(), core.sessions.active());
        self.events.emit_all(events);
    }

    pub(crate) fn report_error(&self, error: PhoneError) {
        warn!(error = %error, category = error.category(), "Reporting error to observer");
        self.events.emit(PhoneEvent::error(error));
    }

    /// Send the request that ends a call remotely; failures are swallowed
    pub(crate) async fn run_teardown(&self, teardown: Teardown) {
        let timeout = self.config.teardown_timeout();
        let handle = &teardown.handle;
        match teardown.action {
            HangupAction::Decline => {
                best_effort("decline_incoming", timeout, self.transport.decline_incoming(handle)).await;
            }
            HangupAction::Cancel => {
                best_effort("cancel_outgoing", timeout, self.transport.cancel_outgoing(handle)).await;
            }
            HangupAction::Terminate => {
                best_effort("terminate_call", timeout, self.transport.terminate_call(handle)).await;
            }
        }
    }

    /// Apply one event from the transport
    ///
    /// The event loop spawned by the builder calls this for every event on
    /// the transport channel; applications without a channel can call it
    /// directly. Events must be fed in the order the transport produced them.
    pub async fn handle_transport_event(&self, event: TransportEvent) {
        match event {
            TransportEvent::IncomingCall { handle, peer_identity } => {
                self.on_incoming_call(handle, peer_identity).await
            }
            TransportEvent::Call { handle, event } => self.on_call_event(handle, event).await,
            TransportEvent::RegistrationLost { reason } => self.on_registration_lost(reason).await,
        }
    }

    async fn on_incoming_call(&self, handle: CallHandle, peer_identity: String) {
        let refusal = {
            let mut guard = self.core.lock().await;
            let core = &mut *guard;

            if core.sessions.active().map(|s| s.handle() == &handle).unwrap_or(false) {
                debug!(handle = %handle, "Duplicate incoming call notification ignored");
                return;
            }

            let refusal = if !core.registration.is_registered() {
                Some("not registered")
            } else {
                match core.sessions.open_inbound(handle.clone(), &peer_identity) {
                    Ok(session) => {
                        info!(session_id = %session.id(), peer = %peer_identity, "Incoming call");
                        None
                    }
                    Err(_) => Some("another call is active"),
                }
            };

            if refusal.is_none() {
                self.publish(core);
            }
            refusal
        };

        if let Some(reason) = refusal {
            info!(handle = %handle, peer = %peer_identity, reason, "Declining incoming call");
            best_effort(
                "decline_incoming",
                self.config.teardown_timeout(),
                self.transport.decline_incoming(&handle),
            )
            .await;
        }
    }

    async fn on_call_event(&self, handle: CallHandle, event: CallEvent) {
        let mut guard = self.core.lock().await;
        let core = &mut *guard;

        let Some(session) = core.sessions.active_for(&handle) else {
            debug!(handle = %handle, event = ?event, "Ignoring event for unknown or finished call");
            return;
        };

        match event {
            CallEvent::Progressing => {
                debug!(session_id = %session.id(), "Call progressing");
            }
            CallEvent::Answered => match session.establish() {
                Ok(()) => {
                    info!(session_id = %session.id(), peer = %session.peer_identity(), "Call established");
                    core.media.bind(session);
                    self.publish(core);
                }
                Err(e) => {
                    debug!(session_id = %session.id(), error = %e, "Ignoring answer notification");
                }
            },
            CallEvent::Terminated { reason } => {
                let was_established = session.is_established();
                info!(session_id = %session.id(), reason = %reason, "Call ended by transport");
                core.end_call(reason.clone());
                self.publish(core);

                if reason.is_failure() {
                    if was_established {
                        warn!(reason = %reason, "Established call dropped");
                    } else {
                        self.report_error(PhoneError::CallFailed { reason: reason.to_string() });
                    }
                }
            }
        }
    }

    async fn on_registration_lost(&self, reason: String) {
        let teardown = {
            let mut guard = self.core.lock().await;
            let core = &mut *guard;

            if core.registration.state() == RegistrationState::Unregistered {
                debug!(reason = %reason, "Registration loss reported while unregistered");
                return;
            }

            let ended = core.end_call(TerminationReason::RegistrationLost);
            self.publish(core);
            core.registration.reset();
            self.publish(core);
            self.report_error(PhoneError::RegistrationFailed {
                reason: format!("registration lost: {}", reason),
            });
            ended.and_then(|ended| ended.teardown())
        };

        if let Some(teardown) = teardown {
            self.run_teardown(teardown).await;
        }
    }

    /// Disconnect and stop consuming transport events
    pub async fn shutdown(&self) {
        self.disconnect().await;
        if let Ok(mut slot) = self.event_loop.lock() {
            if let Some(task) = slot.take() {
                task.abort();
            }
        }
        info!("Phone shut down");
    }
}

impl Drop for Phone {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.event_loop.lock() {
            if let Some(task) = slot.take() {
                task.abort();
            }
        }
    }
}
