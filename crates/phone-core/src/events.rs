//! Observer notifications
//!
//! The phone promises exactly three kinds of notification:
//!
//! - **StateChanged** - the projected [`PhoneState`] moved
//! - **CallerIdentityChanged** - the peer shown to the user changed (empty
//!   string when no call is active)
//! - **Error** - a critical-path failure the user should hear about
//!
//! Notifications can be consumed in two ways, and both see the same order:
//!
//! 1. Implement [`PhoneEventHandler`] and install it with
//!    [`crate::PhoneBuilder::event_handler`]. A dispatcher task calls the
//!    handler one event at a time.
//! 2. Call [`crate::Phone::subscribe`] for a `tokio::sync::broadcast`
//!    receiver.
//!
//! # Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use rvoip_phone_core::{PhoneError, PhoneEventHandler, PhoneState};
//!
//! struct StatusLine;
//!
//! #[async_trait]
//! impl PhoneEventHandler for StatusLine {
//!     async fn on_phone_state_changed(&self, state: PhoneState) {
//!         println!("phone is now {}", state);
//!     }
//!
//!     async fn on_caller_identity_changed(&self, identity: String) {
//!         println!("caller: {}", identity);
//!     }
//!
//!     async fn on_error(&self, error: PhoneError) {
//!         eprintln!("phone error: {}", error);
//!     }
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc};

use crate::error::PhoneError;
use crate::projector::PhoneState;

/// A notification for the UI layer
#[derive(Debug, Clone, PartialEq)]
pub enum PhoneEvent {
    StateChanged {
        state: PhoneState,
        previous: PhoneState,
        timestamp: DateTime<Utc>,
    },
    CallerIdentityChanged {
        identity: String,
        timestamp: DateTime<Utc>,
    },
    Error {
        error: PhoneError,
        timestamp: DateTime<Utc>,
    },
}

impl PhoneEvent {
    pub fn error(error: PhoneError) -> Self {
        PhoneEvent::Error { error, timestamp: Utc::now() }
    }
}

/// UI-side observer of the phone
#[async_trait]
pub trait PhoneEventHandler: Send + Sync {
    async fn on_phone_state_changed(&self, state: PhoneState);

    async fn on_caller_identity_changed(&self, identity: String);

    async fn on_error(&self, _error: PhoneError) {
        // Default implementation - can be overridden to show errors
    }

    /// Route a [`PhoneEvent`] to the matching callback
    async fn on_phone_event(&self, event: PhoneEvent) {
        match event {
            PhoneEvent::StateChanged { state, .. } => self.on_phone_state_changed(state).await,
            PhoneEvent::CallerIdentityChanged { identity, .. } => {
                self.on_caller_identity_changed(identity).await
            }
            PhoneEvent::Error { error, .. } => self.on_error(error).await,
        }
    }
}

/// Fans events out to broadcast subscribers and the installed handler
pub struct EventEmitter {
    broadcast_tx: broadcast::Sender<PhoneEvent>,
    handler_tx: Option<mpsc::UnboundedSender<PhoneEvent>>,
}

impl EventEmitter {
    pub fn new(capacity: usize) -> Self {
        let (broadcast_tx, _) = broadcast::channel(capacity);
        Self {
            broadcast_tx,
            handler_tx: None,
        }
    }

    /// Install `handler` behind an ordered dispatcher task
    ///
    /// Must be called from within a tokio runtime.
    pub fn with_handler(mut self, handler: Arc<dyn PhoneEventHandler>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<PhoneEvent>();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                handler.on_phone_event(event).await;
            }
            tracing::debug!("Event dispatcher stopped");
        });
        self.handler_tx = Some(tx);
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PhoneEvent> {
        self.broadcast_tx.subscribe()
    }

    /// Publish one event; never blocks
    pub fn emit(&self, event: PhoneEvent) {
        if let Some(tx) = &self.handler_tx {
            if tx.send(event.clone()).is_err() {
                tracing::warn!("Event handler dispatcher is gone, dropping event");
            }
        }
        // No subscribers is fine
        let _ = self.broadcast_tx.send(event);
    }

    pub fn emit_all(&self, events: impl IntoIterator<Item = PhoneEvent>) {
        for event in events {
            self.emit(event);
        }
    }
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("subscribers", &self.broadcast_tx.receiver_count())
            .field("handler", &self.handler_tx.is_some())
            .finish()
    }
}
