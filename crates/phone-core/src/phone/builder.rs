//! Builder for [`Phone`]
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use rvoip_phone_core::{event_channel, PhoneBuilder, PhoneConfig, PhoneTransport};
//!
//! # async fn example(transport: Arc<dyn PhoneTransport>) -> Result<(), Box<dyn std::error::Error>> {
//! let (events_tx, events_rx) = event_channel();
//! // hand `events_tx` to the transport implementation
//! # drop(events_tx);
//!
//! let phone = PhoneBuilder::new()
//!     .config(PhoneConfig::default())
//!     .transport(transport)
//!     .transport_events(events_rx)
//!     .build()
//!     .await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use tracing::info;

use super::{Phone, PhoneConfig};
use crate::error::{PhoneError, PhoneResult};
use crate::events::{EventEmitter, PhoneEventHandler};
use crate::transport::{PhoneTransport, TransportEventReceiver};

pub struct PhoneBuilder {
    config: PhoneConfig,
    transport: Option<Arc<dyn PhoneTransport>>,
    transport_events: Option<TransportEventReceiver>,
    event_handler: Option<Arc<dyn PhoneEventHandler>>,
}

impl PhoneBuilder {
    pub fn new() -> Self {
        Self {
            config: PhoneConfig::default(),
            transport: None,
            transport_events: None,
            event_handler: None,
        }
    }

    pub fn config(mut self, config: PhoneConfig) -> Self {
        self.config = config;
        self
    }

    /// The signaling/media engine the phone drives (required)
    pub fn transport(mut self, transport: Arc<dyn PhoneTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Stream of events from the transport; drained by a background task
    pub fn transport_events(mut self, events: TransportEventReceiver) -> Self {
        self.transport_events = Some(events);
        self
    }

    pub fn event_handler(mut self, handler: Arc<dyn PhoneEventHandler>) -> Self {
        self.event_handler = Some(handler);
        self
    }

    /// Validate the configuration and start the phone
    ///
    /// Must be called from within a tokio runtime.
    pub async fn build(self) -> PhoneResult<Arc<Phone>> {
        self.config.validate()?;
        let transport = self
            .transport
            .ok_or_else(|| PhoneError::invalid_configuration("transport", "a transport must be provided"))?;

        let mut events = EventEmitter::new(self.config.event_buffer);
        if let Some(handler) = self.event_handler {
            events = events.with_handler(handler);
        }

        let phone = Arc::new(Phone::new(self.config, transport, events));
        if let Some(receiver) = self.transport_events {
            phone.spawn_event_loop(receiver);
        }

        info!("Phone ready");
        Ok(phone)
    }
}

impl Default for PhoneBuilder {
    fn default() -> Self {
        Self::new()
    }
}
