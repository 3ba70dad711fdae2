//! Scripted Call Example
//!
//! Drives a phone through a full session against an in-process loopback
//! transport: register, receive a call, answer it, mute, send DTMF, then
//! place an outbound call that the far end answers and hangs up.
//!
//! Run with: RUST_LOG=rvoip_phone_core=debug cargo run --example scripted_call

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rvoip_phone_core::{
    event_channel, CallHandle, Credentials, PhoneBuilder, PhoneConfig, PhoneError, PhoneEventHandler,
    PhoneState, PhoneTransport, TerminationReason, TransportEvent, TransportEventSender, TransportResult,
};

/// Transport that accepts everything and answers outbound calls after a beat
struct LoopbackTransport {
    events: TransportEventSender,
}

impl LoopbackTransport {
    fn later(&self, delay: Duration, event: TransportEvent) {
        let events = self.events.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(event);
        });
    }
}

#[async_trait]
impl PhoneTransport for LoopbackTransport {
    async fn begin_registration(&self, credentials: &Credentials) -> TransportResult<()> {
        println!("  [wire] REGISTER {}@{}", credentials.identity, credentials.server_address);
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok(())
    }

    async fn end_registration(&self) -> TransportResult<()> {
        println!("  [wire] REGISTER expires=0");
        Ok(())
    }

    async fn place_call(&self, handle: &CallHandle, destination: &str) -> TransportResult<()> {
        println!("  [wire] INVITE {}", destination);
        self.later(Duration::from_millis(100), TransportEvent::progressing(handle));
        self.later(Duration::from_millis(300), TransportEvent::answered(handle));
        self.later(
            Duration::from_millis(900),
            TransportEvent::terminated(handle, TerminationReason::RemoteHangup),
        );
        Ok(())
    }

    async fn accept_incoming(&self, handle: &CallHandle) -> TransportResult<()> {
        println!("  [wire] 200 OK ({})", handle);
        self.later(Duration::from_millis(50), TransportEvent::answered(handle));
        Ok(())
    }

    async fn decline_incoming(&self, handle: &CallHandle) -> TransportResult<()> {
        println!("  [wire] 486 Busy Here ({})", handle);
        Ok(())
    }

    async fn cancel_outgoing(&self, handle: &CallHandle) -> TransportResult<()> {
        println!("  [wire] CANCEL ({})", handle);
        Ok(())
    }

    async fn terminate_call(&self, handle: &CallHandle) -> TransportResult<()> {
        println!("  [wire] BYE ({})", handle);
        Ok(())
    }

    async fn set_outbound_audio_enabled(&self, _handle: &CallHandle, enabled: bool) -> TransportResult<()> {
        println!("  [media] outbound audio {}", if enabled { "on" } else { "off" });
        Ok(())
    }

    async fn send_out_of_band_signal(
        &self,
        _handle: &CallHandle,
        symbol: char,
        duration_ms: u64,
    ) -> TransportResult<()> {
        println!("  [wire] INFO dtmf {} ({}ms)", symbol, duration_ms);
        Ok(())
    }
}

struct ConsoleUi;

#[async_trait]
impl PhoneEventHandler for ConsoleUi {
    async fn on_phone_state_changed(&self, state: PhoneState) {
        println!("📱 {}", state);
    }

    async fn on_caller_identity_changed(&self, identity: String) {
        if identity.is_empty() {
            println!("👤 (no caller)");
        } else {
            println!("👤 {}", identity);
        }
    }

    async fn on_error(&self, error: PhoneError) {
        println!("❌ {}", error);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    println!("📞 Scripted Call Example");
    println!("========================");

    let (events_tx, events_rx) = event_channel();
    let transport = Arc::new(LoopbackTransport { events: events_tx.clone() });

    let phone = PhoneBuilder::new()
        .config(PhoneConfig::default().with_dtmf_duration(Duration::from_millis(160)))
        .transport(transport)
        .transport_events(events_rx)
        .event_handler(Arc::new(ConsoleUi))
        .build()
        .await?;

    phone
        .connect(Credentials::new("sip.example.com", "alice", "secret", "wss://sip.example.com:8089/ws"))
        .await?;

    // Someone calls us
    events_tx.send(TransportEvent::incoming("inbound-1", "4155551212"))?;
    tokio::time::sleep(Duration::from_millis(100)).await;

    phone.answer().await?;
    tokio::time::sleep(Duration::from_millis(100)).await;

    phone.toggle_mute().await;
    phone.toggle_mute().await;
    phone.send_digits("123#").await;
    phone.hangup().await;

    // Now we call out; the far end hangs up on its own
    phone.call("1001").await?;
    tokio::time::sleep(Duration::from_secs(1)).await;

    for record in phone.call_history().await {
        println!(
            "🗂  {:?} {} connected={} reason={:?}",
            record.direction,
            record.peer_identity,
            record.was_connected(),
            record.reason
        );
    }

    phone.shutdown().await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    Ok(())
}
