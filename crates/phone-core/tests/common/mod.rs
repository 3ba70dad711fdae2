//! Shared test fixtures: a recording transport and a recording observer

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use rvoip_phone_core::{
    event_channel, CallHandle, Credentials, Phone, PhoneBuilder, PhoneConfig, PhoneError,
    PhoneEventHandler, PhoneState, PhoneTransport, TransportError, TransportEventSender,
    TransportResult,
};

/// One request the phone sent to the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    BeginRegistration { identity: String },
    EndRegistration,
    PlaceCall { handle: CallHandle, destination: String },
    AcceptIncoming(CallHandle),
    DeclineIncoming(CallHandle),
    CancelOutgoing(CallHandle),
    TerminateCall(CallHandle),
    SetOutboundAudio { handle: CallHandle, enabled: bool },
    OutOfBandSignal { handle: CallHandle, symbol: char, duration_ms: u64 },
}

/// Outcomes and gates for the requests that matter to the tests
#[derive(Default)]
struct Script {
    registration: Option<TransportError>,
    place_call: Option<TransportError>,
    accept: Option<TransportError>,
    audio: Option<TransportError>,
    teardown: Option<TransportError>,
    registration_gate: Option<Arc<Notify>>,
    place_call_gate: Option<Arc<Notify>>,
    accept_gate: Option<Arc<Notify>>,
    signal_gate: Option<Arc<Notify>>,
}

/// Transport double that records every request
///
/// Requests succeed unless an error was scripted. A gated request waits
/// until the test releases its gate, which keeps it in flight.
#[derive(Default)]
pub struct MockTransport {
    calls: Mutex<Vec<TransportCall>>,
    script: Mutex<Script>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<TransportCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, predicate: impl Fn(&TransportCall) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| predicate(c)).count()
    }

    /// Handle of the most recent `place_call`
    pub fn last_placed_handle(&self) -> Option<CallHandle> {
        self.calls.lock().unwrap().iter().rev().find_map(|c| match c {
            TransportCall::PlaceCall { handle, .. } => Some(handle.clone()),
            _ => None,
        })
    }

    pub fn fail_registration(&self, error: TransportError) {
        self.script.lock().unwrap().registration = Some(error);
    }

    pub fn fail_place_call(&self, error: TransportError) {
        self.script.lock().unwrap().place_call = Some(error);
    }

    pub fn fail_accept(&self, error: TransportError) {
        self.script.lock().unwrap().accept = Some(error);
    }

    pub fn fail_audio(&self, error: TransportError) {
        self.script.lock().unwrap().audio = Some(error);
    }

    pub fn fail_teardown(&self, error: TransportError) {
        self.script.lock().unwrap().teardown = Some(error);
    }

    pub fn gate_registration(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.script.lock().unwrap().registration_gate = Some(gate.clone());
        gate
    }

    pub fn gate_place_call(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.script.lock().unwrap().place_call_gate = Some(gate.clone());
        gate
    }

    pub fn gate_accept(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.script.lock().unwrap().accept_gate = Some(gate.clone());
        gate
    }

    pub fn gate_signal(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.script.lock().unwrap().signal_gate = Some(gate.clone());
        gate
    }

    fn record(&self, call: TransportCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn outcome(&self, pick: impl Fn(&Script) -> Option<TransportError>) -> TransportResult<()> {
        match pick(&self.script.lock().unwrap()) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn pass_gate(&self, pick: impl Fn(&Script) -> Option<Arc<Notify>>) {
        let gate = pick(&self.script.lock().unwrap());
        if let Some(gate) = gate {
            gate.notified().await;
        }
    }
}

#[async_trait]
impl PhoneTransport for MockTransport {
    async fn begin_registration(&self, credentials: &Credentials) -> TransportResult<()> {
        self.record(TransportCall::BeginRegistration { identity: credentials.identity.clone() });
        self.pass_gate(|s| s.registration_gate.clone()).await;
        self.outcome(|s| s.registration.clone())
    }

    async fn end_registration(&self) -> TransportResult<()> {
        self.record(TransportCall::EndRegistration);
        self.outcome(|s| s.teardown.clone())
    }

    async fn place_call(&self, handle: &CallHandle, destination: &str) -> TransportResult<()> {
        self.record(TransportCall::PlaceCall {
            handle: handle.clone(),
            destination: destination.to_string(),
        });
        self.pass_gate(|s| s.place_call_gate.clone()).await;
        self.outcome(|s| s.place_call.clone())
    }

    async fn accept_incoming(&self, handle: &CallHandle) -> TransportResult<()> {
        self.record(TransportCall::AcceptIncoming(handle.clone()));
        self.pass_gate(|s| s.accept_gate.clone()).await;
        self.outcome(|s| s.accept.clone())
    }

    async fn decline_incoming(&self, handle: &CallHandle) -> TransportResult<()> {
        self.record(TransportCall::DeclineIncoming(handle.clone()));
        self.outcome(|s| s.teardown.clone())
    }

    async fn cancel_outgoing(&self, handle: &CallHandle) -> TransportResult<()> {
        self.record(TransportCall::CancelOutgoing(handle.clone()));
        self.outcome(|s| s.teardown.clone())
    }

    async fn terminate_call(&self, handle: &CallHandle) -> TransportResult<()> {
        self.record(TransportCall::TerminateCall(handle.clone()));
        self.outcome(|s| s.teardown.clone())
    }

    async fn set_outbound_audio_enabled(&self, handle: &CallHandle, enabled: bool) -> TransportResult<()> {
        self.record(TransportCall::SetOutboundAudio { handle: handle.clone(), enabled });
        self.outcome(|s| s.audio.clone())
    }

    async fn send_out_of_band_signal(
        &self,
        handle: &CallHandle,
        symbol: char,
        duration_ms: u64,
    ) -> TransportResult<()> {
        self.record(TransportCall::OutOfBandSignal { handle: handle.clone(), symbol, duration_ms });
        self.pass_gate(|s| s.signal_gate.clone()).await;
        self.outcome(|s| s.teardown.clone())
    }
}

/// Observer that keeps every notification as a short string
#[derive(Default)]
pub struct RecordingHandler {
    seen: Mutex<Vec<String>>,
}

impl RecordingHandler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.seen().into_iter().filter(|s| s.starts_with("error:")).collect()
    }
}

#[async_trait]
impl PhoneEventHandler for RecordingHandler {
    async fn on_phone_state_changed(&self, state: PhoneState) {
        self.seen.lock().unwrap().push(format!("state:{}", state));
    }

    async fn on_caller_identity_changed(&self, identity: String) {
        self.seen.lock().unwrap().push(format!("caller:{}", identity));
    }

    async fn on_error(&self, error: PhoneError) {
        self.seen.lock().unwrap().push(format!("error:{}", error.category()));
    }
}

pub fn credentials() -> Credentials {
    Credentials::new("sip.example.com", "alice", "secret", "wss://sip.example.com:8089/ws")
}

pub struct TestPhone {
    pub phone: Arc<Phone>,
    pub transport: Arc<MockTransport>,
    pub handler: Arc<RecordingHandler>,
    pub events: TransportEventSender,
}

pub async fn build_phone(config: PhoneConfig) -> TestPhone {
    let transport = MockTransport::new();
    let handler = RecordingHandler::new();
    let (events, receiver) = event_channel();

    let phone = PhoneBuilder::new()
        .config(config)
        .transport(transport.clone())
        .transport_events(receiver)
        .event_handler(handler.clone())
        .build()
        .await
        .expect("phone should build");

    TestPhone { phone, transport, handler, events }
}

/// A phone that has completed registration
pub async fn registered_phone() -> TestPhone {
    let test = build_phone(PhoneConfig::default()).await;
    test.phone.connect(credentials()).await.expect("registration should succeed");
    test
}

/// Poll until `check` holds or two seconds pass
pub async fn wait_until<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..200 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

pub async fn wait_for_state(phone: &Phone, expected: PhoneState) -> bool {
    wait_until(move || async move { phone.phone_state().await == expected }).await
}

/// Wait until the transport has seen at least `n` requests matching `predicate`
pub async fn wait_for_request(
    transport: &MockTransport,
    n: usize,
    predicate: impl Fn(&TransportCall) -> bool,
) -> bool {
    wait_until(|| {
        let ok = transport.count(&predicate) >= n;
        async move { ok }
    })
    .await
}

/// Wait until the observer has seen `n` notifications
pub async fn wait_for_notifications(handler: &RecordingHandler, n: usize) -> bool {
    wait_until(|| {
        let ok = handler.seen().len() >= n;
        async move { ok }
    })
    .await
}

/// Wait until the observer's error notifications are exactly `expected`
pub async fn wait_for_errors(handler: &RecordingHandler, expected: &[&str]) -> bool {
    wait_until(|| {
        let ok = handler.errors() == expected;
        async move { ok }
    })
    .await
}

/// Wait until the call history holds `n` records
pub async fn wait_for_history(phone: &Phone, n: usize) -> bool {
    wait_until(move || async move { phone.call_history().await.len() >= n }).await
}
