//! Projection invariants and notification delivery

mod common;

use common::*;
use rvoip_phone_core::{
    project, CallDirection, PhoneBuilder, PhoneConfig, PhoneError, PhoneEvent, PhoneState,
    TerminationReason, TransportEvent,
};
use tokio::sync::broadcast;
use tokio_test::assert_ok;

/// Assert the published state is the table value for the current state
async fn assert_projection_holds(test: &TestPhone) {
    let registration = test.phone.registration_state().await;
    let call = test
        .phone
        .active_call()
        .await
        .map(|session| (session.direction(), session.sub_state()));
    assert_eq!(test.phone.phone_state().await, project(registration, call));
}

fn drain_states(rx: &mut broadcast::Receiver<PhoneEvent>) -> Vec<PhoneState> {
    let mut states = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let PhoneEvent::StateChanged { state, .. } = event {
            states.push(state);
        }
    }
    states
}

#[tokio::test]
async fn test_projection_holds_across_mixed_sequence() {
    let test = build_phone(PhoneConfig::default()).await;
    assert_projection_holds(&test).await;

    assert_ok!(test.phone.connect(credentials()).await);
    assert_projection_holds(&test).await;

    // Deterministic walk over inbound and outbound flows, with stray events mixed in
    for round in 0..6 {
        let inbound = format!("in-{}", round);
        if round % 2 == 0 {
            test.phone.handle_transport_event(TransportEvent::incoming(inbound.as_str(), "4155551212")).await;
            assert_projection_holds(&test).await;
            test.phone.handle_transport_event(TransportEvent::incoming("intruder", "5550000")).await;
            assert_projection_holds(&test).await;
            assert_ok!(test.phone.answer().await);
            assert_projection_holds(&test).await;
            test.phone.handle_transport_event(TransportEvent::answered(inbound.as_str())).await;
        } else {
            assert_ok!(test.phone.call("1001").await);
            assert_projection_holds(&test).await;
            let handle = test.transport.last_placed_handle().unwrap();
            test.phone.handle_transport_event(TransportEvent::incoming(inbound.as_str(), "5551111")).await;
            assert_projection_holds(&test).await;
            test.phone.handle_transport_event(TransportEvent::progressing(&handle)).await;
            test.phone.handle_transport_event(TransportEvent::answered(&handle)).await;
        }
        assert_projection_holds(&test).await;
        assert_eq!(test.phone.phone_state().await, PhoneState::InCall);

        if round % 3 == 0 {
            test.phone.hangup().await;
        } else {
            let handle = test.phone.active_call().await.unwrap().handle().clone();
            test.phone
                .handle_transport_event(TransportEvent::terminated(&handle, TerminationReason::RemoteHangup))
                .await;
        }
        assert_projection_holds(&test).await;
        test.phone.hangup().await;
        assert_projection_holds(&test).await;
    }

    assert_eq!(test.phone.call_history().await.len(), 6);
    test.phone.disconnect().await;
    assert_projection_holds(&test).await;
}

#[tokio::test]
async fn test_only_one_session_is_ever_active() {
    let test = registered_phone().await;

    test.phone.handle_transport_event(TransportEvent::incoming("in-1", "4155551212")).await;
    for i in 0..5 {
        let handle = format!("extra-{}", i);
        test.phone.handle_transport_event(TransportEvent::incoming(handle.as_str(), "5550000")).await;
        assert_eq!(test.phone.call("1001").await, Err(PhoneError::SessionBusy));
    }

    let active = test.phone.active_call().await.unwrap();
    assert_eq!(active.direction(), CallDirection::Inbound);
    assert_eq!(active.peer_identity(), "4155551212");
    assert_eq!(test.transport.count(|c| matches!(c, TransportCall::DeclineIncoming(_))), 5);
}

#[tokio::test]
async fn test_concurrent_calls_admit_only_one_session() {
    let test = registered_phone().await;
    let gate = test.transport.gate_place_call();

    let first = {
        let phone = test.phone.clone();
        tokio::spawn(async move { phone.call("1001").await })
    };
    let second = {
        let phone = test.phone.clone();
        tokio::spawn(async move { phone.call("1002").await })
    };

    // Whichever call lost the race fails without touching the transport
    assert!(wait_for_request(&test.transport, 1, |c| matches!(c, TransportCall::PlaceCall { .. })).await);
    gate.notify_one();
    let results = [first.await.unwrap(), second.await.unwrap()];

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(results.iter().filter(|r| **r == Err(PhoneError::SessionBusy)).count(), 1);
    assert_eq!(test.transport.count(|c| matches!(c, TransportCall::PlaceCall { .. })), 1);
    assert_eq!(test.phone.phone_state().await, PhoneState::Calling);
}

#[tokio::test]
async fn test_subscribers_see_every_transition_in_order() {
    let test = build_phone(PhoneConfig::default()).await;
    let mut rx = test.phone.subscribe();

    assert_ok!(test.phone.connect(credentials()).await);
    assert_ok!(test.phone.call("1001").await);
    let handle = test.transport.last_placed_handle().unwrap();
    test.phone.handle_transport_event(TransportEvent::answered(&handle)).await;
    test.phone.hangup().await;
    test.phone.disconnect().await;

    assert_eq!(
        drain_states(&mut rx),
        vec![
            PhoneState::Connecting,
            PhoneState::Registered,
            PhoneState::Calling,
            PhoneState::InCall,
            PhoneState::Registered,
            PhoneState::Disconnected,
        ]
    );
}

#[tokio::test]
async fn test_state_change_carries_previous_state() {
    let test = build_phone(PhoneConfig::default()).await;
    let mut rx = test.phone.subscribe();

    assert_ok!(test.phone.connect(credentials()).await);

    match rx.recv().await.unwrap() {
        PhoneEvent::StateChanged { state, previous, .. } => {
            assert_eq!(previous, PhoneState::Disconnected);
            assert_eq!(state, PhoneState::Connecting);
        }
        other => panic!("Expected StateChanged, got {:?}", other),
    }
}

#[tokio::test]
async fn test_identical_projection_emits_nothing() {
    let test = registered_phone().await;
    test.phone.handle_transport_event(TransportEvent::incoming("in-1", "4155551212")).await;
    let mut rx = test.phone.subscribe();

    // Idle -> Establishing projects to Ringing both times
    assert_ok!(test.phone.answer().await);

    assert!(matches!(rx.try_recv(), Err(broadcast::error::TryRecvError::Empty)));
}

#[tokio::test]
async fn test_builder_requires_transport() {
    let result = PhoneBuilder::new().build().await;
    assert!(matches!(result, Err(PhoneError::InvalidConfiguration { .. })));
}

#[tokio::test]
async fn test_builder_rejects_invalid_config() {
    let config = PhoneConfig::default().with_event_buffer(0);
    let result = PhoneBuilder::new()
        .config(config)
        .transport(MockTransport::new())
        .build()
        .await;

    match result {
        Err(PhoneError::InvalidConfiguration { field, .. }) => assert_eq!(field, "event_buffer"),
        other => panic!("Expected InvalidConfiguration, got {:?}", other.map(|_| ())),
    }
}
