//! Two editors sharing a room through an in-process relay hub

use reactype_collab::{
    CollabClient, LocalConnector, ReconcileOutcome, RelayConfig, RelayEvent, RelayHub,
    SessionState,
};
use reactype_editor::{Action, ChildKind};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout, Instant};

const ROOM: &str = "design-review";

fn config() -> RelayConfig {
    RelayConfig {
        debounce_ms: 20,
        connect_timeout_ms: 1_000,
        ..RelayConfig::default()
    }
}

fn client(hub: &RelayHub) -> CollabClient<LocalConnector> {
    CollabClient::new(LocalConnector::new(hub.clone()), config())
}

/// Poll until the condition holds or two seconds pass
async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        sleep(Duration::from_millis(10)).await;
    }
    condition()
}

async fn next_matching(
    events: &mut mpsc::UnboundedReceiver<RelayEvent>,
    mut predicate: impl FnMut(&RelayEvent) -> bool,
) -> Option<RelayEvent> {
    timeout(Duration::from_secs(2), async {
        while let Some(event) = events.recv().await {
            if predicate(&event) {
                return Some(event);
            }
        }
        None
    })
    .await
    .ok()
    .flatten()
}

fn add_row() -> Action {
    Action::AddComponent {
        component_name: "Row".to_string(),
        root: false,
    }
}

#[tokio::test]
async fn test_change_reaches_peer() {
    let hub = RelayHub::new();
    let mut alice = client(&hub);
    let mut bob = client(&hub);

    alice.join_room(ROOM).await.unwrap();
    bob.join_room(ROOM).await.unwrap();
    assert!(wait_until(|| hub.room_size(ROOM) == 2).await);

    alice.apply(add_row()).unwrap();

    assert!(wait_until(|| bob.snapshot().app_state.component_by_name("Row").is_some()).await);
    assert_eq!(bob.snapshot().app_state, alice.snapshot().app_state);
}

#[tokio::test]
async fn test_reconciled_state_is_not_echoed() {
    let hub = RelayHub::new();
    let mut alice = client(&hub);
    let mut bob = client(&hub);

    alice.join_room(ROOM).await.unwrap();
    bob.join_room(ROOM).await.unwrap();
    assert!(wait_until(|| hub.room_size(ROOM) == 2).await);

    alice.apply(add_row()).unwrap();
    assert!(wait_until(|| bob.snapshot().app_state.component_by_name("Row").is_some()).await);

    // Several debounce windows; an echo from bob would bump the counter
    let relayed = hub.stats().messages_relayed;
    sleep(Duration::from_millis(150)).await;
    assert_eq!(hub.stats().messages_relayed, relayed);
}

#[tokio::test]
async fn test_late_joiner_receives_room_state() {
    let hub = RelayHub::new();
    let mut alice = client(&hub);

    alice.join_room(ROOM).await.unwrap();
    assert!(wait_until(|| hub.room_size(ROOM) == 1).await);
    alice
        .apply(Action::AddChild {
            kind: ChildKind::HtmlElement,
            type_id: 11,
            child_id: None,
        })
        .unwrap();
    assert!(wait_until(|| hub.room_state(ROOM).is_some()).await);

    let mut bob = client(&hub);
    let mut events = bob.take_event_rx().unwrap();
    bob.join_room(ROOM).await.unwrap();

    let event = next_matching(&mut events, |e| matches!(e, RelayEvent::Reconciled(_))).await;
    assert_eq!(
        event,
        Some(RelayEvent::Reconciled(ReconcileOutcome::Baseline))
    );
    assert_eq!(bob.snapshot().app_state, alice.snapshot().app_state);
}

#[tokio::test]
async fn test_peer_action_is_surfaced() {
    let hub = RelayHub::new();
    let mut alice = client(&hub);
    let mut bob = client(&hub);
    let mut events = bob.take_event_rx().unwrap();

    alice.join_room(ROOM).await.unwrap();
    bob.join_room(ROOM).await.unwrap();
    assert!(wait_until(|| hub.room_size(ROOM) == 2).await);

    alice.apply(add_row()).unwrap();

    let event = next_matching(&mut events, |e| matches!(e, RelayEvent::PeerAction { .. })).await;
    match event {
        Some(RelayEvent::PeerAction { name, payload }) => {
            assert_eq!(name, "addComponentAction");
            assert_eq!(payload["componentName"], "Row");
        }
        other => panic!("expected peer action, got {:?}", other),
    }
}

#[tokio::test]
async fn test_leave_cancels_pending_broadcast() {
    let hub = RelayHub::new();
    let mut alice = client(&hub);
    let mut bob = client(&hub);

    alice.join_room(ROOM).await.unwrap();
    bob.join_room(ROOM).await.unwrap();
    assert!(wait_until(|| hub.room_size(ROOM) == 2).await);

    alice.apply(add_row()).unwrap();
    alice.leave_room();
    assert_eq!(alice.session_state(), SessionState::Disconnected);

    sleep(Duration::from_millis(120)).await;
    assert!(bob.snapshot().app_state.component_by_name("Row").is_none());
    assert_eq!(hub.room_state(ROOM), None);
    assert_eq!(hub.room_size(ROOM), 1);
}

#[tokio::test]
async fn test_undo_propagates() {
    let hub = RelayHub::new();
    let mut alice = client(&hub);
    let mut bob = client(&hub);

    alice.join_room(ROOM).await.unwrap();
    bob.join_room(ROOM).await.unwrap();
    assert!(wait_until(|| hub.room_size(ROOM) == 2).await);

    alice.apply(add_row()).unwrap();
    assert!(wait_until(|| bob.snapshot().app_state.component_by_name("Row").is_some()).await);

    assert!(alice.undo().unwrap());
    assert!(wait_until(|| bob.snapshot().app_state.component_by_name("Row").is_none()).await);
}
