//! Integration tests for the room system: rooms created, joined, played, and
//! torn down through `RoomStore`, exactly as a connection handler would.

use std::sync::Arc;
use std::time::Duration;

use rookery_protocol::{ErrorCode, RoomSettingsInput, RoomState, ServerEvent, TimeControl};
use rookery_room::{InMemoryRoomCache, RoomError, RoomStore};
use rookery_session::Identity;
use rookery_transport::ConnectionId;
use tokio::sync::mpsc;

// =========================================================================
// Helpers
// =========================================================================

fn store() -> RoomStore {
    RoomStore::new(Arc::new(InMemoryRoomCache::new()))
}

fn guest(name: &str) -> Identity {
    Identity::Guest(name.into())
}

/// A player's inbound channel; the receiver is dropped immediately for
/// tests that never inspect their own events.
fn outbound() -> (mpsc::UnboundedSender<ServerEvent>, mpsc::UnboundedReceiver<ServerEvent>) {
    mpsc::unbounded_channel()
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}

// =========================================================================
// Create / join / catalog
// =========================================================================

#[tokio::test]
async fn test_create_then_join_starts_the_game() {
    let store = store();
    let (host_tx, _host_rx) = outbound();
    let (_handle, created) = store
        .create(guest("host"), "Alice".into(), None, ConnectionId::new(1), host_tx)
        .await
        .unwrap();
    assert_eq!(created.state, RoomState::WaitingForPlayer);

    let (opp_tx, _opp_rx) = outbound();
    let view = store
        .join(
            &created.room_id,
            guest("opponent"),
            "Bob".into(),
            None,
            ConnectionId::new(2),
            opp_tx,
        )
        .await
        .unwrap();

    assert_eq!(view.state, RoomState::InProgress);
    assert!(view.game.is_some());
    assert_eq!(view.opponent_name.as_deref(), Some("Bob"));
}

#[tokio::test]
async fn test_joining_full_room_is_rejected() {
    let store = store();
    let (host_tx, _) = outbound();
    let (_, created) = store
        .create(guest("host"), "Alice".into(), None, ConnectionId::new(1), host_tx)
        .await
        .unwrap();
    let (opp_tx, _) = outbound();
    store
        .join(&created.room_id, guest("opponent"), "Bob".into(), None, ConnectionId::new(2), opp_tx)
        .await
        .unwrap();

    let (third_tx, _) = outbound();
    let err = store
        .join(&created.room_id, guest("carol"), "Carol".into(), None, ConnectionId::new(3), third_tx)
        .await
        .unwrap_err();
    assert!(matches!(err, RoomError::JoinNotAllowed(_)));
}

#[tokio::test]
async fn test_locked_room_requires_the_right_password() {
    let store = store();
    let (host_tx, _) = outbound();
    let settings = RoomSettingsInput {
        password: Some("swordfish".into()),
        ..Default::default()
    };
    let (_, created) = store
        .create(guest("host"), "Alice".into(), Some(settings), ConnectionId::new(1), host_tx)
        .await
        .unwrap();

    let (wrong_tx, _) = outbound();
    let err = store
        .join(&created.room_id, guest("opponent"), "Bob".into(), Some("wrong".into()), ConnectionId::new(2), wrong_tx)
        .await
        .unwrap_err();
    assert!(matches!(err, RoomError::PasswordIncorrect(_)));

    let (right_tx, _) = outbound();
    let view = store
        .join(
            &created.room_id,
            guest("opponent"),
            "Bob".into(),
            Some("swordfish".into()),
            ConnectionId::new(2),
            right_tx,
        )
        .await
        .unwrap();
    assert_eq!(view.state, RoomState::InProgress);
}

#[tokio::test]
async fn test_private_room_is_absent_from_the_public_catalog() {
    let store = store();
    let (host_tx, _) = outbound();
    let settings = RoomSettingsInput {
        is_private: Some(true),
        ..Default::default()
    };
    store
        .create(guest("host"), "Alice".into(), Some(settings), ConnectionId::new(1), host_tx)
        .await
        .unwrap();
    assert!(store.listings().is_empty());
}

#[tokio::test]
async fn test_an_identity_cannot_be_seated_in_two_rooms_at_once() {
    let store = store();
    let (host_tx, _) = outbound();
    store
        .create(guest("host"), "Alice".into(), None, ConnectionId::new(1), host_tx)
        .await
        .unwrap();

    let (host2_tx, _) = outbound();
    let err = store
        .create(guest("host"), "Alice".into(), None, ConnectionId::new(9), host2_tx)
        .await
        .unwrap_err();
    assert!(matches!(err, RoomError::AlreadyInRoom));
}

// =========================================================================
// Gameplay end-to-end
// =========================================================================

#[tokio::test]
async fn test_fools_mate_ends_the_room_in_checkmate() {
    let store = store();
    let (host_tx, mut host_rx) = outbound();
    let (_, created) = store
        .create(guest("host"), "Alice".into(), None, ConnectionId::new(1), host_tx)
        .await
        .unwrap();
    let (opp_tx, _) = outbound();
    let room_id = created.room_id.clone();
    store
        .join(&room_id, guest("opponent"), "Bob".into(), None, ConnectionId::new(2), opp_tx)
        .await
        .unwrap();

    let handle = store.get(&room_id).await.unwrap();
    handle.apply_move(guest("host"), "f2".into(), "f3".into(), None).await.unwrap();
    handle.apply_move(guest("opponent"), "e7".into(), "e5".into(), None).await.unwrap();
    handle.apply_move(guest("host"), "g2".into(), "g4".into(), None).await.unwrap();
    handle.apply_move(guest("opponent"), "d8".into(), "h4".into(), None).await.unwrap();

    let view = handle.snapshot().await.unwrap();
    assert_eq!(view.state, RoomState::Finished);
    assert_eq!(view.game.unwrap().status, rookery_protocol::GameStatus::Checkmate);

    settle().await;
    let mut saw_game_ended = false;
    while let Ok(event) = host_rx.try_recv() {
        if matches!(event, ServerEvent::GameEnded { .. }) {
            saw_game_ended = true;
        }
    }
    assert!(saw_game_ended, "host should have observed game:ended");
}

#[tokio::test]
async fn test_move_out_of_turn_is_rejected_with_the_right_error_code() {
    let store = store();
    let (host_tx, _) = outbound();
    let (_, created) = store
        .create(guest("host"), "Alice".into(), None, ConnectionId::new(1), host_tx)
        .await
        .unwrap();
    let (opp_tx, _) = outbound();
    store
        .join(&created.room_id, guest("opponent"), "Bob".into(), None, ConnectionId::new(2), opp_tx)
        .await
        .unwrap();

    let handle = store.get(&created.room_id).await.unwrap();
    let err = handle
        .apply_move(guest("opponent"), "e7".into(), "e5".into(), None)
        .await
        .unwrap_err();
    assert_eq!(err.to_error_code(), ErrorCode::NotYourTurn);
}

#[tokio::test]
async fn test_draw_offer_decline_then_accept() {
    let store = store();
    let (host_tx, _) = outbound();
    let (_, created) = store
        .create(guest("host"), "Alice".into(), None, ConnectionId::new(1), host_tx)
        .await
        .unwrap();
    let (opp_tx, _) = outbound();
    store
        .join(&created.room_id, guest("opponent"), "Bob".into(), None, ConnectionId::new(2), opp_tx)
        .await
        .unwrap();
    let handle = store.get(&created.room_id).await.unwrap();

    handle.offer_draw(guest("host")).await.unwrap();
    // The offerer can't accept their own offer.
    let err = handle.accept_draw(guest("host")).await.unwrap_err();
    assert!(matches!(err, RoomError::CannotAcceptOwnDraw));

    handle.decline_draw(guest("opponent")).await.unwrap();
    let view = handle.snapshot().await.unwrap();
    assert_eq!(view.state, RoomState::InProgress);

    handle.offer_draw(guest("opponent")).await.unwrap();
    handle.accept_draw(guest("host")).await.unwrap();
    let view = handle.snapshot().await.unwrap();
    assert_eq!(view.state, RoomState::Finished);
    assert_eq!(view.game.unwrap().status, rookery_protocol::GameStatus::Draw);
}

// =========================================================================
// Membership: spectators, abandonment, reconnection
// =========================================================================

#[tokio::test]
async fn test_spectator_can_be_kicked_by_the_host_only() {
    let store = store();
    let (host_tx, _) = outbound();
    let (_, created) = store
        .create(guest("host"), "Alice".into(), None, ConnectionId::new(1), host_tx)
        .await
        .unwrap();
    let (opp_tx, _) = outbound();
    store
        .join(&created.room_id, guest("opponent"), "Bob".into(), None, ConnectionId::new(2), opp_tx)
        .await
        .unwrap();
    let (spec_tx, mut spec_rx) = outbound();
    store
        .spectate(&created.room_id, guest("carol"), "Carol".into(), None, ConnectionId::new(3), spec_tx)
        .await
        .unwrap();

    let handle = store.get(&created.room_id).await.unwrap();
    let err = handle
        .kick_spectator(guest("opponent"), guest("carol"))
        .await
        .unwrap_err();
    assert!(matches!(err, RoomError::HostOnly));

    handle.kick_spectator(guest("host"), guest("carol")).await.unwrap();
    settle().await;
    assert!(matches!(spec_rx.try_recv(), Ok(ServerEvent::RoomKicked { .. })));

    let view = handle.snapshot().await.unwrap();
    assert_eq!(view.spectators.len(), 0);
}

#[tokio::test]
async fn test_host_leaving_before_an_opponent_closes_the_room_and_frees_the_identity() {
    let store = store();
    let (host_tx, mut host_rx) = outbound();
    let (handle, created) = store
        .create(guest("host"), "Alice".into(), None, ConnectionId::new(1), host_tx)
        .await
        .unwrap();

    handle.leave(guest("host")).await.unwrap();
    settle().await;

    // The store's map still holds the handle until the next gc() sweep, but
    // the actor task behind it has already exited — a snapshot against a
    // dead actor comes back empty.
    assert!(handle.snapshot().await.is_none());

    let mut saw_closed = false;
    while let Ok(event) = host_rx.try_recv() {
        if matches!(event, ServerEvent::RoomClosed { .. }) {
            saw_closed = true;
        }
    }
    assert!(saw_closed);

    // The identity is free again — a fresh room can be created for it.
    let (host2_tx, _) = outbound();
    store
        .create(guest("host"), "Alice".into(), None, ConnectionId::new(5), host2_tx)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_disconnect_then_resubscribe_before_grace_expiry_cancels_the_pending_leave() {
    let store = store();
    let (host_tx, _) = outbound();
    let (_, created) = store
        .create(guest("host"), "Alice".into(), None, ConnectionId::new(1), host_tx)
        .await
        .unwrap();
    let (opp_tx, mut opp_rx) = outbound();
    store
        .join(&created.room_id, guest("opponent"), "Bob".into(), None, ConnectionId::new(2), opp_tx)
        .await
        .unwrap();

    store.disconnect(guest("opponent"), ConnectionId::new(2)).await;
    settle().await;
    assert!(matches!(opp_rx.try_recv(), Ok(ServerEvent::PlayerDisconnected { .. })));

    let (opp2_tx, mut opp2_rx) = outbound();
    let restored = store
        .restore(guest("opponent"), ConnectionId::new(7), opp2_tx)
        .await
        .unwrap();
    assert_eq!(restored.room_id, created.room_id);
    settle().await;
    assert!(matches!(opp2_rx.try_recv(), Ok(ServerEvent::PlayerReconnected { .. })));

    let handle = store.get(&created.room_id).await.unwrap();
    let view = handle.snapshot().await.unwrap();
    assert_eq!(view.state, RoomState::InProgress);
}

// =========================================================================
// Active clock sweep
// =========================================================================

#[tokio::test]
async fn test_flag_fall_is_detected_without_a_move_being_played() {
    let store = store();
    let (host_tx, mut host_rx) = outbound();
    let settings = RoomSettingsInput {
        time_control: Some(TimeControl { initial: 1, increment: 0 }),
        ..Default::default()
    };
    let (_, created) = store
        .create(guest("host"), "Alice".into(), Some(settings), ConnectionId::new(1), host_tx.clone())
        .await
        .unwrap();
    let (opp_tx, _) = outbound();
    store
        .join(&created.room_id, guest("opponent"), "Bob".into(), None, ConnectionId::new(2), opp_tx)
        .await
        .unwrap();

    // White's 1-second clock runs out with nobody moving; the room's 1Hz
    // sweep should catch it on its own.
    tokio::time::sleep(Duration::from_millis(1_500)).await;

    let handle = store.get(&created.room_id).await.unwrap();
    let view = handle.snapshot().await.unwrap();
    assert_eq!(view.state, RoomState::Finished);
    let game = view.game.unwrap();
    assert_eq!(game.status, rookery_protocol::GameStatus::Timeout);
    assert_eq!(game.winner, Some(rookery_protocol::Side::Black));

    let mut saw_ended = false;
    while let Ok(event) = host_rx.try_recv() {
        if matches!(event, ServerEvent::GameEnded { .. }) {
            saw_ended = true;
        }
    }
    assert!(saw_ended);
}

// =========================================================================
// Garbage collection
// =========================================================================

#[tokio::test]
async fn test_gc_does_not_touch_an_in_progress_room() {
    let store = store();
    let (host_tx, _) = outbound();
    let (_, created) = store
        .create(guest("host"), "Alice".into(), None, ConnectionId::new(1), host_tx)
        .await
        .unwrap();
    let (opp_tx, _) = outbound();
    store
        .join(&created.room_id, guest("opponent"), "Bob".into(), None, ConnectionId::new(2), opp_tx)
        .await
        .unwrap();

    let collected = store.gc().await;
    assert_eq!(collected, 0);
    assert_eq!(store.room_count().await, 1);
}
