//! Transfer handshake tests.

#![allow(clippy::unwrap_used)]

use ticket_engine_core::{EngineError, TicketKey, TicketType};
use ticket_engine_testing::TestEngine;
use tokio_test::{assert_err, assert_ok};

#[tokio::test]
async fn test_handshake_rekeys_ticket() {
    let engine = TestEngine::new();
    let ticket = engine
        .paid_ticket_for(&engine.alice, TicketType::Regular)
        .await
        .unwrap();
    let k1 = ticket.key.clone();

    let locked = engine
        .transfers
        .setup_for_transfer(engine.alice.id, &k1, "bob")
        .await
        .unwrap();
    assert!(locked.is_transferrable());
    assert_eq!(locked.transfer_goal_owner, Some(engine.bob.id));

    let intruder = engine.transfers.transfer_ticket(engine.carol.id, &k1).await;
    assert!(matches!(intruder, Err(EngineError::NotTransferrable(ref key)) if *key == k1));

    let transferred = engine
        .transfers
        .transfer_ticket(engine.bob.id, &k1)
        .await
        .unwrap();
    let k2 = transferred.key.clone();

    assert_ne!(k1, k2);
    assert_eq!(transferred.id, ticket.id);
    assert_eq!(transferred.owner, engine.bob.id);
    assert!(!transferred.is_transferrable());
    assert_eq!(transferred.transfer_goal_owner, None);
    assert!(transferred.valid);

    assert_err!(engine.allocator.get_ticket_by_key(&k1).await);
    let current = assert_ok!(engine.allocator.get_ticket_by_key(&k2).await);
    assert_eq!(current.owner, engine.bob.id);
}

#[tokio::test]
async fn test_refusals_are_indistinguishable() {
    let engine = TestEngine::new();
    let ticket = engine
        .paid_ticket_for(&engine.alice, TicketType::Regular)
        .await
        .unwrap();
    let unlocked = engine
        .paid_ticket_for(&engine.bob, TicketType::Regular)
        .await
        .unwrap();
    engine
        .transfers
        .setup_for_transfer(engine.alice.id, &ticket.key, "bob")
        .await
        .unwrap();

    let missing_key = TicketKey::from_string("does-not-exist");
    let missing = engine
        .transfers
        .transfer_ticket(engine.carol.id, &missing_key)
        .await
        .unwrap_err();
    let wrong_user = engine
        .transfers
        .transfer_ticket(engine.carol.id, &ticket.key)
        .await
        .unwrap_err();
    let not_locked = engine
        .transfers
        .transfer_ticket(engine.carol.id, &unlocked.key)
        .await
        .unwrap_err();

    let rendered = |error: &EngineError, key: &TicketKey| error.to_string().replace(key.as_str(), "<key>");
    assert!(matches!(missing, EngineError::NotTransferrable(_)));
    assert!(matches!(wrong_user, EngineError::NotTransferrable(_)));
    assert!(matches!(not_locked, EngineError::NotTransferrable(_)));
    assert_eq!(
        rendered(&missing, &missing_key),
        rendered(&wrong_user, &ticket.key)
    );
    assert_eq!(
        rendered(&missing, &missing_key),
        rendered(&not_locked, &unlocked.key)
    );
}

#[tokio::test]
async fn test_old_key_never_resolves_again() {
    let engine = TestEngine::new();
    let ticket = engine
        .paid_ticket_for(&engine.alice, TicketType::Regular)
        .await
        .unwrap();
    let k1 = ticket.key.clone();

    engine
        .transfers
        .setup_for_transfer(engine.alice.id, &k1, "bob")
        .await
        .unwrap();
    let k2 = engine
        .transfers
        .transfer_ticket(engine.bob.id, &k1)
        .await
        .unwrap()
        .key;

    // Bob passes it back; the ticket gets a third key.
    engine
        .transfers
        .setup_for_transfer(engine.bob.id, &k2, "alice")
        .await
        .unwrap();
    let k3 = engine
        .transfers
        .transfer_ticket(engine.alice.id, &k2)
        .await
        .unwrap()
        .key;

    assert_ne!(k3, k1);
    assert_ne!(k3, k2);
    assert!(engine.allocator.get_ticket_by_key(&k1).await.is_err());
    assert!(engine.allocator.get_ticket_by_key(&k2).await.is_err());

    let replay = engine.transfers.transfer_ticket(engine.bob.id, &k1).await;
    assert!(matches!(replay, Err(EngineError::NotTransferrable(_))));
}

#[tokio::test]
async fn test_setup_retargets_pending_transfer() {
    let engine = TestEngine::new();
    let ticket = engine
        .paid_ticket_for(&engine.alice, TicketType::Regular)
        .await
        .unwrap();

    engine
        .transfers
        .setup_for_transfer(engine.alice.id, &ticket.key, "bob")
        .await
        .unwrap();
    engine
        .transfers
        .setup_for_transfer(engine.alice.id, &ticket.key, "carol")
        .await
        .unwrap();

    let bob = engine.transfers.transfer_ticket(engine.bob.id, &ticket.key).await;
    assert!(matches!(bob, Err(EngineError::NotTransferrable(_))));

    let carol = engine
        .transfers
        .transfer_ticket(engine.carol.id, &ticket.key)
        .await
        .unwrap();
    assert_eq!(carol.owner, engine.carol.id);
}

#[tokio::test]
async fn test_goal_owner_cannot_cancel() {
    let engine = TestEngine::new();
    let ticket = engine
        .paid_ticket_for(&engine.alice, TicketType::Regular)
        .await
        .unwrap();
    engine
        .transfers
        .setup_for_transfer(engine.alice.id, &ticket.key, "bob")
        .await
        .unwrap();

    let result = engine
        .transfers
        .cancel_ticket_transfer(engine.bob.id, &ticket.key)
        .await;
    assert!(matches!(result, Err(EngineError::Forbidden(_))));
}
