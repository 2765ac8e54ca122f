//! Order lifecycle tests over the in-memory engine.

#![allow(clippy::unwrap_used)]

use futures::future::join_all;
use proptest::prelude::*;
use std::sync::Arc;
use ticket_engine_core::{
    EngineError, GatewayError, OrderStatus, StoreError, TicketRequest, TicketType,
};
use ticket_engine_testing::properties::ticket_request;
use ticket_engine_testing::{TestEngine, init_tracing};

const EARLY_BIRD: TicketRequest = TicketRequest::of_type(TicketType::EarlyBird);
const REGULAR: TicketRequest = TicketRequest::of_type(TicketType::Regular);

async fn sold(engine: &TestEngine, ticket_type: TicketType) -> usize {
    engine
        .allocator
        .get_number_sold_of_type(ticket_type)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_capacity_is_freed_when_an_order_expires() {
    let engine = TestEngine::builder()
        .with_limit(TicketType::EarlyBird, 2)
        .build();

    let first = engine.manager.create(engine.alice.id, EARLY_BIRD).await.unwrap();
    engine.manager.create(engine.bob.id, EARLY_BIRD).await.unwrap();

    let third = engine.manager.create(engine.carol.id, EARLY_BIRD).await;
    assert!(matches!(
        third,
        Err(EngineError::ResourceExhausted {
            ticket_type: TicketType::EarlyBird,
            limit: 2
        })
    ));

    engine.manager.expire_order(first.id).await.unwrap();
    assert_eq!(sold(&engine, TicketType::EarlyBird).await, 1);

    assert!(engine.manager.create(engine.carol.id, EARLY_BIRD).await.is_ok());
}

#[tokio::test]
async fn test_one_open_order_per_user() {
    let engine = TestEngine::new();

    engine.manager.create(engine.alice.id, REGULAR).await.unwrap();
    let second = engine.manager.create(engine.alice.id, REGULAR).await;

    assert!(matches!(second, Err(EngineError::Conflict(_))));
    assert_eq!(sold(&engine, TicketType::Regular).await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creates_for_one_user_open_one_order() {
    let engine = Arc::new(TestEngine::new());

    let handles = (0..16).map(|_| {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.manager.create(engine.alice.id, REGULAR).await })
    });
    let created = join_all(handles)
        .await
        .into_iter()
        .filter(|r| matches!(r, Ok(Ok(_))))
        .count();

    assert_eq!(created, 1);
    assert_eq!(
        engine.manager.get_open_orders("alice").await.unwrap().len(),
        1
    );
    assert_eq!(sold(&engine, TicketType::Regular).await, 1);
}

#[tokio::test]
async fn test_create_for_unknown_user() {
    let engine = TestEngine::new();
    let result = engine
        .manager
        .create(ticket_engine_core::UserId::new(), REGULAR)
        .await;
    assert!(matches!(result, Err(EngineError::NotFound { entity: "user", .. })));
}

#[tokio::test]
async fn test_order_limit() {
    let engine = TestEngine::builder().order_limit(2).build();

    let order = engine.manager.create(engine.alice.id, REGULAR).await.unwrap();
    engine
        .manager
        .add_ticket_to_order(order.id, REGULAR)
        .await
        .unwrap();
    let third = engine.manager.add_ticket_to_order(order.id, REGULAR).await;

    assert!(matches!(third, Err(EngineError::LimitReached { limit: 2, .. })));
    assert_eq!(sold(&engine, TicketType::Regular).await, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_adds_respect_order_limit() {
    let engine = Arc::new(TestEngine::builder().order_limit(3).build());
    let order = engine.manager.create(engine.alice.id, REGULAR).await.unwrap();

    let handles = (0..10).map(|_| {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.manager.add_ticket_to_order(order.id, REGULAR).await })
    });
    join_all(handles).await;

    let order = engine.manager.get_order_by_id(order.id).await.unwrap();
    assert_eq!(order.tickets.len(), 3);
    assert_eq!(sold(&engine, TicketType::Regular).await, 3);
}

#[tokio::test]
async fn test_paid_order_is_immutable() {
    let engine = TestEngine::new();
    let order = engine.buy(&engine.alice, REGULAR).await.unwrap();
    assert_eq!(order.status, OrderStatus::Paid);

    let add = engine.manager.add_ticket_to_order(order.id, REGULAR).await;
    assert!(matches!(add, Err(EngineError::Conflict(_))));

    let remove = engine.manager.remove_ticket_from_order(order.id, REGULAR).await;
    assert!(matches!(remove, Err(EngineError::Conflict(_))));

    let unchanged = engine.manager.get_order_by_id(order.id).await.unwrap();
    assert_eq!(unchanged.tickets, order.tickets);
}

#[tokio::test]
async fn test_remove_takes_exactly_one_matching_ticket() {
    let engine = TestEngine::new();
    let order = engine.manager.create(engine.alice.id, REGULAR).await.unwrap();
    engine.manager.add_ticket_to_order(order.id, REGULAR).await.unwrap();
    let with_pickup = TicketRequest {
        pickup_service: true,
        ..REGULAR
    };
    engine
        .manager
        .add_ticket_to_order(order.id, with_pickup)
        .await
        .unwrap();
    assert_eq!(sold(&engine, TicketType::Regular).await, 3);

    let order = engine
        .manager
        .remove_ticket_from_order(order.id, REGULAR)
        .await
        .unwrap();
    assert_eq!(order.tickets.len(), 2);
    assert_eq!(sold(&engine, TicketType::Regular).await, 2);

    let remaining = engine.manager.tickets_of(&order).await.unwrap();
    assert_eq!(remaining.iter().filter(|t| REGULAR.matches(t)).count(), 1);
    assert_eq!(remaining.iter().filter(|t| with_pickup.matches(t)).count(), 1);
}

#[tokio::test]
async fn test_remove_without_match() {
    let engine = TestEngine::new();
    let order = engine.manager.create(engine.alice.id, REGULAR).await.unwrap();

    let member = TicketRequest {
        ch_member: true,
        ..REGULAR
    };
    let result = engine.manager.remove_ticket_from_order(order.id, member).await;

    assert!(matches!(result, Err(EngineError::NotFound { entity: "ticket", .. })));
    assert_eq!(sold(&engine, TicketType::Regular).await, 1);
}

#[tokio::test]
async fn test_expire_archives_and_releases() {
    let engine = TestEngine::new();
    let order = engine.manager.create(engine.alice.id, EARLY_BIRD).await.unwrap();
    let order = engine
        .manager
        .add_ticket_to_order(order.id, REGULAR)
        .await
        .unwrap();
    let tickets = engine.manager.tickets_of(&order).await.unwrap();

    let expired = engine.manager.expire_order(order.id).await.unwrap();

    assert!(matches!(
        engine.manager.get_order_by_id(order.id).await,
        Err(EngineError::NotFound { .. })
    ));
    assert_eq!(expired.order_id, order.id);
    assert_eq!(expired.status_at_expiry, OrderStatus::Creating);
    assert_eq!(expired.tickets.len(), 2);
    assert_eq!(
        expired.tickets.iter().map(|t| t.key.clone()).collect::<Vec<_>>(),
        tickets.iter().map(|t| t.key.clone()).collect::<Vec<_>>()
    );
    assert_eq!(
        engine.manager.get_expired_order(order.id).await.unwrap(),
        expired
    );
    for ticket in &tickets {
        assert!(engine.allocator.get_ticket_by_id(ticket.id).await.is_err());
    }
    assert_eq!(sold(&engine, TicketType::EarlyBird).await, 0);
    assert_eq!(sold(&engine, TicketType::Regular).await, 0);

    let again = engine.manager.expire_order(order.id).await;
    assert!(matches!(again, Err(EngineError::NotFound { .. })));
    assert_eq!(engine.manager.get_expired_orders().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_paid_order_can_expire() {
    let engine = TestEngine::new();
    let order = engine.buy(&engine.alice, REGULAR).await.unwrap();

    let expired = engine.manager.expire_order(order.id).await.unwrap();
    assert_eq!(expired.status_at_expiry, OrderStatus::Paid);
    assert!(expired.tickets.iter().all(|t| t.valid));
    assert_eq!(sold(&engine, TicketType::Regular).await, 0);
}

#[tokio::test]
async fn test_payment_callback_validates_tickets() {
    let engine = TestEngine::new();
    let order = engine.manager.create(engine.alice.id, REGULAR).await.unwrap();
    let url = engine.manager.request_payment(order.id).await.unwrap();
    let reference = engine
        .manager
        .get_order_by_id(order.id)
        .await
        .unwrap()
        .reference
        .unwrap();
    assert!(url.ends_with(&reference));

    // Provider has not settled yet: nothing changes.
    let pending = engine
        .manager
        .update_order_status_by_reference(&reference)
        .await
        .unwrap();
    assert_eq!(pending.status, OrderStatus::Creating);

    engine
        .settle_payment(order.id, OrderStatus::Paid)
        .await
        .unwrap();
    let paid = engine.manager.update_order_status(order.id).await.unwrap();
    assert_eq!(paid.status, OrderStatus::Paid);

    let tickets = engine.manager.tickets_of(&paid).await.unwrap();
    assert!(tickets.iter().all(|t| t.valid));

    // Replayed callback is harmless.
    let replay = engine
        .manager
        .update_order_status_by_reference(&reference)
        .await
        .unwrap();
    assert_eq!(replay.status, OrderStatus::Paid);
}

#[tokio::test]
async fn test_gateway_expiry_expires_order() {
    let engine = TestEngine::new();
    let order = engine.manager.create(engine.alice.id, REGULAR).await.unwrap();
    engine.manager.request_payment(order.id).await.unwrap();
    engine
        .settle_payment(order.id, OrderStatus::Expired)
        .await
        .unwrap();

    let expired = engine.manager.update_order_status(order.id).await.unwrap();
    assert_eq!(expired.status, OrderStatus::Expired);
    assert!(engine.manager.get_expired_order(order.id).await.is_ok());
    assert_eq!(sold(&engine, TicketType::Regular).await, 0);
}

#[tokio::test]
async fn test_status_query_before_checkout() {
    let engine = TestEngine::new();
    let order = engine.manager.create(engine.alice.id, REGULAR).await.unwrap();

    let result = engine.manager.update_order_status(order.id).await;
    assert!(matches!(result, Err(EngineError::PaymentNotInitiated(id)) if id == order.id));
}

#[tokio::test]
async fn test_unknown_reference() {
    let engine = TestEngine::new();
    let result = engine
        .manager
        .update_order_status_by_reference("mock_ref_missing")
        .await;
    assert!(matches!(result, Err(EngineError::NotFound { entity: "order", .. })));
}

#[tokio::test]
async fn test_checkout_of_empty_order_is_rejected_by_gateway() {
    let engine = TestEngine::new();
    let order = engine.manager.create(engine.alice.id, REGULAR).await.unwrap();
    engine
        .manager
        .remove_ticket_from_order(order.id, REGULAR)
        .await
        .unwrap();

    let result = engine.manager.request_payment(order.id).await;
    assert!(matches!(
        result,
        Err(EngineError::Gateway(GatewayError::Rejected { .. }))
    ));
}

#[tokio::test]
async fn test_admin_approval_bypasses_gateway() {
    let engine = TestEngine::new();
    let order = engine.manager.create(engine.alice.id, REGULAR).await.unwrap();

    let approved = engine.manager.admin_approve_order(order.id).await.unwrap();
    assert_eq!(approved.status, OrderStatus::Paid);
    assert!(approved.reference.is_none());

    let tickets = engine.manager.tickets_of(&approved).await.unwrap();
    assert!(tickets.iter().all(|t| t.valid));

    // A new order may be opened once the previous one is paid.
    assert!(engine.manager.create(engine.alice.id, REGULAR).await.is_ok());
}

#[tokio::test]
async fn test_stale_orders_are_swept() {
    let engine = TestEngine::new();
    let stale = engine.manager.create(engine.alice.id, REGULAR).await.unwrap();
    let paid = engine.buy(&engine.bob, REGULAR).await.unwrap();

    engine.clock.advance(chrono::Duration::minutes(20));
    let fresh = engine.manager.create(engine.carol.id, REGULAR).await.unwrap();

    engine.clock.advance(chrono::Duration::minutes(15));
    let expired = engine
        .manager
        .expire_stale_orders(chrono::Duration::minutes(30))
        .await
        .unwrap();

    let expired_ids: Vec<_> = expired.iter().map(|archived| archived.order_id).collect();
    assert_eq!(expired_ids, vec![stale.id]);
    assert_eq!(expired[0].tickets.len(), 1);
    assert!(engine.manager.get_order_by_id(paid.id).await.is_ok());
    assert!(engine.manager.get_order_by_id(fresh.id).await.is_ok());
    assert_eq!(sold(&engine, TicketType::Regular).await, 2);
}

#[tokio::test]
async fn test_available_tickets_hide_internal_types() {
    let engine = TestEngine::builder()
        .with_limit(TicketType::EarlyBird, 3)
        .build();
    engine.manager.create(engine.alice.id, EARLY_BIRD).await.unwrap();

    let available = engine.manager.get_available_tickets().await.unwrap();
    let types: Vec<_> = available.iter().map(|a| a.ticket_type).collect();
    assert!(!types.contains(&TicketType::Test));
    assert!(!types.contains(&TicketType::Staff));

    let early_bird = available
        .iter()
        .find(|a| a.ticket_type == TicketType::EarlyBird)
        .unwrap();
    assert_eq!((early_bird.sold, early_bird.limit, early_bird.remaining), (1, 3, 2));
}

#[tokio::test]
async fn test_order_queries() {
    let engine = TestEngine::new();
    engine.buy(&engine.alice, REGULAR).await.unwrap();
    engine.manager.create(engine.alice.id, REGULAR).await.unwrap();
    engine.manager.create(engine.bob.id, REGULAR).await.unwrap();

    assert_eq!(engine.manager.get_all_orders().await.unwrap().len(), 3);
    assert_eq!(
        engine
            .manager
            .find_orders_by_username("ALICE")
            .await
            .unwrap()
            .len(),
        2
    );
    assert_eq!(engine.manager.get_open_orders("alice").await.unwrap().len(), 1);
    assert!(
        engine
            .manager
            .find_orders_by_username("nobody")
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn test_stale_sweep_rejects_out_of_range_max_age() {
    let engine = TestEngine::new();
    let order = engine.manager.create(engine.alice.id, REGULAR).await.unwrap();

    let negative = engine
        .manager
        .expire_stale_orders(chrono::Duration::minutes(-30))
        .await;
    assert!(matches!(negative, Err(EngineError::InvalidArgument(_))));

    // Further back than any representable date.
    let huge = engine
        .manager
        .expire_stale_orders(chrono::Duration::days(365 * 1_000_000))
        .await;
    assert!(matches!(huge, Err(EngineError::InvalidArgument(_))));

    assert_eq!(
        engine.manager.get_order_by_id(order.id).await.unwrap().status,
        OrderStatus::Creating
    );
}

// ============================================================================
// Partial failures
// ============================================================================

#[tokio::test]
async fn test_failed_archive_write_keeps_order_and_retry_frees_capacity() {
    init_tracing();
    let engine = TestEngine::builder()
        .with_limit(TicketType::EarlyBird, 1)
        .build();
    let order = engine.manager.create(engine.alice.id, EARLY_BIRD).await.unwrap();

    engine.expired_orders.fail_writes(true);
    let result = engine.manager.expire_order(order.id).await;
    assert!(matches!(
        result,
        Err(EngineError::Storage(StoreError::Backend(_)))
    ));
    assert!(engine.manager.get_order_by_id(order.id).await.is_ok());
    assert!(engine.manager.get_expired_order(order.id).await.is_err());

    engine.expired_orders.fail_writes(false);
    let archived = engine.manager.expire_order(order.id).await.unwrap();
    assert_eq!(archived.tickets.len(), 1);
    assert_eq!(sold(&engine, TicketType::EarlyBird).await, 0);
    assert!(engine.manager.create(engine.bob.id, EARLY_BIRD).await.is_ok());
}

#[tokio::test]
async fn test_failed_order_delete_is_finished_by_retry() {
    init_tracing();
    let engine = TestEngine::builder()
        .with_limit(TicketType::EarlyBird, 1)
        .build();
    let order = engine.manager.create(engine.alice.id, EARLY_BIRD).await.unwrap();
    engine
        .manager
        .add_ticket_to_order(order.id, REGULAR)
        .await
        .unwrap();

    // Archive written and tickets released, then the delete fails.
    engine.orders.fail_writes(true);
    assert!(engine.manager.expire_order(order.id).await.is_err());
    assert!(engine.manager.get_order_by_id(order.id).await.is_ok());
    assert_eq!(sold(&engine, TicketType::EarlyBird).await, 0);

    engine.orders.fail_writes(false);
    engine.manager.expire_order(order.id).await.unwrap();

    let archive = engine.manager.get_expired_orders().await.unwrap();
    assert_eq!(archive.len(), 1);
    assert_eq!(archive[0].tickets.len(), 2);
    assert!(engine.manager.get_order_by_id(order.id).await.is_err());
}

#[tokio::test]
async fn test_failed_save_during_removal_does_not_hold_capacity() {
    init_tracing();
    let engine = TestEngine::builder()
        .with_limit(TicketType::Regular, 1)
        .build();
    let order = engine.manager.create(engine.alice.id, EARLY_BIRD).await.unwrap();
    engine
        .manager
        .add_ticket_to_order(order.id, REGULAR)
        .await
        .unwrap();

    engine.orders.fail_writes(true);
    assert!(
        engine
            .manager
            .remove_ticket_from_order(order.id, REGULAR)
            .await
            .is_err()
    );
    assert_eq!(sold(&engine, TicketType::Regular).await, 0);
    engine.orders.fail_writes(false);

    // The order still lists the released ticket; paying skips it.
    let approved = engine.manager.admin_approve_order(order.id).await.unwrap();
    assert_eq!(approved.status, OrderStatus::Paid);
    let tickets = engine.manager.tickets_of(&approved).await.unwrap();
    assert_eq!(tickets.len(), 1);
    assert!(tickets[0].valid);
    assert!(engine.manager.create(engine.bob.id, REGULAR).await.is_ok());
}

#[tokio::test]
async fn test_removal_drops_ids_of_released_tickets() {
    let engine = TestEngine::new();
    let order = engine.manager.create(engine.alice.id, REGULAR).await.unwrap();
    engine
        .manager
        .add_ticket_to_order(order.id, EARLY_BIRD)
        .await
        .unwrap();

    engine.orders.fail_writes(true);
    assert!(
        engine
            .manager
            .remove_ticket_from_order(order.id, REGULAR)
            .await
            .is_err()
    );
    engine.orders.fail_writes(false);

    let order = engine
        .manager
        .remove_ticket_from_order(order.id, EARLY_BIRD)
        .await
        .unwrap();
    assert!(order.tickets.is_empty());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_expiry_returns_every_ticket_to_inventory(
        requests in proptest::collection::vec(ticket_request(), 1..=5),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        runtime.block_on(async {
            let engine = TestEngine::new();
            let order = engine.manager.create(engine.alice.id, requests[0]).await.unwrap();
            for request in &requests[1..] {
                engine.manager.add_ticket_to_order(order.id, *request).await.unwrap();
            }

            let archived = engine.manager.expire_order(order.id).await.unwrap();
            prop_assert_eq!(archived.tickets.len(), requests.len());
            for request in &requests {
                prop_assert_eq!(sold(&engine, request.ticket_type).await, 0);
            }
            Ok(())
        })?;
    }
}
