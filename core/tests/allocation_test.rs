//! Capacity tests: no ticket type is ever oversold.

#![allow(clippy::unwrap_used)]

use futures::future::join_all;
use proptest::prelude::*;
use std::sync::Arc;
use ticket_engine_core::memory::InMemoryTicketStore;
use ticket_engine_core::{EngineError, TicketAllocator, TicketCatalog, TicketType, UserId};
use ticket_engine_testing::properties::buyable_ticket_type;

fn allocator(ticket_type: TicketType, limit: usize) -> Arc<TicketAllocator> {
    Arc::new(TicketAllocator::new(
        Arc::new(InMemoryTicketStore::new()),
        TicketCatalog::default().with_limit(ticket_type, limit),
    ))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_never_oversell() {
    const CAPACITY: usize = 10;
    const REQUESTS: usize = 64;

    let allocator = allocator(TicketType::EarlyBird, CAPACITY);

    let handles = (0..REQUESTS).map(|_| {
        let allocator = Arc::clone(&allocator);
        tokio::spawn(async move {
            allocator
                .request_ticket_of_type(TicketType::EarlyBird, UserId::new(), false, false)
                .await
        })
    });
    let results: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(Result::unwrap)
        .collect();

    let successes = results.iter().filter(|r| r.is_ok()).count();
    let exhausted = results
        .iter()
        .filter(|r| matches!(r, Err(EngineError::ResourceExhausted { .. })))
        .count();

    assert_eq!(successes, CAPACITY);
    assert_eq!(exhausted, REQUESTS - CAPACITY);
    assert_eq!(
        allocator
            .get_number_sold_of_type(TicketType::EarlyBird)
            .await
            .unwrap(),
        CAPACITY
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_issued_keys_are_unique() {
    let allocator = allocator(TicketType::Regular, 200);

    let handles = (0..200).map(|_| {
        let allocator = Arc::clone(&allocator);
        tokio::spawn(async move {
            allocator
                .request_ticket_of_type(TicketType::Regular, UserId::new(), true, false)
                .await
        })
    });
    let mut keys: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|r| r.unwrap().unwrap().key)
        .collect();

    keys.sort();
    keys.dedup();
    assert_eq!(keys.len(), 200);
}

#[tokio::test]
async fn test_types_have_independent_capacity() {
    let allocator = Arc::new(TicketAllocator::new(
        Arc::new(InMemoryTicketStore::new()),
        TicketCatalog::default()
            .with_limit(TicketType::EarlyBird, 1)
            .with_limit(TicketType::LastMinute, 1),
    ));
    let owner = UserId::new();

    allocator
        .request_ticket_of_type(TicketType::EarlyBird, owner, false, false)
        .await
        .unwrap();
    allocator
        .request_ticket_of_type(TicketType::LastMinute, owner, false, false)
        .await
        .unwrap();

    assert!(
        allocator
            .request_ticket_of_type(TicketType::EarlyBird, owner, false, false)
            .await
            .is_err()
    );
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_sold_count_never_exceeds_capacity(
        ticket_type in buyable_ticket_type(),
        capacity in 0usize..8,
        requests in 0usize..24,
    ) {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap();

        runtime.block_on(async {
            let allocator = allocator(ticket_type, capacity);
            let handles = (0..requests).map(|_| {
                let allocator = Arc::clone(&allocator);
                tokio::spawn(async move {
                    allocator
                        .request_ticket_of_type(ticket_type, UserId::new(), false, false)
                        .await
                        .is_ok()
                })
            });
            let successes = join_all(handles)
                .await
                .into_iter()
                .filter(|r| *r.as_ref().unwrap())
                .count();

            let sold = allocator.get_number_sold_of_type(ticket_type).await.unwrap();
            prop_assert_eq!(successes, requests.min(capacity));
            prop_assert_eq!(sold, successes);
            Ok(())
        })?;
    }
}
