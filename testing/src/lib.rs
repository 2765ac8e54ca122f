//! # Ticket Engine Testing
//!
//! Testing utilities and helpers for the ticket engine.
//!
//! This crate provides:
//! - Deterministic clocks for the engine's [`Clock`] seam
//! - [`TestEngine`], a fully wired engine over in-memory stores
//! - store wrappers that fail on demand, for partial-failure tests
//! - proptest strategies for domain types
//!
//! ## Example
//!
//! ```ignore
//! use ticket_engine_testing::TestEngine;
//!
//! #[tokio::test]
//! async fn test_order_flow() {
//!     let engine = TestEngine::builder()
//!         .with_limit(TicketType::EarlyBird, 2)
//!         .build();
//!
//!     let order = engine.manager
//!         .create(engine.alice.id, TicketRequest::of_type(TicketType::EarlyBird))
//!         .await
//!         .unwrap();
//!     assert_eq!(order.tickets.len(), 1);
//! }
//! ```

use chrono::{DateTime, Utc};
use ticket_engine_core::environment::Clock;

pub mod harness;

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use std::sync::atomic::{AtomicI64, Ordering};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use ticket_engine_testing::mocks::FixedClock;
    /// use ticket_engine_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Clock that only moves when told to.
    ///
    /// Used to age orders past the expiry window without sleeping.
    #[derive(Debug)]
    pub struct ManualClock {
        start: DateTime<Utc>,
        offset_ms: AtomicI64,
    }

    impl ManualClock {
        /// Create a clock standing at `start`
        #[must_use]
        pub const fn new(start: DateTime<Utc>) -> Self {
            Self {
                start,
                offset_ms: AtomicI64::new(0),
            }
        }

        /// Move the clock forward
        pub fn advance(&self, by: chrono::Duration) {
            self.offset_ms
                .fetch_add(by.num_milliseconds(), Ordering::SeqCst);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            self.start + chrono::Duration::milliseconds(self.offset_ms.load(Ordering::SeqCst))
        }
    }

    /// Create a default fixed clock for tests, standing at [`epoch`]
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(epoch())
    }

    /// The instant test clocks start at (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// Panics if the hardcoded timestamp fails to parse.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn epoch() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
            .expect("hardcoded timestamp should always parse")
            .with_timezone(&Utc)
    }
}

/// Property-based testing utilities using proptest.
pub mod properties {
    use proptest::prelude::*;
    use ticket_engine_core::{TicketRequest, TicketType};

    /// Ticket types the public can buy with the default catalog
    pub fn buyable_ticket_type() -> impl Strategy<Value = TicketType> {
        proptest::sample::select(vec![
            TicketType::EarlyBird,
            TicketType::Regular,
            TicketType::LastMinute,
        ])
    }

    /// A ticket request for a buyable type with random extras
    pub fn ticket_request() -> impl Strategy<Value = TicketRequest> {
        (buyable_ticket_type(), any::<bool>(), any::<bool>()).prop_map(
            |(ticket_type, pickup_service, ch_member)| TicketRequest {
                ticket_type,
                pickup_service,
                ch_member,
            },
        )
    }
}

/// Install a test-friendly tracing subscriber. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Store wrappers whose writes can be made to fail on demand.
///
/// The harness wires every engine through these; they pass everything
/// through to the in-memory stores until a test flips the switch.
pub mod faults {
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use ticket_engine_core::memory::{InMemoryExpiredOrderStore, InMemoryOrderStore};
    use ticket_engine_core::{
        ExpiredOrder, ExpiredOrderStore, Order, OrderId, OrderStore, StoreError, StoreResult,
        UserId,
    };

    fn backend_down(store: &str) -> StoreError {
        StoreError::Backend(format!("{store} unavailable"))
    }

    /// [`OrderStore`] whose `save` and `delete` fail while switched off
    #[derive(Default)]
    pub struct FaultyOrderStore {
        inner: InMemoryOrderStore,
        failing: AtomicBool,
    }

    impl FaultyOrderStore {
        /// A healthy store
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Make writes fail (`true`) or succeed again (`false`)
        pub fn fail_writes(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        fn check(&self) -> StoreResult<()> {
            if self.failing.load(Ordering::SeqCst) {
                Err(backend_down("order store"))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl OrderStore for FaultyOrderStore {
        async fn find(&self, id: OrderId) -> StoreResult<Option<Order>> {
            self.inner.find(id).await
        }

        async fn find_by_reference(&self, reference: &str) -> StoreResult<Option<Order>> {
            self.inner.find_by_reference(reference).await
        }

        async fn find_by_owner(&self, owner: UserId) -> StoreResult<Vec<Order>> {
            self.inner.find_by_owner(owner).await
        }

        async fn find_all(&self) -> StoreResult<Vec<Order>> {
            self.inner.find_all().await
        }

        async fn save(&self, order: Order) -> StoreResult<Order> {
            self.check()?;
            self.inner.save(order).await
        }

        async fn delete(&self, id: OrderId) -> StoreResult<bool> {
            self.check()?;
            self.inner.delete(id).await
        }
    }

    /// [`ExpiredOrderStore`] whose `save` fails while switched off
    #[derive(Default)]
    pub struct FaultyExpiredOrderStore {
        inner: InMemoryExpiredOrderStore,
        failing: AtomicBool,
    }

    impl FaultyExpiredOrderStore {
        /// A healthy archive
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Make saves fail (`true`) or succeed again (`false`)
        pub fn fail_writes(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl ExpiredOrderStore for FaultyExpiredOrderStore {
        async fn save(&self, expired: ExpiredOrder) -> StoreResult<()> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(backend_down("archive"));
            }
            self.inner.save(expired).await
        }

        async fn find_by_order_id(&self, order_id: OrderId) -> StoreResult<Option<ExpiredOrder>> {
            self.inner.find_by_order_id(order_id).await
        }

        async fn find_all(&self) -> StoreResult<Vec<ExpiredOrder>> {
            self.inner.find_all().await
        }
    }
}

// Re-export commonly used items
pub use faults::{FaultyExpiredOrderStore, FaultyOrderStore};
pub use harness::{TestEngine, TestEngineBuilder};
pub use mocks::{FixedClock, ManualClock, epoch, test_clock};
