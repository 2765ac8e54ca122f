//! # Ticket Engine Core
//!
//! Ticket allocation and order lifecycle for a capacity-limited event.
//!
//! The crate is built from three services sharing a set of store traits:
//!
//! - [`TicketAllocator`]: issues tickets against per-type capacity and never
//!   oversells, no matter how many requests race
//! - [`OrderLifecycleManager`]: moves orders through
//!   `CREATING → PAID → EXPIRED` and keeps ticket membership consistent
//! - [`TransferCoordinator`]: two-party handshake that moves a paid ticket to
//!   another user
//!
//! Status changes are decided by the pure [`lifecycle::reduce`]; the manager
//! only runs the effects it returns.
//!
//! ## Environment
//!
//! Services receive their dependencies as trait objects (stores, user
//! directory, payment gateway, [`environment::Clock`]), so tests wire in the
//! in-memory implementations from [`memory`] and a fixed clock.
//!
//! ## Example
//!
//! ```ignore
//! use ticket_engine_core::*;
//!
//! let tickets = Arc::new(InMemoryTicketStore::new());
//! let allocator = Arc::new(TicketAllocator::new(tickets.clone(), TicketCatalog::default()));
//! let manager = OrderLifecycleManager::new(env, allocator, 5);
//!
//! let order = manager.create(alice.id, TicketRequest::of_type(TicketType::EarlyBird)).await?;
//! let url = manager.request_payment(order.id).await?;
//! ```

pub mod allocator;
pub mod error;
pub mod lifecycle;
pub mod locks;
pub mod memory;
pub mod orders;
pub mod payment;
pub mod store;
pub mod transfer;
pub mod types;

pub use allocator::TicketAllocator;
pub use error::{EngineError, EngineResult, GatewayError, StoreError};
pub use lifecycle::{OrderCommand, OrderEffect};
pub use orders::{OrderEnvironment, OrderLifecycleManager};
pub use payment::{Checkout, MockPaymentGateway, PaymentGateway};
pub use store::{ExpiredOrderStore, OrderStore, StoreResult, TicketStore, UserDirectory};
pub use transfer::TransferCoordinator;
pub use types::{
    ExpiredOrder, Order, OrderId, OrderStatus, Ticket, TicketAvailability, TicketCatalog,
    TicketId, TicketKey, TicketRequest, TicketSnapshot, TicketType, TicketTypeSpec, User, UserId,
};

/// Environment traits for dependency injection
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```ignore
    /// // Test - fixed time for deterministic tests
    /// struct FixedClock { time: DateTime<Utc> }
    /// impl Clock for FixedClock {
    ///     fn now(&self) -> DateTime<Utc> {
    ///         self.time
    ///     }
    /// }
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
