//! A fully wired engine over in-memory stores.
//!
//! The harness seeds four users (`alice`, `bob`, `carol` and the administrator
//! `admin`), a [`MockPaymentGateway`] and a [`ManualClock`] at [`epoch`], and
//! exposes every part so tests can assert on stores directly.

#![allow(clippy::module_name_repetitions)] // TestEngine is the natural name

use crate::faults::{FaultyExpiredOrderStore, FaultyOrderStore};
use crate::mocks::{ManualClock, epoch};
use std::sync::Arc;
use ticket_engine_core::memory::{InMemoryTicketStore, InMemoryUserDirectory};
use ticket_engine_core::{
    EngineError, EngineResult, MockPaymentGateway, Order, OrderEnvironment, OrderId,
    OrderLifecycleManager, OrderStatus, Ticket, TicketAllocator, TicketCatalog, TicketRequest,
    TicketType, TransferCoordinator, User,
};

/// Default order limit used by the harness
pub const DEFAULT_ORDER_LIMIT: usize = 5;

/// Engine wired for tests
pub struct TestEngine {
    /// Ticket records
    pub tickets: Arc<InMemoryTicketStore>,
    /// Live orders; writes can be switched to fail
    pub orders: Arc<FaultyOrderStore>,
    /// Archive of expired orders; saves can be switched to fail
    pub expired_orders: Arc<FaultyExpiredOrderStore>,
    /// Seeded users
    pub users: Arc<InMemoryUserDirectory>,
    /// Payment provider double
    pub gateway: Arc<MockPaymentGateway>,
    /// Clock shared by the services
    pub clock: Arc<ManualClock>,
    /// Ticket allocator
    pub allocator: Arc<TicketAllocator>,
    /// Order lifecycle manager
    pub manager: Arc<OrderLifecycleManager>,
    /// Transfer coordinator
    pub transfers: Arc<TransferCoordinator>,
    /// Regular user
    pub alice: User,
    /// Regular user
    pub bob: User,
    /// Regular user
    pub carol: User,
    /// Administrator
    pub admin: User,
}

impl TestEngine {
    /// Start configuring a harness
    #[must_use]
    pub fn builder() -> TestEngineBuilder {
        TestEngineBuilder::default()
    }

    /// Harness with the default catalog and order limit
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Tell the mock provider how the payment for `order_id` went.
    ///
    /// # Errors
    ///
    /// Returns error if the order was never checked out.
    pub async fn settle_payment(&self, order_id: OrderId, status: OrderStatus) -> EngineResult<()> {
        let reference = self
            .gateway
            .reference_for(order_id)
            .await
            .ok_or(EngineError::PaymentNotInitiated(order_id))?;
        self.gateway.settle(&reference, status).await?;
        Ok(())
    }

    /// Run the full purchase path for one ticket: create, check out, settle as
    /// paid and apply the provider callback. Returns the paid order.
    ///
    /// # Errors
    ///
    /// Returns error if any step fails, e.g. the user already has an open order.
    pub async fn buy(&self, user: &User, request: TicketRequest) -> EngineResult<Order> {
        let order = self.manager.create(user.id, request).await?;
        self.manager.request_payment(order.id).await?;
        self.settle_payment(order.id, OrderStatus::Paid).await?;

        let reference = order_reference(&self.manager.get_order_by_id(order.id).await?)?;
        self.manager
            .update_order_status_by_reference(&reference)
            .await
    }

    /// Buy a single ticket of `ticket_type` and return it.
    ///
    /// # Errors
    ///
    /// Returns error if the purchase fails.
    pub async fn paid_ticket_for(&self, user: &User, ticket_type: TicketType) -> EngineResult<Ticket> {
        let order = self.buy(user, TicketRequest::of_type(ticket_type)).await?;
        let ticket_id = order
            .tickets
            .first()
            .copied()
            .ok_or_else(|| EngineError::not_found("ticket", format!("in order {}", order.id)))?;
        self.allocator.get_ticket_by_id(ticket_id).await
    }
}

impl Default for TestEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn order_reference(order: &Order) -> EngineResult<String> {
    order
        .reference
        .clone()
        .ok_or(EngineError::PaymentNotInitiated(order.id))
}

/// Builder for [`TestEngine`]
#[derive(Debug, Clone)]
pub struct TestEngineBuilder {
    catalog: TicketCatalog,
    order_limit: usize,
    auto_pay: bool,
}

impl Default for TestEngineBuilder {
    fn default() -> Self {
        Self {
            catalog: TicketCatalog::default(),
            order_limit: DEFAULT_ORDER_LIMIT,
            auto_pay: false,
        }
    }
}

impl TestEngineBuilder {
    /// Override the capacity of one ticket type
    #[must_use]
    pub fn with_limit(mut self, ticket_type: TicketType, limit: usize) -> Self {
        self.catalog = self.catalog.with_limit(ticket_type, limit);
        self
    }

    /// Maximum tickets per order
    #[must_use]
    pub const fn order_limit(mut self, order_limit: usize) -> Self {
        self.order_limit = order_limit;
        self
    }

    /// Make the mock provider report every checkout as paid
    #[must_use]
    pub const fn auto_pay(mut self, auto_pay: bool) -> Self {
        self.auto_pay = auto_pay;
        self
    }

    /// Wire the engine
    #[must_use]
    pub fn build(self) -> TestEngine {
        let alice = User::new("alice");
        let bob = User::new("bob");
        let carol = User::new("carol");
        let admin = User::admin("admin");

        let tickets = Arc::new(InMemoryTicketStore::new());
        let orders = Arc::new(FaultyOrderStore::new());
        let expired_orders = Arc::new(FaultyExpiredOrderStore::new());
        let users = Arc::new(InMemoryUserDirectory::with_users([
            alice.clone(),
            bob.clone(),
            carol.clone(),
            admin.clone(),
        ]));
        let gateway = MockPaymentGateway::shared("http://localhost/payments/mock", self.auto_pay);
        let clock = Arc::new(ManualClock::new(epoch()));

        let allocator = Arc::new(TicketAllocator::new(tickets.clone(), self.catalog));
        let env = OrderEnvironment::new(
            clock.clone(),
            orders.clone(),
            expired_orders.clone(),
            users.clone(),
            gateway.clone(),
        );
        let manager = Arc::new(OrderLifecycleManager::new(
            env,
            allocator.clone(),
            self.order_limit,
        ));
        let transfers = Arc::new(TransferCoordinator::new(tickets.clone(), users.clone()));

        TestEngine {
            tickets,
            orders,
            expired_orders,
            users,
            gateway,
            clock,
            allocator,
            manager,
            transfers,
            alice,
            bob,
            carol,
            admin,
        }
    }
}
