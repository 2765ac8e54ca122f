//! Application state for the ticketing HTTP server.
//!
//! Holds the engine services and the shared resources handlers need. The
//! default wiring keeps everything in memory and talks to the mock payment
//! provider.

use crate::config::Config;
use axum::extract::FromRef;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use ticket_engine_core::environment::SystemClock;
use ticket_engine_core::memory::{
    InMemoryExpiredOrderStore, InMemoryOrderStore, InMemoryTicketStore, InMemoryUserDirectory,
};
use ticket_engine_core::{
    MockPaymentGateway, OrderEnvironment, OrderLifecycleManager, TicketAllocator,
    TransferCoordinator, User, UserDirectory,
};

/// Application state shared across all HTTP handlers.
///
/// Cloned (cheaply via Arc) for each request.
#[derive(Clone)]
pub struct AppState {
    /// Loaded configuration
    pub config: Arc<Config>,
    /// Ticket allocator (capacity and ticket lookups)
    pub allocator: Arc<TicketAllocator>,
    /// Order lifecycle manager
    pub manager: Arc<OrderLifecycleManager>,
    /// Ticket transfer coordinator
    pub transfers: Arc<TransferCoordinator>,
    /// User lookups for caller resolution
    pub users: Arc<dyn UserDirectory>,
    /// Prometheus handle, when the exporter is installed
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Create a new application state from already wired services.
    #[must_use]
    pub fn new(
        config: Config,
        allocator: Arc<TicketAllocator>,
        manager: Arc<OrderLifecycleManager>,
        transfers: Arc<TransferCoordinator>,
        users: Arc<dyn UserDirectory>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            allocator,
            manager,
            transfers,
            users,
            metrics: None,
        }
    }

    /// Wire the engine over in-memory stores, seeding the configured users.
    ///
    /// Returns the state and the seeded users.
    #[must_use]
    pub fn in_memory(config: Config) -> (Self, Vec<User>) {
        let seeded = config.users.build();

        let tickets = Arc::new(InMemoryTicketStore::new());
        let users = Arc::new(InMemoryUserDirectory::with_users(seeded.clone()));
        let gateway = MockPaymentGateway::shared(
            config.payment.return_url.clone(),
            config.payment.mock_auto_pay,
        );

        let allocator = Arc::new(TicketAllocator::new(
            tickets.clone(),
            config.tickets.catalog(),
        ));
        let env = OrderEnvironment::new(
            Arc::new(SystemClock),
            Arc::new(InMemoryOrderStore::new()),
            Arc::new(InMemoryExpiredOrderStore::new()),
            users.clone(),
            gateway,
        );
        let manager = Arc::new(OrderLifecycleManager::new(
            env,
            allocator.clone(),
            config.orders.limit,
        ));
        let transfers = Arc::new(TransferCoordinator::new(tickets, users.clone()));

        (
            Self::new(config, allocator, manager, transfers, users),
            seeded,
        )
    }

    /// Attach the Prometheus handle served on `GET /metrics`.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

// Implement FromRef to allow the caller extractors to reach the user directory
impl FromRef<AppState> for Arc<dyn UserDirectory> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.users.clone()
    }
}
