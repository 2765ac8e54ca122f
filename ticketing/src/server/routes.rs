//! Router configuration for the ticketing service.

use super::health::{metrics_endpoint, readiness_check};
use super::state::AppState;
use crate::api::{admin, orders, payments, tickets, transfers};
use axum::{
    Router,
    routing::{delete, get, post, put},
};
use ticket_engine_web::{correlation_id_layer, handlers::health_check};
use tower_http::trace::TraceLayer;

/// Build the complete Axum router.
///
/// Configures:
/// - Health, readiness and metrics (no caller required)
/// - Orders and checkout
/// - Ticket inventory and the caller's tickets
/// - Ticket transfers
/// - Payment provider callbacks
/// - Administration
pub fn build_router(state: AppState) -> Router {
    let order_routes = Router::new()
        .route("/", post(orders::create_order).get(orders::list_my_orders))
        .route("/:id", get(orders::get_order))
        .route(
            "/:id/tickets",
            post(orders::add_ticket).delete(orders::remove_ticket),
        )
        .route("/:id/checkout", post(orders::checkout))
        .route("/:id/status", put(orders::refresh_status));

    let admin_routes = Router::new()
        .route("/orders", get(admin::list_orders))
        .route("/orders/expired", get(admin::list_expired_orders))
        .route("/orders/expired/:id", get(admin::get_expired_order))
        .route("/orders/sweep", post(admin::sweep_orders))
        .route("/orders/:id", delete(admin::expire_order))
        .route("/orders/:id/approve", post(admin::approve_order))
        .route("/users/:username/orders", get(admin::list_user_orders));

    Router::new()
        .route("/health", get(health_check))
        .route("/health/ready", get(readiness_check))
        .route("/metrics", get(metrics_endpoint))
        .route("/tickets", get(tickets::my_tickets))
        .route("/tickets/available", get(tickets::available_tickets))
        .route("/tickettransfer", post(transfers::setup_transfer))
        .route(
            "/tickettransfer/:key",
            put(transfers::complete_transfer).delete(transfers::cancel_transfer),
        )
        .route("/payments/webhook/:reference", post(payments::payment_webhook))
        .nest("/orders", order_routes)
        .nest("/admin", admin_routes)
        .layer(correlation_id_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
