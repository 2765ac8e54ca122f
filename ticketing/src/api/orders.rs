//! Order API endpoints.
//!
//! - POST /orders - Open an order with one ticket
//! - GET /orders - The caller's orders
//! - GET /orders/:id - One order
//! - POST /orders/:id/tickets - Add a ticket
//! - DELETE /orders/:id/tickets - Remove a matching ticket
//! - POST /orders/:id/checkout - Start payment, returns the payment URL
//! - PUT /orders/:id/status - Refresh the order from the payment provider
//!
//! # State Machine
//!
//! ```text
//! CREATING ──► PAID
//!    │           │
//!    └──► EXPIRED ◄┘
//! ```

use super::{OrderView, owned_order};
use crate::metrics;
use crate::server::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Serialize;
use ticket_engine_core::{OrderId, OrderStatus, TicketRequest};
use ticket_engine_web::{AuthenticatedUser, WebResult};
use uuid::Uuid;

/// Response after starting checkout.
#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    /// Order being paid
    pub order_id: OrderId,
    /// Where to send the customer
    pub payment_url: String,
}

/// Open a new order holding one ticket.
///
/// ```bash
/// curl -X POST http://localhost:8080/orders \
///   -H "X-User-Id: <user id>" \
///   -H "Content-Type: application/json" \
///   -d '{"ticket_type": "EARLY_BIRD", "pickup_service": false, "ch_member": true}'
/// ```
pub async fn create_order(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(request): Json<TicketRequest>,
) -> WebResult<(StatusCode, Json<OrderView>)> {
    let result = state.manager.create(user.id, request).await;
    metrics::record_allocation(request.ticket_type, &result);
    let order = result?;
    metrics::record_order("created");

    Ok((
        StatusCode::CREATED,
        Json(OrderView::load(&state.manager, order).await?),
    ))
}

/// List the caller's live orders.
pub async fn list_my_orders(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> WebResult<Json<Vec<OrderView>>> {
    let orders = state.manager.find_orders_by_username(&user.username).await?;

    let mut views = Vec::with_capacity(orders.len());
    for order in orders {
        views.push(OrderView::load(&state.manager, order).await?);
    }
    Ok(Json(views))
}

/// Get one order.
pub async fn get_order(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> WebResult<Json<OrderView>> {
    let order = owned_order(&state.manager, &user, OrderId::from_uuid(id)).await?;
    Ok(Json(OrderView::load(&state.manager, order).await?))
}

/// Add a ticket to an open order.
pub async fn add_ticket(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(request): Json<TicketRequest>,
) -> WebResult<Json<OrderView>> {
    let order = owned_order(&state.manager, &user, OrderId::from_uuid(id)).await?;

    let result = state.manager.add_ticket_to_order(order.id, request).await;
    metrics::record_allocation(request.ticket_type, &result);
    let order = result?;

    Ok(Json(OrderView::load(&state.manager, order).await?))
}

/// Remove the first ticket matching the request from an open order.
pub async fn remove_ticket(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(request): Json<TicketRequest>,
) -> WebResult<Json<OrderView>> {
    let order = owned_order(&state.manager, &user, OrderId::from_uuid(id)).await?;

    let order = state
        .manager
        .remove_ticket_from_order(order.id, request)
        .await?;
    metrics::record_tickets_released(1);

    Ok(Json(OrderView::load(&state.manager, order).await?))
}

/// Start payment for an open order.
pub async fn checkout(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> WebResult<Json<CheckoutResponse>> {
    let order = owned_order(&state.manager, &user, OrderId::from_uuid(id)).await?;
    let payment_url = state.manager.request_payment(order.id).await?;

    Ok(Json(CheckoutResponse {
        order_id: order.id,
        payment_url,
    }))
}

/// Ask the payment provider for the order's status and apply it.
pub async fn refresh_status(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> WebResult<Json<OrderView>> {
    let before = owned_order(&state.manager, &user, OrderId::from_uuid(id)).await?;

    let order = state.manager.update_order_status(before.id).await?;
    record_transition(before.status, order.status, before.tickets.len());

    Ok(Json(OrderView::load(&state.manager, order).await?))
}

/// Record metrics for a provider-driven status change.
pub(crate) fn record_transition(before: OrderStatus, after: OrderStatus, tickets: usize) {
    if before == after {
        return;
    }
    match after {
        OrderStatus::Paid => metrics::record_order("paid"),
        OrderStatus::Expired => {
            metrics::record_order("expired");
            metrics::record_tickets_released(tickets);
        }
        OrderStatus::Creating => {}
    }
}
