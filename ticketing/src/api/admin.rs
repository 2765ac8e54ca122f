//! Administrative endpoints. All of them require an admin caller.
//!
//! - GET /admin/orders - All live orders
//! - GET /admin/orders/expired - Archived orders
//! - GET /admin/orders/expired/:id - One archived order
//! - GET /admin/users/:username/orders - A user's live orders
//! - POST /admin/orders/:id/approve - Mark an order paid without the provider
//! - DELETE /admin/orders/:id - Expire an order now
//! - POST /admin/orders/sweep - Expire stale unpaid orders now

use super::OrderView;
use super::orders::record_transition;
use crate::metrics;
use crate::server::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;
use ticket_engine_core::{ExpiredOrder, OrderId};
use ticket_engine_web::{AdminUser, WebResult};
use uuid::Uuid;

/// Result of a manual sweep.
#[derive(Debug, Serialize)]
pub struct SweepResponse {
    /// Orders that were expired
    pub expired: Vec<OrderId>,
}

/// List every live order.
pub async fn list_orders(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> WebResult<Json<Vec<OrderView>>> {
    let orders = state.manager.get_all_orders().await?;

    let mut views = Vec::with_capacity(orders.len());
    for order in orders {
        views.push(OrderView::load(&state.manager, order).await?);
    }
    Ok(Json(views))
}

/// List a user's live orders.
pub async fn list_user_orders(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(username): Path<String>,
) -> WebResult<Json<Vec<OrderView>>> {
    let orders = state.manager.find_orders_by_username(&username).await?;

    let mut views = Vec::with_capacity(orders.len());
    for order in orders {
        views.push(OrderView::load(&state.manager, order).await?);
    }
    Ok(Json(views))
}

/// List archived orders.
pub async fn list_expired_orders(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> WebResult<Json<Vec<ExpiredOrder>>> {
    Ok(Json(state.manager.get_expired_orders().await?))
}

/// Get one archived order.
pub async fn get_expired_order(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<Uuid>,
) -> WebResult<Json<ExpiredOrder>> {
    Ok(Json(
        state
            .manager
            .get_expired_order(OrderId::from_uuid(id))
            .await?,
    ))
}

/// Mark an order paid.
pub async fn approve_order(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
) -> WebResult<Json<OrderView>> {
    let order_id = OrderId::from_uuid(id);
    tracing::info!(admin = %admin.username, order_id = %order_id, "Admin approval requested");

    let before = state.manager.get_order_by_id(order_id).await?;
    let order = state.manager.admin_approve_order(order_id).await?;
    record_transition(before.status, order.status, before.tickets.len());

    Ok(Json(OrderView::load(&state.manager, order).await?))
}

/// Expire an order immediately, releasing its tickets.
pub async fn expire_order(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
) -> WebResult<Json<ExpiredOrder>> {
    let order_id = OrderId::from_uuid(id);
    tracing::info!(admin = %admin.username, order_id = %order_id, "Admin expiry requested");

    let archived = state.manager.expire_order(order_id).await?;
    metrics::record_expiries(std::slice::from_ref(&archived));

    Ok(Json(archived))
}

/// Run the stale-order sweep now.
pub async fn sweep_orders(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> WebResult<Json<SweepResponse>> {
    let expired = state
        .manager
        .expire_stale_orders(state.config.orders.max_age())
        .await?;
    metrics::record_expiries(&expired);

    Ok(Json(SweepResponse {
        expired: expired.iter().map(|archived| archived.order_id).collect(),
    }))
}
